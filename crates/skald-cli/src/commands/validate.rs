use miette::IntoDiagnostic;
use skald_core::Caller;
use skald_tools::ToolCall;

pub fn run(notation: &str) -> miette::Result<()> {
    let client = super::scratch_client(Some(0), Caller::participant("cli"));
    let response = client
        .call(ToolCall::ValidateNotation(notation.to_string()))
        .into_diagnostic()?;
    super::print_json(&response.to_json())
}
