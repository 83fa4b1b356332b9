use miette::IntoDiagnostic;
use skald_core::Caller;
use skald_mechanics::RollRequest;
use skald_tools::ToolCall;

pub fn run(notation: &str, purpose: &str, actor: &str, seed: Option<u64>) -> miette::Result<()> {
    let client = super::scratch_client(seed, Caller::participant(actor));
    let response = client
        .call(ToolCall::Roll(RollRequest::new(notation, purpose, actor)))
        .into_diagnostic()?;
    super::print_json(&response.to_json())
}
