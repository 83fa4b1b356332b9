use miette::IntoDiagnostic;
use skald_core::Caller;
use skald_mechanics::calc::format_number;
use skald_tools::{ToolCall, ToolResponse};

pub fn run(expression: &str) -> miette::Result<()> {
    let client = super::scratch_client(Some(0), Caller::narrator("cli"));
    match client
        .call(ToolCall::EvalExpr(expression.to_string()))
        .into_diagnostic()?
    {
        ToolResponse::Number(value) => println!("{}", format_number(value)),
        other => super::print_json(&other.to_json())?,
    }
    Ok(())
}
