use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use miette::IntoDiagnostic;
use serde_json::json;
use skald_core::Caller;
use skald_tools::{Gateway, ToolClient, ToolRequest};

pub fn run(state_dir: &Path, narrator: bool, caller: &str, seed: Option<u64>, request: &str) -> miette::Result<()> {
    let text = if request == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).into_diagnostic()?;
        buf
    } else {
        request.to_string()
    };

    let store = super::open_store(state_dir)?;
    let gateway = Gateway::new(Arc::new(store), super::dice(seed));
    let caller = if narrator {
        Caller::narrator(caller)
    } else {
        Caller::participant(caller)
    };
    let client = ToolClient::new(Arc::new(gateway), caller);

    match ToolRequest::parse(&text).and_then(|request| client.dispatch(request)) {
        Ok(response) => super::print_json(&response.to_json()),
        Err(err) => {
            super::print_json(&json!({ "error": err.to_body() }))?;
            Err(err).into_diagnostic()
        }
    }
}
