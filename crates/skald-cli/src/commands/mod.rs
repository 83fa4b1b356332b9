pub mod calc;
pub mod roll;
pub mod run;
pub mod show;
pub mod tool;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use miette::IntoDiagnostic;
use serde_json::Value;
use skald_core::Caller;
use skald_mechanics::DiceRoller;
use skald_store::{StateStore, StoreConfig};
use skald_tools::{Gateway, ToolClient};

/// Open the session documents under `dir`, creating it if needed.
fn open_store(dir: &Path) -> miette::Result<StateStore> {
    StateStore::open(StoreConfig::default().with_state_dir(dir)).into_diagnostic()
}

fn dice(seed: Option<u64>) -> DiceRoller {
    seed.map_or_else(DiceRoller::from_entropy, DiceRoller::seeded)
}

/// A client for one-off calls that never touch a session.
fn scratch_client(seed: Option<u64>, caller: Caller) -> ToolClient {
    let gateway = Gateway::new(Arc::new(StateStore::in_memory()), dice(seed));
    ToolClient::new(Arc::new(gateway), caller)
}

fn print_json(value: &Value) -> miette::Result<()> {
    let text = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{text}");
    Ok(())
}
