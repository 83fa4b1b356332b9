use std::path::Path;
use std::sync::Arc;

use colored::Colorize;
use miette::IntoDiagnostic;
use skald_core::Outcome;
use skald_engine::{Engine, EngineConfig};
use skald_store::{SessionStore, StateStore};

pub fn run(
    config: Option<&Path>,
    state_dir: Option<&Path>,
    session: Option<&str>,
    seed: Option<u64>,
    max_rounds: Option<u32>,
    passive: bool,
) -> miette::Result<()> {
    let mut config = match config {
        Some(path) => EngineConfig::load(path).into_diagnostic()?,
        None => EngineConfig::default(),
    };
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }
    if let Some(rounds) = max_rounds {
        config = config.with_max_rounds(rounds);
    }
    let store = match state_dir {
        Some(dir) => super::open_store(dir)?,
        None => StateStore::in_memory(),
    };
    let seed = config.seed;
    let adventure = config.adventure.name.clone();
    let engine = Engine::new(config, Arc::new(store))
        .into_diagnostic()?
        .with_scripted_cast(passive);

    let session = engine.start(session.unwrap_or_default()).into_diagnostic()?;
    let handle = engine.stop_handle(&session.id);
    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    let summary = runtime
        .block_on(async {
            let interrupt = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                if let Err(err) = handle.stop("interrupted") {
                    tracing::warn!(%err, "stop after interrupt failed");
                }
            });
            let summary = engine.run(&session.id).await;
            interrupt.abort();
            summary
        })
        .into_diagnostic()?;

    println!(
        "  {} '{}' {}",
        "Adventure".bold(),
        adventure,
        format!("(seed={seed}{})", if passive { ", passive narrator" } else { "" }).dimmed()
    );
    let verdict = match summary.result.as_ref().map(|r| r.outcome) {
        Some(Outcome::Victory) => "VICTORY".green().bold(),
        Some(Outcome::Defeat) => "DEFEAT".red().bold(),
        None => "STOPPED".yellow().bold(),
    };
    println!("  {verdict} {summary}");
    println!();

    let state = engine.store().get_state(Some(&summary.session)).into_diagnostic()?;
    super::show::print_session(&state);
    Ok(())
}
