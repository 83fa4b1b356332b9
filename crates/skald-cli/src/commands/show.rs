use std::path::Path;

use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use miette::{IntoDiagnostic, miette};
use skald_core::{Combatant, EventLogEntry, EventPayload, GameSession, SessionId, SessionStatus};
use skald_store::{SessionStore, StateStore};

pub fn run(state_dir: &Path, session: Option<&str>, events: usize, markdown: bool) -> miette::Result<()> {
    let store = super::open_store(state_dir)?;
    let id = match session {
        Some(raw) => SessionId::parse(raw).ok_or_else(|| miette!("session id must not be empty"))?,
        None => latest(&store)?,
    };

    if markdown {
        print!("{}", store.export_markdown(Some(&id)).into_diagnostic()?);
        return Ok(());
    }

    let state = store.get_state(Some(&id)).into_diagnostic()?;
    print_session(&state);

    let recent = store.get_recent_events(Some(&id), events).into_diagnostic()?;
    if !recent.is_empty() {
        println!("  {}", "Recent Events".bold().underline());
        for entry in &recent {
            println!("  {}", render_event(entry));
        }
        println!();
    }
    Ok(())
}

/// The active session, or the most recently updated one.
fn latest(store: &StateStore) -> miette::Result<SessionId> {
    if let Ok(id) = store.resolve(None) {
        return Ok(id);
    }
    store
        .list_sessions()
        .pop()
        .map(|s| s.id)
        .ok_or_else(|| miette!("no sessions found"))
}

pub fn print_session(state: &GameSession) {
    let status = match state.status {
        SessionStatus::Running => state.status.to_string().green(),
        SessionStatus::Pending => state.status.to_string().yellow(),
        SessionStatus::Ended => state.status.to_string().dimmed(),
    };
    println!(
        "  {} [{}] {}",
        state.id.to_string().bold(),
        status,
        format!("(version {})", state.state_version).dimmed()
    );
    println!("  scene {}: {}", state.scene_id, state.scene_title);
    println!("  round {}, next: {}", state.round, state.next_actor);
    if let Some(result) = &state.result {
        println!("  {} {}", result.outcome.to_string().to_uppercase().bold(), result.summary);
    }
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Name", "Side", "HP", "AC", "Attack"]);
    for (side, roster) in [("party", &state.party), ("enemy", &state.enemies)] {
        for combatant in roster {
            table.add_row(roster_row(combatant, side));
        }
    }
    println!("{table}");
    println!();
}

fn roster_row(combatant: &Combatant, side: &str) -> Vec<String> {
    let hp = format!("{}/{}", combatant.current_hp, combatant.max_hp);
    let hp = if combatant.is_alive() { hp } else { format!("{hp} (down)") };
    vec![
        combatant.name.clone(),
        side.to_string(),
        hp,
        combatant.ac.to_string(),
        format!("{:+} {}", combatant.attack_bonus, combatant.damage),
    ]
}

fn render_event(entry: &EventLogEntry) -> String {
    let id = entry.id.to_string();
    let id = format!("[{id:>5}]").dimmed();
    let body = match &entry.payload {
        EventPayload::Note { text, .. } => format!("{}: {text}", entry.actor).normal(),
        EventPayload::ToolResult { tool, summary, .. } => format!("{tool}: {summary}").cyan(),
        EventPayload::Correction { policy, detail } => format!("[{policy}] {detail}").yellow(),
        EventPayload::GameOver { outcome, summary } => format!("game over, {outcome}: {summary}").bold(),
        EventPayload::Stopped { reason } => format!("stopped: {reason}").red(),
    };
    if entry.injected {
        format!("{id} {body} {}", "(injected)".dimmed())
    } else {
        format!("{id} {body}")
    }
}
