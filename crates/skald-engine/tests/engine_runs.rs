//! Integration tests for engine runs.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use skald_core::{Outcome, SessionId, SessionStatus, TurnContext};
use skald_engine::hooks::ROUND_LIMIT_SUMMARY;
use skald_engine::preset;
use skald_engine::runner::INVALID_ACTIONS_FLAG;
use skald_engine::{Actor, Engine, EngineConfig, TurnOutcome};
use skald_store::{SceneChange, SessionStore, StateStore};
use skald_tools::ToolClient;

fn engine(config: EngineConfig) -> Engine<StateStore> {
    Engine::new(config, Arc::new(StateStore::in_memory())).unwrap()
}

/// Never answers within any reasonable timeout.
struct Stalled(&'static str);

#[async_trait]
impl Actor for Stalled {
    fn name(&self) -> &str {
        self.0
    }

    async fn take_turn(&self, _tools: &ToolClient, _context: TurnContext) -> TurnOutcome {
        tokio::time::sleep(Duration::from_secs(60)).await;
        TurnOutcome::Passed
    }
}

/// Opens the crypt with its own choice of enemies, then stays quiet.
struct Ambusher;

#[async_trait]
impl Actor for Ambusher {
    fn name(&self) -> &str {
        "DungeonMaster"
    }

    async fn take_turn(&self, tools: &ToolClient, context: TurnContext) -> TurnOutcome {
        if context.scene_id != 0 {
            return TurnOutcome::Passed;
        }
        let placed = tools
            .set_scene(SceneChange::new(1, "Crypt Entrance"))
            .and_then(|_| tools.set_enemies(vec![preset::skeleton("Ogre")], "ambush"));
        match placed {
            Ok(_) => TurnOutcome::Acted,
            Err(err) => TurnOutcome::Invalid(err.to_string()),
        }
    }
}

#[tokio::test]
async fn scripted_party_plays_to_a_result() {
    let engine = engine(EngineConfig::default()).with_scripted_cast(false);
    let summary = engine.play("crypt").await.unwrap();

    assert_eq!(summary.status, SessionStatus::Ended);
    assert!(!summary.stopped);
    let result = summary.result.expect("a result is recorded");
    if result.outcome == Outcome::Victory {
        assert_eq!(summary.scene_id, 2);
    }
    assert!(summary.scene_id >= 1, "the party left the village");
    assert!(summary.round <= engine.config().max_rounds + 1);

    let log = engine.store().export_markdown(Some(&summary.session)).unwrap();
    assert!(log.contains("Thorin"));
    assert!(log.contains("Skeleton Guard 1"));
}

#[tokio::test]
async fn same_seed_same_story() {
    let first = engine(EngineConfig::default().with_seed(7))
        .with_scripted_cast(false)
        .play("first")
        .await
        .unwrap();
    let second = engine(EngineConfig::default().with_seed(7))
        .with_scripted_cast(false)
        .play("second")
        .await
        .unwrap();
    assert_eq!(first.result.map(|r| r.outcome), second.result.map(|r| r.outcome));
    assert_eq!(first.round, second.round);
    assert_eq!(first.turns, second.turns);
    assert_eq!(first.events, second.events);
}

#[tokio::test]
async fn passive_narrator_is_carried_by_the_hooks() {
    let config = EngineConfig::default().with_max_rounds(4).with_scene_threshold(1);
    let engine = engine(config).with_scripted_cast(true);
    let summary = engine.play("passive").await.unwrap();

    let result = summary.result.expect("the round limit decides the game");
    assert_eq!(result.outcome, Outcome::Defeat);
    assert_eq!(result.summary, ROUND_LIMIT_SUMMARY);
    assert_eq!(summary.scene_id, 2, "scenes were forced forward");
    assert!(summary.corrections > 0);

    let state = engine.store().get_state(Some(&summary.session)).unwrap();
    assert_eq!(state.enemies.len(), 1);
    assert_eq!(state.enemies[0].name, preset::SHADOW_LORD);
}

#[tokio::test]
async fn unresponsive_participant_ends_the_session() {
    let config = EngineConfig::default()
        .with_turn_timeout(Duration::from_millis(20))
        .with_max_invalid_actions(2);
    let adventure = config.adventure.clone();
    let engine = engine(config)
        .with_narrator(skald_engine::ScriptedNarrator::passive("DungeonMaster", &adventure))
        .with_participant(Stalled("Thorin"));
    let summary = engine.play("stalled").await.unwrap();

    let result = summary.result.expect("fail-safe result");
    assert_eq!(result.outcome, Outcome::Defeat);
    assert!(
        result.summary.contains("Thorin produced 3 consecutive invalid actions"),
        "{}",
        result.summary
    );
    let state = engine.store().get_state(Some(&summary.session)).unwrap();
    assert_eq!(state.int_flag(INVALID_ACTIONS_FLAG), 3);
}

#[tokio::test]
async fn stop_interrupts_a_turn_in_progress() {
    let engine = engine(EngineConfig::default()).with_narrator(Stalled("DungeonMaster"));
    let session = engine.start("halted").unwrap();
    let handle = engine.stop_handle(&session.id);

    let (summary, stopped) = tokio::join!(engine.run(&session.id), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop("operator request")
    });
    let summary = summary.unwrap();
    assert!(stopped.unwrap().is_ended());
    assert!(summary.stopped);
    assert!(summary.result.is_none());
    assert_eq!(summary.status, SessionStatus::Ended);

    // A second stop is a no-op.
    assert!(handle.stop("again").is_ok());
}

#[tokio::test]
async fn stopping_one_session_leaves_the_others_running() {
    let engine = engine(EngineConfig::default().with_max_rounds(2)).with_scripted_cast(true);
    let first = engine.start("session-a").unwrap();
    let second = engine.start("session-b").unwrap();

    let stopped = engine.stop_handle(&first.id).stop("operator request").unwrap();
    assert!(stopped.is_ended());
    assert!(stopped.result.is_none());

    let summary = engine.run(&second.id).await.unwrap();
    assert!(!summary.stopped);
    assert_eq!(summary.status, SessionStatus::Ended);
    assert!(summary.turns > 0);
    let result = summary.result.expect("the second session reaches a result");
    assert_eq!(result.outcome, Outcome::Defeat);
    assert_eq!(result.summary, ROUND_LIMIT_SUMMARY);

    let again = engine.run(&first.id).await.unwrap();
    assert!(again.stopped);
    assert_eq!(again.turns, 0);
}

#[tokio::test]
async fn narrator_chosen_enemies_are_kept() {
    let engine = engine(EngineConfig::default().with_max_turns(4)).with_narrator(Ambusher);
    let summary = engine.play("ambush").await.unwrap();
    assert_eq!(summary.scene_id, 1);

    let state = engine.store().get_state(Some(&SessionId::from("ambush"))).unwrap();
    let names: Vec<_> = state.enemies.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Ogre"]);
}

#[tokio::test]
async fn finished_runs_survive_a_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = skald_store::StoreConfig::default().with_state_dir(dir.path());
    let store = StateStore::open(config.clone()).unwrap();
    let engine = Engine::new(EngineConfig::default().with_max_rounds(3), Arc::new(store))
        .unwrap()
        .with_scripted_cast(true);
    let summary = engine.play("durable").await.unwrap();

    let reopened = StateStore::open(config).unwrap();
    let state = reopened.get_state(Some(&summary.session)).unwrap();
    assert!(state.is_ended());
    assert_eq!(state.result, summary.result);
    let events = reopened.get_recent_events(Some(&summary.session), 100).unwrap();
    assert!(events.last().is_some_and(|e| matches!(e.payload, skald_core::EventPayload::GameOver { .. })));
}
