//! The async turn loop.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use skald_core::{
    Caller, EngineError, EngineResult, EventId, FlagValue, GameResult, GameSession, Outcome, Patch, RollRecord,
    SessionId, SessionStatus, TurnContext,
};
use skald_mechanics::DiceRoller;
use skald_store::{SceneChange, SessionStore};
use skald_tools::{Gateway, ToolClient, ToolDispatch};
use tokio::sync::watch;

use crate::config::EngineConfig;
use crate::error::{RunError, RunResult};
use crate::hooks::{HookLayer, with_conflict_retry};
use crate::preset;
use crate::scripted::{ScriptedNarrator, ScriptedParticipant};
use crate::turn::{Speaker, TurnController, needs_enemy_seed};

/// Flag holding the worst current streak of consecutive invalid actions.
pub const INVALID_ACTIONS_FLAG: &str = "invalid_actions";

/// Narration recorded when a scene change is forced.
const FORCED_SCENE_NARRATION: &str = "The party presses onward.";

/// A participant's declared action, recorded on its behalf.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Declaration {
    /// What the participant does.
    pub text: String,
    /// Structured intent: target, totals, ...
    pub details: BTreeMap<String, Value>,
    /// Rolls backing the action.
    pub rolls: Vec<RollRecord>,
}

/// How an actor's turn went.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The actor made its own tool calls.
    Acted,
    /// A participant declared an action for the narrator to resolve.
    Declared(Declaration),
    /// The actor chose to do nothing.
    Passed,
    /// The actor's response was unusable.
    Invalid(String),
}

impl TurnOutcome {
    /// Whether the turn counts toward the invalid-action streak.
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }
}

/// A decision-making collaborator seated at the table.
#[async_trait]
pub trait Actor: Send + Sync {
    /// Actor id, as it appears in the initiative order.
    fn name(&self) -> &str;

    /// Act on `context` using `tools`.
    async fn take_turn(&self, tools: &ToolClient, context: TurnContext) -> TurnOutcome;
}

/// Ends a session from outside the runner.
#[derive(Clone)]
pub struct StopHandle {
    store: Arc<dyn SessionStore>,
    session: SessionId,
    signal: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    /// End the session without a result and interrupt the runner. Idempotent.
    pub fn stop(&self, reason: &str) -> EngineResult<GameSession> {
        let session = self.store.stop(&self.session, reason)?;
        self.signal.send_replace(true);
        tracing::info!(session = %self.session, reason, "stop requested");
        Ok(session)
    }
}

impl std::fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopHandle").field("session", &self.session).finish_non_exhaustive()
    }
}

/// What a run ended with.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// The session.
    pub session: SessionId,
    /// Final status.
    pub status: SessionStatus,
    /// The recorded result; `None` after a stop.
    pub result: Option<GameResult>,
    /// Final round.
    pub round: u32,
    /// Final scene.
    pub scene_id: u32,
    /// Turns taken.
    pub turns: u64,
    /// Corrections injected by the engine.
    pub corrections: usize,
    /// Events in the log.
    pub events: usize,
    /// Whether the run was interrupted by a stop.
    pub stopped: bool,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.result {
            Some(result) => write!(f, "{}: {}", self.session, result.outcome)?,
            None => write!(f, "{}: {} without a result", self.session, self.status)?,
        }
        write!(
            f,
            " after {} turns (round {}, scene {}), {} corrections, {} events",
            self.turns, self.round, self.scene_id, self.corrections, self.events
        )?;
        if let Some(result) = &self.result {
            write!(f, "\n  {}", result.summary)?;
        }
        Ok(())
    }
}

enum Flow {
    Continue,
    Finished,
    Stopped,
}

struct RunState {
    controller: TurnController,
    streaks: BTreeMap<String, u32>,
    turns: u64,
    corrections: usize,
    stop: watch::Receiver<bool>,
}

/// Drives one session to a terminal state.
pub struct Engine<S> {
    config: EngineConfig,
    store: Arc<S>,
    gateway: Arc<Gateway<S>>,
    hooks: HookLayer,
    narrator: Option<Arc<dyn Actor>>,
    participants: BTreeMap<String, Arc<dyn Actor>>,
    stops: Mutex<BTreeMap<SessionId, Arc<watch::Sender<bool>>>>,
}

impl<S> std::fmt::Debug for Engine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("narrator", &self.config.narrator)
            .field("participants", &self.participants.keys().collect::<Vec<_>>())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl<S: SessionStore + 'static> Engine<S> {
    /// An engine over `store`, rolling dice seeded from the config.
    pub fn new(config: EngineConfig, store: Arc<S>) -> RunResult<Self> {
        config.validate()?;
        let gateway = Arc::new(Gateway::new(Arc::clone(&store), DiceRoller::seeded(config.seed)));
        let hooks = HookLayer::standard(&config);
        Ok(Self {
            config,
            store,
            gateway,
            hooks,
            narrator: None,
            participants: BTreeMap::new(),
            stops: Mutex::new(BTreeMap::new()),
        })
    }

    /// Replace the dice roller, e.g. with scripted dice.
    pub fn with_dice(mut self, dice: DiceRoller) -> Self {
        self.gateway = Arc::new(Gateway::new(Arc::clone(&self.store), dice));
        self
    }

    /// Replace the hook table.
    pub fn with_hooks(mut self, hooks: HookLayer) -> Self {
        self.hooks = hooks;
        self
    }

    /// Seat the narrator.
    pub fn with_narrator(mut self, actor: impl Actor + 'static) -> Self {
        self.narrator = Some(Arc::new(actor));
        self
    }

    /// Seat a participant under its actor id.
    pub fn with_participant(mut self, actor: impl Actor + 'static) -> Self {
        self.participants.insert(actor.name().to_string(), Arc::new(actor));
        self
    }

    /// Seat the scripted narrator and one scripted participant per party member.
    pub fn with_scripted_cast(mut self, passive_narrator: bool) -> Self {
        let adventure = self.config.adventure.clone();
        let narrator = if passive_narrator {
            ScriptedNarrator::passive(&self.config.narrator, &adventure)
        } else {
            ScriptedNarrator::new(&self.config.narrator, &adventure)
        };
        self = self.with_narrator(narrator);
        for member in &adventure.party {
            let participant = if member.name == preset::HEALER {
                ScriptedParticipant::healer(&member.name, preset::CURE_WOUNDS)
            } else {
                ScriptedParticipant::new(&member.name)
            };
            self = self.with_participant(participant);
        }
        self
    }

    /// The configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The gateway every actor goes through.
    pub fn dispatcher(&self) -> Arc<dyn ToolDispatch> {
        Arc::clone(&self.gateway) as Arc<dyn ToolDispatch>
    }

    fn client(&self, caller: Caller, session: &SessionId) -> ToolClient {
        ToolClient::new(self.dispatcher(), caller).with_session(session.clone())
    }

    /// A handle that ends `session` and interrupts a run of it in progress.
    /// Other sessions on this engine are unaffected.
    pub fn stop_handle(&self, session: &SessionId) -> StopHandle {
        StopHandle {
            store: Arc::clone(&self.store) as Arc<dyn SessionStore>,
            session: session.clone(),
            signal: self.stop_signal(session),
        }
    }

    fn stop_signal(&self, session: &SessionId) -> Arc<watch::Sender<bool>> {
        let mut stops = self.stops.lock();
        Arc::clone(
            stops
                .entry(session.clone())
                .or_insert_with(|| Arc::new(watch::channel(false).0)),
        )
    }

    /// Create a session for the configured adventure. An empty id is generated.
    pub fn start(&self, id: &str) -> RunResult<GameSession> {
        let config = self.config.adventure.game_config(id, &self.config.narrator);
        let dm = ToolClient::new(self.dispatcher(), Caller::narrator(&self.config.narrator));
        let session = match dm.call(skald_tools::ToolCall::InitGame(Box::new(config)))? {
            skald_tools::ToolResponse::Session(session) => *session,
            other => {
                return Err(EngineError::FailSafe(format!("init_game returned {other:?}")).into());
            }
        };
        tracing::info!(session = %session.id, adventure = %self.config.adventure.name, "session started");
        Ok(session)
    }

    /// Create a session and run it to the end.
    pub async fn play(&self, id: &str) -> RunResult<RunSummary> {
        let session = self.start(id)?;
        self.run(&session.id).await
    }

    /// Run `session` until a result is recorded or it is stopped.
    pub async fn run(&self, session: &SessionId) -> RunResult<RunSummary> {
        if self.narrator.is_none() {
            return Err(RunError::Config("no narrator is seated".to_string()));
        }
        let injected = self.client(Caller::injected(&self.config.narrator), session);
        let mut state = injected.state()?;
        if state.status == SessionStatus::Pending {
            state = self.store.begin(session)?;
        }
        let mut run = RunState {
            controller: TurnController::new(&self.config, &state),
            streaks: BTreeMap::new(),
            turns: 0,
            corrections: 0,
            stop: self.stop_signal(session).subscribe(),
        };
        tracing::info!(session = %session, round = state.round, scene = state.scene_id, "run started");
        let stopped = loop {
            let flow = match self.step(session, &injected, &mut run).await {
                Ok(flow) => flow,
                Err(RunError::Engine(EngineError::FailSafe(reason))) => {
                    self.fail_safe(&injected, &format!("fail-safe: {reason}"))?;
                    Flow::Finished
                }
                Err(err) => return Err(err),
            };
            match flow {
                Flow::Continue => {}
                Flow::Finished => break false,
                Flow::Stopped => break true,
            }
        };
        run.controller.finish()?;
        let state = injected.state()?;
        let events = self.store.events_since(Some(session), EventId(0))?.len();
        let summary = RunSummary {
            session: session.clone(),
            status: state.status,
            result: state.result.clone(),
            round: state.round,
            scene_id: state.scene_id,
            turns: run.turns,
            corrections: run.corrections,
            events,
            stopped,
        };
        tracing::info!(session = %session, status = %summary.status, turns = summary.turns, "run finished");
        Ok(summary)
    }

    async fn step(&self, session: &SessionId, injected: &ToolClient, run: &mut RunState) -> RunResult<Flow> {
        if *run.stop.borrow() {
            return Ok(Flow::Stopped);
        }
        let state = injected.state()?;
        if state.is_ended() {
            return Ok(if state.result.is_some() { Flow::Finished } else { Flow::Stopped });
        }
        if run.turns >= self.config.max_turns {
            self.fail_safe(injected, "fail-safe: turn limit exceeded")?;
            return Ok(Flow::Finished);
        }

        let speaker = run
            .controller
            .next_speaker(&state, |name| self.participants.contains_key(name));
        run.controller.begin_turn(&state, &speaker)?;
        let turn_start = last_event(injected)?;
        let (name, actor, client) = match &speaker {
            Speaker::Narrator => (
                self.config.narrator.clone(),
                self.narrator.clone(),
                self.client(Caller::narrator(&self.config.narrator), session),
            ),
            Speaker::Participant(name) => (
                name.clone(),
                self.participants.get(name).cloned(),
                self.client(Caller::participant(name), session),
            ),
        };
        let Some(actor) = actor else {
            return Err(RunError::Config(format!("{name} has no seat")));
        };

        let context = client.turn_context()?;
        tracing::debug!(actor = %name, round = context.round, scene = context.scene_id, "turn begins");
        let timeout = self.config.turn_timeout;
        let outcome = tokio::select! {
            outcome = tokio::time::timeout(timeout, actor.take_turn(&client, context)) => match outcome {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(actor = %name, ?timeout, "turn timed out");
                    TurnOutcome::Invalid(format!("no response within {} ms", timeout.as_millis()))
                }
            },
            _ = run.stop.changed() => return Ok(Flow::Stopped),
        };
        run.turns += 1;

        if injected.state()?.is_ended() {
            return Ok(Flow::Continue);
        }
        let outcome = match outcome {
            TurnOutcome::Declared(declaration) => self.record(session, &name, declaration),
            other => other,
        };
        if self.track(injected, run, &name, &outcome)?.is_some() {
            return Ok(Flow::Finished);
        }

        if speaker == Speaker::Narrator {
            run.corrections += self.maintain_scene(injected, &run.controller)?;
            let report = self.hooks.run(injected, turn_start)?;
            run.corrections += report.applied.len();
            if report.result.is_some() {
                return Ok(Flow::Finished);
            }
        }
        Ok(Flow::Continue)
    }

    fn record(&self, session: &SessionId, actor: &str, declaration: Declaration) -> TurnOutcome {
        let client = self.client(Caller::recorded_for(actor), session);
        match client.append_note(&declaration.text, declaration.details, declaration.rolls) {
            Ok(id) => {
                tracing::debug!(actor, event = %id, "declaration recorded");
                TurnOutcome::Acted
            }
            Err(err) => TurnOutcome::Invalid(format!("declaration rejected: {err}")),
        }
    }

    /// Update `actor`'s streak, persist the worst streak when it changes,
    /// and end the session once a streak passes the cap.
    fn track(
        &self,
        injected: &ToolClient,
        run: &mut RunState,
        actor: &str,
        outcome: &TurnOutcome,
    ) -> EngineResult<Option<GameResult>> {
        let before = worst(&run.streaks);
        if let TurnOutcome::Invalid(reason) = outcome {
            let streak = run.streaks.entry(actor.to_string()).or_default();
            *streak += 1;
            tracing::warn!(actor, streak = *streak, reason = %reason, "invalid action");
        } else {
            run.streaks.remove(actor);
        }
        let after = worst(&run.streaks);
        if after != before {
            with_conflict_retry(self.config.max_conflict_retries, || {
                let version = injected.state()?.state_version;
                let patch = Patch::new(version).with_flag(INVALID_ACTIONS_FLAG, FlagValue::Int(i64::from(after)));
                injected.apply_patch(patch, "invalid action streak")
            })?;
        }
        if after > self.config.max_invalid_actions {
            let summary = format!("fail-safe: {actor} produced {after} consecutive invalid actions");
            return self.fail_safe(injected, &summary).map(Some);
        }
        Ok(None)
    }

    /// Force a due scene change and seed the enemies of a newly entered scene.
    fn maintain_scene(&self, injected: &ToolClient, controller: &TurnController) -> EngineResult<usize> {
        let mut state = injected.state()?;
        if !state.is_running() {
            return Ok(0);
        }
        let mut applied = 0;
        if let Some(next) = controller.scene_due(&state) {
            let title = self
                .config
                .adventure
                .scene(next)
                .map_or_else(|| format!("Scene {next}"), |s| s.title.clone());
            tracing::info!(session = %state.id, round = state.round, scene = next, "forcing scene change");
            let change = SceneChange {
                scene_id: next,
                title,
                narration: FORCED_SCENE_NARRATION.to_string(),
                next_actor: Some(self.config.narrator.clone()),
            };
            state = injected.set_scene(change)?;
            applied += 1;
        }
        let scene = state.scene_id;
        if scene != controller.scene() && needs_enemy_seed(&state, &self.config.adventure, scene) {
            let enemies = self
                .config
                .adventure
                .scene(scene)
                .map(|s| s.enemies.clone())
                .unwrap_or_default();
            tracing::info!(session = %state.id, scene, count = enemies.len(), "seeding scene enemies");
            injected.set_enemies(enemies, &format!("default enemies for scene {scene}"))?;
            applied += 1;
        }
        Ok(applied)
    }

    fn fail_safe(&self, injected: &ToolClient, summary: &str) -> EngineResult<GameResult> {
        tracing::warn!(summary, "fail-safe termination");
        injected.set_game_result(Outcome::Defeat, summary)
    }
}

fn worst(streaks: &BTreeMap<String, u32>) -> u32 {
    streaks.values().copied().max().unwrap_or(0)
}

fn last_event(client: &ToolClient) -> EngineResult<EventId> {
    Ok(client.recent_events(1)?.last().map_or(EventId(0), |e| e.id))
}

#[cfg(test)]
mod tests {
    use skald_store::StateStore;

    use super::*;

    struct Idle(&'static str);

    #[async_trait]
    impl Actor for Idle {
        fn name(&self) -> &str {
            self.0
        }

        async fn take_turn(&self, _tools: &ToolClient, _context: TurnContext) -> TurnOutcome {
            TurnOutcome::Passed
        }
    }

    fn engine(config: EngineConfig) -> Engine<StateStore> {
        Engine::new(config, Arc::new(StateStore::in_memory())).unwrap()
    }

    #[test]
    fn invalid_configs_are_refused() {
        let config = EngineConfig::default().with_max_rounds(0);
        assert!(matches!(
            Engine::new(config, Arc::new(StateStore::in_memory())),
            Err(RunError::Config(_))
        ));
    }

    #[tokio::test]
    async fn running_without_a_narrator_is_a_config_error() {
        let engine = engine(EngineConfig::default());
        let session = engine.start("empty-table").unwrap();
        assert!(matches!(engine.run(&session.id).await, Err(RunError::Config(_))));
    }

    #[tokio::test]
    async fn idle_table_hits_the_round_cap() {
        let engine = engine(EngineConfig::default().with_max_rounds(2)).with_narrator(Idle("DungeonMaster"));
        let summary = engine.play("idle").await.unwrap();
        let result = summary.result.unwrap();
        assert_eq!(result.outcome, Outcome::Defeat);
        assert_eq!(result.summary, crate::hooks::ROUND_LIMIT_SUMMARY);
        assert_eq!(summary.status, SessionStatus::Ended);
        assert!(!summary.stopped);
        assert!(summary.corrections > 0);
    }

    #[tokio::test]
    async fn turn_cap_is_a_fail_safe_defeat() {
        let config = EngineConfig::default().with_max_turns(3);
        let engine = engine(config).with_narrator(Idle("DungeonMaster"));
        let summary = engine.play("capped").await.unwrap();
        assert_eq!(summary.turns, 3);
        let result = summary.result.unwrap();
        assert_eq!(result.outcome, Outcome::Defeat);
        assert!(result.summary.contains("turn limit"));
    }

    #[test]
    fn summary_display() {
        let summary = RunSummary {
            session: SessionId::from("crypt"),
            status: SessionStatus::Ended,
            result: None,
            round: 3,
            scene_id: 1,
            turns: 20,
            corrections: 4,
            events: 31,
            stopped: true,
        };
        assert_eq!(
            summary.to_string(),
            "crypt: ended without a result after 20 turns (round 3, scene 1), 4 corrections, 31 events"
        );
    }
}
