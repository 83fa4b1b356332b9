//! The store interface seen by the gateway and the engine.

use serde::{Deserialize, Serialize};
use skald_core::{
    Caller, Combatant, EndVerdict, EngineResult, EventId, EventLogEntry, GameConfig, GameResult,
    GameSession, HpChange, NewEvent, Outcome, Patch, SessionId, TurnContext,
};

/// A damage or healing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HpRequest {
    /// Name or id of the combatant.
    pub target: String,
    /// Magnitude of the change.
    pub amount: u32,
    /// What caused it (weapon, spell, ...).
    #[serde(default)]
    pub source: String,
    /// Free-form justification.
    #[serde(default)]
    pub reason: String,
}

impl HpRequest {
    /// A request with no source or reason.
    pub fn new(target: impl Into<String>, amount: u32) -> Self {
        Self {
            target: target.into(),
            amount,
            source: String::new(),
            reason: String::new(),
        }
    }

    /// Attach a source.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Attach a reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }
}

/// A scene transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneChange {
    /// The new scene index.
    pub scene_id: u32,
    /// The new title; an empty title keeps the old one.
    #[serde(default)]
    pub title: String,
    /// Narration recorded with the change.
    #[serde(default)]
    pub narration: String,
    /// Who speaks first in the new scene. Unknown actors fall back to the narrator.
    #[serde(default)]
    pub next_actor: Option<String>,
}

impl SceneChange {
    /// Move to `scene_id` with the given title.
    pub fn new(scene_id: u32, title: impl Into<String>) -> Self {
        Self {
            scene_id,
            title: title.into(),
            narration: String::new(),
            next_actor: None,
        }
    }
}

/// Authoritative session storage.
///
/// `session: None` refers to the active session. Writes take the calling
/// [`Caller`] so the resulting events record who made them; authorization
/// is not checked here.
pub trait SessionStore: Send + Sync {
    /// Resolve an optional id to a stored session.
    fn resolve(&self, session: Option<&SessionId>) -> EngineResult<SessionId>;

    /// Every stored session, most recently updated last.
    fn list_sessions(&self) -> Vec<GameSession>;

    /// Full snapshot of a session.
    fn get_state(&self, session: Option<&SessionId>) -> EngineResult<GameSession>;

    /// What `actor` sees at the start of its turn.
    fn get_turn_context(&self, session: Option<&SessionId>, actor: &str) -> EngineResult<TurnContext>;

    /// The last `limit` events, with `limit` clamped to the configured cap.
    fn get_recent_events(&self, session: Option<&SessionId>, limit: usize) -> EngineResult<Vec<EventLogEntry>>;

    /// Events appended after `after`.
    fn events_since(&self, session: Option<&SessionId>, after: EventId) -> EngineResult<Vec<EventLogEntry>>;

    /// The event log rendered as markdown.
    fn export_markdown(&self, session: Option<&SessionId>) -> EngineResult<String>;

    /// Create a session at version 0.
    fn init_game(&self, origin: &Caller, config: GameConfig) -> EngineResult<GameSession>;

    /// Apply a versioned patch, returning the new version.
    fn apply_patch(
        &self,
        origin: &Caller,
        session: Option<&SessionId>,
        patch: Patch,
        reason: &str,
    ) -> EngineResult<u64>;

    /// Append an event without touching the version.
    fn append_event(&self, origin: &Caller, session: Option<&SessionId>, event: NewEvent) -> EngineResult<EventId>;

    /// Move to the next actor in initiative.
    fn advance_turn(&self, origin: &Caller, session: Option<&SessionId>) -> EngineResult<GameSession>;

    /// Change scene.
    fn set_scene(&self, origin: &Caller, session: Option<&SessionId>, change: SceneChange) -> EngineResult<GameSession>;

    /// Replace the enemy roster.
    fn set_enemies(
        &self,
        origin: &Caller,
        session: Option<&SessionId>,
        enemies: Vec<Combatant>,
        reason: &str,
    ) -> EngineResult<GameSession>;

    /// Reduce a combatant's hit points.
    fn apply_damage(&self, origin: &Caller, session: Option<&SessionId>, request: HpRequest) -> EngineResult<HpChange>;

    /// Restore a combatant's hit points.
    fn apply_heal(&self, origin: &Caller, session: Option<&SessionId>, request: HpRequest) -> EngineResult<HpChange>;

    /// Record the terminal result. A second call returns the first result.
    fn set_game_result(
        &self,
        origin: &Caller,
        session: Option<&SessionId>,
        outcome: Outcome,
        summary: &str,
    ) -> EngineResult<GameResult>;

    /// Evaluate the session's end condition without writing.
    fn check_end_conditions(&self, session: Option<&SessionId>) -> EngineResult<Option<EndVerdict>>;

    /// Move a pending session to running.
    fn begin(&self, session: &SessionId) -> EngineResult<GameSession>;

    /// End a session without a result. Idempotent.
    fn stop(&self, session: &SessionId, reason: &str) -> EngineResult<GameSession>;
}
