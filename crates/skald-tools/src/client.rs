//! A caller-bound handle on a dispatcher.

use std::sync::Arc;

use serde_json::Value;
use skald_core::{
    Caller, Combatant, EndVerdict, EngineError, EngineResult, EventId, EventLogEntry, EventPayload,
    GameResult, GameSession, HpChange, NewEvent, Outcome, Patch, RollRecord, SessionId, TurnContext,
};
use skald_mechanics::RollRequest;
use skald_store::{HpRequest, SceneChange};

use crate::gateway::ToolDispatch;
use crate::request::{ToolCall, ToolRequest};
use crate::response::ToolResponse;

/// The tools as one actor sees them.
///
/// Every helper goes through the dispatcher, so the permission table
/// applies exactly as it does to raw requests.
#[derive(Clone)]
pub struct ToolClient {
    dispatcher: Arc<dyn ToolDispatch>,
    caller: Caller,
    session: Option<SessionId>,
}

fn unexpected(tool: &str, response: &ToolResponse) -> EngineError {
    EngineError::FailSafe(format!("{tool} returned an unexpected response: {response:?}"))
}

impl ToolClient {
    /// A client acting as `caller` on the active session.
    pub fn new(dispatcher: Arc<dyn ToolDispatch>, caller: Caller) -> Self {
        Self {
            dispatcher,
            caller,
            session: None,
        }
    }

    /// Pin the client to one session.
    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }

    /// Who this client acts as.
    pub fn caller(&self) -> &Caller {
        &self.caller
    }

    /// The pinned session, if any.
    pub fn session(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    /// Send a raw request.
    pub fn dispatch(&self, request: ToolRequest) -> EngineResult<ToolResponse> {
        self.dispatcher.dispatch(&self.caller, request)
    }

    /// Send a raw JSON request.
    pub fn dispatch_json(&self, json: Value) -> EngineResult<ToolResponse> {
        self.dispatch(ToolRequest::from_value(json)?)
    }

    /// Send a typed call.
    pub fn call(&self, call: ToolCall) -> EngineResult<ToolResponse> {
        self.dispatcher.call(&self.caller, call)
    }

    fn pinned(&self) -> Option<SessionId> {
        self.session.clone()
    }

    /// Roll dice as this caller.
    pub fn roll(&self, notation: &str, purpose: &str) -> EngineResult<RollRecord> {
        let request = RollRequest::new(notation, purpose, self.caller.name.clone());
        match self.call(ToolCall::Roll(request))? {
            ToolResponse::Roll(record) => Ok(record),
            other => Err(unexpected("roll", &other)),
        }
    }

    /// The context for this caller's turn.
    pub fn turn_context(&self) -> EngineResult<TurnContext> {
        let call = ToolCall::GetTurnContext {
            session: self.pinned(),
            actor: self.caller.name.clone(),
        };
        match self.call(call)? {
            ToolResponse::Context(ctx) => Ok(*ctx),
            other => Err(unexpected("get_turn_context", &other)),
        }
    }

    /// A full snapshot.
    pub fn state(&self) -> EngineResult<GameSession> {
        match self.call(ToolCall::GetState(self.pinned()))? {
            ToolResponse::Session(session) => Ok(*session),
            other => Err(unexpected("get_state", &other)),
        }
    }

    /// The last `limit` events.
    pub fn recent_events(&self, limit: usize) -> EngineResult<Vec<EventLogEntry>> {
        let call = ToolCall::GetRecentEvents {
            session: self.pinned(),
            limit,
        };
        match self.call(call)? {
            ToolResponse::Events(events) => Ok(events),
            other => Err(unexpected("get_recent_events", &other)),
        }
    }

    /// Advance initiative.
    pub fn advance_turn(&self) -> EngineResult<GameSession> {
        match self.call(ToolCall::AdvanceTurn(self.pinned()))? {
            ToolResponse::Session(session) => Ok(*session),
            other => Err(unexpected("advance_turn", &other)),
        }
    }

    /// Damage a combatant.
    pub fn apply_damage(&self, request: HpRequest) -> EngineResult<HpChange> {
        let call = ToolCall::ApplyDamage {
            session: self.pinned(),
            request,
        };
        match self.call(call)? {
            ToolResponse::Hp(change) => Ok(change),
            other => Err(unexpected("apply_damage", &other)),
        }
    }

    /// Heal a combatant.
    pub fn apply_heal(&self, request: HpRequest) -> EngineResult<HpChange> {
        let call = ToolCall::ApplyHeal {
            session: self.pinned(),
            request,
        };
        match self.call(call)? {
            ToolResponse::Hp(change) => Ok(change),
            other => Err(unexpected("apply_heal", &other)),
        }
    }

    /// Record a narrative note backed by `rolls`.
    pub fn append_note(
        &self,
        text: &str,
        details: std::collections::BTreeMap<String, Value>,
        rolls: Vec<RollRecord>,
    ) -> EngineResult<EventId> {
        let payload = EventPayload::Note {
            text: text.to_string(),
            details,
        };
        self.append_event(NewEvent::new(payload).with_rolls(rolls))
    }

    /// Append any event.
    pub fn append_event(&self, event: NewEvent) -> EngineResult<EventId> {
        let call = ToolCall::AppendEvent {
            session: self.pinned(),
            event,
        };
        match self.call(call)? {
            ToolResponse::Event(id) => Ok(id),
            other => Err(unexpected("append_event", &other)),
        }
    }

    /// Record the terminal result.
    pub fn set_game_result(&self, outcome: Outcome, summary: &str) -> EngineResult<GameResult> {
        let call = ToolCall::SetGameResult {
            session: self.pinned(),
            outcome,
            summary: summary.to_string(),
        };
        match self.call(call)? {
            ToolResponse::Result(result) => Ok(result),
            other => Err(unexpected("set_game_result", &other)),
        }
    }

    /// Evaluate the end condition.
    pub fn check_end_conditions(&self) -> EngineResult<Option<EndVerdict>> {
        match self.call(ToolCall::CheckEndConditions(self.pinned()))? {
            ToolResponse::Verdict(verdict) => Ok(verdict),
            other => Err(unexpected("check_end_conditions", &other)),
        }
    }

    /// Apply a versioned patch.
    pub fn apply_patch(&self, patch: Patch, reason: &str) -> EngineResult<u64> {
        let call = ToolCall::ApplyPatch {
            session: self.pinned(),
            patch: Box::new(patch),
            reason: reason.to_string(),
        };
        match self.call(call)? {
            ToolResponse::Version(version) => Ok(version),
            other => Err(unexpected("apply_patch", &other)),
        }
    }

    /// Change scene.
    pub fn set_scene(&self, change: SceneChange) -> EngineResult<GameSession> {
        let call = ToolCall::SetScene {
            session: self.pinned(),
            change,
        };
        match self.call(call)? {
            ToolResponse::Session(session) => Ok(*session),
            other => Err(unexpected("set_scene", &other)),
        }
    }

    /// Replace the enemy roster.
    pub fn set_enemies(&self, enemies: Vec<Combatant>, reason: &str) -> EngineResult<GameSession> {
        let call = ToolCall::SetEnemies {
            session: self.pinned(),
            enemies,
            reason: reason.to_string(),
        };
        match self.call(call)? {
            ToolResponse::Session(session) => Ok(*session),
            other => Err(unexpected("set_enemies", &other)),
        }
    }
}

impl std::fmt::Debug for ToolClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolClient")
            .field("caller", &self.caller)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use skald_core::GameConfig;
    use skald_mechanics::DiceRoller;
    use skald_store::StateStore;

    use super::*;
    use crate::gateway::Gateway;

    fn clients() -> (ToolClient, ToolClient) {
        let gateway: Arc<dyn ToolDispatch> =
            Arc::new(Gateway::new(Arc::new(StateStore::in_memory()), DiceRoller::fixed(vec![3, 4])));
        let dm = ToolClient::new(Arc::clone(&gateway), Caller::narrator("DungeonMaster"));
        let config = GameConfig {
            id: "crypt".into(),
            initiative_order: vec!["DungeonMaster".into(), "Shadow".into()],
            party: vec![Combatant::new("Shadow", 21)],
            ..GameConfig::default()
        };
        dm.call(ToolCall::InitGame(Box::new(config))).unwrap();
        let session = SessionId::from("crypt");
        let shadow = ToolClient::new(gateway, Caller::participant("Shadow")).with_session(session.clone());
        (dm.with_session(session), shadow)
    }

    #[test]
    fn typed_helpers_round_trip_through_the_gateway() {
        let (dm, shadow) = clients();
        let roll = shadow.roll("2d6", "sneak attack").unwrap();
        assert_eq!(roll.total, 7);
        let event = dm.append_note("Shadow strikes from the dark.", BTreeMap::new(), vec![roll]).unwrap();
        assert_eq!(shadow.recent_events(1).unwrap()[0].id, event);
        let after = dm.advance_turn().unwrap();
        assert_eq!(after.next_actor, "Shadow");
        assert!(shadow.turn_context().unwrap().is_your_turn);
    }

    #[test]
    fn participant_helpers_still_respect_permissions() {
        let (_, shadow) = clients();
        let err = shadow.apply_heal(HpRequest::new("Shadow", 5)).unwrap_err();
        assert_eq!(err.code(), "permission_error");
        assert_eq!(shadow.state().unwrap().state_version, 0);
    }

    #[test]
    fn raw_json_requests_are_accepted() {
        let (dm, _) = clients();
        let verdict = dm
            .dispatch_json(serde_json::json!({ "name": "check_end_conditions", "arguments": { "session": "crypt" } }))
            .unwrap();
        assert_eq!(verdict, ToolResponse::Verdict(None));
    }
}
