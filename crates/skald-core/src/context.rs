use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::combatant::Combatant;
use crate::event::EventLogEntry;
use crate::session::{FlagValue, GameSession, SessionId};

/// What an actor sees at the start of its turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnContext {
    /// The session being played.
    pub session_id: SessionId,
    /// The actor this context was built for.
    pub actor: String,
    /// Whether `actor` is the stored next actor of a running session.
    pub is_your_turn: bool,
    /// Version the context was read at.
    pub state_version: u64,
    /// Current scene index.
    pub scene_id: u32,
    /// Current scene title.
    pub scene_title: String,
    /// Current round.
    pub round: u32,
    /// Current turn index.
    pub turn_index: usize,
    /// Actor most recently advanced past.
    pub last_actor: Option<String>,
    /// Actor expected next.
    pub next_actor: String,
    /// The party.
    pub party: Vec<Combatant>,
    /// The enemies.
    pub enemies: Vec<Combatant>,
    /// Session flags.
    pub flags: BTreeMap<String, FlagValue>,
    /// The latest events, oldest first.
    pub recent_events: Vec<EventLogEntry>,
}

impl TurnContext {
    /// Build a context for `actor` from a snapshot and recent events.
    pub fn new(session: &GameSession, actor: &str, recent_events: Vec<EventLogEntry>) -> Self {
        Self {
            session_id: session.id.clone(),
            actor: actor.to_string(),
            is_your_turn: session.is_running() && session.next_actor == actor,
            state_version: session.state_version,
            scene_id: session.scene_id,
            scene_title: session.scene_title.clone(),
            round: session.round,
            turn_index: session.turn_index,
            last_actor: session.last_actor.clone(),
            next_actor: session.next_actor.clone(),
            party: session.party.clone(),
            enemies: session.enemies.clone(),
            flags: session.flags.clone(),
            recent_events,
        }
    }

    /// Find a combatant on either side by name or id.
    pub fn combatant(&self, key: &str) -> Option<&Combatant> {
        self.party
            .iter()
            .chain(self.enemies.iter())
            .find(|c| c.matches(key))
    }
}
