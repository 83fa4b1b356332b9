//! Typed tool results.

use serde::Serialize;
use skald_core::{
    EndVerdict, EventId, EventLogEntry, GameResult, GameSession, HpChange, RollRecord, TurnContext,
};
use skald_mechanics::NotationCheck;

/// The successful result of a tool call.
///
/// Serialized as `{"kind": ..., "result": ...}` so agents can tell the
/// shapes apart without knowing which tool produced them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum ToolResponse {
    /// One roll.
    Roll(RollRecord),
    /// Several independent rolls.
    Rolls(Vec<RollRecord>),
    /// A notation check.
    Notation(NotationCheck),
    /// An evaluated expression.
    Number(f64),
    /// A threshold comparison.
    Bool(bool),
    /// A modifier or damage sum.
    Integer(i64),
    /// A session snapshot.
    Session(Box<GameSession>),
    /// A turn context.
    Context(Box<TurnContext>),
    /// Events, oldest first.
    Events(Vec<EventLogEntry>),
    /// The version after a patch.
    Version(u64),
    /// The id of an appended event.
    Event(EventId),
    /// A hit point change.
    Hp(HpChange),
    /// The recorded result.
    Result(GameResult),
    /// The end-condition verdict, if any.
    Verdict(Option<EndVerdict>),
}

impl ToolResponse {
    /// Serialize for an agent.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| serde_json::json!({ "kind": "error", "result": e.to_string() }))
    }
}
