//! Core types for Skald: game sessions, combatants, the event log, and the
//! error taxonomy shared by every other crate.
//!
//! Nothing here performs I/O or randomness. The store, gateway and engine
//! crates build on these types.

/// Party members, enemies, and hit point changes.
pub mod combatant;
/// Declarative victory and defeat rules.
pub mod condition;
/// The per-actor view handed out at the start of a turn.
pub mod context;
/// The error taxonomy surfaced to callers.
pub mod error;
/// Append-only event log.
pub mod event;
/// Versioned partial updates.
pub mod patch;
/// Roles, callers, and tool names.
pub mod role;
/// Immutable dice roll records.
pub mod roll;
/// The game session aggregate.
pub mod session;

/// Re-export combatant types.
pub use combatant::{Combatant, HpChange, Side};
/// Re-export end condition types.
pub use condition::{EndCondition, EndVerdict, VictoryCondition};
/// Re-export the turn context.
pub use context::TurnContext;
/// Re-export error types.
pub use error::{EngineError, EngineResult, ErrorBody, NotFoundKind};
/// Re-export event log types.
pub use event::{EventId, EventLog, EventLogEntry, EventPayload, NewEvent};
/// Re-export the patch type.
pub use patch::Patch;
/// Re-export caller types.
pub use role::{Caller, Role, ToolName};
/// Re-export roll types.
pub use roll::{RollId, RollRecord};
/// Re-export session types.
pub use session::{
    FlagValue, GameConfig, GameResult, GameSession, Outcome, SessionId, SessionStatus,
};
