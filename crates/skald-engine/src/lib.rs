//! Turn orchestration for Skald.
//!
//! The [`Engine`] seats a narrator and the participants, asks each for a
//! turn in the order the state store dictates, and runs the supervisory
//! hooks after every narrator turn so that a stalled or forgetful narrator
//! cannot wedge the session.

/// Engine and adventure configuration.
pub mod config;
/// Errors that stop a run.
pub mod error;
/// Supervisory policies run after narrator turns.
pub mod hooks;
/// Built-in adventures.
pub mod preset;
/// The async turn loop and the actor seam.
pub mod runner;
/// Scripted narrator and party.
pub mod scripted;
/// The turn state machine and scene pacing.
pub mod turn;

/// Re-export configuration types.
pub use config::{AdventureSpec, EngineConfig, SceneSpec};
/// Re-export error types.
pub use error::{RunError, RunResult};
/// Re-export the hook layer.
pub use hooks::{Correction, HookContext, HookLayer, HookReport, Policy};
/// Re-export runner types.
pub use runner::{Actor, Declaration, Engine, RunSummary, StopHandle, TurnOutcome};
/// Re-export the scripted cast.
pub use scripted::{ScriptedNarrator, ScriptedParticipant};
/// Re-export turn types.
pub use turn::{Speaker, TurnController, TurnPhase};
