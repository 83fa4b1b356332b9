//! Authoritative session storage for Skald.
//!
//! The [`StateStore`] owns every session document: the versioned world
//! state, its append-only event log and the rolls that log references.
//! Callers reach it through the [`SessionStore`] trait.

/// The store interface and its request types.
pub mod api;
/// Store configuration.
pub mod config;
/// Error types for durable storage.
pub mod error;
/// Session documents and persistence backends.
pub mod persist;
/// The active-session registry.
pub mod registry;
/// The in-process state store.
pub mod store;

pub use api::{HpRequest, SceneChange, SessionStore};
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use persist::{JsonDirectory, MemoryOnly, Persistence, SessionDocument};
pub use registry::ActiveSessions;
pub use store::{ENEMIES_SCENE_FLAG, StateStore};
