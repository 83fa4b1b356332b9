//! Tool schema and permission gateway for Skald.
//!
//! Actors never touch the store directly. They send [`ToolRequest`]s to a
//! [`Gateway`], which checks the caller's role against the permission
//! table, normalizes loose arguments into a [`ToolCall`] and routes it to
//! the dice roller, the calculator or the [`skald_store::SessionStore`].

/// Caller-bound tool handles.
pub mod client;
/// The dispatcher.
pub mod gateway;
/// The role-to-tool table.
pub mod permission;
/// Wire requests and normalized calls.
pub mod request;
/// Tool results.
pub mod response;

pub use client::ToolClient;
pub use gateway::{Gateway, ToolDispatch};
pub use permission::{Access, access, allowed_tools};
pub use request::{ToolCall, ToolRequest};
pub use response::ToolResponse;
