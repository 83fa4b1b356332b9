use serde::{Deserialize, Serialize};

use crate::role::{Role, ToolName};

/// Alias for `Result<T, EngineError>`.
pub type EngineResult<T> = Result<T, EngineError>;

/// What kind of thing a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotFoundKind {
    /// A game session id.
    Session,
    /// An actor id in the initiative order.
    Actor,
    /// A combatant targeted by damage or healing.
    Target,
}

impl std::fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Session => write!(f, "session"),
            Self::Actor => write!(f, "actor"),
            Self::Target => write!(f, "target"),
        }
    }
}

/// Errors surfaced to callers of the engine's tools.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// Malformed notation, expression, patch or arguments. Fix and retry.
    #[error("validation error: {0}")]
    Validation(String),

    /// A write was attempted by a role that may not perform it.
    #[error("permission denied: {role} may not call {tool}")]
    Permission {
        /// The tool that was refused.
        tool: ToolName,
        /// The role of the refused caller.
        role: Role,
    },

    /// The caller's expected version is stale. Re-read and retry.
    #[error("version conflict: expected {expected}, current {current}")]
    Conflict {
        /// The version the caller declared.
        expected: u64,
        /// The version actually stored.
        current: u64,
    },

    /// An unknown session, actor or target.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// The kind of lookup that failed.
        kind: NotFoundKind,
        /// The name or id that was looked up.
        name: String,
    },

    /// An unrecoverable inconsistency; the session is terminated with a defeat.
    #[error("engine fail-safe: {0}")]
    FailSafe(String),

    /// The durable write of a session document failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    /// Shorthand for a [`EngineError::NotFound`] on a session id.
    pub fn session_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: NotFoundKind::Session,
            name: name.into(),
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Permission { .. } => "permission_error",
            Self::Conflict { .. } => "conflict_error",
            Self::NotFound { .. } => "not_found",
            Self::FailSafe(_) => "engine_fail_safe",
            Self::Storage(_) => "storage_error",
        }
    }

    /// Whether a caller may retry the same call after re-reading state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Structured form handed back to the calling actor.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
            retryable: self.is_retryable(),
        }
    }
}

/// The wire shape of an error returned to an actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable error code, see [`EngineError::code`].
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Whether retrying after a re-read can succeed.
    pub retryable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(EngineError::Validation("x".into()).code(), "validation_error");
        assert_eq!(
            EngineError::Permission {
                tool: ToolName::ApplyDamage,
                role: Role::Participant
            }
            .code(),
            "permission_error"
        );
        assert_eq!(
            EngineError::Conflict {
                expected: 1,
                current: 2
            }
            .code(),
            "conflict_error"
        );
        assert_eq!(EngineError::session_not_found("g1").code(), "not_found");
        assert_eq!(EngineError::FailSafe("x".into()).code(), "engine_fail_safe");
    }

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(
            EngineError::Conflict {
                expected: 3,
                current: 4
            }
            .is_retryable()
        );
        assert!(!EngineError::Validation("bad".into()).is_retryable());
        assert!(!EngineError::FailSafe("broken".into()).is_retryable());
    }

    #[test]
    fn display_messages() {
        let err = EngineError::Permission {
            tool: ToolName::SetScene,
            role: Role::Participant,
        };
        assert_eq!(
            err.to_string(),
            "permission denied: participant may not call set_scene"
        );
        let err = EngineError::NotFound {
            kind: NotFoundKind::Target,
            name: "Goblin".into(),
        };
        assert_eq!(err.to_string(), "target not found: Goblin");
    }

    #[test]
    fn body_carries_code_and_message() {
        let body = EngineError::Conflict {
            expected: 1,
            current: 5,
        }
        .to_body();
        assert_eq!(body.code, "conflict_error");
        assert!(body.retryable);
        assert!(body.message.contains("current 5"));
    }
}
