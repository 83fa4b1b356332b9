//! Error types for durable storage.

use std::path::PathBuf;

use skald_core::EngineError;

/// Errors raised while reading or writing session documents.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A filesystem operation failed.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// A document could not be encoded.
    #[error("cannot encode session {id}: {source}")]
    Encode {
        /// The session being written.
        id: String,
        /// The underlying error.
        source: serde_json::Error,
    },

    /// A stored document could not be decoded.
    #[error("corrupt session document {}: {reason}", path.display())]
    Corrupt {
        /// The unreadable file.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Corrupt { .. } => EngineError::FailSafe(err.to_string()),
            StoreError::Io { .. } | StoreError::Encode { .. } => EngineError::Storage(err.to_string()),
        }
    }
}

/// Convenience result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;
