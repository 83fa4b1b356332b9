use skald_core::EngineError;

/// Alias for `Result<T, RunError>`.
pub type RunResult<T> = Result<T, RunError>;

/// Errors that stop the runner itself, as opposed to errors returned to actors.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// A tool call failed in a way the runner cannot recover from.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The engine configuration is unusable.
    #[error("invalid engine config: {0}")]
    Config(String),

    /// The configuration file could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        /// The file that failed.
        path: std::path::PathBuf,
        /// The underlying failure.
        source: std::io::Error,
    },
}
