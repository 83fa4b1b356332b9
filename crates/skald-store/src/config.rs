//! Store configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for a [`StateStore`](crate::StateStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one JSON document per session. `None` keeps
    /// sessions in memory only.
    pub state_dir: Option<PathBuf>,
    /// Upper bound for `get_recent_events`.
    pub recent_events_cap: usize,
    /// Number of events included in a turn context.
    pub context_events: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_dir: None,
            recent_events_cap: 100,
            context_events: 5,
        }
    }
}

impl StoreConfig {
    /// Persist sessions under `dir`.
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(dir.into());
        self
    }

    /// Set the cap for `get_recent_events`.
    pub fn with_recent_events_cap(mut self, cap: usize) -> Self {
        self.recent_events_cap = cap.max(1);
        self
    }

    /// Set how many events a turn context carries.
    pub fn with_context_events(mut self, count: usize) -> Self {
        self.context_events = count;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.state_dir, None);
        assert_eq!(config.recent_events_cap, 100);
        assert_eq!(config.context_events, 5);
    }

    #[test]
    fn builder() {
        let config = StoreConfig::default()
            .with_state_dir("/tmp/skald")
            .with_recent_events_cap(0)
            .with_context_events(8);
        assert_eq!(config.state_dir, Some(PathBuf::from("/tmp/skald")));
        assert_eq!(config.recent_events_cap, 1);
        assert_eq!(config.context_events, 8);
    }
}
