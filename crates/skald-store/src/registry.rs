//! Which session an omitted id refers to.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use skald_core::SessionId;

#[derive(Debug, Clone, Copy)]
struct Activity {
    updated_at: DateTime<Utc>,
    seq: u64,
    running: bool,
}

/// Tracks write activity per session.
///
/// The active session is the running session updated most recently; when
/// two share a timestamp, the later write wins.
#[derive(Debug, Clone, Default)]
pub struct ActiveSessions {
    seq: u64,
    sessions: HashMap<SessionId, Activity>,
}

impl ActiveSessions {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a write to `id`.
    pub fn touch(&mut self, id: &SessionId, updated_at: DateTime<Utc>, running: bool) {
        self.seq += 1;
        self.sessions.insert(
            id.clone(),
            Activity {
                updated_at,
                seq: self.seq,
                running,
            },
        );
    }

    /// The current active session, if any session is running.
    pub fn active(&self) -> Option<&SessionId> {
        self.sessions
            .iter()
            .filter(|(_, a)| a.running)
            .max_by_key(|(_, a)| (a.updated_at, a.seq))
            .map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn empty_registry_has_no_active_session() {
        assert_eq!(ActiveSessions::new().active(), None);
    }

    #[test]
    fn latest_running_session_wins() {
        let now = Utc::now();
        let mut reg = ActiveSessions::new();
        reg.touch(&"old".into(), now - Duration::seconds(10), true);
        reg.touch(&"new".into(), now, true);
        reg.touch(&"ended".into(), now + Duration::seconds(5), false);
        assert_eq!(reg.active().map(SessionId::as_str), Some("new"));
    }

    #[test]
    fn ties_go_to_the_later_write() {
        let now = Utc::now();
        let mut reg = ActiveSessions::new();
        reg.touch(&"a".into(), now, true);
        reg.touch(&"b".into(), now, true);
        assert_eq!(reg.active().map(SessionId::as_str), Some("b"));
        reg.touch(&"a".into(), now, true);
        assert_eq!(reg.active().map(SessionId::as_str), Some("a"));
    }

    #[test]
    fn ending_a_session_hands_over() {
        let now = Utc::now();
        let mut reg = ActiveSessions::new();
        reg.touch(&"a".into(), now, true);
        reg.touch(&"b".into(), now + Duration::seconds(1), true);
        reg.touch(&"b".into(), now + Duration::seconds(2), false);
        assert_eq!(reg.active().map(SessionId::as_str), Some("a"));
    }
}
