//! The append-only event log and its entries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::combatant::HpChange;
use crate::role::ToolName;
use crate::roll::{RollId, RollRecord};
use crate::session::Outcome;

/// Position of an entry in its session's log (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What an event records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Narrative text, optionally with structured details.
    Note {
        /// The narrative text.
        text: String,
        /// Structured fields (intent, target, totals, ...).
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        details: BTreeMap<String, serde_json::Value>,
    },
    /// Summary of a state-changing tool call.
    ToolResult {
        /// The tool that ran.
        tool: ToolName,
        /// One-line description of the change.
        summary: String,
        /// Hit point change, for damage and healing.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hp: Option<HpChange>,
    },
    /// A marker written by a supervisory policy.
    Correction {
        /// Name of the policy that fired.
        policy: String,
        /// What was corrected.
        detail: String,
    },
    /// The terminal result of the session.
    GameOver {
        /// Victory or defeat.
        outcome: Outcome,
        /// Why the session ended.
        summary: String,
    },
    /// The session was stopped without a result.
    Stopped {
        /// Why the session was stopped.
        reason: String,
    },
}

impl EventPayload {
    /// A plain narrative note.
    pub fn note(text: impl Into<String>) -> Self {
        Self::Note {
            text: text.into(),
            details: BTreeMap::new(),
        }
    }

    /// A correction marker.
    pub fn correction(policy: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Correction {
            policy: policy.into(),
            detail: detail.into(),
        }
    }
}

/// An event as submitted by a caller, before the log assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    /// What happened.
    pub payload: EventPayload,
    /// Rolls backing this event; stored once and referenced by id.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rolls: Vec<RollRecord>,
    /// Ids of rolls already present in the log's roll table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roll_ids: Vec<RollId>,
}

impl NewEvent {
    /// Wrap a payload with no rolls.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            payload,
            rolls: Vec::new(),
            roll_ids: Vec::new(),
        }
    }

    /// Attach roll records.
    pub fn with_rolls(mut self, rolls: Vec<RollRecord>) -> Self {
        self.rolls = rolls;
        self
    }
}

impl From<EventPayload> for NewEvent {
    fn from(payload: EventPayload) -> Self {
        Self::new(payload)
    }
}

/// One immutable entry of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogEntry {
    /// Sequence number within the session.
    pub id: EventId,
    /// When the entry was appended.
    pub timestamp: DateTime<Utc>,
    /// Who caused it.
    pub actor: String,
    /// What happened.
    pub payload: EventPayload,
    /// Rolls referenced by this entry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roll_ids: Vec<RollId>,
    /// True when the engine injected this entry on the narrator's behalf.
    #[serde(default)]
    pub injected: bool,
}

impl EventLogEntry {
    /// Whether this entry records a call of `tool`.
    pub fn is_tool(&self, tool: ToolName) -> bool {
        matches!(&self.payload, EventPayload::ToolResult { tool: t, .. } if *t == tool)
    }

    /// Whether this entry records damage or healing.
    pub fn is_hp_change(&self) -> bool {
        self.is_tool(ToolName::ApplyDamage) || self.is_tool(ToolName::ApplyHeal)
    }

    /// Whether this entry is a correction written by `policy`.
    pub fn is_correction(&self, policy: &str) -> bool {
        matches!(&self.payload, EventPayload::Correction { policy: p, .. } if p == policy)
    }
}

/// Append-only log of a session's events plus the rolls they reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    entries: Vec<EventLogEntry>,
    rolls: BTreeMap<RollId, RollRecord>,
}

impl EventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return its id. Rolls already in the table are not duplicated.
    pub fn append(
        &mut self,
        actor: impl Into<String>,
        event: NewEvent,
        injected: bool,
        timestamp: DateTime<Utc>,
    ) -> EventId {
        let mut roll_ids = event.roll_ids;
        for roll in event.rolls {
            let id = roll.roll_id;
            self.rolls.entry(id).or_insert(roll);
            if !roll_ids.contains(&id) {
                roll_ids.push(id);
            }
        }
        let id = EventId(self.entries.len() as u64 + 1);
        self.entries.push(EventLogEntry {
            id,
            timestamp,
            actor: actor.into(),
            payload: event.payload,
            roll_ids,
            injected,
        });
        id
    }

    /// All entries in append order.
    pub fn entries(&self) -> &[EventLogEntry] {
        &self.entries
    }

    /// The last `n` entries.
    pub fn tail(&self, n: usize) -> &[EventLogEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    /// Entries appended after `id`.
    pub fn since(&self, id: EventId) -> &[EventLogEntry] {
        let start = (id.0 as usize).min(self.entries.len());
        &self.entries[start..]
    }

    /// Id of the latest entry, or `EventId(0)` for an empty log.
    pub fn last_id(&self) -> EventId {
        EventId(self.entries.len() as u64)
    }

    /// Look up a roll referenced by the log.
    pub fn roll(&self, id: RollId) -> Option<&RollRecord> {
        self.rolls.get(&id)
    }

    /// Number of distinct rolls stored.
    pub fn roll_count(&self) -> usize {
        self.rolls.len()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the log as markdown.
    pub fn export_markdown(&self) -> String {
        let mut out = String::from("# Session Log\n\n");
        for entry in &self.entries {
            let tag = if entry.injected { " *(injected)*" } else { "" };
            match &entry.payload {
                EventPayload::Note { text, .. } => {
                    out.push_str(&format!("{} **{}**: {text}{tag}\n", entry.id, entry.actor));
                }
                EventPayload::ToolResult { tool, summary, .. } => {
                    out.push_str(&format!("{} `{tool}` {summary}{tag}\n", entry.id));
                }
                EventPayload::Correction { policy, detail } => {
                    out.push_str(&format!("{} *[{policy}]* {detail}{tag}\n", entry.id));
                }
                EventPayload::GameOver { outcome, summary } => {
                    out.push_str(&format!("{} **GAME OVER: {outcome}** {summary}{tag}\n", entry.id));
                }
                EventPayload::Stopped { reason } => {
                    out.push_str(&format!("{} **STOPPED** {reason}{tag}\n", entry.id));
                }
            }
            for roll_id in &entry.roll_ids {
                if let Some(roll) = self.rolls.get(roll_id) {
                    out.push_str(&format!("  - {} rolls {}\n", roll.actor, roll));
                }
            }
        }
        out
    }
}
