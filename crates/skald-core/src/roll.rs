use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Globally unique identifier of a roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RollId(pub Uuid);

impl RollId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RollId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RollId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The immutable outcome of one dice roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollRecord {
    /// Unique id, referenced by event log entries.
    pub roll_id: RollId,
    /// Canonical notation actually rolled (e.g. "2d6+3").
    pub notation: String,
    /// The notation as the caller supplied it.
    pub requested: String,
    /// Number of dice rolled.
    pub count: u32,
    /// Sides per die.
    pub die_size: u32,
    /// Raw die results, in roll order.
    pub dice: Vec<u32>,
    /// Flat modifier added to the sum.
    pub modifier: i64,
    /// Sum of dice plus modifier.
    pub total: i64,
    /// Natural 20 on a single d20.
    pub nat20: bool,
    /// Natural 1 on a single d20.
    pub nat1: bool,
    /// True when the requested notation was unusable and 1d20 was rolled instead.
    #[serde(default)]
    pub notation_fallback: bool,
    /// Why the requested notation was rejected, when it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    /// Who asked for the roll.
    pub actor: String,
    /// What the roll is for.
    pub purpose: String,
    /// When the dice were rolled.
    pub timestamp: DateTime<Utc>,
}

impl std::fmt::Display for RollRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let values: Vec<String> = self.dice.iter().map(|d| d.to_string()).collect();
        write!(f, "{}: [{}]", self.notation, values.join(", "))?;
        match self.modifier {
            0 => {}
            m if m > 0 => write!(f, " + {m}")?,
            m => write!(f, " - {}", -m)?,
        }
        write!(f, " = {}", self.total)?;
        if self.nat20 {
            write!(f, " (natural 20)")?;
        } else if self.nat1 {
            write!(f, " (natural 1)")?;
        }
        Ok(())
    }
}
