//! Turning notation into roll records.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use skald_core::{RollId, RollRecord};

use super::source::{DieSource, FixedDice, SeededDice};
use super::{Die, Notation, parse_notation};

fn default_notation() -> String {
    "1d20".to_string()
}

/// One entry of a batch roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollRequest {
    /// Dice notation; defaults to `1d20`.
    #[serde(default = "default_notation")]
    pub notation: String,
    /// What the roll is for.
    #[serde(default)]
    pub purpose: String,
    /// Who rolls.
    #[serde(default)]
    pub actor: String,
}

impl RollRequest {
    /// Build a request.
    pub fn new(notation: impl Into<String>, purpose: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            notation: notation.into(),
            purpose: purpose.into(),
            actor: actor.into(),
        }
    }
}

/// Rolls dice from a pluggable [`DieSource`].
pub struct DiceRoller {
    source: Box<dyn DieSource>,
}

impl DiceRoller {
    /// Roll from the given source.
    pub fn new(source: impl DieSource + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }

    /// Roll from a `StdRng` seeded with `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self::new(SeededDice::new(seed))
    }

    /// Roll from an unseeded `StdRng`.
    pub fn from_entropy() -> Self {
        Self::new(SeededDice::from_entropy())
    }

    /// Roll a scripted sequence of faces.
    pub fn fixed(values: Vec<u32>) -> Self {
        Self::new(FixedDice::new(values))
    }

    /// Roll `notation`. Unusable notation rolls `1d20` and is flagged.
    pub fn roll(&mut self, notation: &str, purpose: &str, actor: &str) -> RollRecord {
        let (parsed, fallback_reason) = match parse_notation(notation) {
            Ok(parsed) => (parsed, None),
            Err(err) => {
                tracing::warn!(notation, %err, "unusable dice notation, rolling 1d20");
                (Notation::FALLBACK, Some(err.to_string()))
            }
        };
        let dice: Vec<u32> = (0..parsed.count)
            .map(|_| self.source.roll_die(parsed.die.sides()))
            .collect();
        let sum: i64 = dice.iter().map(|&d| i64::from(d)).sum();
        let total = sum.saturating_add(parsed.modifier);
        let single_d20 = parsed.count == 1 && parsed.die == Die::D20;
        let record = RollRecord {
            roll_id: RollId::new(),
            notation: parsed.to_string(),
            requested: notation.to_string(),
            count: parsed.count,
            die_size: parsed.die.sides(),
            nat20: single_d20 && dice[0] == 20,
            nat1: single_d20 && dice[0] == 1,
            dice,
            modifier: parsed.modifier,
            total,
            notation_fallback: fallback_reason.is_some(),
            fallback_reason,
            actor: actor.to_string(),
            purpose: purpose.to_string(),
            timestamp: Utc::now(),
        };
        tracing::debug!(roll = %record, actor, purpose, "rolled");
        record
    }

    /// Roll each request independently.
    pub fn batch_roll(&mut self, requests: &[RollRequest]) -> Vec<RollRecord> {
        requests
            .iter()
            .map(|r| self.roll(&r.notation, &r.purpose, &r.actor))
            .collect()
    }
}
