//! Versioned partial updates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::combatant::Combatant;
use crate::session::{FlagValue, GameSession, validate_order, validate_rosters};

/// A partial update of a session, applied whole or not at all.
///
/// `expected_version` must equal the stored `state_version`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Patch {
    /// The version the writer read.
    pub expected_version: u64,
    /// New scene index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<u32>,
    /// New scene title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_title: Option<String>,
    /// New round.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
    /// New turn index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_index: Option<usize>,
    /// New initiative order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiative_order: Option<Vec<String>>,
    /// New next actor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_actor: Option<String>,
    /// Replacement party roster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party: Option<Vec<Combatant>>,
    /// Replacement enemy roster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enemies: Option<Vec<Combatant>>,
    /// Flags to set.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub set_flags: BTreeMap<String, FlagValue>,
    /// Flags to remove.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_flags: Vec<String>,
}

impl Patch {
    /// An empty patch against `expected_version`.
    pub fn new(expected_version: u64) -> Self {
        Self {
            expected_version,
            ..Self::default()
        }
    }

    /// Set a flag.
    pub fn with_flag(mut self, name: impl Into<String>, value: FlagValue) -> Self {
        self.set_flags.insert(name.into(), value);
        self
    }

    /// Remove a flag.
    pub fn without_flag(mut self, name: impl Into<String>) -> Self {
        self.remove_flags.push(name.into());
        self
    }

    /// Set the round.
    pub fn with_round(mut self, round: u32) -> Self {
        self.round = Some(round);
        self
    }

    /// Set the next actor.
    pub fn with_next_actor(mut self, actor: impl Into<String>) -> Self {
        self.next_actor = Some(actor.into());
        self
    }

    /// Replace the enemy roster.
    pub fn with_enemies(mut self, enemies: Vec<Combatant>) -> Self {
        self.enemies = Some(enemies);
        self
    }

    /// Names of the fields this patch changes.
    pub fn changed_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        let named = [
            ("scene_id", self.scene_id.is_some()),
            ("scene_title", self.scene_title.is_some()),
            ("round", self.round.is_some()),
            ("turn_index", self.turn_index.is_some()),
            ("initiative_order", self.initiative_order.is_some()),
            ("next_actor", self.next_actor.is_some()),
            ("party", self.party.is_some()),
            ("enemies", self.enemies.is_some()),
        ];
        for (name, changed) in named {
            if changed {
                fields.push(name.to_string());
            }
        }
        fields.extend(self.set_flags.keys().map(|k| format!("flags.{k}")));
        fields.extend(self.remove_flags.iter().map(|k| format!("-flags.{k}")));
        fields
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    /// Produce the patched session, or a reason the patch is invalid.
    ///
    /// Versions are not checked or bumped here.
    pub fn apply_to(&self, session: &GameSession) -> Result<GameSession, String> {
        if self.is_empty() {
            return Err("patch changes nothing".to_string());
        }
        let mut next = session.clone();
        if let Some(scene) = self.scene_id {
            next.scene_id = scene;
        }
        if let Some(title) = &self.scene_title {
            next.scene_title = title.clone();
        }
        if let Some(round) = self.round {
            if round == 0 {
                return Err("round must be at least 1".to_string());
            }
            next.round = round;
        }
        if let Some(order) = &self.initiative_order {
            validate_order(order)?;
            next.initiative_order = order.clone();
            if next.turn_index >= order.len() {
                next.turn_index = 0;
            }
        }
        if let Some(index) = self.turn_index {
            if !next.initiative_order.is_empty() && index >= next.initiative_order.len() {
                return Err(format!(
                    "turn_index {index} out of range for {} actors",
                    next.initiative_order.len()
                ));
            }
            next.turn_index = index;
        }
        if let Some(actor) = &self.next_actor {
            if !next.knows_actor(actor) {
                return Err(format!("unknown next_actor: {actor}"));
            }
            next.next_actor = actor.clone();
        }
        if let Some(party) = &self.party {
            next.party = party.clone();
        }
        if let Some(enemies) = &self.enemies {
            next.enemies = enemies.clone();
        }
        next.party.iter_mut().chain(next.enemies.iter_mut()).for_each(Combatant::normalize);
        validate_rosters(&next.party, &next.enemies)?;
        for name in &self.remove_flags {
            next.flags.remove(name);
        }
        for (name, value) in &self.set_flags {
            if name.trim().is_empty() {
                return Err("flag name must not be empty".to_string());
            }
            next.flags.insert(name.clone(), value.clone());
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::GameConfig;

    fn session() -> GameSession {
        let config = GameConfig {
            initiative_order: vec!["DungeonMaster".into(), "Thorin".into()],
            party: vec![Combatant::new("Thorin", 28)],
            ..GameConfig::default()
        };
        GameSession::new("g".into(), config, chrono::Utc::now())
    }

    #[test]
    fn applies_fields_and_flags() {
        let s = session();
        let patch = Patch::new(0)
            .with_round(3)
            .with_next_actor("Thorin")
            .with_flag("door_open", FlagValue::Bool(true));
        let next = patch.apply_to(&s).unwrap();
        assert_eq!(next.round, 3);
        assert_eq!(next.next_actor, "Thorin");
        assert_eq!(next.flags["door_open"], FlagValue::Bool(true));
        assert_eq!(next.state_version, s.state_version);
    }

    #[test]
    fn invalid_patch_is_rejected_whole() {
        let s = session();
        let patch = Patch::new(0).with_round(4).with_next_actor("Mordred");
        assert!(patch.apply_to(&s).is_err());
        assert!(Patch::new(0).with_round(0).apply_to(&s).is_err());
    }

    #[test]
    fn empty_patch_is_invalid() {
        assert!(Patch::new(0).apply_to(&session()).is_err());
    }

    #[test]
    fn shrinking_order_resets_turn_index() {
        let mut s = session();
        s.turn_index = 1;
        let patch = Patch {
            initiative_order: Some(vec!["DungeonMaster".into()]),
            ..Patch::new(0)
        };
        assert_eq!(patch.apply_to(&s).unwrap().turn_index, 0);
        let bad = Patch {
            turn_index: Some(5),
            ..Patch::new(0)
        };
        assert!(bad.apply_to(&s).is_err());
    }

    #[test]
    fn roster_replacement_is_validated() {
        let s = session();
        let mut broken = Combatant::new("Ghoul", 10);
        broken.current_hp = 11;
        assert!(Patch::new(0).with_enemies(vec![broken]).apply_to(&s).is_err());
        let ok = Patch::new(0).with_enemies(vec![Combatant::new("Ghoul", 10)]);
        assert_eq!(ok.apply_to(&s).unwrap().enemies[0].id, "ghoul");
    }

    #[test]
    fn changed_fields_lists_flags() {
        let patch = Patch::new(2)
            .with_round(2)
            .with_flag("a", FlagValue::Int(1))
            .without_flag("b");
        assert_eq!(patch.changed_fields(), vec!["round", "flags.a", "-flags.b"]);
    }
}
