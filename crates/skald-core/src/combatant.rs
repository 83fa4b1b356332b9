//! Party members and enemies.

use std::collections::{BTreeMap, BTreeSet};

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// Which roster a combatant belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The adventuring party.
    Party,
    /// The opposition.
    Enemies,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Party => write!(f, "party"),
            Self::Enemies => write!(f, "enemies"),
        }
    }
}

fn default_ac() -> u32 {
    10
}

fn default_damage() -> String {
    "1d4".to_string()
}

/// A party member or an enemy.
///
/// Hit points are kept within `0..=max_hp`; a combatant is alive while
/// `current_hp > 0`. Serialized snapshots carry that as a derived `alive`
/// field, which is ignored on input.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Combatant {
    /// Stable identifier. Derived from the name when left empty.
    #[serde(default)]
    pub id: String,
    /// Display name, also used for targeting (case-insensitive).
    pub name: String,
    /// Current hit points.
    pub current_hp: u32,
    /// Maximum hit points.
    pub max_hp: u32,
    /// Armor class.
    #[serde(default = "default_ac", alias = "armor_class")]
    pub ac: u32,
    /// Status tags such as "poisoned" or "blessed".
    #[serde(default, alias = "conditions")]
    pub status_effects: BTreeSet<String>,
    /// Expendable resources (spell slots, potions, ...).
    #[serde(default)]
    pub resources: BTreeMap<String, i64>,
    /// Ability scores keyed by lowercase name.
    #[serde(default)]
    pub attributes: BTreeMap<String, i64>,
    /// Bonus added to attack rolls.
    #[serde(default)]
    pub attack_bonus: i64,
    /// Damage notation of the combatant's default attack.
    #[serde(default = "default_damage")]
    pub damage: String,
}

impl Combatant {
    /// Create a combatant at full health.
    pub fn new(name: impl Into<String>, max_hp: u32) -> Self {
        let name = name.into();
        Self {
            id: slug(&name),
            name,
            current_hp: max_hp,
            max_hp,
            ac: default_ac(),
            status_effects: BTreeSet::new(),
            resources: BTreeMap::new(),
            attributes: BTreeMap::new(),
            attack_bonus: 0,
            damage: default_damage(),
        }
    }

    /// Set the armor class.
    pub fn with_ac(mut self, ac: u32) -> Self {
        self.ac = ac;
        self
    }

    /// Set the default attack: bonus to hit and damage notation.
    pub fn with_attack(mut self, bonus: i64, damage: impl Into<String>) -> Self {
        self.attack_bonus = bonus;
        self.damage = damage.into();
        self
    }

    /// Set an ability score.
    pub fn with_attribute(mut self, name: &str, score: i64) -> Self {
        self.attributes.insert(name.to_lowercase(), score);
        self
    }

    /// Set a resource counter.
    pub fn with_resource(mut self, name: &str, amount: i64) -> Self {
        self.resources.insert(name.to_string(), amount);
        self
    }

    /// Rename, keeping the id in step with the new name.
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.id = slug(&self.name);
        self
    }

    /// Whether the combatant is still standing.
    pub fn is_alive(&self) -> bool {
        self.current_hp > 0
    }

    /// Whether `key` names this combatant by name or id (case-insensitive).
    pub fn matches(&self, key: &str) -> bool {
        let key = key.trim();
        self.name.eq_ignore_ascii_case(key) || (!self.id.is_empty() && self.id.eq_ignore_ascii_case(key))
    }

    /// Fill derived fields left blank by callers.
    pub fn normalize(&mut self) {
        if self.id.trim().is_empty() {
            self.id = slug(&self.name);
        }
    }

    /// Check the hit point invariant and required fields.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("combatant name must not be empty".to_string());
        }
        if self.max_hp == 0 {
            return Err(format!("{}: max_hp must be positive", self.name));
        }
        if self.current_hp > self.max_hp {
            return Err(format!(
                "{}: current_hp {} exceeds max_hp {}",
                self.name, self.current_hp, self.max_hp
            ));
        }
        Ok(())
    }

    /// Reduce hit points, clamping at zero.
    pub fn take_damage(&mut self, side: Side, amount: u32) -> HpChange {
        let before = self.current_hp;
        self.current_hp = self.current_hp.saturating_sub(amount);
        self.change(side, amount, before)
    }

    /// Restore hit points, clamping at `max_hp`.
    pub fn heal(&mut self, side: Side, amount: u32) -> HpChange {
        let before = self.current_hp;
        self.current_hp = self.current_hp.saturating_add(amount).min(self.max_hp);
        self.change(side, amount, before)
    }

    /// Score-derived modifier for an ability, or 0 when the score is unknown.
    pub fn modifier(&self, ability: &str) -> i64 {
        self.attributes
            .get(&ability.to_lowercase())
            .map(|score| (score - 10).div_euclid(2))
            .unwrap_or(0)
    }

    fn change(&self, side: Side, requested: u32, before: u32) -> HpChange {
        HpChange {
            target: self.name.clone(),
            side,
            requested,
            before,
            after: self.current_hp,
            max_hp: self.max_hp,
            alive: self.is_alive(),
        }
    }
}

impl Serialize for Combatant {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Combatant", 11)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("current_hp", &self.current_hp)?;
        s.serialize_field("max_hp", &self.max_hp)?;
        s.serialize_field("alive", &self.is_alive())?;
        s.serialize_field("ac", &self.ac)?;
        s.serialize_field("status_effects", &self.status_effects)?;
        s.serialize_field("resources", &self.resources)?;
        s.serialize_field("attributes", &self.attributes)?;
        s.serialize_field("attack_bonus", &self.attack_bonus)?;
        s.serialize_field("damage", &self.damage)?;
        s.end()
    }
}

/// The outcome of applying damage or healing to one combatant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HpChange {
    /// Name of the affected combatant.
    pub target: String,
    /// Roster the combatant belongs to.
    pub side: Side,
    /// Amount requested by the caller before clamping.
    pub requested: u32,
    /// Hit points before the change.
    pub before: u32,
    /// Hit points after the change.
    pub after: u32,
    /// Maximum hit points.
    pub max_hp: u32,
    /// Whether the combatant is alive afterwards.
    pub alive: bool,
}

impl HpChange {
    /// Signed difference actually applied.
    pub fn delta(&self) -> i64 {
        i64::from(self.after) - i64::from(self.before)
    }
}

impl std::fmt::Display for HpChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} -> {}/{} HP",
            self.target, self.before, self.after, self.max_hp
        )?;
        if !self.alive {
            write!(f, " (down)")?;
        }
        Ok(())
    }
}

/// Lowercase, dash-separated identifier derived from a display name.
pub fn slug(name: &str) -> String {
    name.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}
