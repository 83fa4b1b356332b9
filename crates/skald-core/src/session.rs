//! The game session aggregate.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::combatant::{Combatant, Side};
use crate::condition::EndCondition;

/// Identifier of a game session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Normalize a caller-supplied id: trims whitespace and one pair of
    /// surrounding quotes. Returns `None` when nothing is left.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut text = raw.trim();
        for quote in ['"', '\''] {
            if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
                text = text[1..text.len() - 1].trim();
            }
        }
        if text.is_empty() {
            None
        } else {
            Some(Self(text.to_string()))
        }
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self::parse(value).unwrap_or_else(|| Self("default".to_string()))
    }
}

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created but not yet started.
    Pending,
    /// Accepting turns and writes.
    #[default]
    Running,
    /// Terminated; only reads are accepted.
    Ended,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Ended => write!(f, "ended"),
        }
    }
}

/// Terminal outcome of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The party prevailed.
    #[serde(alias = "VICTORY")]
    Victory,
    /// The party lost, or the engine terminated the session.
    #[serde(alias = "DEFEAT")]
    Defeat,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Victory => write!(f, "victory"),
            Self::Defeat => write!(f, "defeat"),
        }
    }
}

impl std::str::FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "victory" | "win" => Ok(Self::Victory),
            "defeat" | "loss" => Ok(Self::Defeat),
            other => Err(format!("unknown result: {other}")),
        }
    }
}

/// The recorded end of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    /// Victory or defeat.
    pub outcome: Outcome,
    /// Why the session ended.
    pub summary: String,
    /// When the result was recorded.
    pub decided_at: DateTime<Utc>,
}

/// A scalar flag value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    /// A boolean flag.
    Bool(bool),
    /// An integer flag.
    Int(i64),
    /// A floating point flag.
    Float(f64),
    /// A text flag.
    Text(String),
}

impl FlagValue {
    /// Integer view of the flag, when it holds one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl std::fmt::Display for FlagValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

fn default_narrator() -> String {
    "DungeonMaster".to_string()
}

fn first_round() -> u32 {
    1
}

/// Parameters of `init_game`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Requested session id. A generated one is used when empty.
    #[serde(default, alias = "game_id")]
    pub id: String,
    /// Create the session as pending instead of running.
    #[serde(default)]
    pub start_pending: bool,
    /// Actor id of the narrator.
    #[serde(default = "default_narrator")]
    pub narrator: String,
    /// Initial scene index.
    #[serde(default)]
    pub scene_id: u32,
    /// Initial scene title.
    #[serde(default)]
    pub scene_title: String,
    /// Initial round (1-based).
    #[serde(default = "first_round")]
    pub round: u32,
    /// Turn rotation within a round.
    #[serde(default)]
    pub initiative_order: Vec<String>,
    /// The adventuring party.
    #[serde(default)]
    pub party: Vec<Combatant>,
    /// Initial enemies.
    #[serde(default)]
    pub enemies: Vec<Combatant>,
    /// Initial flags.
    #[serde(default)]
    pub flags: BTreeMap<String, FlagValue>,
    /// How the session is decided.
    #[serde(default)]
    pub end_condition: EndCondition,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            start_pending: false,
            narrator: default_narrator(),
            scene_id: 0,
            scene_title: String::new(),
            round: first_round(),
            initiative_order: Vec::new(),
            party: Vec::new(),
            enemies: Vec::new(),
            flags: BTreeMap::new(),
            end_condition: EndCondition::default(),
        }
    }
}

impl GameConfig {
    /// Check rosters and initiative order.
    pub fn validate(&self) -> Result<(), String> {
        if self.narrator.trim().is_empty() {
            return Err("narrator must not be empty".to_string());
        }
        validate_order(&self.initiative_order)?;
        validate_rosters(&self.party, &self.enemies)
    }
}

/// Reject blank or repeated actor ids.
pub fn validate_order(order: &[String]) -> Result<(), String> {
    for (i, actor) in order.iter().enumerate() {
        if actor.trim().is_empty() {
            return Err(format!("initiative_order[{i}] is blank"));
        }
        if order[..i].contains(actor) {
            return Err(format!("initiative_order lists {actor} twice"));
        }
    }
    Ok(())
}

/// Check every combatant and reject names shared across rosters.
pub fn validate_rosters(party: &[Combatant], enemies: &[Combatant]) -> Result<(), String> {
    let all: Vec<&Combatant> = party.iter().chain(enemies.iter()).collect();
    for (i, c) in all.iter().enumerate() {
        c.validate()?;
        if all[..i].iter().any(|other| other.name.eq_ignore_ascii_case(&c.name)) {
            return Err(format!("duplicate combatant name: {}", c.name));
        }
    }
    Ok(())
}

/// The versioned world document of one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    /// Session identity.
    pub id: SessionId,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Actor id of the narrator.
    pub narrator: String,
    /// Current scene index.
    pub scene_id: u32,
    /// Current scene title.
    pub scene_title: String,
    /// Current round (1-based).
    pub round: u32,
    /// Index into `initiative_order` of the actor on turn.
    pub turn_index: usize,
    /// Turn rotation within a round.
    pub initiative_order: Vec<String>,
    /// Actor expected to act next.
    pub next_actor: String,
    /// Actor whose turn was most recently advanced past.
    pub last_actor: Option<String>,
    /// The adventuring party.
    pub party: Vec<Combatant>,
    /// Current enemies.
    pub enemies: Vec<Combatant>,
    /// Terminal result, once recorded.
    pub result: Option<GameResult>,
    /// Incremented by exactly one on every structural write.
    pub state_version: u64,
    /// Free-form scalar flags.
    pub flags: BTreeMap<String, FlagValue>,
    /// How the session is decided.
    pub end_condition: EndCondition,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the latest write.
    pub updated_at: DateTime<Utc>,
}

impl GameSession {
    /// Build a fresh session at version 0.
    pub fn new(id: SessionId, config: GameConfig, now: DateTime<Utc>) -> Self {
        let mut party = config.party;
        let mut enemies = config.enemies;
        party.iter_mut().chain(enemies.iter_mut()).for_each(Combatant::normalize);
        let next_actor = config
            .initiative_order
            .first()
            .cloned()
            .unwrap_or_else(|| config.narrator.clone());
        Self {
            id,
            status: if config.start_pending {
                SessionStatus::Pending
            } else {
                SessionStatus::Running
            },
            narrator: config.narrator,
            scene_id: config.scene_id,
            scene_title: config.scene_title,
            round: config.round.max(1),
            turn_index: 0,
            initiative_order: config.initiative_order,
            next_actor,
            last_actor: None,
            party,
            enemies,
            result: None,
            state_version: 0,
            flags: config.flags,
            end_condition: config.end_condition,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether turns and events are accepted.
    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    /// Whether the session has ended (with or without a result).
    pub fn is_ended(&self) -> bool {
        self.status == SessionStatus::Ended
    }

    /// Locate a combatant by name or id, party first.
    pub fn find_combatant(&self, key: &str) -> Option<(Side, usize)> {
        if let Some(i) = self.party.iter().position(|c| c.matches(key)) {
            return Some((Side::Party, i));
        }
        self.enemies
            .iter()
            .position(|c| c.matches(key))
            .map(|i| (Side::Enemies, i))
    }

    /// The roster for one side.
    pub fn roster(&self, side: Side) -> &[Combatant] {
        match side {
            Side::Party => &self.party,
            Side::Enemies => &self.enemies,
        }
    }

    /// Mutable roster for one side.
    pub fn roster_mut(&mut self, side: Side) -> &mut Vec<Combatant> {
        match side {
            Side::Party => &mut self.party,
            Side::Enemies => &mut self.enemies,
        }
    }

    /// Party members still standing.
    pub fn alive_party(&self) -> impl Iterator<Item = &Combatant> {
        self.party.iter().filter(|c| c.is_alive())
    }

    /// Enemies still standing.
    pub fn alive_enemies(&self) -> impl Iterator<Item = &Combatant> {
        self.enemies.iter().filter(|c| c.is_alive())
    }

    /// Whether `actor` appears in the initiative order or is the narrator.
    pub fn knows_actor(&self, actor: &str) -> bool {
        actor == self.narrator || self.initiative_order.iter().any(|a| a == actor)
    }

    /// Integer flag value, or 0 when unset.
    pub fn int_flag(&self, name: &str) -> i64 {
        self.flags.get(name).and_then(FlagValue::as_int).unwrap_or(0)
    }
}
