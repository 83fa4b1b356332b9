use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use skald_core::{Combatant, EndCondition, GameConfig};

use crate::error::{RunError, RunResult};
use crate::preset;

/// One scene of an adventure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSpec {
    /// Scene title.
    pub title: String,
    /// Enemies placed when the scene opens, unless the narrator already set some.
    #[serde(default)]
    pub enemies: Vec<Combatant>,
}

impl SceneSpec {
    /// A scene without default enemies.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            enemies: Vec::new(),
        }
    }

    /// Set the default enemies.
    pub fn with_enemies(mut self, enemies: Vec<Combatant>) -> Self {
        self.enemies = enemies;
        self
    }
}

/// The content a session is initialized from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdventureSpec {
    /// Adventure name, used for the default session id.
    pub name: String,
    /// The party.
    pub party: Vec<Combatant>,
    /// Turn rotation, narrator included.
    pub initiative_order: Vec<String>,
    /// Scenes in order; scene ids index this list.
    pub scenes: Vec<SceneSpec>,
    /// How the session is decided.
    #[serde(default)]
    pub end_condition: EndCondition,
}

impl Default for AdventureSpec {
    fn default() -> Self {
        preset::crypt_of_the_shadow_lord()
    }
}

impl AdventureSpec {
    /// Scene `id`, if configured.
    pub fn scene(&self, id: u32) -> Option<&SceneSpec> {
        self.scenes.get(usize::try_from(id).ok()?)
    }

    /// The `init_game` configuration for a new session.
    pub fn game_config(&self, id: &str, narrator: &str) -> GameConfig {
        let opening = self.scene(0);
        GameConfig {
            id: id.to_string(),
            narrator: narrator.to_string(),
            scene_id: 0,
            scene_title: opening.map(|s| s.title.clone()).unwrap_or_default(),
            initiative_order: self.initiative_order.clone(),
            party: self.party.clone(),
            enemies: opening.map(|s| s.enemies.clone()).unwrap_or_default(),
            end_condition: self.end_condition.clone(),
            ..GameConfig::default()
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Configuration for an engine run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// RNG seed for reproducible dice.
    pub seed: u64,
    /// Actor id of the narrator.
    pub narrator: String,
    /// Rounds per scene before a scene change is forced.
    pub scene_threshold: u32,
    /// Rounds after which the session is lost.
    pub max_rounds: u32,
    /// How long an actor may take for one turn.
    #[serde(rename = "turn_timeout_ms", with = "millis")]
    pub turn_timeout: Duration,
    /// Consecutive invalid actions tolerated per actor.
    pub max_invalid_actions: u32,
    /// Events inspected by the supervisory hooks.
    pub lookback: usize,
    /// Retries of a corrective write that hit a version conflict.
    pub max_conflict_retries: u32,
    /// Turns after which the runner gives up.
    pub max_turns: u64,
    /// The adventure to play.
    pub adventure: AdventureSpec,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            narrator: "DungeonMaster".to_string(),
            scene_threshold: 8,
            max_rounds: 100,
            turn_timeout: Duration::from_secs(30),
            max_invalid_actions: 3,
            lookback: 10,
            max_conflict_retries: 3,
            max_turns: 20_000,
            adventure: AdventureSpec::default(),
        }
    }
}

impl EngineConfig {
    /// Set the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the narrator's actor id.
    pub fn with_narrator(mut self, narrator: impl Into<String>) -> Self {
        self.narrator = narrator.into();
        self
    }

    /// Set the rounds per scene before a forced scene change.
    pub fn with_scene_threshold(mut self, rounds: u32) -> Self {
        self.scene_threshold = rounds;
        self
    }

    /// Set the round cap.
    pub fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = rounds;
        self
    }

    /// Set the per-turn timeout.
    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = timeout;
        self
    }

    /// Set the consecutive invalid action cap.
    pub fn with_max_invalid_actions(mut self, max: u32) -> Self {
        self.max_invalid_actions = max;
        self
    }

    /// Set the hook lookback window.
    pub fn with_lookback(mut self, events: usize) -> Self {
        self.lookback = events;
        self
    }

    /// Set the conflict retry budget.
    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    /// Set the turn cap.
    pub fn with_max_turns(mut self, turns: u64) -> Self {
        self.max_turns = turns;
        self
    }

    /// Set the adventure.
    pub fn with_adventure(mut self, adventure: AdventureSpec) -> Self {
        self.adventure = adventure;
        self
    }

    /// Reject settings the runner cannot work with.
    pub fn validate(&self) -> RunResult<()> {
        let problem = if self.narrator.trim().is_empty() {
            Some("narrator must not be empty")
        } else if self.scene_threshold == 0 {
            Some("scene_threshold must be at least 1")
        } else if self.max_rounds == 0 {
            Some("max_rounds must be at least 1")
        } else if self.turn_timeout.is_zero() {
            Some("turn_timeout_ms must be positive")
        } else if self.lookback == 0 {
            Some("lookback must be at least 1")
        } else if self.max_turns == 0 {
            Some("max_turns must be at least 1")
        } else if self.adventure.scenes.is_empty() {
            Some("the adventure needs at least one scene")
        } else if !self.adventure.initiative_order.iter().any(|a| *a == self.narrator) {
            Some("the initiative order must include the narrator")
        } else {
            None
        };
        match problem {
            Some(reason) => Err(RunError::Config(reason.to_string())),
            None => Ok(()),
        }
    }

    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json(json: &str) -> RunResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| RunError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn load(path: &Path) -> RunResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| RunError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.seed, 42);
        assert_eq!(config.narrator, "DungeonMaster");
        assert_eq!(config.scene_threshold, 8);
        assert_eq!(config.max_rounds, 100);
        assert_eq!(config.turn_timeout, Duration::from_secs(30));
        assert_eq!(config.max_invalid_actions, 3);
        assert_eq!(config.lookback, 10);
        assert_eq!(config.adventure.scenes.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_chain() {
        let config = EngineConfig::default()
            .with_seed(7)
            .with_max_rounds(12)
            .with_turn_timeout(Duration::from_millis(250))
            .with_lookback(4);
        assert_eq!(config.seed, 7);
        assert_eq!(config.max_rounds, 12);
        assert_eq!(config.turn_timeout, Duration::from_millis(250));
        assert_eq!(config.lookback, 4);
    }

    #[test]
    fn json_fields_default_and_durations_are_millis() {
        let config = EngineConfig::from_json(r#"{"seed": 9, "turn_timeout_ms": 1500}"#).unwrap();
        assert_eq!(config.seed, 9);
        assert_eq!(config.turn_timeout, Duration::from_millis(1500));
        assert_eq!(config.max_rounds, 100);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["turn_timeout_ms"], 1500);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        assert!(matches!(
            EngineConfig::from_json(r#"{"scene_threshold": 0}"#),
            Err(RunError::Config(_))
        ));
        assert!(EngineConfig::from_json("{").is_err());
        let no_narrator = EngineConfig::default().with_narrator("Nobody");
        assert!(no_narrator.validate().is_err());
    }

    #[test]
    fn game_config_opens_the_first_scene() {
        let adventure = AdventureSpec::default();
        let config = adventure.game_config("crypt-1", "DungeonMaster");
        assert_eq!(config.id, "crypt-1");
        assert_eq!(config.scene_title, "The Village of Millhaven");
        assert!(config.enemies.is_empty());
        assert_eq!(config.party.len(), 4);
        assert!(config.validate().is_ok());
    }
}
