//! Declarative end conditions.

use serde::{Deserialize, Serialize};

use crate::session::{GameSession, Outcome};

/// How victory is decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VictoryCondition {
    /// A named enemy must be on the roster and down, at or after `min_scene`.
    BossDefeated {
        /// Name or id of the boss.
        boss: String,
        /// Earliest scene in which victory can be declared.
        #[serde(default)]
        min_scene: u32,
    },
    /// A non-empty enemy roster must be entirely down, at or after `min_scene`.
    AllEnemiesDefeated {
        /// Earliest scene in which victory can be declared.
        #[serde(default)]
        min_scene: u32,
    },
    /// Victory is only ever recorded explicitly by the narrator.
    Never,
}

fn yes() -> bool {
    true
}

/// When a session ends on its own.
///
/// A party wipe is checked first, so a simultaneous wipe and boss kill is a
/// defeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndCondition {
    /// Defeat once every party member is down.
    #[serde(default = "yes")]
    pub defeat_on_party_down: bool,
    /// The victory rule.
    #[serde(default = "EndCondition::default_victory")]
    pub victory: VictoryCondition,
}

impl Default for EndCondition {
    fn default() -> Self {
        Self {
            defeat_on_party_down: true,
            victory: Self::default_victory(),
        }
    }
}

impl EndCondition {
    fn default_victory() -> VictoryCondition {
        VictoryCondition::Never
    }

    /// Victory on defeating `boss` from scene `min_scene` on.
    pub fn boss(boss: impl Into<String>, min_scene: u32) -> Self {
        Self {
            defeat_on_party_down: true,
            victory: VictoryCondition::BossDefeated {
                boss: boss.into(),
                min_scene,
            },
        }
    }

    /// Evaluate against a session snapshot. Pure.
    pub fn evaluate(&self, session: &GameSession) -> Option<EndVerdict> {
        if self.defeat_on_party_down
            && !session.party.is_empty()
            && session.alive_party().next().is_none()
        {
            return Some(EndVerdict {
                outcome: Outcome::Defeat,
                summary: "The whole party has fallen.".to_string(),
            });
        }
        match &self.victory {
            VictoryCondition::BossDefeated { boss, min_scene } => {
                if session.scene_id < *min_scene {
                    return None;
                }
                let fallen = session
                    .enemies
                    .iter()
                    .find(|e| e.matches(boss))
                    .is_some_and(|e| !e.is_alive());
                fallen.then(|| EndVerdict {
                    outcome: Outcome::Victory,
                    summary: format!("{boss} has been defeated."),
                })
            }
            VictoryCondition::AllEnemiesDefeated { min_scene } => {
                let cleared = session.scene_id >= *min_scene
                    && !session.enemies.is_empty()
                    && session.alive_enemies().next().is_none();
                cleared.then(|| EndVerdict {
                    outcome: Outcome::Victory,
                    summary: "Every enemy has been defeated.".to_string(),
                })
            }
            VictoryCondition::Never => None,
        }
    }
}

/// The decision reached by an end condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndVerdict {
    /// Victory or defeat.
    pub outcome: Outcome,
    /// Why.
    pub summary: String,
}
