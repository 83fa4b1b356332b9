//! The turn state machine.
//!
//! The controller never decides narrative sequencing itself: after a
//! narrator turn it follows the stored `next_actor`, and after a participant
//! turn it always hands control back to the narrator. What it does own is
//! the phase bookkeeping and the scene pacing rules.

use skald_core::{EngineError, EngineResult, GameSession};
use skald_store::ENEMIES_SCENE_FLAG;

use crate::config::{AdventureSpec, EngineConfig};

/// Where the session is in its turn cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnPhase {
    /// A scene has just opened.
    SceneOpen {
        /// The scene index.
        scene: u32,
    },
    /// The narrator is acting.
    NarratorTurn,
    /// A participant is acting.
    ParticipantTurn(String),
    /// The initiative order wrapped.
    RoundAdvance {
        /// The new round.
        round: u32,
    },
    /// The scene is changing.
    SceneAdvance {
        /// The scene being entered.
        scene: u32,
    },
    /// A terminal state was reached.
    GameOver,
}

impl std::fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SceneOpen { scene } => write!(f, "scene {scene} open"),
            Self::NarratorTurn => write!(f, "narrator turn"),
            Self::ParticipantTurn(actor) => write!(f, "{actor}'s turn"),
            Self::RoundAdvance { round } => write!(f, "round {round}"),
            Self::SceneAdvance { scene } => write!(f, "advancing to scene {scene}"),
            Self::GameOver => write!(f, "game over"),
        }
    }
}

impl TurnPhase {
    /// Whether `next` may follow `self`.
    pub fn can_transition(&self, next: &TurnPhase) -> bool {
        use TurnPhase::*;
        match (self, next) {
            (GameOver, _) => false,
            (_, GameOver) => true,
            (SceneOpen { .. }, NarratorTurn | ParticipantTurn(_) | RoundAdvance { .. }) => true,
            (NarratorTurn, NarratorTurn | ParticipantTurn(_) | RoundAdvance { .. } | SceneAdvance { .. }) => true,
            (ParticipantTurn(_), NarratorTurn | RoundAdvance { .. } | SceneAdvance { .. }) => true,
            (RoundAdvance { .. }, NarratorTurn | ParticipantTurn(_) | SceneAdvance { .. }) => true,
            (SceneAdvance { scene: entering }, SceneOpen { scene }) => entering == scene,
            _ => false,
        }
    }

    /// Move to `next`, or fail with a validation error.
    pub fn transition(&self, next: TurnPhase) -> EngineResult<TurnPhase> {
        if self.can_transition(&next) {
            Ok(next)
        } else {
            Err(EngineError::Validation(format!("illegal turn transition: {self} -> {next}")))
        }
    }
}

/// Who acts next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Speaker {
    /// The narrator.
    Narrator,
    /// A participant, by actor id.
    Participant(String),
}

impl Speaker {
    /// The phase in which this speaker acts.
    pub fn phase(&self) -> TurnPhase {
        match self {
            Self::Narrator => TurnPhase::NarratorTurn,
            Self::Participant(name) => TurnPhase::ParticipantTurn(name.clone()),
        }
    }
}

/// Tracks the phase and applies the pacing rules.
#[derive(Debug, Clone)]
pub struct TurnController {
    phase: TurnPhase,
    scene: u32,
    round: u32,
    scene_threshold: u32,
    scene_count: u32,
}

impl TurnController {
    /// A controller for a session currently at `session`'s scene and round.
    pub fn new(config: &EngineConfig, session: &GameSession) -> Self {
        Self {
            phase: TurnPhase::SceneOpen {
                scene: session.scene_id,
            },
            scene: session.scene_id,
            round: session.round,
            scene_threshold: config.scene_threshold.max(1),
            scene_count: u32::try_from(config.adventure.scenes.len()).unwrap_or(u32::MAX),
        }
    }

    /// The current phase.
    pub fn phase(&self) -> &TurnPhase {
        &self.phase
    }

    /// The scene the controller last observed.
    pub fn scene(&self) -> u32 {
        self.scene
    }

    fn step(&mut self, next: TurnPhase) -> EngineResult<()> {
        self.phase = self.phase.transition(next)?;
        tracing::debug!(phase = %self.phase, "turn phase");
        Ok(())
    }

    /// Who acts next. After a participant the narrator always reacts;
    /// otherwise the stored `next_actor` decides, and actors without a seat
    /// fall back to the narrator.
    pub fn next_speaker(&self, session: &GameSession, seated: impl Fn(&str) -> bool) -> Speaker {
        if matches!(self.phase, TurnPhase::ParticipantTurn(_)) {
            return Speaker::Narrator;
        }
        let next = session.next_actor.trim();
        if next == session.narrator {
            return Speaker::Narrator;
        }
        if session.knows_actor(next) && seated(next) {
            Speaker::Participant(next.to_string())
        } else {
            tracing::debug!(next_actor = next, "no seated actor, narrator speaks");
            Speaker::Narrator
        }
    }

    /// Record any scene or round change seen in `session`, then enter the
    /// speaker's phase.
    pub fn begin_turn(&mut self, session: &GameSession, speaker: &Speaker) -> EngineResult<()> {
        if session.scene_id != self.scene {
            self.step(TurnPhase::SceneAdvance {
                scene: session.scene_id,
            })?;
            self.step(TurnPhase::SceneOpen {
                scene: session.scene_id,
            })?;
            self.scene = session.scene_id;
        }
        if session.round > self.round {
            self.step(TurnPhase::RoundAdvance {
                round: session.round,
            })?;
            self.round = session.round;
        }
        self.step(speaker.phase())
    }

    /// Enter the terminal phase.
    pub fn finish(&mut self) -> EngineResult<()> {
        if self.phase == TurnPhase::GameOver {
            return Ok(());
        }
        self.step(TurnPhase::GameOver)
    }

    /// The scene to force, once the current one has run past its rounds
    /// and a further scene exists.
    pub fn scene_due(&self, session: &GameSession) -> Option<u32> {
        scene_due(session, self.scene_threshold, self.scene_count)
    }
}

/// `Some(next scene)` when `round > (scene_id + 1) * threshold` and a next scene exists.
pub fn scene_due(session: &GameSession, threshold: u32, scene_count: u32) -> Option<u32> {
    let limit = (session.scene_id.saturating_add(1)).saturating_mul(threshold);
    let next = session.scene_id.saturating_add(1);
    (session.round > limit && next < scene_count).then_some(next)
}

/// Whether the default enemies of `scene` should be placed: the scene has
/// some, and the narrator has not set enemies for it already.
pub fn needs_enemy_seed(session: &GameSession, adventure: &AdventureSpec, scene: u32) -> bool {
    let has_defaults = adventure.scene(scene).is_some_and(|s| !s.enemies.is_empty());
    let already_set = session.flags.contains_key(ENEMIES_SCENE_FLAG)
        && session.int_flag(ENEMIES_SCENE_FLAG) == i64::from(scene);
    has_defaults && !already_set
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use skald_core::FlagValue;

    use super::*;

    fn session() -> GameSession {
        let config = EngineConfig::default().adventure.game_config("t", "DungeonMaster");
        GameSession::new("t".into(), config, chrono::Utc::now())
    }

    #[test]
    fn legal_and_illegal_transitions() {
        let open = TurnPhase::SceneOpen { scene: 0 };
        assert!(open.can_transition(&TurnPhase::NarratorTurn));
        let thorin = TurnPhase::ParticipantTurn("Thorin".into());
        assert!(thorin.can_transition(&TurnPhase::NarratorTurn));
        assert!(!thorin.can_transition(&TurnPhase::ParticipantTurn("Elara".into())));
        assert!(!TurnPhase::SceneAdvance { scene: 1 }.can_transition(&TurnPhase::NarratorTurn));
        assert!(!TurnPhase::SceneAdvance { scene: 1 }.can_transition(&TurnPhase::SceneOpen { scene: 2 }));
        assert!(!TurnPhase::GameOver.can_transition(&TurnPhase::NarratorTurn));
        let err = TurnPhase::GameOver.transition(TurnPhase::NarratorTurn).unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn participants_always_hand_back_to_the_narrator() {
        let config = EngineConfig::default();
        let mut s = session();
        let mut controller = TurnController::new(&config, &s);
        s.next_actor = "Thorin".into();
        let speaker = controller.next_speaker(&s, |_| true);
        assert_eq!(speaker, Speaker::Participant("Thorin".into()));
        controller.begin_turn(&s, &speaker).unwrap();
        assert_eq!(controller.next_speaker(&s, |_| true), Speaker::Narrator);
    }

    #[test]
    fn unknown_or_unseated_actors_fall_back_to_the_narrator() {
        let config = EngineConfig::default();
        let mut s = session();
        let controller = TurnController::new(&config, &s);
        s.next_actor = "Mordred".into();
        assert_eq!(controller.next_speaker(&s, |_| true), Speaker::Narrator);
        s.next_actor = "Elara".into();
        assert_eq!(controller.next_speaker(&s, |name| name != "Elara"), Speaker::Narrator);
    }

    #[test]
    fn scene_and_round_changes_pass_through_their_phases() {
        let config = EngineConfig::default();
        let mut s = session();
        let mut controller = TurnController::new(&config, &s);
        controller.begin_turn(&s, &Speaker::Narrator).unwrap();
        s.scene_id = 1;
        s.round = 2;
        controller.begin_turn(&s, &Speaker::Narrator).unwrap();
        assert_eq!(controller.scene(), 1);
        assert_eq!(controller.phase(), &TurnPhase::NarratorTurn);
        controller.finish().unwrap();
        controller.finish().unwrap();
        assert!(controller.begin_turn(&s, &Speaker::Narrator).is_err());
    }

    #[test]
    fn scenes_are_forced_after_their_threshold() {
        let mut s = session();
        s.round = 8;
        assert_eq!(scene_due(&s, 8, 3), None);
        s.round = 9;
        assert_eq!(scene_due(&s, 8, 3), Some(1));
        s.scene_id = 2;
        s.round = 40;
        assert_eq!(scene_due(&s, 8, 3), None);
    }

    #[test]
    fn enemy_seeding_respects_the_narrator() {
        let adventure = EngineConfig::default().adventure;
        let mut s = session();
        assert!(!needs_enemy_seed(&s, &adventure, 0));
        assert!(needs_enemy_seed(&s, &adventure, 1));
        s.flags.insert(ENEMIES_SCENE_FLAG.into(), FlagValue::Int(1));
        assert!(!needs_enemy_seed(&s, &adventure, 1));
        assert!(needs_enemy_seed(&s, &adventure, 2));
    }

    proptest! {
        #[test]
        fn forced_scene_is_always_the_next_one(scene in 0u32..5, round in 1u32..200, threshold in 1u32..20) {
            let mut s = session();
            s.scene_id = scene;
            s.round = round;
            if let Some(next) = scene_due(&s, threshold, 3) {
                prop_assert_eq!(next, scene + 1);
                prop_assert!(round > (scene + 1) * threshold);
                prop_assert!(next < 3);
            }
        }
    }
}
