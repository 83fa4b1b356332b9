//! Caller roles and the closed set of tool names.

use serde::{Deserialize, Serialize};

/// The authority level of a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The sole write-authorized actor.
    Narrator,
    /// A read-only actor that may roll dice.
    Participant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Narrator => write!(f, "narrator"),
            Self::Participant => write!(f, "participant"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "narrator" | "dm" | "dungeon_master" => Ok(Self::Narrator),
            "participant" | "player" => Ok(Self::Participant),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Who is making a call, as seen by the gateway and recorded by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Actor id (e.g. "DungeonMaster", "Thorin").
    pub name: String,
    /// The caller's role.
    pub role: Role,
    /// True when the engine issues the call on the narrator's behalf.
    pub injected: bool,
}

impl Caller {
    /// A narrator-issued call.
    pub fn narrator(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: Role::Narrator,
            injected: false,
        }
    }

    /// A participant-issued call.
    pub fn participant(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: Role::Participant,
            injected: false,
        }
    }

    /// A correction injected by the engine, carrying narrator authority.
    pub fn injected(narrator: impl Into<String>) -> Self {
        Self {
            name: narrator.into(),
            role: Role::Narrator,
            injected: true,
        }
    }

    /// The engine recording an action declared by `actor`.
    ///
    /// The resulting event names `actor` and is tagged injected; the write
    /// itself carries the engine's narrator authority, never the actor's.
    pub fn recorded_for(actor: impl Into<String>) -> Self {
        Self::injected(actor)
    }
}

/// Every tool exposed to actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    /// Roll dice from notation.
    Roll,
    /// Check dice notation without rolling.
    ValidateNotation,
    /// Roll several independent requests.
    BatchRoll,
    /// Evaluate a restricted arithmetic expression.
    EvalExpr,
    /// Compare a value against a target.
    CheckThreshold,
    /// Attribute score to modifier.
    ComputeModifier,
    /// Sum damage parts plus a bonus.
    SumDamage,
    /// Read a full session snapshot.
    GetState,
    /// Read the context for one actor's turn.
    GetTurnContext,
    /// Read the tail of the event log.
    GetRecentEvents,
    /// Create a session.
    InitGame,
    /// Apply a versioned partial update.
    ApplyPatch,
    /// Append an event to the log.
    AppendEvent,
    /// Move to the next actor in initiative.
    AdvanceTurn,
    /// Change the current scene.
    SetScene,
    /// Replace the enemy roster.
    SetEnemies,
    /// Reduce a combatant's hit points.
    ApplyDamage,
    /// Restore a combatant's hit points.
    ApplyHeal,
    /// Record the terminal result.
    SetGameResult,
    /// Evaluate the end condition.
    CheckEndConditions,
}

impl ToolName {
    /// All tools, in table order.
    pub const ALL: [ToolName; 20] = [
        Self::Roll,
        Self::ValidateNotation,
        Self::BatchRoll,
        Self::EvalExpr,
        Self::CheckThreshold,
        Self::ComputeModifier,
        Self::SumDamage,
        Self::GetState,
        Self::GetTurnContext,
        Self::GetRecentEvents,
        Self::InitGame,
        Self::ApplyPatch,
        Self::AppendEvent,
        Self::AdvanceTurn,
        Self::SetScene,
        Self::SetEnemies,
        Self::ApplyDamage,
        Self::ApplyHeal,
        Self::SetGameResult,
        Self::CheckEndConditions,
    ];

    /// The wire name of the tool.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Roll => "roll",
            Self::ValidateNotation => "validate_notation",
            Self::BatchRoll => "batch_roll",
            Self::EvalExpr => "eval_expr",
            Self::CheckThreshold => "check_threshold",
            Self::ComputeModifier => "compute_modifier",
            Self::SumDamage => "sum_damage",
            Self::GetState => "get_state",
            Self::GetTurnContext => "get_turn_context",
            Self::GetRecentEvents => "get_recent_events",
            Self::InitGame => "init_game",
            Self::ApplyPatch => "apply_patch",
            Self::AppendEvent => "append_event",
            Self::AdvanceTurn => "advance_turn",
            Self::SetScene => "set_scene",
            Self::SetEnemies => "set_enemies",
            Self::ApplyDamage => "apply_damage",
            Self::ApplyHeal => "apply_heal",
            Self::SetGameResult => "set_game_result",
            Self::CheckEndConditions => "check_end_conditions",
        }
    }

    /// Whether the tool mutates session state.
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Self::InitGame
                | Self::ApplyPatch
                | Self::AppendEvent
                | Self::AdvanceTurn
                | Self::SetScene
                | Self::SetEnemies
                | Self::ApplyDamage
                | Self::ApplyHeal
                | Self::SetGameResult
        )
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ToolName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|tool| tool.as_str() == wanted)
            .ok_or_else(|| format!("unknown tool: {wanted}"))
    }
}
