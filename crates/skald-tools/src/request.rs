//! Tool requests as actors send them, and their normalized form.
//!
//! [`ToolRequest`] accepts the loose argument shapes agents tend to produce
//! (quoted ids, `target` for `target_name`, signed amounts, numbers where
//! text is expected). [`ToolRequest::normalize`] turns it into a strictly
//! typed [`ToolCall`], and everything downstream only sees the latter.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use skald_core::{
    Caller, Combatant, EngineError, EngineResult, EventPayload, GameConfig, NewEvent, Outcome,
    Patch, RollId, RollRecord, SessionId, ToolName,
};
use skald_mechanics::{Comparator, RollRequest, calc::format_number};
use skald_store::{HpRequest, SceneChange};

/// Default number of events returned by `get_recent_events`.
pub const DEFAULT_EVENT_LIMIT: i64 = 10;

/// A number or a string, as agents send either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// An integer.
    Int(i64),
    /// A float.
    Float(f64),
    /// Text.
    Text(String),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Self::Int(n) => n.to_string(),
            Self::Float(x) => format_number(x),
            Self::Text(s) => s,
        }
    }

    fn magnitude(&self, field: &str) -> EngineResult<u32> {
        let value = match self {
            Self::Int(n) => *n,
            Self::Float(x) if x.is_finite() => x.trunc() as i64,
            Self::Float(_) => return Err(EngineError::Validation(format!("{field} must be finite"))),
            Self::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| EngineError::Validation(format!("{field} must be a whole number, got {s:?}")))?,
        };
        u32::try_from(value.unsigned_abs())
            .map_err(|_| EngineError::Validation(format!("{field} is out of range")))
    }
}

impl Default for Scalar {
    fn default() -> Self {
        Self::Int(0)
    }
}

/// Arguments naming an optional session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionArgs {
    /// Session id; blank or missing means the active session.
    #[serde(default, alias = "game_id", alias = "session_id")]
    pub session: Option<String>,
}

/// Arguments of `roll`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollArgs {
    /// Dice notation; blank means `1d20`.
    #[serde(default)]
    pub notation: String,
    /// What the roll is for.
    #[serde(default)]
    pub purpose: String,
    /// Who rolls; blank means the caller.
    #[serde(default)]
    pub actor: String,
}

/// Arguments of `validate_notation`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotationArgs {
    /// Dice notation.
    #[serde(default)]
    pub notation: String,
}

/// Arguments of `batch_roll`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchRollArgs {
    /// Independent roll requests.
    #[serde(default)]
    pub rolls: Vec<RollArgs>,
}

/// Arguments of `eval_expr`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExprArgs {
    /// The expression; numbers are accepted as-is.
    #[serde(default)]
    pub expression: Scalar,
}

/// Arguments of `check_threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdArgs {
    /// The value to test.
    pub value: f64,
    /// One of `>= > <= < ==`.
    pub comparator: String,
    /// The target to compare against.
    pub target: f64,
}

/// Arguments of `compute_modifier`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierArgs {
    /// Ability score.
    #[serde(alias = "score")]
    pub attribute: i64,
}

/// Arguments of `sum_damage`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SumDamageArgs {
    /// Damage parts.
    #[serde(default)]
    pub parts: Vec<i64>,
    /// Flat bonus.
    #[serde(default)]
    pub bonus: i64,
}

/// Arguments of `get_turn_context`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnContextArgs {
    /// Session id.
    #[serde(default, alias = "game_id", alias = "session_id")]
    pub session: Option<String>,
    /// Whose turn; blank means the caller.
    #[serde(default)]
    pub actor: String,
}

/// Arguments of `get_recent_events`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentEventsArgs {
    /// Session id.
    #[serde(default, alias = "game_id", alias = "session_id")]
    pub session: Option<String>,
    /// How many events; clamped by the store.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_EVENT_LIMIT
}

/// Arguments of `init_game`, wrapped or bare.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InitGameArgs {
    /// `{"game_config": {...}}`
    Wrapped {
        /// The configuration.
        game_config: Box<GameConfig>,
    },
    /// The configuration itself.
    Bare(Box<GameConfig>),
}

/// Arguments of `apply_patch`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatchArgs {
    /// Session id.
    #[serde(default, alias = "game_id", alias = "session_id")]
    pub session: Option<String>,
    /// The version the caller read; may also be given inside `patch`.
    #[serde(default)]
    pub expected_version: Option<u64>,
    /// The fields to change.
    #[serde(default)]
    pub patch: serde_json::Map<String, Value>,
    /// Why.
    #[serde(default)]
    pub reason: String,
}

/// An event argument: a typed payload, plain text, or loose fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventInput {
    /// A payload with a `type` tag.
    Payload(EventPayload),
    /// Narrative text.
    Text(String),
    /// Any other object; kept as note details.
    Fields(BTreeMap<String, Value>),
}

/// Structured details, or text kept under a `note` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailsInput {
    /// Structured fields.
    Map(BTreeMap<String, Value>),
    /// Free text.
    Text(String),
}

/// Arguments of `append_event`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppendEventArgs {
    /// Session id.
    #[serde(default, alias = "game_id", alias = "session_id")]
    pub session: Option<String>,
    /// The event.
    #[serde(default)]
    pub event: Option<EventInput>,
    /// Narrative text, when `event` is absent.
    #[serde(default, alias = "note", alias = "detail")]
    pub text: String,
    /// Extra details merged into a note.
    #[serde(default)]
    pub details: Option<DetailsInput>,
    /// Rolls backing the event.
    #[serde(default)]
    pub rolls: Vec<RollRecord>,
    /// Rolls already recorded.
    #[serde(default)]
    pub roll_ids: Vec<RollId>,
}

/// Arguments of `set_scene`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetSceneArgs {
    /// Session id.
    #[serde(default, alias = "game_id", alias = "session_id")]
    pub session: Option<String>,
    /// New scene index.
    #[serde(default)]
    pub scene_id: u32,
    /// New title.
    #[serde(default, alias = "scene_title")]
    pub title: String,
    /// Narration to record.
    #[serde(default)]
    pub narration: String,
    /// Who speaks first.
    #[serde(default)]
    pub next_actor: Option<String>,
}

/// Arguments of `set_enemies`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetEnemiesArgs {
    /// Session id.
    #[serde(default, alias = "game_id", alias = "session_id")]
    pub session: Option<String>,
    /// The new roster.
    #[serde(default)]
    pub enemies: Vec<Combatant>,
    /// Why.
    #[serde(default)]
    pub reason: String,
}

/// Arguments of `apply_damage` and `apply_heal`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HpArgs {
    /// Session id.
    #[serde(default, alias = "game_id", alias = "session_id")]
    pub session: Option<String>,
    /// The combatant.
    #[serde(default)]
    pub target_name: String,
    /// Accepted in place of `target_name`.
    #[serde(default)]
    pub target: String,
    /// Amount; the sign is ignored.
    #[serde(default)]
    pub amount: Scalar,
    /// Weapon, spell, ...
    #[serde(default)]
    pub source: String,
    /// Why.
    #[serde(default)]
    pub reason: String,
}

/// Arguments of `set_game_result`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameResultArgs {
    /// Session id.
    #[serde(default, alias = "game_id", alias = "session_id")]
    pub session: Option<String>,
    /// `victory` or `defeat`, any case.
    #[serde(default, alias = "outcome")]
    pub result: String,
    /// Why.
    #[serde(default)]
    pub summary: String,
}

/// A tool call on the wire: `{"name": ..., "arguments": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum ToolRequest {
    /// Roll dice.
    Roll(RollArgs),
    /// Check notation.
    ValidateNotation(NotationArgs),
    /// Roll several requests.
    BatchRoll(BatchRollArgs),
    /// Evaluate an expression.
    EvalExpr(ExprArgs),
    /// Compare against a target.
    CheckThreshold(ThresholdArgs),
    /// Score to modifier.
    ComputeModifier(ModifierArgs),
    /// Sum damage.
    SumDamage(SumDamageArgs),
    /// Read a session.
    GetState(SessionArgs),
    /// Read a turn context.
    GetTurnContext(TurnContextArgs),
    /// Read recent events.
    GetRecentEvents(RecentEventsArgs),
    /// Create a session.
    InitGame(InitGameArgs),
    /// Patch a session.
    ApplyPatch(PatchArgs),
    /// Append an event.
    AppendEvent(AppendEventArgs),
    /// Advance the turn.
    AdvanceTurn(SessionArgs),
    /// Change scene.
    SetScene(SetSceneArgs),
    /// Replace enemies.
    SetEnemies(SetEnemiesArgs),
    /// Damage a combatant.
    ApplyDamage(HpArgs),
    /// Heal a combatant.
    ApplyHeal(HpArgs),
    /// Record the result.
    SetGameResult(GameResultArgs),
    /// Evaluate the end condition.
    CheckEndConditions(SessionArgs),
}

/// A normalized, strictly typed tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    /// Roll dice.
    Roll(RollRequest),
    /// Check notation.
    ValidateNotation(String),
    /// Roll several requests.
    BatchRoll(Vec<RollRequest>),
    /// Evaluate an expression.
    EvalExpr(String),
    /// Compare `value` against `target`.
    CheckThreshold {
        /// The value.
        value: f64,
        /// The comparison.
        comparator: Comparator,
        /// The target.
        target: f64,
    },
    /// Score to modifier.
    ComputeModifier(i64),
    /// Sum damage.
    SumDamage {
        /// The parts.
        parts: Vec<i64>,
        /// The bonus.
        bonus: i64,
    },
    /// Read a session.
    GetState(Option<SessionId>),
    /// Read a turn context.
    GetTurnContext {
        /// The session.
        session: Option<SessionId>,
        /// Whose turn.
        actor: String,
    },
    /// Read recent events.
    GetRecentEvents {
        /// The session.
        session: Option<SessionId>,
        /// How many.
        limit: usize,
    },
    /// Create a session.
    InitGame(Box<GameConfig>),
    /// Patch a session.
    ApplyPatch {
        /// The session.
        session: Option<SessionId>,
        /// The patch.
        patch: Box<Patch>,
        /// Why.
        reason: String,
    },
    /// Append an event.
    AppendEvent {
        /// The session.
        session: Option<SessionId>,
        /// The event.
        event: NewEvent,
    },
    /// Advance the turn.
    AdvanceTurn(Option<SessionId>),
    /// Change scene.
    SetScene {
        /// The session.
        session: Option<SessionId>,
        /// The change.
        change: SceneChange,
    },
    /// Replace enemies.
    SetEnemies {
        /// The session.
        session: Option<SessionId>,
        /// The roster.
        enemies: Vec<Combatant>,
        /// Why.
        reason: String,
    },
    /// Damage a combatant.
    ApplyDamage {
        /// The session.
        session: Option<SessionId>,
        /// The request.
        request: HpRequest,
    },
    /// Heal a combatant.
    ApplyHeal {
        /// The session.
        session: Option<SessionId>,
        /// The request.
        request: HpRequest,
    },
    /// Record the result.
    SetGameResult {
        /// The session.
        session: Option<SessionId>,
        /// Victory or defeat.
        outcome: Outcome,
        /// Why.
        summary: String,
    },
    /// Evaluate the end condition.
    CheckEndConditions(Option<SessionId>),
}

impl ToolCall {
    /// The tool this call invokes.
    pub fn tool(&self) -> ToolName {
        match self {
            Self::Roll(_) => ToolName::Roll,
            Self::ValidateNotation(_) => ToolName::ValidateNotation,
            Self::BatchRoll(_) => ToolName::BatchRoll,
            Self::EvalExpr(_) => ToolName::EvalExpr,
            Self::CheckThreshold { .. } => ToolName::CheckThreshold,
            Self::ComputeModifier(_) => ToolName::ComputeModifier,
            Self::SumDamage { .. } => ToolName::SumDamage,
            Self::GetState(_) => ToolName::GetState,
            Self::GetTurnContext { .. } => ToolName::GetTurnContext,
            Self::GetRecentEvents { .. } => ToolName::GetRecentEvents,
            Self::InitGame(_) => ToolName::InitGame,
            Self::ApplyPatch { .. } => ToolName::ApplyPatch,
            Self::AppendEvent { .. } => ToolName::AppendEvent,
            Self::AdvanceTurn(_) => ToolName::AdvanceTurn,
            Self::SetScene { .. } => ToolName::SetScene,
            Self::SetEnemies { .. } => ToolName::SetEnemies,
            Self::ApplyDamage { .. } => ToolName::ApplyDamage,
            Self::ApplyHeal { .. } => ToolName::ApplyHeal,
            Self::SetGameResult { .. } => ToolName::SetGameResult,
            Self::CheckEndConditions(_) => ToolName::CheckEndConditions,
        }
    }
}

fn session_id(raw: Option<String>) -> Option<SessionId> {
    raw.as_deref().and_then(SessionId::parse)
}

fn roll_request(args: RollArgs, caller: &Caller) -> RollRequest {
    let notation = if args.notation.trim().is_empty() {
        "1d20".to_string()
    } else {
        args.notation
    };
    let actor = if args.actor.trim().is_empty() {
        caller.name.clone()
    } else {
        args.actor
    };
    RollRequest::new(notation, args.purpose, actor)
}

fn details_map(details: Option<DetailsInput>) -> BTreeMap<String, Value> {
    match details {
        Some(DetailsInput::Map(map)) => map,
        Some(DetailsInput::Text(text)) if !text.trim().is_empty() => {
            BTreeMap::from([("note".to_string(), Value::String(text))])
        }
        _ => BTreeMap::new(),
    }
}

fn event_from(args: AppendEventArgs) -> EngineResult<NewEvent> {
    let mut details = details_map(args.details);
    let payload = match args.event {
        Some(EventInput::Payload(payload)) => match payload {
            EventPayload::Note { .. } | EventPayload::Correction { .. } => payload,
            _ => {
                return Err(EngineError::Validation(
                    "append_event only records notes and corrections; use the dedicated tool".to_string(),
                ));
            }
        },
        Some(EventInput::Text(text)) if !text.trim().is_empty() => EventPayload::Note {
            text: text.trim().to_string(),
            details,
        },
        Some(EventInput::Fields(mut fields)) => {
            let text = ["text", "detail", "description", "summary"]
                .iter()
                .find_map(|key| fields.remove(*key))
                .map(|v| match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .unwrap_or_else(|| args.text.trim().to_string());
            details.extend(fields);
            if text.is_empty() && details.is_empty() {
                return Err(EngineError::Validation("event is empty".to_string()));
            }
            EventPayload::Note { text, details }
        }
        _ if !args.text.trim().is_empty() => EventPayload::Note {
            text: args.text.trim().to_string(),
            details,
        },
        _ => return Err(EngineError::Validation("event is empty".to_string())),
    };
    Ok(NewEvent {
        payload,
        rolls: args.rolls,
        roll_ids: args.roll_ids,
    })
}

fn patch_from(args: &PatchArgs) -> EngineResult<Patch> {
    let mut body = args.patch.clone();
    match (args.expected_version, body.contains_key("expected_version")) {
        (Some(version), _) => {
            body.insert("expected_version".to_string(), Value::from(version));
        }
        (None, true) => {}
        (None, false) => {
            return Err(EngineError::Validation(
                "apply_patch requires expected_version".to_string(),
            ));
        }
    }
    serde_json::from_value(Value::Object(body))
        .map_err(|e| EngineError::Validation(format!("invalid patch: {e}")))
}

impl ToolRequest {
    /// Parse a JSON tool call. A missing `arguments` object counts as empty.
    pub fn parse(json: &str) -> EngineResult<Self> {
        let mut value: Value = serde_json::from_str(json)
            .map_err(|e| EngineError::Validation(format!("malformed tool call: {e}")))?;
        Self::from_value_mut(&mut value)
    }

    /// Build a request from an already-parsed JSON value.
    pub fn from_value(mut value: Value) -> EngineResult<Self> {
        Self::from_value_mut(&mut value)
    }

    fn from_value_mut(value: &mut Value) -> EngineResult<Self> {
        let Some(object) = value.as_object_mut() else {
            return Err(EngineError::Validation("a tool call must be a JSON object".to_string()));
        };
        let name = object.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
        name.parse::<ToolName>().map_err(EngineError::Validation)?;
        match object.get("arguments") {
            None | Some(Value::Null) => {
                object.insert("arguments".to_string(), Value::Object(serde_json::Map::new()));
            }
            Some(_) => {}
        }
        serde_json::from_value(value.take())
            .map_err(|e| EngineError::Validation(format!("invalid arguments for {name}: {e}")))
    }

    /// The tool this request invokes.
    pub fn tool(&self) -> ToolName {
        match self {
            Self::Roll(_) => ToolName::Roll,
            Self::ValidateNotation(_) => ToolName::ValidateNotation,
            Self::BatchRoll(_) => ToolName::BatchRoll,
            Self::EvalExpr(_) => ToolName::EvalExpr,
            Self::CheckThreshold(_) => ToolName::CheckThreshold,
            Self::ComputeModifier(_) => ToolName::ComputeModifier,
            Self::SumDamage(_) => ToolName::SumDamage,
            Self::GetState(_) => ToolName::GetState,
            Self::GetTurnContext(_) => ToolName::GetTurnContext,
            Self::GetRecentEvents(_) => ToolName::GetRecentEvents,
            Self::InitGame(_) => ToolName::InitGame,
            Self::ApplyPatch(_) => ToolName::ApplyPatch,
            Self::AppendEvent(_) => ToolName::AppendEvent,
            Self::AdvanceTurn(_) => ToolName::AdvanceTurn,
            Self::SetScene(_) => ToolName::SetScene,
            Self::SetEnemies(_) => ToolName::SetEnemies,
            Self::ApplyDamage(_) => ToolName::ApplyDamage,
            Self::ApplyHeal(_) => ToolName::ApplyHeal,
            Self::SetGameResult(_) => ToolName::SetGameResult,
            Self::CheckEndConditions(_) => ToolName::CheckEndConditions,
        }
    }

    /// Resolve aliases and loose shapes into a typed call.
    pub fn normalize(self, caller: &Caller) -> EngineResult<ToolCall> {
        let call = match self {
            Self::Roll(args) => ToolCall::Roll(roll_request(args, caller)),
            Self::ValidateNotation(args) => ToolCall::ValidateNotation(args.notation),
            Self::BatchRoll(args) => {
                ToolCall::BatchRoll(args.rolls.into_iter().map(|r| roll_request(r, caller)).collect())
            }
            Self::EvalExpr(args) => ToolCall::EvalExpr(args.expression.into_text()),
            Self::CheckThreshold(args) => ToolCall::CheckThreshold {
                value: args.value,
                comparator: args.comparator.parse::<Comparator>()?,
                target: args.target,
            },
            Self::ComputeModifier(args) => ToolCall::ComputeModifier(args.attribute),
            Self::SumDamage(args) => ToolCall::SumDamage {
                parts: args.parts,
                bonus: args.bonus,
            },
            Self::GetState(args) => ToolCall::GetState(session_id(args.session)),
            Self::GetTurnContext(args) => ToolCall::GetTurnContext {
                session: session_id(args.session),
                actor: if args.actor.trim().is_empty() {
                    caller.name.clone()
                } else {
                    args.actor.trim().to_string()
                },
            },
            Self::GetRecentEvents(args) => ToolCall::GetRecentEvents {
                session: session_id(args.session),
                limit: usize::try_from(args.limit.max(1)).unwrap_or(1),
            },
            Self::InitGame(args) => ToolCall::InitGame(match args {
                InitGameArgs::Wrapped { game_config } => game_config,
                InitGameArgs::Bare(config) => config,
            }),
            Self::ApplyPatch(args) => {
                let patch = patch_from(&args)?;
                ToolCall::ApplyPatch {
                    session: session_id(args.session),
                    patch: Box::new(patch),
                    reason: args.reason,
                }
            }
            Self::AppendEvent(mut args) => {
                let session = session_id(args.session.take());
                ToolCall::AppendEvent {
                    session,
                    event: event_from(args)?,
                }
            }
            Self::AdvanceTurn(args) => ToolCall::AdvanceTurn(session_id(args.session)),
            Self::SetScene(args) => ToolCall::SetScene {
                session: session_id(args.session),
                change: SceneChange {
                    scene_id: args.scene_id,
                    title: args.title,
                    narration: args.narration,
                    next_actor: args.next_actor.filter(|a| !a.trim().is_empty()),
                },
            },
            Self::SetEnemies(args) => ToolCall::SetEnemies {
                session: session_id(args.session),
                enemies: args.enemies,
                reason: args.reason,
            },
            Self::ApplyDamage(args) => {
                let (session, request) = hp_request(args)?;
                ToolCall::ApplyDamage { session, request }
            }
            Self::ApplyHeal(args) => {
                let (session, request) = hp_request(args)?;
                ToolCall::ApplyHeal { session, request }
            }
            Self::SetGameResult(args) => ToolCall::SetGameResult {
                session: session_id(args.session),
                outcome: args.result.parse::<Outcome>().map_err(EngineError::Validation)?,
                summary: args.summary,
            },
            Self::CheckEndConditions(args) => ToolCall::CheckEndConditions(session_id(args.session)),
        };
        Ok(call)
    }
}

fn hp_request(args: HpArgs) -> EngineResult<(Option<SessionId>, HpRequest)> {
    let target = if args.target_name.trim().is_empty() {
        args.target.trim().to_string()
    } else {
        args.target_name.trim().to_string()
    };
    if target.is_empty() {
        return Err(EngineError::Validation("target_name is required".to_string()));
    }
    let request = HpRequest {
        target,
        amount: args.amount.magnitude("amount")?,
        source: args.source,
        reason: args.reason,
    };
    Ok((session_id(args.session), request))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(json: &str) -> EngineResult<ToolCall> {
        ToolRequest::parse(json)?.normalize(&Caller::narrator("DungeonMaster"))
    }

    #[test]
    fn parses_adjacently_tagged_calls() {
        let req = ToolRequest::parse(r#"{"name": "roll", "arguments": {"notation": "2d6+3"}}"#).unwrap();
        assert_eq!(req.tool(), ToolName::Roll);
        let call = req.normalize(&Caller::participant("Thorin")).unwrap();
        assert_eq!(call, ToolCall::Roll(RollRequest::new("2d6+3", "", "Thorin")));
    }

    #[test]
    fn missing_arguments_count_as_empty() {
        assert_eq!(
            normalize(r#"{"name": "advance_turn"}"#).unwrap(),
            ToolCall::AdvanceTurn(None)
        );
        assert_eq!(
            normalize(r#"{"name": "get_state", "arguments": null}"#).unwrap(),
            ToolCall::GetState(None)
        );
    }

    #[test]
    fn unknown_tools_and_bad_json_are_validation_errors() {
        assert_eq!(
            ToolRequest::parse(r#"{"name": "drop_tables"}"#).unwrap_err().code(),
            "validation_error"
        );
        assert!(ToolRequest::parse("not json").is_err());
        assert!(ToolRequest::parse("[1, 2]").is_err());
    }

    #[test]
    fn session_ids_are_normalized() {
        let call = normalize(r#"{"name": "get_state", "arguments": {"game_id": " 'abc' "}}"#).unwrap();
        assert_eq!(call, ToolCall::GetState(Some("abc".into())));
        let blank = normalize(r#"{"name": "get_state", "arguments": {"session": "  "}}"#).unwrap();
        assert_eq!(blank, ToolCall::GetState(None));
    }

    #[test]
    fn damage_accepts_target_alias_and_signed_amounts() {
        let call = normalize(
            r#"{"name": "apply_damage", "arguments": {"target": "Skeleton Guard 1", "amount": -7, "source": "Battleaxe"}}"#,
        )
        .unwrap();
        let ToolCall::ApplyDamage { request, .. } = call else {
            panic!("expected apply_damage");
        };
        assert_eq!(request.target, "Skeleton Guard 1");
        assert_eq!(request.amount, 7);
        let text = normalize(r#"{"name": "apply_heal", "arguments": {"target_name": "Elara", "amount": "5"}}"#).unwrap();
        assert!(matches!(text, ToolCall::ApplyHeal { request, .. } if request.amount == 5));
        assert!(normalize(r#"{"name": "apply_damage", "arguments": {"amount": 3}}"#).is_err());
    }

    #[test]
    fn roll_defaults() {
        let call = normalize(r#"{"name": "roll", "arguments": {"notation": "  "}}"#).unwrap();
        assert_eq!(call, ToolCall::Roll(RollRequest::new("1d20", "", "DungeonMaster")));
    }

    #[test]
    fn numeric_expressions_become_text() {
        assert_eq!(
            normalize(r#"{"name": "eval_expr", "arguments": {"expression": 12}}"#).unwrap(),
            ToolCall::EvalExpr("12".into())
        );
        assert_eq!(
            normalize(r#"{"name": "eval_expr", "arguments": {"expression": "(16-10)/2"}}"#).unwrap(),
            ToolCall::EvalExpr("(16-10)/2".into())
        );
    }

    #[test]
    fn threshold_comparator_is_checked() {
        assert!(normalize(r#"{"name": "check_threshold", "arguments": {"value": 15, "comparator": ">=", "target": 13}}"#).is_ok());
        let err = normalize(r#"{"name": "check_threshold", "arguments": {"value": 15, "comparator": "=>", "target": 13}}"#)
            .unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn event_shapes() {
        let text = normalize(r#"{"name": "append_event", "arguments": {"event": "The door opens."}}"#).unwrap();
        let ToolCall::AppendEvent { event, .. } = text else {
            panic!("expected append_event");
        };
        assert_eq!(event.payload, EventPayload::note("The door opens."));

        let fields = normalize(
            r#"{"name": "append_event", "arguments": {"event": {"detail": "Thorin attacks", "target": "Skeleton Guard 1"}}}"#,
        )
        .unwrap();
        let ToolCall::AppendEvent { event, .. } = fields else {
            panic!("expected append_event");
        };
        let EventPayload::Note { text, details } = event.payload else {
            panic!("expected a note");
        };
        assert_eq!(text, "Thorin attacks");
        assert_eq!(details["target"], "Skeleton Guard 1");

        let loose = normalize(r#"{"name": "append_event", "arguments": {"text": "Rest.", "details": "short rest"}}"#).unwrap();
        let ToolCall::AppendEvent { event, .. } = loose else {
            panic!("expected append_event");
        };
        assert!(matches!(event.payload, EventPayload::Note { ref details, .. } if details["note"] == "short rest"));

        assert!(normalize(r#"{"name": "append_event", "arguments": {}}"#).is_err());
        assert!(
            normalize(r#"{"name": "append_event", "arguments": {"event": {"type": "game_over", "outcome": "victory", "summary": "x"}}}"#)
                .is_err()
        );
    }

    #[test]
    fn patches_need_an_expected_version() {
        let ok = normalize(
            r#"{"name": "apply_patch", "arguments": {"expected_version": 3, "patch": {"round": 2}, "reason": "r"}}"#,
        )
        .unwrap();
        let ToolCall::ApplyPatch { patch, .. } = ok else {
            panic!("expected apply_patch");
        };
        assert_eq!(patch.expected_version, 3);
        assert_eq!(patch.round, Some(2));

        let inner = normalize(r#"{"name": "apply_patch", "arguments": {"patch": {"expected_version": 1, "scene_id": 1}}}"#);
        assert!(inner.is_ok());
        assert!(normalize(r#"{"name": "apply_patch", "arguments": {"patch": {"round": 2}}}"#).is_err());
        assert!(normalize(r#"{"name": "apply_patch", "arguments": {"expected_version": 0, "patch": {"hp": 2}}}"#).is_err());
    }

    #[test]
    fn init_game_accepts_wrapped_and_bare_configs() {
        let wrapped = normalize(r#"{"name": "init_game", "arguments": {"game_config": {"game_id": "g1"}}}"#).unwrap();
        assert!(matches!(wrapped, ToolCall::InitGame(c) if c.id == "g1"));
        let bare = normalize(r#"{"name": "init_game", "arguments": {"id": "g2", "round": 1}}"#).unwrap();
        assert!(matches!(bare, ToolCall::InitGame(c) if c.id == "g2"));
    }

    #[test]
    fn result_parsing_is_case_insensitive() {
        let call = normalize(r#"{"name": "set_game_result", "arguments": {"result": "VICTORY", "summary": "won"}}"#).unwrap();
        assert!(matches!(call, ToolCall::SetGameResult { outcome: Outcome::Victory, .. }));
        assert!(normalize(r#"{"name": "set_game_result", "arguments": {"result": "draw"}}"#).is_err());
    }

    #[test]
    fn recent_event_limits_default_and_floor() {
        assert_eq!(
            normalize(r#"{"name": "get_recent_events"}"#).unwrap(),
            ToolCall::GetRecentEvents { session: None, limit: 10 }
        );
        assert_eq!(
            normalize(r#"{"name": "get_recent_events", "arguments": {"limit": -4}}"#).unwrap(),
            ToolCall::GetRecentEvents { session: None, limit: 1 }
        );
    }
}
