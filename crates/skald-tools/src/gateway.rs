//! The single entry point for tool calls.

use std::sync::Arc;

use parking_lot::Mutex;
use skald_core::{Caller, EngineResult, ToolName};
use skald_mechanics::{
    DiceRoller, check_threshold, compute_modifier, eval_expr, sum_damage, validate_notation,
};
use skald_store::SessionStore;

use crate::permission;
use crate::request::{ToolCall, ToolRequest};
use crate::response::ToolResponse;

/// Something that executes tool calls on behalf of a caller.
pub trait ToolDispatch: Send + Sync {
    /// Check permission, normalize and execute a wire request.
    fn dispatch(&self, caller: &Caller, request: ToolRequest) -> EngineResult<ToolResponse>;

    /// Check permission and execute an already-typed call.
    fn call(&self, caller: &Caller, call: ToolCall) -> EngineResult<ToolResponse>;
}

/// Routes tool calls to the dice roller, the calculator or the store.
///
/// Every call is checked against the permission table before its arguments
/// are normalized and before any store access.
pub struct Gateway<S> {
    store: Arc<S>,
    dice: Mutex<DiceRoller>,
}

impl<S: SessionStore> Gateway<S> {
    /// A gateway over `store` rolling with `dice`.
    pub fn new(store: Arc<S>, dice: DiceRoller) -> Self {
        Self {
            store,
            dice: Mutex::new(dice),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn execute(&self, caller: &Caller, call: ToolCall) -> EngineResult<ToolResponse> {
        let store = self.store.as_ref();
        let response = match call {
            ToolCall::Roll(req) => {
                ToolResponse::Roll(self.dice.lock().roll(&req.notation, &req.purpose, &req.actor))
            }
            ToolCall::ValidateNotation(notation) => ToolResponse::Notation(validate_notation(&notation)),
            ToolCall::BatchRoll(requests) => ToolResponse::Rolls(self.dice.lock().batch_roll(&requests)),
            ToolCall::EvalExpr(expression) => ToolResponse::Number(eval_expr(&expression)?),
            ToolCall::CheckThreshold {
                value,
                comparator,
                target,
            } => ToolResponse::Bool(check_threshold(value, comparator, target)),
            ToolCall::ComputeModifier(score) => ToolResponse::Integer(compute_modifier(score)),
            ToolCall::SumDamage { parts, bonus } => ToolResponse::Integer(sum_damage(&parts, bonus)),
            ToolCall::GetState(session) => ToolResponse::Session(Box::new(store.get_state(session.as_ref())?)),
            ToolCall::GetTurnContext { session, actor } => {
                ToolResponse::Context(Box::new(store.get_turn_context(session.as_ref(), &actor)?))
            }
            ToolCall::GetRecentEvents { session, limit } => {
                ToolResponse::Events(store.get_recent_events(session.as_ref(), limit)?)
            }
            ToolCall::InitGame(config) => ToolResponse::Session(Box::new(store.init_game(caller, *config)?)),
            ToolCall::ApplyPatch {
                session,
                patch,
                reason,
            } => ToolResponse::Version(store.apply_patch(caller, session.as_ref(), *patch, &reason)?),
            ToolCall::AppendEvent { session, event } => {
                ToolResponse::Event(store.append_event(caller, session.as_ref(), event)?)
            }
            ToolCall::AdvanceTurn(session) => {
                ToolResponse::Session(Box::new(store.advance_turn(caller, session.as_ref())?))
            }
            ToolCall::SetScene { session, change } => {
                ToolResponse::Session(Box::new(store.set_scene(caller, session.as_ref(), change)?))
            }
            ToolCall::SetEnemies {
                session,
                enemies,
                reason,
            } => ToolResponse::Session(Box::new(store.set_enemies(caller, session.as_ref(), enemies, &reason)?)),
            ToolCall::ApplyDamage { session, request } => {
                ToolResponse::Hp(store.apply_damage(caller, session.as_ref(), request)?)
            }
            ToolCall::ApplyHeal { session, request } => {
                ToolResponse::Hp(store.apply_heal(caller, session.as_ref(), request)?)
            }
            ToolCall::SetGameResult {
                session,
                outcome,
                summary,
            } => ToolResponse::Result(store.set_game_result(caller, session.as_ref(), outcome, &summary)?),
            ToolCall::CheckEndConditions(session) => {
                ToolResponse::Verdict(store.check_end_conditions(session.as_ref())?)
            }
        };
        Ok(response)
    }

    fn logged(&self, tool: ToolName, caller: &Caller, result: EngineResult<ToolResponse>) -> EngineResult<ToolResponse> {
        match &result {
            Ok(_) => tracing::debug!(%tool, caller = %caller.name, injected = caller.injected, "tool call ok"),
            Err(err) => tracing::info!(%tool, caller = %caller.name, code = err.code(), %err, "tool call failed"),
        }
        result
    }
}

impl<S: SessionStore> ToolDispatch for Gateway<S> {
    fn dispatch(&self, caller: &Caller, request: ToolRequest) -> EngineResult<ToolResponse> {
        let tool = request.tool();
        permission::check(tool, caller)?;
        let result = request.normalize(caller).and_then(|call| self.execute(caller, call));
        self.logged(tool, caller, result)
    }

    fn call(&self, caller: &Caller, call: ToolCall) -> EngineResult<ToolResponse> {
        let tool = call.tool();
        permission::check(tool, caller)?;
        let result = self.execute(caller, call);
        self.logged(tool, caller, result)
    }
}
