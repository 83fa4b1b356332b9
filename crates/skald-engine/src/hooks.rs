//! Supervisory policies run after every narrator turn.
//!
//! Each [`Policy`] looks at a read-only [`HookContext`] and may ask for one
//! [`Correction`]. The [`HookLayer`] applies corrections through an injected
//! narrator [`ToolClient`], so every fix shows up in the event log tagged
//! `injected`, and re-reads state before the next policy runs.

use skald_core::{
    EndVerdict, EngineError, EngineResult, EventId, EventLogEntry, EventPayload, GameResult, GameSession,
    NewEvent, Outcome, ToolName,
};
use skald_tools::ToolClient;

use crate::config::EngineConfig;

/// Name of the policy that injects `advance_turn`.
pub const ADVANCE_TURN: &str = "advance_turn";
/// Name of the policy that nudges stalled combat.
pub const COMBAT_RESOLUTION: &str = "combat_resolution";
/// Name of the policy that records end-condition verdicts.
pub const END_CONDITIONS: &str = "end_conditions";
/// Name of the policy that enforces the round cap.
pub const ROUND_LIMIT: &str = "round_limit";

/// Summary recorded when the round cap is exceeded.
pub const ROUND_LIMIT_SUMMARY: &str = "round limit exceeded";

/// What a policy sees.
#[derive(Debug)]
pub struct HookContext<'a> {
    /// The current session.
    pub session: &'a GameSession,
    /// Events appended during the narrator turn, within the lookback window.
    pub turn_events: &'a [EventLogEntry],
    /// The last `lookback` events.
    pub recent: &'a [EventLogEntry],
    /// The end-condition verdict for `session`.
    pub verdict: Option<&'a EndVerdict>,
    /// The round cap.
    pub max_rounds: u32,
}

/// A corrective action.
#[derive(Debug, Clone, PartialEq)]
pub enum Correction {
    /// Move initiative on.
    AdvanceTurn,
    /// Record a "resolve outstanding combat" marker.
    CombatMarker {
        /// Enemies still standing.
        enemies: Vec<String>,
    },
    /// Record the terminal result.
    SetResult {
        /// Victory or defeat.
        outcome: Outcome,
        /// Why.
        summary: String,
    },
}

/// A trigger and the correction it asks for.
///
/// Policies must be idempotent: once their correction has been applied, the
/// next evaluation against the new state asks for nothing.
pub trait Policy: Send + Sync + std::fmt::Debug {
    /// Stable name, recorded on correction events.
    fn name(&self) -> &'static str;

    /// The correction to apply, if the trigger holds.
    fn evaluate(&self, ctx: &HookContext<'_>) -> Option<Correction>;
}

/// Inject `advance_turn` when the narrator turn did not advance.
#[derive(Debug, Default)]
pub struct AdvanceTurnPolicy;

impl Policy for AdvanceTurnPolicy {
    fn name(&self) -> &'static str {
        ADVANCE_TURN
    }

    fn evaluate(&self, ctx: &HookContext<'_>) -> Option<Correction> {
        let advanced = ctx.turn_events.iter().any(|e| e.is_tool(ToolName::AdvanceTurn));
        (ctx.session.is_running() && !advanced).then_some(Correction::AdvanceTurn)
    }
}

/// Nudge the narrator when enemies stand but nobody has been hurt or healed lately.
#[derive(Debug, Default)]
pub struct CombatResolutionPolicy;

impl Policy for CombatResolutionPolicy {
    fn name(&self) -> &'static str {
        COMBAT_RESOLUTION
    }

    fn evaluate(&self, ctx: &HookContext<'_>) -> Option<Correction> {
        let enemies: Vec<String> = ctx.session.alive_enemies().map(|e| e.name.clone()).collect();
        if !ctx.session.is_running() || enemies.is_empty() {
            return None;
        }
        let active = ctx
            .recent
            .iter()
            .any(|e| e.is_hp_change() || e.is_correction(COMBAT_RESOLUTION));
        (!active).then_some(Correction::CombatMarker { enemies })
    }
}

/// Record the verdict of the session's end condition.
#[derive(Debug, Default)]
pub struct EndConditionsPolicy;

impl Policy for EndConditionsPolicy {
    fn name(&self) -> &'static str {
        END_CONDITIONS
    }

    fn evaluate(&self, ctx: &HookContext<'_>) -> Option<Correction> {
        if ctx.session.result.is_some() {
            return None;
        }
        ctx.verdict.map(|v| Correction::SetResult {
            outcome: v.outcome,
            summary: v.summary.clone(),
        })
    }
}

/// Declare a defeat once the round cap is passed.
#[derive(Debug, Default)]
pub struct RoundLimitPolicy;

impl Policy for RoundLimitPolicy {
    fn name(&self) -> &'static str {
        ROUND_LIMIT
    }

    fn evaluate(&self, ctx: &HookContext<'_>) -> Option<Correction> {
        (ctx.session.result.is_none() && ctx.session.is_running() && ctx.session.round > ctx.max_rounds).then(|| {
            Correction::SetResult {
                outcome: Outcome::Defeat,
                summary: ROUND_LIMIT_SUMMARY.to_string(),
            }
        })
    }
}

/// A correction that was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// The policy that asked for it.
    pub policy: &'static str,
    /// What was done.
    pub correction: Correction,
}

/// What one pass of the hook layer did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookReport {
    /// Corrections in the order they were applied.
    pub applied: Vec<Applied>,
    /// The terminal result, once one is recorded.
    pub result: Option<GameResult>,
}

impl HookReport {
    /// Whether the named policy fired.
    pub fn fired(&self, policy: &str) -> bool {
        self.applied.iter().any(|a| a.policy == policy)
    }
}

/// The ordered policy table.
#[derive(Debug)]
pub struct HookLayer {
    policies: Vec<Box<dyn Policy>>,
    lookback: usize,
    max_rounds: u32,
}

impl HookLayer {
    /// The four standard policies: advance, combat, end conditions, round cap.
    pub fn standard(config: &EngineConfig) -> Self {
        Self::empty(config)
            .with_policy(AdvanceTurnPolicy)
            .with_policy(CombatResolutionPolicy)
            .with_policy(EndConditionsPolicy)
            .with_policy(RoundLimitPolicy)
    }

    /// A layer with no policies.
    pub fn empty(config: &EngineConfig) -> Self {
        Self {
            policies: Vec::new(),
            lookback: config.lookback.max(1),
            max_rounds: config.max_rounds,
        }
    }

    /// Append a policy; policies run in registration order.
    pub fn with_policy(mut self, policy: impl Policy + 'static) -> Self {
        self.policies.push(Box::new(policy));
        self
    }

    /// Names of the registered policies.
    pub fn names(&self) -> Vec<&'static str> {
        self.policies.iter().map(|p| p.name()).collect()
    }

    /// Evaluate every policy after a narrator turn that began after event
    /// `turn_start`, applying corrections through `injected`.
    pub fn run(&self, injected: &ToolClient, turn_start: EventId) -> EngineResult<HookReport> {
        let mut report = HookReport::default();
        for policy in &self.policies {
            let session = injected.state()?;
            if session.is_ended() {
                report.result = session.result.clone();
                break;
            }
            let recent = injected.recent_events(self.lookback)?;
            let turn_events: Vec<EventLogEntry> = recent.iter().filter(|e| e.id > turn_start).cloned().collect();
            let verdict = injected.check_end_conditions()?;
            let ctx = HookContext {
                session: &session,
                turn_events: &turn_events,
                recent: &recent,
                verdict: verdict.as_ref(),
                max_rounds: self.max_rounds,
            };
            let Some(correction) = policy.evaluate(&ctx) else {
                continue;
            };
            tracing::info!(policy = policy.name(), ?correction, session = %session.id, "injecting correction");
            if let Some(result) = apply(injected, policy.name(), &correction)? {
                report.result = Some(result);
            }
            report.applied.push(Applied {
                policy: policy.name(),
                correction,
            });
        }
        Ok(report)
    }
}

fn apply(injected: &ToolClient, policy: &str, correction: &Correction) -> EngineResult<Option<GameResult>> {
    match correction {
        Correction::AdvanceTurn => {
            injected.advance_turn()?;
            Ok(None)
        }
        Correction::CombatMarker { enemies } => {
            let detail = format!("resolve outstanding combat: {} still standing", enemies.join(", "));
            injected.append_event(NewEvent::new(EventPayload::correction(policy, detail)))?;
            Ok(None)
        }
        Correction::SetResult { outcome, summary } => injected.set_game_result(*outcome, summary).map(Some),
    }
}

/// Run a versioned write, re-reading and retrying on version conflicts up
/// to `retries` times.
pub fn with_conflict_retry<T>(
    retries: u32,
    mut attempt: impl FnMut() -> EngineResult<T>,
) -> EngineResult<T> {
    let mut tries = 0;
    loop {
        match attempt() {
            Err(EngineError::Conflict { expected, current }) if tries < retries => {
                tries += 1;
                tracing::warn!(expected, current, attempt = tries, "version conflict, retrying");
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use skald_core::{Caller, Combatant, GameConfig, SessionId};
    use skald_mechanics::DiceRoller;
    use skald_store::{HpRequest, StateStore};
    use skald_tools::{Gateway, ToolDispatch};

    use super::*;

    struct Table {
        dm: ToolClient,
        injected: ToolClient,
    }

    fn table(max_rounds: u32) -> (Table, HookLayer) {
        let gateway: Arc<dyn ToolDispatch> =
            Arc::new(Gateway::new(Arc::new(StateStore::in_memory()), DiceRoller::seeded(3)));
        let dm = ToolClient::new(Arc::clone(&gateway), Caller::narrator("DungeonMaster"));
        let config = GameConfig {
            id: "hooks".into(),
            initiative_order: vec!["DungeonMaster".into(), "Thorin".into()],
            party: vec![Combatant::new("Thorin", 28)],
            enemies: vec![Combatant::new("Skeleton Guard 1", 13)],
            end_condition: skald_core::EndCondition::boss("Skeleton Guard 1", 0),
            ..GameConfig::default()
        };
        dm.call(skald_tools::ToolCall::InitGame(Box::new(config))).unwrap();
        let id = SessionId::from("hooks");
        let injected = ToolClient::new(gateway, Caller::injected("DungeonMaster")).with_session(id.clone());
        let layer = HookLayer::standard(&EngineConfig::default().with_max_rounds(max_rounds));
        (
            Table {
                dm: dm.with_session(id),
                injected,
            },
            layer,
        )
    }

    fn last_id(client: &ToolClient) -> EventId {
        client.recent_events(1).unwrap().last().map_or(EventId(0), |e| e.id)
    }

    #[test]
    fn missing_advance_is_injected_once() {
        let (t, layer) = table(100);
        let start = last_id(&t.dm);
        let report = layer.run(&t.injected, start).unwrap();
        assert!(report.fired(ADVANCE_TURN));
        let s = t.dm.state().unwrap();
        assert_eq!(s.next_actor, "Thorin");
        let advance = t
            .dm
            .recent_events(10)
            .unwrap()
            .into_iter()
            .find(|e| e.is_tool(ToolName::AdvanceTurn))
            .unwrap();
        assert!(advance.injected);
    }

    #[test]
    fn narrator_advance_is_respected() {
        let (t, layer) = table(100);
        let start = last_id(&t.dm);
        t.dm.advance_turn().unwrap();
        let report = layer.run(&t.injected, start).unwrap();
        assert!(!report.fired(ADVANCE_TURN));
        assert_eq!(t.dm.state().unwrap().next_actor, "Thorin");
    }

    #[test]
    fn combat_marker_is_idempotent() {
        let (t, layer) = table(100);
        let first = layer.run(&t.injected, last_id(&t.dm)).unwrap();
        assert!(first.fired(COMBAT_RESOLUTION));
        let second = layer.run(&t.injected, last_id(&t.dm)).unwrap();
        assert!(!second.fired(COMBAT_RESOLUTION));
        let markers = t
            .dm
            .recent_events(100)
            .unwrap()
            .iter()
            .filter(|e| e.is_correction(COMBAT_RESOLUTION))
            .count();
        assert_eq!(markers, 1);
    }

    #[test]
    fn recent_damage_suppresses_the_marker() {
        let (t, layer) = table(100);
        t.dm.apply_damage(HpRequest::new("Skeleton Guard 1", 3)).unwrap();
        let report = layer.run(&t.injected, last_id(&t.dm)).unwrap();
        assert!(!report.fired(COMBAT_RESOLUTION));
    }

    #[test]
    fn verdicts_are_recorded() {
        let (t, layer) = table(100);
        t.dm.apply_damage(HpRequest::new("Skeleton Guard 1", 13)).unwrap();
        let report = layer.run(&t.injected, last_id(&t.dm)).unwrap();
        assert!(report.fired(END_CONDITIONS));
        assert_eq!(report.result.map(|r| r.outcome), Some(Outcome::Victory));
        assert!(t.dm.state().unwrap().is_ended());
    }

    #[test]
    fn round_cap_forces_defeat() {
        let (t, layer) = table(1);
        t.dm.advance_turn().unwrap();
        t.dm.advance_turn().unwrap();
        assert_eq!(t.dm.state().unwrap().round, 2);
        let report = layer.run(&t.injected, last_id(&t.dm)).unwrap();
        let result = report.result.as_ref().unwrap();
        assert_eq!(result.outcome, Outcome::Defeat);
        assert_eq!(result.summary, ROUND_LIMIT_SUMMARY);
        assert!(report.fired(ROUND_LIMIT));
    }

    #[test]
    fn ended_sessions_stop_the_pass() {
        let (t, layer) = table(100);
        t.dm.set_game_result(Outcome::Victory, "done").unwrap();
        let report = layer.run(&t.injected, last_id(&t.dm)).unwrap();
        assert!(report.applied.is_empty());
        assert_eq!(report.result.map(|r| r.summary), Some("done".to_string()));
    }

    #[test]
    fn conflicts_are_retried_within_budget() {
        let mut calls = 0;
        let result = with_conflict_retry(3, || {
            calls += 1;
            if calls < 3 {
                Err(EngineError::Conflict { expected: 1, current: 2 })
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);

        let mut tries = 0;
        let exhausted: EngineResult<()> = with_conflict_retry(2, || {
            tries += 1;
            Err(EngineError::Conflict { expected: 1, current: 2 })
        });
        assert!(exhausted.unwrap_err().is_retryable());
        assert_eq!(tries, 3);

        let mut once = 0;
        let other: EngineResult<()> = with_conflict_retry(5, || {
            once += 1;
            Err(EngineError::Validation("bad".into()))
        });
        assert!(other.is_err());
        assert_eq!(once, 1);
    }

    #[test]
    fn standard_table_order() {
        let layer = HookLayer::standard(&EngineConfig::default());
        assert_eq!(layer.names(), vec![ADVANCE_TURN, COMBAT_RESOLUTION, END_CONDITIONS, ROUND_LIMIT]);
    }
}
