//! Deterministic stand-ins for the narrator and the party.
//!
//! The scripted cast plays through an adventure using only the tool
//! surface, so every rule they rely on is enforced by the store. Their
//! randomness comes from the gateway's dice roller.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use skald_core::{Combatant, EngineError, EngineResult, EventId, EventLogEntry, EventPayload, TurnContext};
use skald_mechanics::Comparator;
use skald_store::{HpRequest, SceneChange};
use skald_tools::{ToolCall, ToolClient, ToolResponse};

use crate::config::AdventureSpec;
use crate::runner::{Actor, Declaration, TurnOutcome};

/// Intent recorded for an attack declaration.
pub const INTENT_ATTACK: &str = "attack";
/// Intent recorded for a heal declaration.
pub const INTENT_HEAL: &str = "heal";
/// Intent recorded when there is nothing to fight.
pub const INTENT_EXPLORE: &str = "explore";

#[derive(Debug, Default)]
struct Memory {
    scene: u32,
    entered_round: u32,
    resolved: Option<EventId>,
}

/// A narrator that resolves declarations, runs the enemies and moves the
/// party through the scenes once each is cleared.
#[derive(Debug)]
pub struct ScriptedNarrator {
    name: String,
    scenes: Vec<String>,
    passive: bool,
    memory: Mutex<Memory>,
}

impl ScriptedNarrator {
    /// An active narrator for `adventure`.
    pub fn new(name: &str, adventure: &AdventureSpec) -> Self {
        Self {
            name: name.to_string(),
            scenes: adventure.scenes.iter().map(|s| s.title.clone()).collect(),
            passive: false,
            memory: Mutex::new(Memory {
                entered_round: 1,
                ..Memory::default()
            }),
        }
    }

    /// A narrator that never makes a tool call, leaving everything to the
    /// supervisory hooks.
    pub fn passive(name: &str, adventure: &AdventureSpec) -> Self {
        Self {
            passive: true,
            ..Self::new(name, adventure)
        }
    }

    fn act(&self, tools: &ToolClient, ctx: &TurnContext) -> EngineResult<()> {
        {
            let mut memory = self.memory.lock();
            if memory.scene != ctx.scene_id {
                memory.scene = ctx.scene_id;
                memory.entered_round = ctx.round;
            }
        }
        if let Some(entry) = self.pending_declaration(ctx) {
            resolve(tools, ctx, &entry)?;
            self.memory.lock().resolved = Some(entry.id);
        }
        if ctx.turn_index == 0 {
            self.open_round(tools)?;
        }
        if tools.state()?.is_running() {
            tools.advance_turn()?;
        }
        Ok(())
    }

    /// The latest participant declaration not yet resolved.
    fn pending_declaration(&self, ctx: &TurnContext) -> Option<EventLogEntry> {
        let resolved = self.memory.lock().resolved;
        ctx.recent_events
            .iter()
            .rev()
            .find(|e| e.injected && e.actor != self.name && matches!(e.payload, EventPayload::Note { .. }))
            .filter(|e| resolved.is_none_or(|r| e.id > r))
            .cloned()
    }

    /// Enemies strike, then the scene moves on once it has been cleared.
    fn open_round(&self, tools: &ToolClient) -> EngineResult<()> {
        let state = tools.state()?;
        let enemies: Vec<Combatant> = state.alive_enemies().cloned().collect();
        for enemy in &enemies {
            let current = tools.state()?;
            let Some(target) = current.alive_party().max_by_key(|c| c.current_hp).cloned() else {
                break;
            };
            enemy_attack(tools, enemy, &target)?;
        }

        let state = tools.state()?;
        if !state.is_running() || state.alive_enemies().next().is_some() {
            return Ok(());
        }
        let entered = self.memory.lock().entered_round;
        let next = state.scene_id + 1;
        let Some(title) = self.scenes.get(next as usize) else {
            return Ok(());
        };
        if state.round > entered {
            tools.set_scene(SceneChange {
                scene_id: next,
                title: title.clone(),
                narration: format!("The party moves on to {title}."),
                next_actor: Some(self.name.clone()),
            })?;
            let mut memory = self.memory.lock();
            memory.scene = next;
            memory.entered_round = state.round;
        }
        Ok(())
    }
}

#[async_trait]
impl Actor for ScriptedNarrator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn take_turn(&self, tools: &ToolClient, context: TurnContext) -> TurnOutcome {
        if self.passive {
            return TurnOutcome::Passed;
        }
        match self.act(tools, &context) {
            Ok(()) => TurnOutcome::Acted,
            Err(err) => TurnOutcome::Invalid(err.to_string()),
        }
    }
}

fn detail_str<'a>(details: &'a BTreeMap<String, Value>, key: &str) -> Option<&'a str> {
    details.get(key).and_then(Value::as_str)
}

fn detail_int(details: &BTreeMap<String, Value>, key: &str) -> i64 {
    details.get(key).and_then(Value::as_i64).unwrap_or(0)
}

fn amount(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

fn hits(tools: &ToolClient, total: i64, ac: u32) -> EngineResult<bool> {
    let call = ToolCall::CheckThreshold {
        value: total as f64,
        comparator: Comparator::Ge,
        target: f64::from(ac),
    };
    match tools.call(call)? {
        ToolResponse::Bool(hit) => Ok(hit),
        other => Err(EngineError::FailSafe(format!("check_threshold returned {other:?}"))),
    }
}

/// Apply the effect a participant declared.
fn resolve(tools: &ToolClient, ctx: &TurnContext, entry: &EventLogEntry) -> EngineResult<()> {
    let EventPayload::Note { details, .. } = &entry.payload else {
        return Ok(());
    };
    let Some(target) = detail_str(details, "target") else {
        return Ok(());
    };
    match detail_str(details, "intent") {
        Some(INTENT_ATTACK) => {
            let Some(foe) = ctx.combatant(target).filter(|c| c.is_alive()) else {
                tools.append_note(&format!("{target} is already down."), BTreeMap::new(), Vec::new())?;
                return Ok(());
            };
            if hits(tools, detail_int(details, "attack_total"), foe.ac)? {
                let request = HpRequest::new(target, amount(detail_int(details, "damage_total")))
                    .with_source(detail_str(details, "weapon").unwrap_or("weapon"))
                    .with_reason(format!("{} hits", entry.actor));
                tools.apply_damage(request)?;
            } else {
                tools.append_note(&format!("{} misses {target}.", entry.actor), BTreeMap::new(), Vec::new())?;
            }
        }
        Some(INTENT_HEAL) => {
            let request = HpRequest::new(target, amount(detail_int(details, "amount")))
                .with_source("spell")
                .with_reason(format!("healed by {}", entry.actor));
            tools.apply_heal(request)?;
        }
        _ => {}
    }
    Ok(())
}

fn enemy_attack(tools: &ToolClient, enemy: &Combatant, target: &Combatant) -> EngineResult<()> {
    let attack = tools.roll(&format!("1d20{:+}", enemy.attack_bonus), "attack")?;
    let mut rolls = vec![attack.clone()];
    let text = if hits(tools, attack.total, target.ac)? {
        let damage = tools.roll(&enemy.damage, "damage")?;
        let request = HpRequest::new(&target.name, amount(damage.total))
            .with_source(enemy.name.clone())
            .with_reason(format!("{} attacks", enemy.name));
        let change = tools.apply_damage(request)?;
        rolls.push(damage);
        format!("{} strikes {}: {change}", enemy.name, target.name)
    } else {
        format!("{} swings at {} and misses.", enemy.name, target.name)
    };
    let details = BTreeMap::from([
        ("intent".to_string(), json!(INTENT_ATTACK)),
        ("target".to_string(), json!(target.name)),
        ("attack_total".to_string(), json!(attack.total)),
    ]);
    tools.append_note(&text, details, rolls)?;
    Ok(())
}

/// A party member that attacks the weakest enemy, or heals a wounded ally
/// when it is the party's healer.
#[derive(Debug, Clone)]
pub struct ScriptedParticipant {
    name: String,
    heal: Option<String>,
}

impl ScriptedParticipant {
    /// A fighter.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            heal: None,
        }
    }

    /// A healer that casts `notation` on allies below half health.
    pub fn healer(name: &str, notation: &str) -> Self {
        Self {
            name: name.to_string(),
            heal: Some(notation.to_string()),
        }
    }

    fn declare(&self, tools: &ToolClient, ctx: &TurnContext, me: &Combatant) -> EngineResult<TurnOutcome> {
        if let Some(notation) = &self.heal {
            let wounded = ctx
                .party
                .iter()
                .filter(|c| c.is_alive() && c.current_hp * 2 < c.max_hp)
                .min_by_key(|c| c.current_hp * 100 / c.max_hp.max(1));
            if let Some(ally) = wounded {
                let roll = tools.roll(notation, "heal")?;
                let details = BTreeMap::from([
                    ("intent".to_string(), json!(INTENT_HEAL)),
                    ("target".to_string(), json!(ally.name)),
                    ("amount".to_string(), json!(roll.total)),
                ]);
                return Ok(TurnOutcome::Declared(Declaration {
                    text: format!("{} heals {} for {}.", self.name, ally.name, roll.total),
                    details,
                    rolls: vec![roll],
                }));
            }
        }

        let Some(foe) = ctx.enemies.iter().filter(|c| c.is_alive()).min_by_key(|c| c.current_hp) else {
            let roll = tools.roll(&format!("1d20{:+}", me.modifier("wis")), "perception")?;
            let details = BTreeMap::from([("intent".to_string(), json!(INTENT_EXPLORE))]);
            return Ok(TurnOutcome::Declared(Declaration {
                text: format!("{} searches the area ({}).", self.name, roll.total),
                details,
                rolls: vec![roll],
            }));
        };
        let attack = tools.roll(&format!("1d20{:+}", me.attack_bonus), "attack")?;
        let damage = tools.roll(&me.damage, "damage")?;
        let details = BTreeMap::from([
            ("intent".to_string(), json!(INTENT_ATTACK)),
            ("target".to_string(), json!(foe.name)),
            ("attack_total".to_string(), json!(attack.total)),
            ("damage_total".to_string(), json!(damage.total)),
            ("weapon".to_string(), json!(me.damage)),
        ]);
        Ok(TurnOutcome::Declared(Declaration {
            text: format!("{} attacks {} ({} to hit).", self.name, foe.name, attack.total),
            details,
            rolls: vec![attack, damage],
        }))
    }
}

#[async_trait]
impl Actor for ScriptedParticipant {
    fn name(&self) -> &str {
        &self.name
    }

    async fn take_turn(&self, tools: &ToolClient, context: TurnContext) -> TurnOutcome {
        let Some(me) = context.party.iter().find(|c| c.name == self.name).cloned() else {
            return TurnOutcome::Invalid(format!("{} is not in the party", self.name));
        };
        if !me.is_alive() {
            return TurnOutcome::Passed;
        }
        self.declare(tools, &context, &me)
            .unwrap_or_else(|err| TurnOutcome::Invalid(err.to_string()))
    }
}
