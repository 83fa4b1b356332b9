//! The in-process state store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use skald_core::session::validate_rosters;
use skald_core::{
    Caller, Combatant, EndVerdict, EngineError, EngineResult, EventId, EventLogEntry, EventPayload,
    FlagValue, GameConfig, GameResult, GameSession, HpChange, NewEvent, NotFoundKind, Outcome, Patch,
    SessionId, SessionStatus, ToolName, TurnContext,
};
use uuid::Uuid;

use crate::api::{HpRequest, SceneChange, SessionStore};
use crate::config::StoreConfig;
use crate::persist::{JsonDirectory, MemoryOnly, Persistence, SessionDocument};
use crate::registry::ActiveSessions;

/// Flag recording the scene whose enemies were last set.
pub const ENEMIES_SCENE_FLAG: &str = "enemies_scene";

enum Change<T> {
    Wrote(T),
    Unchanged(T),
}

#[derive(Default)]
struct Inner {
    docs: BTreeMap<SessionId, SessionDocument>,
    active: ActiveSessions,
}

impl Inner {
    fn resolve(&self, session: Option<&SessionId>) -> EngineResult<SessionId> {
        match session {
            Some(id) if self.docs.contains_key(id) => Ok(id.clone()),
            Some(id) => Err(EngineError::session_not_found(id.as_str())),
            None => self
                .active
                .active()
                .cloned()
                .ok_or_else(|| EngineError::session_not_found("(no running session)")),
        }
    }
}

/// Versioned session documents behind a reader-writer lock.
///
/// Every successful write is persisted before it becomes visible; a failed
/// save leaves the in-memory document as it was.
pub struct StateStore {
    config: StoreConfig,
    persistence: Box<dyn Persistence>,
    inner: RwLock<Inner>,
}

impl StateStore {
    /// A store that keeps sessions in memory only.
    pub fn in_memory() -> Self {
        Self {
            config: StoreConfig::default(),
            persistence: Box::new(MemoryOnly),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Open a store as configured, loading any persisted sessions.
    pub fn open(config: StoreConfig) -> EngineResult<Self> {
        match config.state_dir.clone() {
            Some(dir) => Self::with_persistence(config, JsonDirectory::new(dir)),
            None => Self::with_persistence(config, MemoryOnly),
        }
    }

    /// Open a store over an explicit persistence backend.
    pub fn with_persistence(config: StoreConfig, persistence: impl Persistence + 'static) -> EngineResult<Self> {
        let mut docs = persistence.load_all()?;
        docs.sort_by_key(|d| d.session.updated_at);
        let mut inner = Inner::default();
        for doc in docs {
            let id = doc.session.id.clone();
            inner.active.touch(&id, doc.session.updated_at, doc.session.is_running());
            inner.docs.insert(id, doc);
        }
        tracing::info!(sessions = inner.docs.len(), "opened state store");
        Ok(Self {
            config,
            persistence: Box::new(persistence),
            inner: RwLock::new(inner),
        })
    }

    /// The store's configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn read<T>(
        &self,
        session: Option<&SessionId>,
        op: impl FnOnce(&SessionDocument) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let inner = self.inner.read();
        let id = inner.resolve(session)?;
        let doc = inner
            .docs
            .get(&id)
            .ok_or_else(|| EngineError::session_not_found(id.as_str()))?;
        op(doc)
    }

    fn write<T>(
        &self,
        session: Option<&SessionId>,
        op: impl FnOnce(&mut SessionDocument, DateTime<Utc>) -> EngineResult<Change<T>>,
    ) -> EngineResult<T> {
        let mut inner = self.inner.write();
        let id = inner.resolve(session)?;
        let mut next = inner
            .docs
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::session_not_found(id.as_str()))?;
        let now = Utc::now();
        let value = match op(&mut next, now)? {
            Change::Unchanged(value) => return Ok(value),
            Change::Wrote(value) => value,
        };
        next.session.updated_at = now;
        if let Err(err) = self.persistence.save(&next) {
            tracing::warn!(session = %id, %err, "durable write failed");
            return Err(err.into());
        }
        inner.active.touch(&id, now, next.session.is_running());
        inner.docs.insert(id, next);
        Ok(value)
    }

    fn hp_write(
        &self,
        tool: ToolName,
        origin: &Caller,
        session: Option<&SessionId>,
        request: HpRequest,
    ) -> EngineResult<HpChange> {
        self.write(session, |doc, now| {
            ensure_writable(&doc.session, tool)?;
            let (side, index) = doc.session.find_combatant(&request.target).ok_or_else(|| EngineError::NotFound {
                kind: NotFoundKind::Target,
                name: request.target.clone(),
            })?;
            let combatant = &mut doc.session.roster_mut(side)[index];
            let change = if tool == ToolName::ApplyHeal {
                combatant.heal(side, request.amount)
            } else {
                combatant.take_damage(side, request.amount)
            };
            bump(&mut doc.session);
            let mut summary = format!("{change}");
            if !request.source.is_empty() {
                summary.push_str(&format!(" [{}]", request.source));
            }
            if !request.reason.is_empty() {
                summary.push_str(&format!(": {}", request.reason));
            }
            tracing::info!(session = %doc.session.id, %tool, %change, "hit points changed");
            record(doc, origin, now, tool, summary, Some(change.clone()));
            Ok(Change::Wrote(change))
        })
    }
}

fn bump(session: &mut GameSession) {
    session.state_version += 1;
}

fn ensure_writable(session: &GameSession, tool: ToolName) -> EngineResult<()> {
    if session.is_ended() {
        tracing::warn!(session = %session.id, %tool, "write rejected: session has ended");
        return Err(EngineError::Validation(format!(
            "session {} has ended; {tool} is not allowed",
            session.id
        )));
    }
    Ok(())
}

fn record(
    doc: &mut SessionDocument,
    origin: &Caller,
    now: DateTime<Utc>,
    tool: ToolName,
    summary: String,
    hp: Option<HpChange>,
) -> EventId {
    doc.log.append(
        origin.name.clone(),
        EventPayload::ToolResult { tool, summary, hp }.into(),
        origin.injected,
        now,
    )
}

fn file_safe(id: &SessionId) -> bool {
    let text = id.as_str();
    text.len() <= 64
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl SessionStore for StateStore {
    fn resolve(&self, session: Option<&SessionId>) -> EngineResult<SessionId> {
        self.inner.read().resolve(session)
    }

    fn list_sessions(&self) -> Vec<GameSession> {
        let inner = self.inner.read();
        let mut sessions: Vec<GameSession> = inner.docs.values().map(|d| d.session.clone()).collect();
        sessions.sort_by_key(|s| s.updated_at);
        sessions
    }

    fn get_state(&self, session: Option<&SessionId>) -> EngineResult<GameSession> {
        self.read(session, |doc| {
            tracing::debug!(session = %doc.session.id, version = doc.session.state_version, "get_state");
            Ok(doc.session.clone())
        })
    }

    fn get_turn_context(&self, session: Option<&SessionId>, actor: &str) -> EngineResult<TurnContext> {
        let count = self.config.context_events;
        self.read(session, |doc| {
            let s = &doc.session;
            if !s.knows_actor(actor) && s.find_combatant(actor).is_none() {
                return Err(EngineError::NotFound {
                    kind: NotFoundKind::Actor,
                    name: actor.to_string(),
                });
            }
            tracing::debug!(session = %s.id, actor, "get_turn_context");
            Ok(TurnContext::new(s, actor, doc.log.tail(count).to_vec()))
        })
    }

    fn get_recent_events(&self, session: Option<&SessionId>, limit: usize) -> EngineResult<Vec<EventLogEntry>> {
        let limit = limit.clamp(1, self.config.recent_events_cap.max(1));
        self.read(session, |doc| Ok(doc.log.tail(limit).to_vec()))
    }

    fn events_since(&self, session: Option<&SessionId>, after: EventId) -> EngineResult<Vec<EventLogEntry>> {
        self.read(session, |doc| Ok(doc.log.since(after).to_vec()))
    }

    fn export_markdown(&self, session: Option<&SessionId>) -> EngineResult<String> {
        self.read(session, |doc| Ok(doc.log.export_markdown()))
    }

    fn init_game(&self, origin: &Caller, config: GameConfig) -> EngineResult<GameSession> {
        config.validate().map_err(EngineError::Validation)?;
        let id = match SessionId::parse(&config.id) {
            Some(id) => id,
            None => SessionId::from(format!("game-{}", Uuid::new_v4().simple()).as_str()),
        };
        if !file_safe(&id) {
            return Err(EngineError::Validation(format!(
                "session id {id:?} must be at most 64 letters, digits, '-' or '_'"
            )));
        }

        let mut inner = self.inner.write();
        if inner.docs.contains_key(&id) {
            tracing::warn!(session = %id, "init_game rejected: session exists");
            return Err(EngineError::Validation(format!("session {id} already exists")));
        }
        let now = Utc::now();
        let mut doc = SessionDocument::new(GameSession::new(id.clone(), config, now));
        let summary = format!(
            "session {id} created with {} party members and {} enemies",
            doc.session.party.len(),
            doc.session.enemies.len()
        );
        record(&mut doc, origin, now, ToolName::InitGame, summary, None);
        self.persistence.save(&doc)?;
        inner.active.touch(&id, now, doc.session.is_running());
        let session = doc.session.clone();
        inner.docs.insert(id, doc);
        tracing::info!(session = %session.id, status = %session.status, "session created");
        Ok(session)
    }

    fn apply_patch(
        &self,
        origin: &Caller,
        session: Option<&SessionId>,
        patch: Patch,
        reason: &str,
    ) -> EngineResult<u64> {
        self.write(session, |doc, now| {
            ensure_writable(&doc.session, ToolName::ApplyPatch)?;
            let current = doc.session.state_version;
            if patch.expected_version != current {
                tracing::warn!(
                    session = %doc.session.id,
                    expected = patch.expected_version,
                    current,
                    "apply_patch rejected: stale version"
                );
                return Err(EngineError::Conflict {
                    expected: patch.expected_version,
                    current,
                });
            }
            let mut next = patch.apply_to(&doc.session).map_err(EngineError::Validation)?;
            next.state_version = current + 1;
            doc.session = next;
            let mut summary = format!("v{} {}", current + 1, patch.changed_fields().join(", "));
            if !reason.is_empty() {
                summary.push_str(&format!(": {reason}"));
            }
            record(doc, origin, now, ToolName::ApplyPatch, summary, None);
            tracing::info!(session = %doc.session.id, version = current + 1, "patch applied");
            Ok(Change::Wrote(current + 1))
        })
    }

    fn append_event(&self, origin: &Caller, session: Option<&SessionId>, event: NewEvent) -> EngineResult<EventId> {
        self.write(session, |doc, now| {
            if doc.session.status != SessionStatus::Running {
                tracing::warn!(session = %doc.session.id, status = %doc.session.status, "append_event rejected");
                return Err(EngineError::Validation(format!(
                    "session {} is {}; events can only be appended while running",
                    doc.session.id, doc.session.status
                )));
            }
            let id = doc.log.append(origin.name.clone(), event, origin.injected, now);
            tracing::info!(session = %doc.session.id, event = %id, actor = %origin.name, injected = origin.injected, "event appended");
            Ok(Change::Wrote(id))
        })
    }

    fn advance_turn(&self, origin: &Caller, session: Option<&SessionId>) -> EngineResult<GameSession> {
        self.write(session, |doc, now| {
            ensure_writable(&doc.session, ToolName::AdvanceTurn)?;
            let s = &mut doc.session;
            if s.initiative_order.is_empty() {
                s.last_actor = Some(s.next_actor.clone());
                s.round += 1;
                s.next_actor = s.narrator.clone();
            } else {
                let len = s.initiative_order.len();
                let current = s.turn_index.min(len - 1);
                let next = (current + 1) % len;
                s.last_actor = Some(s.initiative_order[current].clone());
                s.next_actor = s.initiative_order[next].clone();
                s.turn_index = next;
                if next == 0 {
                    s.round += 1;
                }
            }
            bump(s);
            let summary = format!("turn passes to {} (round {})", s.next_actor, s.round);
            tracing::info!(session = %s.id, next_actor = %s.next_actor, round = s.round, "turn advanced");
            record(doc, origin, now, ToolName::AdvanceTurn, summary, None);
            Ok(Change::Wrote(doc.session.clone()))
        })
    }

    fn set_scene(&self, origin: &Caller, session: Option<&SessionId>, change: SceneChange) -> EngineResult<GameSession> {
        self.write(session, |doc, now| {
            ensure_writable(&doc.session, ToolName::SetScene)?;
            let s = &mut doc.session;
            s.scene_id = change.scene_id;
            if !change.title.trim().is_empty() {
                s.scene_title = change.title.trim().to_string();
            }
            let requested = change.next_actor.as_deref().unwrap_or(&s.narrator).to_string();
            let position = s.initiative_order.iter().position(|a| *a == requested);
            s.next_actor = if position.is_some() || requested == s.narrator {
                requested
            } else {
                s.narrator.clone()
            };
            if let Some(index) = s.initiative_order.iter().position(|a| *a == s.next_actor) {
                s.turn_index = index;
            }
            bump(s);
            let summary = format!("scene {}: {}", s.scene_id, s.scene_title);
            tracing::info!(session = %s.id, scene = s.scene_id, title = %s.scene_title, "scene changed");
            if !change.narration.trim().is_empty() {
                doc.log.append(
                    origin.name.clone(),
                    EventPayload::note(change.narration.trim()).into(),
                    origin.injected,
                    now,
                );
            }
            record(doc, origin, now, ToolName::SetScene, summary, None);
            Ok(Change::Wrote(doc.session.clone()))
        })
    }

    fn set_enemies(
        &self,
        origin: &Caller,
        session: Option<&SessionId>,
        mut enemies: Vec<Combatant>,
        reason: &str,
    ) -> EngineResult<GameSession> {
        enemies.iter_mut().for_each(Combatant::normalize);
        self.write(session, |doc, now| {
            ensure_writable(&doc.session, ToolName::SetEnemies)?;
            validate_rosters(&doc.session.party, &enemies).map_err(EngineError::Validation)?;
            let s = &mut doc.session;
            let names: Vec<&str> = enemies.iter().map(|e| e.name.as_str()).collect();
            let mut summary = format!("{} enemies in scene {}: {}", enemies.len(), s.scene_id, names.join(", "));
            if !reason.is_empty() {
                summary.push_str(&format!(" ({reason})"));
            }
            s.flags
                .insert(ENEMIES_SCENE_FLAG.to_string(), FlagValue::Int(i64::from(s.scene_id)));
            s.enemies = enemies;
            bump(s);
            tracing::info!(session = %s.id, count = s.enemies.len(), "enemies set");
            record(doc, origin, now, ToolName::SetEnemies, summary, None);
            Ok(Change::Wrote(doc.session.clone()))
        })
    }

    fn apply_damage(&self, origin: &Caller, session: Option<&SessionId>, request: HpRequest) -> EngineResult<HpChange> {
        self.hp_write(ToolName::ApplyDamage, origin, session, request)
    }

    fn apply_heal(&self, origin: &Caller, session: Option<&SessionId>, request: HpRequest) -> EngineResult<HpChange> {
        self.hp_write(ToolName::ApplyHeal, origin, session, request)
    }

    fn set_game_result(
        &self,
        origin: &Caller,
        session: Option<&SessionId>,
        outcome: Outcome,
        summary: &str,
    ) -> EngineResult<GameResult> {
        self.write(session, |doc, now| {
            if let Some(result) = &doc.session.result {
                tracing::debug!(session = %doc.session.id, "set_game_result: result already recorded");
                return Ok(Change::Unchanged(result.clone()));
            }
            if doc.session.is_ended() {
                return Err(EngineError::Validation(format!(
                    "session {} was stopped without a result",
                    doc.session.id
                )));
            }
            let summary = if summary.trim().is_empty() {
                outcome.to_string()
            } else {
                summary.trim().to_string()
            };
            let result = GameResult {
                outcome,
                summary: summary.clone(),
                decided_at: now,
            };
            doc.session.result = Some(result.clone());
            doc.session.status = SessionStatus::Ended;
            bump(&mut doc.session);
            doc.log.append(
                origin.name.clone(),
                EventPayload::GameOver { outcome, summary }.into(),
                origin.injected,
                now,
            );
            tracing::info!(session = %doc.session.id, %outcome, injected = origin.injected, "game result recorded");
            Ok(Change::Wrote(result))
        })
    }

    fn check_end_conditions(&self, session: Option<&SessionId>) -> EngineResult<Option<EndVerdict>> {
        self.read(session, |doc| {
            let verdict = doc.session.end_condition.evaluate(&doc.session);
            tracing::debug!(session = %doc.session.id, ?verdict, "check_end_conditions");
            Ok(verdict)
        })
    }

    fn begin(&self, session: &SessionId) -> EngineResult<GameSession> {
        self.write(Some(session), |doc, _now| match doc.session.status {
            SessionStatus::Running => Ok(Change::Unchanged(doc.session.clone())),
            SessionStatus::Ended => Err(EngineError::Validation(format!(
                "session {} has ended and cannot be started",
                doc.session.id
            ))),
            SessionStatus::Pending => {
                doc.session.status = SessionStatus::Running;
                bump(&mut doc.session);
                tracing::info!(session = %doc.session.id, "session started");
                Ok(Change::Wrote(doc.session.clone()))
            }
        })
    }

    fn stop(&self, session: &SessionId, reason: &str) -> EngineResult<GameSession> {
        self.write(Some(session), |doc, now| {
            if doc.session.is_ended() {
                return Ok(Change::Unchanged(doc.session.clone()));
            }
            doc.session.status = SessionStatus::Ended;
            bump(&mut doc.session);
            let narrator = doc.session.narrator.clone();
            doc.log.append(
                narrator,
                EventPayload::Stopped {
                    reason: reason.to_string(),
                }
                .into(),
                true,
                now,
            );
            tracing::warn!(session = %doc.session.id, reason, "session stopped");
            Ok(Change::Wrote(doc.session.clone()))
        })
    }
}
