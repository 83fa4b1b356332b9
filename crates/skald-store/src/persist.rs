//! Session documents and where they are kept.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use skald_core::{EventLog, GameSession};
use tempfile::NamedTempFile;

use crate::error::{StoreError, StoreResult};

/// The unit of persistence: a session, its event log and its roll table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDocument {
    /// The versioned world document.
    pub session: GameSession,
    /// The append-only log, including referenced rolls.
    pub log: EventLog,
}

impl SessionDocument {
    /// A document with an empty log.
    pub fn new(session: GameSession) -> Self {
        Self {
            session,
            log: EventLog::new(),
        }
    }
}

/// Durable storage for session documents.
pub trait Persistence: Send + Sync {
    /// Replace the stored copy of `doc` atomically.
    fn save(&self, doc: &SessionDocument) -> StoreResult<()>;

    /// Load every stored document.
    fn load_all(&self) -> StoreResult<Vec<SessionDocument>>;
}

/// Keeps nothing; sessions live only as long as the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryOnly;

impl Persistence for MemoryOnly {
    fn save(&self, _doc: &SessionDocument) -> StoreResult<()> {
        Ok(())
    }

    fn load_all(&self) -> StoreResult<Vec<SessionDocument>> {
        Ok(Vec::new())
    }
}

/// One pretty-printed JSON file per session in a directory.
///
/// Writes go to a temporary file in the same directory which is then
/// renamed over the old document, so readers never see a partial file.
#[derive(Debug, Clone)]
pub struct JsonDirectory {
    dir: PathBuf,
}

impl JsonDirectory {
    /// Store documents under `dir`, which is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory documents are stored in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document for session `id`.
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
        move |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl Persistence for JsonDirectory {
    fn save(&self, doc: &SessionDocument) -> StoreResult<()> {
        fs::create_dir_all(&self.dir).map_err(Self::io(&self.dir))?;
        let path = self.path_for(doc.session.id.as_str());
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(Self::io(&self.dir))?;
        serde_json::to_writer_pretty(&mut tmp, doc).map_err(|source| StoreError::Encode {
            id: doc.session.id.to_string(),
            source,
        })?;
        tmp.write_all(b"\n").map_err(Self::io(&path))?;
        tmp.as_file().sync_all().map_err(Self::io(&path))?;
        tmp.persist(&path).map_err(|e| StoreError::Io {
            path: path.clone(),
            source: e.error,
        })?;
        tracing::debug!(path = %path.display(), "saved session document");
        Ok(())
    }

    fn load_all(&self) -> StoreResult<Vec<SessionDocument>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut docs = Vec::new();
        let entries = fs::read_dir(&self.dir).map_err(Self::io(&self.dir))?;
        for entry in entries {
            let path = entry.map_err(Self::io(&self.dir))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let text = fs::read_to_string(&path).map_err(Self::io(&path))?;
            let doc: SessionDocument =
                serde_json::from_str(&text).map_err(|e| StoreError::Corrupt {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
            docs.push(doc);
        }
        tracing::debug!(count = docs.len(), dir = %self.dir.display(), "loaded session documents");
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use skald_core::{Combatant, EventPayload, GameConfig};

    fn doc(id: &str) -> SessionDocument {
        let config = GameConfig {
            party: vec![Combatant::new("Thorin", 28)],
            ..GameConfig::default()
        };
        let mut doc = SessionDocument::new(GameSession::new(id.into(), config, Utc::now()));
        doc.log.append("DungeonMaster", EventPayload::note("hello").into(), false, Utc::now());
        doc
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirectory::new(dir.path().join("sessions"));
        store.save(&doc("g1")).unwrap();
        store.save(&doc("g2")).unwrap();
        let mut loaded = store.load_all().unwrap();
        loaded.sort_by(|a, b| a.session.id.cmp(&b.session.id));
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].session.id.as_str(), "g1");
        assert_eq!(loaded[0].log.len(), 1);
    }

    #[test]
    fn save_replaces_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirectory::new(dir.path());
        let mut d = doc("g1");
        store.save(&d).unwrap();
        d.session.round = 7;
        store.save(&d).unwrap();
        let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        assert_eq!(store.load_all().unwrap()[0].session.round, 7);
    }

    #[test]
    fn missing_directory_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirectory::new(dir.path().join("absent"));
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn corrupt_document_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        let err = JsonDirectory::new(dir.path()).load_all().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        let engine: skald_core::EngineError = err.into();
        assert_eq!(engine.code(), "engine_fail_safe");
    }

    #[test]
    fn unwritable_directory_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let err = JsonDirectory::new(&blocker).save(&doc("g1")).unwrap_err();
        let engine: skald_core::EngineError = err.into();
        assert_eq!(engine.code(), "storage_error");
    }
}
