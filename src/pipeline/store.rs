//! Session persistence.
//!
//! Stores never decide anything about a session; they only keep the latest
//! snapshot. A save carrying an older revision than the stored one is
//! ignored, so snapshots written outside the session lock can arrive in any
//! order.

use crate::core::error::{SessionId, StoreError};
use crate::pipeline::session::PipelineSession;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Persistence boundary for sessions.
pub trait SessionStore: Send + Sync {
    /// Load a session, or `None` if it was never saved.
    fn load(&self, id: &SessionId) -> Result<Option<PipelineSession>, StoreError>;

    /// Save a snapshot. Snapshots older than the stored one are ignored.
    fn save(&self, session: &PipelineSession) -> Result<(), StoreError>;

    /// Ids of every stored session.
    fn list(&self) -> Result<Vec<SessionId>, StoreError>;
}

/// In-memory store, for tests and short-lived processes.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, PipelineSession>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, id: &SessionId) -> Result<Option<PipelineSession>, StoreError> {
        Ok(self.sessions.read().get(id).cloned())
    }

    fn save(&self, session: &PipelineSession) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write();
        if let Some(stored) = sessions.get(&session.id()) {
            if stored.revision() > session.revision() {
                log::debug!(
                    "ignoring snapshot r{} of session {}; r{} is stored",
                    session.revision(),
                    session.id().short(),
                    stored.revision()
                );
                return Ok(());
            }
        }
        sessions.insert(session.id(), session.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<SessionId>, StoreError> {
        let mut ids: Vec<SessionId> = self.sessions.read().keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}

/// On-disk form of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDocument {
    /// Document format version.
    pub version: String,
    /// The session.
    pub session: PipelineSession,
}

impl SessionDocument {
    /// Current format version.
    pub const VERSION: &'static str = "1.0.0";

    /// Wrap a session at the current version.
    pub fn new(session: PipelineSession) -> Self {
        Self {
            version: Self::VERSION.to_string(),
            session,
        }
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Whether the document was written by a compatible format version.
    ///
    /// Versions are compatible when their major numbers match.
    pub fn check_version(&self) -> Result<(), StoreError> {
        let incompatible = || StoreError::IncompatibleVersion {
            found: self.version.clone(),
            supported: Self::VERSION.to_string(),
        };
        let found = semver::Version::parse(&self.version).map_err(|_| incompatible())?;
        let supported = semver::Version::parse(Self::VERSION).map_err(|_| incompatible())?;
        if found.major == supported.major {
            Ok(())
        } else {
            Err(incompatible())
        }
    }

    /// Validate the version, reconcile legacy status and check invariants.
    pub fn into_session(self) -> Result<PipelineSession, StoreError> {
        self.check_version()?;
        let mut session = self.session;
        session.reconcile_legacy();
        session.check_invariants()?;
        Ok(session)
    }
}

/// Store keeping one pretty-printed JSON document per session in a directory.
#[derive(Debug)]
pub struct JsonFileSessionStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileSessionStore {
    /// Open a store, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Directory holding the documents.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a session's document.
    pub fn path_for(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn read_document(&self, path: &Path) -> Result<Option<SessionDocument>, StoreError> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        SessionDocument::from_json(&json)
            .map(Some)
            .map_err(|source| StoreError::Malformed {
                path: path.to_path_buf(),
                source,
            })
    }
}

impl SessionStore for JsonFileSessionStore {
    fn load(&self, id: &SessionId) -> Result<Option<PipelineSession>, StoreError> {
        let path = self.path_for(id);
        match self.read_document(&path)? {
            Some(document) => document.into_session().map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, session: &PipelineSession) -> Result<(), StoreError> {
        let path = self.path_for(&session.id());
        let _guard = self.write_lock.lock();

        if let Ok(Some(stored)) = self.read_document(&path) {
            if stored.session.revision() > session.revision() {
                log::debug!(
                    "ignoring snapshot r{} of session {}; r{} is on disk",
                    session.revision(),
                    session.id().short(),
                    stored.session.revision()
                );
                return Ok(());
            }
        }

        let json = SessionDocument::new(session.clone())
            .to_json()
            .map_err(|source| StoreError::Malformed {
                path: path.clone(),
                source,
            })?;

        let io_error = |source| StoreError::Io {
            path: path.clone(),
            source,
        };
        let temp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&temp).map_err(io_error)?;
            file.write_all(json.as_bytes()).map_err(io_error)?;
            file.sync_all().map_err(io_error)?;
        }
        fs::rename(&temp, &path).map_err(io_error)?;

        log::debug!(
            "saved session {} r{} to {}",
            session.id().short(),
            session.revision(),
            path.display()
        );
        Ok(())
    }

    fn list(&self) -> Result<Vec<SessionId>, StoreError> {
        let mut ids = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| StoreError::Io {
                path: self.dir.clone(),
                source: e.into(),
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<SessionId>().ok())
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AggregateStatus, FileMetadata, StageStatus, ValidationCategory};
    use crate::pipeline::session::Lifecycle;

    fn session() -> PipelineSession {
        PipelineSession::new(FileMetadata::new("people.csv", 64))
    }

    #[test]
    fn test_memory_store_ignores_older_revisions() {
        let store = MemorySessionStore::new();
        let mut session = session();
        session.touch();
        session.touch();
        store.save(&session).unwrap();

        let mut older = session.clone();
        older.revision = 1;
        older.file.name = "stale.csv".to_string();
        store.save(&older).unwrap();

        let loaded = store.load(&session.id()).unwrap().unwrap();
        assert_eq!(loaded.file().name, "people.csv");
        assert_eq!(store.list().unwrap(), vec![session.id()]);
        assert!(store.load(&SessionId::new()).unwrap().is_none());
    }

    #[test]
    fn test_json_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSessionStore::open(dir.path().join("sessions")).unwrap();
        let mut session = session();
        session.record_mut(ValidationCategory::FileUpload).unwrap().status = StageStatus::Success;
        session.completed_stages.push(ValidationCategory::FileUpload);
        session.summary = "Quarterly contacts, 2 columns".to_string();
        session.touch();

        store.save(&session).unwrap();
        let loaded = store.load(&session.id()).unwrap().unwrap();
        assert_eq!(loaded, session);
        assert_eq!(loaded.summary(), "Quarterly contacts, 2 columns");
        assert_eq!(store.list().unwrap(), vec![session.id()]);
        assert!(!store.path_for(&session.id()).with_extension("json.tmp").exists());
    }

    #[test]
    fn test_document_without_summary_loads() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSessionStore::open(dir.path()).unwrap();
        let session = session();
        let mut json = serde_json::to_value(SessionDocument::new(session.clone())).unwrap();
        json["session"].as_object_mut().unwrap().remove("summary");
        std::fs::write(store.path_for(&session.id()), json.to_string()).unwrap();

        let loaded = store.load(&session.id()).unwrap().unwrap();
        assert_eq!(loaded.summary(), "");
        assert_eq!(loaded, session);
    }

    #[test]
    fn test_json_store_ignores_older_revisions() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSessionStore::open(dir.path()).unwrap();
        let mut session = session();
        let older = session.clone();
        session.touch();

        store.save(&session).unwrap();
        store.save(&older).unwrap();
        assert_eq!(store.load(&session.id()).unwrap().unwrap().revision(), 1);
    }

    #[test]
    fn test_missing_session_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSessionStore::open(dir.path()).unwrap();
        assert!(store.load(&SessionId::new()).unwrap().is_none());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_incompatible_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSessionStore::open(dir.path()).unwrap();
        let session = session();
        let mut document = SessionDocument::new(session.clone());
        document.version = "2.0.0".to_string();
        std::fs::write(store.path_for(&session.id()), document.to_json().unwrap()).unwrap();

        assert!(matches!(
            store.load(&session.id()),
            Err(StoreError::IncompatibleVersion { .. })
        ));

        document.version = "1.4.0".to_string();
        std::fs::write(store.path_for(&session.id()), document.to_json().unwrap()).unwrap();
        assert!(store.load(&session.id()).unwrap().is_some());
    }

    #[test]
    fn test_malformed_and_inconsistent_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSessionStore::open(dir.path()).unwrap();

        let id = SessionId::new();
        std::fs::write(store.path_for(&id), "{ not json").unwrap();
        assert!(matches!(store.load(&id), Err(StoreError::Malformed { .. })));

        let mut session = session();
        session.completed_stages = vec![ValidationCategory::DataQuality];
        let json = SessionDocument::new(session.clone()).to_json().unwrap();
        std::fs::write(store.path_for(&session.id()), json).unwrap();
        assert!(matches!(
            store.load(&session.id()),
            Err(StoreError::Inconsistent(_))
        ));
    }

    #[test]
    fn test_legacy_document_reconciled_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSessionStore::open(dir.path()).unwrap();
        let mut session = session();
        session.legacy_status = Some(AggregateStatus::Success);
        let json = SessionDocument::new(session.clone()).to_json().unwrap();
        std::fs::write(store.path_for(&session.id()), json).unwrap();

        let loaded = store.load(&session.id()).unwrap().unwrap();
        assert_eq!(loaded.lifecycle(), Lifecycle::Completed);
        assert_eq!(loaded.completed_stages().len(), 8);
    }
}
