//! Session persistence for pause/resume.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::navigation::NavigationState;

use super::{Session, SessionId};

/// A session together with its navigation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSession {
    pub session: Session,
    pub navigation: NavigationState,
}

/// Where paused sessions are kept.
pub trait PersistenceStore: Send + Sync {
    /// Store (or overwrite) a session.
    fn save(&self, session: &Session, navigation: &NavigationState) -> Result<()>;

    /// Load a session, `None` when it was never saved.
    fn load(&self, id: &SessionId) -> Result<Option<(Session, NavigationState)>>;
}

/// Process-lifetime store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<SessionId, SavedSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PersistenceStore for MemoryStore {
    fn save(&self, session: &Session, navigation: &NavigationState) -> Result<()> {
        let saved = SavedSession {
            session: session.clone(),
            navigation: navigation.clone(),
        };
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session.id.clone(), saved);
        Ok(())
    }

    fn load(&self, id: &SessionId) -> Result<Option<(Session, NavigationState)>> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        Ok(sessions
            .get(id)
            .map(|s| (s.session.clone(), s.navigation.clone())))
    }
}

/// One pretty-printed JSON file per session.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `path`. The directory is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.path)
            .with_context(|| format!("Failed to create session store at {:?}", self.path))
    }

    fn session_path(&self, id: &SessionId) -> PathBuf {
        self.path.join(format!("{}.json", id))
    }

    /// Saved sessions, newest first.
    ///
    /// Files that fail to parse are ignored.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<SavedSession>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();
        for entry in fs::read_dir(&self.path)
            .with_context(|| format!("Failed to read session store at {:?}", self.path))?
        {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "json") {
                if let Ok(json) = fs::read_to_string(&path) {
                    if let Ok(saved) = serde_json::from_str::<SavedSession>(&json) {
                        sessions.push(saved);
                    }
                }
            }
        }

        sessions.sort_by(|a, b| b.session.id.timestamp().cmp(&a.session.id.timestamp()));
        sessions.truncate(limit);
        Ok(sessions)
    }

    /// Delete a saved session. Returns whether a file was removed.
    pub fn remove(&self, id: &SessionId) -> Result<bool> {
        let path = self.session_path(id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).with_context(|| format!("Failed to remove {:?}", path))?;
        Ok(true)
    }
}

impl PersistenceStore for FileStore {
    fn save(&self, session: &Session, navigation: &NavigationState) -> Result<()> {
        self.ensure_dir()?;
        let path = self.session_path(&session.id);
        let saved = SavedSession {
            session: session.clone(),
            navigation: navigation.clone(),
        };
        let json = serde_json::to_string_pretty(&saved)?;
        fs::write(&path, json).with_context(|| format!("Failed to write session to {:?}", path))
    }

    fn load(&self, id: &SessionId) -> Result<Option<(Session, NavigationState)>> {
        let path = self.session_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read session from {:?}", path))?;
        let saved: SavedSession = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse session at {:?}", path))?;
        Ok(Some((saved.session, saved.navigation)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::NavigationStateMachine;
    use crate::runner::StepGraph;
    use crate::session::SessionConfig;
    use crate::steps::StepDefinition;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn fixture() -> (Session, NavigationState) {
        let graph = Arc::new(
            StepGraph::load(vec![
                StepDefinition::new("welcome", 1),
                StepDefinition::new("install", 2).depends_on(["welcome"]),
            ])
            .unwrap(),
        );
        let session = Session::new(SessionConfig::default(), vec![]);
        let nav = NavigationStateMachine::new(
            graph.clone(),
            session.id.clone(),
            graph.topological_order(),
        )
        .unwrap();
        (session, nav.state().clone())
    }

    #[test]
    fn file_store_save_and_load() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path().join("sessions"));
        let (session, nav) = fixture();

        store.save(&session, &nav).unwrap();
        let (loaded, loaded_nav) = store.load(&session.id).unwrap().unwrap();
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded_nav, nav);
    }

    #[test]
    fn file_store_missing_session_is_none() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path());
        assert!(store.load(&SessionId::new()).unwrap().is_none());
    }

    #[test]
    fn file_store_corrupt_file_is_error() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path());
        let id = SessionId::new();
        fs::write(temp.path().join(format!("{}.json", id)), "{not json").unwrap();
        assert!(store.load(&id).is_err());
    }

    #[test]
    fn file_store_lists_newest_first() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path().join("sessions"));
        let mut ids = Vec::new();
        for _ in 0..3 {
            let (session, nav) = fixture();
            store.save(&session, &nav).unwrap();
            ids.push(session.id);
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        let listed = store.list_recent(10).unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].session.id, ids[2]);
        assert_eq!(store.list_recent(1).unwrap().len(), 1);
    }

    #[test]
    fn file_store_list_on_missing_dir_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path().join("nothing-here"));
        assert!(store.list_recent(5).unwrap().is_empty());
    }

    #[test]
    fn file_store_remove() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path());
        let (session, nav) = fixture();
        store.save(&session, &nav).unwrap();
        assert!(store.remove(&session.id).unwrap());
        assert!(!store.remove(&session.id).unwrap());
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        let (session, nav) = fixture();
        assert!(store.is_empty());
        store.save(&session, &nav).unwrap();
        assert_eq!(store.len(), 1);
        let (loaded, _) = store.load(&session.id).unwrap().unwrap();
        assert_eq!(loaded.id, session.id);
    }
}
