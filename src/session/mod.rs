//! Wizard sessions.
//!
//! A session is one end-to-end run of the wizard. [`SessionController`] owns
//! the active one and is the only writer of both its results and its
//! navigation state; [`PersistenceStore`] implementations keep paused
//! sessions across processes.

mod config;
mod controller;
mod id;
mod model;
mod report;
mod store;

use std::path::{Path, PathBuf};

pub use config::{SessionConfig, MAX_RETRIES_LIMIT, MAX_RETRY_DELAY_MS};
pub use controller::{SessionController, SessionSnapshot, SessionSummary};
pub use id::SessionId;
pub use model::{LogLevel, Session, SessionLogEntry, SessionStatus};
pub use report::SessionReport;
pub use store::{FileStore, MemoryStore, PersistenceStore, SavedSession};

/// Session store directory for a project.
pub fn default_store_path(project_root: &Path) -> PathBuf {
    project_root.join(".trailhead").join("sessions")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_store_path_is_inside_project() {
        let path = default_store_path(Path::new("/work/app"));
        assert_eq!(path, PathBuf::from("/work/app/.trailhead/sessions"));
    }
}
