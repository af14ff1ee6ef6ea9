//! Final session report.

use serde::{Deserialize, Serialize};

use crate::steps::StepStatus;

use super::{Session, SessionId, SessionLogEntry, SessionStatus};

/// Counts and timing for a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub status: SessionStatus,
    /// Steps recorded plus steps excluded by `skip_optional`.
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    /// Includes excluded optional steps.
    pub skipped: usize,
    pub elapsed_ms: u64,
    pub failed_steps: Vec<String>,
    #[serde(default)]
    pub log: Vec<SessionLogEntry>,
}

impl SessionReport {
    /// Summarise a session.
    pub fn from_session(session: &Session) -> Self {
        let count = |status: StepStatus| {
            session
                .results
                .iter()
                .filter(|r| r.status == status)
                .count()
        };

        Self {
            session_id: session.id.clone(),
            status: session.status,
            total: session.results.len() + session.excluded.len(),
            success: count(StepStatus::Success),
            failed: count(StepStatus::Failed),
            skipped: count(StepStatus::Skipped) + session.excluded.len(),
            elapsed_ms: session.elapsed_ms(),
            failed_steps: session
                .results
                .iter()
                .filter(|r| r.is_failed())
                .map(|r| r.step_id.clone())
                .collect(),
            log: session.log.clone(),
        }
    }

    /// One-line summary for terminal output.
    pub fn summary_line(&self) -> String {
        format!(
            "{} {}: {} succeeded, {} failed, {} skipped ({:.1}s)",
            self.session_id,
            self.status,
            self.success,
            self.failed,
            self.skipped,
            self.elapsed_ms as f64 / 1000.0
        )
    }
}
