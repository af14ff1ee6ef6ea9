//! The session record.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::steps::{StepResult, StepStatus};

use super::{SessionConfig, SessionId};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Steps are being driven.
    Active,
    /// Stopped between steps; may be resumed.
    Paused,
    /// Every available step reached a terminal status.
    Completed,
    /// A step failed and `continue_on_error` was off.
    Failed,
    /// Cancelled by the caller.
    Cancelled,
}

impl SessionStatus {
    /// Whether the session has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Cancelled
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Severity of a session log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One line of the session's own audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLogEntry {
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    pub message: String,
}

/// One end-to-end run of the wizard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier.
    pub id: SessionId,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Policy the session was started with.
    pub config: SessionConfig,
    /// Terminal step results in execution order, at most one per step.
    /// Appended to; a retry moves the results it replaces to `retired`.
    pub results: Vec<StepResult>,
    /// Results replaced by a retry, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retired: Vec<StepResult>,
    /// Optional steps left out by `skip_optional`.
    #[serde(default)]
    pub excluded: Vec<String>,
    pub status: SessionStatus,
    #[serde(default)]
    pub log: Vec<SessionLogEntry>,
}

impl Session {
    /// Create an active session.
    pub fn new(config: SessionConfig, excluded: Vec<String>) -> Self {
        let id = SessionId::new();
        Self {
            started_at: id.timestamp(),
            id,
            ended_at: None,
            config,
            results: Vec::new(),
            retired: Vec::new(),
            excluded,
            status: SessionStatus::Active,
            log: Vec::new(),
        }
    }

    /// Terminal status per step, excluded steps counting as skipped.
    pub fn statuses(&self) -> HashMap<String, StepStatus> {
        let mut statuses: HashMap<String, StepStatus> = self
            .excluded
            .iter()
            .map(|id| (id.clone(), StepStatus::Skipped))
            .collect();
        for result in &self.results {
            statuses.insert(result.step_id.clone(), result.status);
        }
        statuses
    }

    /// Recorded result for a step.
    pub fn result_for(&self, step_id: &str) -> Option<&StepResult> {
        self.results.iter().find(|r| r.step_id == step_id)
    }

    /// Append a step result.
    pub fn record(&mut self, result: StepResult) {
        self.results.push(result);
    }

    /// Move the results matching `retire` out of `results`, keeping the rest
    /// in order. Returns how many moved.
    pub fn retire<F>(&mut self, mut retire: F) -> usize
    where
        F: FnMut(&StepResult) -> bool,
    {
        let (retired, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.results).into_iter().partition(|r| retire(r));
        self.results = kept;
        let moved = retired.len();
        self.retired.extend(retired);
        moved
    }

    /// Make an ended session active again.
    pub fn reopen(&mut self) {
        self.status = SessionStatus::Active;
        self.ended_at = None;
    }

    /// Append to the session log.
    pub fn log(&mut self, level: LogLevel, step_id: Option<&str>, message: impl Into<String>) {
        self.log.push(SessionLogEntry {
            at: Utc::now(),
            level,
            step_id: step_id.map(str::to_string),
            message: message.into(),
        });
    }

    /// Move to a terminal status and stamp the end time.
    pub fn finish(&mut self, status: SessionStatus) {
        self.status = status;
        if self.ended_at.is_none() {
            self.ended_at = Some(Utc::now());
        }
    }

    /// Milliseconds from start to end (or to now while running).
    pub fn elapsed_ms(&self) -> u64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        end.signed_duration_since(self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}
