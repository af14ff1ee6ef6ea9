//! Step status and results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Runtime status of a step within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step is waiting to run.
    Pending,

    /// Step is currently executing.
    Running,

    /// Step completed successfully.
    Success,

    /// Step failed.
    Failed,

    /// Step was skipped (excluded, unmet dependency, or user skip).
    Skipped,
}

impl StepStatus {
    /// Check if this is a terminal state (no more changes expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Success | StepStatus::Failed | StepStatus::Skipped
        )
    }

    /// Get a display character for this status.
    pub fn display_char(&self) -> char {
        match self {
            StepStatus::Pending => '○',
            StepStatus::Running => '◉',
            StepStatus::Success => '✓',
            StepStatus::Failed => '✗',
            StepStatus::Skipped => '⊘',
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Success => "success",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

/// Why a step ended up `Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Optional step left out by `skip_optional`.
    OptionalExcluded,
    /// A dependency was skipped and is not optional.
    DependencyUnmet,
    /// A dependency failed.
    DependencyFailed,
    /// The user skipped the step.
    UserSkipped,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::OptionalExcluded => "optional step excluded",
            SkipReason::DependencyUnmet => "dependency unmet",
            SkipReason::DependencyFailed => "dependency failed",
            SkipReason::UserSkipped => "skipped by user",
        };
        write!(f, "{}", s)
    }
}

/// Category of a step failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transient failure; retries were exhausted or disabled.
    Retryable,
    /// Non-retryable failure.
    Fatal,
    /// Cancelled while executing or waiting to retry.
    Cancelled,
}

/// Error attached to a failed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepError {
    /// Failure category.
    pub kind: FailureKind,
    /// Human readable reason.
    pub message: String,
}

/// Terminal result of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// Step id.
    pub step_id: String,

    /// Terminal status (never `Pending` or `Running`).
    pub status: StepStatus,

    /// Attempt the step ended on. Always at least 1; steps that never reached
    /// the executor (skips, early cancellation) end on their first.
    pub attempts: u32,

    /// Wall time spent on the step, backoff included.
    pub duration_ms: u64,

    /// Present iff `status` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,

    /// Present iff `status` is `Skipped`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,

    /// Whether running the step again could plausibly succeed.
    pub can_retry: bool,
}

impl StepResult {
    /// Create a success result.
    pub fn success(step_id: &str, attempts: u32, duration: Duration) -> Self {
        Self {
            step_id: step_id.to_string(),
            status: StepStatus::Success,
            attempts: attempts.max(1),
            duration_ms: duration.as_millis() as u64,
            error: None,
            skip_reason: None,
            can_retry: false,
        }
    }

    /// Create a failure result.
    pub fn failure(
        step_id: &str,
        attempts: u32,
        duration: Duration,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            step_id: step_id.to_string(),
            status: StepStatus::Failed,
            attempts: attempts.max(1),
            duration_ms: duration.as_millis() as u64,
            error: Some(StepError {
                kind,
                message: message.into(),
            }),
            skip_reason: None,
            can_retry: kind != FailureKind::Fatal,
        }
    }

    /// Create a skipped result.
    pub fn skipped(step_id: &str, reason: SkipReason) -> Self {
        Self {
            step_id: step_id.to_string(),
            status: StepStatus::Skipped,
            attempts: 1,
            duration_ms: 0,
            error: None,
            skip_reason: Some(reason),
            can_retry: false,
        }
    }

    /// Whether the step failed.
    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }

    /// Failure category, if failed.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    /// Generate a summary line for display.
    pub fn summary_line(&self) -> String {
        let marker = self.status.display_char();
        match self.status {
            StepStatus::Success if self.attempts > 1 => format!(
                "{} {} ({}ms, {} attempts)",
                marker, self.step_id, self.duration_ms, self.attempts
            ),
            StepStatus::Success => format!("{} {} ({}ms)", marker, self.step_id, self.duration_ms),
            StepStatus::Failed => {
                let error = self
                    .error
                    .as_ref()
                    .map(|e| e.message.as_str())
                    .unwrap_or("unknown error");
                format!("{} {} - {}", marker, self.step_id, error)
            }
            StepStatus::Skipped => {
                let reason = self
                    .skip_reason
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "skipped".to_string());
                format!("{} {} ({})", marker, self.step_id, reason)
            }
            _ => format!("{} {}", marker, self.step_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(!StepStatus::Pending.is_terminal());
        assert!(!StepStatus::Running.is_terminal());
        assert!(StepStatus::Success.is_terminal());
        assert!(StepStatus::Failed.is_terminal());
        assert!(StepStatus::Skipped.is_terminal());
    }

    #[test]
    fn failure_carries_error() {
        let result = StepResult::failure(
            "install",
            2,
            Duration::from_millis(40),
            FailureKind::Retryable,
            "network down",
        );
        assert!(result.is_failed());
        assert_eq!(result.failure_kind(), Some(FailureKind::Retryable));
        assert!(result.can_retry);
        assert!(result.skip_reason.is_none());
    }

    #[test]
    fn fatal_failure_cannot_retry() {
        let result =
            StepResult::failure("install", 1, Duration::ZERO, FailureKind::Fatal, "bad input");
        assert!(!result.can_retry);
    }

    #[test]
    fn success_has_no_error() {
        let result = StepResult::success("checks", 3, Duration::from_millis(12));
        assert_eq!(result.status, StepStatus::Success);
        assert_eq!(result.attempts, 3);
        assert!(result.error.is_none());
    }

    #[test]
    fn attempts_never_below_one() {
        let result = StepResult::failure("net", 0, Duration::ZERO, FailureKind::Cancelled, "cancelled");
        assert_eq!(result.attempts, 1);
        assert_eq!(StepResult::success("net", 0, Duration::ZERO).attempts, 1);
    }

    #[test]
    fn skipped_records_reason() {
        let result = StepResult::skipped("extras", SkipReason::OptionalExcluded);
        assert_eq!(result.status, StepStatus::Skipped);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.skip_reason, Some(SkipReason::OptionalExcluded));
    }

    #[test]
    fn summary_line_mentions_reason() {
        let result = StepResult::skipped("extras", SkipReason::DependencyFailed);
        assert!(result.summary_line().contains("dependency failed"));

        let failed =
            StepResult::failure("install", 1, Duration::ZERO, FailureKind::Fatal, "exit 2");
        assert!(failed.summary_line().contains("exit 2"));
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&StepStatus::Skipped).unwrap();
        assert_eq!(json, "\"skipped\"");
    }
}
