//! Executor that replays pre-programmed outcomes.
//!
//! Used for `--dry-run` (every step succeeds without side effects) and to
//! drive the orchestrator deterministically in tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::steps::StepDefinition;

use super::executor::{ExecutionContext, StepExecutor, StepOutcome};

#[derive(Debug, Default)]
struct Script {
    queued: HashMap<String, VecDeque<StepOutcome>>,
    calls: Vec<(String, u32)>,
}

/// Replays queued outcomes per step, defaulting to success.
///
/// # Example
///
/// ```
/// use trailhead::runner::{ScriptedExecutor, StepOutcome};
///
/// let executor = ScriptedExecutor::new()
///     .then("checks", StepOutcome::RetryableFailure("offline".into()))
///     .then("checks", StepOutcome::Success);
/// assert!(executor.calls().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    script: Mutex<Script>,
}

impl ScriptedExecutor {
    /// Create an executor where every step succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an outcome for the next unscripted attempt of `step_id`.
    pub fn then(self, step_id: &str, outcome: StepOutcome) -> Self {
        self.lock()
            .queued
            .entry(step_id.to_string())
            .or_default()
            .push_back(outcome);
        self
    }

    /// Queue `count` copies of an outcome.
    pub fn repeat(mut self, step_id: &str, outcome: StepOutcome, count: usize) -> Self {
        for _ in 0..count {
            self = self.then(step_id, outcome.clone());
        }
        self
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every `(step_id, attempt)` invocation so far.
    pub fn calls(&self) -> Vec<(String, u32)> {
        self.lock().calls.clone()
    }

    /// Number of invocations for one step.
    pub fn attempts_for(&self, step_id: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|(id, _)| id == step_id)
            .count()
    }
}

#[async_trait]
impl StepExecutor for ScriptedExecutor {
    async fn execute(&self, step: &StepDefinition, ctx: ExecutionContext) -> StepOutcome {
        let outcome = {
            let mut script = self.lock();
            script.calls.push((step.id.clone(), ctx.attempt));
            script
                .queued
                .get_mut(&step.id)
                .and_then(|q| q.pop_front())
                .unwrap_or(StepOutcome::Success)
        };

        ctx.progress.report(0, format!("{} started", step.display_title()));
        if outcome == StepOutcome::Success {
            ctx.progress.report(100, format!("{} done", step.display_title()));
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ProgressReporter;
    use tokio_util::sync::CancellationToken;

    fn ctx(step: &str, attempt: u32) -> ExecutionContext {
        ExecutionContext {
            attempt,
            cancel: CancellationToken::new(),
            progress: ProgressReporter::detached(step),
        }
    }

    #[tokio::test]
    async fn replays_queue_then_defaults_to_success() {
        let executor = ScriptedExecutor::new()
            .then("checks", StepOutcome::FatalFailure("no disk".into()));
        let step = StepDefinition::new("checks", 1);

        assert_eq!(
            executor.execute(&step, ctx("checks", 1)).await,
            StepOutcome::FatalFailure("no disk".into())
        );
        assert_eq!(executor.execute(&step, ctx("checks", 2)).await, StepOutcome::Success);
        assert_eq!(
            executor.calls(),
            vec![("checks".to_string(), 1), ("checks".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn repeat_queues_copies() {
        let executor =
            ScriptedExecutor::new().repeat("net", StepOutcome::RetryableFailure("x".into()), 2);
        let step = StepDefinition::new("net", 1);
        for attempt in 1..=2 {
            assert!(matches!(
                executor.execute(&step, ctx("net", attempt)).await,
                StepOutcome::RetryableFailure(_)
            ));
        }
        assert_eq!(executor.attempts_for("net"), 2);
    }
}
