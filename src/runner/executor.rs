//! The step executor seam.
//!
//! Step bodies (probing the network, invoking a package manager, ...) live
//! outside the orchestrator. They plug in through [`StepExecutor`], receive an
//! [`ExecutionContext`] per attempt, and answer with a [`StepOutcome`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::events::{emit_progress, NullSink, ProgressEvent, ProgressSink};
use crate::steps::StepDefinition;

/// What a single attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step finished.
    Success,
    /// A transient failure; the engine may retry per policy.
    RetryableFailure(String),
    /// A permanent failure; never retried.
    FatalFailure(String),
}

/// Runs the body of a step.
///
/// Implementations must be safe to call again for the same step on retry.
/// Cancellation is cooperative: an executor may watch `ctx.cancel` and return
/// early, or ignore it and run to completion.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Execute one attempt of `step`.
    async fn execute(&self, step: &StepDefinition, ctx: ExecutionContext) -> StepOutcome;
}

/// Per-attempt context handed to an executor.
#[derive(Clone)]
pub struct ExecutionContext {
    /// Attempt number, starting at 1.
    pub attempt: u32,
    /// Cancelled when the session is cancelled.
    pub cancel: CancellationToken,
    /// Progress callback channel for this attempt.
    pub progress: ProgressReporter,
}

/// Progress callback handle scoped to one attempt.
///
/// Once the attempt returns, the handle is closed and further reports are
/// dropped, so a straggling callback can never appear after the step's
/// terminal event.
#[derive(Clone)]
pub struct ProgressReporter {
    step_id: String,
    attempt: u32,
    sink: Arc<dyn ProgressSink>,
    open: Arc<AtomicBool>,
}

impl ProgressReporter {
    pub(crate) fn new(step_id: &str, attempt: u32, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            step_id: step_id.to_string(),
            attempt,
            sink,
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// A reporter connected to nothing, for driving executors directly.
    pub fn detached(step_id: &str) -> Self {
        Self::new(step_id, 1, Arc::new(NullSink))
    }

    /// Report progress. `percent` is clamped to 100.
    pub fn report(&self, percent: u8, message: impl Into<String>) {
        if !self.open.load(Ordering::Acquire) {
            return;
        }
        let event = ProgressEvent {
            step_id: self.step_id.clone(),
            attempt: self.attempt,
            progress: percent.min(100),
            message: message.into(),
        };
        emit_progress(self.sink.as_ref(), &event);
    }

    /// Whether reports are still delivered.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub(crate) fn close(&self) {
        self.open.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("step_id", &self.step_id)
            .field("attempt", &self.attempt)
            .field("open", &self.is_open())
            .finish()
    }
}
