//! Step execution engine.
//!
//! [`ExecutionEngine`] runs steps against a [`StepGraph`] through an injected
//! [`StepExecutor`], applying the skip, eligibility, retry and
//! continue-on-error rules. Step failures never escape as errors: every call
//! ends in a [`StepResult`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{emit_step_completed, ProgressSink};
use crate::session::SessionConfig;
use crate::steps::{FailureKind, SkipReason, StepDefinition, StepResult, StepStatus};

use super::executor::{ExecutionContext, ProgressReporter, StepExecutor};
use super::graph::{DependencyCheck, StepGraph};
use super::retry::{AttemptState, AttemptVerdict, RetryPolicy};
use super::sleep::{Sleeper, TokioSleeper};

/// Result of a stand-alone pass over the whole graph.
#[derive(Debug, Clone, Default)]
pub struct PassOutcome {
    /// Terminal results in execution order.
    pub results: Vec<StepResult>,
    /// Step whose failure stopped the pass, when `continue_on_error` is off.
    pub halted_at: Option<String>,
    /// Whether the pass ended because of cancellation.
    pub cancelled: bool,
}

impl PassOutcome {
    /// Status of a step in this pass, if it was reached.
    pub fn status_of(&self, step_id: &str) -> Option<StepStatus> {
        self.results
            .iter()
            .find(|r| r.step_id == step_id)
            .map(|r| r.status)
    }
}

/// Drives steps through an executor with retry and dependency handling.
pub struct ExecutionEngine {
    graph: Arc<StepGraph>,
    executor: Arc<dyn StepExecutor>,
    sleeper: Arc<dyn Sleeper>,
}

impl ExecutionEngine {
    /// Create an engine that sleeps on the tokio timer.
    pub fn new(graph: Arc<StepGraph>, executor: Arc<dyn StepExecutor>) -> Self {
        Self {
            graph,
            executor,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the backoff sleeper.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// The graph this engine runs.
    pub fn graph(&self) -> &Arc<StepGraph> {
        &self.graph
    }

    /// First step in `available` without a terminal status.
    pub fn next_pending<'a>(
        &self,
        available: &'a [String],
        statuses: &HashMap<String, StepStatus>,
    ) -> Option<&'a str> {
        available
            .iter()
            .find(|id| !statuses.get(*id).is_some_and(|s| s.is_terminal()))
            .map(String::as_str)
    }

    /// Run one step to a terminal result.
    ///
    /// `statuses` holds the terminal statuses recorded so far in the session
    /// and decides eligibility. Progress callbacks go to `sink`; the terminal
    /// result is returned, not emitted.
    pub async fn execute_step(
        &self,
        step: &StepDefinition,
        statuses: &HashMap<String, StepStatus>,
        config: &SessionConfig,
        sink: Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> StepResult {
        if config.skip_optional && step.optional {
            debug!("Step '{}' is optional and excluded", step.id);
            return StepResult::skipped(&step.id, SkipReason::OptionalExcluded);
        }

        match self.graph.check_dependencies(&step.id, statuses) {
            DependencyCheck::Satisfied => {}
            DependencyCheck::Failed(dep) => {
                info!("Skipping '{}': dependency '{}' failed", step.id, dep);
                return StepResult::skipped(&step.id, SkipReason::DependencyFailed);
            }
            DependencyCheck::Unmet(dep) => {
                info!("Skipping '{}': dependency '{}' not satisfied", step.id, dep);
                return StepResult::skipped(&step.id, SkipReason::DependencyUnmet);
            }
        }

        let policy = RetryPolicy::from_config(config);
        let start = Instant::now();
        let mut state = AttemptState::start();

        let verdict = loop {
            state = match state {
                AttemptState::Attempting { attempt } => {
                    if cancel.is_cancelled() {
                        state.on_cancel(false)
                    } else {
                        debug!("Running '{}' (attempt {}/{})", step.id, attempt, policy.max_attempts());
                        let progress = ProgressReporter::new(&step.id, attempt, sink.clone());
                        let ctx = ExecutionContext {
                            attempt,
                            cancel: cancel.clone(),
                            progress: progress.clone(),
                        };
                        let outcome = self.executor.execute(step, ctx).await;
                        progress.close();

                        if cancel.is_cancelled() {
                            info!("Step '{}' cancelled during attempt {}", step.id, attempt);
                            state.on_cancel(true)
                        } else {
                            state.on_outcome(outcome, &policy)
                        }
                    }
                }
                AttemptState::Waiting {
                    attempt,
                    delay,
                    ref reason,
                } => {
                    warn!(
                        "Step '{}' failed (attempt {}): {}; retrying in {:?}",
                        step.id, attempt, reason, delay
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            info!("Backoff for '{}' interrupted by cancellation", step.id);
                            state.on_cancel(false)
                        }
                        _ = self.sleeper.sleep(delay) => state.on_wake(),
                    }
                }
                AttemptState::Terminal(verdict) => break verdict,
            };
        };

        let elapsed = start.elapsed();
        match verdict {
            AttemptVerdict::Succeeded { attempts } => {
                info!("Step '{}' succeeded after {} attempt(s)", step.id, attempts);
                StepResult::success(&step.id, attempts, elapsed)
            }
            AttemptVerdict::Failed {
                attempts,
                kind,
                reason,
            } => {
                warn!("Step '{}' failed after {} attempt(s): {}", step.id, attempts, reason);
                StepResult::failure(&step.id, attempts, elapsed, kind, reason)
            }
        }
    }

    /// Drive one full pass over the graph (or `config.order`).
    ///
    /// Emits every progress event and one step-completed event per result.
    /// Stops at the first failure unless `continue_on_error` is set; stops
    /// without recording further steps once `cancel` fires.
    pub async fn run_pass(
        &self,
        config: &SessionConfig,
        sink: Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> PassOutcome {
        let order = config
            .order
            .clone()
            .unwrap_or_else(|| self.graph.topological_order());
        let mut statuses: HashMap<String, StepStatus> = HashMap::new();
        let mut outcome = PassOutcome::default();

        for id in &order {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }
            let Some(step) = self.graph.get(id) else {
                continue;
            };

            let result = self
                .execute_step(step, &statuses, config, sink.clone(), cancel)
                .await;
            statuses.insert(result.step_id.clone(), result.status);
            emit_step_completed(sink.as_ref(), &result);

            let failed = result.is_failed();
            let cancelled = result.failure_kind() == Some(FailureKind::Cancelled);
            outcome.results.push(result);

            if cancelled {
                outcome.cancelled = true;
                break;
            }
            if failed && !config.continue_on_error {
                outcome.halted_at = Some(id.clone());
                break;
            }
        }

        outcome
    }
}
