//! Retry policy and the per-step attempt state machine.
//!
//! Each step runs through `Attempting -> Waiting(backoff) -> Attempting -> ...
//! -> Terminal`. The transitions are pure so they can be tested without
//! timers; the engine owns the actual awaiting.

use std::time::Duration;

use crate::session::SessionConfig;
use crate::steps::FailureKind;

use super::executor::StepOutcome;

/// Retry settings for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retry transient failures at all.
    pub auto_retry: bool,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Linear backoff unit.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            auto_retry: true,
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Take the retry fields of a session config.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            auto_retry: config.auto_retry,
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    /// Delay after `attempts` failed attempts: `attempts * base_delay`.
    pub fn backoff(&self, attempts: u32) -> Duration {
        self.base_delay.saturating_mul(attempts)
    }

    /// Whether a transient failure on attempt number `attempts` is retried.
    pub fn should_retry(&self, attempts: u32) -> bool {
        self.auto_retry && attempts <= self.max_retries
    }

    /// Upper bound on executor invocations for one step.
    pub fn max_attempts(&self) -> u32 {
        if self.auto_retry {
            self.max_retries + 1
        } else {
            1
        }
    }
}

/// How a step's attempts ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptVerdict {
    /// The last attempt succeeded.
    Succeeded { attempts: u32 },
    /// No further attempts will be made.
    Failed {
        attempts: u32,
        kind: FailureKind,
        reason: String,
    },
}

/// State of one step's attempt loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptState {
    /// About to invoke the executor for attempt `attempt`.
    Attempting { attempt: u32 },
    /// Attempt `attempt` failed transiently; waiting `delay` before the next.
    Waiting {
        attempt: u32,
        delay: Duration,
        reason: String,
    },
    /// Done.
    Terminal(AttemptVerdict),
}

impl AttemptState {
    /// Initial state: first attempt pending.
    pub fn start() -> Self {
        Self::Attempting { attempt: 1 }
    }

    /// Feed the outcome of the current attempt.
    pub fn on_outcome(self, outcome: StepOutcome, policy: &RetryPolicy) -> Self {
        let Self::Attempting { attempt } = self else {
            return self;
        };

        match outcome {
            StepOutcome::Success => Self::Terminal(AttemptVerdict::Succeeded { attempts: attempt }),
            StepOutcome::FatalFailure(reason) => Self::Terminal(AttemptVerdict::Failed {
                attempts: attempt,
                kind: FailureKind::Fatal,
                reason,
            }),
            StepOutcome::RetryableFailure(reason) if policy.should_retry(attempt) => Self::Waiting {
                attempt,
                delay: policy.backoff(attempt),
                reason,
            },
            StepOutcome::RetryableFailure(reason) => Self::Terminal(AttemptVerdict::Failed {
                attempts: attempt,
                kind: FailureKind::Retryable,
                reason,
            }),
        }
    }

    /// The backoff elapsed; move on to the next attempt.
    pub fn on_wake(self) -> Self {
        match self {
            Self::Waiting { attempt, .. } => Self::Attempting {
                attempt: attempt + 1,
            },
            other => other,
        }
    }

    /// Cancellation observed. `attempt_finished` says whether the executor
    /// already ran for the current attempt.
    ///
    /// The verdict counts at least one attempt, even when the executor was
    /// never reached.
    pub fn on_cancel(self, attempt_finished: bool) -> Self {
        let attempts = match self {
            Self::Attempting { attempt } if attempt_finished => attempt,
            Self::Attempting { attempt } => (attempt - 1).max(1),
            Self::Waiting { attempt, .. } => attempt,
            terminal @ Self::Terminal(_) => return terminal,
        };
        Self::Terminal(AttemptVerdict::Failed {
            attempts,
            kind: FailureKind::Cancelled,
            reason: "cancelled".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            auto_retry: true,
            max_retries,
            base_delay: Duration::from_millis(100),
        }
    }

    #[test]
    fn backoff_is_linear() {
        let p = policy(3);
        assert_eq!(p.backoff(1), Duration::from_millis(100));
        assert_eq!(p.backoff(2), Duration::from_millis(200));
        assert_eq!(p.backoff(3), Duration::from_millis(300));
    }

    #[test]
    fn success_terminates() {
        let state = AttemptState::start().on_outcome(StepOutcome::Success, &policy(3));
        assert_eq!(
            state,
            AttemptState::Terminal(AttemptVerdict::Succeeded { attempts: 1 })
        );
    }

    #[test]
    fn retryable_failure_waits_then_attempts_again() {
        let p = policy(3);
        let state = AttemptState::start().on_outcome(StepOutcome::RetryableFailure("x".into()), &p);
        assert!(matches!(
            state,
            AttemptState::Waiting { attempt: 1, delay, .. } if delay == Duration::from_millis(100)
        ));
        assert_eq!(state.on_wake(), AttemptState::Attempting { attempt: 2 });
    }

    #[test]
    fn retries_stop_after_max_retries_plus_one_attempts() {
        let p = policy(2);
        let mut state = AttemptState::start();
        let mut invocations = 0;
        while let AttemptState::Attempting { .. } = state {
            invocations += 1;
            state = state
                .on_outcome(StepOutcome::RetryableFailure("flaky".into()), &p)
                .on_wake();
        }
        assert_eq!(invocations, 3);
        assert_eq!(p.max_attempts(), 3);
        assert!(matches!(
            state,
            AttemptState::Terminal(AttemptVerdict::Failed {
                attempts: 3,
                kind: FailureKind::Retryable,
                ..
            })
        ));
    }

    #[test]
    fn fatal_failure_never_retries() {
        let state =
            AttemptState::start().on_outcome(StepOutcome::FatalFailure("broken".into()), &policy(5));
        assert!(matches!(
            state,
            AttemptState::Terminal(AttemptVerdict::Failed {
                attempts: 1,
                kind: FailureKind::Fatal,
                ..
            })
        ));
    }

    #[test]
    fn auto_retry_disabled_fails_first_transient() {
        let p = RetryPolicy {
            auto_retry: false,
            ..policy(3)
        };
        let state = AttemptState::start().on_outcome(StepOutcome::RetryableFailure("x".into()), &p);
        assert!(matches!(
            state,
            AttemptState::Terminal(AttemptVerdict::Failed { attempts: 1, .. })
        ));
        assert_eq!(p.max_attempts(), 1);
    }

    #[test]
    fn cancel_counts_only_finished_attempts() {
        assert!(matches!(
            AttemptState::start().on_cancel(false),
            AttemptState::Terminal(AttemptVerdict::Failed {
                attempts: 1,
                kind: FailureKind::Cancelled,
                ..
            })
        ));
        assert!(matches!(
            AttemptState::start().on_cancel(true),
            AttemptState::Terminal(AttemptVerdict::Failed { attempts: 1, .. })
        ));

        let waiting = AttemptState::Waiting {
            attempt: 2,
            delay: Duration::from_secs(1),
            reason: "x".into(),
        };
        assert!(matches!(
            waiting.on_cancel(false),
            AttemptState::Terminal(AttemptVerdict::Failed { attempts: 2, .. })
        ));

        let woken = AttemptState::Attempting { attempt: 3 };
        assert!(matches!(
            woken.on_cancel(false),
            AttemptState::Terminal(AttemptVerdict::Failed { attempts: 2, .. })
        ));
    }
}
