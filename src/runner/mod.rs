//! Step execution orchestration.

pub mod engine;
pub mod executor;
pub mod graph;
pub mod retry;
pub mod scripted;
pub mod sleep;

pub use engine::{ExecutionEngine, PassOutcome};
pub use executor::{ExecutionContext, ProgressReporter, StepExecutor, StepOutcome};
pub use graph::{canonical_order, find_cycle, DependencyCheck, StepGraph};
pub use retry::{AttemptState, AttemptVerdict, RetryPolicy};
pub use scripted::ScriptedExecutor;
pub use sleep::{InstantSleeper, Sleeper, TokioSleeper};
