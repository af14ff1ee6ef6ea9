//! Step definitions and results.
//!
//! - [`StepDefinition`] - An immutable step as loaded into a graph
//! - [`StepStatus`] - Track step execution state
//! - [`StepResult`] - Terminal outcome of a step within a session
//!
//! # Example
//!
//! ```
//! use trailhead::steps::{StepDefinition, StepResult, StepStatus, SkipReason};
//!
//! let step = StepDefinition::new("extras", 4).optional();
//! assert!(step.skippable);
//!
//! let result = StepResult::skipped(&step.id, SkipReason::OptionalExcluded);
//! assert_eq!(result.status, StepStatus::Skipped);
//! ```

pub mod definition;
pub mod result;

pub use definition::StepDefinition;
pub use result::{FailureKind, SkipReason, StepError, StepResult, StepStatus};
