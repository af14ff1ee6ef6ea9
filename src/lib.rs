//! Trailhead - guided setup wizard orchestration.
//!
//! Trailhead walks a user through an ordered set of setup steps. Steps form a
//! dependency graph, run with retry and backoff, and can be navigated, paused,
//! resumed and cancelled.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Wizard file loading and merging
//! - [`error`] - Error types and result aliases
//! - [`events`] - Progress events and sinks
//! - [`navigation`] - Where the user is, and where they may go
//! - [`runner`] - Step graph, retry policy and the execution engine
//! - [`session`] - Session lifecycle, persistence and reports
//! - [`shell`] - Shell command execution
//! - [`steps`] - Step definitions and results
//! - [`ui`] - Interactive prompts and terminal output
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use trailhead::events::NullSink;
//! use trailhead::runner::{ScriptedExecutor, StepGraph};
//! use trailhead::session::{SessionConfig, SessionController, SessionStatus};
//! use trailhead::steps::StepDefinition;
//!
//! let graph = StepGraph::load(vec![
//!     StepDefinition::new("welcome", 1),
//!     StepDefinition::new("install", 2).depends_on(["welcome"]),
//! ])
//! .unwrap();
//! let controller = SessionController::new(
//!     Arc::new(graph),
//!     Arc::new(ScriptedExecutor::new()),
//!     Arc::new(NullSink),
//! );
//! controller.start(SessionConfig::default()).unwrap();
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! assert_eq!(rt.block_on(controller.run()).unwrap(), SessionStatus::Completed);
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod navigation;
pub mod runner;
pub mod session;
pub mod shell;
pub mod steps;
pub mod ui;

pub use error::{Result, TrailheadError};
