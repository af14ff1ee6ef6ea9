//! Error types for wizard orchestration.
//!
//! This module defines [`TrailheadError`], the error type surfaced at API call
//! sites, the two failure families it wraps ([`ValidationError`] and
//! [`TransitionError`]), and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Step-level failures are never errors; they become `StepResult` values
//! - `ValidationError` rejects malformed graphs and configs before execution
//! - `TransitionError` rejects illegal navigation requests, state unchanged
//! - Use `anyhow::Error` (via `TrailheadError::Other`) for unexpected errors

use std::path::PathBuf;
use thiserror::Error;

/// A malformed step graph or session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The graph has no steps.
    #[error("Wizard has no steps")]
    EmptyGraph,

    /// Two steps share an id.
    #[error("Duplicate step id '{id}'")]
    DuplicateStep { id: String },

    /// A `depends_on` entry names a step that does not exist.
    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    /// The dependency relation contains a cycle.
    #[error("Circular dependency detected: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    /// An optional step was declared non-skippable.
    #[error("Step '{id}' is optional and must be skippable")]
    OptionalNotSkippable { id: String },

    /// Order values are not unique or not a contiguous `1..=N` sequence.
    #[error("Invalid step order: {message}")]
    InvalidOrder { message: String },

    /// A step is ordered before one of its dependencies.
    #[error("Step '{step}' (order {order}) is ordered before its dependency '{dependency}'")]
    OrderViolatesDependency {
        step: String,
        order: u32,
        dependency: String,
    },

    /// Session policy values are out of range or inconsistent with the graph.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// An illegal navigation request. The navigation state is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// Back navigation needs at least two history entries.
    #[error("No previous step to go back to")]
    NoPreviousStep,

    /// The current step is the last available step.
    #[error("Cannot move forward from '{current}'")]
    CannotGoForward { current: String },

    /// Forward moves may only target the step immediately after the current one.
    #[error("'{target}' is not the step after '{current}'")]
    NotNextStep { current: String, target: String },

    /// The current step does not allow skipping.
    #[error("Step '{id}' cannot be skipped")]
    NotSkippable { id: String },

    /// The step is not part of the available steps.
    #[error("Step '{id}' is not available in this session")]
    UnknownStep { id: String },

    /// The current step has not reached a state that allows moving past it.
    #[error("Step '{id}' has not finished")]
    StepNotFinished { id: String },

    /// The current step failed and the session stopped there. Retry or go back.
    #[error("Step '{id}' failed; retry it or go back")]
    StepFailed { id: String },

    /// The current step has no failure that may be retried.
    #[error("Step '{id}' cannot be retried")]
    CannotRetry { id: String },

    /// The current step already has a terminal result.
    #[error("Step '{id}' has already finished")]
    AlreadyFinished { id: String },

    /// A step is executing; navigation waits for it to finish.
    #[error("Step '{id}' is still running")]
    StepInFlight { id: String },

    /// An update carried a different session id.
    #[error("Navigation state belongs to session {actual}, expected {expected}")]
    SessionMismatch { expected: String, actual: String },

    /// An update did not advance the logical clock.
    #[error("Stale navigation update (revision {offered} <= {current})")]
    StaleRevision { current: u64, offered: u64 },

    /// The session is in a state where navigation requests are refused.
    #[error("Session is {status}; navigation is not possible")]
    SessionNotNavigable { status: String },
}

/// Core error type for orchestration operations.
#[derive(Debug, Error)]
pub enum TrailheadError {
    /// Malformed graph or configuration.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Illegal navigation request.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// `start()` was called while another session is still in progress.
    #[error("Session {id} is still {status}; cancel it before starting a new one")]
    SessionInProgress { id: String, status: String },

    /// An operation needs a session but none has been started.
    #[error("No session has been started")]
    NoSession,

    /// A lifecycle operation is not legal in the session's current status.
    #[error("Cannot {operation} a session that is {status}")]
    InvalidLifecycle { operation: String, status: String },

    /// A saved session could not be found.
    #[error("Session not found: {id}")]
    SessionNotFound { id: String },

    /// Wizard definition file not found at expected location.
    #[error("Wizard definition not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse wizard definition file.
    #[error("Failed to parse wizard definition at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for orchestration operations.
pub type Result<T> = std::result::Result<T, TrailheadError>;
