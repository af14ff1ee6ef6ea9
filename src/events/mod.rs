//! Progress events and sinks.
//!
//! The engine and controller report through a single [`ProgressSink`] passed
//! in at construction. Delivery is fire-and-forget: a sink that returns an
//! error is logged and otherwise ignored, so a broken presentation layer can
//! never abort a run.
//!
//! Provided sinks:
//! - [`NullSink`] - discards everything
//! - [`ChannelSink`] - forwards [`WizardEvent`]s over a tokio channel
//! - [`RecordingSink`] - keeps events in memory for later assertion

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::session::SessionReport;
use crate::steps::StepResult;

/// Progress reported by a step executor during one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Step being executed.
    pub step_id: String,
    /// Attempt number, starting at 1.
    pub attempt: u32,
    /// Percentage complete, 0-100.
    pub progress: u8,
    /// Free-form status message.
    pub message: String,
}

/// Any event delivered to the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WizardEvent {
    /// Executor progress callback.
    Progress(ProgressEvent),
    /// A step reached a terminal status.
    StepCompleted(StepResult),
    /// The session reached a terminal status.
    SessionFinished(SessionReport),
}

/// Receiver of orchestration events.
pub trait ProgressSink: Send + Sync {
    /// Called once per executor progress callback.
    fn on_progress(&self, event: &ProgressEvent) -> anyhow::Result<()>;

    /// Called once per terminal step result.
    fn on_step_completed(&self, result: &StepResult) -> anyhow::Result<()>;

    /// Called once when a session ends.
    fn on_session_finished(&self, report: &SessionReport) -> anyhow::Result<()>;
}

pub(crate) fn emit_progress(sink: &dyn ProgressSink, event: &ProgressEvent) {
    if let Err(e) = sink.on_progress(event) {
        warn!("Progress delivery for '{}' failed: {:#}", event.step_id, e);
    }
}

pub(crate) fn emit_step_completed(sink: &dyn ProgressSink, result: &StepResult) {
    if let Err(e) = sink.on_step_completed(result) {
        warn!("Result delivery for '{}' failed: {:#}", result.step_id, e);
    }
}

pub(crate) fn emit_session_finished(sink: &dyn ProgressSink, report: &SessionReport) {
    if let Err(e) = sink.on_session_finished(report) {
        warn!("Report delivery for {} failed: {:#}", report.session_id, e);
    }
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_progress(&self, _event: &ProgressEvent) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_step_completed(&self, _result: &StepResult) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_session_finished(&self, _report: &SessionReport) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Sink that forwards events over an unbounded tokio channel.
///
/// Events arrive in emission order. Once the receiver is dropped, sends fail
/// and are logged by the orchestrator.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<WizardEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver that observes it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WizardEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: WizardEvent) -> anyhow::Result<()> {
        self.tx
            .send(event)
            .map_err(|_| anyhow::anyhow!("event receiver dropped"))
    }
}

impl ProgressSink for ChannelSink {
    fn on_progress(&self, event: &ProgressEvent) -> anyhow::Result<()> {
        self.send(WizardEvent::Progress(event.clone()))
    }

    fn on_step_completed(&self, result: &StepResult) -> anyhow::Result<()> {
        self.send(WizardEvent::StepCompleted(result.clone()))
    }

    fn on_session_finished(&self, report: &SessionReport) -> anyhow::Result<()> {
        self.send(WizardEvent::SessionFinished(report.clone()))
    }
}

/// Sink that records every event in memory.
///
/// # Example
///
/// ```
/// use trailhead::events::{ProgressSink, RecordingSink};
/// use trailhead::steps::{SkipReason, StepResult};
///
/// let sink = RecordingSink::new();
/// sink.on_step_completed(&StepResult::skipped("extras", SkipReason::UserSkipped)).unwrap();
/// assert_eq!(sink.completed_ids(), vec!["extras"]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<WizardEvent>>>,
}

impl RecordingSink {
    /// Create an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<WizardEvent>> {
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every event, in delivery order.
    pub fn events(&self) -> Vec<WizardEvent> {
        self.lock().clone()
    }

    /// Progress events only.
    pub fn progress(&self) -> Vec<ProgressEvent> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                WizardEvent::Progress(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    /// Step results only.
    pub fn completed(&self) -> Vec<StepResult> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                WizardEvent::StepCompleted(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    /// Ids of completed steps, in order.
    pub fn completed_ids(&self) -> Vec<String> {
        self.completed().into_iter().map(|r| r.step_id).collect()
    }

    /// Session reports only.
    pub fn reports(&self) -> Vec<SessionReport> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                WizardEvent::SessionFinished(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn on_progress(&self, event: &ProgressEvent) -> anyhow::Result<()> {
        self.lock().push(WizardEvent::Progress(event.clone()));
        Ok(())
    }

    fn on_step_completed(&self, result: &StepResult) -> anyhow::Result<()> {
        self.lock().push(WizardEvent::StepCompleted(result.clone()));
        Ok(())
    }

    fn on_session_finished(&self, report: &SessionReport) -> anyhow::Result<()> {
        self.lock().push(WizardEvent::SessionFinished(report.clone()));
        Ok(())
    }
}
