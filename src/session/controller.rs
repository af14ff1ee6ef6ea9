//! Session controller.
//!
//! [`SessionController`] is the only component that drives both the
//! [`ExecutionEngine`] and the [`NavigationStateMachine`]. It pulls one
//! eligible step at a time from the engine, runs it, and feeds the terminal
//! result through a single `apply_result` path that updates `Session.results`
//! and the navigation state together.
//!
//! State lives behind a `std::sync::Mutex` that is never held across an
//! `.await`; events are collected while the lock is held and delivered to the
//! sink after it is released.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, TrailheadError, TransitionError};
use crate::events::{emit_session_finished, emit_step_completed, ProgressSink};
use crate::navigation::{NavigationState, NavigationStateMachine};
use crate::runner::{ExecutionEngine, Sleeper, StepExecutor, StepGraph};
use crate::steps::{FailureKind, SkipReason, StepDefinition, StepResult, StepStatus};

use super::{
    LogLevel, PersistenceStore, Session, SessionConfig, SessionId, SessionReport, SessionStatus,
};

/// Read-only summary of the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub status: SessionStatus,
    /// Terminal results recorded so far.
    pub recorded: usize,
    /// Steps the session walks.
    pub available: usize,
    /// Step currently executing, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_flight: Option<String>,
    pub elapsed_ms: u64,
}

/// Session summary plus navigation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session: SessionSummary,
    pub navigation: NavigationState,
}

enum Outgoing {
    Completed(StepResult),
    Finished(SessionReport),
}

/// Everything a step needs to run outside the lock.
struct Launch {
    session_id: SessionId,
    step: StepDefinition,
    statuses: HashMap<String, StepStatus>,
    config: SessionConfig,
    cancel: CancellationToken,
}

struct ActiveSession {
    session: Session,
    nav: NavigationStateMachine,
    cancel: CancellationToken,
    in_flight: Option<String>,
}

impl ActiveSession {
    fn statuses(&self) -> HashMap<String, StepStatus> {
        self.session.statuses()
    }

    fn frontier(&self, engine: &ExecutionEngine) -> Option<String> {
        engine
            .next_pending(&self.nav.state().available_steps, &self.statuses())
            .map(str::to_string)
    }

    /// Mark `step` in flight and capture what running it needs.
    fn launch(&mut self, step: StepDefinition) -> Launch {
        self.in_flight = Some(step.id.clone());
        self.session
            .log(LogLevel::Info, Some(&step.id), "started");
        Launch {
            session_id: self.session.id.clone(),
            statuses: self.statuses(),
            config: self.session.config.clone(),
            cancel: self.cancel.clone(),
            step,
        }
    }

    /// Clear the failed result of `step_id`, and the skips it caused, so the
    /// step and its dependents can run again.
    fn reopen_for_retry(&mut self, graph: &StepGraph, step_id: &str) {
        let dependents = graph.transitive_dependents(step_id);
        let retired = self.session.retire(|r| {
            r.step_id == step_id
                || (dependents.contains(&r.step_id)
                    && matches!(
                        r.skip_reason,
                        Some(SkipReason::DependencyFailed) | Some(SkipReason::DependencyUnmet)
                    ))
        });
        self.session.reopen();
        self.session.log(
            LogLevel::Info,
            Some(step_id),
            format!("retrying; {} earlier result(s) retired", retired),
        );
        info!("Retrying '{}' in session {}", step_id, self.session.id);
    }

    /// Walk navigation forward to `target` over steps that already ended.
    fn fast_forward(&mut self, target: &str) -> std::result::Result<(), TransitionError> {
        while self.nav.current() != target {
            let current = self.nav.current().to_string();
            let Some(next) = self.nav.next_step().map(str::to_string) else {
                return Err(TransitionError::UnknownStep {
                    id: target.to_string(),
                });
            };
            match self.session.result_for(&current).map(|r| r.status) {
                Some(StepStatus::Success) | Some(StepStatus::Skipped) => {
                    self.nav.advance_to(&next)?;
                }
                Some(StepStatus::Failed) => {
                    self.nav.step_past(&next)?;
                }
                _ => return Err(TransitionError::StepNotFinished { id: current }),
            }
        }
        Ok(())
    }

    /// Record a terminal result and move navigation in the same step.
    fn apply_result(
        &mut self,
        engine: &ExecutionEngine,
        result: StepResult,
        outbox: &mut Vec<Outgoing>,
    ) -> std::result::Result<(), TransitionError> {
        let step_id = result.step_id.clone();
        let next = self.nav.next_step().map(str::to_string);
        let on_current = self.nav.current() == step_id;

        match result.status {
            StepStatus::Skipped if result.skip_reason == Some(SkipReason::UserSkipped) => {
                self.nav.skip_current()?;
            }
            StepStatus::Success | StepStatus::Skipped => match next.as_deref() {
                Some(next) if on_current => {
                    self.nav.advance_to(next)?;
                }
                _ => self.nav.mark_completed(&step_id)?,
            },
            StepStatus::Failed => {
                if self.session.config.continue_on_error
                    && result.failure_kind() != Some(FailureKind::Cancelled)
                {
                    if let Some(next) = next.as_deref().filter(|_| on_current) {
                        self.nav.step_past(next)?;
                    }
                }
            }
            StepStatus::Pending | StepStatus::Running => {}
        }

        self.log_result(&result);
        let halts = result.is_failed()
            && (!self.session.config.continue_on_error
                || result.failure_kind() == Some(FailureKind::Cancelled));
        self.session.record(result.clone());
        outbox.push(Outgoing::Completed(result));

        match self.session.status {
            SessionStatus::Cancelled => self.finish(SessionStatus::Cancelled, outbox),
            _ if halts => self.finish(SessionStatus::Failed, outbox),
            _ if self.frontier(engine).is_none() => self.finish(SessionStatus::Completed, outbox),
            _ => {}
        }
        Ok(())
    }

    fn log_result(&mut self, result: &StepResult) {
        let step = Some(result.step_id.as_str());
        match result.status {
            StepStatus::Success => self.session.log(
                LogLevel::Info,
                step,
                format!("succeeded after {} attempt(s)", result.attempts),
            ),
            StepStatus::Failed => {
                let reason = result
                    .error
                    .as_ref()
                    .map(|e| e.message.clone())
                    .unwrap_or_default();
                self.session.log(
                    LogLevel::Error,
                    step,
                    format!("failed after {} attempt(s): {}", result.attempts, reason),
                );
            }
            _ => {
                let reason = result
                    .skip_reason
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "skipped".to_string());
                self.session
                    .log(LogLevel::Warn, step, format!("skipped: {}", reason));
            }
        }
    }

    fn finish(&mut self, status: SessionStatus, outbox: &mut Vec<Outgoing>) {
        if self.session.ended_at.is_some() {
            return;
        }
        self.session.finish(status);
        self.session
            .log(LogLevel::Info, None, format!("session {}", status));
        info!("Session {} {}", self.session.id, status);
        outbox.push(Outgoing::Finished(SessionReport::from_session(&self.session)));
    }

    fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.session.id.clone(),
            status: self.session.status,
            recorded: self.session.results.len(),
            available: self.nav.state().available_steps.len(),
            in_flight: self.in_flight.clone(),
            elapsed_ms: self.session.elapsed_ms(),
        }
    }
}

/// Owns one wizard session at a time.
pub struct SessionController {
    engine: ExecutionEngine,
    sink: Arc<dyn ProgressSink>,
    store: Option<Arc<dyn PersistenceStore>>,
    inner: Mutex<Option<ActiveSession>>,
}

impl SessionController {
    /// Create a controller for `graph`.
    pub fn new(
        graph: Arc<StepGraph>,
        executor: Arc<dyn StepExecutor>,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            engine: ExecutionEngine::new(graph, executor),
            sink,
            store: None,
            inner: Mutex::new(None),
        }
    }

    /// Replace the backoff sleeper.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.engine = self.engine.with_sleeper(sleeper);
        self
    }

    /// Persist sessions on pause and on completion.
    pub fn with_store(mut self, store: Arc<dyn PersistenceStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// The graph this controller runs.
    pub fn graph(&self) -> &Arc<StepGraph> {
        self.engine.graph()
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn deliver(&self, outbox: Vec<Outgoing>) {
        for event in outbox {
            match event {
                Outgoing::Completed(result) => emit_step_completed(self.sink.as_ref(), &result),
                Outgoing::Finished(report) => emit_session_finished(self.sink.as_ref(), &report),
            }
        }
    }

    /// Deliver a step's events, then let the next step start.
    ///
    /// The step stays in flight until its events are out, so no caller can
    /// start the following step and emit progress ahead of them.
    fn release(&self, session_id: &SessionId, outbox: Vec<Outgoing>) {
        self.deliver(outbox);

        let mut late = Vec::new();
        {
            let mut guard = self.lock();
            if let Some(active) = guard.as_mut().filter(|a| &a.session.id == session_id) {
                active.in_flight = None;
                // Cancelled while the events were going out.
                if active.session.status == SessionStatus::Cancelled
                    && active.session.ended_at.is_none()
                {
                    active.finish(SessionStatus::Cancelled, &mut late);
                    self.persist_quietly(active);
                }
            }
        }
        self.deliver(late);
    }

    fn save(&self, session: &Session, navigation: &NavigationState) -> anyhow::Result<()> {
        match &self.store {
            Some(store) => store.save(session, navigation),
            None => Ok(()),
        }
    }

    fn persist(&self, active: &ActiveSession) -> anyhow::Result<()> {
        self.save(&active.session, active.nav.state())
    }

    fn persist_quietly(&self, active: &ActiveSession) {
        if let Err(e) = self.persist(active) {
            warn!("Failed to save session {}: {:#}", active.session.id, e);
        }
    }

    /// Start a new session.
    ///
    /// Rejected while another session is active, paused, or still has a step
    /// in flight. Optional steps excluded by `skip_optional` are reported as
    /// skipped immediately.
    pub fn start(&self, config: SessionConfig) -> Result<SessionId> {
        let mut outbox = Vec::new();
        let id = {
            let mut guard = self.lock();
            if let Some(active) = guard.as_ref() {
                if !active.session.status.is_terminal() || active.in_flight.is_some() {
                    return Err(TrailheadError::SessionInProgress {
                        id: active.session.id.to_string(),
                        status: active.session.status.to_string(),
                    });
                }
            }

            let graph = self.engine.graph();
            config.validate(graph)?;
            let available = config.available_steps(graph);
            let excluded = config.excluded_steps(graph);

            let mut session = Session::new(config, excluded);
            let nav = NavigationStateMachine::new(graph.clone(), session.id.clone(), available)?;
            session.log(LogLevel::Info, None, "session started");
            for step in &session.excluded {
                outbox.push(Outgoing::Completed(StepResult::skipped(
                    step,
                    SkipReason::OptionalExcluded,
                )));
            }
            info!(
                "Started session {} with {} step(s)",
                session.id,
                nav.state().available_steps.len()
            );

            let id = session.id.clone();
            *guard = Some(ActiveSession {
                session,
                nav,
                cancel: CancellationToken::new(),
                in_flight: None,
            });
            id
        };
        self.deliver(outbox);
        Ok(id)
    }

    /// Drive steps until the session ends or is paused.
    pub async fn run(&self) -> Result<SessionStatus> {
        while self.run_next().await?.is_some() {}
        self.status()
    }

    /// Execute the next eligible step.
    ///
    /// Returns `None` when there is nothing to run: the session is paused or
    /// finished, or another caller has a step in flight.
    pub async fn run_next(&self) -> Result<Option<StepResult>> {
        let launch = {
            let mut guard = self.lock();
            let active = guard.as_mut().ok_or(TrailheadError::NoSession)?;
            if active.session.status != SessionStatus::Active || active.in_flight.is_some() {
                return Ok(None);
            }

            let Some(step_id) = active.frontier(&self.engine) else {
                let mut outbox = Vec::new();
                active.finish(SessionStatus::Completed, &mut outbox);
                self.persist_quietly(active);
                drop(guard);
                self.deliver(outbox);
                return Ok(None);
            };

            let step = self
                .engine
                .graph()
                .get(&step_id)
                .cloned()
                .ok_or_else(|| TransitionError::UnknownStep { id: step_id.clone() })?;
            active.fast_forward(&step_id)?;
            active.launch(step)
        };

        self.execute(launch).await
    }

    /// Run the current step again after it failed.
    ///
    /// Allowed when the current step's failure may be retried, including
    /// after that failure stopped the session, which becomes active again.
    /// Dependents skipped because of the failure become pending, so
    /// [`run`](Self::run) picks them up afterwards.
    pub async fn retry_current(&self) -> Result<StepResult> {
        let launch = {
            let mut guard = self.lock();
            let active = navigable(&mut guard)?;
            if active.session.status == SessionStatus::Paused {
                return Err(TrailheadError::InvalidLifecycle {
                    operation: "retry".to_string(),
                    status: active.session.status.to_string(),
                });
            }

            let current = active.nav.current().to_string();
            let retryable = active
                .session
                .result_for(&current)
                .is_some_and(|r| r.is_failed() && r.can_retry);
            if !retryable {
                return Err(TransitionError::CannotRetry { id: current }.into());
            }

            let graph = self.engine.graph().clone();
            let step = graph
                .get(&current)
                .cloned()
                .ok_or_else(|| TransitionError::UnknownStep { id: current.clone() })?;
            active.reopen_for_retry(&graph, &current);
            active.launch(step)
        };

        let session_id = launch.session_id.clone();
        self.execute(launch)
            .await?
            .ok_or(TrailheadError::SessionNotFound {
                id: session_id.to_string(),
            })
    }

    /// Run a launched step and apply its result.
    async fn execute(&self, launch: Launch) -> Result<Option<StepResult>> {
        debug!("Executing '{}' in session {}", launch.step.id, launch.session_id);
        let result = self
            .engine
            .execute_step(
                &launch.step,
                &launch.statuses,
                &launch.config,
                self.sink.clone(),
                &launch.cancel,
            )
            .await;

        let mut outbox = Vec::new();
        {
            let mut guard = self.lock();
            let Some(active) = guard
                .as_mut()
                .filter(|a| a.session.id == launch.session_id)
            else {
                warn!(
                    "Session {} was replaced while '{}' ran; result dropped",
                    launch.session_id, launch.step.id
                );
                return Ok(None);
            };
            if let Err(e) = active.apply_result(&self.engine, result.clone(), &mut outbox) {
                active.in_flight = None;
                return Err(e.into());
            }
            if active.session.status != SessionStatus::Active {
                self.persist_quietly(active);
            }
        }
        self.release(&launch.session_id, outbox);
        Ok(Some(result))
    }

    /// Move to the next step.
    ///
    /// The current step must have finished: succeeded, been skipped, or
    /// failed under `continue_on_error`.
    pub fn request_next(&self) -> Result<NavigationState> {
        let mut guard = self.lock();
        let active = navigable(&mut guard)?;

        let current = active.nav.current().to_string();
        let next = active
            .nav
            .next_step()
            .map(str::to_string)
            .ok_or_else(|| TransitionError::CannotGoForward {
                current: current.clone(),
            })?;

        match active.session.result_for(&current).map(|r| r.status) {
            Some(StepStatus::Success) | Some(StepStatus::Skipped) => {
                active.nav.advance_to(&next)?;
            }
            Some(StepStatus::Failed) if active.session.config.continue_on_error => {
                active.nav.step_past(&next)?;
            }
            Some(StepStatus::Failed) => {
                return Err(TransitionError::StepFailed { id: current }.into())
            }
            _ => return Err(TransitionError::StepNotFinished { id: current }.into()),
        }
        Ok(active.nav.state().clone())
    }

    /// Go back one history entry.
    pub fn request_previous(&self) -> Result<NavigationState> {
        let mut guard = self.lock();
        let active = navigable(&mut guard)?;
        active.nav.go_back()?;
        Ok(active.nav.state().clone())
    }

    /// Skip the current step, recording it as skipped by the user.
    pub fn request_skip(&self) -> Result<NavigationState> {
        let mut outbox = Vec::new();
        let (session_id, state) = {
            let mut guard = self.lock();
            let active = navigable(&mut guard)?;
            if active.session.status.is_terminal() {
                return Err(TransitionError::SessionNotNavigable {
                    status: active.session.status.to_string(),
                }
                .into());
            }

            let current = active.nav.current().to_string();
            if active.session.result_for(&current).is_some() {
                return Err(TransitionError::AlreadyFinished { id: current }.into());
            }
            if !active.nav.state().can_skip_current {
                return Err(TransitionError::NotSkippable { id: current }.into());
            }

            info!("User skipped '{}'", current);
            let result = StepResult::skipped(&current, SkipReason::UserSkipped);
            active.apply_result(&self.engine, result, &mut outbox)?;
            if active.session.status.is_terminal() {
                self.persist_quietly(active);
            }
            active.in_flight = Some(current);
            (active.session.id.clone(), active.nav.state().clone())
        };
        self.release(&session_id, outbox);
        Ok(state)
    }

    /// Pause between steps.
    ///
    /// A step already executing finishes first; no further step starts until
    /// [`resume`](Self::resume). The session is saved when a store is set;
    /// if saving fails it stays active.
    pub fn pause(&self) -> Result<SessionStatus> {
        let mut guard = self.lock();
        let active = guard.as_mut().ok_or(TrailheadError::NoSession)?;
        match active.session.status {
            SessionStatus::Paused => return Ok(SessionStatus::Paused),
            SessionStatus::Active => {}
            status => {
                return Err(TrailheadError::InvalidLifecycle {
                    operation: "pause".to_string(),
                    status: status.to_string(),
                })
            }
        }

        let mut paused = active.session.clone();
        paused.status = SessionStatus::Paused;
        paused.log(LogLevel::Info, None, "paused");
        self.save(&paused, active.nav.state())?;
        active.session = paused;
        info!("Session {} paused", active.session.id);
        Ok(SessionStatus::Paused)
    }

    /// Resume a paused session. Call [`run`](Self::run) to continue.
    pub fn resume(&self) -> Result<SessionStatus> {
        let mut guard = self.lock();
        let active = guard.as_mut().ok_or(TrailheadError::NoSession)?;
        match active.session.status {
            SessionStatus::Active => Ok(SessionStatus::Active),
            SessionStatus::Paused => {
                active.session.status = SessionStatus::Active;
                active.session.log(LogLevel::Info, None, "resumed");
                info!("Session {} resumed", active.session.id);
                Ok(SessionStatus::Active)
            }
            status => Err(TrailheadError::InvalidLifecycle {
                operation: "resume".to_string(),
                status: status.to_string(),
            }),
        }
    }

    /// Cancel the session.
    ///
    /// Signals the executing step, if any, and interrupts a pending backoff.
    /// Recorded results are kept.
    pub fn cancel(&self) -> Result<SessionStatus> {
        let mut outbox = Vec::new();
        {
            let mut guard = self.lock();
            let active = guard.as_mut().ok_or(TrailheadError::NoSession)?;
            match active.session.status {
                SessionStatus::Cancelled => return Ok(SessionStatus::Cancelled),
                SessionStatus::Active | SessionStatus::Paused => {}
                status => {
                    return Err(TrailheadError::InvalidLifecycle {
                        operation: "cancel".to_string(),
                        status: status.to_string(),
                    })
                }
            }

            active.cancel.cancel();
            active.session.status = SessionStatus::Cancelled;
            info!("Session {} cancelled", active.session.id);
            // The in-flight step reports the session once its result is in.
            if active.in_flight.is_none() {
                active.finish(SessionStatus::Cancelled, &mut outbox);
                self.persist_quietly(active);
            }
        }
        self.deliver(outbox);
        Ok(SessionStatus::Cancelled)
    }

    /// Restore a saved session and make it active.
    pub fn resume_from(&self, store: &dyn PersistenceStore, id: &SessionId) -> Result<SessionId> {
        let mut guard = self.lock();
        if let Some(active) = guard.as_ref() {
            if !active.session.status.is_terminal() || active.in_flight.is_some() {
                return Err(TrailheadError::SessionInProgress {
                    id: active.session.id.to_string(),
                    status: active.session.status.to_string(),
                });
            }
        }

        let (mut session, nav_state) =
            store
                .load(id)?
                .ok_or_else(|| TrailheadError::SessionNotFound { id: id.to_string() })?;
        if session.status.is_terminal() {
            return Err(TrailheadError::InvalidLifecycle {
                operation: "resume".to_string(),
                status: session.status.to_string(),
            });
        }
        if nav_state.session_id != session.id {
            return Err(TransitionError::SessionMismatch {
                expected: session.id.to_string(),
                actual: nav_state.session_id.to_string(),
            }
            .into());
        }

        let graph = self.engine.graph();
        session.config.validate(graph)?;
        let nav = NavigationStateMachine::restore(graph.clone(), nav_state)?;
        session.status = SessionStatus::Active;
        session.log(LogLevel::Info, None, "resumed from saved state");
        info!(
            "Resumed session {} at '{}' ({} result(s) recorded)",
            session.id,
            nav.current(),
            session.results.len()
        );

        let id = session.id.clone();
        *guard = Some(ActiveSession {
            session,
            nav,
            cancel: CancellationToken::new(),
            in_flight: None,
        });
        Ok(id)
    }

    /// Current session status.
    pub fn status(&self) -> Result<SessionStatus> {
        let guard = self.lock();
        guard
            .as_ref()
            .map(|a| a.session.status)
            .ok_or(TrailheadError::NoSession)
    }

    /// Read-only view of the session and navigation state.
    pub fn snapshot(&self) -> Result<SessionSnapshot> {
        let guard = self.lock();
        let active = guard.as_ref().ok_or(TrailheadError::NoSession)?;
        Ok(SessionSnapshot {
            session: active.summary(),
            navigation: active.nav.state().clone(),
        })
    }

    /// Copy of the full session record.
    pub fn session(&self) -> Option<Session> {
        self.lock().as_ref().map(|a| a.session.clone())
    }

    /// Final report, once the session has ended.
    pub fn report(&self) -> Option<SessionReport> {
        self.lock()
            .as_ref()
            .filter(|a| a.session.status.is_terminal() && a.in_flight.is_none())
            .map(|a| SessionReport::from_session(&a.session))
    }
}

fn navigable<'a>(
    guard: &'a mut MutexGuard<'_, Option<ActiveSession>>,
) -> Result<&'a mut ActiveSession> {
    let active = guard.as_mut().ok_or(TrailheadError::NoSession)?;
    if active.session.status == SessionStatus::Cancelled {
        return Err(TransitionError::SessionNotNavigable {
            status: active.session.status.to_string(),
        }
        .into());
    }
    if let Some(id) = &active.in_flight {
        return Err(TransitionError::StepInFlight { id: id.clone() }.into());
    }
    Ok(active)
}
