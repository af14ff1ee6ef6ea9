//! Navigation state machine.
//!
//! The position is implicit (any id in `available_steps`); the capability
//! flags are recomputed after every transition rather than stored as
//! separate states. Every transition builds a candidate state and commits it
//! through one checkpoint that enforces the invariants:
//!
//! - `session_id` never changes
//! - `revision` strictly increases
//! - `current_step_id` stays inside `available_steps`
//! - `completed_steps` never shrinks
//!
//! A rejected transition leaves the state untouched.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::error::{TransitionError, ValidationError};
use crate::runner::StepGraph;
use crate::session::SessionId;

use super::state::{progress_percentage, NavigationState, HISTORY_LIMIT};

/// Tracks the user's position, history and completed steps.
#[derive(Debug, Clone)]
pub struct NavigationStateMachine {
    graph: Arc<StepGraph>,
    state: NavigationState,
}

impl NavigationStateMachine {
    /// Start at the first available step.
    pub fn new(
        graph: Arc<StepGraph>,
        session_id: SessionId,
        available_steps: Vec<String>,
    ) -> Result<Self, ValidationError> {
        let Some(first) = available_steps.first().cloned() else {
            return Err(ValidationError::InvalidConfig {
                message: "no steps available to navigate".to_string(),
            });
        };
        if let Some(unknown) = available_steps.iter().find(|id| !graph.contains(id)) {
            return Err(ValidationError::InvalidConfig {
                message: format!("available step '{}' is not in the graph", unknown),
            });
        }

        let mut state = NavigationState {
            session_id,
            current_step_id: first.clone(),
            completed_steps: BTreeSet::new(),
            available_steps,
            history: VecDeque::from([first]),
            can_go_back: false,
            can_go_forward: false,
            can_skip_current: false,
            progress_percentage: 0,
            revision: 1,
            updated_at: Utc::now(),
        };
        recompute(&graph, &mut state);

        Ok(Self { graph, state })
    }

    /// Rebuild a machine from a previously saved state.
    pub fn restore(graph: Arc<StepGraph>, state: NavigationState) -> Result<Self, TransitionError> {
        if let Some(unknown) = state.available_steps.iter().find(|id| !graph.contains(id)) {
            return Err(TransitionError::UnknownStep {
                id: unknown.clone(),
            });
        }
        if state.index_of(&state.current_step_id).is_none() {
            return Err(TransitionError::UnknownStep {
                id: state.current_step_id.clone(),
            });
        }

        let mut state = state;
        recompute(&graph, &mut state);
        Ok(Self { graph, state })
    }

    /// Current snapshot.
    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    /// Current step id.
    pub fn current(&self) -> &str {
        &self.state.current_step_id
    }

    /// Step after the current one.
    pub fn next_step(&self) -> Option<&str> {
        self.state.next_step_id()
    }

    /// Move to `next_id`, marking the current step complete.
    ///
    /// Legal only when a step follows the current one and `next_id` is
    /// exactly that step.
    pub fn advance_to(&mut self, next_id: &str) -> Result<&NavigationState, TransitionError> {
        let mut candidate = self.forward_candidate(next_id)?;
        let current = self.state.current_step_id.clone();
        candidate.completed_steps.insert(current);
        self.enter(candidate, next_id)
    }

    /// Move to `next_id` without marking the current step complete.
    ///
    /// Used to pass over a step that ended in failure when the session
    /// continues on error.
    pub fn step_past(&mut self, next_id: &str) -> Result<&NavigationState, TransitionError> {
        let candidate = self.forward_candidate(next_id)?;
        self.enter(candidate, next_id)
    }

    /// Return to the previous history entry.
    ///
    /// Completed steps stay completed.
    pub fn go_back(&mut self) -> Result<&NavigationState, TransitionError> {
        if !self.state.can_go_back || self.state.history.len() < 2 {
            return Err(TransitionError::NoPreviousStep);
        }

        let mut candidate = self.state.clone();
        candidate.history.pop_back();
        let Some(previous) = candidate.history.back().cloned() else {
            return Err(TransitionError::NoPreviousStep);
        };
        candidate.current_step_id = previous;
        self.commit(candidate)?;
        debug!("Navigated back to '{}'", self.state.current_step_id);
        Ok(&self.state)
    }

    /// Skip the current step: like [`advance_to`](Self::advance_to) the next
    /// step, or just mark it complete when it is the last one.
    ///
    /// Returns the id of the skipped step.
    pub fn skip_current(&mut self) -> Result<String, TransitionError> {
        let skipped = self.state.current_step_id.clone();
        if !self.state.can_skip_current {
            return Err(TransitionError::NotSkippable { id: skipped });
        }

        match self.next_step().map(str::to_string) {
            Some(next) => {
                self.advance_to(&next)?;
            }
            None => self.mark_completed(&skipped)?,
        }
        Ok(skipped)
    }

    /// Mark a step complete without moving.
    pub fn mark_completed(&mut self, step_id: &str) -> Result<(), TransitionError> {
        if self.state.index_of(step_id).is_none() {
            return Err(TransitionError::UnknownStep {
                id: step_id.to_string(),
            });
        }
        if self.state.is_completed(step_id) {
            return Ok(());
        }

        let mut candidate = self.state.clone();
        candidate.completed_steps.insert(step_id.to_string());
        self.commit(candidate)
    }

    /// Replace the state with an externally produced one.
    ///
    /// The update must belong to the same session, carry a newer revision,
    /// and keep every completed step.
    pub fn apply(&mut self, update: NavigationState) -> Result<&NavigationState, TransitionError> {
        if update.revision <= self.state.revision {
            return Err(TransitionError::StaleRevision {
                current: self.state.revision,
                offered: update.revision,
            });
        }
        self.validate(&update)?;

        let mut update = update;
        while update.history.len() > HISTORY_LIMIT {
            update.history.pop_front();
        }
        recompute(&self.graph, &mut update);
        self.state = update;
        Ok(&self.state)
    }

    fn forward_candidate(&self, next_id: &str) -> Result<NavigationState, TransitionError> {
        let current = &self.state.current_step_id;
        if !self.state.can_go_forward {
            return Err(TransitionError::CannotGoForward {
                current: current.clone(),
            });
        }
        if self.state.index_of(next_id).is_none() {
            return Err(TransitionError::UnknownStep {
                id: next_id.to_string(),
            });
        }
        if self.next_step() != Some(next_id) {
            return Err(TransitionError::NotNextStep {
                current: current.clone(),
                target: next_id.to_string(),
            });
        }
        Ok(self.state.clone())
    }

    fn enter(
        &mut self,
        mut candidate: NavigationState,
        next_id: &str,
    ) -> Result<&NavigationState, TransitionError> {
        candidate.current_step_id = next_id.to_string();
        candidate.history.push_back(next_id.to_string());
        while candidate.history.len() > HISTORY_LIMIT {
            candidate.history.pop_front();
        }
        self.commit(candidate)?;
        debug!(
            "Navigated to '{}' ({}%)",
            self.state.current_step_id, self.state.progress_percentage
        );
        Ok(&self.state)
    }

    /// Single checkpoint for every transition.
    fn commit(&mut self, mut candidate: NavigationState) -> Result<(), TransitionError> {
        candidate.revision = self.state.revision + 1;
        candidate.updated_at = Utc::now();
        self.validate(&candidate)?;
        recompute(&self.graph, &mut candidate);
        self.state = candidate;
        Ok(())
    }

    fn validate(&self, candidate: &NavigationState) -> Result<(), TransitionError> {
        if candidate.session_id != self.state.session_id {
            return Err(TransitionError::SessionMismatch {
                expected: self.state.session_id.to_string(),
                actual: candidate.session_id.to_string(),
            });
        }
        if candidate.revision <= self.state.revision {
            return Err(TransitionError::StaleRevision {
                current: self.state.revision,
                offered: candidate.revision,
            });
        }
        if candidate.index_of(&candidate.current_step_id).is_none() {
            return Err(TransitionError::UnknownStep {
                id: candidate.current_step_id.clone(),
            });
        }
        if let Some(lost) = self
            .state
            .completed_steps
            .iter()
            .find(|id| !candidate.completed_steps.contains(*id))
        {
            return Err(TransitionError::StepNotFinished { id: lost.clone() });
        }
        Ok(())
    }
}

fn recompute(graph: &StepGraph, state: &mut NavigationState) {
    let index = state.current_index();
    state.can_go_back = state.history.len() >= 2;
    state.can_go_forward = index + 1 < state.available_steps.len();
    state.can_skip_current = graph
        .get(&state.current_step_id)
        .is_some_and(|s| s.skippable);
    state.progress_percentage =
        progress_percentage(state.completed_steps.len(), state.available_steps.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::StepDefinition;

    fn graph() -> Arc<StepGraph> {
        Arc::new(
            StepGraph::load(vec![
                StepDefinition::new("welcome", 1),
                StepDefinition::new("checks", 2).depends_on(["welcome"]),
                StepDefinition::new("extras", 3).optional().depends_on(["welcome"]),
                StepDefinition::new("install", 4).depends_on(["checks"]),
            ])
            .unwrap(),
        )
    }

    fn machine() -> NavigationStateMachine {
        let graph = graph();
        let available = graph.topological_order();
        NavigationStateMachine::new(graph, SessionId::new(), available).unwrap()
    }

    #[test]
    fn starts_at_first_step() {
        let m = machine();
        let s = m.state();
        assert_eq!(s.current_step_id, "welcome");
        assert_eq!(s.history, VecDeque::from(["welcome".to_string()]));
        assert!(!s.can_go_back);
        assert!(s.can_go_forward);
        assert!(!s.can_skip_current);
        assert_eq!(s.progress_percentage, 0);
        assert_eq!(s.revision, 1);
    }

    #[test]
    fn rejects_empty_available_steps() {
        assert!(NavigationStateMachine::new(graph(), SessionId::new(), vec![]).is_err());
    }

    #[test]
    fn advance_marks_current_complete() {
        let mut m = machine();
        let s = m.advance_to("checks").unwrap();
        assert_eq!(s.current_step_id, "checks");
        assert!(s.is_completed("welcome"));
        assert!(s.can_go_back);
        assert_eq!(s.progress_percentage, 25);
        assert_eq!(s.revision, 2);
    }

    #[test]
    fn advance_rejects_jumps() {
        let mut m = machine();
        let before = m.state().clone();
        assert!(matches!(
            m.advance_to("install"),
            Err(TransitionError::NotNextStep { .. })
        ));
        assert!(matches!(
            m.advance_to("nowhere"),
            Err(TransitionError::UnknownStep { .. })
        ));
        assert_eq!(m.state(), &before);
    }

    #[test]
    fn advance_rejected_at_last_step() {
        let mut m = machine();
        m.advance_to("checks").unwrap();
        m.advance_to("extras").unwrap();
        m.advance_to("install").unwrap();
        assert!(!m.state().can_go_forward);
        assert!(matches!(
            m.advance_to("install"),
            Err(TransitionError::CannotGoForward { .. })
        ));
    }

    #[test]
    fn go_back_with_single_history_entry_rejected() {
        let mut m = machine();
        let before = m.state().clone();
        assert_eq!(m.go_back().unwrap_err(), TransitionError::NoPreviousStep);
        assert_eq!(m.state(), &before);
    }

    #[test]
    fn go_back_keeps_completed_steps() {
        let mut m = machine();
        m.advance_to("checks").unwrap();
        m.advance_to("extras").unwrap();
        let s = m.go_back().unwrap();
        assert_eq!(s.current_step_id, "checks");
        assert!(s.is_completed("welcome"));
        assert!(s.is_completed("checks"));
        assert_eq!(s.progress_percentage, 50);
        assert!(s.can_go_back);

        let s = m.go_back().unwrap();
        assert_eq!(s.current_step_id, "welcome");
        assert!(!s.can_go_back);
        assert_eq!(s.completed_steps.len(), 2);
    }

    #[test]
    fn skip_requires_skippable_step() {
        let mut m = machine();
        assert!(matches!(
            m.skip_current(),
            Err(TransitionError::NotSkippable { .. })
        ));

        m.advance_to("checks").unwrap();
        m.advance_to("extras").unwrap();
        assert!(m.state().can_skip_current);
        assert_eq!(m.skip_current().unwrap(), "extras");
        assert_eq!(m.current(), "install");
        assert!(m.state().is_completed("extras"));
    }

    #[test]
    fn step_past_does_not_complete() {
        let mut m = machine();
        m.step_past("checks").unwrap();
        assert!(!m.state().is_completed("welcome"));
        assert_eq!(m.current(), "checks");
    }

    #[test]
    fn mark_completed_reaches_full_progress() {
        let mut m = machine();
        for next in ["checks", "extras", "install"] {
            m.advance_to(next).unwrap();
        }
        m.mark_completed("install").unwrap();
        assert_eq!(m.state().progress_percentage, 100);
        assert!(m.mark_completed("unknown").is_err());
    }

    #[test]
    fn history_is_bounded() {
        let steps: Vec<StepDefinition> = (1..=70)
            .map(|i| StepDefinition::new(format!("step-{:02}", i), i))
            .collect();
        let graph = Arc::new(StepGraph::load(steps).unwrap());
        let mut m =
            NavigationStateMachine::new(graph.clone(), SessionId::new(), graph.topological_order())
                .unwrap();
        for i in 2..=70 {
            m.advance_to(&format!("step-{:02}", i)).unwrap();
        }
        let s = m.state();
        assert_eq!(s.history.len(), HISTORY_LIMIT);
        assert_eq!(s.history.back().map(String::as_str), Some("step-70"));
        assert_eq!(s.history.front().map(String::as_str), Some("step-21"));
    }

    #[test]
    fn apply_rejects_stale_revision() {
        let mut m = machine();
        m.advance_to("checks").unwrap();
        let stale = m.state().clone();
        let err = m.apply(stale).unwrap_err();
        assert!(matches!(err, TransitionError::StaleRevision { .. }));
    }

    #[test]
    fn apply_rejects_foreign_session() {
        let mut m = machine();
        let mut foreign = m.state().clone();
        foreign.session_id = SessionId::new();
        foreign.revision += 1;
        assert!(matches!(
            m.apply(foreign),
            Err(TransitionError::SessionMismatch { .. })
        ));
    }

    #[test]
    fn apply_rejects_uncompleting_a_step() {
        let mut m = machine();
        m.advance_to("checks").unwrap();
        let mut regressed = m.state().clone();
        regressed.completed_steps.clear();
        regressed.revision += 1;
        assert!(m.apply(regressed).is_err());
        assert!(m.state().is_completed("welcome"));
    }

    #[test]
    fn restore_recomputes_flags() {
        let mut m = machine();
        m.advance_to("checks").unwrap();
        let mut saved = m.state().clone();
        saved.can_go_back = false;
        let restored = NavigationStateMachine::restore(graph(), saved).unwrap();
        assert!(restored.state().can_go_back);
        assert_eq!(restored.current(), "checks");
    }
}
