//! Navigation state snapshot.

use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionId;

/// Most recent history entries kept.
pub const HISTORY_LIMIT: usize = 50;

/// Where the user is in the wizard and what they may do next.
///
/// Capability flags and `progress_percentage` are derived fields; they are
/// recomputed by the state machine on every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationState {
    /// Owning session; never changes.
    pub session_id: SessionId,
    /// Step the user is on. Always one of `available_steps`.
    pub current_step_id: String,
    /// Steps marked complete. Only grows.
    pub completed_steps: BTreeSet<String>,
    /// Steps the session walks, in order.
    pub available_steps: Vec<String>,
    /// Visited step ids, oldest first, at most [`HISTORY_LIMIT`] entries.
    pub history: VecDeque<String>,
    /// Back navigation is possible.
    pub can_go_back: bool,
    /// A step follows the current one.
    pub can_go_forward: bool,
    /// The current step allows skipping.
    pub can_skip_current: bool,
    /// `round(100 * |completed| / |available|)`, clamped to 0..=100.
    pub progress_percentage: u8,
    /// Logical clock; strictly increases with every update.
    pub revision: u64,
    /// Wall time of the last update.
    pub updated_at: DateTime<Utc>,
}

impl NavigationState {
    /// Position of a step within `available_steps`.
    pub fn index_of(&self, step_id: &str) -> Option<usize> {
        self.available_steps.iter().position(|s| s == step_id)
    }

    /// Position of the current step.
    pub fn current_index(&self) -> usize {
        self.index_of(&self.current_step_id).unwrap_or(0)
    }

    /// The step after the current one, if any.
    pub fn next_step_id(&self) -> Option<&str> {
        self.available_steps
            .get(self.current_index() + 1)
            .map(String::as_str)
    }

    /// Whether a step is marked complete.
    pub fn is_completed(&self, step_id: &str) -> bool {
        self.completed_steps.contains(step_id)
    }
}

/// `round(100 * completed / available)`, clamped to 0..=100.
pub fn progress_percentage(completed: usize, available: usize) -> u8 {
    if available == 0 {
        return 0;
    }
    let pct = (100.0 * completed as f64 / available as f64).round();
    pct.clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_rounds_to_nearest() {
        assert_eq!(progress_percentage(0, 3), 0);
        assert_eq!(progress_percentage(1, 3), 33);
        assert_eq!(progress_percentage(2, 3), 67);
        assert_eq!(progress_percentage(3, 3), 100);
    }

    #[test]
    fn progress_clamps_and_handles_empty() {
        assert_eq!(progress_percentage(5, 3), 100);
        assert_eq!(progress_percentage(0, 0), 0);
    }
}
