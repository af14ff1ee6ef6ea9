//! Session policy.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::runner::StepGraph;

/// Highest accepted `max_retries`.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Highest accepted `retry_delay_ms` (10 minutes).
pub const MAX_RETRY_DELAY_MS: u64 = 600_000;

/// Policy for one wizard run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Leave optional steps out of the run entirely.
    pub skip_optional: bool,

    /// Retry transient failures.
    pub auto_retry: bool,

    /// Retries after the first attempt.
    pub max_retries: u32,

    /// Keep going after a failed step; its dependents are skipped.
    pub continue_on_error: bool,

    /// Linear backoff unit in milliseconds.
    pub retry_delay_ms: u64,

    /// Custom step ordering (must be a dependency-respecting permutation).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<String>>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            skip_optional: false,
            auto_retry: true,
            max_retries: 3,
            continue_on_error: false,
            retry_delay_ms: 1000,
            order: None,
        }
    }
}

impl SessionConfig {
    /// Check the policy against the graph it will run.
    pub fn validate(&self, graph: &StepGraph) -> Result<(), ValidationError> {
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(ValidationError::InvalidConfig {
                message: format!(
                    "max_retries must be at most {}, got {}",
                    MAX_RETRIES_LIMIT, self.max_retries
                ),
            });
        }
        if self.retry_delay_ms > MAX_RETRY_DELAY_MS {
            return Err(ValidationError::InvalidConfig {
                message: format!(
                    "retry_delay_ms must be at most {}, got {}",
                    MAX_RETRY_DELAY_MS, self.retry_delay_ms
                ),
            });
        }
        if let Some(order) = &self.order {
            graph.validate_ordering(order)?;
        }
        if self.skip_optional && graph.steps().iter().all(|s| s.optional) {
            return Err(ValidationError::InvalidConfig {
                message: "skip_optional leaves no steps to run".to_string(),
            });
        }
        Ok(())
    }

    /// Steps the session walks: the graph's (or overridden) topological
    /// order, minus optional steps when `skip_optional` is set.
    pub fn available_steps(&self, graph: &StepGraph) -> Vec<String> {
        let order = self
            .order
            .clone()
            .unwrap_or_else(|| graph.topological_order());
        order
            .into_iter()
            .filter(|id| {
                !(self.skip_optional && graph.get(id).is_some_and(|s| s.optional))
            })
            .collect()
    }

    /// Optional steps excluded by `skip_optional`, in graph order.
    pub fn excluded_steps(&self, graph: &StepGraph) -> Vec<String> {
        if !self.skip_optional {
            return Vec::new();
        }
        graph
            .steps()
            .iter()
            .filter(|s| s.optional)
            .map(|s| s.id.clone())
            .collect()
    }
}
