//! Wizard definition file format.
//!
//! ```yaml
//! name: Acme dev environment
//! settings:
//!   max_retries: 2
//!   retry_delay_ms: 500
//! steps:
//!   - id: welcome
//!     title: Welcome
//!   - id: toolchain
//!     depends_on: [welcome]
//!     command: rustup show
//!   - id: extras
//!     optional: true
//!     depends_on: [welcome]
//!     command: cargo install just
//! ```

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::runner::StepGraph;
use crate::session::SessionConfig;
use crate::steps::StepDefinition;

/// Root of `.trailhead/wizard.yml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardConfig {
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Session policy defaults.
    pub settings: SessionConfig,

    /// Steps in declaration order.
    pub steps: Vec<StepConfig>,
}

/// One step entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Either every step declares an order or none does.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,

    pub optional: bool,

    /// Defaults to `optional`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skippable: Option<bool>,

    pub depends_on: Vec<String>,

    /// Seconds.
    pub estimated_duration: u64,

    /// Shell command run for the step. Steps without one succeed immediately.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl StepConfig {
    fn to_definition(&self) -> StepDefinition {
        StepDefinition {
            id: self.id.clone(),
            title: self.title.clone(),
            order: self.order.unwrap_or(0),
            optional: self.optional,
            skippable: self.skippable.unwrap_or(self.optional),
            depends_on: self.depends_on.iter().cloned().collect::<BTreeSet<_>>(),
            estimated_duration: self.estimated_duration,
        }
    }
}

impl WizardConfig {
    /// Display name, falling back to a generic one.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Setup wizard")
    }

    /// Build the validated step graph.
    ///
    /// When no step declares an order, orders are assigned from the
    /// canonical topological order.
    pub fn to_graph(&self) -> Result<StepGraph, ValidationError> {
        let declared = self.steps.iter().filter(|s| s.order.is_some()).count();
        let definitions: Vec<StepDefinition> =
            self.steps.iter().map(StepConfig::to_definition).collect();

        if declared == 0 {
            StepGraph::from_unordered(definitions)
        } else if declared == self.steps.len() {
            StepGraph::load(definitions)
        } else {
            Err(ValidationError::InvalidOrder {
                message: format!(
                    "{} of {} steps declare an order; declare it on every step or on none",
                    declared,
                    self.steps.len()
                ),
            })
        }
    }

    /// Shell command per step id.
    pub fn commands(&self) -> HashMap<String, String> {
        self.steps
            .iter()
            .filter_map(|s| s.command.clone().map(|c| (s.id.clone(), c)))
            .collect()
    }
}
