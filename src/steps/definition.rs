//! Step definitions.
//!
//! A [`StepDefinition`] is the immutable description of one unit of wizard
//! work. The body of a step is not part of the definition; it is supplied at
//! run time by a [`StepExecutor`](crate::runner::StepExecutor).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One step of the wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Unique step id.
    pub id: String,

    /// Display title (defaults to the id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Position in the wizard, dense from 1.
    pub order: u32,

    /// Optional steps may be left out entirely with `skip_optional`.
    #[serde(default)]
    pub optional: bool,

    /// Whether the user may skip this step. Always true for optional steps.
    #[serde(default)]
    pub skippable: bool,

    /// Ids of steps that must finish before this one.
    #[serde(default)]
    pub depends_on: BTreeSet<String>,

    /// Rough duration estimate in seconds.
    #[serde(default)]
    pub estimated_duration: u64,
}

impl StepDefinition {
    /// Create a required, non-skippable step with no dependencies.
    pub fn new(id: impl Into<String>, order: u32) -> Self {
        Self {
            id: id.into(),
            title: None,
            order,
            optional: false,
            skippable: false,
            depends_on: BTreeSet::new(),
            estimated_duration: 0,
        }
    }

    /// Add dependencies.
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(deps.into_iter().map(Into::into));
        self
    }

    /// Mark as optional (which implies skippable).
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self.skippable = true;
        self
    }

    /// Mark as skippable.
    pub fn skippable(mut self) -> Self {
        self.skippable = true;
        self
    }

    /// Set the display title.
    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the duration estimate in seconds.
    pub fn estimated(mut self, seconds: u64) -> Self {
        self.estimated_duration = seconds;
        self
    }

    /// Title for display, falling back to the id.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_step_is_required() {
        let step = StepDefinition::new("welcome", 1);
        assert!(!step.optional);
        assert!(!step.skippable);
        assert!(step.depends_on.is_empty());
    }

    #[test]
    fn optional_implies_skippable() {
        let step = StepDefinition::new("extras", 4).optional();
        assert!(step.optional);
        assert!(step.skippable);
    }

    #[test]
    fn depends_on_collects_ids() {
        let step = StepDefinition::new("install", 3).depends_on(["checks", "welcome"]);
        assert!(step.depends_on.contains("checks"));
        assert!(step.depends_on.contains("welcome"));
    }

    #[test]
    fn display_title_falls_back_to_id() {
        assert_eq!(StepDefinition::new("checks", 2).display_title(), "checks");
        assert_eq!(
            StepDefinition::new("checks", 2)
                .titled("Environment checks")
                .display_title(),
            "Environment checks"
        );
    }

    #[test]
    fn deserializes_with_defaults() {
        let step: StepDefinition = serde_json::from_str(r#"{"id":"a","order":1}"#).unwrap();
        assert_eq!(step, StepDefinition::new("a", 1));
    }
}
