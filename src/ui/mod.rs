//! Interactive user interface components.
//!
//! This module provides:
//! - [`UserInterface`] trait for the interactive wizard loop
//! - [`TerminalUI`] for interactive terminal usage
//! - [`MockUI`] for tests
//! - [`TerminalSink`] which renders progress events with indicatif
//!
//! # Example
//!
//! ```
//! use trailhead::ui::{MockUI, UserInterface, WizardAction};
//!
//! let mut ui = MockUI::new();
//! ui.queue_actions([WizardAction::Run, WizardAction::Quit]);
//! ui.success("Setup complete!");
//! assert_eq!(ui.successes(), ["Setup complete!"]);
//! ```

pub mod mock;
pub mod output;
pub mod sink;
pub mod terminal;
pub mod theme;

use std::fmt;

pub use mock::MockUI;
pub use output::OutputMode;
pub use sink::{format_duration, result_line, TerminalSink};
pub use terminal::{create_ui, TerminalUI};
pub use theme::{should_use_colors, TrailheadTheme};

use crate::error::Result;
use crate::navigation::NavigationState;

/// What the user asked the wizard to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardAction {
    /// Execute the current step.
    Run,
    /// Run every remaining step without asking.
    RunAll,
    /// Run a failed step again.
    Retry,
    Next,
    Back,
    Skip,
    /// Pause and save; resume later with `trailhead resume`.
    Pause,
    Cancel,
    /// Leave the wizard.
    Quit,
}

impl WizardAction {
    pub fn label(&self) -> &'static str {
        match self {
            WizardAction::Run => "Run this step",
            WizardAction::RunAll => "Run all remaining steps",
            WizardAction::Retry => "Retry this step",
            WizardAction::Next => "Next step",
            WizardAction::Back => "Previous step",
            WizardAction::Skip => "Skip this step",
            WizardAction::Pause => "Pause and save",
            WizardAction::Cancel => "Cancel setup",
            WizardAction::Quit => "Quit",
        }
    }
}

impl fmt::Display for WizardAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Trait for user interface interactions.
///
/// This trait allows mocking the UI in tests.
pub trait UserInterface {
    fn output_mode(&self) -> OutputMode;

    fn message(&mut self, msg: &str);

    fn success(&mut self, msg: &str);

    fn warning(&mut self, msg: &str);

    fn error(&mut self, msg: &str);

    fn show_header(&mut self, title: &str);

    /// Show where the user is, e.g. "[2/5] Install toolchain (40%)".
    fn show_position(&mut self, state: &NavigationState, title: &str);

    /// Ask the user to pick one of `actions`.
    fn choose_action(&mut self, actions: &[WizardAction]) -> Result<WizardAction>;

    fn is_interactive(&self) -> bool;
}

/// "[current/total] title (progress%)".
pub fn position_line(state: &NavigationState, title: &str) -> String {
    format!(
        "[{}/{}] {} ({}%)",
        state.current_index() + 1,
        state.available_steps.len(),
        title,
        state.progress_percentage
    )
}
