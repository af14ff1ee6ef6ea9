//! Interactive terminal UI.

use std::io::Write;

use console::{style, Term};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;

use crate::error::{Result, TrailheadError};
use crate::navigation::NavigationState;

use super::{position_line, OutputMode, TrailheadTheme, UserInterface, WizardAction};

/// Interactive terminal UI implementation.
pub struct TerminalUI {
    term: Term,
    theme: TrailheadTheme,
    mode: OutputMode,
    interactive: bool,
}

impl TerminalUI {
    pub fn new(mode: OutputMode, theme: TrailheadTheme) -> Self {
        Self {
            term: Term::stdout(),
            theme,
            mode,
            interactive: true,
        }
    }

    /// Never prompt, even on a terminal.
    pub fn non_interactive(mut self) -> Self {
        self.interactive = false;
        self
    }
}

/// Create the terminal UI for this process.
pub fn create_ui(interactive: bool, mode: OutputMode, no_color: bool) -> Box<dyn UserInterface> {
    let ui = TerminalUI::new(mode, TrailheadTheme::detect(no_color));
    if interactive {
        Box::new(ui)
    } else {
        Box::new(ui.non_interactive())
    }
}

/// Dialoguer theme without the default yellow `?` prefix.
fn prompt_theme() -> ColorfulTheme {
    ColorfulTheme {
        prompt_prefix: style("".to_string()),
        ..ColorfulTheme::default()
    }
}

impl UserInterface for TerminalUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", msg).ok();
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", self.theme.format_success(msg)).ok();
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", self.theme.format_warning(msg)).ok();
        }
    }

    fn error(&mut self, msg: &str) {
        writeln!(self.term, "{}", self.theme.format_error(msg)).ok();
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "\n{}\n", self.theme.format_header(title)).ok();
        }
    }

    fn show_position(&mut self, state: &NavigationState, title: &str) {
        if self.mode.shows_status() {
            let line = position_line(state, title);
            writeln!(self.term, "{}", self.theme.highlight.apply_to(line)).ok();
        }
    }

    fn choose_action(&mut self, actions: &[WizardAction]) -> Result<WizardAction> {
        let labels: Vec<&str> = actions.iter().map(WizardAction::label).collect();
        let selection = Select::with_theme(&prompt_theme())
            .with_prompt("What next?")
            .items(&labels)
            .default(0)
            .interact_on(&self.term)
            .map_err(|e| TrailheadError::Io(e.into()))?;
        Ok(actions.get(selection).copied().unwrap_or(WizardAction::Quit))
    }

    fn is_interactive(&self) -> bool {
        self.interactive && self.term.is_term()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_interactive_ui_never_prompts() {
        let ui = create_ui(false, OutputMode::Quiet, true);
        assert!(!ui.is_interactive());
        assert_eq!(ui.output_mode(), OutputMode::Quiet);
    }
}
