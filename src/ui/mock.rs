//! Mock UI implementation for testing.
//!
//! `MockUI` implements [`UserInterface`], records everything shown, and
//! answers action prompts from a queue. Once the queue is empty it answers
//! [`WizardAction::Quit`].

use std::collections::VecDeque;

use crate::error::Result;
use crate::navigation::NavigationState;

use super::{position_line, OutputMode, UserInterface, WizardAction};

#[derive(Debug, Default)]
pub struct MockUI {
    mode: OutputMode,
    messages: Vec<String>,
    successes: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
    headers: Vec<String>,
    positions: Vec<String>,
    actions: VecDeque<WizardAction>,
    offered: Vec<Vec<WizardAction>>,
}

impl MockUI {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue answers for [`choose_action`](UserInterface::choose_action).
    pub fn queue_actions(&mut self, actions: impl IntoIterator<Item = WizardAction>) {
        self.actions.extend(actions);
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn successes(&self) -> &[String] {
        &self.successes
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Position lines shown, e.g. "[1/3] welcome (0%)".
    pub fn positions(&self) -> &[String] {
        &self.positions
    }

    /// The action menus offered, in order.
    pub fn offered(&self) -> &[Vec<WizardAction>] {
        &self.offered
    }
}

impl UserInterface for MockUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        self.messages.push(msg.to_string());
    }

    fn success(&mut self, msg: &str) {
        self.successes.push(msg.to_string());
    }

    fn warning(&mut self, msg: &str) {
        self.warnings.push(msg.to_string());
    }

    fn error(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }

    fn show_header(&mut self, title: &str) {
        self.headers.push(title.to_string());
    }

    fn show_position(&mut self, state: &NavigationState, title: &str) {
        self.positions.push(position_line(state, title));
    }

    fn choose_action(&mut self, actions: &[WizardAction]) -> Result<WizardAction> {
        self.offered.push(actions.to_vec());
        Ok(self.actions.pop_front().unwrap_or(WizardAction::Quit))
    }

    fn is_interactive(&self) -> bool {
        true
    }
}
