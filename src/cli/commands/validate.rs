//! Validate command implementation.
//!
//! The `trailhead validate` command loads the wizard, builds the step graph,
//! and checks the settings against it.

use std::path::{Path, PathBuf};

use crate::config::load_wizard;
use crate::error::{Result, TrailheadError};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::EXIT_NO_CONFIG;

/// The validate command implementation.
pub struct ValidateCommand {
    project_root: PathBuf,
    config_override: Option<PathBuf>,
}

impl ValidateCommand {
    /// Create a new validate command.
    pub fn new(project_root: &Path, config_override: Option<&Path>) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config_override: config_override.map(Path::to_path_buf),
        }
    }
}

impl Command for ValidateCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let wizard = match load_wizard(&self.project_root, self.config_override.as_deref()) {
            Ok(w) => w,
            Err(TrailheadError::ConfigNotFound { path }) => {
                ui.error(&format!("No wizard definition found at {}", path.display()));
                return Ok(CommandResult::failure(EXIT_NO_CONFIG));
            }
            Err(e @ TrailheadError::ConfigParseError { .. }) => {
                ui.error(&e.to_string());
                return Ok(CommandResult::failure(1));
            }
            Err(e) => return Err(e),
        };

        let checked = wizard
            .to_graph()
            .and_then(|graph| wizard.settings.validate(&graph).map(|()| graph));
        match checked {
            Ok(graph) => {
                let optional = graph.steps().iter().filter(|s| s.optional).count();
                ui.success(&format!(
                    "{} is valid ({} steps, {} optional)",
                    wizard.display_name(),
                    graph.len(),
                    optional
                ));
                Ok(CommandResult::success())
            }
            Err(e) => {
                ui.error(&e.to_string());
                Ok(CommandResult::failure(1))
            }
        }
    }
}
