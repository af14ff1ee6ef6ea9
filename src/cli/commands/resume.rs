//! Resume command implementation.
//!
//! The `trailhead resume` command continues a paused session from the
//! project's session store.

use std::path::{Path, PathBuf};

use crate::cli::args::ResumeArgs;
use crate::error::Result;
use crate::session::{default_store_path, FileStore, SessionId};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::run::build_controller;
use super::wizard::{run_interactive, run_to_end};
use super::{finish, load_project, runtime, EXIT_NO_CONFIG};

/// Saved sessions scanned when no id is given.
const SCAN_LIMIT: usize = 50;

/// The resume command implementation.
pub struct ResumeCommand {
    project_root: PathBuf,
    config_override: Option<PathBuf>,
    args: ResumeArgs,
}

impl ResumeCommand {
    /// Create a new resume command.
    pub fn new(project_root: &Path, config_override: Option<&Path>, args: ResumeArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config_override: config_override.map(Path::to_path_buf),
            args,
        }
    }

    /// Pick the session to resume: the given id, or the newest unfinished one.
    fn target(&self, store: &FileStore, ui: &mut dyn UserInterface) -> Result<Option<SessionId>> {
        if let Some(raw) = &self.args.id {
            let id = SessionId::parse(raw);
            if id.is_none() {
                ui.error(&format!("Not a session id: {}", raw));
            }
            return Ok(id);
        }

        let newest = store
            .list_recent(SCAN_LIMIT)?
            .into_iter()
            .find(|saved| !saved.session.status.is_terminal())
            .map(|saved| saved.session.id);
        if newest.is_none() {
            ui.error("No paused session to resume");
        }
        Ok(newest)
    }
}

impl Command for ResumeCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let Some(project) =
            load_project(&self.project_root, self.config_override.as_deref(), ui)?
        else {
            return Ok(CommandResult::failure(EXIT_NO_CONFIG));
        };

        let store = FileStore::new(default_store_path(&self.project_root));
        let Some(id) = self.target(&store, ui)? else {
            return Ok(CommandResult::failure(1));
        };

        let (controller, store_path) =
            build_controller(&self.project_root, &project, false, ui.output_mode());
        controller.resume_from(&store, &id)?;
        ui.show_header(&format!(
            "Resuming {} ({})",
            project.wizard.display_name(),
            id
        ));

        let rt = runtime()?;
        if self.args.interactive && ui.is_interactive() {
            run_interactive(&controller, &rt, ui)?;
        } else {
            run_to_end(&controller, &rt)?;
        }

        finish(&controller, store_path.as_ref(), ui)
    }
}
