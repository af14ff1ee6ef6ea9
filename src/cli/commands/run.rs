//! Run command implementation.
//!
//! The `trailhead run` command starts a new wizard session.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::cli::args::RunArgs;
use crate::config::WizardPaths;
use crate::error::Result;
use crate::runner::{ScriptedExecutor, StepExecutor};
use crate::session::{default_store_path, FileStore, SessionController};
use crate::shell::CommandExecutor;
use crate::ui::{OutputMode, TerminalSink, TrailheadTheme, UserInterface};

use super::dispatcher::{Command, CommandResult};
use super::wizard::{run_interactive, run_to_end};
use super::{finish, load_project, runtime, Project, EXIT_NO_CONFIG};

/// The run command implementation.
pub struct RunCommand {
    project_root: PathBuf,
    config_override: Option<PathBuf>,
    args: RunArgs,
}

impl RunCommand {
    /// Create a new run command.
    pub fn new(project_root: &Path, config_override: Option<&Path>, args: RunArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config_override: config_override.map(Path::to_path_buf),
            args,
        }
    }

    /// Get the project root path.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Get the command arguments.
    pub fn args(&self) -> &RunArgs {
        &self.args
    }
}

/// Build a controller wired to the terminal.
///
/// Dry runs replace every command with an immediate success and never touch
/// the session store.
pub(crate) fn build_controller(
    project_root: &Path,
    project: &Project,
    dry_run: bool,
    mode: OutputMode,
) -> (SessionController, Option<PathBuf>) {
    let executor: Arc<dyn StepExecutor> = if dry_run {
        Arc::new(ScriptedExecutor::new())
    } else {
        Arc::new(CommandExecutor::new(project.wizard.commands()).in_dir(project_root))
    };
    let theme = TrailheadTheme::detect(!console::colors_enabled());
    let sink = Arc::new(TerminalSink::new(&project.graph, mode, theme));
    let controller = SessionController::new(project.graph.clone(), executor, sink);

    if dry_run {
        return (controller, None);
    }
    let store_path = default_store_path(project_root);
    let controller = controller.with_store(Arc::new(FileStore::new(store_path.clone())));
    (controller, Some(store_path))
}

impl Command for RunCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let Some(project) =
            load_project(&self.project_root, self.config_override.as_deref(), ui)?
        else {
            return Ok(CommandResult::failure(EXIT_NO_CONFIG));
        };

        ui.show_header(&format!("Setting up {}", project.wizard.display_name()));
        if ui.output_mode() == OutputMode::Verbose {
            let path = self
                .config_override
                .clone()
                .unwrap_or_else(|| WizardPaths::project_path(&self.project_root));
            ui.message(&format!("Wizard: {}", path.display()));
        }
        if self.args.dry_run {
            ui.message("Running in dry-run mode - no commands will be executed");
        }

        let config = self.args.apply_to(project.wizard.settings.clone());
        let (controller, store_path) = build_controller(
            &self.project_root,
            &project,
            self.args.dry_run,
            ui.output_mode(),
        );
        let id = controller.start(config)?;
        debug!("Session {} started from `trailhead run`", id);

        let rt = runtime()?;
        if self.args.interactive && ui.is_interactive() {
            run_interactive(&controller, &rt, ui)?;
        } else {
            if self.args.interactive {
                ui.warning("Not a terminal; running all steps without prompting");
            }
            run_to_end(&controller, &rt)?;
        }

        finish(&controller, store_path.as_ref(), ui)
    }
}
