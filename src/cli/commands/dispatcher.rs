//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::path::{Path, PathBuf};

use crate::cli::args::{Cli, Commands};
use crate::error::Result;
use crate::ui::UserInterface;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
pub trait Command {
    /// Execute the command.
    ///
    /// # Arguments
    ///
    /// * `ui` - User interface for displaying output and prompts
    ///
    /// # Returns
    ///
    /// A [`CommandResult`] indicating success/failure and exit code.
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    project_root: PathBuf,
    config_override: Option<PathBuf>,
}

impl CommandDispatcher {
    /// Create a new dispatcher for the given project root.
    pub fn new(project_root: PathBuf) -> Self {
        Self {
            project_root,
            config_override: None,
        }
    }

    /// Load the wizard from `path` instead of `.trailhead/wizard.yml`.
    pub fn with_config(mut self, path: Option<PathBuf>) -> Self {
        self.config_override = path;
        self
    }

    /// Get the project root path.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Dispatch and execute a command.
    ///
    /// Routes the CLI subcommand to the appropriate command implementation
    /// and executes it.
    pub fn dispatch(&self, cli: &Cli, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let root = &self.project_root;
        let config = self.config_override.as_deref();
        match &cli.command {
            Some(Commands::Run(args)) => {
                let cmd = super::run::RunCommand::new(root, config, args.clone());
                cmd.execute(ui)
            }
            Some(Commands::Resume(args)) => {
                let cmd = super::resume::ResumeCommand::new(root, config, args.clone());
                cmd.execute(ui)
            }
            Some(Commands::Plan(args)) => {
                let cmd = super::plan::PlanCommand::new(root, config, args.clone());
                cmd.execute(ui)
            }
            Some(Commands::Validate) => {
                let cmd = super::validate::ValidateCommand::new(root, config);
                cmd.execute(ui)
            }
            Some(Commands::Sessions(args)) => {
                let cmd = super::sessions::SessionsCommand::new(root, args.clone());
                cmd.execute(ui)
            }
            None => {
                // Default to run command with default args
                let cmd = super::run::RunCommand::new(
                    root,
                    config,
                    crate::cli::args::RunArgs::default(),
                );
                cmd.execute(ui)
            }
        }
    }
}
