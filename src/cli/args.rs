//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::session::SessionConfig;

/// Trailhead - guided project setup.
#[derive(Debug, Parser)]
#[command(name = "trailhead")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to wizard file (overrides default .trailhead/wizard.yml)
    #[arg(short, long, global = true, env = "TRAILHEAD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to project root (overrides current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the setup wizard (default if no command specified)
    Run(RunArgs),

    /// Continue a paused session
    Resume(ResumeArgs),

    /// Show the steps a run would walk, in order
    Plan(PlanArgs),

    /// Validate the wizard definition
    Validate,

    /// List saved sessions
    Sessions(SessionsArgs),
}

/// Arguments for the `run` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct RunArgs {
    /// Walk the steps one at a time, asking before each
    #[arg(short, long)]
    pub interactive: bool,

    /// Report every step as successful without running commands
    #[arg(long)]
    pub dry_run: bool,

    /// Leave optional steps out of the run
    #[arg(long)]
    pub skip_optional: bool,

    /// Keep going after a failed step
    #[arg(long)]
    pub continue_on_error: bool,

    /// Retries after the first attempt
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Do not retry failed steps
    #[arg(long)]
    pub no_retry: bool,

    /// Linear backoff unit in milliseconds
    #[arg(long, value_name = "MS")]
    pub retry_delay_ms: Option<u64>,

    /// Custom step order (comma-separated step ids)
    #[arg(long, value_delimiter = ',')]
    pub order: Vec<String>,
}

impl RunArgs {
    /// Overlay these flags on the wizard's settings.
    pub fn apply_to(&self, mut config: SessionConfig) -> SessionConfig {
        if self.skip_optional {
            config.skip_optional = true;
        }
        if self.continue_on_error {
            config.continue_on_error = true;
        }
        if self.no_retry {
            config.auto_retry = false;
        }
        if let Some(n) = self.max_retries {
            config.max_retries = n;
        }
        if let Some(ms) = self.retry_delay_ms {
            config.retry_delay_ms = ms;
        }
        if !self.order.is_empty() {
            config.order = Some(self.order.clone());
        }
        config
    }
}

/// Arguments for the `resume` command.
#[derive(Debug, Clone, clap::Args)]
pub struct ResumeArgs {
    /// Session id (defaults to the most recent paused session)
    pub id: Option<String>,

    /// Walk the remaining steps one at a time
    #[arg(short, long)]
    pub interactive: bool,
}

/// Arguments for the `plan` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct PlanArgs {
    /// Leave optional steps out of the plan
    #[arg(long)]
    pub skip_optional: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `sessions` command.
#[derive(Debug, Clone, clap::Args)]
pub struct SessionsArgs {
    /// Number of sessions to show
    #[arg(short = 'n', long, default_value_t = 10)]
    pub limit: usize,

    /// Delete a saved session
    #[arg(long, value_name = "ID")]
    pub remove: Option<String>,
}

impl Default for SessionsArgs {
    fn default() -> Self {
        Self {
            limit: 10,
            remove: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_parses() {
        let cli = Cli::try_parse_from(["trailhead"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "trailhead",
            "run",
            "--skip-optional",
            "--max-retries",
            "5",
            "--order",
            "a,b,c",
        ])
        .unwrap();
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run");
        };
        assert!(args.skip_optional);
        assert_eq!(args.max_retries, Some(5));
        assert_eq!(args.order, vec!["a", "b", "c"]);
    }

    #[test]
    fn run_flags_overlay_settings() {
        let args = RunArgs {
            no_retry: true,
            continue_on_error: true,
            retry_delay_ms: Some(10),
            ..Default::default()
        };
        let config = args.apply_to(SessionConfig::default());
        assert!(!config.auto_retry);
        assert!(config.continue_on_error);
        assert_eq!(config.retry_delay_ms, 10);
        assert_eq!(config.max_retries, 3);
        assert!(config.order.is_none());
    }

    #[test]
    fn empty_flags_keep_settings() {
        let base = SessionConfig {
            skip_optional: true,
            ..Default::default()
        };
        assert_eq!(RunArgs::default().apply_to(base.clone()), base);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["trailhead", "plan", "--quiet", "--no-color"]).unwrap();
        assert!(cli.quiet);
        assert!(cli.no_color);
    }

    #[test]
    fn resume_takes_optional_id() {
        let cli = Cli::try_parse_from(["trailhead", "resume", "sess_1_0011223344556677"]).unwrap();
        let Some(Commands::Resume(args)) = cli.command else {
            panic!("expected resume");
        };
        assert_eq!(args.id.as_deref(), Some("sess_1_0011223344556677"));
    }
}
