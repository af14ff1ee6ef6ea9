//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! # Architecture
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands to their implementations. This allows:
//! - Single binary with subcommands (`trailhead run`, `trailhead resume`)
//! - Shared initialization logic
//! - Consistent global flag handling
//!
//! Commands stay synchronous. The ones that drive a session build a tokio
//! runtime and block on the controller.

pub mod dispatcher;
pub mod plan;
pub mod resume;
pub mod run;
pub mod sessions;
pub mod validate;
pub mod wizard;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::runtime::Runtime;
use tracing::warn;

use crate::config::{load_wizard, WizardConfig};
use crate::error::{Result, TrailheadError};
use crate::runner::StepGraph;
use crate::session::{SessionController, SessionReport, SessionStatus};
use crate::ui::UserInterface;

pub use dispatcher::{Command, CommandDispatcher, CommandResult};

/// Exit code for a session interrupted by the user.
pub const EXIT_CANCELLED: i32 = 130;

/// Exit code when no wizard definition exists.
pub const EXIT_NO_CONFIG: i32 = 2;

/// A loaded wizard and the graph built from it.
pub(crate) struct Project {
    pub wizard: WizardConfig,
    pub graph: Arc<StepGraph>,
}

/// Load and validate the wizard for `project_root`.
///
/// Returns `Ok(None)` after telling the user when no wizard file exists.
pub(crate) fn load_project(
    project_root: &Path,
    config_override: Option<&Path>,
    ui: &mut dyn UserInterface,
) -> Result<Option<Project>> {
    let wizard = match load_wizard(project_root, config_override) {
        Ok(w) => w,
        Err(TrailheadError::ConfigNotFound { path }) => {
            ui.error(&format!("No wizard definition found at {}", path.display()));
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    let graph = Arc::new(wizard.to_graph()?);
    Ok(Some(Project { wizard, graph }))
}

/// Multi-threaded runtime for one command invocation.
pub(crate) fn runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(TrailheadError::Io)
}

/// Drive `fut` to completion, cancelling the session on Ctrl-C.
///
/// The future is still awaited after a cancel so the in-flight step can wind
/// down and the session report is delivered.
pub(crate) fn block_on_interruptible<F, T>(
    rt: &Runtime,
    controller: &SessionController,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    rt.block_on(async {
        tokio::pin!(fut);
        tokio::select! {
            res = &mut fut => res,
            Ok(()) = tokio::signal::ctrl_c() => {
                warn!("Interrupted, cancelling session");
                match controller.cancel() {
                    Ok(_) => fut.await,
                    Err(e) => Err(e),
                }
            }
        }
    })
}

/// Exit code for a session that stopped.
pub fn exit_code_for(status: SessionStatus, report: Option<&SessionReport>) -> i32 {
    match status {
        SessionStatus::Completed if report.map(|r| r.failed).unwrap_or(0) == 0 => 0,
        SessionStatus::Active | SessionStatus::Paused => 0,
        SessionStatus::Cancelled => EXIT_CANCELLED,
        SessionStatus::Completed | SessionStatus::Failed => 1,
    }
}

/// Turn the final session state into a command result, telling the user
/// how to continue a paused session.
pub(crate) fn finish(
    controller: &SessionController,
    store_path: Option<&PathBuf>,
    ui: &mut dyn UserInterface,
) -> Result<CommandResult> {
    let snapshot = controller.snapshot()?;
    let status = snapshot.session.status;
    let report = controller.report();

    match status {
        SessionStatus::Paused => {
            ui.message(&format!(
                "Paused. Continue with: trailhead resume {}",
                snapshot.session.id
            ));
            if let Some(path) = store_path {
                ui.message(&format!("Saved to {}", path.display()));
            }
        }
        SessionStatus::Failed => {
            if let Some(report) = &report {
                ui.error(&format!("Setup stopped at: {}", report.failed_steps.join(", ")));
            }
        }
        SessionStatus::Completed => {
            if let Some(report) = report.as_ref().filter(|r| r.failed > 0) {
                ui.warning(&format!(
                    "Completed with failures: {}",
                    report.failed_steps.join(", ")
                ));
            }
        }
        _ => {}
    }

    let code = exit_code_for(status, report.as_ref());
    Ok(if code == 0 {
        CommandResult::success()
    } else {
        CommandResult::failure(code)
    })
}
