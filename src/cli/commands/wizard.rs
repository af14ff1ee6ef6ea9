//! Driving a session from the terminal.
//!
//! Non-interactive runs hand the whole session to the controller. The
//! interactive loop shows the current position, offers the actions that are
//! legal right now, and maps each choice onto one controller call.

use tokio::runtime::Runtime;
use tracing::debug;

use crate::error::{Result, TrailheadError};
use crate::navigation::NavigationState;
use crate::session::{Session, SessionController, SessionStatus};
use crate::ui::{UserInterface, WizardAction};

use super::block_on_interruptible;

/// Run every remaining step.
pub fn run_to_end(controller: &SessionController, rt: &Runtime) -> Result<SessionStatus> {
    block_on_interruptible(rt, controller, controller.run())
}

/// Actions that make sense for the current step.
///
/// A session stopped by a failure only offers ways back to that failure:
/// retrying it, moving around, or leaving.
pub fn available_actions(session: &Session, nav: &NavigationState) -> Vec<WizardAction> {
    let halted = session.status == SessionStatus::Failed;
    let mut actions = Vec::new();

    match session.result_for(&nav.current_step_id) {
        None => {
            actions.push(WizardAction::Run);
            actions.push(WizardAction::RunAll);
            if nav.can_skip_current {
                actions.push(WizardAction::Skip);
            }
        }
        Some(result) if result.is_failed() => {
            if result.can_retry {
                actions.push(WizardAction::Retry);
            }
            if session.config.continue_on_error && !halted {
                if nav.can_go_forward {
                    actions.push(WizardAction::Next);
                }
                actions.push(WizardAction::RunAll);
            }
        }
        Some(_) => {
            if nav.can_go_forward {
                actions.push(WizardAction::Next);
            }
            if !halted {
                actions.push(WizardAction::RunAll);
            }
        }
    }
    if nav.can_go_back {
        actions.push(WizardAction::Back);
    }
    if halted {
        actions.push(WizardAction::Quit);
    } else {
        actions.push(WizardAction::Pause);
        actions.push(WizardAction::Cancel);
    }
    actions
}

/// Whether a stopped session still has a failure the user may retry.
fn awaits_retry(session: &Session) -> bool {
    session.status == SessionStatus::Failed
        && session.results.iter().any(|r| r.is_failed() && r.can_retry)
}

/// Walk the session one choice at a time until it ends or the user leaves.
///
/// Leaving with [`WizardAction::Quit`] pauses an active session so it can be
/// resumed later. A session stopped by a retryable failure stays in the loop
/// until the user retries or leaves.
pub fn run_interactive(
    controller: &SessionController,
    rt: &Runtime,
    ui: &mut dyn UserInterface,
) -> Result<SessionStatus> {
    loop {
        let snapshot = controller.snapshot()?;
        let status = snapshot.session.status;
        let session = controller.session().ok_or(TrailheadError::NoSession)?;
        if status != SessionStatus::Active && !awaits_retry(&session) {
            return Ok(status);
        }
        let nav = snapshot.navigation;

        let title = controller
            .graph()
            .get(&nav.current_step_id)
            .map(|s| s.display_title().to_string())
            .unwrap_or_else(|| nav.current_step_id.clone());
        ui.show_position(&nav, &title);

        let action = ui.choose_action(&available_actions(&session, &nav))?;
        debug!("Wizard action: {:?}", action);
        let outcome = match action {
            WizardAction::Run => {
                block_on_interruptible(rt, controller, controller.run_next()).map(|_| ())
            }
            WizardAction::RunAll => run_to_end(controller, rt).map(|_| ()),
            WizardAction::Retry => {
                block_on_interruptible(rt, controller, controller.retry_current()).map(|_| ())
            }
            WizardAction::Next => controller.request_next().map(|_| ()),
            WizardAction::Back => controller.request_previous().map(|_| ()),
            WizardAction::Skip => controller.request_skip().map(|_| ()),
            WizardAction::Quit if status == SessionStatus::Failed => return Ok(status),
            WizardAction::Pause | WizardAction::Quit => controller.pause().map(|_| ()),
            WizardAction::Cancel => controller.cancel().map(|_| ()),
        };

        match outcome {
            Ok(()) => {}
            Err(TrailheadError::Transition(e)) => ui.warning(&e.to_string()),
            Err(e) => return Err(e),
        }
    }
}
