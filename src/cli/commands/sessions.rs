//! Sessions command implementation.
//!
//! The `trailhead sessions` command lists saved sessions, newest first.

use std::path::{Path, PathBuf};

use crate::cli::args::SessionsArgs;
use crate::error::Result;
use crate::session::{default_store_path, FileStore, SavedSession, SessionId, SessionReport};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};

/// The sessions command implementation.
pub struct SessionsCommand {
    project_root: PathBuf,
    args: SessionsArgs,
}

impl SessionsCommand {
    /// Create a new sessions command.
    pub fn new(project_root: &Path, args: SessionsArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            args,
        }
    }

    fn remove(
        &self,
        store: &FileStore,
        raw: &str,
        ui: &mut dyn UserInterface,
    ) -> Result<CommandResult> {
        let Some(id) = SessionId::parse(raw) else {
            ui.error(&format!("Not a session id: {}", raw));
            return Ok(CommandResult::failure(1));
        };
        if store.remove(&id)? {
            ui.success(&format!("Removed {}", id));
            Ok(CommandResult::success())
        } else {
            ui.error(&format!("Session not found: {}", id));
            Ok(CommandResult::failure(1))
        }
    }
}

/// "id  status  at step (n/m done)  started", plus failed steps if any.
fn describe(saved: &SavedSession) -> String {
    let nav = &saved.navigation;
    let mut line = format!(
        "{}  {:<9}  at {} ({}/{} done)  {}",
        saved.session.id,
        saved.session.status.to_string(),
        nav.current_step_id,
        nav.completed_steps.len(),
        nav.available_steps.len(),
        saved.session.started_at.format("%Y-%m-%d %H:%M"),
    );
    let report = SessionReport::from_session(&saved.session);
    if report.failed > 0 {
        line.push_str(&format!("  failed: {}", report.failed_steps.join(", ")));
    }
    line
}

impl Command for SessionsCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let store = FileStore::new(default_store_path(&self.project_root));
        if let Some(raw) = &self.args.remove {
            return self.remove(&store, raw, ui);
        }

        let sessions = store.list_recent(self.args.limit)?;
        if sessions.is_empty() {
            ui.message("No saved sessions");
            return Ok(CommandResult::success());
        }

        ui.show_header("Sessions");
        for saved in &sessions {
            ui.message(&describe(saved));
        }
        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::navigation::NavigationStateMachine;
    use crate::runner::StepGraph;
    use crate::session::{PersistenceStore, Session, SessionConfig, SessionStatus};
    use crate::steps::StepDefinition;
    use crate::ui::MockUI;
    use tempfile::TempDir;

    fn save_one(root: &Path, status: SessionStatus) -> SessionId {
        let graph = Arc::new(
            StepGraph::load(vec![
                StepDefinition::new("welcome", 1),
                StepDefinition::new("finish", 2),
            ])
            .unwrap(),
        );
        let mut session = Session::new(SessionConfig::default(), Vec::new());
        session.status = status;
        let nav = NavigationStateMachine::new(
            graph,
            session.id.clone(),
            vec!["welcome".into(), "finish".into()],
        )
        .unwrap();
        let store = FileStore::new(default_store_path(root));
        store.save(&session, nav.state()).unwrap();
        session.id
    }

    #[test]
    fn empty_store() {
        let temp = TempDir::new().unwrap();
        let cmd = SessionsCommand::new(temp.path(), SessionsArgs::default());
        let mut ui = MockUI::new();

        assert!(cmd.execute(&mut ui).unwrap().success);
        assert_eq!(ui.messages(), ["No saved sessions"]);
    }

    #[test]
    fn lists_saved_sessions() {
        let temp = TempDir::new().unwrap();
        let id = save_one(temp.path(), SessionStatus::Paused);
        let cmd = SessionsCommand::new(temp.path(), SessionsArgs::default());
        let mut ui = MockUI::new();

        cmd.execute(&mut ui).unwrap();
        assert_eq!(ui.messages().len(), 1);
        let line = &ui.messages()[0];
        assert!(line.starts_with(&id.to_string()));
        assert!(line.contains("paused"));
        assert!(line.contains("at welcome (0/2 done)"));
    }

    #[test]
    fn removes_a_session() {
        let temp = TempDir::new().unwrap();
        let id = save_one(temp.path(), SessionStatus::Completed);
        let args = SessionsArgs {
            remove: Some(id.to_string()),
            ..Default::default()
        };
        let cmd = SessionsCommand::new(temp.path(), args.clone());
        let mut ui = MockUI::new();
        assert!(cmd.execute(&mut ui).unwrap().success);

        let again = SessionsCommand::new(temp.path(), args);
        let mut ui = MockUI::new();
        assert_eq!(again.execute(&mut ui).unwrap().exit_code, 1);
    }
}
