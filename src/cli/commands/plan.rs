//! Plan command implementation.
//!
//! The `trailhead plan` command shows the order a run would walk without
//! executing anything.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cli::args::PlanArgs;
use crate::error::{Result, TrailheadError};
use crate::runner::StepGraph;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::{load_project, EXIT_NO_CONFIG};

/// One line of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub position: usize,
    pub id: String,
    pub title: String,
    pub optional: bool,
    pub skippable: bool,
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub excluded: bool,
}

/// The plan command implementation.
pub struct PlanCommand {
    project_root: PathBuf,
    config_override: Option<PathBuf>,
    args: PlanArgs,
}

impl PlanCommand {
    /// Create a new plan command.
    pub fn new(project_root: &Path, config_override: Option<&Path>, args: PlanArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config_override: config_override.map(Path::to_path_buf),
            args,
        }
    }
}

/// Steps in walk order. Excluded optional steps are listed last.
pub fn build_plan(
    graph: &StepGraph,
    available: &[String],
    excluded: &[String],
    command_for: impl Fn(&str) -> Option<String>,
) -> Vec<PlanEntry> {
    available
        .iter()
        .map(|id| (id, false))
        .chain(excluded.iter().map(|id| (id, true)))
        .filter_map(|(id, excluded)| graph.get(id).map(|step| (step, excluded)))
        .enumerate()
        .map(|(i, (step, excluded))| PlanEntry {
            position: i + 1,
            id: step.id.clone(),
            title: step.display_title().to_string(),
            optional: step.optional,
            skippable: step.skippable,
            depends_on: step.depends_on.iter().cloned().collect(),
            command: command_for(&step.id),
            excluded,
        })
        .collect()
}

fn describe(entry: &PlanEntry) -> String {
    let mut line = format!("{:>3}. {}", entry.position, entry.title);
    if entry.title != entry.id {
        line.push_str(&format!(" [{}]", entry.id));
    }
    if entry.optional {
        line.push_str(" (optional)");
    }
    if !entry.depends_on.is_empty() {
        line.push_str(&format!(" after {}", entry.depends_on.join(", ")));
    }
    if entry.excluded {
        line.push_str(" - excluded");
    }
    line
}

impl Command for PlanCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let Some(project) =
            load_project(&self.project_root, self.config_override.as_deref(), ui)?
        else {
            return Ok(CommandResult::failure(EXIT_NO_CONFIG));
        };

        let mut settings = project.wizard.settings.clone();
        if self.args.skip_optional {
            settings.skip_optional = true;
        }
        settings.validate(&project.graph)?;

        let commands = project.wizard.commands();
        let plan = build_plan(
            &project.graph,
            &settings.available_steps(&project.graph),
            &settings.excluded_steps(&project.graph),
            |id| commands.get(id).cloned(),
        );

        if self.args.json {
            let json =
                serde_json::to_string_pretty(&plan).map_err(|e| TrailheadError::Other(e.into()))?;
            ui.message(&json);
            return Ok(CommandResult::success());
        }

        ui.show_header(project.wizard.display_name());
        for entry in &plan {
            ui.message(&describe(entry));
        }
        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TRAILHEAD_DIR;
    use crate::ui::MockUI;
    use std::fs;
    use tempfile::TempDir;

    fn setup_project(wizard: &str) -> TempDir {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(TRAILHEAD_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("wizard.yml"), wizard).unwrap();
        temp
    }

    const WIZARD: &str = r#"
steps:
  - id: welcome
    title: Welcome
  - id: extras
    optional: true
    depends_on: [welcome]
  - id: deps
    depends_on: [welcome]
    command: npm install
"#;

    #[test]
    fn plan_lists_steps_in_order() {
        let temp = setup_project(WIZARD);
        let cmd = PlanCommand::new(temp.path(), None, PlanArgs::default());
        let mut ui = MockUI::new();

        assert!(cmd.execute(&mut ui).unwrap().success);
        assert_eq!(ui.headers(), ["Setup wizard"]);
        assert_eq!(ui.messages().len(), 3);
        assert!(ui.messages()[0].contains("Welcome [welcome]"));
        assert!(ui.messages()[1].contains("deps"));
        assert!(ui.messages()[2].contains("(optional)"));
    }

    #[test]
    fn skip_optional_moves_optional_steps_last() {
        let temp = setup_project(WIZARD);
        let args = PlanArgs {
            skip_optional: true,
            json: false,
        };
        let cmd = PlanCommand::new(temp.path(), None, args);
        let mut ui = MockUI::new();

        cmd.execute(&mut ui).unwrap();
        let last = ui.messages().last().unwrap();
        assert!(last.contains("extras"));
        assert!(last.ends_with("- excluded"));
    }

    #[test]
    fn json_output_carries_commands() {
        let temp = setup_project(WIZARD);
        let args = PlanArgs {
            skip_optional: false,
            json: true,
        };
        let cmd = PlanCommand::new(temp.path(), None, args);
        let mut ui = MockUI::new();

        cmd.execute(&mut ui).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&ui.messages()[0]).unwrap();
        assert_eq!(parsed[1]["id"], "deps");
        assert_eq!(parsed[1]["command"], "npm install");
        assert!(parsed[0].get("command").is_none());
    }
}
