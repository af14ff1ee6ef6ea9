//! Wizard file loading through the public API.

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use trailhead::config::{load_wizard, TRAILHEAD_DIR};
use trailhead::error::ValidationError;
use trailhead::TrailheadError;

fn write(root: &Path, name: &str, content: &str) {
    let dir = root.join(TRAILHEAD_DIR);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), content).unwrap();
}

const WIZARD: &str = r#"
name: Acme
settings:
  max_retries: 2
steps:
  - id: welcome
  - id: toolchain
    depends_on: [welcome]
    command: rustup show
  - id: extras
    optional: true
    depends_on: [welcome]
"#;

#[test]
fn project_wizard_builds_a_graph() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "wizard.yml", WIZARD);

    let wizard = load_wizard(temp.path(), None).unwrap();
    assert_eq!(wizard.display_name(), "Acme");
    assert_eq!(wizard.settings.max_retries, 2);

    let graph = wizard.to_graph().unwrap();
    assert_eq!(graph.topological_order(), ["welcome", "toolchain", "extras"]);
    assert!(graph.get("extras").unwrap().skippable);
}

#[test]
fn local_overrides_replace_commands_and_settings() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "wizard.yml", WIZARD);
    write(
        temp.path(),
        "wizard.local.yml",
        "settings:\n  continue_on_error: true\nsteps:\n  - id: toolchain\n    command: rustup default stable\n",
    );

    let wizard = load_wizard(temp.path(), None).unwrap();
    assert!(wizard.settings.continue_on_error);
    assert_eq!(wizard.settings.max_retries, 2);
    assert_eq!(
        wizard.commands().get("toolchain").map(String::as_str),
        Some("rustup default stable")
    );
    assert_eq!(wizard.steps.len(), 3);
}

#[test]
fn explicit_path_skips_local_overrides() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "wizard.yml", WIZARD);
    write(temp.path(), "wizard.local.yml", "name: Local\n");
    let other = temp.path().join("other.yml");
    fs::write(&other, "steps:\n  - id: only\n").unwrap();

    let wizard = load_wizard(temp.path(), Some(&other)).unwrap();
    assert_eq!(wizard.steps.len(), 1);
    assert!(wizard.name.is_none());
}

#[test]
fn missing_wizard_is_reported() {
    let temp = TempDir::new().unwrap();
    assert!(matches!(
        load_wizard(temp.path(), None),
        Err(TrailheadError::ConfigNotFound { .. })
    ));
}

#[test]
fn unknown_dependency_is_a_validation_error() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "wizard.yml",
        "steps:\n  - id: a\n    depends_on: [ghost]\n",
    );
    let wizard = load_wizard(temp.path(), None).unwrap();
    assert!(matches!(
        wizard.to_graph(),
        Err(ValidationError::UnknownDependency { .. })
    ));
}
