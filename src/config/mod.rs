//! Wizard definition files.
//!
//! The project wizard lives at `.trailhead/wizard.yml`. A developer may keep
//! an uncommitted `.trailhead/wizard.local.yml` next to it that overrides
//! settings and step commands; see [`merger`] for the rules.

pub mod loader;
pub mod merger;
pub mod schema;

pub use loader::{find_project_root, load_wizard, load_wizard_file, WizardPaths, TRAILHEAD_DIR};
pub use schema::{StepConfig, WizardConfig};
