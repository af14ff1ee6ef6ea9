//! Wizard file discovery and loading.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::merger::merge_wizard;
use crate::config::schema::WizardConfig;
use crate::error::{Result, TrailheadError};

/// Directory holding wizard files and saved sessions.
pub const TRAILHEAD_DIR: &str = ".trailhead";

/// Wizard file locations for a project, in merge order.
#[derive(Debug, Clone)]
pub struct WizardPaths {
    /// Project wizard: `.trailhead/wizard.yml`
    pub project: Option<PathBuf>,

    /// Local overrides: `.trailhead/wizard.local.yml`
    pub local: Option<PathBuf>,
}

impl WizardPaths {
    /// Discover wizard files under `project_root`.
    pub fn discover(project_root: &Path) -> Self {
        let dir = project_root.join(TRAILHEAD_DIR);
        Self {
            project: existing(dir.join("wizard.yml")),
            local: existing(dir.join("wizard.local.yml")),
        }
    }

    /// Expected location of the project wizard.
    pub fn project_path(project_root: &Path) -> PathBuf {
        project_root.join(TRAILHEAD_DIR).join("wizard.yml")
    }
}

fn existing(path: PathBuf) -> Option<PathBuf> {
    path.exists().then_some(path)
}

/// Find the project root by walking up from `start`.
///
/// A `.trailhead` directory wins over a `.git` directory at the same or a
/// higher level.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(TRAILHEAD_DIR).is_dir() || current.join(".git").exists() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

fn read_value(path: &Path) -> Result<serde_yaml::Value> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            TrailheadError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            TrailheadError::Io(e)
        }
    })?;

    serde_yaml::from_str(&content).map_err(|e| TrailheadError::ConfigParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn from_value(value: serde_yaml::Value, path: &Path) -> Result<WizardConfig> {
    serde_yaml::from_value(value).map_err(|e| TrailheadError::ConfigParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load a single wizard file without merging.
pub fn load_wizard_file(path: &Path) -> Result<WizardConfig> {
    from_value(read_value(path)?, path)
}

/// Load the project wizard merged with its local overrides.
pub fn load_merged_wizard(project_root: &Path) -> Result<WizardConfig> {
    let paths = WizardPaths::discover(project_root);
    let Some(project_path) = paths.project else {
        return Err(TrailheadError::ConfigNotFound {
            path: WizardPaths::project_path(project_root),
        });
    };

    let mut value = read_value(&project_path)?;
    if let Some(local_path) = &paths.local {
        let local = read_value(local_path)?;
        value = merge_wizard(&value, &local);
    }

    from_value(value, &project_path)
}

/// Load the wizard, from `override_path` alone when given.
pub fn load_wizard(project_root: &Path, override_path: Option<&Path>) -> Result<WizardConfig> {
    match override_path {
        Some(path) => load_wizard_file(path),
        None => load_merged_wizard(project_root),
    }
}
