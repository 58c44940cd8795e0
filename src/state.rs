use anyhow::{Context, Result};
use aptkit::{ChangeLog, InstalledSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

use crate::paths;

const STATE_FILE: &str = "state.toml";
const CHANGES_FILE: &str = "changes.toml";

// ============================================================================
// State Structures
// ============================================================================

/// Last observed system state
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SystemState {
    /// When the package snapshot was last replaced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,

    /// Installed packages after the last successful sync
    #[serde(default)]
    pub packages: InstalledSet,
}

/// Changes accumulated across sync runs
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ChangesState {
    #[serde(default)]
    pub packages: ChangeLog,
}

// ============================================================================
// Persistence
// ============================================================================

impl SystemState {
    /// Load state from the state directory, or default if absent
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::state_dir()?)
    }

    pub fn load_from(dir: &Path) -> Result<Self> {
        load_toml(&dir.join(STATE_FILE))
    }

    pub fn save_to(&self, dir: &Path) -> Result<()> {
        save_toml(dir, STATE_FILE, self)
    }

    /// Replace the package snapshot and stamp the time
    pub fn set_packages(&mut self, packages: InstalledSet) {
        self.packages = packages;
        self.last_updated = Some(Utc::now());
    }
}

impl ChangesState {
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::state_dir()?)
    }

    pub fn load_from(dir: &Path) -> Result<Self> {
        load_toml(&dir.join(CHANGES_FILE))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&paths::state_dir()?)
    }

    pub fn save_to(&self, dir: &Path) -> Result<()> {
        save_toml(dir, CHANGES_FILE, self)
    }
}

fn load_toml<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        log::debug!("{} does not exist, using default", path.display());
        return Ok(T::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read state file: {}", path.display()))?;

    let value = toml::from_str(&content)
        .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

    log::debug!("Loaded {}", path.display());
    Ok(value)
}

fn save_toml<T: Serialize>(dir: &Path, file: &str, value: &T) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;

    let path = dir.join(file);
    let content = toml::to_string_pretty(value).context("Failed to serialize state to TOML")?;

    fs::write(&path, &content)
        .with_context(|| format!("Failed to write state file: {}", path.display()))?;

    log::debug!("Saved {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aptkit::VersionChange;
    use tempfile::TempDir;

    #[test]
    fn test_missing_files_load_as_default() {
        let dir = TempDir::new().unwrap();

        let state = SystemState::load_from(dir.path()).unwrap();
        assert!(state.packages.is_empty());
        assert!(state.last_updated.is_none());

        let changes = ChangesState::load_from(dir.path()).unwrap();
        assert!(changes.packages.is_empty());
    }

    #[test]
    fn test_system_state_persists_packages() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested").join("state");

        let mut state = SystemState::default();
        state.set_packages(
            [("git", "1:2.34.1-1ubuntu1.10"), ("libc6", "2.35-0ubuntu3.1")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        state.save_to(&nested).unwrap();

        let loaded = SystemState::load_from(&nested).unwrap();
        assert_eq!(loaded.packages, state.packages);
        assert!(loaded.last_updated.is_some());
    }

    #[test]
    fn test_changes_state_persists_all_kinds() {
        let dir = TempDir::new().unwrap();

        let mut changes = ChangesState::default();
        changes
            .packages
            .added
            .insert("make".to_string(), "4.3".to_string());
        changes.packages.updated.insert(
            "git".to_string(),
            VersionChange {
                from: "1.0".to_string(),
                to: "1.1".to_string(),
            },
        );
        changes
            .packages
            .removed
            .insert("nano".to_string(), "6.2".to_string());
        changes.save_to(dir.path()).unwrap();

        let loaded = ChangesState::load_from(dir.path()).unwrap();
        assert_eq!(loaded.packages, changes.packages);
    }

    #[test]
    fn test_corrupt_state_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(STATE_FILE), "packages = ").unwrap();

        assert!(SystemState::load_from(dir.path()).is_err());
    }
}
