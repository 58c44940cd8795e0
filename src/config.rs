use anyhow::{Context, Result, bail};
use aptkit::{PackageSpec, SpecEntry};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Base name of the manifest file in the config directory
pub const MANIFEST_NAME: &str = "packages";

// ============================================================================
// Config Format
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }

    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(ConfigFormat::Toml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Packages Manifest
// ============================================================================

/// Desired packages, groups and externals
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PackagesManifest {
    #[serde(default)]
    pub packages: Vec<SpecEntry>,
}

impl PackagesManifest {
    /// Parse a manifest from a string in the given format
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        match format {
            ConfigFormat::Toml => toml::from_str(content).context("Invalid TOML manifest"),
            ConfigFormat::Json => serde_json::from_str(content).context("Invalid JSON manifest"),
        }
    }

    /// Load a manifest file, detecting the format from its extension
    pub fn load(path: &Path) -> Result<Self> {
        let Some(format) = ConfigFormat::from_path(path) else {
            bail!(
                "Unsupported manifest format: {} (expected .toml or .json)",
                path.display()
            );
        };

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let manifest = Self::parse(&content, format)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        log::debug!(
            "Loaded {} manifest entries from {}",
            manifest.packages.len(),
            path.display()
        );
        Ok(manifest)
    }

    /// Normalized specs in manifest order
    pub fn specs(&self) -> Vec<PackageSpec> {
        aptkit::types::normalize(&self.packages)
    }
}

/// Find the manifest in a config directory, preferring TOML over JSON
pub fn find_manifest(dir: &Path) -> Option<PathBuf> {
    [ConfigFormat::Toml, ConfigFormat::Json]
        .into_iter()
        .map(|format| dir.join(format!("{MANIFEST_NAME}.{}", format.extension())))
        .find(|path| path.exists())
}
