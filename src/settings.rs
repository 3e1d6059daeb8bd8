use anyhow::{Context, Result};
use clusterfile::LabelOrder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::paths;

// ============================================================================
// Settings
// ============================================================================

/// User settings from `<config_dir>/config.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Extra directories searched for cluster files given by name
    pub search_dirs: Vec<String>,

    /// How script `sequence` labels are ordered
    pub script_order: LabelOrder,

    /// Guest scripts run at once within a batch
    pub script_jobs: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            search_dirs: Vec::new(),
            script_order: LabelOrder::default(),
            script_jobs: 4,
        }
    }
}

impl Settings {
    /// Load settings, or return defaults if the file doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::settings_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Settings file {} does not exist, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;

        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.script_jobs, 4);
        assert_eq!(settings.script_order, LabelOrder::Lexicographic);
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "script_order = \"numeric\"\nsearch_dirs = [\"~/clusters\"]\n").unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.script_order, LabelOrder::Numeric);
        assert_eq!(settings.search_dirs, vec!["~/clusters"]);
        assert_eq!(settings.script_jobs, 4);
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "script_jobs = \"many\"\n").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse settings file"));
    }
}
