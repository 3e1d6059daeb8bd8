//! Path resolution for vcluster
//!
//! # Environment Variables
//!
//! - `VCLUSTER_CONFIG_DIR` - Override config directory (e.g., `~/dotfiles/vcluster`)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `VCLUSTER_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/vcluster` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\vcluster`
//!    - macOS/Linux: `~/.config/vcluster`
//!
//! Cluster files given by name are looked up as given, then under
//! `<config_dir>/clusters/`, then in each of the settings' `search_dirs`.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "VCLUSTER_CONFIG_DIR";

/// Get the vcluster config directory path
pub fn config_dir() -> Result<PathBuf> {
    // 1. Check environment variable override
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    // 2. Check XDG_CONFIG_HOME
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("vcluster");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    // 3. Platform default
    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            let path = app_data.join("vcluster");
            log::debug!("Using Windows config dir: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("vcluster");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Directory holding named cluster files
pub fn clusters_dir() -> Result<PathBuf> {
    Ok(config_dir()?.join("clusters"))
}

/// Settings file path
pub fn settings_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Locate a cluster file given on the command line
pub fn find_cluster_file(file: &str, search_dirs: &[String]) -> Result<PathBuf> {
    let explicit = expand(file);
    if explicit.is_file() {
        return Ok(explicit);
    }

    let mut candidates = vec![clusters_dir()?.join(file)];
    candidates.extend(search_dirs.iter().map(|dir| expand(dir).join(file)));
    find_in(file, &candidates)
}

fn find_in(file: &str, candidates: &[PathBuf]) -> Result<PathBuf> {
    for candidate in candidates {
        log::trace!("Looking for cluster file at {}", candidate.display());
        if candidate.is_file() {
            log::debug!("Found cluster file {}", candidate.display());
            return Ok(candidate.clone());
        }
    }
    let searched: Vec<String> = candidates
        .iter()
        .filter_map(|c| c.parent().map(Path::display).map(|d| d.to_string()))
        .collect();
    bail!(
        "Couldn't find cluster file {file} (searched: {})",
        searched.join(", ")
    )
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    /// Helper to run a test with temporary env var
    ///
    /// # Safety
    /// This function uses unsafe env::set_var/remove_var which can cause issues
    /// if other threads read environment variables concurrently.
    /// Only use in single-threaded test contexts.
    fn with_env_var<F, R>(key: &str, value: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: Tests run in isolation and don't read env vars concurrently
        unsafe { env::set_var(key, value) };
        let result = f();
        match original {
            // SAFETY: Tests run in isolation
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        result
    }

    #[test]
    fn test_config_dir_env_override() {
        with_env_var(ENV_CONFIG_DIR, "/custom/vcluster", || {
            assert_eq!(config_dir().unwrap(), PathBuf::from("/custom/vcluster"));
            assert_eq!(
                clusters_dir().unwrap(),
                PathBuf::from("/custom/vcluster/clusters")
            );
            assert_eq!(
                settings_file().unwrap(),
                PathBuf::from("/custom/vcluster/config.toml")
            );
        });
    }

    #[test]
    fn test_expand_with_tilde() {
        let result = expand("~/clusters/lab.conf");
        let home = dirs::home_dir().unwrap();
        assert_eq!(result, home.join("clusters").join("lab.conf"));
    }

    #[test]
    fn test_find_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("lab.conf");
        std::fs::write(&file, "[_VMS_]\n").unwrap();
        let found = find_cluster_file(file.to_str().unwrap(), &[]).unwrap();
        assert_eq!(found, file);
    }

    #[test]
    fn test_find_in_search_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(second.path().join("lab.conf"), "").unwrap();
        let candidates = vec![first.path().join("lab.conf"), second.path().join("lab.conf")];
        assert_eq!(
            find_in("lab.conf", &candidates).unwrap(),
            second.path().join("lab.conf")
        );

        std::fs::write(first.path().join("lab.conf"), "").unwrap();
        assert_eq!(
            find_in("lab.conf", &candidates).unwrap(),
            first.path().join("lab.conf")
        );
    }

    #[test]
    fn test_find_missing_lists_locations() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_in("nope.conf", &[dir.path().join("nope.conf")]).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Couldn't find cluster file nope.conf"));
        assert!(message.contains(&dir.path().display().to_string()));
    }
}
