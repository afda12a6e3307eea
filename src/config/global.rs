//! Global configuration management for stackpm.
//!
//! The configuration file lives at `<home>/config.toml`, where `<home>` is
//! `$STACKPM_HOME` or `~/.stackpm`. `$STACKPM_CONFIG` points at a different
//! file. A missing file yields defaults.
//!
//! # Example
//!
//! ```toml
//! # Replace another package's shim instead of failing
//! shim_conflict = "override"
//!
//! # Symlinks instead of wrapper scripts (Unix only)
//! shim_style = "symlink"
//!
//! system_search_paths = ["~/.local/bin", "/usr/local/bin", "/usr/bin"]
//! command_timeout_secs = 300
//! npm_command = "npm"
//! python_command = "python3"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::constants::{
    CONFIG_ENV_VAR, CONFIG_FILE, DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_SYSTEM_SEARCH_PATHS,
    HOME_ENV_VAR,
};
use crate::shims::{ConflictPolicy, ShimStyle};

fn default_search_paths() -> Vec<String> {
    DEFAULT_SYSTEM_SEARCH_PATHS.iter().map(|p| (*p).to_string()).collect()
}

const fn default_command_timeout_secs() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

fn default_npm_command() -> String {
    let npm = if crate::utils::is_windows() { "npm.cmd" } else { "npm" };
    npm.to_string()
}

fn default_python_command() -> String {
    let python = if crate::utils::is_windows() { "python" } else { "python3" };
    python.to_string()
}

/// Global configuration structure for stackpm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// What to do when a package claims a binary another package owns.
    #[serde(default)]
    pub shim_conflict: ConflictPolicy,

    /// How shims are materialized on disk.
    #[serde(default)]
    pub shim_style: ShimStyle,

    /// Directories probed, in order, for system binaries. `~` is expanded.
    #[serde(default = "default_search_paths")]
    pub system_search_paths: Vec<String>,

    /// Upper bound for child processes such as `npm install`.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Executable used for npm installs.
    #[serde(default = "default_npm_command")]
    pub npm_command: String,

    /// Interpreter used to create pip virtual environments.
    #[serde(default = "default_python_command")]
    pub python_command: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            shim_conflict: ConflictPolicy::default(),
            shim_style: ShimStyle::default(),
            system_search_paths: default_search_paths(),
            command_timeout_secs: default_command_timeout_secs(),
            npm_command: default_npm_command(),
            python_command: default_python_command(),
        }
    }
}

impl GlobalConfig {
    /// Loads configuration for a stackpm home.
    ///
    /// Honors `$STACKPM_CONFIG`; otherwise reads `<home>/config.toml`.
    /// Returns defaults when the file does not exist.
    pub async fn load(home: &Path) -> Result<Self> {
        let path = Self::config_path(home, std::env::var(CONFIG_ENV_VAR).ok());
        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read global config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse global config from {}", path.display()))
    }

    /// Saves configuration to a specific file, atomically.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize global config")?;
        let path = path.to_path_buf();

        tokio::task::spawn_blocking(move || crate::utils::safe_write(&path, &content))
            .await
            .context("Config write task panicked")?
    }

    /// The config file path, given an optional `$STACKPM_CONFIG` value.
    #[must_use]
    pub fn config_path(home: &Path, env_override: Option<String>) -> PathBuf {
        match env_override {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => home.join(CONFIG_FILE),
        }
    }

    /// The stackpm home directory: `$STACKPM_HOME` or `~/.stackpm`.
    pub fn home_dir() -> Result<PathBuf> {
        Self::resolve_home(std::env::var(HOME_ENV_VAR).ok())
    }

    /// Resolves the home directory from an optional override value.
    pub fn resolve_home(env_override: Option<String>) -> Result<PathBuf> {
        match env_override {
            Some(path) if !path.is_empty() => crate::utils::resolve_path(&path),
            _ => Ok(crate::utils::get_home_dir()?.join(".stackpm")),
        }
    }

    /// Search paths with `~` and environment variables expanded.
    pub fn search_paths(&self) -> Result<Vec<PathBuf>> {
        self.system_search_paths.iter().map(|p| crate::utils::resolve_path(p)).collect()
    }

    /// Child process timeout as a [`Duration`].
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        assert!(GlobalConfig::load_from(&temp.path().join("config.toml")).await.is_err());

        let defaults = GlobalConfig::load(temp.path()).await.unwrap();
        assert_eq!(defaults, GlobalConfig::default());
        assert_eq!(defaults.shim_conflict, ConflictPolicy::Reject);
        assert_eq!(defaults.system_search_paths.first().map(String::as_str), Some("/opt/homebrew/bin"));
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let config = GlobalConfig {
            shim_conflict: ConflictPolicy::Override,
            command_timeout_secs: 42,
            ..GlobalConfig::default()
        };

        config.save_to(&path).await.unwrap();
        let loaded = GlobalConfig::load_from(&path).await.unwrap();

        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "shim_conflict = \"override\"\n").unwrap();

        let loaded = GlobalConfig::load_from(&path).await.unwrap();

        assert_eq!(loaded.shim_conflict, ConflictPolicy::Override);
        assert_eq!(loaded.command_timeout_secs, DEFAULT_COMMAND_TIMEOUT_SECS);
    }

    #[test]
    fn test_resolve_home_override() {
        let home = GlobalConfig::resolve_home(Some("/tmp/stackpm-home".to_string())).unwrap();
        assert_eq!(home, PathBuf::from("/tmp/stackpm-home"));

        let default = GlobalConfig::resolve_home(None).unwrap();
        assert!(default.ends_with(".stackpm"));
    }

    #[test]
    fn test_config_path_override() {
        let home = Path::new("/h");
        assert_eq!(GlobalConfig::config_path(home, None), PathBuf::from("/h/config.toml"));
        assert_eq!(
            GlobalConfig::config_path(home, Some("/etc/stackpm.toml".to_string())),
            PathBuf::from("/etc/stackpm.toml")
        );
    }
}
