//! Shim and ownership registry.
//!
//! Every binary a package exposes gets one shim in `<home>/bins`, so users put
//! a single directory on `PATH` no matter how each package lays out its files.
//! `<home>/shims.json` records who owns each shim:
//!
//! ```json
//! {
//!   "sqlite3": { "owner": "binary:sqlite", "type": "system", "target": "/usr/bin/sqlite3" },
//!   "claude":  { "owner": "agent:claude", "type": "npm", "target": "/home/me/.stackpm/agents/claude/node_modules/.bin/claude" }
//! }
//! ```
//!
//! # Ownership
//!
//! Re-shimming a binary for its current owner overwrites the shim. A
//! different package claiming the same name is a [`StackpmError::ShimConflict`]
//! unless the registry's [`ConflictPolicy`] is `Override` or the caller forces
//! it.
//!
//! Every read-modify-write of `shims.json` holds the `shims` [`HomeLock`].

pub mod writer;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::GlobalConfig;
use crate::constants::default_lock_timeout;
use crate::core::{PackageId, StackpmError};
use crate::store::{HomeLayout, HomeLock, InstallType};
use writer::{read_shim_target, remove_shim_file, shim_file_name, write_shim};

const SHIM_LOCK_NAME: &str = "shims";

/// What to do when a package claims a binary another package already owns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Fail with [`StackpmError::ShimConflict`] unless forced
    #[default]
    Reject,
    /// Replace the shim and transfer ownership
    Override,
}

/// How shims are materialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShimStyle {
    /// An `exec` wrapper script (`.cmd` on Windows)
    #[default]
    Wrapper,
    /// A symbolic link to the target (Unix only)
    Symlink,
}

/// One entry of `shims.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShimEntry {
    /// Package that owns the shim
    pub owner: PackageId,
    /// How the owner was installed
    #[serde(rename = "type")]
    pub install_type: InstallType,
    /// Executable the shim runs
    pub target: PathBuf,
}

/// Result of [`ShimRegistry::validate_shim`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShimValidation {
    /// Whether the shim exists, is executable, and its target exists
    pub valid: bool,
    /// The recorded target, when known
    pub target: Option<PathBuf>,
    /// First problem found
    pub error: Option<String>,
}

impl ShimValidation {
    fn invalid(target: Option<PathBuf>, error: String) -> Self {
        Self {
            valid: false,
            target,
            error: Some(error),
        }
    }
}

/// Handle to the shim directory and ownership registry of one home.
#[derive(Debug, Clone)]
pub struct ShimRegistry {
    layout: HomeLayout,
    policy: ConflictPolicy,
    style: ShimStyle,
    lock_timeout: Duration,
}

impl ShimRegistry {
    /// A registry with the default policy (reject) and style (wrapper).
    #[must_use]
    pub fn new(layout: HomeLayout) -> Self {
        Self {
            layout,
            policy: ConflictPolicy::default(),
            style: ShimStyle::default(),
            lock_timeout: default_lock_timeout(),
        }
    }

    /// A registry configured from global settings.
    #[must_use]
    pub fn from_config(layout: HomeLayout, config: &GlobalConfig) -> Self {
        Self::new(layout).with_policy(config.shim_conflict).with_style(config.shim_style)
    }

    /// Sets the conflict policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the shim style.
    #[must_use]
    pub const fn with_style(mut self, style: ShimStyle) -> Self {
        self.style = style;
        self
    }

    /// Sets how long to wait for the registry lock.
    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// The conflict policy in effect.
    #[must_use]
    pub const fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Path of the shim for `name`.
    #[must_use]
    pub fn shim_path(&self, name: &str) -> PathBuf {
        self.layout.bins_dir().join(shim_file_name(name))
    }

    async fn lock(&self) -> Result<HomeLock> {
        HomeLock::acquire_with_timeout(&self.layout.locks_dir(), SHIM_LOCK_NAME, self.lock_timeout)
            .await
    }

    async fn load(&self) -> Result<BTreeMap<String, ShimEntry>> {
        let path = self.layout.shim_registry_path();
        match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse shim registry: {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read shim registry: {}", path.display()))
            }
        }
    }

    async fn save(&self, entries: &BTreeMap<String, ShimEntry>) -> Result<()> {
        let path = self.layout.shim_registry_path();
        let content =
            serde_json::to_string_pretty(entries).context("Failed to serialize shim registry")?;
        tokio::task::spawn_blocking(move || crate::utils::safe_write(&path, &content))
            .await
            .context("Shim registry write task panicked")?
    }

    /// Every registered shim, keyed by binary name.
    pub async fn list(&self) -> Result<BTreeMap<String, ShimEntry>> {
        self.load().await
    }

    /// The registry entry for `name`.
    pub async fn get(&self, name: &str) -> Result<Option<ShimEntry>> {
        Ok(self.load().await?.remove(name))
    }

    /// The package owning `name`, if any.
    pub async fn owner_of(&self, name: &str) -> Result<Option<PackageId>> {
        Ok(self.get(name).await?.map(|entry| entry.owner))
    }

    fn allows_override(&self, force: bool) -> bool {
        force || self.policy() == ConflictPolicy::Override
    }

    fn find_conflict(
        &self,
        entries: &BTreeMap<String, ShimEntry>,
        owner: &PackageId,
        names: &[&str],
        force: bool,
    ) -> Result<(), StackpmError> {
        for name in names {
            let Some(existing) = entries.get(*name) else {
                continue;
            };
            if existing.owner == *owner {
                continue;
            }
            if !self.allows_override(force) {
                return Err(StackpmError::ShimConflict {
                    binary: (*name).to_string(),
                    owner: existing.owner.to_string(),
                    requested_by: owner.to_string(),
                });
            }
            warn!(
                binary = %name,
                previous_owner = %existing.owner,
                new_owner = %owner,
                "Overriding shim owned by another package"
            );
        }
        Ok(())
    }

    /// Checks that `owner` may take every name in `names`, without writing.
    ///
    /// Installers call this before producing anything, so a conflict fails
    /// the package before a record exists.
    ///
    /// # Errors
    ///
    /// [`StackpmError::ShimConflict`] under the same rules as
    /// [`ShimRegistry::create_shims`].
    pub async fn check_conflicts(&self, owner: &PackageId, names: &[String], force: bool) -> Result<()> {
        if names.is_empty() || self.allows_override(force) {
            return Ok(());
        }
        let entries = self.load().await?;
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        self.find_conflict(&entries, owner, &names, force)?;
        Ok(())
    }

    /// Creates or replaces the shim for one binary.
    ///
    /// See [`ShimRegistry::create_shims`].
    pub async fn create_shim(
        &self,
        name: &str,
        owner: &PackageId,
        install_type: InstallType,
        target: &Path,
        force: bool,
    ) -> Result<PathBuf> {
        let mut paths =
            self.create_shims(owner, install_type, &[(name.to_string(), target.to_path_buf())], force)
                .await?;
        paths.pop().ok_or_else(|| anyhow::anyhow!("No shim created for {name}"))
    }

    /// Creates or replaces shims for a set of `(binary name, target)` pairs.
    ///
    /// All conflicts are checked before anything is written, so a rejected
    /// batch leaves the registry untouched. `force` overrides a `Reject`
    /// policy for this call.
    ///
    /// # Errors
    ///
    /// [`StackpmError::ShimConflict`] for the first binary owned by another
    /// package when overriding is not allowed.
    pub async fn create_shims(
        &self,
        owner: &PackageId,
        install_type: InstallType,
        bins: &[(String, PathBuf)],
        force: bool,
    ) -> Result<Vec<PathBuf>> {
        let _lock = self.lock().await?;
        let mut entries = self.load().await?;
        let names: Vec<&str> = bins.iter().map(|(name, _)| name.as_str()).collect();
        self.find_conflict(&entries, owner, &names, force)?;

        let mut paths = Vec::with_capacity(bins.len());
        for (name, target) in bins {
            let path = self.shim_path(name);
            let style = self.style;
            let (shim, dest) = (path.clone(), target.clone());
            tokio::task::spawn_blocking(move || write_shim(&shim, &dest, style))
                .await
                .context("Shim write task panicked")??;

            entries.insert(
                name.clone(),
                ShimEntry {
                    owner: owner.clone(),
                    install_type,
                    target: target.clone(),
                },
            );
            info!(binary = %name, owner = %owner, target = %target.display(), "Shim created");
            paths.push(path);
        }

        self.save(&entries).await?;
        Ok(paths)
    }

    /// Removes the shim for `name`.
    ///
    /// When `owner` is given, the shim is only removed if that package owns
    /// it. Returns whether anything was removed.
    pub async fn remove_shim(&self, name: &str, owner: Option<&PackageId>) -> Result<bool> {
        let _lock = self.lock().await?;
        let mut entries = self.load().await?;

        let owned = match (entries.get(name), owner) {
            (Some(entry), Some(owner)) => entry.owner == *owner,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !owned {
            debug!(binary = name, "Shim not owned by requester, leaving it");
            return Ok(false);
        }

        remove_shim_file(&self.shim_path(name))?;
        entries.remove(name);
        self.save(&entries).await?;
        info!(binary = name, "Shim removed");
        Ok(true)
    }

    /// Removes every shim owned by `owner`, returning the removed names.
    ///
    /// Shims owned by other packages are never touched.
    pub async fn remove_shims_for_owner(&self, owner: &PackageId) -> Result<Vec<String>> {
        let _lock = self.lock().await?;
        let mut entries = self.load().await?;

        let names: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.owner == *owner)
            .map(|(name, _)| name.clone())
            .collect();

        for name in &names {
            remove_shim_file(&self.shim_path(name))?;
            entries.remove(name);
        }

        if !names.is_empty() {
            self.save(&entries).await?;
            info!(owner = %owner, count = names.len(), "Removed shims");
        }
        Ok(names)
    }

    /// Checks that the shim for `name` exists, is executable, and that its
    /// target still exists.
    ///
    /// Never fails; problems are reported in the result.
    pub async fn validate_shim(&self, name: &str) -> ShimValidation {
        let path = self.shim_path(name);
        let recorded = match self.get(name).await {
            Ok(entry) => entry.map(|e| e.target),
            Err(e) => return ShimValidation::invalid(None, format!("{e:#}")),
        };
        let target = recorded.or_else(|| read_shim_target(&path));

        if std::fs::symlink_metadata(&path).is_err() {
            return ShimValidation::invalid(target, format!("shim not found: {}", path.display()));
        }
        if !crate::utils::fs::is_executable(&path) {
            return ShimValidation::invalid(target, format!("shim is not executable: {}", path.display()));
        }
        let Some(target) = target else {
            return ShimValidation::invalid(None, format!("shim target unknown for {name}"));
        };
        if !target.exists() {
            return ShimValidation::invalid(
                Some(target.clone()),
                format!("shim target does not exist: {}", target.display()),
            );
        }

        ShimValidation {
            valid: true,
            target: Some(target),
            error: None,
        }
    }
}
