//! On-disk layout of a stackpm home.
//!
//! ```text
//! <home>/
//! ├── config.toml
//! ├── shims.json                 shim ownership registry
//! ├── bins/                      one shim per binary
//! ├── .locks/
//! ├── binaries/<name>/manifest.json
//! ├── runtimes/<name>/...
//! ├── agents/ stacks/ prompts/
//! └── npm/<sanitized-name>/      npm prefix installs
//! ```

pub mod lock;
pub mod record;

pub use lock::HomeLock;
pub use record::{InstallType, InstalledPackage};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::constants::{BINS_DIR, LOCKS_DIR, PACKAGE_RECORD_FILE, SHIM_REGISTRY_FILE};
use crate::core::{PackageId, PackageKind};

/// Paths under a stackpm home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeLayout {
    root: PathBuf,
}

impl HomeLayout {
    /// A layout rooted at `root`. Nothing is created on disk.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The layout for `$STACKPM_HOME` or `~/.stackpm`.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(crate::config::GlobalConfig::home_dir()?))
    }

    /// The home directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding packages of one kind.
    #[must_use]
    pub fn kind_dir(&self, kind: PackageKind) -> PathBuf {
        self.root.join(kind.directory())
    }

    /// Install directory for a package.
    #[must_use]
    pub fn package_path(&self, id: &PackageId) -> PathBuf {
        self.kind_dir(id.kind).join(id.sanitized_name())
    }

    /// Location of a package's `manifest.json` record.
    #[must_use]
    pub fn record_path(&self, id: &PackageId) -> PathBuf {
        self.package_path(id).join(PACKAGE_RECORD_FILE)
    }

    /// The shared shim directory.
    #[must_use]
    pub fn bins_dir(&self) -> PathBuf {
        self.root.join(BINS_DIR)
    }

    /// The shim ownership registry document.
    #[must_use]
    pub fn shim_registry_path(&self) -> PathBuf {
        self.root.join(SHIM_REGISTRY_FILE)
    }

    /// Directory for lock files.
    #[must_use]
    pub fn locks_dir(&self) -> PathBuf {
        self.root.join(LOCKS_DIR)
    }

    /// Whether a package has a record on disk.
    #[must_use]
    pub fn is_package_installed(&self, id: &PackageId) -> bool {
        self.record_path(id).is_file()
    }

    /// Reads a package record, `None` when the package is not installed.
    pub async fn read_record(&self, id: &PackageId) -> Result<Option<InstalledPackage>> {
        let path = self.record_path(id);
        match fs::read_to_string(&path).await {
            Ok(content) => {
                let record = serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse package record: {}", path.display()))?;
                Ok(Some(record))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read package record: {}", path.display())),
        }
    }

    /// Writes a package record atomically, marking the package installed.
    pub async fn write_record(&self, record: &InstalledPackage) -> Result<()> {
        let path = self.record_path(&record.id);
        let content =
            serde_json::to_string_pretty(record).context("Failed to serialize package record")?;

        debug!(package = %record.id, path = %path.display(), "Writing package record");
        tokio::task::spawn_blocking(move || crate::utils::safe_write(&path, &content))
            .await
            .context("Record write task panicked")?
    }

    /// Deletes only the record, so the package no longer counts as installed.
    pub async fn remove_record(&self, id: &PackageId) -> Result<()> {
        let path = self.record_path(id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove package record: {}", path.display())),
        }
    }

    /// Deletes a package directory and everything in it.
    pub async fn remove_package(&self, id: &PackageId) -> Result<()> {
        let path = self.package_path(id);
        match fs::remove_dir_all(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove package directory: {}", path.display())),
        }
    }

    /// Every installed package record, across all kinds.
    ///
    /// Unreadable records are skipped with a warning.
    pub async fn list_installed(&self) -> Result<Vec<InstalledPackage>> {
        let mut records = Vec::new();

        for kind in PackageKind::ALL {
            let dir = self.kind_dir(kind);
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to list directory: {}", dir.display()));
                }
            };

            while let Some(entry) = entries.next_entry().await? {
                let record_path = entry.path().join(PACKAGE_RECORD_FILE);
                let Ok(content) = fs::read_to_string(&record_path).await else {
                    continue;
                };
                match serde_json::from_str::<InstalledPackage>(&content) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!(path = %record_path.display(), error = %e, "Skipping unreadable package record"),
                }
            }
        }

        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}
