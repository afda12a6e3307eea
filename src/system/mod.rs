//! Registration of binaries the OS already provides.
//!
//! Registering `sqlite3` probes the configured search paths, proves the
//! binary runs (`sqlite3 --version`), writes a `binary:sqlite3` record with
//! `installType: "system"`, and shims each declared bin to the discovered
//! path. Re-registering is safe; it rewrites the record and shims.
//!
//! Probe failures ([`StackpmError::BinaryNotFound`]) and functional failures
//! ([`StackpmError::BinaryNotFunctional`]) are kept apart so a stale stub on
//! `PATH` is reported as broken rather than missing.

use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::constants::VERSION_CHECK_TIMEOUT;
use crate::core::{PackageId, PackageKind, StackpmError};
use crate::shims::ShimRegistry;
use crate::store::{HomeLayout, InstallType, InstalledPackage};
use crate::utils::process::ProcessCommand;
use crate::version::extract_version;

/// Options for [`SystemRegistrar::register_system_binary`].
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    /// Directories to probe, in order; empty means the registrar defaults
    pub search_paths: Vec<PathBuf>,
    /// Shim names to create; empty means just the probed name
    pub bins: Vec<String>,
    /// Take over shims owned by other packages
    pub force: bool,
}

/// Outcome of a registration or unregistration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrationResult {
    /// Whether every step succeeded
    pub success: bool,
    /// What went wrong
    pub error: Option<String>,
    /// The discovered binary
    pub path: Option<PathBuf>,
}

impl RegistrationResult {
    fn ok(path: Option<PathBuf>) -> Self {
        Self {
            success: true,
            error: None,
            path,
        }
    }

    fn failed(error: &anyhow::Error) -> Self {
        Self {
            success: false,
            error: Some(format!("{error:#}")),
            path: None,
        }
    }
}

/// Finds an executable called `name` in the first matching search path.
///
/// # Errors
///
/// [`StackpmError::BinaryNotFound`] listing every path searched.
pub fn find_binary(name: &str, search_paths: &[PathBuf]) -> Result<PathBuf, StackpmError> {
    let not_found = || StackpmError::BinaryNotFound {
        name: name.to_string(),
        searched: search_paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "),
    };

    let existing: Vec<&PathBuf> = search_paths.iter().filter(|p| p.is_dir()).collect();
    if existing.is_empty() {
        return Err(not_found());
    }
    let joined = std::env::join_paths(existing).map_err(|_| not_found())?;
    let cwd = search_paths.first().cloned().unwrap_or_default();

    which::which_in(name, Some(joined), cwd).map_err(|_| not_found())
}

/// Runs `<path> --version`, returning its output.
///
/// # Errors
///
/// [`StackpmError::BinaryNotFunctional`] when the binary cannot be run, exits
/// non-zero, or hangs past `timeout`.
pub async fn check_functional(name: &str, path: &Path, timeout: Duration) -> Result<String, StackpmError> {
    ProcessCommand::new(path)
        .arg("--version")
        .timeout(timeout)
        .with_context(name)
        .execute()
        .await
        .map(|output| output.combined())
        .map_err(|e| StackpmError::BinaryNotFunctional {
            name: name.to_string(),
            path: path.display().to_string(),
            reason: format!("{e:#}"),
        })
}

/// Adopts OS-provided binaries into a stackpm home.
#[derive(Debug, Clone)]
pub struct SystemRegistrar {
    layout: HomeLayout,
    shims: ShimRegistry,
    default_search_paths: Vec<PathBuf>,
    version_timeout: Duration,
}

impl SystemRegistrar {
    /// A registrar probing `default_search_paths` when callers pass none.
    pub fn new(layout: HomeLayout, shims: ShimRegistry, default_search_paths: Vec<PathBuf>) -> Self {
        Self {
            layout,
            shims,
            default_search_paths,
            version_timeout: VERSION_CHECK_TIMEOUT,
        }
    }

    /// Overrides the `--version` timeout.
    #[must_use]
    pub const fn with_version_timeout(mut self, timeout: Duration) -> Self {
        self.version_timeout = timeout;
        self
    }

    fn system_id(name: &str) -> PackageId {
        PackageId::new(PackageKind::Binary, name)
    }

    /// Probes, checks, records, and shims the system binary `name`.
    ///
    /// Failures are reported in the result, never returned as errors.
    pub async fn register_system_binary(&self, name: &str, options: RegisterOptions) -> RegistrationResult {
        let id = Self::system_id(name);
        match self.register_as(&id, name, &options).await {
            Ok(record) => RegistrationResult::ok(record.path.map(PathBuf::from)),
            Err(e) => {
                warn!(binary = name, error = %e, "System binary registration failed");
                RegistrationResult::failed(&e)
            }
        }
    }

    /// Registers the system binary `name` under an arbitrary package id.
    ///
    /// Used by the installer for `system` sources so the record lives under
    /// the package's own id.
    pub async fn register_as(
        &self,
        id: &PackageId,
        name: &str,
        options: &RegisterOptions,
    ) -> Result<InstalledPackage> {
        let search_paths = if options.search_paths.is_empty() {
            &self.default_search_paths
        } else {
            &options.search_paths
        };

        let path = find_binary(name, search_paths)?;
        debug!(binary = name, path = %path.display(), "Found system binary");

        let version_output = check_functional(name, &path, self.version_timeout).await?;

        let bins = if options.bins.is_empty() {
            vec![name.to_string()]
        } else {
            options.bins.clone()
        };

        let mut record = InstalledPackage::new(id.clone(), InstallType::System)
            .with_bins(bins.clone())
            .with_source("system")
            .with_version(extract_version(&version_output))
            .with_platform_key(crate::platform::current_platform_key());
        record.path = Some(path.display().to_string());
        self.shims.check_conflicts(id, &bins, options.force).await?;
        self.layout.write_record(&record).await?;

        let targets: Vec<(String, PathBuf)> = bins.into_iter().map(|bin| (bin, path.clone())).collect();
        if let Err(e) = self.shims.create_shims(id, InstallType::System, &targets, options.force).await {
            self.layout.remove_record(id).await?;
            return Err(e);
        }

        info!(package = %id, path = %path.display(), "Registered system binary");
        Ok(record)
    }

    /// Whether `name` has a system registration.
    pub async fn is_system_binary_registered(&self, name: &str) -> bool {
        matches!(
            self.get_system_binary_info(name).await,
            Ok(Some(record)) if record.install_type == InstallType::System
        )
    }

    /// The registration record for `name`, if any.
    pub async fn get_system_binary_info(&self, name: &str) -> Result<Option<InstalledPackage>> {
        self.layout.read_record(&Self::system_id(name)).await
    }

    /// Removes the shims and record of a system registration.
    ///
    /// An absent registration is a reported failure.
    pub async fn unregister_system_binary(&self, name: &str) -> RegistrationResult {
        let id = Self::system_id(name);
        match self.unregister(&id, name).await {
            Ok(path) => RegistrationResult::ok(path),
            Err(e) => RegistrationResult::failed(&e),
        }
    }

    async fn unregister(&self, id: &PackageId, name: &str) -> Result<Option<PathBuf>> {
        let record = self
            .layout
            .read_record(id)
            .await?
            .filter(|record| record.install_type == InstallType::System)
            .ok_or_else(|| StackpmError::NotRegistered { name: name.to_string() })?;

        for bin in &record.bins {
            self.shims.remove_shim(bin, Some(id)).await?;
        }
        self.layout.remove_package(id).await?;

        info!(package = %id, "Unregistered system binary");
        Ok(record.path.map(PathBuf::from))
    }
}
