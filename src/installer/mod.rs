//! Package installation.
//!
//! [`Installer`] drives a package from registry id to shims on `PATH`:
//!
//! 1. **Resolve** the whole dependency tree and compute the install order
//!    (dependencies first, installed packages skipped).
//! 2. **Per package**, in order:
//!    - resolve the install config for the platform key,
//!    - validate it (errors fail the package, warnings are logged),
//!    - materialize it into an [`InstallSource`],
//!    - check the declared bins against existing shims,
//!    - execute the source (download, system, npm, or pip),
//!    - write the `manifest.json` record,
//!    - create shims for the produced bins.
//! 3. **Report** what was installed, skipped, and failed.
//!
//! A failed package does not stop the run. Packages that depend on it are
//! reported as failed without being attempted.
//!
//! # Sources
//!
//! | Source     | Execution                                                   |
//! |------------|-------------------------------------------------------------|
//! | `download` | fetch, verify checksum, unpack or place raw, swap into place |
//! | `system`   | run `detect`, then probe and register the OS binary          |
//! | `npm`      | `npm install --prefix <dir> <pkg>@<version>`                 |
//! | `pip`      | `python -m venv <dir>/venv`, `pip install <pkg>[==version]`  |
//! | none       | content-only package; the directory and record are created   |
//!
//! `npm:<spec>` ids skip config resolution entirely and go straight to npm.
//!
//! A record is only written after its source finished, so a checksum mismatch
//! or a failed `npm install` never leaves the package looking installed.
//! If shims cannot be created the record is removed again.

mod bins;
mod download;
mod npm;
mod pip;

pub use bins::{list_bin_dir, locate_bins};
pub use download::{fetch_to_file, install_download};
pub use npm::{NpmInstall, npm_install_spec};
pub use pip::{PipInstall, pip_requirement, venv_bin_dir};

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::GlobalConfig;
use crate::constants::VERSION_CHECK_TIMEOUT;
use crate::core::{NpmSpec, PackageId, StackpmError, parse_package_id};
use crate::manifest::{DetectSpec, Manifest};
use crate::platform::{
    InstallSource, current_platform_key, is_platform_supported, resolve_install,
    validate_resolved_install,
};
use crate::resolver::{DependencyResolver, RegistryClient, ResolvedPackage, get_install_order};
use crate::shims::ShimRegistry;
use crate::store::{HomeLayout, InstallType, InstalledPackage};
use crate::system::{RegisterOptions, SystemRegistrar};
use crate::utils::process::ProcessCommand;

/// Options for [`Installer::install`].
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Reinstall the requested package even when a record exists, and take
    /// over conflicting shims
    pub force: bool,
    /// Target platform; the running platform when `None`
    pub platform_key: Option<String>,
}

/// A package that could not be installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallFailure {
    /// Package id
    pub id: String,
    /// Rendered error chain
    pub error: String,
}

/// Outcome of [`Installer::install`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    /// Installed in this run, in install order
    pub installed: Vec<PackageId>,
    /// Already installed and left alone
    pub skipped: Vec<PackageId>,
    /// Failed, in install order
    pub failed: Vec<InstallFailure>,
}

impl InstallReport {
    /// Whether nothing failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Installs and uninstalls packages in one stackpm home.
pub struct Installer<R> {
    resolver: DependencyResolver<R>,
    layout: HomeLayout,
    config: GlobalConfig,
    shims: ShimRegistry,
    system: SystemRegistrar,
    http: reqwest::Client,
}

impl<R: RegistryClient> Installer<R> {
    /// Creates an installer over `layout`, configured by `config`.
    ///
    /// # Errors
    ///
    /// Fails when a configured search path cannot be expanded or the HTTP
    /// client cannot be built.
    pub fn new(registry: R, layout: HomeLayout, config: GlobalConfig) -> Result<Self> {
        let shims = ShimRegistry::from_config(layout.clone(), &config);
        let system = SystemRegistrar::new(layout.clone(), shims.clone(), config.search_paths()?);
        let http = reqwest::Client::builder()
            .user_agent(concat!("stackpm/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            resolver: DependencyResolver::new(registry, layout.clone()),
            layout,
            config,
            shims,
            system,
            http,
        })
    }

    /// The resolver used for installs.
    pub fn resolver(&self) -> &DependencyResolver<R> {
        &self.resolver
    }

    /// The shim registry installs write to.
    pub fn shims(&self) -> &ShimRegistry {
        &self.shims
    }

    /// The system binary registrar.
    pub fn system(&self) -> &SystemRegistrar {
        &self.system
    }

    /// Installs a package and every missing dependency.
    ///
    /// # Errors
    ///
    /// Only resolution failures (unknown package, registry failure, cycle)
    /// are returned. Per-package failures are collected in the report.
    pub async fn install(&self, id: &str, options: &InstallOptions) -> Result<InstallReport> {
        let tree = self.resolver.resolve_package_tree(id).await?;
        let platform_key = options.platform_key.clone().unwrap_or_else(current_platform_key);

        let mut order = get_install_order(&tree)?;
        if options.force && tree.installed {
            order.push(&tree);
        }

        let mut report = InstallReport::default();
        collect_skipped(&tree, options.force, &mut HashSet::new(), &mut report.skipped);

        let mut failed: HashSet<PackageId> = HashSet::new();
        for package in order {
            if let Some(dep) = package.dependencies.iter().find(|dep| failed.contains(&dep.id)) {
                warn!(package = %package.id, dependency = %dep.id, "Skipping package with failed dependency");
                failed.insert(package.id.clone());
                report.failed.push(InstallFailure {
                    id: package.id.to_string(),
                    error: format!("dependency {} failed to install", dep.id),
                });
                continue;
            }

            match self.install_package(package, &platform_key, options.force).await {
                Ok(record) => {
                    info!(package = %record.id, install_type = %record.install_type, "Installed");
                    report.installed.push(record.id);
                }
                Err(e) => {
                    warn!(package = %package.id, error = %format!("{e:#}"), "Install failed");
                    failed.insert(package.id.clone());
                    report.failed.push(InstallFailure {
                        id: package.id.to_string(),
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Installs one resolved package, ignoring its dependencies.
    pub async fn install_package(
        &self,
        package: &ResolvedPackage,
        platform_key: &str,
        force: bool,
    ) -> Result<InstalledPackage> {
        let manifest = &package.manifest;
        let id = &package.id;
        debug!(package = %id, platform = platform_key, "Installing package");

        if manifest.install_type.as_deref() == Some("npm") {
            return self.install_npm_spec(id, manifest, platform_key, force).await;
        }

        if !is_platform_supported(manifest, platform_key) {
            return Err(StackpmError::PlatformNotSupported {
                id: id.to_string(),
                platform: platform_key.to_string(),
            }
            .into());
        }

        let resolved = resolve_install(manifest, platform_key);
        let report = validate_resolved_install(&resolved, manifest);
        for warning in &report.warnings {
            warn!(package = %id, "{warning}");
        }
        let source = resolved.materialize_validated(manifest, &report)?;
        debug!(
            package = %id,
            source = source.as_ref().map_or("content", InstallSource::name),
            matched = resolved.matched_key.as_str(),
            "Resolved install source"
        );

        let declared = manifest.bins();
        self.shims.check_conflicts(id, declared, force).await?;

        let dir = self.layout.package_path(id);
        let version = Some(manifest.version_or_latest().to_string());

        let (record, bins) = match source {
            None => {
                if !declared.is_empty() {
                    warn!(package = %id, "Package declares bins but no install source; no shims created");
                }
                crate::utils::fs::ensure_dir(&dir)?;
                (InstalledPackage::new(id.clone(), InstallType::Content), Vec::new())
            }
            Some(InstallSource::Download { url, checksum, extract }) => {
                let bins = install_download(
                    &self.http,
                    id,
                    &url,
                    &checksum,
                    extract.as_ref(),
                    declared,
                    &dir,
                )
                .await?;
                let record = InstalledPackage::new(id.clone(), InstallType::Download).with_source(url);
                (record, bins)
            }
            Some(InstallSource::System { detect, preinstalled }) => {
                debug!(package = %id, preinstalled, "Installing from system");
                return self.install_system(id, manifest, &detect, force).await;
            }
            Some(InstallSource::Npm { package: npm_package }) => {
                let npm = NpmInstall {
                    npm_command: &self.config.npm_command,
                    timeout: self.config.command_timeout(),
                    context: id.to_string(),
                };
                let bins = npm.run(&npm_package, manifest.version_or_latest(), &dir, declared).await?;
                let record = InstalledPackage::new(id.clone(), InstallType::Npm).with_source(npm_package);
                (record, bins)
            }
            Some(InstallSource::Pip { package: pip_package }) => {
                let pip = PipInstall {
                    python_command: &self.config.python_command,
                    timeout: self.config.command_timeout(),
                    context: id.to_string(),
                };
                let bins = pip.run(&pip_package, manifest.version_or_latest(), &dir, declared).await?;
                let record = InstalledPackage::new(id.clone(), InstallType::Pip).with_source(pip_package);
                (record, bins)
            }
        };

        let mut record = record.with_version(version).with_platform_key(platform_key);
        record.path = Some(dir.display().to_string());
        self.finish(record, bins, force).await
    }

    async fn install_npm_spec(
        &self,
        id: &PackageId,
        manifest: &Manifest,
        platform_key: &str,
        force: bool,
    ) -> Result<InstalledPackage> {
        let spec = NpmSpec::parse(&id.name);
        let dir = self.layout.package_path(id);
        let npm = NpmInstall {
            npm_command: &self.config.npm_command,
            timeout: self.config.command_timeout(),
            context: id.to_string(),
        };
        let bins = npm.run(&spec.name, &spec.version, &dir, manifest.bins()).await?;

        let mut record = InstalledPackage::new(id.clone(), InstallType::Npm)
            .with_source(spec.name)
            .with_version(Some(spec.version))
            .with_platform_key(platform_key);
        record.path = Some(dir.display().to_string());
        self.finish(record, bins, force).await
    }

    async fn install_system(
        &self,
        id: &PackageId,
        manifest: &Manifest,
        detect: &DetectSpec,
        force: bool,
    ) -> Result<InstalledPackage> {
        if let Some(command) = detect.command() {
            run_detect(id, command, detect.pattern.as_deref()).await?;
        }

        let name = manifest
            .bins()
            .first()
            .map(String::as_str)
            .or_else(|| detect.command().and_then(|c| c.split_whitespace().next()))
            .unwrap_or(&manifest.name)
            .to_string();

        let options = RegisterOptions {
            search_paths: Vec::new(),
            bins: manifest.bins().to_vec(),
            force,
        };
        self.system.register_as(id, &name, &options).await
    }

    /// Writes the record, then the shims.
    ///
    /// Conflicts are checked before the record exists, and a failed shim
    /// write removes the record again, so a package is never left marked
    /// installed without its shims.
    async fn finish(
        &self,
        record: InstalledPackage,
        bins: Vec<(String, PathBuf)>,
        force: bool,
    ) -> Result<InstalledPackage> {
        let record = record.with_bins(bins.iter().map(|(name, _)| name.clone()).collect());
        self.shims.check_conflicts(&record.id, &record.bins, force).await?;
        self.layout.write_record(&record).await?;

        if !bins.is_empty() {
            if let Err(e) = self.shims.create_shims(&record.id, record.install_type, &bins, force).await {
                self.layout.remove_record(&record.id).await?;
                return Err(e);
            }
        }
        Ok(record)
    }

    /// Removes a package's shims, then its directory.
    ///
    /// Shims owned by other packages are left alone. Returns the removed shim
    /// names.
    ///
    /// # Errors
    ///
    /// [`StackpmError::NotInstalled`] when no record exists.
    pub async fn uninstall(&self, id: &str) -> Result<Vec<String>> {
        let id = parse_package_id(id)?;
        if !self.layout.is_package_installed(&id) {
            return Err(StackpmError::NotInstalled { id: id.to_string() }.into());
        }

        let removed = self.shims.remove_shims_for_owner(&id).await?;
        self.layout.remove_package(&id).await?;

        info!(package = %id, shims = removed.len(), "Uninstalled");
        Ok(removed)
    }

    /// Every installed package record.
    pub async fn list_installed(&self) -> Result<Vec<InstalledPackage>> {
        self.layout.list_installed().await
    }
}

fn collect_skipped(
    node: &ResolvedPackage,
    force_root: bool,
    seen: &mut HashSet<PackageId>,
    skipped: &mut Vec<PackageId>,
) {
    if !seen.insert(node.id.clone()) {
        return;
    }
    for dep in &node.dependencies {
        collect_skipped(dep, false, seen, skipped);
    }
    if node.installed && !force_root {
        skipped.push(node.id.clone());
    }
}

/// Runs a detect command and checks its output against `pattern`.
async fn run_detect(id: &PackageId, command: &str, pattern: Option<&str>) -> Result<()> {
    let cmd = ProcessCommand::from_command_line(command).ok_or_else(|| StackpmError::ValidationFailed {
        id: id.to_string(),
        errors: vec!["detect.command is empty".to_string()],
    })?;
    let output = cmd
        .timeout(VERSION_CHECK_TIMEOUT)
        .with_context(id.to_string())
        .execute()
        .await
        .with_context(|| format!("Detect command failed for {id}"))?
        .combined();

    if let Some(pattern) = pattern {
        let re = Regex::new(pattern).map_err(|e| StackpmError::ValidationFailed {
            id: id.to_string(),
            errors: vec![format!("invalid detect.pattern: {e}")],
        })?;
        if !re.is_match(&output) {
            return Err(StackpmError::BinaryNotFunctional {
                name: id.name.clone(),
                path: command.to_string(),
                reason: format!("output did not match pattern '{pattern}'"),
            }
            .into());
        }
    }

    debug!(package = %id, command, "Detect command succeeded");
    Ok(())
}
