//! stackpm - package manager core for tools, runtimes, and agent stacks
//!
//! stackpm installs command-line tools, language runtimes, coding agents,
//! and protocol-server stacks from a registry of JSON manifests. One manifest
//! can describe several platforms; stackpm picks the right install
//! instructions for the running `os-arch`, installs dependencies first, and
//! exposes each package's executables through shims in one `bins/` directory.
//!
//! # Architecture Overview
//!
//! ```text
//! registry ──► resolver ──► platform ──► installer ──► store + shims
//!  (trait)    (tree,order)  (merge,     (download,    (manifest.json,
//!                            validate)   system, npm,   bins/, shims.json)
//!                                        pip)
//! ```
//!
//! - Packages are addressed as `kind:name` ([`core::PackageId`])
//! - Manifests come from a [`resolver::RegistryClient`] supplied by the embedder
//! - Install instructions are merged per platform ([`platform::resolve_install`])
//!   and checked before anything runs ([`platform::validate_resolved_install`])
//! - Every install writes a record under `<home>/<kind-dir>/<name>/manifest.json`
//! - Shims are owned by exactly one package ([`shims::ShimRegistry`])
//!
//! # Core Modules
//!
//! ## Data
//! - [`core`] - Package ids, kinds, and the error taxonomy
//! - [`manifest`] - Manifest structures and index/canonical merging
//! - [`version`] - Single-comparator version constraints
//!
//! ## Resolution
//! - [`platform`] - Platform key matching, install config merge and validation
//! - [`resolver`] - Registry lookups, dependency trees, install order
//!
//! ## Installation
//! - [`installer`] - Executes download, system, npm, and pip sources
//! - [`system`] - Adopts OS-provided binaries
//! - [`shims`] - Shim files and the ownership registry
//! - [`store`] - On-disk home layout, install records, and file locks
//!
//! ## Supporting Modules
//! - [`config`] - Global configuration (`<home>/config.toml`)
//! - [`constants`] - Timeouts, file names, and search paths
//! - [`utils`] - File system, archive, checksum, platform, and process helpers
//!
//! # Home Layout
//!
//! ```text
//! ~/.stackpm/
//! ├── config.toml
//! ├── shims.json
//! ├── .locks/
//! ├── bins/                 # shims; put this on PATH
//! ├── runtimes/node/manifest.json
//! ├── binaries/sqlite/manifest.json
//! ├── agents/claude/manifest.json
//! └── npm/cowsay/manifest.json
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use stackpm::config::GlobalConfig;
//! use stackpm::installer::{InstallOptions, Installer};
//! use stackpm::resolver::StaticRegistry;
//! use stackpm::store::HomeLayout;
//!
//! # async fn example(registry: StaticRegistry) -> anyhow::Result<()> {
//! let layout = HomeLayout::from_env()?;
//! let config = GlobalConfig::load(layout.root()).await?;
//! let installer = Installer::new(registry, layout, config)?;
//!
//! let report = installer.install("stack:github", &InstallOptions::default()).await?;
//! for failure in &report.failed {
//!     eprintln!("{}: {}", failure.id, failure.error);
//! }
//! # Ok(())
//! # }
//! ```

// Data
pub mod constants;
pub mod core;
pub mod manifest;
pub mod version;

// Resolution
pub mod platform;
pub mod resolver;

// Installation
pub mod installer;
pub mod shims;
pub mod store;
pub mod system;

// Supporting modules
pub mod config;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
