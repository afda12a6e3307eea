//! A throwaway stackpm home.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::GlobalConfig;
use crate::installer::Installer;
use crate::resolver::RegistryClient;
use crate::shims::ShimRegistry;
use crate::store::HomeLayout;
use crate::system::SystemRegistrar;

/// Temporary directory holding a stackpm home, a fake system bin directory,
/// and a directory for download artifacts.
pub struct TestHome {
    /// Keeps everything alive
    pub temp_dir: TempDir,
    /// The stackpm home
    pub layout: HomeLayout,
    /// Stands in for `/usr/bin`; the only system search path
    pub system_bin_dir: PathBuf,
    /// Where [`TestHome::artifact`] writes files
    pub artifacts_dir: PathBuf,
    /// Configuration handed to installers
    pub config: GlobalConfig,
}

impl TestHome {
    /// Creates the directories and a config searching only [`TestHome::system_bin_dir`].
    pub fn new() -> Result<Self> {
        super::init_test_logging(None);

        let temp_dir = TempDir::new()?;
        let layout = HomeLayout::new(temp_dir.path().join("home"));
        let system_bin_dir = temp_dir.path().join("usr-bin");
        let artifacts_dir = temp_dir.path().join("artifacts");
        fs::create_dir_all(&system_bin_dir)?;
        fs::create_dir_all(&artifacts_dir)?;

        let config = GlobalConfig {
            system_search_paths: vec![system_bin_dir.display().to_string()],
            ..GlobalConfig::default()
        };

        Ok(Self {
            temp_dir,
            layout,
            system_bin_dir,
            artifacts_dir,
            config,
        })
    }

    /// Writes an executable shell script into the fake system bin directory
    /// that prints `version_output` for any arguments.
    pub fn fake_system_binary(&self, name: &str, version_output: &str) -> Result<PathBuf> {
        self.script_in(&self.system_bin_dir, name, &format!("echo '{version_output}'"))
    }

    /// Writes an executable shell script with `body` into `dir`.
    pub fn script_in(&self, dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n"))
            .with_context(|| format!("Failed to write script {}", path.display()))?;
        crate::utils::fs::set_executable(&path)?;
        Ok(path)
    }

    /// Writes a download artifact and returns its `file://` URL.
    pub fn artifact(&self, name: &str, content: &[u8]) -> Result<String> {
        let path = self.artifacts_dir.join(name);
        fs::write(&path, content).with_context(|| format!("Failed to write artifact {}", path.display()))?;
        Ok(format!("file://{}", path.display()))
    }

    /// A shim registry over this home using the home's config.
    #[must_use]
    pub fn shims(&self) -> ShimRegistry {
        ShimRegistry::from_config(self.layout.clone(), &self.config)
    }

    /// A system registrar probing only [`TestHome::system_bin_dir`].
    #[must_use]
    pub fn registrar(&self) -> SystemRegistrar {
        SystemRegistrar::new(self.layout.clone(), self.shims(), vec![self.system_bin_dir.clone()])
    }

    /// An installer over this home.
    pub fn installer<R: RegistryClient>(&self, registry: R) -> Result<Installer<R>> {
        Installer::new(registry, self.layout.clone(), self.config.clone())
    }
}
