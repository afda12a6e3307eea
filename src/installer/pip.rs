//! pip sources: a private virtualenv per package.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use super::bins::locate_bins;
use crate::utils::fs::ensure_dir;
use crate::utils::process::ProcessCommand;

/// The venv's executable directory.
#[must_use]
pub fn venv_bin_dir(venv: &Path) -> PathBuf {
    if crate::utils::is_windows() {
        venv.join("Scripts")
    } else {
        venv.join("bin")
    }
}

/// `<package>==<version>`, or the bare package for `latest`.
#[must_use]
pub fn pip_requirement(package: &str, version: &str) -> String {
    if version.is_empty() || version == "latest" || package.contains(['=', '<', '>', '~']) {
        package.to_string()
    } else {
        format!("{package}=={version}")
    }
}

/// How to run pip.
#[derive(Debug, Clone)]
pub struct PipInstall<'a> {
    /// Interpreter used to create the venv
    pub python_command: &'a str,
    /// Upper bound for each step
    pub timeout: Duration,
    /// Label for log lines
    pub context: String,
}

impl PipInstall<'_> {
    /// Creates `<dir>/venv`, installs the package, and locates `declared`
    /// under the venv's bin directory.
    pub async fn run(
        &self,
        package: &str,
        version: &str,
        dir: &Path,
        declared: &[String],
    ) -> Result<Vec<(String, PathBuf)>> {
        ensure_dir(dir)?;
        let venv = dir.join("venv");
        let requirement = pip_requirement(package, version);
        info!(package = %self.context, requirement, venv = %venv.display(), "Running pip install");

        ProcessCommand::new(self.python_command)
            .args(["-m", "venv"])
            .arg(venv.as_os_str())
            .timeout(self.timeout)
            .with_context(self.context.clone())
            .execute()
            .await?;

        let bin_dir = venv_bin_dir(&venv);
        let python = if crate::utils::is_windows() {
            bin_dir.join("python.exe")
        } else {
            bin_dir.join("python")
        };

        ProcessCommand::new(python.as_os_str())
            .args(["-m", "pip", "install", "--disable-pip-version-check"])
            .arg(&requirement)
            .timeout(self.timeout)
            .with_context(self.context.clone())
            .execute()
            .await?;

        locate_bins(&bin_dir, declared)
    }
}
