//! npm sources: `npm install --prefix <dir> <package>@<version>`.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::bins::{list_bin_dir, locate_bins};
use crate::utils::fs::ensure_dir;
use crate::utils::process::ProcessCommand;

/// How to run npm.
#[derive(Debug, Clone)]
pub struct NpmInstall<'a> {
    /// npm executable
    pub npm_command: &'a str,
    /// Upper bound for the install
    pub timeout: Duration,
    /// Label for log lines
    pub context: String,
}

/// `<package>@<version>`, leaving specs that already carry a version alone.
#[must_use]
pub fn npm_install_spec(package: &str, version: &str) -> String {
    let has_version = package.get(1..).is_some_and(|rest| rest.contains('@'));
    if has_version || version.is_empty() {
        package.to_string()
    } else {
        format!("{package}@{version}")
    }
}

impl NpmInstall<'_> {
    /// Installs into `prefix` and returns the bins npm linked.
    ///
    /// With declared bins, each must be linked under `node_modules/.bin`.
    /// Without, everything npm linked is returned.
    pub async fn run(
        &self,
        package: &str,
        version: &str,
        prefix: &Path,
        declared: &[String],
    ) -> Result<Vec<(String, PathBuf)>> {
        ensure_dir(prefix)?;
        let spec = npm_install_spec(package, version);
        info!(package = %self.context, spec, prefix = %prefix.display(), "Running npm install");

        ProcessCommand::new(self.npm_command)
            .arg("install")
            .arg("--prefix")
            .arg(prefix.as_os_str())
            .args(["--no-audit", "--no-fund"])
            .arg(&spec)
            .current_dir(prefix)
            .env("npm_config_update_notifier", "false")
            .timeout(self.timeout)
            .with_context(self.context.clone())
            .execute()
            .await?;

        let bin_dir = prefix.join("node_modules").join(".bin");
        if declared.is_empty() {
            let bins = list_bin_dir(&bin_dir)?;
            if bins.is_empty() {
                warn!(package = %self.context, "npm package linked no executables");
            }
            Ok(bins)
        } else {
            locate_bins(&bin_dir, declared)
        }
    }
}
