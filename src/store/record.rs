//! Installed package records.
//!
//! A package counts as installed once `manifest.json` exists in its
//! directory. The record is written only after the artifact is in place, so
//! a failed install leaves no record behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::PackageId;

/// How an installed package was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallType {
    /// Downloaded and checksum-verified artifact
    Download,
    /// Adopted from the OS
    System,
    /// npm prefix install
    Npm,
    /// pip virtualenv install
    Pip,
    /// No artifact; only the manifest is recorded (stacks, prompts)
    Content,
}

impl fmt::Display for InstallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Download => "download",
            Self::System => "system",
            Self::Npm => "npm",
            Self::Pip => "pip",
            Self::Content => "content",
        };
        f.write_str(name)
    }
}

/// Contents of `<home>/<kind-dir>/<name>/manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledPackage {
    /// Package id
    pub id: PackageId,

    /// Install mechanism
    pub install_type: InstallType,

    /// When the record was written
    pub installed_at: DateTime<Utc>,

    /// Binary names shimmed for this package
    #[serde(default)]
    pub bins: Vec<String>,

    /// Download URL or npm/pip package the artifact came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Installed version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Absolute path of an adopted system binary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Platform key the install config was resolved for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_key: Option<String>,
}

impl InstalledPackage {
    /// A fresh record stamped with the current time.
    #[must_use]
    pub fn new(id: PackageId, install_type: InstallType) -> Self {
        Self {
            id,
            install_type,
            installed_at: Utc::now(),
            bins: Vec::new(),
            source: None,
            version: None,
            path: None,
            platform_key: None,
        }
    }

    /// Sets the shimmed binaries.
    #[must_use]
    pub fn with_bins(mut self, bins: Vec<String>) -> Self {
        self.bins = bins;
        self
    }

    /// Sets the artifact source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the version.
    #[must_use]
    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    /// Sets the platform key.
    #[must_use]
    pub fn with_platform_key(mut self, key: impl Into<String>) -> Self {
        self.platform_key = Some(key.into());
        self
    }
}
