//! Package manifests
//!
//! A manifest describes how to obtain and run one package. Manifests arrive
//! from the registry collaborator as JSON:
//!
//! ```json
//! {
//!   "id": "binary:sqlite",
//!   "kind": "binary",
//!   "name": "sqlite",
//!   "version": "3.45.0",
//!   "delivery": "system",
//!   "bins": ["sqlite3"],
//!   "install": {
//!     "source": "system",
//!     "platforms": {
//!       "darwin": { "preinstalled": true, "detect": { "command": "sqlite3 --version" } },
//!       "win32-x64": {
//!         "source": "download",
//!         "delivery": "remote",
//!         "url": "https://example.com/sqlite.zip",
//!         "checksum": { "algo": "sha256", "value": "..." }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! The `install` block is kept as an untyped field map with a separate
//! `platforms` table. Platform overrides are merged by
//! [`crate::platform::resolve_install`] and only then materialized into the
//! typed [`crate::platform::InstallSource`] union.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::core::{PackageId, PackageKind, create_package_id};

/// A package manifest as published by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Canonical `kind:name` id; derived from `kind` and `name` when absent
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Package kind
    pub kind: PackageKind,

    /// Package name
    pub name: String,

    /// Published version, or `"latest"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Human-readable summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Delivery hint (`system`, `remote`, `npm`, ...); the default install source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<String>,

    /// Executables the package provides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bins: Option<Vec<String>>,

    /// Install instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<InstallSpec>,

    /// Detection for preinstalled system binaries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detect: Option<DetectSpec>,

    /// Packages that must be installed first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<Requires>,

    /// Shorthand for a single required runtime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,

    /// Pointer from a lightweight index entry to the canonical manifest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Install mechanism recorded for synthetic manifests (`npm`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_type: Option<String>,

    /// Install directory relative to the stackpm home, for synthetic manifests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<String>,

    /// Fields stackpm does not interpret, preserved as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `install` block of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstallSpec {
    /// Per-platform partial overrides keyed by `os-arch` or `os`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub platforms: BTreeMap<String, Map<String, Value>>,

    /// Top-level install fields (`source`, `url`, `package`, ...)
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl InstallSpec {
    /// The top-level `source` field.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.fields.get("source").and_then(Value::as_str)
    }

    /// The top-level `package` field (npm/pip).
    #[must_use]
    pub fn package(&self) -> Option<&str> {
        self.fields.get("package").and_then(Value::as_str).filter(|p| !p.is_empty())
    }
}

/// How to find a preinstalled binary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectSpec {
    /// Command whose success proves the binary is present, e.g. `sqlite3 --version`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Optional regex the command output must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl DetectSpec {
    /// The command, if set and non-empty.
    #[must_use]
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// Dependency lists of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requires {
    /// Runtime dependencies (`node`, `runtime:python`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runtimes: Vec<String>,

    /// Binary dependencies
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub binaries: Vec<String>,

    /// Legacy alias for `binaries`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,

    /// Agent dependencies
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<String>,
}

impl Manifest {
    /// Creates a minimal manifest.
    pub fn new(kind: PackageKind, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: create_package_id(kind, &name),
            kind,
            name,
            version: None,
            description: None,
            delivery: None,
            bins: None,
            install: None,
            detect: None,
            requires: None,
            runtime: None,
            path: None,
            install_type: None,
            install_dir: None,
            extra: Map::new(),
        }
    }

    /// The package id, derived from kind and name when `id` is empty.
    #[must_use]
    pub fn package_id(&self) -> PackageId {
        self.id.parse().unwrap_or_else(|_| PackageId::new(self.kind, self.name.clone()))
    }

    /// Declared binaries, empty when none.
    #[must_use]
    pub fn bins(&self) -> &[String] {
        self.bins.as_deref().unwrap_or_default()
    }

    /// The version, or `"latest"` when unset.
    #[must_use]
    pub fn version_or_latest(&self) -> &str {
        self.version.as_deref().unwrap_or("latest")
    }

    /// The top-level `detect.command`, if any.
    #[must_use]
    pub fn detect_command(&self) -> Option<&str> {
        self.detect.as_ref().and_then(DetectSpec::command)
    }
}

/// Overlays a canonical manifest onto a lightweight index entry.
///
/// Every field present (non-null) in `canonical` wins; fields only the index
/// carries are kept. Nested objects are replaced wholesale, not deep-merged,
/// so an index `install` block never leaks into the canonical one.
pub fn merge_manifests(index: &Manifest, canonical: &Manifest) -> Result<Manifest> {
    let mut base = serde_json::to_value(index).context("Failed to serialize index manifest")?;
    let overlay =
        serde_json::to_value(canonical).context("Failed to serialize canonical manifest")?;

    if let (Some(base_map), Value::Object(overlay_map)) = (base.as_object_mut(), overlay) {
        for (key, value) in overlay_map {
            if !value.is_null() {
                base_map.insert(key, value);
            }
        }
    }

    serde_json::from_value(base).context("Failed to rebuild merged manifest")
}
