//! Platform-aware install resolution.
//!
//! A manifest's `install` block holds top-level defaults plus a `platforms`
//! table of partial overrides. [`resolve_install`] picks one override for a
//! platform key and merges it over the defaults:
//!
//! 1. an exact `os-arch` key (`darwin-arm64`),
//! 2. otherwise the OS-only key (`darwin`),
//! 3. otherwise nothing, leaving the defaults (`"default"`).
//!
//! Override fields always win. The result records the requested key and the
//! tier that matched so callers can explain what was chosen.
//!
//! ```rust
//! use stackpm::manifest::Manifest;
//! use stackpm::platform::resolve_install;
//!
//! let manifest: Manifest = serde_json::from_value(serde_json::json!({
//!     "kind": "binary",
//!     "name": "sqlite",
//!     "delivery": "system",
//!     "bins": ["sqlite3"],
//!     "install": {
//!         "source": "system",
//!         "platforms": { "darwin": { "detect": { "command": "sqlite3 --version" } } }
//!     }
//! })).unwrap();
//!
//! let resolved = resolve_install(&manifest, "darwin-x64");
//! assert_eq!(resolved.matched_key.as_str(), "darwin");
//! assert_eq!(resolved.source(), Some("system"));
//! ```

mod source;
mod validate;

pub use source::{ChecksumSpec, ExtractSpec, InstallSource};
pub use validate::{ValidationReport, validate_resolved_install};

use serde_json::{Map, Value};
use std::fmt;
use tracing::trace;

use crate::manifest::Manifest;
use crate::utils::platform::split_platform_key;

/// Which tier of the `platforms` table supplied the override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchedKey {
    /// The full `os-arch` key matched
    Exact(String),
    /// Only the OS key matched
    Os(String),
    /// No override applied
    Default,
}

impl MatchedKey {
    /// The matched platform key, or `"default"`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Exact(key) | Self::Os(key) => key,
            Self::Default => "default",
        }
    }

    /// Whether an override was applied.
    #[must_use]
    pub const fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }
}

impl fmt::Display for MatchedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install fields for one platform after merging.
///
/// Recomputed on every call; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInstall {
    /// Merged install fields (top-level defaults overlaid with the platform override)
    pub fields: Map<String, Value>,
    /// The platform key resolution was requested for
    pub platform_key: String,
    /// Which override tier applied
    pub matched_key: MatchedKey,
}

impl ResolvedInstall {
    /// A merged field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// A merged field as a string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// The effective install source.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.get_str("source")
    }

    /// The merged fields plus `_platformKey` and `_matchedKey` trace fields.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = self.fields.clone();
        map.insert("_platformKey".to_string(), Value::String(self.platform_key.clone()));
        map.insert("_matchedKey".to_string(), Value::String(self.matched_key.as_str().to_string()));
        Value::Object(map)
    }
}

/// Merges a manifest's install defaults with the override for `platform_key`.
#[must_use]
pub fn resolve_install(manifest: &Manifest, platform_key: &str) -> ResolvedInstall {
    let (os, _arch) = split_platform_key(platform_key);
    let install = manifest.install.as_ref();

    let mut fields = Map::new();
    let source = install.and_then(|i| i.source()).or(manifest.delivery.as_deref());
    if let Some(source) = source {
        fields.insert("source".to_string(), Value::String(source.to_string()));
    }
    if let Some(delivery) = &manifest.delivery {
        fields.insert("delivery".to_string(), Value::String(delivery.clone()));
    }
    if let Some(install) = install {
        for (key, value) in &install.fields {
            fields.insert(key.clone(), value.clone());
        }
    }

    let platforms = install.map(|i| &i.platforms);
    let (matched_key, platform_config) =
        match platforms.and_then(|p| p.get(platform_key).map(|c| (platform_key, c))) {
            Some((key, config)) => (MatchedKey::Exact(key.to_string()), Some(config)),
            None => match platforms.and_then(|p| p.get(os)) {
                Some(config) => (MatchedKey::Os(os.to_string()), Some(config)),
                None => (MatchedKey::Default, None),
            },
        };

    if let Some(config) = platform_config {
        for (key, value) in config {
            fields.insert(key.clone(), value.clone());
        }
    }

    trace!(
        package = %manifest.name,
        platform = platform_key,
        matched = %matched_key,
        "Resolved install config"
    );

    ResolvedInstall {
        fields,
        platform_key: platform_key.to_string(),
        matched_key,
    }
}

/// The `os-arch` key of the running binary, e.g. `darwin-arm64` or `win32-x64`.
#[must_use]
pub fn current_platform_key() -> String {
    crate::utils::platform::platform_arch()
}

/// Platform keys the manifest declares overrides for.
#[must_use]
pub fn get_supported_platforms(manifest: &Manifest) -> Vec<String> {
    manifest.install.as_ref().map(|i| i.platforms.keys().cloned().collect()).unwrap_or_default()
}

/// Whether the manifest can be installed on `platform_key`.
///
/// A manifest without a `platforms` table works everywhere through its
/// defaults; otherwise some tier must match.
#[must_use]
pub fn is_platform_supported(manifest: &Manifest, platform_key: &str) -> bool {
    if get_supported_platforms(manifest).is_empty() {
        return true;
    }
    !resolve_install(manifest, platform_key).matched_key.is_default()
}
