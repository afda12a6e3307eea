//! Typed install sources.
//!
//! [`ResolvedInstall`] stays an untyped map until validation passes, then
//! [`ResolvedInstall::materialize`] turns it into an [`InstallSource`] the
//! installer can match on.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ResolvedInstall, ValidationReport, validate_resolved_install};
use crate::core::StackpmError;
use crate::manifest::{DetectSpec, Manifest};
use crate::utils::checksum::ChecksumAlgorithm;

/// The `checksum` block of a download source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumSpec {
    /// Digest algorithm name (`sha256`, `sha512`)
    pub algo: String,
    /// Expected hex digest
    pub value: String,
}

impl ChecksumSpec {
    /// Parsed algorithm.
    pub fn algorithm(&self) -> Result<ChecksumAlgorithm, StackpmError> {
        self.algo.parse()
    }
}

/// The `extract` block of a download source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractSpec {
    /// Archive format; inferred from the URL when absent
    #[serde(default)]
    pub format: Option<String>,
    /// Leading path components to drop
    #[serde(default)]
    pub strip: usize,
}

/// How a package is obtained once its platform config is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallSource {
    /// Fetch a URL and verify its digest
    Download {
        /// Artifact URL
        url: String,
        /// Expected digest
        checksum: ChecksumSpec,
        /// Extraction settings; `None` infers the format from the URL
        extract: Option<ExtractSpec>,
    },
    /// Adopt a binary the OS already provides
    System {
        /// How to prove the binary is present
        detect: DetectSpec,
        /// Whether the OS ships it by default
        preinstalled: bool,
    },
    /// `npm install` into a private prefix
    Npm {
        /// npm package name
        package: String,
    },
    /// `pip install` into a private virtualenv
    Pip {
        /// PyPI package name
        package: String,
    },
}

impl InstallSource {
    /// The source name as written in manifests.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Download { .. } => "download",
            Self::System { .. } => "system",
            Self::Npm { .. } => "npm",
            Self::Pip { .. } => "pip",
        }
    }
}

#[derive(Deserialize)]
struct DownloadFields {
    url: String,
    checksum: ChecksumSpec,
    #[serde(default)]
    extract: Option<ExtractSpec>,
}

fn field<T: serde::de::DeserializeOwned>(
    id: &str,
    value: Option<&Value>,
    name: &str,
) -> Result<Option<T>, StackpmError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v.clone()).map(Some).map_err(|e| {
            StackpmError::ValidationFailed {
                id: id.to_string(),
                errors: vec![format!("invalid {name}: {e}")],
            }
        }),
    }
}

impl ResolvedInstall {
    /// Validates and converts the config into a typed [`InstallSource`].
    ///
    /// Returns `Ok(None)` for configs with no source (content-only packages).
    ///
    /// # Errors
    ///
    /// [`StackpmError::ValidationFailed`] with every validation error when the
    /// config is invalid.
    pub fn materialize(&self, manifest: &Manifest) -> Result<Option<InstallSource>, StackpmError> {
        let report = validate_resolved_install(self, manifest);
        self.materialize_validated(manifest, &report)
    }

    /// Like [`ResolvedInstall::materialize`], reusing a report the caller
    /// already produced with [`validate_resolved_install`].
    ///
    /// # Errors
    ///
    /// [`StackpmError::ValidationFailed`] when `report` has errors or a
    /// field has the wrong shape.
    pub fn materialize_validated(
        &self,
        manifest: &Manifest,
        report: &ValidationReport,
    ) -> Result<Option<InstallSource>, StackpmError> {
        let id = manifest.package_id().to_string();
        if !report.valid {
            return Err(StackpmError::ValidationFailed {
                id,
                errors: report.errors.clone(),
            });
        }

        let source = match self.source() {
            None => return Ok(None),
            Some("download") => {
                let fields: DownloadFields = serde_json::from_value(Value::Object(self.fields.clone()))
                    .map_err(|e| StackpmError::ValidationFailed {
                        id: id.clone(),
                        errors: vec![format!("invalid download config: {e}")],
                    })?;
                InstallSource::Download {
                    url: fields.url,
                    checksum: fields.checksum,
                    extract: fields.extract,
                }
            }
            Some("system") => {
                let mut detect: DetectSpec =
                    field(&id, self.get("detect"), "detect")?.unwrap_or_default();
                if detect.command().is_none() {
                    detect.command = manifest.detect_command().map(str::to_string);
                }
                if detect.pattern.is_none() {
                    detect.pattern = manifest.detect.as_ref().and_then(|d| d.pattern.clone());
                }
                InstallSource::System {
                    detect,
                    preinstalled: field(&id, self.get("preinstalled"), "preinstalled")?
                        .unwrap_or(false),
                }
            }
            Some(kind @ ("npm" | "pip")) => {
                let package = self
                    .get_str("package")
                    .filter(|p| !p.trim().is_empty())
                    .or_else(|| manifest.install.as_ref().and_then(|i| i.package()))
                    .unwrap_or_default()
                    .to_string();
                if kind == "npm" {
                    InstallSource::Npm { package }
                } else {
                    InstallSource::Pip { package }
                }
            }
            Some(other) => {
                return Err(StackpmError::ValidationFailed {
                    id,
                    errors: vec![format!("unknown install source '{other}'")],
                });
            }
        };

        Ok(Some(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::resolve_install;
    use serde_json::json;

    #[test]
    fn test_materialize_download() {
        let manifest: Manifest = serde_json::from_value(json!({
            "kind": "binary", "name": "rg", "bins": ["rg"],
            "install": {
                "source": "download",
                "url": "https://x/rg.tar.gz",
                "checksum": { "algo": "sha256", "value": "abc" },
                "extract": { "strip": 1 }
            }
        }))
        .unwrap();

        let source = resolve_install(&manifest, "linux-x64").materialize(&manifest).unwrap();
        match source {
            Some(InstallSource::Download { url, checksum, extract }) => {
                assert_eq!(url, "https://x/rg.tar.gz");
                assert_eq!(checksum.algorithm().unwrap(), ChecksumAlgorithm::Sha256);
                assert_eq!(extract.unwrap().strip, 1);
            }
            other => panic!("unexpected source: {other:?}"),
        }
    }

    #[test]
    fn test_materialize_system_falls_back_to_manifest_detect() {
        let manifest: Manifest = serde_json::from_value(json!({
            "kind": "binary", "name": "git", "bins": ["git"],
            "detect": { "command": "git --version", "pattern": "git version" },
            "install": { "source": "system", "preinstalled": true }
        }))
        .unwrap();

        let source = resolve_install(&manifest, "darwin-arm64").materialize(&manifest).unwrap();
        assert_eq!(
            source,
            Some(InstallSource::System {
                detect: DetectSpec {
                    command: Some("git --version".to_string()),
                    pattern: Some("git version".to_string()),
                },
                preinstalled: true,
            })
        );
    }

    #[test]
    fn test_materialize_npm_uses_manifest_package() {
        let manifest: Manifest = serde_json::from_value(json!({
            "kind": "agent", "name": "claude", "bins": ["claude"], "delivery": "npm",
            "install": { "package": "@anthropic-ai/claude-code" }
        }))
        .unwrap();

        let source = resolve_install(&manifest, "linux-x64").materialize(&manifest).unwrap();
        assert_eq!(
            source,
            Some(InstallSource::Npm {
                package: "@anthropic-ai/claude-code".to_string()
            })
        );
    }

    #[test]
    fn test_materialize_invalid_collects_errors() {
        let manifest: Manifest = serde_json::from_value(json!({
            "kind": "binary", "name": "rg",
            "install": { "source": "download" }
        }))
        .unwrap();

        let err = resolve_install(&manifest, "linux-x64").materialize(&manifest).unwrap_err();
        match err {
            StackpmError::ValidationFailed { errors, .. } => assert_eq!(errors.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_materialize_content_only() {
        let manifest: Manifest =
            serde_json::from_value(json!({ "kind": "prompt", "name": "review" })).unwrap();
        assert_eq!(resolve_install(&manifest, "linux-x64").materialize(&manifest).unwrap(), None);
    }
}
