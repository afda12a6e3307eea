//! Per-source validation of resolved install configs.

use serde::Serialize;
use serde_json::Value;

use super::ResolvedInstall;
use crate::manifest::Manifest;
use crate::utils::archive::ArchiveFormat;
use crate::utils::checksum::ChecksumAlgorithm;

/// Outcome of [`validate_resolved_install`].
///
/// Errors block installation; warnings are only reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// `true` when `errors` is empty
    pub valid: bool,
    /// Problems that block installation
    pub errors: Vec<String>,
    /// Advisory findings
    pub warnings: Vec<String>,
}

fn non_empty_str<'a>(value: Option<&'a Value>) -> Option<&'a str> {
    value.and_then(Value::as_str).filter(|s| !s.trim().is_empty())
}

/// Checks a resolved install config against the rules for its source.
///
/// Never fails; problems are collected into the report. A config without a
/// source gets no source-specific checks, which is how content-only stack
/// and prompt packages pass.
#[must_use]
pub fn validate_resolved_install(resolved: &ResolvedInstall, manifest: &Manifest) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let is_latest = manifest.version.as_deref() == Some("latest");

    match resolved.source() {
        Some("download") => {
            let url = non_empty_str(resolved.get("url"));
            if url.is_none() {
                errors.push("download source requires a url".to_string());
            }

            let format = match non_empty_str(resolved.get("extract").and_then(|e| e.get("format"))) {
                Some(name) => {
                    let parsed = ArchiveFormat::parse(name);
                    if parsed.is_none() {
                        errors.push(format!("unsupported extract.format '{name}'"));
                    }
                    parsed
                }
                None => url.map(ArchiveFormat::from_url),
            };
            let bin_count = manifest.bins().len();
            if format == Some(ArchiveFormat::Raw) && bin_count > 1 {
                errors.push(format!(
                    "a download that is not an archive provides one file, but bins declares {bin_count}; \
                     declare one bin or set extract.format"
                ));
            }

            let checksum = resolved.get("checksum");
            let algo = non_empty_str(checksum.and_then(|c| c.get("algo")));
            let value = non_empty_str(checksum.and_then(|c| c.get("value")));
            match (algo, value) {
                (Some(algo), Some(_)) => {
                    if algo.parse::<ChecksumAlgorithm>().is_err() {
                        errors.push(format!("unsupported checksum algorithm '{algo}'"));
                    }
                }
                _ => errors
                    .push("download source requires checksum.algo and checksum.value".to_string()),
            }

            if is_latest {
                warnings.push(
                    "version is \"latest\"; the checksum pins one artifact and may go stale"
                        .to_string(),
                );
            }
        }
        Some("system") => {
            let resolved_command = non_empty_str(resolved.get("detect").and_then(|d| d.get("command")));
            if resolved_command.is_none() && manifest.detect_command().is_none() {
                errors.push("system source requires detect.command".to_string());
            }
        }
        Some(source @ ("npm" | "pip")) => {
            let package = non_empty_str(resolved.get("package"))
                .or_else(|| manifest.install.as_ref().and_then(|i| i.package()));
            if package.is_none() {
                errors.push(format!("{source} source requires a package name"));
            }
            if is_latest {
                warnings.push(format!(
                    "version is \"latest\"; {source} installs are not reproducible"
                ));
            }
        }
        Some(other) => errors.push(format!("unknown install source '{other}'")),
        None => {}
    }

    if manifest.kind.requires_bins() && manifest.bins().is_empty() {
        errors.push(format!(
            "{} packages must declare at least one entry in bins",
            manifest.kind
        ));
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}
