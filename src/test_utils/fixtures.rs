//! Manifest fixtures shared by unit and integration tests.

use serde_json::{Value, json};
use std::path::Path;

use crate::manifest::Manifest;
use crate::utils::checksum::ChecksumAlgorithm;

/// Ready-made manifests.
pub struct ManifestFixture;

impl ManifestFixture {
    /// Parses a JSON manifest, panicking on invalid fixtures.
    #[must_use]
    pub fn from_json(value: Value) -> Manifest {
        serde_json::from_value(value).unwrap_or_else(|e| panic!("invalid manifest fixture: {e}"))
    }

    /// A package with no install source.
    #[must_use]
    pub fn content(kind: &str, name: &str) -> Manifest {
        Self::from_json(json!({ "kind": kind, "name": name, "version": "1.0.0" }))
    }

    /// The sqlite manifest: preinstalled on macOS, downloaded on Windows,
    /// detected from the system everywhere else.
    #[must_use]
    pub fn sqlite() -> Manifest {
        Self::from_json(json!({
            "id": "binary:sqlite",
            "kind": "binary",
            "name": "sqlite",
            "version": "3.45.0",
            "delivery": "system",
            "bins": ["sqlite3"],
            "detect": { "command": "sqlite3 --version" },
            "install": {
                "source": "system",
                "platforms": {
                    "darwin": { "preinstalled": true },
                    "linux": { "detect": { "command": "sqlite3 --version" } },
                    "win32-x64": {
                        "source": "download",
                        "delivery": "remote",
                        "url": "https://www.sqlite.org/2024/sqlite-tools-win-x64-3450000.zip",
                        "checksum": { "algo": "sha256", "value": "0".repeat(64) },
                        "extract": { "format": "zip" }
                    }
                }
            }
        }))
    }

    /// A raw download whose checksum matches `body`.
    #[must_use]
    pub fn download(kind: &str, name: &str, url: &str, body: &[u8], bins: &[&str]) -> Manifest {
        Self::from_json(json!({
            "kind": kind,
            "name": name,
            "version": "1.0.0",
            "bins": bins,
            "install": {
                "source": "download",
                "url": url,
                "checksum": { "algo": "sha256", "value": ChecksumAlgorithm::Sha256.digest_hex(body) }
            }
        }))
    }

    /// A system package whose detect command runs `binary --version`.
    ///
    /// The bin name is the file name of `binary`.
    #[must_use]
    pub fn system(name: &str, binary: &Path) -> Manifest {
        let bin = binary.file_name().and_then(|n| n.to_str()).unwrap_or(name);
        Self::from_json(json!({
            "kind": "binary",
            "name": name,
            "bins": [bin],
            "install": {
                "source": "system",
                "detect": { "command": format!("{} --version", binary.display()) }
            }
        }))
    }
}
