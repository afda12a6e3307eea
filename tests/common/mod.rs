//! Common test utilities for stackpm integration tests
//!
//! [`ManifestBuilder`] assembles registry manifests fluently and
//! [`tar_gz`] builds small release archives in memory.

// Allow dead code because these utilities are used across different test files
// and not all utilities are used in every test file
#![allow(dead_code)]

use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::{Map, Value, json};
use stackpm::manifest::Manifest;
use stackpm::resolver::StaticRegistry;
use stackpm::utils::checksum::ChecksumAlgorithm;

/// Fluent builder for registry manifests.
///
/// ```rust,ignore
/// let manifest = ManifestBuilder::new("agent", "claude")
///     .version("1.2.0")
///     .bins(&["claude"])
///     .requires_runtime("node")
///     .npm("@anthropic-ai/claude-code")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    fields: Map<String, Value>,
    install: Map<String, Value>,
    platforms: Map<String, Value>,
    requires: Map<String, Value>,
}

impl ManifestBuilder {
    pub fn new(kind: &str, name: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("kind".to_string(), json!(kind));
        fields.insert("name".to_string(), json!(name));
        Self {
            fields,
            install: Map::new(),
            platforms: Map::new(),
            requires: Map::new(),
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.fields.insert("version".to_string(), json!(version));
        self
    }

    pub fn bins(mut self, bins: &[&str]) -> Self {
        self.fields.insert("bins".to_string(), json!(bins));
        self
    }

    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn install_field(mut self, key: &str, value: Value) -> Self {
        self.install.insert(key.to_string(), value);
        self
    }

    /// A download source whose sha256 matches `body`.
    pub fn download(self, url: &str, body: &[u8]) -> Self {
        self.install_field("source", json!("download"))
            .install_field("url", json!(url))
            .install_field(
                "checksum",
                json!({ "algo": "sha256", "value": ChecksumAlgorithm::Sha256.digest_hex(body) }),
            )
    }

    pub fn npm(self, package: &str) -> Self {
        self.install_field("source", json!("npm")).install_field("package", json!(package))
    }

    pub fn platform(mut self, key: &str, overrides: Value) -> Self {
        self.platforms.insert(key.to_string(), overrides);
        self
    }

    fn push_requirement(mut self, list: &str, id: &str) -> Self {
        let entry = self.requires.entry(list.to_string()).or_insert_with(|| json!([]));
        if let Value::Array(items) = entry {
            items.push(json!(id));
        }
        self
    }

    pub fn requires_runtime(self, id: &str) -> Self {
        self.push_requirement("runtimes", id)
    }

    pub fn requires_binary(self, id: &str) -> Self {
        self.push_requirement("binaries", id)
    }

    pub fn requires_agent(self, id: &str) -> Self {
        self.push_requirement("agents", id)
    }

    pub fn to_json(&self) -> Value {
        let mut fields = self.fields.clone();
        if !self.install.is_empty() || !self.platforms.is_empty() {
            let mut install = self.install.clone();
            if !self.platforms.is_empty() {
                install.insert("platforms".to_string(), Value::Object(self.platforms.clone()));
            }
            fields.insert("install".to_string(), Value::Object(install));
        }
        if !self.requires.is_empty() {
            fields.insert("requires".to_string(), Value::Object(self.requires.clone()));
        }
        Value::Object(fields)
    }

    pub fn build(&self) -> Manifest {
        serde_json::from_value(self.to_json()).expect("builder produced an invalid manifest")
    }
}

/// A registry holding `manifests`.
pub fn registry(manifests: impl IntoIterator<Item = Manifest>) -> StaticRegistry {
    let mut registry = StaticRegistry::new();
    for manifest in manifests {
        registry.insert_package(manifest);
    }
    registry
}

/// A gzip-compressed tarball with the given `(path, content, mode)` entries.
pub fn tar_gz(entries: &[(&str, &[u8], u32)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, content, mode) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(*mode);
        header.set_cksum();
        builder.append_data(&mut header, path, *content).expect("append tar entry");
    }
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip")
}
