//! The registry collaborator.
//!
//! stackpm does not talk to a registry itself. Embedders supply a
//! [`RegistryClient`] (typically an HTTP client with its own cache);
//! [`StaticRegistry`] serves manifests from memory.

use anyhow::Result;
use std::collections::HashMap;
use std::future::Future;

use crate::core::PackageId;
use crate::manifest::Manifest;

/// Source of package manifests.
pub trait RegistryClient: Send + Sync {
    /// Looks up the index entry for a package. `Ok(None)` means the registry
    /// has no such package.
    fn get_package(&self, id: &PackageId) -> impl Future<Output = Result<Option<Manifest>>> + Send;

    /// Fetches the canonical manifest an index entry points at through its
    /// `path` field.
    fn get_manifest(&self, entry: &Manifest) -> impl Future<Output = Result<Option<Manifest>>> + Send;
}

/// An in-memory registry.
///
/// ```rust
/// use stackpm::core::PackageKind;
/// use stackpm::manifest::Manifest;
/// use stackpm::resolver::StaticRegistry;
///
/// let mut registry = StaticRegistry::new();
/// registry.insert_package(Manifest::new(PackageKind::Runtime, "node"));
/// assert_eq!(registry.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    packages: HashMap<PackageId, Manifest>,
    manifests: HashMap<String, Manifest>,
}

impl StaticRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an index entry, keyed by its package id.
    pub fn insert_package(&mut self, manifest: Manifest) {
        self.packages.insert(manifest.package_id(), manifest);
    }

    /// Adds a canonical manifest served for `path`.
    pub fn insert_manifest(&mut self, path: impl Into<String>, manifest: Manifest) {
        self.manifests.insert(path.into(), manifest);
    }

    /// Builder-style [`StaticRegistry::insert_package`].
    #[must_use]
    pub fn with_package(mut self, manifest: Manifest) -> Self {
        self.insert_package(manifest);
        self
    }

    /// Number of index entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the registry has no index entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl RegistryClient for StaticRegistry {
    async fn get_package(&self, id: &PackageId) -> Result<Option<Manifest>> {
        Ok(self.packages.get(id).cloned())
    }

    async fn get_manifest(&self, entry: &Manifest) -> Result<Option<Manifest>> {
        Ok(entry.path.as_ref().and_then(|path| self.manifests.get(path)).cloned())
    }
}
