//! Dependency resolution.
//!
//! Turns package ids into [`ResolvedPackage`] trees and install orders.
//!
//! # Resolution
//!
//! - `npm:<spec>` ids never touch the registry. A synthetic binary manifest
//!   is built from the npm spec and installed under `<home>/npm/<name>`.
//! - Every other id is looked up through the [`RegistryClient`]. When the
//!   index entry carries a `path`, the canonical manifest is fetched and
//!   merged over the index entry (canonical wins).
//!
//! # Dependencies
//!
//! Requirements come from `requires.runtimes` (or the single `runtime`
//! field), `requires.binaries` plus the legacy `requires.tools`, and
//! `requires.agents`. Bare names take the kind of the list they appear in:
//! `node` in `runtimes` becomes `runtime:node`.
//!
//! ```text
//! agent:claude ── runtime:node
//! stack:github ─┬ runtime:node
//!               └ binary:gh
//! ```
//!
//! [`DependencyResolver::get_install_order`] walks a tree depth-first and
//! yields every not-yet-installed package after its dependencies.

pub mod dependency_graph;
pub mod registry;

pub use dependency_graph::DependencyGraph;
pub use registry::{RegistryClient, StaticRegistry};

use anyhow::{Context, Result};
use futures::future::join_all;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

use crate::core::{NpmSpec, PackageId, PackageKind, StackpmError, parse_package_id};
use crate::manifest::{Manifest, merge_manifests};
use crate::store::HomeLayout;

/// A package with its manifest and resolved requirements.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedPackage {
    /// Package id as requested
    pub id: PackageId,
    /// Manifest kind (`binary` for npm packages)
    pub kind: PackageKind,
    /// Package name
    pub name: String,
    /// Version, `"latest"` when unpinned
    pub version: String,
    /// Whether a record existed when the package was resolved
    pub installed: bool,
    /// The effective manifest
    #[serde(skip)]
    pub manifest: Manifest,
    /// Resolved requirements
    pub dependencies: Vec<ResolvedPackage>,
}

/// Outcome of [`DependencyResolver::check_dependencies`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyCheck {
    /// `true` when nothing is missing
    pub satisfied: bool,
    /// Every dependency node that is not installed, in tree order
    pub missing: Vec<PackageId>,
}

/// Normalizes a requirement entry, defaulting bare names to `kind`.
fn normalize_requirement(entry: &str, kind: PackageKind) -> Result<PackageId, StackpmError> {
    if entry.contains(':') {
        parse_package_id(entry)
    } else {
        parse_package_id(&format!("{kind}:{entry}"))
    }
}

/// The ids a manifest requires, in declaration order without duplicates.
pub fn dependency_ids(manifest: &Manifest) -> Result<Vec<PackageId>, StackpmError> {
    let requires = manifest.requires.clone().unwrap_or_default();

    let mut runtimes = requires.runtimes;
    if runtimes.is_empty() {
        runtimes.extend(manifest.runtime.iter().cloned());
    }

    let lists = [
        (runtimes, PackageKind::Runtime),
        (requires.binaries, PackageKind::Binary),
        (requires.tools, PackageKind::Binary),
        (requires.agents, PackageKind::Agent),
    ];

    let mut ids: Vec<PackageId> = Vec::new();
    for (entries, kind) in lists {
        for entry in entries.iter().map(|e| e.trim()).filter(|e| !e.is_empty()) {
            let id = normalize_requirement(entry, kind)?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    Ok(ids)
}

/// Resolves packages against a registry and the local home.
pub struct DependencyResolver<R> {
    registry: R,
    layout: HomeLayout,
}

impl<R: RegistryClient> DependencyResolver<R> {
    /// Creates a resolver.
    pub fn new(registry: R, layout: HomeLayout) -> Self {
        Self { registry, layout }
    }

    /// The registry collaborator.
    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// The home the resolver checks for installed packages.
    pub fn layout(&self) -> &HomeLayout {
        &self.layout
    }

    /// Resolves one package without its dependencies.
    async fn resolve_node(&self, id: &PackageId) -> Result<ResolvedPackage> {
        let manifest = if id.kind == PackageKind::Npm {
            npm_manifest(id)
        } else {
            self.fetch_manifest(id).await?
        };

        Ok(ResolvedPackage {
            id: id.clone(),
            kind: manifest.kind,
            name: manifest.name.clone(),
            version: manifest.version_or_latest().to_string(),
            installed: self.layout.is_package_installed(id),
            manifest,
            dependencies: Vec::new(),
        })
    }

    async fn fetch_manifest(&self, id: &PackageId) -> Result<Manifest> {
        let entry = self
            .registry
            .get_package(id)
            .await
            .map_err(|e| StackpmError::RegistryError {
                id: id.to_string(),
                reason: format!("{e:#}"),
            })?
            .ok_or_else(|| StackpmError::PackageNotFound { id: id.to_string() })?;

        let mut manifest = if entry.path.is_some() {
            match self.registry.get_manifest(&entry).await.map_err(|e| {
                StackpmError::RegistryError {
                    id: id.to_string(),
                    reason: format!("{e:#}"),
                }
            })? {
                Some(canonical) => merge_manifests(&entry, &canonical)
                    .with_context(|| format!("Failed to merge manifests for {id}"))?,
                None => {
                    warn!(package = %id, path = ?entry.path, "Canonical manifest missing, using index entry");
                    entry
                }
            }
        } else {
            entry
        };

        if manifest.id.is_empty() {
            manifest.id = id.to_string();
        }
        Ok(manifest)
    }

    /// Resolves a package and its direct requirements.
    ///
    /// # Errors
    ///
    /// [`StackpmError::InvalidPackageId`] for malformed ids,
    /// [`StackpmError::PackageNotFound`] when the package or one of its
    /// requirements is unknown, [`StackpmError::RegistryError`] when the
    /// registry fails.
    pub async fn resolve_package(&self, id: &str) -> Result<ResolvedPackage> {
        let id = parse_package_id(id)?;
        debug!(package = %id, "Resolving package");

        let mut package = self.resolve_node(&id).await?;
        package.dependencies = self.resolve_dependencies(&package).await?;
        Ok(package)
    }

    /// Resolves the direct requirements of a package, one level deep.
    pub async fn resolve_dependencies(&self, package: &ResolvedPackage) -> Result<Vec<ResolvedPackage>> {
        let mut dependencies = Vec::new();
        for dep in dependency_ids(&package.manifest)? {
            let node = self
                .resolve_node(&dep)
                .await
                .with_context(|| format!("Failed to resolve {dep}, required by {}", package.id))?;
            dependencies.push(node);
        }
        Ok(dependencies)
    }

    /// Resolves several packages concurrently, one result per id.
    pub async fn resolve_packages(&self, ids: &[&str]) -> Vec<Result<ResolvedPackage>> {
        join_all(ids.iter().map(|id| self.resolve_package(id))).await
    }

    /// Resolves a package and all transitive requirements.
    ///
    /// Shared requirements are fetched once.
    ///
    /// # Errors
    ///
    /// [`StackpmError::CircularDependency`] when requirements form a cycle,
    /// plus the errors of [`DependencyResolver::resolve_package`].
    pub async fn resolve_package_tree(&self, id: &str) -> Result<ResolvedPackage> {
        let root = parse_package_id(id)?;
        let mut graph = DependencyGraph::new();
        let mut nodes: HashMap<PackageId, (ResolvedPackage, Vec<PackageId>)> = HashMap::new();
        let mut queue = VecDeque::from([root.clone()]);

        while let Some(current) = queue.pop_front() {
            if nodes.contains_key(&current) {
                continue;
            }
            let node = self.resolve_node(&current).await.with_context(|| {
                if current == root {
                    format!("Failed to resolve {current}")
                } else {
                    format!("Failed to resolve dependency {current} of {root}")
                }
            })?;
            let deps = dependency_ids(&node.manifest)?;

            graph.ensure_node(&current);
            for dep in &deps {
                graph.add_dependency(&current, dep);
                if !nodes.contains_key(dep) {
                    queue.push_back(dep.clone());
                }
            }
            nodes.insert(current, (node, deps));
        }

        graph.detect_cycles()?;
        debug!(package = %root, packages = graph.node_count(), "Resolved dependency tree");

        Ok(build_tree(&root, &nodes))
    }

    /// Packages that must be installed for `package`, dependencies first.
    ///
    /// Installed packages are left out but still walked, and every package
    /// appears at most once.
    ///
    /// # Errors
    ///
    /// [`StackpmError::CircularDependency`] when a package appears inside its
    /// own requirement subtree.
    pub fn get_install_order<'a>(
        &self,
        package: &'a ResolvedPackage,
    ) -> Result<Vec<&'a ResolvedPackage>, StackpmError> {
        get_install_order(package)
    }

    /// Every dependency node that is not installed. See [`DependencyCheck`].
    pub fn check_dependencies(&self, package: &ResolvedPackage) -> DependencyCheck {
        check_dependencies(package)
    }
}

fn npm_manifest(id: &PackageId) -> Manifest {
    let spec = NpmSpec::parse(&id.name);
    let mut manifest = Manifest::new(PackageKind::Binary, spec.name.clone());
    manifest.id = id.to_string();
    manifest.version = Some(spec.version);
    manifest.install_type = Some("npm".to_string());
    manifest.install_dir =
        Some(format!("{}/{}", PackageKind::Npm.directory(), id.sanitized_name()));
    manifest
}

fn build_tree(
    id: &PackageId,
    nodes: &HashMap<PackageId, (ResolvedPackage, Vec<PackageId>)>,
) -> ResolvedPackage {
    let Some((node, deps)) = nodes.get(id) else {
        return ResolvedPackage {
            id: id.clone(),
            kind: id.kind,
            name: id.name.clone(),
            version: "latest".to_string(),
            installed: false,
            manifest: Manifest::new(id.kind, id.name.clone()),
            dependencies: Vec::new(),
        };
    };
    let mut node = node.clone();
    node.dependencies = deps.iter().map(|dep| build_tree(dep, nodes)).collect();
    node
}

/// Depth-first install order: dependencies before dependents, installed
/// packages skipped, no duplicates.
pub fn get_install_order(package: &ResolvedPackage) -> Result<Vec<&ResolvedPackage>, StackpmError> {
    fn visit<'a>(
        node: &'a ResolvedPackage,
        visited: &mut HashSet<PackageId>,
        in_progress: &mut Vec<PackageId>,
        order: &mut Vec<&'a ResolvedPackage>,
    ) -> Result<(), StackpmError> {
        if let Some(start) = in_progress.iter().position(|id| *id == node.id) {
            let chain = in_progress[start..]
                .iter()
                .chain(std::iter::once(&node.id))
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" → ");
            return Err(StackpmError::CircularDependency { chain });
        }
        if visited.contains(&node.id) {
            return Ok(());
        }

        in_progress.push(node.id.clone());
        for dep in &node.dependencies {
            visit(dep, visited, in_progress, order)?;
        }
        in_progress.pop();

        visited.insert(node.id.clone());
        if !node.installed {
            order.push(node);
        }
        Ok(())
    }

    let mut order = Vec::new();
    visit(package, &mut HashSet::new(), &mut Vec::new(), &mut order)?;
    Ok(order)
}

/// Flat list of every not-installed dependency node, duplicates included.
#[must_use]
pub fn check_dependencies(package: &ResolvedPackage) -> DependencyCheck {
    fn collect(node: &ResolvedPackage, missing: &mut Vec<PackageId>) {
        for dep in &node.dependencies {
            if !dep.installed {
                missing.push(dep.id.clone());
            }
            collect(dep, missing);
        }
    }

    let mut missing = Vec::new();
    collect(package, &mut missing);
    DependencyCheck {
        satisfied: missing.is_empty(),
        missing,
    }
}
