use anyhow::Result;
use serde_json::json;
use stackpm::core::{PackageId, PackageKind, StackpmError};
use stackpm::resolver::{DependencyResolver, StaticRegistry, get_install_order};
use stackpm::store::{HomeLayout, InstallType, InstalledPackage};
use tempfile::TempDir;

use crate::common::{ManifestBuilder, registry};

fn names(order: &[&stackpm::resolver::ResolvedPackage]) -> Vec<String> {
    order.iter().map(|p| p.id.to_string()).collect()
}

async fn mark_installed(layout: &HomeLayout, id: &str) -> Result<()> {
    let record = InstalledPackage::new(id.parse()?, InstallType::Content);
    layout.write_record(&record).await
}

fn github_stack() -> StaticRegistry {
    registry([
        ManifestBuilder::new("runtime", "node").bins(&["node"]).build(),
        ManifestBuilder::new("binary", "gh").bins(&["gh"]).build(),
        ManifestBuilder::new("agent", "claude")
            .bins(&["claude"])
            .field("runtime", json!("node"))
            .build(),
        ManifestBuilder::new("stack", "github")
            .requires_agent("claude")
            .requires_binary("gh")
            .requires_runtime("node")
            .build(),
    ])
}

/// Shared dependencies appear once, after everything that needs them is ordered.
#[tokio::test]
async fn test_stack_install_order() -> Result<()> {
    let temp = TempDir::new()?;
    let resolver = DependencyResolver::new(github_stack(), HomeLayout::new(temp.path()));

    let tree = resolver.resolve_package_tree("stack:github").await?;
    let order = get_install_order(&tree)?;

    assert_eq!(names(&order), vec!["runtime:node", "binary:gh", "agent:claude", "stack:github"]);
    Ok(())
}

/// A → B → C with C installed orders B then A.
#[tokio::test]
async fn test_chain_with_installed_leaf() -> Result<()> {
    let temp = TempDir::new()?;
    let layout = HomeLayout::new(temp.path());
    mark_installed(&layout, "runtime:c").await?;
    let resolver = DependencyResolver::new(
        registry([
            ManifestBuilder::new("agent", "a").bins(&["a"]).requires_runtime("b").build(),
            ManifestBuilder::new("runtime", "b").bins(&["b"]).requires_runtime("c").build(),
            ManifestBuilder::new("runtime", "c").bins(&["c"]).build(),
        ]),
        layout,
    );

    let tree = resolver.resolve_package_tree("agent:a").await?;
    assert_eq!(names(&get_install_order(&tree)?), vec!["runtime:b", "agent:a"]);

    let check = resolver.check_dependencies(&tree);
    assert!(!check.satisfied);
    assert_eq!(check.missing, vec![PackageId::new(PackageKind::Runtime, "b")]);
    Ok(())
}

#[tokio::test]
async fn test_cycle_is_reported() -> Result<()> {
    let temp = TempDir::new()?;
    let resolver = DependencyResolver::new(
        registry([
            ManifestBuilder::new("stack", "x").requires_agent("y").build(),
            ManifestBuilder::new("agent", "y").bins(&["y"]).field("requires", json!({ "agents": ["stack:x"] })).build(),
        ]),
        HomeLayout::new(temp.path()),
    );

    let err = resolver.resolve_package_tree("stack:x").await.unwrap_err();
    match err.downcast_ref::<StackpmError>() {
        Some(StackpmError::CircularDependency { chain }) => {
            assert!(chain.contains("stack:x") && chain.contains("agent:y"), "{chain}");
        }
        other => panic!("expected a cycle error, got {other:?}"),
    }
    Ok(())
}

/// Index entries with a `path` are merged with their canonical manifest.
#[tokio::test]
async fn test_index_entry_merged_with_canonical() -> Result<()> {
    let temp = TempDir::new()?;
    let mut registry = StaticRegistry::new();
    registry.insert_package(
        ManifestBuilder::new("binary", "jq")
            .version("1.6")
            .field("path", json!("binaries/jq/manifest.json"))
            .field("description", json!("index summary"))
            .build(),
    );
    registry.insert_manifest(
        "binaries/jq/manifest.json",
        ManifestBuilder::new("binary", "jq").version("1.7.1").bins(&["jq"]).build(),
    );
    let resolver = DependencyResolver::new(registry, HomeLayout::new(temp.path()));

    let jq = resolver.resolve_package("binary:jq").await?;

    assert_eq!(jq.version, "1.7.1");
    assert_eq!(jq.manifest.bins(), ["jq".to_string()]);
    assert_eq!(jq.manifest.description.as_deref(), Some("index summary"));
    Ok(())
}

/// Bulk resolution reports each id on its own.
#[tokio::test]
async fn test_resolve_packages_mixed() -> Result<()> {
    let temp = TempDir::new()?;
    let resolver = DependencyResolver::new(github_stack(), HomeLayout::new(temp.path()));

    let results = resolver.resolve_packages(&["binary:gh", "binary:missing", "npm:@scope/tool@2.0.0"]).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().map(|p| p.name.clone()).ok().as_deref(), Some("gh"));
    assert!(results[1].is_err());
    let npm = results[2].as_ref().expect("npm ids resolve without the registry");
    assert_eq!(npm.kind, PackageKind::Binary);
    assert_eq!(npm.version, "2.0.0");
    assert_eq!(npm.manifest.install_dir.as_deref(), Some("npm/scope__tool"));
    Ok(())
}
