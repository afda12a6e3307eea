use anyhow::Result;
use serde_json::json;
use stackpm::core::{PackageId, PackageKind};
use stackpm::installer::InstallOptions;
use stackpm::store::InstallType;
use stackpm::test_utils::TestHome;

use crate::common::{ManifestBuilder, registry, tar_gz};

const HELLO: &[u8] = b"#!/bin/sh\necho hello\n";

fn id(kind: PackageKind, name: &str) -> PackageId {
    PackageId::new(kind, name)
}

/// A release tarball is verified, unpacked with `strip`, recorded, and shimmed.
#[tokio::test]
async fn test_install_tarball_with_strip() -> Result<()> {
    let home = TestHome::new()?;
    let archive = tar_gz(&[
        ("ripgrep-14.1.0/rg", HELLO, 0o755),
        ("ripgrep-14.1.0/doc/README.md", b"docs", 0o644),
    ]);
    let url = home.artifact("ripgrep-14.1.0.tar.gz", &archive)?;
    let manifest = ManifestBuilder::new("binary", "ripgrep")
        .version("14.1.0")
        .bins(&["rg"])
        .download(&url, &archive)
        .install_field("extract", json!({ "strip": 1 }))
        .build();
    let installer = home.installer(registry([manifest]))?;

    let report = installer.install("binary:ripgrep", &InstallOptions::default()).await?;
    assert!(report.is_success(), "{:?}", report.failed);

    let ripgrep = id(PackageKind::Binary, "ripgrep");
    let dir = home.layout.package_path(&ripgrep);
    assert!(dir.join("rg").is_file());
    assert!(dir.join("doc/README.md").is_file());

    let record = home.layout.read_record(&ripgrep).await?.expect("record written");
    assert_eq!(record.install_type, InstallType::Download);
    assert_eq!(record.bins, vec!["rg".to_string()]);
    assert_eq!(record.version.as_deref(), Some("14.1.0"));
    assert_eq!(record.source.as_deref(), Some(url.as_str()));

    let shim = installer.shims().get("rg").await?.expect("shim registered");
    assert_eq!(shim.owner, ripgrep);
    assert_eq!(shim.target, dir.join("rg"));
    assert!(installer.shims().validate_shim("rg").await.valid);
    Ok(())
}

/// A checksum mismatch fails the package without leaving a record or shims.
#[tokio::test]
async fn test_checksum_mismatch_leaves_nothing_installed() -> Result<()> {
    let home = TestHome::new()?;
    let url = home.artifact("tool", HELLO)?;
    let manifest = ManifestBuilder::new("binary", "tool")
        .bins(&["tool"])
        .download(&url, b"a different build")
        .build();
    let installer = home.installer(registry([manifest]))?;

    let report = installer.install("binary:tool", &InstallOptions::default()).await?;

    assert!(report.installed.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].error.contains("Checksum mismatch"), "{}", report.failed[0].error);
    assert!(!home.layout.is_package_installed(&id(PackageKind::Binary, "tool")));
    assert!(installer.shims().get("tool").await?.is_none());
    assert!(installer.list_installed().await?.is_empty());
    Ok(())
}

/// Dependencies install first, and a second run skips everything.
#[tokio::test]
async fn test_install_order_and_skip() -> Result<()> {
    let home = TestHome::new()?;
    let node_url = home.artifact("node", HELLO)?;
    let jq_url = home.artifact("jq", HELLO)?;
    let registry = registry([
        ManifestBuilder::new("runtime", "node").bins(&["node"]).download(&node_url, HELLO).build(),
        ManifestBuilder::new("binary", "jq").bins(&["jq"]).download(&jq_url, HELLO).build(),
        ManifestBuilder::new("stack", "web").requires_runtime("node").requires_binary("jq").build(),
    ]);
    let installer = home.installer(registry)?;

    let report = installer.install("stack:web", &InstallOptions::default()).await?;
    assert!(report.is_success(), "{:?}", report.failed);
    assert_eq!(
        report.installed,
        vec![
            id(PackageKind::Runtime, "node"),
            id(PackageKind::Binary, "jq"),
            id(PackageKind::Stack, "web"),
        ]
    );

    let again = installer.install("stack:web", &InstallOptions::default()).await?;
    assert!(again.installed.is_empty());
    assert_eq!(again.skipped.len(), 3);

    let dependency_check = installer.resolver().check_dependencies(
        &installer.resolver().resolve_package_tree("stack:web").await?,
    );
    assert!(dependency_check.satisfied);
    Ok(())
}

/// `force` reinstalls the requested package but not its dependencies.
#[tokio::test]
async fn test_force_reinstalls_root_only() -> Result<()> {
    let home = TestHome::new()?;
    let url = home.artifact("node", HELLO)?;
    let registry = registry([
        ManifestBuilder::new("runtime", "node").bins(&["node"]).download(&url, HELLO).build(),
        ManifestBuilder::new("prompt", "review").requires_runtime("node").build(),
    ]);
    let installer = home.installer(registry)?;
    installer.install("prompt:review", &InstallOptions::default()).await?;

    let forced = InstallOptions {
        force: true,
        ..InstallOptions::default()
    };
    let report = installer.install("prompt:review", &forced).await?;

    assert_eq!(report.installed, vec![id(PackageKind::Prompt, "review")]);
    assert_eq!(report.skipped, vec![id(PackageKind::Runtime, "node")]);
    Ok(())
}

/// Uninstalling one package leaves shims another package took over.
#[tokio::test]
async fn test_uninstall_keeps_other_owners_shims() -> Result<()> {
    let home = TestHome::new()?;
    let a_archive = tar_gz(&[("a", HELLO, 0o755), ("shared", HELLO, 0o755)]);
    let a_url = home.artifact("a.tar.gz", &a_archive)?;
    let b_url = home.artifact("shared", HELLO)?;
    let registry = registry([
        ManifestBuilder::new("binary", "a").bins(&["a", "shared"]).download(&a_url, &a_archive).build(),
        ManifestBuilder::new("binary", "b").bins(&["shared"]).download(&b_url, HELLO).build(),
    ]);
    let installer = home.installer(registry)?;

    assert!(installer.install("binary:a", &InstallOptions::default()).await?.is_success());
    let forced = InstallOptions {
        force: true,
        ..InstallOptions::default()
    };
    assert!(installer.install("binary:b", &forced).await?.is_success());

    let removed = installer.uninstall("binary:a").await?;
    assert_eq!(removed, vec!["a".to_string()]);

    let shims = installer.shims();
    assert!(shims.get("a").await?.is_none());
    assert_eq!(shims.owner_of("shared").await?, Some(id(PackageKind::Binary, "b")));
    assert!(shims.validate_shim("shared").await.valid);

    let installed: Vec<PackageId> = installer.list_installed().await?.into_iter().map(|r| r.id).collect();
    assert_eq!(installed, vec![id(PackageKind::Binary, "b")]);
    Ok(())
}

/// `npm:` ids bypass the registry and run npm with the parsed spec.
#[cfg(unix)]
#[tokio::test]
async fn test_npm_spec_install() -> Result<()> {
    let mut home = TestHome::new()?;
    let tools = home.temp_dir.path().join("tools");
    let npm = home.script_in(
        &tools,
        "npm",
        "echo \"$@\" > npm-args.txt\necho \"$npm_config_update_notifier\" > npm-env.txt\nmkdir -p node_modules/.bin\nprintf '#!/bin/sh\\necho moo\\n' > node_modules/.bin/cowsay\nchmod +x node_modules/.bin/cowsay",
    )?;
    home.config.npm_command = npm.display().to_string();
    let installer = home.installer(registry([]))?;

    let report = installer.install("npm:cowsay@1.6.0", &InstallOptions::default()).await?;
    assert!(report.is_success(), "{:?}", report.failed);

    let cowsay = id(PackageKind::Npm, "cowsay@1.6.0");
    let dir = home.layout.package_path(&cowsay);
    assert_eq!(dir, home.layout.root().join("npm").join("cowsay"));

    let args = std::fs::read_to_string(dir.join("npm-args.txt"))?;
    assert!(args.contains("install --prefix"));
    assert!(args.contains("cowsay@1.6.0"));
    assert_eq!(std::fs::read_to_string(dir.join("npm-env.txt"))?.trim(), "false");

    let record = home.layout.read_record(&cowsay).await?.expect("record written");
    assert_eq!(record.install_type, InstallType::Npm);
    assert_eq!(record.version.as_deref(), Some("1.6.0"));
    assert_eq!(record.bins, vec!["cowsay".to_string()]);
    assert_eq!(
        installer.shims().get("cowsay").await?.expect("shim").target,
        dir.join("node_modules/.bin/cowsay")
    );
    Ok(())
}

/// A failing npm leaves no record behind.
#[cfg(unix)]
#[tokio::test]
async fn test_npm_failure_is_reported() -> Result<()> {
    let mut home = TestHome::new()?;
    let tools = home.temp_dir.path().join("tools");
    let npm = home.script_in(&tools, "npm", "echo 'E404 not found' >&2\nexit 1")?;
    home.config.npm_command = npm.display().to_string();
    let installer = home.installer(registry([]))?;

    let report = installer.install("npm:does-not-exist", &InstallOptions::default()).await?;

    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].error.contains("E404"));
    assert!(!home.layout.is_package_installed(&id(PackageKind::Npm, "does-not-exist")));
    Ok(())
}

#[tokio::test]
async fn test_unknown_package_is_an_error() -> Result<()> {
    let home = TestHome::new()?;
    let installer = home.installer(registry([]))?;

    let err = installer.install("binary:ghost", &InstallOptions::default()).await.unwrap_err();
    assert!(format!("{err:#}").contains("not found in registry"));

    let err = installer.install("ghost", &InstallOptions::default()).await.unwrap_err();
    assert!(format!("{err:#}").contains("Invalid package id"));
    Ok(())
}
