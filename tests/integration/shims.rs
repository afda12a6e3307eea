use anyhow::Result;
use stackpm::core::{PackageId, PackageKind, StackpmError};
use stackpm::installer::InstallOptions;
use stackpm::shims::{ConflictPolicy, ShimRegistry};
use stackpm::store::InstallType;
use stackpm::test_utils::TestHome;

use crate::common::{ManifestBuilder, registry};

const BODY: &[u8] = b"#!/bin/sh\necho ok\n";

fn two_providers(home: &TestHome) -> Result<stackpm::resolver::StaticRegistry> {
    let first = home.artifact("python-a", BODY)?;
    let second = home.artifact("python-b", BODY)?;
    Ok(registry([
        ManifestBuilder::new("runtime", "python").bins(&["python"]).download(&first, BODY).build(),
        ManifestBuilder::new("runtime", "pypy").bins(&["python"]).download(&second, BODY).build(),
    ]))
}

/// A second package claiming a bin is rejected and the first keeps it.
#[tokio::test]
async fn test_conflict_rejected_by_default() -> Result<()> {
    let home = TestHome::new()?;
    let installer = home.installer(two_providers(&home)?)?;

    assert!(installer.install("runtime:python", &InstallOptions::default()).await?.is_success());
    let report = installer.install("runtime:pypy", &InstallOptions::default()).await?;

    assert_eq!(report.failed.len(), 1);
    assert!(
        report.failed[0].error.contains("already provided by runtime:python"),
        "{}",
        report.failed[0].error
    );
    assert_eq!(
        installer.shims().owner_of("python").await?,
        Some(PackageId::new(PackageKind::Runtime, "python"))
    );
    Ok(())
}

/// A rejected claimant is not recorded, so retrying reports the conflict again.
#[tokio::test]
async fn test_conflict_is_reported_on_every_retry() -> Result<()> {
    let home = TestHome::new()?;
    let installer = home.installer(two_providers(&home)?)?;
    let pypy = PackageId::new(PackageKind::Runtime, "pypy");

    assert!(installer.install("runtime:python", &InstallOptions::default()).await?.is_success());

    for _ in 0..2 {
        let report = installer.install("runtime:pypy", &InstallOptions::default()).await?;
        assert!(report.skipped.is_empty(), "{:?}", report.skipped);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].error.contains("already provided by runtime:python"));
        assert!(!home.layout.is_package_installed(&pypy));
    }
    assert!(
        installer.list_installed().await?.iter().all(|record| record.id != pypy),
        "pypy must not be listed as installed"
    );

    let forced = InstallOptions {
        force: true,
        ..InstallOptions::default()
    };
    assert!(installer.install("runtime:pypy", &forced).await?.is_success());
    assert_eq!(installer.shims().owner_of("python").await?, Some(pypy));
    Ok(())
}

/// The `override` policy hands the bin to the newest claimant.
#[tokio::test]
async fn test_conflict_override_policy() -> Result<()> {
    let mut home = TestHome::new()?;
    home.config.shim_conflict = ConflictPolicy::Override;
    let installer = home.installer(two_providers(&home)?)?;

    installer.install("runtime:python", &InstallOptions::default()).await?;
    let report = installer.install("runtime:pypy", &InstallOptions::default()).await?;

    assert!(report.is_success(), "{:?}", report.failed);
    let pypy = PackageId::new(PackageKind::Runtime, "pypy");
    let entry = installer.shims().get("python").await?.expect("shim");
    assert_eq!(entry.owner, pypy);
    assert_eq!(entry.target, home.layout.package_path(&pypy).join("python"));
    Ok(())
}

/// A rejected batch writes none of its shims.
#[tokio::test]
async fn test_rejected_batch_is_atomic() -> Result<()> {
    let home = TestHome::new()?;
    let shims = home.shims();
    let target = home.temp_dir.path().join("target");
    std::fs::write(&target, BODY)?;
    let owner = PackageId::new(PackageKind::Binary, "coreutils");
    let other = PackageId::new(PackageKind::Binary, "busybox");

    shims.create_shim("ls", &owner, InstallType::Download, &target, false).await?;

    let err = shims
        .create_shims(
            &other,
            InstallType::Download,
            &[("sh".to_string(), target.clone()), ("ls".to_string(), target.clone())],
            false,
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<StackpmError>(),
        Some(StackpmError::ShimConflict { binary, .. }) if binary == "ls"
    ));
    assert!(shims.get("sh").await?.is_none());
    assert!(!shims.shim_path("sh").exists());
    assert_eq!(shims.list().await?.len(), 1);
    Ok(())
}

/// Validation reports a shim whose target disappeared.
#[tokio::test]
async fn test_validate_shim_missing_target() -> Result<()> {
    let home = TestHome::new()?;
    let shims = ShimRegistry::new(home.layout.clone());
    let target = home.temp_dir.path().join("gone");
    std::fs::write(&target, BODY)?;
    let owner = PackageId::new(PackageKind::Binary, "gone");

    shims.create_shim("gone", &owner, InstallType::Download, &target, false).await?;
    assert!(shims.validate_shim("gone").await.valid);

    std::fs::remove_file(&target)?;
    let validation = shims.validate_shim("gone").await;
    assert!(!validation.valid);
    assert_eq!(validation.target, Some(target));
    assert!(validation.error.unwrap_or_default().contains("does not exist"));

    let missing = shims.validate_shim("never-created").await;
    assert!(!missing.valid);
    assert!(missing.error.unwrap_or_default().contains("shim not found"));
    Ok(())
}
