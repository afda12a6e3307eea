//! System binary registration against a fake `/usr/bin`.

#![cfg(unix)]

use anyhow::Result;
use stackpm::core::{PackageId, PackageKind};
use stackpm::installer::InstallOptions;
use stackpm::store::InstallType;
use stackpm::system::RegisterOptions;
use stackpm::test_utils::{ManifestFixture, TestHome};

use crate::common::registry;

#[tokio::test]
async fn test_register_inspect_unregister() -> Result<()> {
    let home = TestHome::new()?;
    let git = home.fake_system_binary("git", "git version 2.43.0")?;
    let registrar = home.registrar();

    let result = registrar.register_system_binary("git", RegisterOptions::default()).await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.path.as_deref(), Some(git.as_path()));

    let info = registrar.get_system_binary_info("git").await?.expect("registered");
    assert_eq!(info.id, PackageId::new(PackageKind::Binary, "git"));
    assert_eq!(info.install_type, InstallType::System);
    assert_eq!(info.version.as_deref(), Some("2.43.0"));
    assert_eq!(info.path.as_deref(), Some(git.to_str().unwrap_or_default()));
    assert!(home.layout.record_path(&info.id).is_file());

    let shims = home.shims();
    assert!(shims.validate_shim("git").await.valid);

    let removed = registrar.unregister_system_binary("git").await;
    assert!(removed.success);
    assert!(!registrar.is_system_binary_registered("git").await);
    assert!(!shims.shim_path("git").exists());

    let again = registrar.unregister_system_binary("git").await;
    assert!(!again.success);
    Ok(())
}

/// A binary that exists but fails `--version` is broken, not missing.
#[tokio::test]
async fn test_broken_binary_is_not_functional() -> Result<()> {
    let home = TestHome::new()?;
    home.script_in(&home.system_bin_dir, "node", "echo 'segfault' >&2\nexit 139")?;

    let result = home.registrar().register_system_binary("node", RegisterOptions::default()).await;

    assert!(!result.success);
    let error = result.error.unwrap_or_default();
    assert!(error.contains("not functional"), "{error}");
    assert!(error.contains("segfault"), "{error}");
    Ok(())
}

/// Installing a `system` package records it under the package's own id.
#[tokio::test]
async fn test_install_system_source() -> Result<()> {
    let home = TestHome::new()?;
    let sqlite3 = home.fake_system_binary("sqlite3", "3.45.0 2024-01-15 17:01:13")?;
    let installer = home.installer(registry([ManifestFixture::system("sqlite", &sqlite3)]))?;

    let report = installer.install("binary:sqlite", &InstallOptions::default()).await?;
    assert!(report.is_success(), "{:?}", report.failed);

    let sqlite = PackageId::new(PackageKind::Binary, "sqlite");
    let record = home.layout.read_record(&sqlite).await?.expect("record");
    assert_eq!(record.install_type, InstallType::System);
    assert_eq!(record.source.as_deref(), Some("system"));
    assert_eq!(record.bins, vec!["sqlite3".to_string()]);
    assert_eq!(installer.shims().owner_of("sqlite3").await?, Some(sqlite));
    Ok(())
}

/// A failing detect command fails the install before anything is recorded.
#[tokio::test]
async fn test_failing_detect_command() -> Result<()> {
    let home = TestHome::new()?;
    let tools = home.temp_dir.path().join("elsewhere");
    let probe = home.script_in(&tools, "sqlite3", "exit 1")?;
    let installer = home.installer(registry([ManifestFixture::system("sqlite", &probe)]))?;

    let report = installer.install("binary:sqlite", &InstallOptions::default()).await?;

    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].error.contains("Detect command failed"));
    assert!(!home.layout.is_package_installed(&PackageId::new(PackageKind::Binary, "sqlite")));
    Ok(())
}
