use anyhow::Result;
use serial_test::serial;
use stackpm::config::GlobalConfig;
use stackpm::constants::CONFIG_ENV_VAR;
use stackpm::shims::{ConflictPolicy, ShimStyle};
use tempfile::TempDir;

/// `$STACKPM_CONFIG` wins over `<home>/config.toml`.
#[tokio::test]
#[serial]
async fn test_config_env_override() -> Result<()> {
    let temp = TempDir::new()?;
    let home = temp.path().join("home");
    std::fs::create_dir_all(&home)?;
    std::fs::write(home.join("config.toml"), "shim_conflict = \"reject\"\n")?;

    let elsewhere = temp.path().join("custom.toml");
    std::fs::write(&elsewhere, "shim_conflict = \"override\"\nshim_style = \"symlink\"\n")?;

    // SAFETY: serialized with every other environment-touching test
    unsafe { std::env::set_var(CONFIG_ENV_VAR, &elsewhere) };
    let loaded = GlobalConfig::load(&home).await;
    unsafe { std::env::remove_var(CONFIG_ENV_VAR) };

    let loaded = loaded?;
    assert_eq!(loaded.shim_conflict, ConflictPolicy::Override);
    assert_eq!(loaded.shim_style, ShimStyle::Symlink);

    let from_home = GlobalConfig::load(&home).await?;
    assert_eq!(from_home.shim_conflict, ConflictPolicy::Reject);
    Ok(())
}

#[tokio::test]
#[serial]
async fn test_invalid_config_is_an_error() -> Result<()> {
    let temp = TempDir::new()?;
    std::fs::write(temp.path().join("config.toml"), "shim_conflict = \"sometimes\"\n")?;

    let err = GlobalConfig::load(temp.path()).await.unwrap_err();
    assert!(format!("{err:#}").contains("Failed to parse global config"));
    Ok(())
}
