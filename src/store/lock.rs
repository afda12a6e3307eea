//! Cross-process locks under `<home>/.locks`.
//!
//! Used to serialize read-modify-write cycles on shared documents such as
//! the shim registry. The lock is released when the guard is dropped.
//!
//! All file operations run in `spawn_blocking` so a contended lock never
//! stalls a runtime worker.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_retry::strategy::ExponentialBackoff;
use tracing::debug;

use crate::constants::{MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS, default_lock_timeout};
use crate::core::StackpmError;

/// An exclusive OS file lock on `<locks_dir>/<name>.lock`.
///
/// ```rust,no_run
/// use stackpm::store::HomeLock;
/// use std::path::Path;
///
/// # async fn example() -> anyhow::Result<()> {
/// let _lock = HomeLock::acquire(Path::new("/home/me/.stackpm/.locks"), "shims").await?;
/// // ... read, modify, write ...
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct HomeLock {
    _file: Arc<File>,
    name: String,
}

impl Drop for HomeLock {
    fn drop(&mut self) {
        debug!(lock_name = %self.name, "Lock released");
    }
}

impl HomeLock {
    /// Acquires the named lock with the default timeout.
    pub async fn acquire(locks_dir: &Path, name: &str) -> Result<Self> {
        Self::acquire_with_timeout(locks_dir, name, default_lock_timeout()).await
    }

    /// Acquires the named lock, polling with exponential backoff (10ms up to 500ms).
    ///
    /// # Errors
    ///
    /// [`StackpmError::LockTimeout`] when the lock stays held for `timeout`.
    pub async fn acquire_with_timeout(locks_dir: &Path, name: &str, timeout: Duration) -> Result<Self> {
        debug!(lock_name = name, "Waiting for lock");

        tokio::fs::create_dir_all(locks_dir)
            .await
            .with_context(|| format!("Failed to create locks directory: {}", locks_dir.display()))?;

        let lock_path = locks_dir.join(format!("{name}.lock"));
        let open_path = lock_path.clone();
        let file = tokio::task::spawn_blocking(move || {
            OpenOptions::new().create(true).write(true).truncate(false).open(&open_path)
        })
        .await
        .context("spawn_blocking panicked")?
        .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;
        let file = Arc::new(file);

        let start = Instant::now();
        let backoff = ExponentialBackoff::from_millis(STARTING_BACKOFF_DELAY_MS)
            .max_delay(Duration::from_millis(MAX_BACKOFF_DELAY_MS));

        for delay in backoff {
            let attempt = Arc::clone(&file);
            let locked = tokio::task::spawn_blocking(move || attempt.try_lock_exclusive())
                .await
                .context("spawn_blocking panicked")?;

            if let Ok(true) = locked {
                debug!(lock_name = name, wait_ms = start.elapsed().as_millis(), "Lock acquired");
                return Ok(Self {
                    _file: file,
                    name: name.to_string(),
                });
            }

            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(delay.min(remaining)).await;
        }

        Err(StackpmError::LockTimeout {
            name: name.to_string(),
            seconds: timeout.as_secs(),
        }
        .into())
    }
}
