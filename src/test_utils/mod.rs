//! Test utilities for stackpm
//!
//! Helpers for unit tests inside the crate and for the integration suites
//! under `tests/` (enabled there through the `test-utils` feature).
//!
//! - [`init_test_logging`] wires `tracing` output into the test harness
//! - [`TestHome`] is a throwaway stackpm home with a fake system `PATH`
//! - [`ManifestFixture`] builds the manifests the suites share
//!
//! # Example
//!
//! ```rust,no_run
//! use stackpm::resolver::StaticRegistry;
//! use stackpm::test_utils::{ManifestFixture, TestHome};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let home = TestHome::new()?;
//! let registry = StaticRegistry::new().with_package(ManifestFixture::content("prompt", "review"));
//! let installer = home.installer(registry)?;
//! installer.install("prompt:review", &Default::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod environment;
pub mod fixtures;

pub use environment::TestHome;
pub use fixtures::ManifestFixture;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call does anything. Uses `level` when given, otherwise
/// `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=stackpm=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}
