//! Integration test suite for stackpm
//!
//! End-to-end checks through the public API against a throwaway home
//! ([`stackpm::test_utils::TestHome`]). Downloads use `file://` URLs and
//! system binaries are shell scripts, so nothing touches the network or the
//! real `PATH`.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **config**: config file discovery and environment overrides
//! - **install**: download, npm, and content installs; uninstall; reports
//! - **platform**: per-platform install config resolution
//! - **resolver**: dependency trees, install order, manifest merging
//! - **shims**: ownership conflicts and shim validation
//! - **system**: system binary registration

// Shared test utilities (from parent tests/ directory)
#[path = "../common/mod.rs"]
mod common;

mod config;
mod install;
mod platform;
mod resolver;
mod shims;
mod system;
