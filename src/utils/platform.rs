//! Platform detection and path helpers.
//!
//! Platform keys use the Node.js naming scheme found in package manifests:
//! `darwin`, `linux`, `win32` for the OS and `x64`, `arm64` for the
//! architecture, joined as `os-arch` (for example `darwin-arm64`).

use anyhow::Result;
use std::path::PathBuf;

/// Checks if the current platform is Windows.
#[must_use]
pub const fn is_windows() -> bool {
    cfg!(windows)
}

/// Gets the home directory path for the current user.
pub fn get_home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| {
        let platform_help = if is_windows() {
            "On Windows: Check that the USERPROFILE environment variable is set"
        } else {
            "On Unix/Linux: Check that the HOME environment variable is set"
        };
        anyhow::anyhow!("Could not determine home directory.\n\n{platform_help}")
    })
}

/// OS component of the platform key for the running binary.
#[must_use]
pub fn current_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "win32",
        other => other,
    }
}

/// Architecture component of the platform key for the running binary.
#[must_use]
pub fn current_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        "x86" => "ia32",
        other => other,
    }
}

/// The `os-arch` platform key for the running binary.
///
/// ```rust
/// let key = stackpm::utils::platform::platform_arch();
/// assert!(key.contains('-'));
/// ```
#[must_use]
pub fn platform_arch() -> String {
    format!("{}-{}", current_os(), current_arch())
}

/// Splits a platform key into `(os, arch)`. An OS-only key has no arch.
#[must_use]
pub fn split_platform_key(key: &str) -> (&str, Option<&str>) {
    match key.split_once('-') {
        Some((os, arch)) => (os, Some(arch)),
        None => (key, None),
    }
}

/// Expands `~` and environment variables in a configured path.
pub fn resolve_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path)
        .map_err(|e| anyhow::anyhow!("Failed to expand path '{path}': {e}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
