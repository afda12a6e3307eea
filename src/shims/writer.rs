//! Shim files on disk.
//!
//! A wrapper shim is a tiny script that execs its target with all arguments
//! forwarded. `exec` replaces the shell process so the exit code and signals
//! pass through untouched. On Windows the shim is a `.cmd` batch file.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::trace;

use super::ShimStyle;
use crate::utils::fs::{atomic_write, remove_file, set_executable};
use crate::utils::is_windows;

const SHIM_MARKER: &str = "stackpm shim";

/// File name of the shim for `name` on this platform.
#[must_use]
pub fn shim_file_name(name: &str) -> String {
    if is_windows() { format!("{name}.cmd") } else { name.to_string() }
}

/// Quotes a path for a POSIX `sh` single-quoted string.
fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Script content for a wrapper shim pointing at `target`.
#[must_use]
pub fn wrapper_script(target: &Path) -> String {
    let target = target.display().to_string();
    if is_windows() {
        format!("@echo off\r\nrem {SHIM_MARKER}\r\n\"{target}\" %*\r\nexit /b %ERRORLEVEL%\r\n")
    } else {
        format!("#!/bin/sh\n# {SHIM_MARKER}\nexec {} \"$@\"\n", sh_quote(&target))
    }
}

/// Writes (or replaces) a shim at `path` that runs `target`.
///
/// Symlink style is honored on Unix only; elsewhere a wrapper is written.
pub fn write_shim(path: &Path, target: &Path, style: ShimStyle) -> Result<()> {
    trace!(shim = %path.display(), target = %target.display(), ?style, "Writing shim");

    #[cfg(unix)]
    if style == ShimStyle::Symlink {
        if let Some(parent) = path.parent() {
            crate::utils::ensure_dir(parent)?;
        }
        remove_file(path)?;
        std::os::unix::fs::symlink(target, path)
            .with_context(|| format!("Failed to symlink {} -> {}", path.display(), target.display()))?;
        return Ok(());
    }
    #[cfg(not(unix))]
    let _ = style;

    atomic_write(path, wrapper_script(target).as_bytes())?;
    set_executable(path)
}

/// Target recorded inside an existing shim, if it can be read back.
#[must_use]
pub fn read_shim_target(path: &Path) -> Option<PathBuf> {
    let metadata = std::fs::symlink_metadata(path).ok()?;
    if metadata.file_type().is_symlink() {
        return std::fs::read_link(path).ok();
    }

    let content = std::fs::read_to_string(path).ok()?;
    if !content.contains(SHIM_MARKER) {
        return None;
    }
    content.lines().find_map(|line| {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("exec ") {
            let quoted = rest.strip_suffix("\"$@\"")?.trim();
            let inner = quoted.strip_prefix('\'')?.strip_suffix('\'')?;
            Some(PathBuf::from(inner.replace(r"'\''", "'")))
        } else if line.starts_with('"') && line.ends_with("%*") {
            let inner = line.strip_suffix("%*")?.trim().strip_prefix('"')?.strip_suffix('"')?;
            Some(PathBuf::from(inner))
        } else {
            None
        }
    })
}

/// Removes a shim file. Missing shims are ignored.
pub fn remove_shim_file(path: &Path) -> Result<()> {
    remove_file(path)
}
