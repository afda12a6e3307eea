//! Locating the executables a package produced.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::core::StackpmError;
use crate::utils::fs::{is_executable, set_executable};

/// File names a bin may have on disk. Windows adds the usual launch extensions.
fn candidate_names(bin: &str) -> Vec<String> {
    if crate::utils::is_windows() {
        vec![
            bin.to_string(),
            format!("{bin}.exe"),
            format!("{bin}.cmd"),
            format!("{bin}.bat"),
        ]
    } else {
        vec![bin.to_string()]
    }
}

/// Finds each declared bin anywhere under `root`, shallowest match first.
///
/// Found files are made executable.
///
/// # Errors
///
/// [`StackpmError::BinaryNotFound`] for the first bin with no match.
pub fn locate_bins(root: &Path, declared: &[String]) -> Result<Vec<(String, PathBuf)>> {
    let mut located = Vec::with_capacity(declared.len());

    for bin in declared {
        let names = candidate_names(bin);
        let found = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| !entry.file_type().is_dir())
            .filter(|entry| names.iter().any(|n| entry.file_name() == n.as_str()))
            .min_by_key(|entry| entry.depth())
            .map(|entry| entry.into_path())
            .ok_or_else(|| StackpmError::BinaryNotFound {
                name: bin.clone(),
                searched: root.display().to_string(),
            })?;

        set_executable(&found)?;
        trace!(bin, path = %found.display(), "Located bin");
        located.push((bin.clone(), found));
    }

    Ok(located)
}

/// Every executable directly inside `dir`, named by file stem on Windows.
///
/// A missing directory yields nothing.
pub fn list_bin_dir(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "No bin directory");
        return Ok(Vec::new());
    }

    let mut bins = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() || !is_executable(&path) {
            continue;
        }
        let name = if crate::utils::is_windows() {
            path.file_stem()
        } else {
            path.file_name()
        };
        if let Some(name) = name.and_then(|n| n.to_str()) {
            bins.push((name.to_string(), path.clone()));
        }
    }

    bins.sort();
    bins.dedup_by(|a, b| a.0 == b.0);
    Ok(bins)
}
