//! Download sources: fetch, verify, unpack, swap into place.
//!
//! Everything happens inside a staging directory next to the final package
//! directory, so a failed checksum or a broken archive never touches an
//! existing install. Only a verified, unpacked tree is renamed into place.

use anyhow::{Context, Result};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::bins::locate_bins;
use crate::core::{PackageId, StackpmError};
use crate::platform::{ChecksumSpec, ExtractSpec};
use crate::utils::archive::{ArchiveFormat, extract_archive};
use crate::utils::checksum::verify_file_checksum;
use crate::utils::fs::{ensure_dir, remove_dir_all, set_executable};

/// Streams `url` into `dest`, returning the byte count.
///
/// `file://` URLs are copied from the local filesystem, which serves mirrors
/// and tests.
pub async fn fetch_to_file(client: &reqwest::Client, url: &str, dest: &Path) -> Result<u64> {
    if let Some(local) = url.strip_prefix("file://") {
        debug!(url, "Copying local artifact");
        return tokio::fs::copy(local, dest).await.map_err(|e| {
            StackpmError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
            .into()
        });
    }

    let download_failed = |reason: String| StackpmError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let response = client.get(url).send().await.map_err(|e| download_failed(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(download_failed(format!("HTTP {status}")).into());
    }

    let mut file = tokio::fs::File::create(dest)
        .await
        .with_context(|| format!("Failed to create {}", dest.display()))?;
    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| download_failed(format!("error reading body: {e}")))?;
        file.write_all(&chunk)
            .await
            .with_context(|| format!("Failed to write {}", dest.display()))?;
        written += chunk.len() as u64;
    }
    file.flush().await.with_context(|| format!("Failed to flush {}", dest.display()))?;

    debug!(url, bytes = written, "Download complete");
    Ok(written)
}

/// Name for a non-archive artifact: the first declared bin, else the last URL segment.
fn raw_file_name(url: &str, bins: &[String]) -> String {
    if let Some(bin) = bins.first() {
        return bin.clone();
    }
    url.split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .unwrap_or("artifact")
        .to_string()
}

/// Installs a download source into `dest`.
///
/// Returns each declared bin with its final path under `dest`.
///
/// # Errors
///
/// [`StackpmError::DownloadFailed`], [`StackpmError::ChecksumMismatch`],
/// [`StackpmError::ExtractionFailed`], or [`StackpmError::BinaryNotFound`]
/// when a declared bin is not in the unpacked tree. `dest` is left as it was.
pub async fn install_download(
    client: &reqwest::Client,
    id: &PackageId,
    url: &str,
    checksum: &ChecksumSpec,
    extract: Option<&ExtractSpec>,
    bins: &[String],
    dest: &Path,
) -> Result<Vec<(String, PathBuf)>> {
    let algo = checksum.algorithm()?;
    let format = ArchiveFormat::detect(extract.and_then(|e| e.format.as_deref()), url)?;
    let parent = dest.parent().unwrap_or(dest);
    ensure_dir(parent)?;

    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(parent)
        .with_context(|| format!("Failed to create staging directory in {}", parent.display()))?;
    let artifact = staging.path().join("artifact");
    let content = staging.path().join("content");

    info!(package = %id, url, "Downloading");
    fetch_to_file(client, url, &artifact).await?;

    let strip = extract.map_or(0, |e| e.strip);
    let name = id.to_string();
    let expected = checksum.value.clone();
    let raw_name = raw_file_name(url, bins);
    let declared = bins.to_vec();

    let located = {
        let artifact = artifact.clone();
        let content = content.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<(String, PathBuf)>> {
            verify_file_checksum(&name, algo, &expected, &artifact)?;
            debug!(package = %name, %algo, "Checksum verified");

            if format == ArchiveFormat::Raw {
                ensure_dir(&content)?;
                let placed = content.join(&raw_name);
                std::fs::rename(&artifact, &placed)
                    .with_context(|| format!("Failed to place {}", placed.display()))?;
                set_executable(&placed)?;
            } else {
                extract_archive(&artifact, &content, format, strip)?;
            }

            locate_bins(&content, &declared)
        })
        .await
        .context("Extraction task panicked")??
    };

    if dest.exists() {
        remove_dir_all(dest)?;
    }
    tokio::fs::rename(&content, dest)
        .await
        .with_context(|| format!("Failed to move package into {}", dest.display()))?;

    Ok(located
        .into_iter()
        .map(|(bin, path)| {
            let relative = path.strip_prefix(&content).map(Path::to_path_buf).unwrap_or(path);
            (bin, dest.join(relative))
        })
        .collect())
}
