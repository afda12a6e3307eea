//! Archive extraction for downloaded packages.
//!
//! Supports tarballs (plain or gzip-compressed) and zip files. `strip` drops
//! that many leading path components from every entry, the way
//! `tar --strip-components` does, so `ripgrep-14.1.0-x86_64/rg` lands at
//! `<dest>/rg` with `strip = 1`.
//!
//! Entries whose path would escape the destination are skipped. A link that
//! points outside the destination, or an entry that would be written through
//! a symlink, fails the whole extraction.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::core::StackpmError;

/// Archive formats understood by [`extract_archive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// `.tar.gz` / `.tgz`
    TarGz,
    /// Uncompressed `.tar`
    Tar,
    /// `.zip`
    Zip,
    /// Not an archive; the file is placed as-is
    Raw,
}

impl ArchiveFormat {
    /// Parses an explicit `extract.format` value.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "tar.gz" | "tgz" | "targz" => Some(Self::TarGz),
            "tar" => Some(Self::Tar),
            "zip" => Some(Self::Zip),
            _ => None,
        }
    }

    /// Infers the format from the URL suffix; anything unrecognized is raw.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
        if path.ends_with(".tar.gz") || path.ends_with(".tgz") {
            Self::TarGz
        } else if path.ends_with(".tar") {
            Self::Tar
        } else if path.ends_with(".zip") {
            Self::Zip
        } else {
            Self::Raw
        }
    }

    /// Picks a format from an explicit manifest value, falling back to the URL suffix.
    ///
    /// # Errors
    ///
    /// [`StackpmError::ExtractionFailed`] for an explicit format that is not supported.
    pub fn detect(explicit: Option<&str>, url: &str) -> Result<Self, StackpmError> {
        match explicit {
            Some(name) => Self::parse(name).ok_or_else(|| StackpmError::ExtractionFailed {
                archive: url.to_string(),
                reason: format!("unsupported archive format '{name}'"),
            }),
            None => Ok(Self::from_url(url)),
        }
    }
}

/// Extracts `archive` into `dest`, dropping `strip` leading components.
pub fn extract_archive(archive: &Path, dest: &Path, format: ArchiveFormat, strip: usize) -> Result<()> {
    debug!(archive = %archive.display(), dest = %dest.display(), ?format, strip, "Extracting archive");
    crate::utils::fs::ensure_dir(dest)?;

    let open = || {
        File::open(archive)
            .map(BufReader::new)
            .with_context(|| format!("Failed to open archive: {}", archive.display()))
    };

    match format {
        ArchiveFormat::TarGz => extract_tar(archive, flate2::read::GzDecoder::new(open()?), dest, strip),
        ArchiveFormat::Tar => extract_tar(archive, open()?, dest, strip),
        ArchiveFormat::Zip => extract_zip(archive, dest, strip),
        ArchiveFormat::Raw => Err(extraction_error(archive, "not an archive").into()),
    }
}

/// Drops `strip` leading components and rejects anything that is not a plain relative path.
fn stripped_path(path: &Path, strip: usize) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components().skip(strip) {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if out.as_os_str().is_empty() { None } else { Some(out) }
}

fn extraction_error(archive: &Path, reason: impl ToString) -> StackpmError {
    StackpmError::ExtractionFailed {
        archive: archive.display().to_string(),
        reason: reason.to_string(),
    }
}

fn is_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}

/// Fails when a directory on the way to `relative` is a symlink.
fn check_parents(archive: &Path, dest: &Path, relative: &Path) -> Result<(), StackpmError> {
    let mut current = dest.to_path_buf();
    if let Some(parent) = relative.parent() {
        for component in parent.components() {
            current.push(component);
            if is_symlink(&current) {
                return Err(extraction_error(
                    archive,
                    format!("{} would be written through a symlink", relative.display()),
                ));
            }
        }
    }
    Ok(())
}

/// Whether a symlink at `relative` pointing to `link` stays inside `dest`.
///
/// The target is resolved lexically from the link's directory, and must not
/// pass through another symlink on the way.
fn link_stays_inside(dest: &Path, relative: &Path, link: &Path) -> bool {
    let mut current = relative.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut components = link.components().peekable();

    while let Some(component) = components.next() {
        match component {
            Component::Normal(part) => {
                current.push(part);
                if components.peek().is_some() && is_symlink(&dest.join(&current)) {
                    return false;
                }
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if !current.pop() {
                    return false;
                }
            }
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

fn extract_tar<R: Read>(archive: &Path, reader: R, dest: &Path, strip: usize) -> Result<()> {
    let mut tarball = tar::Archive::new(reader);

    let entries = tarball.entries().map_err(|e| extraction_error(archive, e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| extraction_error(archive, e))?;
        let entry_path = entry.path().map_err(|e| extraction_error(archive, e))?.into_owned();

        let Some(relative) = stripped_path(&entry_path, strip) else {
            debug!(entry = %entry_path.display(), "Skipping archive entry");
            continue;
        };
        check_parents(archive, dest, &relative)?;
        let target = dest.join(&relative);
        if let Some(parent) = target.parent() {
            crate::utils::fs::ensure_dir(parent)?;
        }

        let entry_type = entry.header().entry_type();
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            let link = entry
                .link_name()
                .map_err(|e| extraction_error(archive, e))?
                .ok_or_else(|| extraction_error(archive, format!("{} has no link target", relative.display())))?
                .into_owned();

            if entry_type.is_hard_link() {
                // Hard link targets are archive paths, not paths relative to the link
                let source = stripped_path(&link, strip)
                    .filter(|source| check_parents(archive, dest, source).is_ok())
                    .ok_or_else(|| {
                        extraction_error(
                            archive,
                            format!("hard link {} points outside the package", relative.display()),
                        )
                    })?;
                crate::utils::fs::remove_file(&target)?;
                std::fs::hard_link(dest.join(&source), &target)
                    .map_err(|e| extraction_error(archive, e))?;
                continue;
            }

            if !link_stays_inside(dest, &relative, &link) {
                return Err(extraction_error(
                    archive,
                    format!("symlink {} -> {} points outside the package", relative.display(), link.display()),
                )
                .into());
            }
        }

        entry.unpack(&target).map_err(|e| extraction_error(archive, e))?;
    }

    Ok(())
}

fn extract_zip(archive: &Path, dest: &Path, strip: usize) -> Result<()> {
    let file = File::open(archive)
        .with_context(|| format!("Failed to open archive: {}", archive.display()))?;
    let mut zip = zip::ZipArchive::new(BufReader::new(file)).map_err(|e| extraction_error(archive, e))?;

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|e| extraction_error(archive, e))?;
        let Some(enclosed) = entry.enclosed_name() else {
            continue;
        };
        let Some(relative) = stripped_path(&enclosed, strip) else {
            continue;
        };
        check_parents(archive, dest, &relative)?;
        let target = dest.join(relative);

        if entry.is_dir() {
            crate::utils::fs::ensure_dir(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            crate::utils::fs::ensure_dir(parent)?;
        }
        let mut out = File::create(&target)
            .with_context(|| format!("Failed to create file: {}", target.display()))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| extraction_error(archive, e))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&target, std::fs::Permissions::from_mode(mode & 0o777))
                .with_context(|| format!("Failed to set permissions on {}", target.display()))?;
        }
    }

    Ok(())
}
