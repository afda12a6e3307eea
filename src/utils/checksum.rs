//! Content digests for download verification.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use crate::core::StackpmError;

/// Digest algorithms accepted in manifest `checksum.algo` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    /// SHA-256
    Sha256,
    /// SHA-512
    Sha512,
}

impl ChecksumAlgorithm {
    /// Hex-encoded digest of `bytes`.
    #[must_use]
    pub fn digest_hex(self, bytes: &[u8]) -> String {
        match self {
            Self::Sha256 => hex::encode(Sha256::digest(bytes)),
            Self::Sha512 => hex::encode(Sha512::digest(bytes)),
        }
    }

    /// Hex-encoded digest of everything `reader` yields.
    pub fn digest_reader(self, mut reader: impl Read) -> std::io::Result<String> {
        match self {
            Self::Sha256 => {
                let mut hasher = Sha256::new();
                std::io::copy(&mut reader, &mut hasher)?;
                Ok(hex::encode(hasher.finalize()))
            }
            Self::Sha512 => {
                let mut hasher = Sha512::new();
                std::io::copy(&mut reader, &mut hasher)?;
                Ok(hex::encode(hasher.finalize()))
            }
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => f.write_str("sha256"),
            Self::Sha512 => f.write_str("sha512"),
        }
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = StackpmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            _ => Err(StackpmError::UnsupportedChecksumAlgorithm {
                algo: s.to_string(),
            }),
        }
    }
}

/// Verifies `bytes` against an expected digest.
///
/// The expected value may carry an `algo:` prefix (`sha256:ab12…`) and is
/// compared case-insensitively.
///
/// # Errors
///
/// [`StackpmError::ChecksumMismatch`] when the digests differ. There is no
/// way to skip this check.
pub fn verify_checksum(
    name: &str,
    algo: ChecksumAlgorithm,
    expected: &str,
    bytes: &[u8],
) -> Result<(), StackpmError> {
    compare(name, expected, algo.digest_hex(bytes))
}

/// Streams a file through the digest and verifies it. See [`verify_checksum`].
pub fn verify_file_checksum(name: &str, algo: ChecksumAlgorithm, expected: &str, path: &Path) -> Result<()> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {} for verification", path.display()))?;
    let actual = algo
        .digest_reader(std::io::BufReader::new(file))
        .with_context(|| format!("Failed to hash {}", path.display()))?;
    Ok(compare(name, expected, actual)?)
}

fn compare(name: &str, expected: &str, actual: String) -> Result<(), StackpmError> {
    let expected = expected
        .split_once(':')
        .map_or(expected, |(_, value)| value)
        .trim()
        .to_ascii_lowercase();

    if actual == expected {
        Ok(())
    } else {
        Err(StackpmError::ChecksumMismatch {
            name: name.to_string(),
            expected,
            actual,
        })
    }
}
