//! Package identity
//!
//! Every package is addressed by a [`PackageId`]: a `(kind, name)` pair
//! written as `kind:name`. The kind decides both the registry namespace and
//! the directory the package is installed under.
//!
//! ```rust
//! use stackpm::core::{PackageId, PackageKind};
//!
//! let id: PackageId = "binary:ripgrep".parse().unwrap();
//! assert_eq!(id.kind, PackageKind::Binary);
//! assert_eq!(id.name, "ripgrep");
//! assert_eq!(id.to_string(), "binary:ripgrep");
//! ```
//!
//! `npm` is a synthetic kind: it has no registry entry, and its name is an
//! npm package spec (`@scope/name@version`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::StackpmError;

/// The kinds of package stackpm manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    /// Bundled multi-file protocol-server package
    Stack,
    /// Language runtime (node, python, ...)
    Runtime,
    /// Single command-line tool
    Binary,
    /// Coding agent CLI
    Agent,
    /// Prompt bundle
    Prompt,
    /// Package installed straight from npm, bypassing the registry
    Npm,
}

impl PackageKind {
    /// Every kind, in registry order.
    pub const ALL: [Self; 6] =
        [Self::Stack, Self::Runtime, Self::Binary, Self::Agent, Self::Prompt, Self::Npm];

    /// The identifier prefix for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stack => "stack",
            Self::Runtime => "runtime",
            Self::Binary => "binary",
            Self::Agent => "agent",
            Self::Prompt => "prompt",
            Self::Npm => "npm",
        }
    }

    /// Directory under the stackpm home that holds packages of this kind.
    #[must_use]
    pub const fn directory(self) -> &'static str {
        match self {
            Self::Stack => "stacks",
            Self::Runtime => "runtimes",
            Self::Binary => "binaries",
            Self::Agent => "agents",
            Self::Prompt => "prompts",
            Self::Npm => "npm",
        }
    }

    /// Whether manifests of this kind must declare at least one binary.
    #[must_use]
    pub const fn requires_bins(self) -> bool {
        matches!(self, Self::Runtime | Self::Binary | Self::Agent)
    }
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageKind {
    type Err = StackpmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s).ok_or_else(|| {
            StackpmError::InvalidPackageId {
                id: s.to_string(),
                reason: format!("unknown package kind '{s}'"),
            }
        })
    }
}

/// A canonical `kind:name` package identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId {
    /// Package kind
    pub kind: PackageKind,
    /// Package name; for `npm` ids this is the full npm spec
    pub name: String,
}

impl PackageId {
    /// Creates an id from its parts.
    pub fn new(kind: PackageKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Name in filesystem-safe form.
    ///
    /// For `npm` ids the version suffix is dropped first, so every version of
    /// an npm package shares one install directory.
    #[must_use]
    pub fn sanitized_name(&self) -> String {
        if self.kind == PackageKind::Npm {
            sanitize_name(&NpmSpec::parse(&self.name).name)
        } else {
            sanitize_name(&self.name)
        }
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

impl FromStr for PackageId {
    type Err = StackpmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_package_id(s)
    }
}

impl Serialize for PackageId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PackageId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parses `kind:name` into a [`PackageId`].
///
/// # Errors
///
/// Returns [`StackpmError::InvalidPackageId`] when the separator is missing,
/// the kind is unknown, or the name is empty or would not map to its own
/// directory (`.`, `..`).
pub fn parse_package_id(id: &str) -> Result<PackageId, StackpmError> {
    let Some((kind, name)) = id.split_once(':') else {
        return Err(StackpmError::InvalidPackageId {
            id: id.to_string(),
            reason: "expected the form kind:name".to_string(),
        });
    };

    let kind = kind.parse::<PackageKind>().map_err(|_| StackpmError::InvalidPackageId {
        id: id.to_string(),
        reason: format!("unknown package kind '{kind}'"),
    })?;

    if name.is_empty() {
        return Err(StackpmError::InvalidPackageId {
            id: id.to_string(),
            reason: "package name is empty".to_string(),
        });
    }

    let id = PackageId::new(kind, name);
    let directory = id.sanitized_name();
    if directory.is_empty() || directory == "." || directory == ".." || directory.contains('\\') {
        return Err(StackpmError::InvalidPackageId {
            id: id.to_string(),
            reason: format!("'{name}' is not usable as a directory name"),
        });
    }

    Ok(id)
}

/// Joins a kind and name into the canonical `kind:name` string.
#[must_use]
pub fn create_package_id(kind: PackageKind, name: &str) -> String {
    format!("{kind}:{name}")
}

/// Converts a package name to a directory-safe form.
///
/// Scoped npm names lose their leading `@` and have `/` replaced with `__`:
/// `@modelcontextprotocol/server-github` becomes
/// `modelcontextprotocol__server-github`.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    name.strip_prefix('@').unwrap_or(name).replace('/', "__")
}

/// An npm package spec split into name and version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpmSpec {
    /// Package name, including any `@scope/` prefix
    pub name: String,
    /// Requested version or dist-tag; `"latest"` when omitted
    pub version: String,
}

impl NpmSpec {
    /// Splits `name@version`, treating the `@` that opens a scope as part of the name.
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        // A scoped name starts with '@', so the version delimiter is the first
        // '@' after position 0.
        let delimiter = spec.get(1..).and_then(|rest| rest.find('@')).map(|i| i + 1);

        match delimiter {
            Some(idx) => {
                let version = &spec[idx + 1..];
                Self {
                    name: spec[..idx].to_string(),
                    version: if version.is_empty() {
                        "latest".to_string()
                    } else {
                        version.to_string()
                    },
                }
            }
            None => Self {
                name: spec.to_string(),
                version: "latest".to_string(),
            },
        }
    }
}
