//! Error handling for stackpm
//!
//! The error system follows two rules:
//! 1. **Strongly-typed errors** ([`StackpmError`]) for failures callers need to
//!    match on (integrity failures, shim conflicts, probe failures).
//! 2. **User-friendly messages** ([`ErrorContext`]) with suggestions for
//!    whatever command-line front end embeds this crate.
//!
//! # Error Categories
//!
//! - **Identity**: [`StackpmError::InvalidPackageId`]
//! - **Registry**: [`StackpmError::PackageNotFound`], [`StackpmError::RegistryError`]
//! - **Resolution**: [`StackpmError::ValidationFailed`], [`StackpmError::CircularDependency`],
//!   [`StackpmError::PlatformNotSupported`]
//! - **System binaries**: [`StackpmError::BinaryNotFound`] (probe failure) and
//!   [`StackpmError::BinaryNotFunctional`] (functional failure)
//! - **Integrity**: [`StackpmError::ChecksumMismatch`]
//! - **Shims**: [`StackpmError::ShimConflict`]
//! - **Processes and I/O**: [`StackpmError::CommandFailed`], [`StackpmError::IoError`], ...
//!
//! Pure resolution and validation never return these for bad configuration;
//! they produce structured reports instead. Install and network operations
//! propagate them through `anyhow::Result` so bulk operations can record the
//! failure and keep going.
//!
//! # Examples
//!
//! ```rust,no_run
//! use stackpm::core::{StackpmError, user_friendly_error};
//!
//! let err = anyhow::Error::from(StackpmError::ChecksumMismatch {
//!     name: "ripgrep".to_string(),
//!     expected: "abc".to_string(),
//!     actual: "def".to_string(),
//! });
//! let ctx = user_friendly_error(err);
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for stackpm operations.
#[derive(Error, Debug)]
pub enum StackpmError {
    /// A package identifier could not be parsed.
    ///
    /// Identifiers are never defaulted: `"ripgrep"` without a kind prefix, an
    /// empty name, or an unknown kind are all rejected.
    #[error("Invalid package id '{id}': {reason}")]
    InvalidPackageId {
        /// The identifier as given
        id: String,
        /// Why it was rejected
        reason: String,
    },

    /// The registry has no entry for a package.
    #[error("Package not found in registry: {id}")]
    PackageNotFound {
        /// Fully-qualified package id
        id: String,
    },

    /// The registry collaborator failed while looking up a package.
    #[error("Registry lookup failed for {id}: {reason}")]
    RegistryError {
        /// Fully-qualified package id
        id: String,
        /// Underlying failure
        reason: String,
    },

    /// The resolved install config failed one or more requirements.
    #[error("Invalid install configuration for {id}: {}", errors.join("; "))]
    ValidationFailed {
        /// Package being validated
        id: String,
        /// Every problem found, in discovery order
        errors: Vec<String>,
    },

    /// The manifest declares platforms but none match the requested key.
    #[error("Package {id} does not support platform {platform}")]
    PlatformNotSupported {
        /// Package id
        id: String,
        /// Requested `os-arch` key
        platform: String,
    },

    /// A dependency cycle was found while walking a dependency tree.
    #[error("Circular dependency detected: {chain}")]
    CircularDependency {
        /// The cycle rendered as `a → b → a`
        chain: String,
    },

    /// A system binary was not found in any search path.
    #[error("Binary '{name}' not found in: {searched}")]
    BinaryNotFound {
        /// Executable name
        name: String,
        /// Search paths, joined for display
        searched: String,
    },

    /// A system binary exists but fails when invoked.
    ///
    /// Distinct from [`StackpmError::BinaryNotFound`] so that broken stub
    /// installs (for example a shim left behind by an uninstalled tool) are
    /// reported accurately.
    #[error("Binary '{name}' found at {path} but is not functional: {reason}")]
    BinaryNotFunctional {
        /// Executable name
        name: String,
        /// Where it was found
        path: String,
        /// Output or exit status of the failed `--version` check
        reason: String,
    },

    /// No system binary registration exists for a name.
    #[error("System binary '{name}' is not registered")]
    NotRegistered {
        /// Executable name
        name: String,
    },

    /// Downloaded content does not match the manifest checksum.
    #[error("Checksum mismatch for {name}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Package or artifact name
        name: String,
        /// Checksum declared by the manifest
        expected: String,
        /// Checksum of the downloaded bytes
        actual: String,
    },

    /// The manifest names a checksum algorithm stackpm cannot compute.
    #[error("Unsupported checksum algorithm: {algo}")]
    UnsupportedChecksumAlgorithm {
        /// Algorithm as written in the manifest
        algo: String,
    },

    /// A download could not be completed.
    #[error("Download failed for {url}: {reason}")]
    DownloadFailed {
        /// Source URL
        url: String,
        /// Transport or HTTP status failure
        reason: String,
    },

    /// An archive could not be unpacked.
    #[error("Failed to extract {archive}: {reason}")]
    ExtractionFailed {
        /// Archive path or name
        archive: String,
        /// Underlying failure
        reason: String,
    },

    /// Another package already owns a shim with this name.
    #[error("Binary '{binary}' is already provided by {owner}; refusing to overwrite for {requested_by}")]
    ShimConflict {
        /// Binary/shim name
        binary: String,
        /// Current owner package id
        owner: String,
        /// Package id that asked for the shim
        requested_by: String,
    },

    /// The package is not installed.
    #[error("Package is not installed: {id}")]
    NotInstalled {
        /// Package id
        id: String,
    },

    /// An external command exited unsuccessfully.
    #[error("Command '{command}' failed: {stderr}")]
    CommandFailed {
        /// Command line, for display
        command: String,
        /// Captured stderr (or exit status when stderr is empty)
        stderr: String,
    },

    /// An external command did not finish in time.
    #[error("Command '{command}' timed out after {seconds}s")]
    CommandTimeout {
        /// Command line, for display
        command: String,
        /// Timeout that elapsed
        seconds: u64,
    },

    /// A file lock could not be acquired in time.
    #[error("Timeout acquiring lock '{name}' after {seconds}s")]
    LockTimeout {
        /// Lock name
        name: String,
        /// Timeout that elapsed
        seconds: u64,
    },

    /// Configuration file problems.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// What went wrong
        message: String,
    },

    /// I/O error from [`std::io::Error`].
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error from [`serde_json::Error`].
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// An error paired with optional details and a suggested fix.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: StackpmError,
    /// What the user can try next
    pub suggestion: Option<String>,
    /// Extra explanation of the failure
    pub details: Option<String>,
}

impl ErrorContext {
    /// Wraps an error with no suggestion or details.
    #[must_use]
    pub const fn new(error: StackpmError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Adds a suggestion.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Adds details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Prints the error to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Converts any error into an [`ErrorContext`] with a suggestion where one is known.
///
/// Typed [`StackpmError`]s get targeted advice; `std::io::Error`s are mapped
/// by kind; everything else is wrapped as-is.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let error = match error.downcast::<StackpmError>() {
        Ok(stackpm_error) => return create_error_context(stackpm_error),
        Err(other) => other,
    };

    match error.downcast::<std::io::Error>() {
        Ok(io_error) => {
            let suggestion = match io_error.kind() {
                std::io::ErrorKind::PermissionDenied => {
                    Some("Check ownership of the stackpm home directory and its bins folder")
                }
                std::io::ErrorKind::NotFound => {
                    Some("Check that the file or directory exists and the path is correct")
                }
                _ => None,
            };
            let ctx = ErrorContext::new(StackpmError::IoError(io_error));
            match suggestion {
                Some(s) => ctx.with_suggestion(s),
                None => ctx,
            }
        }
        Err(other) => ErrorContext::new(StackpmError::ConfigError {
            message: format!("{other:#}"),
        }),
    }
}

fn create_error_context(error: StackpmError) -> ErrorContext {
    match &error {
        StackpmError::InvalidPackageId { .. } => ErrorContext::new(error)
            .with_suggestion("Use the form kind:name, e.g. binary:ripgrep or npm:@scope/tool@1.2.0")
            .with_details("Valid kinds are stack, runtime, binary, agent, prompt, and npm"),
        StackpmError::PackageNotFound { .. } => ErrorContext::new(error)
            .with_suggestion("Check the package name and kind, or refresh the registry index"),
        StackpmError::ValidationFailed { .. } => ErrorContext::new(error)
            .with_details("The package manifest is missing fields required by its install source"),
        StackpmError::PlatformNotSupported { .. } => ErrorContext::new(error)
            .with_suggestion("Run with a supported platform or ask the package author to add one"),
        StackpmError::CircularDependency { .. } => ErrorContext::new(error)
            .with_suggestion("Remove one of the requires entries forming the cycle"),
        StackpmError::BinaryNotFound { name, .. } => {
            let suggestion = format!("Install '{name}' with your system package manager first");
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        StackpmError::BinaryNotFunctional { .. } => ErrorContext::new(error)
            .with_suggestion("Reinstall the binary; the file on disk exists but does not run")
            .with_details("The binary failed its `--version` check"),
        StackpmError::ChecksumMismatch { .. } => ErrorContext::new(error)
            .with_suggestion("Retry the install; if it persists, the upstream artifact changed")
            .with_details("Nothing was installed because the download could not be verified"),
        StackpmError::ShimConflict { owner, .. } => {
            let suggestion = format!("Remove {owner} first or retry with override enabled");
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        StackpmError::NotInstalled { .. } | StackpmError::NotRegistered { .. } => {
            ErrorContext::new(error).with_suggestion("List installed packages to check the id")
        }
        StackpmError::LockTimeout { .. } => ErrorContext::new(error)
            .with_suggestion("Another stackpm process may be running; wait for it to finish"),
        _ => ErrorContext::new(error),
    }
}
