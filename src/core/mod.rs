//! Core types shared across stackpm
//!
//! - [`error`] - [`StackpmError`], [`ErrorContext`], and [`user_friendly_error`]
//! - [`package`] - package identifiers and kinds

pub mod error;
pub mod package;

pub use error::{ErrorContext, StackpmError, user_friendly_error};
pub use package::{
    NpmSpec, PackageId, PackageKind, create_package_id, parse_package_id, sanitize_name,
};
