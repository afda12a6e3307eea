//! Configuration for stackpm.
//!
//! Only global, per-home settings exist; package manifests come from the
//! registry collaborator rather than from a project file. See [`global`].

pub mod global;

pub use global::GlobalConfig;
