//! Cross-platform utilities
//!
//! - [`fs`] - atomic writes, JSON files, executability
//! - [`platform`] - platform keys and home directory lookup
//! - [`checksum`] - download digests
//! - [`archive`] - tarball and zip extraction
//! - [`process`] - child processes with timeouts

pub mod archive;
pub mod checksum;
pub mod fs;
pub mod platform;
pub mod process;

pub use fs::{atomic_write, ensure_dir, read_json_file, safe_write, write_json_file};
pub use platform::{get_home_dir, is_windows, platform_arch, resolve_path};
