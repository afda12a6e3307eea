//! Unit test suite for stackpm's public API.
//!
//! Pure functions only: no filesystem, no processes.

mod package_id_tests;
mod version_tests;
