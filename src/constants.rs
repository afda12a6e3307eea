//! Global constants used throughout the stackpm codebase.
//!
//! Timeouts, retry parameters, file names, and default search paths live
//! here so the numbers are discoverable in one place.

use std::time::Duration;

/// Default timeout for file lock acquisition (30 seconds).
pub fn default_lock_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Maximum backoff delay for exponential backoff (500ms).
pub const MAX_BACKOFF_DELAY_MS: u64 = 500;

/// Starting delay for exponential backoff (10ms).
pub const STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Default timeout for child processes such as `npm install` (10 minutes).
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 600;

/// Timeout for `--version` functional checks and detect commands (15 seconds).
pub const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(15);

/// Name of the installed package record inside each package directory.
pub const PACKAGE_RECORD_FILE: &str = "manifest.json";

/// Name of the shim ownership registry document under the stackpm home.
pub const SHIM_REGISTRY_FILE: &str = "shims.json";

/// Directory under the stackpm home that holds shims.
pub const BINS_DIR: &str = "bins";

/// Directory under the stackpm home that holds lock files.
pub const LOCKS_DIR: &str = ".locks";

/// Name of the global configuration file under the stackpm home.
pub const CONFIG_FILE: &str = "config.toml";

/// Environment variable overriding the stackpm home directory.
pub const HOME_ENV_VAR: &str = "STACKPM_HOME";

/// Environment variable overriding the configuration file path.
pub const CONFIG_ENV_VAR: &str = "STACKPM_CONFIG";

/// Executable search order used when probing for system binaries.
///
/// Homebrew prefixes come first so a user-managed install shadows the
/// vendor copy in `/usr/bin`.
pub const DEFAULT_SYSTEM_SEARCH_PATHS: [&str; 5] = [
    "/opt/homebrew/bin",
    "/home/linuxbrew/.linuxbrew/bin",
    "/usr/local/bin",
    "/usr/bin",
    "/bin",
];
