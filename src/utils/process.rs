//! Child process execution with timeouts.
//!
//! [`ProcessCommand`] wraps `tokio::process::Command` with captured output,
//! a timeout, and typed errors. Timed-out children are killed.
//!
//! ```rust,no_run
//! use stackpm::utils::process::ProcessCommand;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let output = ProcessCommand::new("npm")
//!     .args(["install", "--prefix", "/tmp/pkg", "cowsay@latest"])
//!     .timeout(Duration::from_secs(300))
//!     .with_context("npm:cowsay")
//!     .execute()
//!     .await?;
//! println!("{}", output.stdout);
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::core::StackpmError;

/// Captured output of a successful command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Standard output, lossily decoded
    pub stdout: String,
    /// Standard error, lossily decoded
    pub stderr: String,
}

impl CommandOutput {
    /// Stdout followed by stderr. Some tools print `--version` on stderr.
    #[must_use]
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Builder for one child process invocation.
#[derive(Debug, Clone)]
pub struct ProcessCommand {
    program: OsString,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    env_vars: Vec<(OsString, OsString)>,
    timeout_duration: Option<Duration>,
    context: Option<String>,
}

impl ProcessCommand {
    /// A command for `program` with no arguments and no timeout.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env_vars: Vec::new(),
            timeout_duration: None,
            context: None,
        }
    }

    /// Parses a whitespace-separated command line such as `sqlite3 --version`.
    ///
    /// No shell is involved, so quoting and globbing are not interpreted.
    #[must_use]
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program).args(parts))
    }

    /// Adds one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Runs the command in `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Sets an environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Kills the child and fails after `duration`.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout_duration = Some(duration);
        self
    }

    /// Label included in log lines, usually a package id.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The command line as it would be typed, for messages.
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|s| s.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Runs the command to completion.
    ///
    /// # Errors
    ///
    /// - [`StackpmError::CommandTimeout`] when the timeout elapses
    /// - [`StackpmError::CommandFailed`] on a non-zero exit
    /// - an I/O error when the program cannot be spawned
    pub async fn execute(self) -> Result<CommandOutput> {
        let command_line = self.display();
        let context = self.context.as_deref().unwrap_or("-");
        debug!(context, command = %command_line, "Executing command");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }

        let output_future = cmd.output();
        let output = match self.timeout_duration {
            Some(duration) => match timeout(duration, output_future).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(context, command = %command_line, seconds = duration.as_secs(), "Command timed out");
                    return Err(StackpmError::CommandTimeout {
                        command: command_line,
                        seconds: duration.as_secs(),
                    }
                    .into());
                }
            },
            None => output_future.await,
        }
        .with_context(|| format!("Failed to execute {command_line}"))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            debug!(context, code = ?output.status.code(), "Command failed");
            return Err(StackpmError::CommandFailed {
                command: command_line,
                stderr: if stderr.is_empty() { stdout } else { stderr },
            }
            .into());
        }

        trace!(context, "Command completed successfully");
        Ok(CommandOutput { stdout, stderr })
    }
}
