//! Command execution abstraction for wslstrap.
//!
//! This module provides:
//! - [`CommandSpec`]: Specification for commands to execute
//! - [`ExecutionResult`]: Result of command execution with captured output
//! - [`CommandExecutor`]: Trait for command execution strategies
//! - [`RealCommandExecutor`]: Production implementation using `std::process::Command`
//!
//! Every component of the provisioning core talks to external processes
//! exclusively through [`CommandExecutor`], so tests can substitute a
//! recording double.

mod pipe;
mod real;

use std::process::ExitStatus;

use anyhow::Result;

pub use real::RealCommandExecutor;

/// Formats string arguments into a space-separated, debug-quoted string.
///
/// Used by error messages and trace output to consistently format
/// command arguments (e.g., `"-d" "Ubuntu" "bash"`).
pub(crate) fn format_command_args(args: &[String]) -> String {
    args.iter()
        .map(|a| format!("{:?}", a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// How the child's stdout/stderr are connected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Collect stdout/stderr into the [`ExecutionResult`].
    #[default]
    Capture,
    /// Connect stdin/stdout/stderr to the controller's own standard streams.
    Inherit,
}

/// Specification for a command to be executed
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// The command to execute (e.g., "wsl.exe")
    pub command: String,
    /// Command arguments
    pub args: Vec<String>,
    /// Data written to the child's stdin (optional)
    pub stdin: Option<String>,
    /// Output handling
    pub output: OutputMode,
}

impl CommandSpec {
    /// Creates a new CommandSpec with command and args
    #[must_use]
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            stdin: None,
            output: OutputMode::Capture,
        }
    }

    /// Sets the data to feed into the child's stdin
    #[must_use]
    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    /// Streams the child's output to the controller's terminal instead of capturing it
    #[must_use]
    pub fn inherit_output(mut self) -> Self {
        self.output = OutputMode::Inherit;
        self
    }

    /// Returns the full command line as a single display string.
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// Result of command execution
#[derive(Debug, Default)]
pub struct ExecutionResult {
    /// Exit status of the command (None in dry-run mode)
    pub status: Option<ExitStatus>,
    /// Captured stdout (empty when output was inherited)
    pub stdout: String,
    /// Captured stderr (empty when output was inherited)
    pub stderr: String,
}

impl ExecutionResult {
    /// Builds the synthesized result returned in dry-run mode.
    pub fn dry_run(spec: &CommandSpec) -> Self {
        Self {
            status: None,
            stdout: format!("[dry-run] {}", spec.command_line()),
            stderr: String::new(),
        }
    }

    /// Returns true if the command executed successfully.
    ///
    /// In dry-run mode (status is None), this always returns true.
    pub fn success(&self) -> bool {
        self.status.is_none_or(|s| s.success())
    }

    /// Returns the exit code if available
    pub fn code(&self) -> Option<i32> {
        self.status.and_then(|s| s.code())
    }

    /// Describes why the command failed, or `None` if it succeeded.
    ///
    /// Negative exit codes (as reported for Windows `HRESULT` style failures)
    /// are also rendered in their 32-bit hexadecimal form, e.g.
    /// `exit status: -1 (0xffffffff)`.
    pub fn failure_reason(&self) -> Option<String> {
        if self.success() {
            return None;
        }
        let reason = match self.code() {
            Some(code) if code < 0 => format!("exit status: {} ({:#010x})", code, code as u32),
            Some(code) => format!("exit status: {}", code),
            None => match self.status {
                Some(status) => status.to_string(),
                None => "unknown (no status available)".to_string(),
            },
        };
        Some(reason)
    }
}

/// Trait for command execution.
///
/// Implementations must be `Send + Sync` so a single executor can be shared
/// as `Arc<dyn CommandExecutor>` by every component of the core.
///
/// A returned `Err` means the process could not be run to completion (not
/// found, spawn failure, timeout). A process that ran and exited non-zero is
/// reported as `Ok` with a failing [`ExecutionResult::status`].
pub trait CommandExecutor: Send + Sync {
    /// Executes a command with the given specification.
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult>;
}

/// Executes `spec` and converts a non-zero exit into an error.
///
/// The error message carries the exit reason followed by any captured
/// stderr, so callers can wrap it into a typed error with full context.
pub fn execute_checked(
    executor: &dyn CommandExecutor,
    spec: &CommandSpec,
) -> Result<ExecutionResult> {
    let result = executor.execute(spec)?;
    if let Some(reason) = result.failure_reason() {
        let stderr = result.stderr.trim();
        let status = if stderr.is_empty() {
            reason
        } else {
            format!("{}\nOutput: {}", reason, stderr)
        };
        return Err(crate::error::WslstrapError::Execution {
            command: format!("{} {}", spec.command, format_command_args(&spec.args)),
            status,
        }
        .into());
    }
    Ok(result)
}
