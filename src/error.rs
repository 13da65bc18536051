//! Domain-specific error types for wslstrap.
//!
//! This module defines `WslstrapError`, a `thiserror`-based enum that
//! provides typed error variants for every failure mode of the provisioning
//! core. Public API functions return `Result<T, WslstrapError>` for
//! programmatic error handling, while the [`CommandExecutor`] trait boundary
//! continues to use `anyhow::Result`.
//!
//! `WslstrapError` implements `Into<anyhow::Error>`, so the `?` operator
//! converts it automatically at boundaries that return `anyhow::Result`.
//!
//! [`CommandExecutor`]: crate::executor::CommandExecutor

use std::io;
use std::time::Duration;

use strum::Display;

use crate::summary::ExecutionSummary;

/// Formats an IO error kind into a human-readable message.
///
/// Provides consistent, user-friendly messages for common IO error kinds
/// (e.g., "I/O error: not found") instead of the OS-level messages
/// (e.g., "No such file or directory (os error 2)"). For unrecognized
/// error kinds, falls back to including the OS-level error message.
pub(crate) fn io_error_kind_message(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => "I/O error: not found".to_string(),
        io::ErrorKind::PermissionDenied => "I/O error: permission denied".to_string(),
        io::ErrorKind::IsADirectory => "I/O error: is a directory".to_string(),
        _ => format!("I/O error: {}", err),
    }
}

/// Stage of the package engine at which an installation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum PackageStage {
    /// No package manager could be detected.
    Detection,
    /// Refreshing the package index failed (after the single retry).
    Refresh,
    /// A required pre-install step failed.
    PreInstall,
    /// The install command itself failed.
    Install,
    /// A post-install step failed.
    PostInstall,
}

/// Domain-specific error type for wslstrap.
///
/// Each variant carries enough context (guest, package, stage, step) to
/// form an actionable message without further wrapping.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WslstrapError {
    /// A validation constraint was violated before any process was launched.
    #[error("validation error: {0}")]
    Validation(String),

    /// A command execution failed (non-zero exit, spawn failure, wait failure, etc.).
    #[error("command execution failed: {command}: {status}")]
    Execution {
        /// The command that was executed.
        command: String,
        /// Human-readable reason for the failure.
        status: String,
    },

    /// The requested command was not found in PATH.
    #[error("command not found in PATH: {command}")]
    CommandNotFound {
        /// The command that was looked up.
        command: String,
    },

    /// A command did not finish before the configured deadline and was killed.
    #[error("command timed out after {timeout:?}: {command}")]
    Timeout {
        /// The command that was executed.
        command: String,
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// A configuration file could not be loaded or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The virtualization subsystem itself is not reachable.
    #[error("WSL is not installed or not available: {0}")]
    EnvironmentUnavailable(String),

    /// Both listing commands failed and the failure was not recognized as benign.
    #[error("failed to list WSL distributions: {primary} | fallback: {fallback}")]
    Listing {
        /// Failure of the verbose listing command.
        primary: String,
        /// Failure of the legacy listing command.
        fallback: String,
    },

    /// The named distribution is not registered.
    #[error("distribution '{0}' does not exist")]
    NotFound(String),

    /// A distribution with this name is already registered.
    #[error("distribution '{0}' already exists")]
    AlreadyExists(String),

    /// `wsl --import` failed.
    #[error("failed to import distribution '{name}': {message}")]
    ImportFailed {
        /// Name of the distribution being imported.
        name: String,
        /// Failure description including captured stderr.
        message: String,
    },

    /// `wsl --unregister` or `wsl --export` failed.
    #[error("failed to {operation} distribution '{name}': {message}")]
    OperationFailed {
        /// Operation label (e.g., "unregister", "export").
        operation: &'static str,
        /// Name of the distribution.
        name: String,
        /// Failure description including captured stderr.
        message: String,
    },

    /// Every registered package manager probe failed for the guest.
    #[error("could not detect a supported package manager in distribution '{guest}'")]
    NoSupportedManager {
        /// The guest that was probed.
        guest: String,
    },

    /// The package engine failed at a specific stage.
    #[error("{stage} failed for package '{package}' in '{guest}': {message}")]
    Package {
        /// The stage that failed.
        stage: PackageStage,
        /// The package being ensured or installed.
        package: String,
        /// The guest being provisioned.
        guest: String,
        /// Failure description.
        message: String,
    },

    /// A repository repair step failed; the remaining steps were not run.
    #[error("repository repair failed in '{guest}' at step '{step}': {message}")]
    RepairFailed {
        /// The guest being repaired.
        guest: String,
        /// Name of the failing step.
        step: &'static str,
        /// Failure description.
        message: String,
    },

    /// The playbook does not exist on the controller side.
    #[error("playbook file '{0}' not found")]
    PlaybookNotFound(String),

    /// Staging the playbook inside the guest failed.
    #[error("failed to copy playbook to '{guest}': {message}")]
    CopyFailed {
        /// The target guest.
        guest: String,
        /// Failure description.
        message: String,
    },

    /// The configuration-management tool could not be ensured.
    #[error("failed to ensure Ansible is installed in '{guest}'")]
    AnsibleMissing {
        /// The target guest.
        guest: String,
        /// The underlying package engine failure.
        #[source]
        source: Box<WslstrapError>,
    },

    /// git could not be ensured before cloning a playbook repository.
    #[error("failed to ensure git is installed in '{guest}'")]
    GitMissing {
        /// The target guest.
        guest: String,
        /// The underlying package engine failure.
        #[source]
        source: Box<WslstrapError>,
    },

    /// Cloning a playbook repository inside the guest failed.
    #[error("failed to clone repository '{url}' in '{guest}': {message}")]
    CloneFailed {
        /// Repository URL.
        url: String,
        /// The target guest.
        guest: String,
        /// Failure description.
        message: String,
    },

    /// A cloned repository has none of the expected entry playbooks.
    #[error("no playbook found in repository '{url}' (looked for: {searched})")]
    RepoPlaybookMissing {
        /// Repository URL.
        url: String,
        /// Comma-separated entry playbook names that were tried.
        searched: String,
    },

    /// The playbook run exited unsuccessfully.
    #[error("playbook '{playbook}' execution failed in '{guest}': {message}")]
    ExecutionFailed {
        /// Playbook label.
        playbook: String,
        /// The target guest.
        guest: String,
        /// Failure description.
        message: String,
    },

    /// At least one playbook in the pipeline failed.
    #[error("provisioning completed with failures ({} of {} playbook(s) failed)", .summary.failure_count(), .summary.len())]
    PipelineFailed {
        /// The full execution summary up to and including the failure.
        summary: ExecutionSummary,
    },

    /// An I/O operation failed with contextual information.
    #[error("{context}: {message}")]
    Io {
        /// What was being done when the error occurred.
        context: String,
        /// Human-readable description derived from [`io_error_kind_message`].
        message: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl WslstrapError {
    /// Creates an `Io` variant with the `message` field automatically derived
    /// from the `source` via [`io_error_kind_message`].
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            message: io_error_kind_message(&source),
            source,
        }
    }
}
