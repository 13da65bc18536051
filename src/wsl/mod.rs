//! Client for the host's WSL command surface.
//!
//! [`WslClient`] lists installed distributions (with a legacy fallback and
//! benign-failure reclassification) and wraps the import/unregister/export
//! lifecycle operations in [`lifecycle`].

pub mod lifecycle;
pub mod listing;

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

pub use lifecycle::{CopySpec, ExportSpec, ImportSpec};
pub use listing::{GuestRecord, GuestState};

use crate::config::{DEFAULT_BENIGN_LISTING_ERRORS, DEFAULT_WSL_COMMAND, Settings};
use crate::error::WslstrapError;
use crate::executor::{CommandExecutor, CommandSpec, ExecutionResult};

/// Decides which double listing failures mean "nothing installed yet".
///
/// The sentinel list is ad hoc: WSL reports the empty state differently
/// across Windows builds, so real errors containing one of these strings
/// are misclassified as empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPolicy {
    benign_errors: Vec<String>,
}

impl Default for ListingPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BENIGN_LISTING_ERRORS.iter().copied())
    }
}

impl ListingPolicy {
    /// Creates a policy from the given sentinel substrings.
    pub fn new<I, S>(benign_errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            benign_errors: benign_errors
                .into_iter()
                .map(|s| s.into().to_lowercase())
                .collect(),
        }
    }

    /// Adds another sentinel substring.
    #[must_use]
    pub fn with_benign_error(mut self, sentinel: impl Into<String>) -> Self {
        self.benign_errors.push(sentinel.into().to_lowercase());
        self
    }

    /// Returns the sentinel that matches `text` (case-insensitively), if any.
    pub fn matching_sentinel(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        self.benign_errors
            .iter()
            .find(|sentinel| lowered.contains(sentinel.as_str()))
            .map(String::as_str)
    }
}

/// A failed listing attempt, reduced to the text used for classification.
struct ListingFailure {
    stderr: String,
    reason: String,
}

impl ListingFailure {
    fn from_outcome(outcome: Result<ExecutionResult>) -> Self {
        match outcome {
            Ok(result) => Self {
                stderr: listing::strip_noise(&result.stderr).trim().to_string(),
                reason: result
                    .failure_reason()
                    .unwrap_or_else(|| "unknown failure".to_string()),
            },
            Err(e) => Self {
                stderr: String::new(),
                reason: format!("{:#}", e),
            },
        }
    }

    fn describe(&self) -> String {
        if self.stderr.is_empty() {
            self.reason.clone()
        } else {
            format!("{} ({})", self.reason, self.stderr)
        }
    }
}

/// Wrapper around the host's `wsl.exe`.
#[derive(Clone)]
pub struct WslClient {
    executor: Arc<dyn CommandExecutor>,
    wsl_command: String,
    policy: ListingPolicy,
    default_version: u8,
}

impl WslClient {
    /// Creates a client with default settings.
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            wsl_command: DEFAULT_WSL_COMMAND.to_string(),
            policy: ListingPolicy::default(),
            default_version: 2,
        }
    }

    /// Creates a client configured from `settings`.
    pub fn from_settings(executor: Arc<dyn CommandExecutor>, settings: &Settings) -> Self {
        Self {
            executor,
            wsl_command: settings.wsl_command.clone(),
            policy: ListingPolicy::new(settings.benign_listing_errors.iter().cloned()),
            default_version: settings.default_version,
        }
    }

    /// Replaces the listing failure policy.
    #[must_use]
    pub fn with_listing_policy(mut self, policy: ListingPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn wsl(&self, args: &[&str]) -> CommandSpec {
        CommandSpec::new(
            self.wsl_command.as_str(),
            args.iter().map(|a| a.to_string()).collect(),
        )
    }

    /// Verifies that WSL is installed and responding.
    pub fn check_available(&self) -> Result<(), WslstrapError> {
        match self.executor.execute(&self.wsl(&["--status"])) {
            Ok(result) if result.success() => Ok(()),
            outcome => Err(WslstrapError::EnvironmentUnavailable(
                ListingFailure::from_outcome(outcome).describe(),
            )),
        }
    }

    /// Lists installed distributions.
    ///
    /// Runs `wsl -l -v`; if that fails, retries once with the legacy
    /// `wsl -l`. If both fail and the combined error text contains a benign
    /// sentinel, the result is an empty list.
    pub fn list_installed(&self) -> Result<Vec<GuestRecord>, WslstrapError> {
        let primary = match self.executor.execute(&self.wsl(&["-l", "-v"])) {
            Ok(result) if result.success() => return Ok(listing::parse_verbose(&result.stdout)),
            outcome => ListingFailure::from_outcome(outcome),
        };
        debug!("verbose listing failed ({}), trying legacy listing", primary.describe());

        let fallback = match self.executor.execute(&self.wsl(&["-l"])) {
            Ok(result) if result.success() => return Ok(listing::parse_legacy(&result.stdout)),
            outcome => ListingFailure::from_outcome(outcome),
        };

        let combined = [
            primary.stderr.as_str(),
            fallback.stderr.as_str(),
            primary.reason.as_str(),
            fallback.reason.as_str(),
        ]
        .join("\n");
        if let Some(sentinel) = self.policy.matching_sentinel(&combined) {
            warn!("listing failed with benign indicator '{}', treating as empty", sentinel);
            return Ok(Vec::new());
        }

        Err(WslstrapError::Listing {
            primary: primary.describe(),
            fallback: fallback.describe(),
        })
    }

    /// Returns the record for `name`, if installed.
    pub fn find(&self, name: &str) -> Result<Option<GuestRecord>, WslstrapError> {
        Ok(self
            .list_installed()?
            .into_iter()
            .find(|record| record.name == name))
    }

    /// Returns true if a distribution called `name` is installed.
    pub fn is_installed(&self, name: &str) -> Result<bool, WslstrapError> {
        Ok(self.find(name)?.is_some())
    }
}
