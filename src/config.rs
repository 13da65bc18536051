//! Settings file for wslstrap.
//!
//! Settings are optional: every field has a default, and a missing
//! `--config` flag yields [`Settings::default()`]. When a file is given it is
//! parsed as YAML with unknown keys rejected, then validated.

use std::fs::File;
use std::io::BufReader;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use tracing::debug;

use crate::error::WslstrapError;

/// Default host binary for the virtualization subsystem.
pub const DEFAULT_WSL_COMMAND: &str = "wsl.exe";

/// Default staging path for playbooks inside the guest.
pub const DEFAULT_GUEST_PLAYBOOK_PATH: &str = "/tmp/wslstrap-playbook.yml";

/// Default checkout directory inside the guest for `provision --repo`.
pub const DEFAULT_REPO_CHECKOUT_PATH: &str = "/tmp/wslstrap-playbooks";

/// Error substrings that mark a double listing failure as "nothing installed yet".
///
/// `0xffffffff` is the generic failure WSL reports before the first
/// distribution is registered; "element not found" shows up when optional
/// components are missing.
pub const DEFAULT_BENIGN_LISTING_ERRORS: &[&str] =
    &["0xffffffff", "element not found", "no installed distributions"];

fn default_wsl_command() -> String {
    DEFAULT_WSL_COMMAND.to_string()
}

fn default_version() -> u8 {
    2
}

fn default_playbook_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(".")
}

fn default_guest_playbook_path() -> String {
    DEFAULT_GUEST_PLAYBOOK_PATH.to_string()
}

fn default_repo_checkout_path() -> String {
    DEFAULT_REPO_CHECKOUT_PATH.to_string()
}

fn default_benign_listing_errors() -> Vec<String> {
    DEFAULT_BENIGN_LISTING_ERRORS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Tool-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Host binary used to talk to WSL.
    #[serde(default = "default_wsl_command")]
    pub wsl_command: String,
    /// Per-process timeout in seconds (none by default).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// WSL version used by import when none is requested.
    #[serde(default = "default_version")]
    pub default_version: u8,
    /// Directory containing the `playbooks/` alias folder.
    #[serde(default = "default_playbook_dir")]
    pub playbook_dir: Utf8PathBuf,
    /// Fixed path inside the guest where playbooks are staged.
    #[serde(default = "default_guest_playbook_path")]
    pub guest_playbook_path: String,
    /// Directory inside the guest where playbook repositories are cloned.
    #[serde(default = "default_repo_checkout_path")]
    pub repo_checkout_path: String,
    /// Case-insensitive substrings reclassifying a listing failure as empty.
    #[serde(default = "default_benign_listing_errors")]
    pub benign_listing_errors: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            wsl_command: default_wsl_command(),
            timeout_secs: None,
            default_version: default_version(),
            playbook_dir: default_playbook_dir(),
            guest_playbook_path: default_guest_playbook_path(),
            repo_checkout_path: default_repo_checkout_path(),
            benign_listing_errors: default_benign_listing_errors(),
        }
    }
}

impl Settings {
    /// Returns the configured per-process timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Validates the settings.
    pub fn validate(&self) -> Result<(), WslstrapError> {
        if self.wsl_command.trim().is_empty() {
            return Err(WslstrapError::Validation("wsl_command must not be empty".to_string()));
        }
        if !matches!(self.default_version, 1 | 2) {
            return Err(WslstrapError::Validation(format!(
                "default_version must be 1 or 2, got {}",
                self.default_version
            )));
        }
        if self.timeout_secs == Some(0) {
            return Err(WslstrapError::Validation(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        for (field, path) in [
            ("guest_playbook_path", &self.guest_playbook_path),
            ("repo_checkout_path", &self.repo_checkout_path),
        ] {
            if !path.starts_with('/') {
                return Err(WslstrapError::Validation(format!(
                    "{} must be absolute (start with '/'): {}",
                    field, path
                )));
            }
        }
        if self.repo_checkout_path.trim_end_matches('/').is_empty() {
            return Err(WslstrapError::Validation(
                "repo_checkout_path must not be the root directory".to_string(),
            ));
        }
        if self
            .benign_listing_errors
            .iter()
            .any(|s| s.trim().is_empty())
        {
            return Err(WslstrapError::Validation(
                "benign_listing_errors must not contain empty entries".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads settings from a YAML file.
pub fn load_settings(path: &Utf8Path) -> Result<Settings, WslstrapError> {
    let file = File::open(path).map_err(|e| WslstrapError::io(path.as_str(), e))?;
    let reader = BufReader::new(file);
    let settings: Settings = serde_yaml::from_reader(reader)
        .map_err(|e| WslstrapError::Config(format!("failed to parse {}: {}", path, e)))?;
    debug!("loaded settings from {}: {:?}", path, settings);
    Ok(settings)
}

/// Loads settings from `path` if given, otherwise returns the defaults; validates either way.
pub fn resolve_settings(path: Option<&Utf8Path>) -> Result<Settings, WslstrapError> {
    let settings = match path {
        Some(path) => load_settings(path)?,
        None => Settings::default(),
    };
    settings.validate()?;
    Ok(settings)
}
