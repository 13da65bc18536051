//! Playbook execution inside a guest.
//!
//! A run makes sure Ansible is installed, stages a controller-side playbook
//! at a fixed path in the guest (playbooks already in the guest are used in
//! place), and then invokes `ansible-playbook` against `localhost` with the
//! guest's output streamed to the terminal.

pub mod command;
pub mod repo;
pub mod resolver;

use std::collections::BTreeMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::info;

pub use command::{PlaybookInvocation, parse_extra_vars};
pub use repo::RepoCheckout;
pub use resolver::PlaybookResolver;

use crate::config::DEFAULT_GUEST_PLAYBOOK_PATH;
use crate::error::WslstrapError;
use crate::guest::{GuestShell, shell_join};
use crate::package::{CONFIG_TOOL_COMMAND, CONFIG_TOOL_PACKAGE, PackageEngine};

/// Returns the short name used for a playbook in logs and reports.
fn playbook_label(path: &Utf8Path) -> &str {
    path.file_name().unwrap_or(path.as_str())
}

/// Where a playbook lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybookSource {
    /// Controller-side file, copied into the guest before the run.
    Local(Utf8PathBuf),
    /// File already inside the guest, e.g. from a cloned repository.
    InGuest(String),
}

impl PlaybookSource {
    /// Short name used in logs and reports.
    pub fn label(&self) -> &str {
        match self {
            Self::Local(path) => playbook_label(path),
            Self::InGuest(path) => path.rsplit('/').next().unwrap_or(path),
        }
    }
}

impl From<Utf8PathBuf> for PlaybookSource {
    fn from(path: Utf8PathBuf) -> Self {
        Self::Local(path)
    }
}

impl From<&Utf8Path> for PlaybookSource {
    fn from(path: &Utf8Path) -> Self {
        Self::Local(path.to_path_buf())
    }
}

impl From<&str> for PlaybookSource {
    fn from(path: &str) -> Self {
        Self::Local(Utf8PathBuf::from(path))
    }
}

/// One playbook run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybookOptions {
    pub guest: String,
    pub playbook: PlaybookSource,
    pub tags: Vec<String>,
    pub extra_vars: BTreeMap<String, String>,
    pub verbose: bool,
}

impl PlaybookOptions {
    pub fn new(guest: impl Into<String>, playbook: impl Into<PlaybookSource>) -> Self {
        Self {
            guest: guest.into(),
            playbook: playbook.into(),
            tags: Vec::new(),
            extra_vars: BTreeMap::new(),
            verbose: false,
        }
    }
}

/// Runs playbooks inside guests.
#[derive(Clone)]
pub struct PlaybookRunner {
    shell: GuestShell,
    engine: PackageEngine,
    guest_path: String,
}

impl PlaybookRunner {
    pub fn new(shell: GuestShell, engine: PackageEngine) -> Self {
        Self {
            shell,
            engine,
            guest_path: DEFAULT_GUEST_PLAYBOOK_PATH.to_string(),
        }
    }

    /// Sets the staging path inside the guest.
    #[must_use]
    pub fn with_guest_path(mut self, guest_path: impl Into<String>) -> Self {
        self.guest_path = guest_path.into();
        self
    }

    /// Runs one playbook.
    pub fn execute(&self, opts: &PlaybookOptions) -> Result<(), WslstrapError> {
        let label = opts.playbook.label();
        if let PlaybookSource::Local(path) = &opts.playbook
            && !path.is_file()
        {
            return Err(WslstrapError::PlaybookNotFound(path.to_string()));
        }

        self.engine
            .ensure_package(&opts.guest, CONFIG_TOOL_COMMAND, CONFIG_TOOL_PACKAGE)
            .map_err(|e| WslstrapError::AnsibleMissing {
                guest: opts.guest.clone(),
                source: Box::new(e),
            })?;

        let target = match &opts.playbook {
            PlaybookSource::Local(path) => {
                self.stage(&opts.guest, path)?;
                self.guest_path.as_str()
            }
            PlaybookSource::InGuest(path) => path.as_str(),
        };

        let command_line = PlaybookInvocation::new(target)
            .with_tags(opts.tags.clone())
            .with_extra_vars(opts.extra_vars.clone())
            .with_verbose(opts.verbose)
            .to_command_line()?;

        info!("running playbook '{}' in '{}'", label, opts.guest);
        self.shell
            .run(&opts.guest, &command_line)
            .map_err(|e| WslstrapError::ExecutionFailed {
                playbook: label.to_string(),
                guest: opts.guest.clone(),
                message: format!("{:#}", e),
            })?;

        info!("playbook '{}' completed in '{}'", label, opts.guest);
        Ok(())
    }

    /// Copies the playbook contents to the staging path in the guest.
    fn stage(&self, guest: &str, playbook: &Utf8Path) -> Result<(), WslstrapError> {
        let contents = fs::read_to_string(playbook)
            .map_err(|e| WslstrapError::io(format!("failed to read playbook {}", playbook), e))?;

        let target = shell_join([self.guest_path.as_str()])?;
        let script = format!("cat > {target} && chmod 644 {target}");
        self.shell
            .run_with_input(guest, &script, &contents)
            .map_err(|e| WslstrapError::CopyFailed {
                guest: guest.to_string(),
                message: format!("{:#}", e),
            })?;
        Ok(())
    }
}
