//! Playbooks taken from a git repository cloned inside the guest.

use tracing::{debug, info};

use crate::config::DEFAULT_REPO_CHECKOUT_PATH;
use crate::error::WslstrapError;
use crate::guest::{GuestShell, shell_join};
use crate::package::PackageEngine;

/// Entry playbooks looked for at the repository root, in order.
pub const ENTRY_PLAYBOOKS: &[&str] = &["site.yml", "main.yml", "playbook.yml", "default.yml"];

const GIT_COMMAND: &str = "git";
const GIT_PACKAGE: &str = "git";

/// Clones playbook repositories into a guest.
#[derive(Clone)]
pub struct RepoCheckout {
    shell: GuestShell,
    engine: PackageEngine,
    checkout_path: String,
}

impl RepoCheckout {
    pub fn new(shell: GuestShell, engine: PackageEngine) -> Self {
        Self {
            shell,
            engine,
            checkout_path: DEFAULT_REPO_CHECKOUT_PATH.to_string(),
        }
    }

    /// Sets the checkout directory inside the guest.
    #[must_use]
    pub fn with_checkout_path(mut self, checkout_path: impl Into<String>) -> Self {
        self.checkout_path = checkout_path.into();
        self
    }

    /// Clones `url` into the guest and returns the guest path of its entry playbook.
    ///
    /// git is installed first if missing. A previous checkout at the same
    /// path is replaced.
    pub fn checkout(&self, guest: &str, url: &str) -> Result<String, WslstrapError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(WslstrapError::Validation("repository URL cannot be empty".to_string()));
        }

        self.engine
            .ensure_package(guest, GIT_COMMAND, GIT_PACKAGE)
            .map_err(|e| WslstrapError::GitMissing {
                guest: guest.to_string(),
                source: Box::new(e),
            })?;

        let script = format!(
            "{} && {}",
            shell_join(["rm", "-rf", self.checkout_path.as_str()])?,
            shell_join([GIT_COMMAND, "clone", "--", url, self.checkout_path.as_str()])?
        );
        info!("cloning {} into '{}'", url, guest);
        self.shell
            .run(guest, &script)
            .map_err(|e| WslstrapError::CloneFailed {
                url: url.to_string(),
                guest: guest.to_string(),
                message: format!("{:#}", e),
            })?;

        self.entry_playbook(guest, url)
    }

    fn entry_playbook(&self, guest: &str, url: &str) -> Result<String, WslstrapError> {
        let root = self.checkout_path.trim_end_matches('/');
        for name in ENTRY_PLAYBOOKS {
            let path = format!("{}/{}", root, name);
            if self.shell.probe(guest, &shell_join(["test", "-f", path.as_str()])?) {
                debug!("using entry playbook {} from {}", path, url);
                return Ok(path);
            }
        }
        Err(WslstrapError::RepoPlaybookMissing {
            url: url.to_string(),
            searched: ENTRY_PLAYBOOKS.join(", "),
        })
    }
}
