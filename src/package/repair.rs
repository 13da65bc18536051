//! Repository repair for distributions whose shipped sources are unusable.
//!
//! Some root filesystems arrive with mirror entries or signing keys that no
//! longer work, so the very first index refresh fails. A
//! [`RepositoryRepair`] recognizes such a guest by a fingerprint probe and
//! rewrites its sources before the refresh is attempted.

use tracing::{info, warn};

use crate::error::WslstrapError;
use crate::guest::GuestShell;

/// One named guest snippet of a repair.
#[derive(Debug)]
pub struct RepairStep {
    pub name: &'static str,
    pub command: &'static str,
}

/// Fingerprint and ordered steps that repair one distribution's repositories.
#[derive(Debug)]
pub struct RepositoryRepair {
    pub distribution: &'static str,
    /// Guest snippet that succeeds iff the repair applies.
    pub fingerprint: &'static str,
    /// Backup of the current configuration; failure only warns.
    pub backup: RepairStep,
    /// Steps after the backup; the first failure aborts the repair.
    pub steps: &'static [RepairStep],
}

/// What [`RepositoryRepair::repair_if_needed`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    /// The fingerprint did not match.
    NotApplicable,
    Repaired,
}

impl RepositoryRepair {
    /// Probes `guest` and applies the repair when the fingerprint matches.
    pub fn repair_if_needed(
        &self,
        shell: &GuestShell,
        guest: &str,
    ) -> Result<RepairOutcome, WslstrapError> {
        if !shell.probe(guest, self.fingerprint) {
            return Ok(RepairOutcome::NotApplicable);
        }

        info!("{} detected in '{}', repairing package repositories", self.distribution, guest);

        if let Err(e) = shell.run(guest, self.backup.command) {
            warn!("{} failed, continuing without backup: {:#}", self.backup.name, e);
        }

        for step in self.steps {
            info!("{}: {}", self.distribution, step.name);
            shell
                .run(guest, step.command)
                .map_err(|e| WslstrapError::RepairFailed {
                    guest: guest.to_string(),
                    step: step.name,
                    message: format!("{:#}", e),
                })?;
        }

        info!("{} repositories repaired in '{}'", self.distribution, guest);
        Ok(RepairOutcome::Repaired)
    }
}

/// Kali images ship a `sources.list` pointing at a mirror layout and keyring
/// that no longer validate.
pub static KALI_REPAIR: RepositoryRepair = RepositoryRepair {
    distribution: "Kali Linux",
    fingerprint: "grep -qi kali /etc/os-release",
    backup: RepairStep {
        name: "back up sources.list",
        command: "sudo cp /etc/apt/sources.list /etc/apt/sources.list.bak",
    },
    steps: &[
        RepairStep {
            name: "rewrite sources.list",
            command: "sudo sed -i -e 's/^deb /# deb /' /etc/apt/sources.list \
                      && echo 'deb [signed-by=/usr/share/keyrings/kali-archive-keyring.gpg] \
                      http://http.kali.org/kali kali-rolling main contrib non-free non-free-firmware' \
                      | sudo tee -a /etc/apt/sources.list > /dev/null",
        },
        RepairStep {
            name: "fetch archive signing key",
            command: "curl -fsSL https://archive.kali.org/archive-key.asc \
                      | sudo gpg --dearmor --yes -o /usr/share/keyrings/kali-archive-keyring.gpg",
        },
        RepairStep {
            name: "refresh package index",
            command: "sudo apt-get update",
        },
        RepairStep {
            name: "install archive keyring",
            command: "sudo DEBIAN_FRONTEND=noninteractive apt-get install -y kali-archive-keyring",
        },
    ],
};
