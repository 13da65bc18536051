//! Ensures packages are present in a guest.
//!
//! [`PackageEngine::ensure_package`] is cheap when the package is already
//! installed: it issues a single presence probe (plus the follow-up check
//! for the configuration tool where the manager declares one). Only a miss
//! triggers detection, repository repair, index refresh and installation.

use tracing::{info, warn};

use super::detector::{DetectionMemo, PackageManagerDetector};
use super::registry::{CONFIG_TOOL_PACKAGE, PackageManagerProfile, PostInstall};
use super::repair::RepairOutcome;
use crate::error::{PackageStage, WslstrapError};
use crate::guest::{GuestShell, shell_join};

/// Installs packages through the guest's detected package manager.
#[derive(Clone)]
pub struct PackageEngine {
    shell: GuestShell,
    detector: PackageManagerDetector,
}

fn stage_error(stage: PackageStage, package: &str, guest: &str, err: impl std::fmt::Display) -> WslstrapError {
    WslstrapError::Package {
        stage,
        package: package.to_string(),
        guest: guest.to_string(),
        message: err.to_string(),
    }
}

impl PackageEngine {
    /// Creates an engine whose detector shares `memo`.
    pub fn new(shell: GuestShell, memo: DetectionMemo) -> Self {
        let detector = PackageManagerDetector::new(shell.clone(), memo);
        Self { shell, detector }
    }

    /// Returns true if `command` resolves on the guest's `PATH`.
    pub fn is_command_available(&self, guest: &str, command: &str) -> Result<bool, WslstrapError> {
        let probe = shell_join(["command", "-v", command])?;
        Ok(self.shell.probe(guest, &probe))
    }

    /// Makes sure `package` (providing `command`) is installed in `guest`.
    pub fn ensure_package(&self, guest: &str, command: &str, package: &str) -> Result<(), WslstrapError> {
        if self.is_command_available(guest, command)? {
            info!("'{}' is already available in '{}'", command, guest);
            return self.ensure_follow_up(guest, package);
        }

        info!("'{}' not found in '{}', installing '{}'", command, guest, package);
        let profile = self
            .detector
            .detect(guest)
            .map_err(|e| stage_error(PackageStage::Detection, package, guest, e))?;

        let mut refresh_needed = true;
        if let Some(repair) = profile.repair
            && repair.repair_if_needed(&self.shell, guest)? == RepairOutcome::Repaired
        {
            // The repair ends with its own index refresh.
            refresh_needed = false;
        }
        if refresh_needed {
            self.refresh_index(guest, profile, package)?;
        }

        self.install_with(guest, profile, package)
    }

    /// Installs `package` in `guest` without a presence check.
    pub fn install_package(&self, guest: &str, package: &str) -> Result<(), WslstrapError> {
        let profile = self
            .detector
            .detect(guest)
            .map_err(|e| stage_error(PackageStage::Detection, package, guest, e))?;
        self.install_with(guest, profile, package)
    }

    fn install_with(
        &self,
        guest: &str,
        profile: &PackageManagerProfile,
        package: &str,
    ) -> Result<(), WslstrapError> {
        for step in profile.pre_install {
            self.shell
                .run(guest, step)
                .map_err(|e| stage_error(PackageStage::PreInstall, package, guest, format!("{:#}", e)))?;
        }

        let name = profile.package_name(package);
        if name != package {
            info!("{} provides '{}' as '{}'", profile.kind, package, name);
        }
        let install = profile.install_command(package)?;
        self.shell
            .run(guest, &install)
            .map_err(|e| stage_error(PackageStage::Install, package, guest, format!("{:#}", e)))?;

        if let Some(post) = profile.post_install_for(package) {
            self.run_post_install(guest, package, post)?;
        }

        info!("installed '{}' in '{}' with {}", name, guest, profile.kind);
        Ok(())
    }

    /// Refreshes the package index, retrying once after a corrective action.
    fn refresh_index(
        &self,
        guest: &str,
        profile: &PackageManagerProfile,
        package: &str,
    ) -> Result<(), WslstrapError> {
        let Some(update) = profile.update_command() else {
            return Ok(());
        };
        let update = update?;

        let Err(first) = self.shell.run(guest, &update) else {
            return Ok(());
        };
        warn!("package index refresh failed in '{}': {:#}", guest, first);

        if let Some(recovery) = profile.update_recovery
            && let Err(e) = self.shell.run(guest, recovery)
        {
            warn!("corrective action before retry failed: {:#}", e);
        }

        self.shell
            .run(guest, &update)
            .map_err(|e| stage_error(PackageStage::Refresh, package, guest, format!("{:#}", e)))
    }

    /// Runs the follow-up for an already installed package when its check fails.
    fn ensure_follow_up(&self, guest: &str, package: &str) -> Result<(), WslstrapError> {
        if package != CONFIG_TOOL_PACKAGE {
            return Ok(());
        }

        let profile = match self.detector.detect(guest) {
            Ok(profile) => profile,
            Err(e) => {
                warn!("skipping follow-up check for '{}': {}", package, e);
                return Ok(());
            }
        };
        let Some(post) = profile.post_install_for(package) else {
            return Ok(());
        };
        if self.shell.probe(guest, post.check) {
            return Ok(());
        }

        info!("'{}' is installed in '{}' but its follow-up is missing", package, guest);
        self.run_post_install(guest, package, post)
    }

    fn run_post_install(&self, guest: &str, package: &str, post: &PostInstall) -> Result<(), WslstrapError> {
        for step in post.steps {
            self.shell
                .run(guest, step)
                .map_err(|e| stage_error(PackageStage::PostInstall, package, guest, format!("{:#}", e)))?;
        }
        Ok(())
    }
}
