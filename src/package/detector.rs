//! Package manager detection with a per-guest memo.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use super::registry::{PackageManagerProfile, REGISTRY};
use crate::error::WslstrapError;
use crate::guest::GuestShell;

/// Shared map from guest name to its detected package manager.
///
/// Clones share the same map. Entries are never invalidated: a guest is
/// assumed to keep its package manager for the life of the process.
#[derive(Debug, Clone, Default)]
pub struct DetectionMemo {
    inner: Arc<Mutex<HashMap<String, &'static PackageManagerProfile>>>,
}

impl DetectionMemo {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, &'static PackageManagerProfile>> {
        // The map holds plain references, so a panicked holder cannot leave it torn.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the memoized profile for `guest`.
    pub fn get(&self, guest: &str) -> Option<&'static PackageManagerProfile> {
        self.lock().get(guest).copied()
    }

    /// Records `profile` for `guest` unless another detection got there
    /// first, and returns whichever profile is stored.
    pub fn record(
        &self,
        guest: &str,
        profile: &'static PackageManagerProfile,
    ) -> &'static PackageManagerProfile {
        *self.lock().entry(guest.to_string()).or_insert(profile)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Finds the package manager of a guest by probing for registry binaries.
#[derive(Clone)]
pub struct PackageManagerDetector {
    shell: GuestShell,
    registry: &'static [PackageManagerProfile],
    memo: DetectionMemo,
}

impl PackageManagerDetector {
    /// Creates a detector over the built-in registry.
    pub fn new(shell: GuestShell, memo: DetectionMemo) -> Self {
        Self {
            shell,
            registry: &REGISTRY,
            memo,
        }
    }

    pub fn memo(&self) -> &DetectionMemo {
        &self.memo
    }

    /// Returns the package manager of `guest`.
    ///
    /// Memoized guests are answered without any guest command. Otherwise the
    /// registry is probed in order and the first hit is memoized. Two
    /// concurrent first detections may both probe; the first to finish wins
    /// the memo and both return the same profile.
    pub fn detect(&self, guest: &str) -> Result<&'static PackageManagerProfile, WslstrapError> {
        if let Some(profile) = self.memo.get(guest) {
            debug!("using memoized package manager '{}' for '{}'", profile.kind, guest);
            return Ok(profile);
        }

        for profile in self.registry {
            if self.shell.probe(guest, &profile.detection_probe()) {
                let stored = self.memo.record(guest, profile);
                info!("detected package manager '{}' ({}) in '{}'", stored.kind, stored.description, guest);
                return Ok(stored);
            }
        }

        Err(WslstrapError::NoSupportedManager {
            guest: guest.to_string(),
        })
    }
}
