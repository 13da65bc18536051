//! Guest package management.
//!
//! - [`registry`]: ordered table of supported package managers
//! - [`detector`]: per-guest detection with a shared memo
//! - [`repair`]: distribution-specific repository repair
//! - [`engine`]: ensure/install with refresh retry and follow-up steps

pub mod detector;
pub mod engine;
pub mod registry;
pub mod repair;

pub use detector::{DetectionMemo, PackageManagerDetector};
pub use engine::PackageEngine;
pub use registry::{
    CONFIG_TOOL_COMMAND, CONFIG_TOOL_PACKAGE, PackageManagerKind, PackageManagerProfile, REGISTRY,
};
pub use repair::{KALI_REPAIR, RepairOutcome, RepositoryRepair};
