//! Import, unregister, export and copy of distributions.
//!
//! Each operation validates its inputs before launching any process and,
//! except for import, requires that the distribution already exists.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, warn};

use super::WslClient;
use crate::error::WslstrapError;
use crate::executor::execute_checked;
use crate::paths::absolute;

/// Options for `wsl --import`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    /// Name to register the distribution under.
    pub name: String,
    /// Directory that will hold the distribution's virtual disk.
    pub install_path: Utf8PathBuf,
    /// Root filesystem archive to import.
    pub archive: Utf8PathBuf,
    /// WSL version; `None` or `Some(0)` selects the configured default.
    pub version: Option<u8>,
}

/// Options for `wsl --export`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSpec {
    /// Distribution to export.
    pub name: String,
    /// Archive file to write.
    pub destination: Utf8PathBuf,
}

/// Options for duplicating a distribution under a new name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySpec {
    /// Distribution to copy.
    pub source: String,
    /// Name of the new distribution.
    pub name: String,
    /// Directory that will hold the new distribution's virtual disk.
    pub install_path: Utf8PathBuf,
    /// WSL version of the copy; `None` or `Some(0)` selects the configured default.
    pub version: Option<u8>,
    /// Directory for the intermediate export archive, removed afterwards if empty.
    pub staging_dir: Utf8PathBuf,
}

impl CopySpec {
    /// Path of the intermediate archive.
    pub fn staging_archive(&self) -> Utf8PathBuf {
        self.staging_dir.join(format!("{}-export.tar", self.source))
    }
}

fn require_non_empty(value: &str, what: &str) -> Result<(), WslstrapError> {
    if value.trim().is_empty() {
        return Err(WslstrapError::Validation(format!("{} cannot be empty", what)));
    }
    Ok(())
}

impl WslClient {
    fn require_installed(&self, name: &str) -> Result<(), WslstrapError> {
        if self.is_installed(name)? {
            Ok(())
        } else {
            Err(WslstrapError::NotFound(name.to_string()))
        }
    }

    fn run_wsl(&self, args: Vec<String>) -> Result<(), String> {
        let spec = self.wsl(&args.iter().map(String::as_str).collect::<Vec<_>>());
        execute_checked(self.executor.as_ref(), &spec)
            .map(|_| ())
            .map_err(|e| format!("{:#}", e))
    }

    /// Imports a distribution from a root filesystem archive.
    pub fn import(&self, spec: &ImportSpec) -> Result<(), WslstrapError> {
        require_non_empty(&spec.name, "distribution name")?;
        require_non_empty(spec.install_path.as_str(), "installation path")?;
        require_non_empty(spec.archive.as_str(), "tar file path")?;

        if !spec.archive.exists() {
            return Err(WslstrapError::Validation(format!(
                "tar file does not exist: {}",
                spec.archive
            )));
        }

        fs::create_dir_all(&spec.install_path).map_err(|e| {
            WslstrapError::io(
                format!("failed to create installation directory: {}", spec.install_path),
                e,
            )
        })?;

        if self.is_installed(&spec.name)? {
            return Err(WslstrapError::AlreadyExists(spec.name.clone()));
        }

        let version = match spec.version {
            None | Some(0) => self.default_version,
            Some(v) => v,
        };
        let install_path = absolute(&spec.install_path)?;
        let archive = absolute(&spec.archive)?;

        info!("importing '{}' from {} into {} (WSL {})", spec.name, archive, install_path, version);
        self.run_wsl(vec![
            "--import".to_string(),
            spec.name.clone(),
            install_path.into_string(),
            archive.into_string(),
            "--version".to_string(),
            version.to_string(),
        ])
        .map_err(|message| WslstrapError::ImportFailed {
            name: spec.name.clone(),
            message,
        })
    }

    /// Removes a distribution and its virtual disk.
    pub fn unregister(&self, name: &str) -> Result<(), WslstrapError> {
        require_non_empty(name, "distribution name")?;
        self.require_installed(name)?;

        info!("unregistering '{}'", name);
        self.run_wsl(vec!["--unregister".to_string(), name.to_string()])
            .map_err(|message| WslstrapError::OperationFailed {
                operation: "unregister",
                name: name.to_string(),
                message,
            })
    }

    /// Exports a distribution to a tar archive.
    pub fn export(&self, spec: &ExportSpec) -> Result<(), WslstrapError> {
        require_non_empty(&spec.name, "distribution name")?;
        require_non_empty(spec.destination.as_str(), "output path")?;
        self.require_installed(&spec.name)?;

        if let Some(parent) = spec.destination.parent()
            && !parent.as_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                WslstrapError::io(format!("failed to create output directory: {}", parent), e)
            })?;
        }
        let destination = absolute(&spec.destination)?;

        info!("exporting '{}' to {}", spec.name, destination);
        self.run_wsl(vec![
            "--export".to_string(),
            spec.name.clone(),
            destination.into_string(),
        ])
        .map_err(|message| WslstrapError::OperationFailed {
            operation: "export",
            name: spec.name.clone(),
            message,
        })
    }

    /// Copies a distribution by exporting it and importing the archive under a new name.
    ///
    /// Both names are checked before the export starts. The intermediate
    /// archive is deleted whether or not the import succeeds.
    pub fn copy(&self, spec: &CopySpec) -> Result<(), WslstrapError> {
        require_non_empty(&spec.source, "source distribution name")?;
        require_non_empty(&spec.name, "distribution name")?;
        require_non_empty(spec.install_path.as_str(), "installation path")?;
        if spec.source == spec.name {
            return Err(WslstrapError::Validation(format!(
                "copy of '{}' needs a different name",
                spec.source
            )));
        }
        self.require_installed(&spec.source)?;
        if self.is_installed(&spec.name)? {
            return Err(WslstrapError::AlreadyExists(spec.name.clone()));
        }

        let archive = spec.staging_archive();
        let outcome = self
            .export(&ExportSpec {
                name: spec.source.clone(),
                destination: archive.clone(),
            })
            .and_then(|()| {
                if let Ok(meta) = fs::metadata(&archive) {
                    info!("exported '{}' ({})", spec.source, crate::format_size(meta.len()));
                }
                self.import(&ImportSpec {
                    name: spec.name.clone(),
                    install_path: spec.install_path.clone(),
                    archive: archive.clone(),
                    version: spec.version,
                })
            });

        discard_staging(&archive, &spec.staging_dir);
        outcome
    }
}

/// Deletes the intermediate archive and, when empty, its directory.
fn discard_staging(archive: &Utf8Path, staging_dir: &Utf8Path) {
    if archive.exists()
        && let Err(e) = fs::remove_file(archive)
    {
        warn!("failed to remove staging archive {}: {}", archive, e);
    }
    if let Err(e) = fs::remove_dir(staging_dir) {
        debug!("staging directory {} kept: {}", staging_dir, e);
    }
}
