//! Path helpers shared by the lifecycle client and the playbook resolver.

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::WslstrapError;

/// Makes `path` absolute against the current directory without touching the filesystem.
pub(crate) fn absolute(path: &Utf8Path) -> Result<Utf8PathBuf, WslstrapError> {
    let absolute = std::path::absolute(path)
        .map_err(|e| WslstrapError::io(format!("failed to resolve absolute path: {}", path), e))?;
    Utf8PathBuf::from_path_buf(absolute)
        .map_err(|p| WslstrapError::Validation(format!("path is not valid UTF-8: {}", p.display())))
}
