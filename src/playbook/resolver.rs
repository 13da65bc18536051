//! Resolves playbook inputs given on the command line to files.
//!
//! An input is either a path to an existing file or an alias naming
//! `<playbook_dir>/playbooks/<alias>.yml`. Each input may itself be a
//! comma-separated list.

use std::collections::HashSet;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::error::WslstrapError;
use crate::paths::absolute;

const ALIAS_DIR: &str = "playbooks";

fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

fn has_playbook_extension(input: &str) -> bool {
    input.ends_with(".yml") || input.ends_with(".yaml")
}

/// Maps playbook inputs to absolute paths of existing files.
#[derive(Debug, Clone)]
pub struct PlaybookResolver {
    playbook_dir: Utf8PathBuf,
}

impl PlaybookResolver {
    pub fn new(playbook_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            playbook_dir: playbook_dir.into(),
        }
    }

    /// Resolves a single entry.
    pub fn resolve_one(&self, input: &str) -> Result<Utf8PathBuf, WslstrapError> {
        if is_url(input) {
            return Err(WslstrapError::Validation(format!(
                "remote playbooks are not supported, download it first: {}",
                input
            )));
        }

        let direct = Utf8Path::new(input);
        if direct.is_file() {
            return absolute(direct);
        }

        let file_name = if has_playbook_extension(input) {
            input.to_string()
        } else {
            format!("{}.yml", input)
        };
        let alias = self.playbook_dir.join(ALIAS_DIR).join(file_name);
        if alias.is_file() {
            debug!("resolved playbook alias '{}' to {}", input, alias);
            return absolute(&alias);
        }

        Err(WslstrapError::PlaybookNotFound(input.to_string()))
    }

    /// Resolves all inputs in order, splitting comma lists and dropping duplicates.
    pub fn resolve<I, S>(&self, inputs: I) -> Result<Vec<Utf8PathBuf>, WslstrapError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();
        for input in inputs {
            for entry in input.as_ref().split(',').map(str::trim).filter(|e| !e.is_empty()) {
                let path = self.resolve_one(entry)?;
                if seen.insert(path.clone()) {
                    resolved.push(path);
                }
            }
        }

        if resolved.is_empty() {
            return Err(WslstrapError::Validation("no playbooks specified".to_string()));
        }
        Ok(resolved)
    }
}
