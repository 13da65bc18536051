//! Fail-fast provisioning pipeline.
//!
//! Playbooks run strictly in order against one guest. The first failure
//! stops the pipeline: later playbooks are neither run nor recorded, since
//! they may depend on what the failed one was supposed to set up.

use std::collections::BTreeMap;
use std::time::Instant;

use tracing::{error, info};

use crate::error::WslstrapError;
use crate::playbook::{PlaybookOptions, PlaybookRunner, PlaybookSource};
use crate::summary::{ExecutionSummary, PlaybookExecutionRecord};

/// Everything one pipeline run needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisioningRequest {
    pub guest: String,
    /// Resolved playbooks, in execution order.
    pub playbooks: Vec<PlaybookSource>,
    pub tags: Vec<String>,
    pub extra_vars: BTreeMap<String, String>,
    pub verbose: bool,
}

impl ProvisioningRequest {
    fn options_for(&self, playbook: &PlaybookSource) -> PlaybookOptions {
        PlaybookOptions {
            guest: self.guest.clone(),
            playbook: playbook.clone(),
            tags: self.tags.clone(),
            extra_vars: self.extra_vars.clone(),
            verbose: self.verbose,
        }
    }
}

/// Sequences playbook runs and records their outcomes.
pub struct ProvisioningPipeline<'a> {
    runner: &'a PlaybookRunner,
}

impl<'a> ProvisioningPipeline<'a> {
    pub fn new(runner: &'a PlaybookRunner) -> Self {
        Self { runner }
    }

    /// Runs every playbook of `request` until the first failure.
    ///
    /// Returns the summary on success. On failure the summary (ending with
    /// the failed record) is carried by [`WslstrapError::PipelineFailed`].
    pub fn run(&self, request: &ProvisioningRequest) -> Result<ExecutionSummary, WslstrapError> {
        if request.playbooks.is_empty() {
            return Err(WslstrapError::Validation("no playbooks specified".to_string()));
        }

        let total = request.playbooks.len();
        info!("provisioning '{}' with {} playbook(s)", request.guest, total);

        let mut summary = ExecutionSummary::new();
        for (index, playbook) in request.playbooks.iter().enumerate() {
            let label = playbook.label();
            info!("running playbook {}/{}: {}", index + 1, total, label);

            let started = Instant::now();
            let outcome = self.runner.execute(&request.options_for(playbook));
            let elapsed = started.elapsed();

            match outcome {
                Ok(()) => summary.add(PlaybookExecutionRecord::success(label, elapsed)),
                Err(e) => {
                    error!("playbook {}/{} '{}' failed: {:#}", index + 1, total, label, e);
                    summary.add(PlaybookExecutionRecord::failed(label, elapsed, e.to_string()));
                    if index + 1 < total {
                        info!("stopping: {} remaining playbook(s) not run", total - index - 1);
                    }
                    break;
                }
            }
        }

        if summary.has_failures() {
            return Err(WslstrapError::PipelineFailed { summary });
        }

        info!("provisioning of '{}' completed successfully", request.guest);
        Ok(summary)
    }
}
