//! Command execution inside a guest distribution.
//!
//! Every guest-side action is a shell snippet run as
//! `<wsl> -d <guest> bash -c <script>`. Snippets are composed from argv
//! arrays with [`shell_join`] so that values crossing the shell boundary are
//! always quoted.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::error::WslstrapError;
use crate::executor::{CommandExecutor, CommandSpec, ExecutionResult, execute_checked};

/// Joins an argv array into a single shell-safe command string.
pub fn shell_join<'a, I>(args: I) -> Result<String, WslstrapError>
where
    I: IntoIterator<Item = &'a str>,
{
    shlex::try_join(args).map_err(|e| {
        WslstrapError::Validation(format!("argument cannot be passed to a shell: {}", e))
    })
}

/// Runs shell snippets inside named guests through a [`CommandExecutor`].
#[derive(Clone)]
pub struct GuestShell {
    executor: Arc<dyn CommandExecutor>,
    wsl_command: String,
}

impl GuestShell {
    /// Creates a guest shell driving `wsl_command` (normally `wsl.exe`).
    pub fn new(executor: Arc<dyn CommandExecutor>, wsl_command: impl Into<String>) -> Self {
        Self {
            executor,
            wsl_command: wsl_command.into(),
        }
    }

    /// Builds the host-side command spec for `script` in `guest`.
    pub fn spec(&self, guest: &str, script: &str) -> CommandSpec {
        CommandSpec::new(
            self.wsl_command.as_str(),
            vec![
                "-d".to_string(),
                guest.to_string(),
                "bash".to_string(),
                "-c".to_string(),
                script.to_string(),
            ],
        )
    }

    /// Runs `script` with captured output and reports whether it succeeded.
    ///
    /// Execution errors (spawn failure, timeout) count as a failed probe.
    pub fn probe(&self, guest: &str, script: &str) -> bool {
        match self.executor.execute(&self.spec(guest, script)) {
            Ok(result) => {
                debug!(guest, script, success = result.success(), "probe finished");
                result.success()
            }
            Err(e) => {
                debug!(guest, script, "probe could not run: {:#}", e);
                false
            }
        }
    }

    /// Runs `script` with the guest's output streamed to the controller's terminal.
    pub fn run(&self, guest: &str, script: &str) -> Result<()> {
        let spec = self.spec(guest, script).inherit_output();
        execute_checked(self.executor.as_ref(), &spec)
            .with_context(|| format!("command '{}' failed in '{}'", script, guest))?;
        Ok(())
    }

    /// Runs `script` with `input` on stdin and captured output.
    pub fn run_with_input(&self, guest: &str, script: &str, input: &str) -> Result<ExecutionResult> {
        let spec = self.spec(guest, script).with_stdin(input);
        execute_checked(self.executor.as_ref(), &spec)
            .with_context(|| format!("command '{}' failed in '{}'", script, guest))
    }
}
