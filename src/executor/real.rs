//! Real command executor implementation.
//!
//! This module provides [`RealCommandExecutor`], which executes commands
//! using `std::process::Command`, optionally feeding stdin, capturing output
//! on reader threads and enforcing a deadline.

use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use which::which;

use super::pipe::{StreamType, decode_output, panic_message, read_pipe, write_stdin};
use super::{CommandExecutor, CommandSpec, ExecutionResult, OutputMode};
use crate::error::WslstrapError;

/// Interval between `try_wait` polls while a deadline is armed.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Kills a child process and reaps it.
///
/// Called from error paths in [`RealCommandExecutor::execute()`] so that no
/// process outlives a failed or timed-out execution. Reader threads observe
/// EOF once the child is gone.
fn kill_child_process(child: &mut Child) {
    let pid = child.id();
    if let Err(e) = child.kill() {
        tracing::debug!(pid = pid, "kill returned error (process may have already exited): {}", e);
    }
    if let Err(e) = child.wait() {
        tracing::warn!(pid = pid, "failed to wait for child process after kill: {}", e);
    }
}

/// Joins a helper thread, converting a panic into a descriptive string.
fn join_thread<T>(name: &str, handle: JoinHandle<T>) -> std::result::Result<T, String> {
    handle.join().map_err(|e| {
        let msg = panic_message(&*e);
        tracing::error!(thread = name, panic = msg, "helper thread panicked");
        format!("{}: {}", name, msg)
    })
}

/// Waits for the child, returning `None` if the deadline passed first.
fn wait_with_deadline(
    child: &mut Child,
    deadline: Option<Instant>,
) -> std::io::Result<Option<ExitStatus>> {
    let Some(deadline) = deadline else {
        return child.wait().map(Some);
    };
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Why a pipe helper did not deliver its output.
enum HelperFailure {
    /// The deadline passed while a descendant still held the pipe open.
    TimedOut,
    /// The helper thread panicked.
    Panicked(String),
}

/// A stdin/stdout/stderr helper thread whose result arrives over a channel,
/// so collecting it shares the command's deadline.
///
/// A child that exits may leave a background descendant holding the pipes;
/// without the deadline the collection would block until that descendant
/// exits too.
struct PipeHelper<T> {
    name: &'static str,
    output: Receiver<T>,
    handle: JoinHandle<()>,
}

impl<T> PipeHelper<T> {
    fn collect(self, deadline: Option<Instant>) -> std::result::Result<T, HelperFailure> {
        let received = match deadline {
            Some(deadline) => self
                .output
                .recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => self.output.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(value) => Ok(value),
            Err(RecvTimeoutError::Timeout) => {
                tracing::debug!(thread = self.name, "pipe still open at the deadline");
                Err(HelperFailure::TimedOut)
            }
            Err(RecvTimeoutError::Disconnected) => match join_thread(self.name, self.handle) {
                Err(msg) => Err(HelperFailure::Panicked(msg)),
                Ok(()) => Err(HelperFailure::Panicked(format!("{}: exited without output", self.name))),
            },
        }
    }
}

/// Command executor that runs actual system commands.
///
/// When `dry_run` is true, commands are logged but not executed and
/// `execute()` returns the synthesized `"[dry-run] <command> <args>"` output.
/// When `timeout` is set, a command still running at the deadline is killed
/// and reported as [`WslstrapError::Timeout`]. The same deadline bounds
/// draining the pipes after the child exits.
#[derive(Debug, Default, Clone)]
pub struct RealCommandExecutor {
    pub dry_run: bool,
    pub timeout: Option<Duration>,
}

impl RealCommandExecutor {
    fn execution_error(spec: &CommandSpec, status: String) -> anyhow::Error {
        WslstrapError::Execution {
            command: format!("{} {:?}", spec.command, spec.args),
            status,
        }
        .into()
    }

    fn timeout_error(&self, spec: &CommandSpec) -> anyhow::Error {
        WslstrapError::Timeout {
            command: spec.command_line(),
            timeout: self.timeout.unwrap_or_default(),
        }
        .into()
    }

    fn spawn_helper<T, F>(
        name: &'static str,
        child: &mut Child,
        spec: &CommandSpec,
        f: F,
    ) -> Result<PipeHelper<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, output) = mpsc::channel();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                // The receiver is gone once the deadline passed; the result is dropped then.
                let _ = tx.send(f());
            })
            .map_err(|e| {
                kill_child_process(child);
                Self::execution_error(spec, format!("failed to spawn {} thread: {}", name, e))
            })?;
        Ok(PipeHelper {
            name,
            output,
            handle,
        })
    }
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        if self.dry_run {
            tracing::info!("dry run: {}", spec.command_line());
            return Ok(ExecutionResult::dry_run(spec));
        }

        let cmd = which(&spec.command).map_err(|_| WslstrapError::CommandNotFound {
            command: spec.command.clone(),
        })?;
        tracing::trace!("command found: {}: {}", spec.command, cmd.to_string_lossy());

        let mut command = Command::new(cmd);
        command.args(&spec.args);

        match spec.output {
            OutputMode::Capture => {
                command.stdout(Stdio::piped());
                command.stderr(Stdio::piped());
                command.stdin(Stdio::null());
            }
            OutputMode::Inherit => {
                command.stdout(Stdio::inherit());
                command.stderr(Stdio::inherit());
                command.stdin(Stdio::inherit());
            }
        }
        if spec.stdin.is_some() {
            command.stdin(Stdio::piped());
        }

        let deadline = self.timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let mut child = command.spawn().with_context(|| {
            format!("failed to spawn command `{}` with args {:?}", spec.command, spec.args)
        })?;
        tracing::trace!("spawned command: {}: pid={}", spec.command, child.id());

        let stdin_writer = match spec.stdin.clone() {
            Some(input) => {
                let pipe = child.stdin.take();
                Some(Self::spawn_helper("stdin-writer", &mut child, spec, move || {
                    write_stdin(pipe, &input)
                })?)
            }
            None => None,
        };

        let readers = match spec.output {
            OutputMode::Capture => {
                let stdout_pipe = child.stdout.take();
                let stderr_pipe = child.stderr.take();
                let stdout = Self::spawn_helper("stdout-reader", &mut child, spec, move || {
                    read_pipe(stdout_pipe, StreamType::Stdout)
                })?;
                let stderr = Self::spawn_helper("stderr-reader", &mut child, spec, move || {
                    read_pipe(stderr_pipe, StreamType::Stderr)
                })?;
                Some((stdout, stderr))
            }
            OutputMode::Inherit => None,
        };

        let waited = wait_with_deadline(&mut child, deadline);
        let status = match waited {
            Ok(Some(status)) => status,
            Ok(None) => {
                kill_child_process(&mut child);
                return Err(self.timeout_error(spec));
            }
            Err(e) => {
                kill_child_process(&mut child);
                return Err(Self::execution_error(spec, format!("failed to wait for command: {}", e)));
            }
        };

        let mut panicked = Vec::new();
        if let Some(writer) = stdin_writer {
            match writer.collect(deadline) {
                Ok(()) => {}
                Err(HelperFailure::Panicked(msg)) => panicked.push(msg),
                Err(HelperFailure::TimedOut) => return Err(self.timeout_error(spec)),
            }
        }

        let mut result = ExecutionResult {
            status: Some(status),
            ..Default::default()
        };
        if let Some((stdout, stderr)) = readers {
            for (reader, target) in [(stdout, &mut result.stdout), (stderr, &mut result.stderr)] {
                match reader.collect(deadline) {
                    Ok(bytes) => *target = decode_output(&bytes),
                    Err(HelperFailure::Panicked(msg)) => panicked.push(msg),
                    Err(HelperFailure::TimedOut) => return Err(self.timeout_error(spec)),
                }
            }
        }

        if !panicked.is_empty() {
            return Err(Self::execution_error(
                spec,
                format!(
                    "helper thread(s) panicked during command execution: {}",
                    panicked.join(", ")
                ),
            ));
        }

        tracing::trace!("executed command: {}: success={}", spec.command, status.success());
        Ok(result)
    }
}
