//! Test doubles for the process execution port.

use std::collections::VecDeque;
use std::fs;
use std::process::ExitStatus;
use std::sync::Mutex;

use anyhow::Result;
use wslstrap::executor::{CommandExecutor, CommandSpec, ExecutionResult};

/// What a scripted command returns.
#[derive(Debug, Clone)]
pub enum Reply {
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    /// The command could not be run at all (spawn failure, timeout).
    Error(String),
}

#[allow(dead_code)]
pub fn ok() -> Reply {
    ok_with("")
}

#[allow(dead_code)]
pub fn ok_with(stdout: &str) -> Reply {
    Reply::Exit {
        code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

#[allow(dead_code)]
pub fn fail(code: i32) -> Reply {
    fail_with(code, "")
}

#[allow(dead_code)]
pub fn fail_with(code: i32, stderr: &str) -> Reply {
    Reply::Exit {
        code,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

#[allow(dead_code)]
pub fn error(message: &str) -> Reply {
    Reply::Error(message.to_string())
}

#[cfg(unix)]
fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw((code & 0xff) << 8)
}

#[cfg(windows)]
fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    ExitStatus::from_raw(code as u32)
}

fn to_result(reply: Reply) -> Result<ExecutionResult> {
    match reply {
        Reply::Exit {
            code,
            stdout,
            stderr,
        } => Ok(ExecutionResult {
            status: Some(exit_status(code)),
            stdout,
            stderr,
        }),
        Reply::Error(message) => Err(anyhow::anyhow!(message)),
    }
}

/// Text a rule pattern is matched against: the command line plus any stdin.
fn haystack(spec: &CommandSpec) -> String {
    match &spec.stdin {
        Some(input) => format!("{}\n{}", spec.command_line(), input),
        None => spec.command_line(),
    }
}

/// Records every command and answers from substring-matched rules.
///
/// One-shot rules are consulted first and consumed on use; persistent rules
/// are consulted most recent first. Unmatched commands succeed with empty
/// output.
#[derive(Default)]
pub struct MockExecutor {
    once: Mutex<VecDeque<(String, Reply)>>,
    rules: Mutex<Vec<(String, Reply)>>,
    calls: Mutex<Vec<CommandSpec>>,
}

#[allow(dead_code)]
impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every command containing `pattern` with `reply`.
    pub fn on(&self, pattern: &str, reply: Reply) -> &Self {
        self.rules.lock().unwrap().push((pattern.to_string(), reply));
        self
    }

    /// Answers the next command containing `pattern` with `reply`.
    pub fn once(&self, pattern: &str, reply: Reply) -> &Self {
        self.once.lock().unwrap().push_back((pattern.to_string(), reply));
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Returns the last argument of every call, which is the script for guest commands.
    pub fn scripts(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|spec| spec.args.last().cloned().unwrap_or_default())
            .collect()
    }

    /// Counts calls whose command line or stdin contains `pattern`.
    pub fn count_matching(&self, pattern: &str) -> usize {
        self.calls()
            .iter()
            .filter(|spec| haystack(spec).contains(pattern))
            .count()
    }
}

impl CommandExecutor for MockExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        self.calls.lock().unwrap().push(spec.clone());
        let text = haystack(spec);

        {
            let mut once = self.once.lock().unwrap();
            if let Some(index) = once.iter().position(|(pattern, _)| text.contains(pattern)) {
                let (_, reply) = once.remove(index).unwrap();
                return to_result(reply);
            }
        }

        let reply = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(pattern, _)| text.contains(pattern))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(ok);
        to_result(reply)
    }
}

/// In-memory emulation of `wsl.exe` distribution management.
#[derive(Default)]
pub struct FakeWsl {
    /// Registered distributions in registration order; the first is the default.
    distros: Mutex<Vec<String>>,
    calls: Mutex<Vec<Vec<String>>>,
    /// Operation flags (e.g. `--import`) that fail regardless of arguments.
    refused: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FakeWsl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_distros(names: &[&str]) -> Self {
        let fake = Self::new();
        fake.distros
            .lock()
            .unwrap()
            .extend(names.iter().map(|n| n.to_string()));
        fake
    }

    pub fn distros(&self) -> Vec<String> {
        self.distros.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Makes every later operation starting with `flag` fail.
    pub fn refuse(&self, flag: &str) {
        self.refused.lock().unwrap().push(flag.to_string());
    }

    /// Counts calls whose first argument is `flag`.
    pub fn count_operation(&self, flag: &str) -> usize {
        self.calls()
            .iter()
            .filter(|args| args.first().map(String::as_str) == Some(flag))
            .count()
    }

    fn verbose_listing(&self) -> String {
        let mut out = String::from("  NAME      STATE           VERSION\n");
        for (index, name) in self.distros.lock().unwrap().iter().enumerate() {
            let marker = if index == 0 { '*' } else { ' ' };
            out.push_str(&format!("{} {:<9} Stopped         2\n", marker, name));
        }
        out
    }
}

impl CommandExecutor for FakeWsl {
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        self.calls.lock().unwrap().push(spec.args.clone());
        let args: Vec<&str> = spec.args.iter().map(String::as_str).collect();
        if let Some(flag) = args.first()
            && self.refused.lock().unwrap().iter().any(|r| r == flag)
        {
            return to_result(fail_with(1, "The operation could not be completed."));
        }

        let reply = match args.as_slice() {
            ["--status"] => ok(),
            ["-l", "-v"] => {
                if self.distros.lock().unwrap().is_empty() {
                    fail_with(1, "Windows Subsystem for Linux has no installed distributions.")
                } else {
                    ok_with(&self.verbose_listing())
                }
            }
            ["-l"] => {
                if self.distros.lock().unwrap().is_empty() {
                    fail_with(1, "Windows Subsystem for Linux has no installed distributions.")
                } else {
                    ok_with(&self.distros.lock().unwrap().join("\n"))
                }
            }
            ["--import", name, _install, archive, "--version", _] => {
                if !std::path::Path::new(archive).is_file() {
                    fail_with(1, "The system cannot find the file specified.")
                } else {
                    self.distros.lock().unwrap().push(name.to_string());
                    ok()
                }
            }
            ["--export", name, destination] => {
                if self.distros.lock().unwrap().iter().any(|d| d == name) {
                    fs::write(destination, format!("rootfs of {}", name))?;
                    ok()
                } else {
                    fail_with(1, "There is no distribution with the supplied name.")
                }
            }
            ["--unregister", name] => {
                let mut distros = self.distros.lock().unwrap();
                match distros.iter().position(|d| d == name) {
                    Some(index) => {
                        distros.remove(index);
                        ok()
                    }
                    None => fail_with(1, "There is no distribution with the supplied name."),
                }
            }
            _ => fail_with(1, "Invalid command line argument"),
        };
        to_result(reply)
    }
}
