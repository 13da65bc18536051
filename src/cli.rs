use anyhow::Result;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
)]
pub struct Cli {
    /// Set the log level
    #[arg(short, long, global = true, default_value = "info")]
    pub log_level: LogLevel,

    /// Do not run, just show what would be done
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Path to an optional YAML settings file
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Per-command timeout in seconds (overrides the settings file)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that WSL is installed and responding
    Status,

    /// List installed distributions
    List,

    /// Import a distribution from a root filesystem archive
    Import(ImportArgs),

    /// Unregister a distribution and delete its disk
    Remove(RemoveArgs),

    /// Export a distribution to a tar archive
    Backup(BackupArgs),

    /// Duplicate a distribution under a new name
    Copy(CopyArgs),

    /// Run Ansible playbooks inside a distribution
    Provision(ProvisionArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Name to register the distribution under
    pub name: String,

    /// Root filesystem archive (.tar, .tar.gz)
    #[arg(short, long)]
    pub archive: Utf8PathBuf,

    /// Directory for the distribution's virtual disk
    #[arg(short, long)]
    pub install_dir: Utf8PathBuf,

    /// WSL version (defaults to the configured version)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=2))]
    pub wsl_version: Option<u8>,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Distribution to remove
    pub name: String,
}

#[derive(Args, Debug)]
pub struct BackupArgs {
    /// Distribution to export
    pub name: String,

    /// Destination archive
    #[arg(short, long)]
    pub output: Utf8PathBuf,
}

#[derive(Args, Debug)]
pub struct CopyArgs {
    /// Distribution to copy
    pub source: String,

    /// Name for the copy (defaults to <SOURCE>-copy)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Directory for the copy's virtual disk (defaults to wsl-distros/<NAME>)
    #[arg(short, long)]
    pub path: Option<Utf8PathBuf>,

    /// WSL version of the copy (defaults to the configured version)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=2))]
    pub wsl_version: Option<u8>,
}

#[derive(Args, Debug)]
pub struct ProvisionArgs {
    /// Distribution to provision
    pub name: String,

    /// Playbook files or aliases, comma-separated or repeated
    #[arg(short, long = "playbooks", required_unless_present = "repo", num_args = 1..)]
    pub playbooks: Vec<String>,

    /// Git repository to clone into the distribution; its site.yml (or
    /// main.yml, playbook.yml, default.yml) runs before any --playbooks
    #[arg(long)]
    pub repo: Option<String>,

    /// Only run plays and tasks tagged with these values
    #[arg(short, long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Extra variables as key=value (repeatable)
    #[arg(short, long = "extra-vars")]
    pub extra_vars: Vec<String>,

    /// Run ansible-playbook with -vvv
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}

/// Represents log levels for controlling the verbosity of logging output.
///
/// This enum maps directly to the log levels used by the `tracing` crate.
/// For example, specifying `--log-level debug` will enable debug-level
/// logging output, including every command line sent to WSL.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

pub fn parse_args() -> Result<Cli> {
    Ok(Cli::parse())
}
