pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod guest;
pub mod package;
mod paths;
pub mod pipeline;
pub mod playbook;
pub mod summary;
pub mod wsl;

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use tracing::info;
use tracing_subscriber::{FmtSubscriber, filter::LevelFilter};

use crate::config::Settings;
use crate::error::WslstrapError;
use crate::executor::CommandExecutor;
use crate::guest::GuestShell;
use crate::package::{DetectionMemo, PackageEngine};
use crate::pipeline::{ProvisioningPipeline, ProvisioningRequest};
use crate::playbook::{
    PlaybookResolver, PlaybookRunner, PlaybookSource, RepoCheckout, parse_extra_vars,
};
use crate::summary::ExecutionSummary;
use crate::wsl::{CopySpec, ExportSpec, GuestRecord, ImportSpec, WslClient};

/// Directory holding the intermediate archive of `copy`, relative to the working directory.
const COPY_STAGING_DIR: &str = ".wslstrap_tmp";
/// Parent directory of copies made without an explicit `--path`.
const COPY_INSTALL_ROOT: &str = "wsl-distros";

pub fn init_logging(log_level: cli::LogLevel) -> Result<()> {
    let filter = match log_level {
        cli::LogLevel::Trace => LevelFilter::TRACE,
        cli::LogLevel::Debug => LevelFilter::DEBUG,
        cli::LogLevel::Info => LevelFilter::INFO,
        cli::LogLevel::Warn => LevelFilter::WARN,
        cli::LogLevel::Error => LevelFilter::ERROR,
    };

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder().with_max_level(filter).finish(),
    )
    .context("failed to set global default tracing subscriber")
}

/// Renders installed distributions as a table.
pub fn render_guest_table(records: &[GuestRecord]) -> String {
    if records.is_empty() {
        return "No WSL distributions installed.".to_string();
    }

    let mut lines = vec![format!("{:<8} {:<30} {:<12} {}", "DEFAULT", "NAME", "STATE", "VERSION")];
    for record in records {
        lines.push(format!(
            "{:<8} {:<30} {:<12} {}",
            if record.is_default { "*" } else { "" },
            record.name,
            record.state.to_string(),
            record.version
        ));
    }
    lines.join("\n")
}

/// Formats a byte count with binary units, e.g. `1.5 GiB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

pub fn run_status(settings: &Settings, executor: Arc<dyn CommandExecutor>) -> Result<()> {
    WslClient::from_settings(executor, settings).check_available()?;
    println!("WSL is available");
    Ok(())
}

pub fn run_list(settings: &Settings, executor: Arc<dyn CommandExecutor>) -> Result<()> {
    let records = WslClient::from_settings(executor, settings)
        .list_installed()
        .context("failed to list distributions")?;
    println!("{}", render_guest_table(&records));
    Ok(())
}

pub fn run_import(
    opts: &cli::ImportArgs,
    settings: &Settings,
    executor: Arc<dyn CommandExecutor>,
) -> Result<()> {
    let spec = ImportSpec {
        name: opts.name.clone(),
        install_path: opts.install_dir.clone(),
        archive: opts.archive.clone(),
        version: opts.wsl_version,
    };
    WslClient::from_settings(executor, settings).import(&spec)?;
    info!("distribution '{}' imported", opts.name);
    Ok(())
}

pub fn run_remove(
    opts: &cli::RemoveArgs,
    settings: &Settings,
    executor: Arc<dyn CommandExecutor>,
) -> Result<()> {
    WslClient::from_settings(executor, settings).unregister(&opts.name)?;
    info!("distribution '{}' removed", opts.name);
    Ok(())
}

pub fn run_backup(
    opts: &cli::BackupArgs,
    settings: &Settings,
    executor: Arc<dyn CommandExecutor>,
) -> Result<()> {
    let spec = ExportSpec {
        name: opts.name.clone(),
        destination: opts.output.clone(),
    };
    WslClient::from_settings(executor, settings).export(&spec)?;

    match fs::metadata(&opts.output) {
        Ok(meta) => info!(
            "distribution '{}' exported to {} ({})",
            opts.name,
            opts.output,
            format_size(meta.len())
        ),
        Err(_) => info!("distribution '{}' exported to {}", opts.name, opts.output),
    }
    Ok(())
}

pub fn run_copy(
    opts: &cli::CopyArgs,
    settings: &Settings,
    executor: Arc<dyn CommandExecutor>,
    dry_run: bool,
) -> Result<()> {
    let name = opts
        .name
        .clone()
        .unwrap_or_else(|| format!("{}-copy", opts.source));
    let spec = CopySpec {
        install_path: opts
            .path
            .clone()
            .unwrap_or_else(|| Utf8PathBuf::from(COPY_INSTALL_ROOT).join(&name)),
        source: opts.source.clone(),
        name,
        version: opts.wsl_version,
        staging_dir: Utf8PathBuf::from(COPY_STAGING_DIR),
    };

    // Export writes nothing in a dry run, so the import would have no archive to check.
    if dry_run {
        info!(
            "dry run: would export '{}' to {} and import it as '{}' into {}",
            spec.source,
            spec.staging_archive(),
            spec.name,
            spec.install_path
        );
        return Ok(());
    }

    WslClient::from_settings(executor, settings).copy(&spec)?;

    println!("\nCopy completed successfully");
    println!("  Source:       {}", spec.source);
    println!("  Distribution: {}", spec.name);
    println!("  Location:     {}", spec.install_path);
    Ok(())
}

fn print_summary_if_needed(summary: &ExecutionSummary) {
    if summary.len() > 1 {
        println!("\n{}", summary);
    }
}

pub fn run_provision(
    opts: &cli::ProvisionArgs,
    settings: &Settings,
    executor: Arc<dyn CommandExecutor>,
    dry_run: bool,
) -> Result<()> {
    let extra_vars = parse_extra_vars(&opts.extra_vars)?;
    let local_playbooks = if opts.playbooks.is_empty() {
        Vec::new()
    } else {
        PlaybookResolver::new(settings.playbook_dir.clone())
            .resolve(&opts.playbooks)
            .context("failed to resolve playbooks")?
    };

    if dry_run {
        info!("dry run: skipping existence check for '{}'", opts.name);
    } else if !WslClient::from_settings(executor.clone(), settings).is_installed(&opts.name)? {
        return Err(WslstrapError::NotFound(opts.name.clone()).into());
    }

    let shell = GuestShell::new(executor, settings.wsl_command.clone());
    let engine = PackageEngine::new(shell.clone(), DetectionMemo::new());

    let mut playbooks = Vec::with_capacity(local_playbooks.len() + 1);
    if let Some(url) = &opts.repo {
        let entry = RepoCheckout::new(shell.clone(), engine.clone())
            .with_checkout_path(settings.repo_checkout_path.clone())
            .checkout(&opts.name, url)?;
        playbooks.push(PlaybookSource::InGuest(entry));
    }
    playbooks.extend(local_playbooks.into_iter().map(PlaybookSource::Local));

    let runner =
        PlaybookRunner::new(shell, engine).with_guest_path(settings.guest_playbook_path.clone());

    let request = ProvisioningRequest {
        guest: opts.name.clone(),
        playbooks,
        tags: opts.tags.clone(),
        extra_vars,
        verbose: opts.verbose,
    };

    let summary = match ProvisioningPipeline::new(&runner).run(&request) {
        Ok(summary) => summary,
        Err(WslstrapError::PipelineFailed { summary }) => {
            print_summary_if_needed(&summary);
            return Err(WslstrapError::PipelineFailed { summary }.into());
        }
        Err(e) => return Err(e.into()),
    };
    print_summary_if_needed(&summary);

    println!("\nProvisioning completed successfully");
    println!("  Distribution: {}", request.guest);
    println!(
        "  Playbooks:    {}",
        summary
            .records()
            .iter()
            .map(|r| r.label.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    if !request.tags.is_empty() {
        println!("  Tags:         {}", request.tags.join(", "));
    }
    if !request.extra_vars.is_empty() {
        println!("  Extra vars:   {}", request.extra_vars.len());
    }
    Ok(())
}
