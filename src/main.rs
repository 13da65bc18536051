use std::io;
use std::process;
use std::sync::Arc;

use anyhow::Result;
use clap::CommandFactory;
use tracing::error;

use wslstrap::cli::{self, Commands};
use wslstrap::config::{self, Settings};
use wslstrap::executor::{CommandExecutor, RealCommandExecutor};

fn run(args: &cli::Cli) -> Result<()> {
    if let Commands::Completions(opts) = &args.command {
        let mut cmd = cli::Cli::command();
        clap_complete::generate(opts.shell, &mut cmd, env!("CARGO_PKG_NAME"), &mut io::stdout());
        return Ok(());
    }

    let mut settings: Settings = config::resolve_settings(args.config.as_deref())?;
    if let Some(timeout) = args.timeout {
        settings.timeout_secs = Some(timeout);
    }

    let executor: Arc<dyn CommandExecutor> = Arc::new(RealCommandExecutor {
        dry_run: args.dry_run,
        timeout: settings.timeout(),
    });

    match &args.command {
        Commands::Status => wslstrap::run_status(&settings, executor),
        Commands::List => wslstrap::run_list(&settings, executor),
        Commands::Import(opts) => wslstrap::run_import(opts, &settings, executor),
        Commands::Remove(opts) => wslstrap::run_remove(opts, &settings, executor),
        Commands::Backup(opts) => wslstrap::run_backup(opts, &settings, executor),
        Commands::Copy(opts) => wslstrap::run_copy(opts, &settings, executor, args.dry_run),
        Commands::Provision(opts) => {
            wslstrap::run_provision(opts, &settings, executor, args.dry_run)
        }
        Commands::Completions(_) => Ok(()),
    }
}

fn main() -> Result<()> {
    let args = cli::parse_args()?;
    wslstrap::init_logging(args.log_level)?;

    if let Err(e) = run(&args) {
        error!("{:#}", e);
        process::exit(1);
    }

    Ok(())
}
