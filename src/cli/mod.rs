use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::args::{Cli, Command};
use crate::cli::commands::backup::{self, BackupOptions};
use crate::types::RunMode;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod args;
pub mod commands;

pub fn run() -> Result<()> {
    let cli = parse_cli();
    init_tracing(cli.verbose);
    print_banner();

    let options = BackupOptions {
        config_path: cli.config.clone(),
        selected: cli.targets.clone(),
        print_targets: cli.print_targets,
        notify_url: cli.notify_url.clone(),
        log_file: cli.log_file.clone(),
        run_mode: RunMode {
            dry_run: cli.dry_run,
            safe_mode: cli.safe,
            verbose: cli.verbose,
        },
    };

    let code = match &cli.command {
        Command::Offsite(args) => backup::run_offsite(&options, args),
        Command::Local(args) => backup::run_local(&options, args),
    };
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                print_banner();
            }
            err.exit()
        }
    }
}

fn print_banner() {
    println!("Backvault {}", VERSION);
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
