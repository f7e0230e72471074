use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub const DEFAULT_CONFIG: &str = "/etc/backvault.json";

#[derive(Parser, Debug)]
#[command(name = "backvault", version, about = "Offsite and local backup orchestration")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long, global = true, env = "BACKVAULT_CONFIG", default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,
    /// Run only the named target(s)
    #[arg(long = "target", global = true, value_name = "NAME")]
    pub targets: Vec<String>,
    #[arg(long, global = true)]
    pub dry_run: bool,
    /// Never prune snapshots or delete mirrored files
    #[arg(long, global = true)]
    pub safe: bool,
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
    /// Print the selected targets and exit
    #[arg(long, global = true)]
    pub print_targets: bool,

    #[arg(long, global = true, env = "BACKVAULT_NOTIFY_URL", hide_env_values = true)]
    pub notify_url: Option<String>,
    #[arg(long, global = true, env = "BACKVAULT_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Snapshot targets into per-target restic repositories on B2
    Offsite(OffsiteArgs),
    /// Mirror targets into a local directory with rsync
    Local(LocalArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct OffsiteArgs {
    #[arg(long, env = "B2_BUCKET")]
    pub bucket: Option<String>,
    #[arg(long, env = "B2_ACCOUNT_ID", hide_env_values = true)]
    pub account_id: Option<String>,
    #[arg(long, env = "B2_ACCOUNT_KEY", hide = true, hide_env_values = true)]
    pub account_key: Option<String>,
    #[arg(long, env = "RESTIC_PASSWORD", hide = true, hide_env_values = true)]
    pub password: Option<String>,
    #[arg(long, env = "RESTIC_PASSWORD_FILE")]
    pub password_file: Option<PathBuf>,
    /// Host tag recorded on every snapshot (defaults to the machine hostname)
    #[arg(long, env = "BACKVAULT_HOST")]
    pub host: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct LocalArgs {
    #[arg(long, env = "LOCAL_BACKUP_ROOT")]
    pub root: Option<PathBuf>,
    /// Extra arguments passed to rsync after `--`
    #[arg(last = true)]
    pub rsync: Vec<String>,
}
