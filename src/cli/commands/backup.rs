use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Local;

use crate::backup::coordinator::RunCoordinator;
use crate::backup::mirror::{MirrorRunner, RsyncMirror};
use crate::backup::repository::{Passphrase, ResticCredentials, ResticGateway};
use crate::backup::retention::retention_args;
use crate::backup::runner::{OffsiteRunner, TargetRunner};
use crate::cli::args::{LocalArgs, OffsiteArgs};
use crate::cli::commands::{exit_code_for, EXIT_FATAL, EXIT_OK};
use crate::config::load::load_config;
use crate::config::model::{Settings, Target};
use crate::error::{ConfigError, Result};
use crate::notify::{Notifier, NotifyLog, WebhookNotifier};
use crate::signal_handler::signal_handler;
use crate::types::{BackupMode, RunMode};
use crate::util::command::{new_tracker, require_tools};
use crate::util::paths::{ensure_directory, local_hostname};

#[derive(Debug, Clone)]
pub struct BackupOptions {
    pub config_path: PathBuf,
    pub selected: Vec<String>,
    pub print_targets: bool,
    pub notify_url: Option<String>,
    pub log_file: Option<PathBuf>,
    pub run_mode: RunMode,
}

struct Plan {
    settings: Settings,
    targets: Vec<Target>,
}

pub fn run_offsite(options: &BackupOptions, args: &OffsiteArgs) -> i32 {
    let mut notifier = build_notifier(options.notify_url.clone(), options.log_file.clone());
    match offsite(options, args, &mut notifier) {
        Ok(code) => code,
        Err(err) => abort(notifier.as_ref(), BackupMode::Offsite, &err),
    }
}

pub fn run_local(options: &BackupOptions, args: &LocalArgs) -> i32 {
    let mut notifier = build_notifier(options.notify_url.clone(), options.log_file.clone());
    match local(options, args, &mut notifier) {
        Ok(code) => code,
        Err(err) => abort(notifier.as_ref(), BackupMode::Local, &err),
    }
}

fn offsite(
    options: &BackupOptions,
    args: &OffsiteArgs,
    notifier: &mut Arc<dyn Notifier>,
) -> anyhow::Result<i32> {
    let Some(plan) = prepare(options, BackupMode::Offsite, notifier)? else {
        return Ok(EXIT_OK);
    };
    let (bucket, credentials) = offsite_credentials(args)?;
    let host = args
        .host
        .as_deref()
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .unwrap_or_else(local_hostname);
    if options.run_mode.verbose {
        println!("  bucket: {}", bucket);
        println!("  host: {}", host);
    }

    let tracker = new_tracker();
    signal_handler(&tracker, notifier.clone());
    let gateway = ResticGateway::new(credentials, options.run_mode, tracker);
    let runner = OffsiteRunner::new(
        gateway,
        notifier.clone(),
        &plan.settings,
        bucket,
        host,
        options.run_mode,
    );
    Ok(execute(runner, notifier.clone(), &plan.targets))
}

fn local(
    options: &BackupOptions,
    args: &LocalArgs,
    notifier: &mut Arc<dyn Notifier>,
) -> anyhow::Result<i32> {
    let Some(plan) = prepare(options, BackupMode::Local, notifier)? else {
        return Ok(EXIT_OK);
    };
    let root = local_root(args)?;
    ensure_directory(&root).context("local backup root")?;
    if options.run_mode.verbose {
        println!("  root: {}", root.display());
    }

    let tracker = new_tracker();
    signal_handler(&tracker, notifier.clone());
    let mirror = RsyncMirror::new(args.rsync.clone(), options.run_mode, tracker);
    let runner = MirrorRunner::new(mirror, notifier.clone(), &plan.settings, root, options.run_mode);
    Ok(execute(runner, notifier.clone(), &plan.targets))
}

fn prepare(
    options: &BackupOptions,
    mode: BackupMode,
    notifier: &mut Arc<dyn Notifier>,
) -> anyhow::Result<Option<Plan>> {
    println!("{}", Local::now().format("%d-%m-%Y %H:%M"));

    let config = load_config(&options.config_path)
        .with_context(|| format!("config {}", options.config_path.display()))?;
    if options.log_file.is_none() {
        if let Some(log_file) = &config.settings.log_file {
            *notifier = build_notifier(options.notify_url.clone(), Some(log_file.clone()));
        }
    }

    let targets = select_targets(&config.targets, &options.selected)?;
    if options.print_targets {
        for target in &targets {
            print_target_details(target, mode);
        }
        return Ok(None);
    }
    if options.run_mode.verbose {
        println!(
            "loaded config {} with {} target(s)",
            options.config_path.display(),
            targets.len()
        );
    }

    require_tools(mode.required_tools())?;
    Ok(Some(Plan {
        settings: config.settings,
        targets,
    }))
}

fn execute<R: TargetRunner>(runner: R, notifier: Arc<dyn Notifier>, targets: &[Target]) -> i32 {
    let summary = RunCoordinator::new(runner, notifier).run(targets);
    println!("{}", Local::now().format("%d-%m-%Y %H:%M"));
    exit_code_for(&summary)
}

fn abort(notifier: &dyn Notifier, mode: BackupMode, err: &anyhow::Error) -> i32 {
    notifier.notify(&format!("{} backup aborted: {:#}", mode, err));
    EXIT_FATAL
}

fn build_notifier(url: Option<String>, log_file: Option<PathBuf>) -> Arc<dyn Notifier> {
    Arc::new(WebhookNotifier::new(url, log_file.map(NotifyLog::new)))
}

pub fn select_targets(targets: &[Target], selected: &[String]) -> Result<Vec<Target>> {
    if selected.is_empty() {
        return Ok(targets.to_vec());
    }
    let wanted: HashSet<&str> = selected.iter().map(String::as_str).collect();
    let mut unknown: Vec<&str> = selected
        .iter()
        .map(String::as_str)
        .filter(|name| !targets.iter().any(|t| t.name == *name))
        .collect();
    if !unknown.is_empty() {
        unknown.dedup();
        return Err(ConfigError::Invalid(format!("unknown target(s): {}", unknown.join(", "))).into());
    }
    Ok(targets
        .iter()
        .filter(|t| wanted.contains(t.name.as_str()))
        .cloned()
        .collect())
}

pub fn print_target_details(target: &Target, mode: BackupMode) {
    let mode_enabled = match mode {
        BackupMode::Offsite => target.offsite_enabled,
        BackupMode::Local => target.local_enabled,
    };
    let locations = if target.locations.is_empty() {
        "<none>".to_string()
    } else {
        target.locations.join(", ")
    };
    println!("target: {}", target.name);
    println!("  enabled: {}", target.enabled);
    println!("  {}: {}", mode, mode_enabled);
    println!("  locations: {}", locations);
    if mode == BackupMode::Offsite {
        println!("  retention: {}", retention_args(target.retention.as_ref()).join(" "));
        println!("  weekly check: {}", target.check_weekly);
    }
}

fn required(value: Option<&str>, name: &str) -> Result<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ConfigError::MissingSecret(name.to_string()).into())
}

pub fn offsite_credentials(args: &OffsiteArgs) -> Result<(String, ResticCredentials)> {
    let bucket = required(args.bucket.as_deref(), "B2_BUCKET")?;
    let account_id = required(args.account_id.as_deref(), "B2_ACCOUNT_ID")?;
    let account_key = required(args.account_key.as_deref(), "B2_ACCOUNT_KEY")?;
    let passphrase = match (&args.password, &args.password_file) {
        (Some(password), _) if !password.is_empty() => Passphrase::Value(password.clone()),
        (_, Some(file)) if !file.as_os_str().is_empty() => Passphrase::File(file.clone()),
        _ => {
            return Err(ConfigError::MissingSecret(
                "RESTIC_PASSWORD or RESTIC_PASSWORD_FILE".to_string(),
            )
            .into())
        }
    };
    Ok((
        bucket,
        ResticCredentials {
            account_id,
            account_key,
            passphrase,
        },
    ))
}

pub fn local_root(args: &LocalArgs) -> Result<PathBuf> {
    match &args.root {
        Some(root) if !root.as_os_str().is_empty() => Ok(root.clone()),
        _ => Err(ConfigError::MissingSecret("LOCAL_BACKUP_ROOT".to_string()).into()),
    }
}
