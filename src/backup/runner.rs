use std::sync::Arc;

use chrono::{Datelike, Local, Weekday};
use tracing::info;

use crate::backup::lock::{LockArbiter, LockDecision};
use crate::backup::paths::{resolve_locations, ResolvedPaths};
use crate::backup::repository::{BackupResult, RepositoryGateway, RepositoryHandle};
use crate::backup::retention::retention_args;
use crate::config::model::{Settings, Target};
use crate::error::Result;
use crate::notify::Notifier;
use crate::types::{BackupMode, RunMode, TargetOutcome, TargetStatus};

/// Processes one target end to end. An `Err` is a fatal condition for that target only.
pub trait TargetRunner {
    fn mode(&self) -> BackupMode;
    fn run_target(&self, target: &Target) -> Result<TargetOutcome>;
}

pub enum Preflight {
    Skip(TargetOutcome),
    Ready(ResolvedPaths),
}

pub fn preflight(target: &Target, mode: BackupMode, notifier: &dyn Notifier) -> Preflight {
    if !target.enabled {
        return Preflight::Skip(TargetOutcome::new(
            &target.name,
            TargetStatus::SkippedDisabled,
            "target disabled",
        ));
    }
    let mode_enabled = match mode {
        BackupMode::Offsite => target.offsite_enabled,
        BackupMode::Local => target.local_enabled,
    };
    if !mode_enabled {
        return Preflight::Skip(TargetOutcome::new(
            &target.name,
            TargetStatus::SkippedDisabled,
            format!("{} backup disabled", mode),
        ));
    }
    let resolved = resolve_locations(&target.name, &target.locations);
    for missing in &resolved.missing {
        notifier.notify(&format!("{}: source path missing: {}", target.name, missing));
    }
    if resolved.is_empty() {
        return Preflight::Skip(TargetOutcome::new(
            &target.name,
            TargetStatus::SkippedNoValidPaths,
            "no configured source path exists",
        ));
    }
    Preflight::Ready(resolved)
}

pub fn report(notifier: &dyn Notifier, outcome: TargetOutcome) -> TargetOutcome {
    notifier.notify(&outcome.message());
    outcome
}

pub struct OffsiteRunner<G: RepositoryGateway> {
    gateway: G,
    notifier: Arc<dyn Notifier>,
    arbiter: LockArbiter,
    bucket: String,
    host: String,
    check_weekday: Weekday,
    today: Weekday,
    run_mode: RunMode,
}

impl<G: RepositoryGateway> OffsiteRunner<G> {
    pub fn new(
        gateway: G,
        notifier: Arc<dyn Notifier>,
        settings: &Settings,
        bucket: impl Into<String>,
        host: impl Into<String>,
        run_mode: RunMode,
    ) -> Self {
        Self {
            gateway,
            notifier,
            arbiter: LockArbiter::new(settings.stale_lock_window, settings.strict_lock_listing),
            bucket: bucket.into(),
            host: host.into(),
            check_weekday: settings.check_weekday,
            today: Local::now().weekday(),
            run_mode,
        }
    }

    pub fn with_today(mut self, today: Weekday) -> Self {
        self.today = today;
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    fn ensure_repository(&self, target: &Target, repo: &RepositoryHandle) -> Result<()> {
        if self.gateway.exists(repo) {
            return Ok(());
        }
        self.notifier
            .notify(&format!("{}: initializing repository {}", target.name, repo));
        self.gateway.initialize(repo)
    }

    fn apply_retention(&self, target: &Target, repo: &RepositoryHandle) {
        if self.run_mode.safe_mode {
            self.notifier
                .notify(&format!("{}: retention skipped (safe mode)", target.name));
            return;
        }
        let args = retention_args(target.retention.as_ref());
        info!(target = %target.name, policy = %args.join(" "), "applying retention");
        if let Err(err) = self.gateway.prune(repo, &args) {
            self.notifier
                .notify(&format!("{}: retention failed: {}", target.name, err));
        }
    }

    fn check_due(&self, target: &Target) -> bool {
        target.check_weekly && self.today == self.check_weekday
    }

    fn run_check(&self, target: &Target, repo: &RepositoryHandle) {
        if !self.check_due(target) {
            return;
        }
        self.notifier
            .notify(&format!("{}: running weekly integrity check", target.name));
        match self.gateway.check(repo) {
            Ok(()) => self
                .notifier
                .notify(&format!("{}: integrity check passed", target.name)),
            Err(err) => self
                .notifier
                .notify(&format!("{}: integrity check failed: {}", target.name, err)),
        }
    }
}

impl<G: RepositoryGateway> TargetRunner for OffsiteRunner<G> {
    fn mode(&self) -> BackupMode {
        BackupMode::Offsite
    }

    fn run_target(&self, target: &Target) -> Result<TargetOutcome> {
        let notifier = self.notifier.as_ref();
        let paths = match preflight(target, BackupMode::Offsite, notifier) {
            Preflight::Skip(outcome) => return Ok(report(notifier, outcome)),
            Preflight::Ready(resolved) => resolved.existing,
        };

        let repo = RepositoryHandle::for_target(&self.bucket, &target.name);
        if let Err(err) = self.ensure_repository(target, &repo) {
            return Ok(report(notifier, TargetOutcome::failed(&target.name, err.to_string())));
        }

        match self.arbiter.arbitrate(&self.gateway, &repo) {
            LockDecision::Locked { detail, .. } => {
                return Ok(report(
                    notifier,
                    TargetOutcome::new(&target.name, TargetStatus::SkippedLocked, detail),
                ));
            }
            LockDecision::Proceed { recovered: true } => {
                notifier.notify(&format!("{}: removed stale lock on {}", target.name, repo));
            }
            LockDecision::Proceed { recovered: false } => {}
        }

        notifier.notify(&format!(
            "{}: backing up {} path(s) to {}",
            target.name,
            paths.len(),
            repo
        ));
        let (status, detail) = match self.gateway.backup(&repo, &paths, &self.host)? {
            BackupResult::Success => (TargetStatus::Success, String::new()),
            BackupResult::Partial { message } => (
                TargetStatus::SuccessPartial,
                format!("some source files could not be read: {}", message),
            ),
            BackupResult::Failed { status, message } => {
                return Ok(report(
                    notifier,
                    TargetOutcome::failed(
                        &target.name,
                        format!("backup failed with exit code {}: {}", status, message),
                    ),
                ));
            }
        };

        self.apply_retention(target, &repo);
        self.run_check(target, &repo);
        Ok(report(notifier, TargetOutcome::new(&target.name, status, detail)))
    }
}
