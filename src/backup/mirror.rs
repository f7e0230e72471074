use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::backup::runner::{preflight, report, Preflight, TargetRunner};
use crate::config::model::{Settings, Target};
use crate::error::{BackvaultError, Result};
use crate::notify::Notifier;
use crate::types::{BackupMode, RunMode, TargetOutcome, TargetStatus};
use crate::util::command::{nice_ionice, run_captured, CommandOutput, CommandTracker};

/// rsync: "partial transfer due to vanished source files".
pub const PARTIAL_EXIT_CODE: i32 = 24;
const MIRROR_ATTEMPTS: u32 = 3;
const OUTPUT_TAIL_LINES: usize = 5;

pub trait Mirror {
    fn mirror(&self, sources: &[PathBuf], dest: &Path) -> Result<CommandOutput>;
}

pub struct RsyncMirror {
    extra: Vec<String>,
    run_mode: RunMode,
    tracker: CommandTracker,
}

impl RsyncMirror {
    pub fn new(extra: Vec<String>, run_mode: RunMode, tracker: CommandTracker) -> Self {
        Self {
            extra,
            run_mode,
            tracker,
        }
    }
}

impl Mirror for RsyncMirror {
    fn mirror(&self, sources: &[PathBuf], dest: &Path) -> Result<CommandOutput> {
        let args = rsync_args(sources, dest, &self.extra);
        let mut cmd = nice_ionice(&args);
        run_captured(&mut cmd, self.run_mode, &self.tracker)
    }
}

pub fn rsync_args(sources: &[PathBuf], dest: &Path, extra: &[String]) -> Vec<String> {
    let mut args = vec!["rsync".to_string(), "-a".to_string(), "--stats".to_string()];
    args.extend(extra.iter().cloned());
    for source in sources {
        let text = source.to_string_lossy().to_string();
        if source.is_dir() && !text.ends_with('/') {
            args.push(format!("{}/", text));
        } else {
            args.push(text);
        }
    }
    args.push(format!("{}/", dest.to_string_lossy().trim_end_matches('/')));
    args
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneReport {
    pub deleted: Vec<PathBuf>,
    pub retained: usize,
    pub errors: usize,
}

fn source_exists(sources: &[PathBuf], rel: &Path) -> bool {
    sources.iter().any(|source| {
        if source.is_dir() {
            fs::symlink_metadata(source.join(rel)).is_ok()
        } else {
            source.file_name().map(Path::new) == Some(rel)
        }
    })
}

/// Deletes mirrored files that are older than `grace` AND absent from every source.
pub fn prune_mirror(
    dest: &Path,
    sources: &[PathBuf],
    grace: Duration,
    now: DateTime<Utc>,
    run_mode: RunMode,
) -> PruneReport {
    let mut report = PruneReport::default();
    for entry in WalkDir::new(dest).follow_links(false).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "mirror scan failed");
                report.errors += 1;
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        let Ok(rel) = path.strip_prefix(dest) else {
            continue;
        };
        let modified: DateTime<Utc> = match fs::symlink_metadata(path).and_then(|m| m.modified()) {
            Ok(time) => time.into(),
            Err(err) => {
                debug!(path = %path.display(), error = %err, "no mtime; keeping");
                report.retained += 1;
                continue;
            }
        };
        if now.signed_duration_since(modified) <= grace || source_exists(sources, rel) {
            report.retained += 1;
            continue;
        }
        if run_mode.dry_run {
            println!("dry-run: rm {}", path.display());
            report.deleted.push(path.to_path_buf());
            continue;
        }
        match fs::remove_file(path) {
            Ok(()) => report.deleted.push(path.to_path_buf()),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "delete failed");
                report.errors += 1;
            }
        }
    }
    report
}

pub struct MirrorRunner<M: Mirror> {
    mirror: M,
    notifier: Arc<dyn Notifier>,
    root: PathBuf,
    grace: Duration,
    run_mode: RunMode,
}

impl<M: Mirror> MirrorRunner<M> {
    pub fn new(
        mirror: M,
        notifier: Arc<dyn Notifier>,
        settings: &Settings,
        root: impl Into<PathBuf>,
        run_mode: RunMode,
    ) -> Self {
        Self {
            mirror,
            notifier,
            root: root.into(),
            grace: settings.mirror_grace,
            run_mode,
        }
    }

    pub fn mirror(&self) -> &M {
        &self.mirror
    }

    fn mirror_with_retries(&self, sources: &[PathBuf], dest: &Path) -> Result<CommandOutput> {
        let mut output = self.mirror.mirror(sources, dest)?;
        for attempt in 2..=MIRROR_ATTEMPTS {
            if output.status == 0 || output.status == PARTIAL_EXIT_CODE {
                break;
            }
            println!(
                "rsync failed with exit code {}; retrying ({}/{})",
                output.status, attempt, MIRROR_ATTEMPTS
            );
            output = self.mirror.mirror(sources, dest)?;
        }
        Ok(output)
    }

    fn prune(&self, target: &Target, missing: &[String], sources: &[PathBuf], dest: &Path) {
        if self.run_mode.safe_mode {
            self.notifier
                .notify(&format!("{}: mirror prune skipped (safe mode)", target.name));
            return;
        }
        if !missing.is_empty() {
            self.notifier.notify(&format!(
                "{}: mirror prune skipped; {} source location(s) missing",
                target.name,
                missing.len()
            ));
            return;
        }
        let report = prune_mirror(dest, sources, self.grace, Utc::now(), self.run_mode);
        if !report.deleted.is_empty() || report.errors > 0 {
            self.notifier.notify(&format!(
                "{}: pruned {} file(s) absent from source for over {} days ({} error(s))",
                target.name,
                report.deleted.len(),
                self.grace.num_days(),
                report.errors
            ));
        }
    }
}

impl<M: Mirror> TargetRunner for MirrorRunner<M> {
    fn mode(&self) -> BackupMode {
        BackupMode::Local
    }

    fn run_target(&self, target: &Target) -> Result<TargetOutcome> {
        let notifier = self.notifier.as_ref();
        let resolved = match preflight(target, BackupMode::Local, notifier) {
            Preflight::Skip(outcome) => return Ok(report(notifier, outcome)),
            Preflight::Ready(resolved) => resolved,
        };

        let dest = self.root.join(&target.name);
        if !dest.exists() {
            if self.run_mode.dry_run {
                println!("dry-run: mkdir -p {}", dest.display());
            } else {
                fs::create_dir_all(&dest).map_err(|e| {
                    BackvaultError::message(format!("create {}: {}", dest.display(), e))
                })?;
            }
        }

        notifier.notify(&format!(
            "{}: mirroring {} path(s) to {}",
            target.name,
            resolved.existing.len(),
            dest.display()
        ));
        let output = self.mirror_with_retries(&resolved.existing, &dest)?;
        let tail = output.tail(OUTPUT_TAIL_LINES);
        let status = match output.status {
            0 => TargetStatus::Success,
            PARTIAL_EXIT_CODE => TargetStatus::SuccessPartial,
            code => {
                return Ok(report(
                    notifier,
                    TargetOutcome::failed(
                        &target.name,
                        format!("rsync failed with exit code {}: {}", code, tail),
                    ),
                ));
            }
        };

        self.prune(target, &resolved.missing, &resolved.existing, &dest);
        Ok(report(notifier, TargetOutcome::new(&target.name, status, tail)))
    }
}
