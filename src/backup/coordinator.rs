use std::sync::Arc;

use chrono::{DateTime, Duration, Local};
use tracing::info;

use crate::backup::runner::TargetRunner;
use crate::config::model::Target;
use crate::notify::Notifier;
use crate::types::{BackupMode, TargetOutcome};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub mode: BackupMode,
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    pub outcomes: Vec<TargetOutcome>,
}

impl RunSummary {
    pub fn start(mode: BackupMode, total: usize) -> Self {
        Self {
            mode,
            total,
            processed: 0,
            failed: 0,
            skipped: 0,
            started_at: Local::now(),
            finished_at: None,
            outcomes: Vec::with_capacity(total),
        }
    }

    pub fn record(&mut self, outcome: TargetOutcome) {
        if outcome.status.is_processed() {
            self.processed += 1;
        } else if outcome.status.is_skip() {
            self.skipped += 1;
        } else {
            self.failed += 1;
        }
        self.outcomes.push(outcome);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Local::now());
    }

    pub fn attempted(&self) -> usize {
        self.processed + self.failed
    }

    pub fn elapsed(&self) -> Duration {
        self.finished_at
            .unwrap_or_else(Local::now)
            .signed_duration_since(self.started_at)
    }

    pub fn render(&self) -> String {
        let finished = self
            .finished_at
            .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_else(|| "-".to_string());
        let mut text = format!(
            "{} backup finished: {} target(s), {} processed, {} failed, {} skipped in {} (started {}, finished {})",
            self.mode,
            self.total,
            self.processed,
            self.failed,
            self.skipped,
            format_elapsed(self.elapsed()),
            self.started_at.format(TIMESTAMP_FORMAT),
            finished
        );
        for outcome in &self.outcomes {
            text.push_str("\n  ");
            text.push_str(&outcome.message());
        }
        text
    }
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.num_seconds().max(0);
    format!("{}h{:02}m{:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

pub struct RunCoordinator<R: TargetRunner> {
    runner: R,
    notifier: Arc<dyn Notifier>,
}

impl<R: TargetRunner> RunCoordinator<R> {
    pub fn new(runner: R, notifier: Arc<dyn Notifier>) -> Self {
        Self { runner, notifier }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn run(&self, targets: &[Target]) -> RunSummary {
        let mode = self.runner.mode();
        let mut summary = RunSummary::start(mode, targets.len());
        self.notifier.notify(&format!(
            "{} backup started: {} target(s)",
            mode,
            targets.len()
        ));
        for target in targets {
            info!(target = %target.name, mode = %mode, "processing target");
            let outcome = match self.runner.run_target(target) {
                Ok(outcome) => outcome,
                Err(err) => {
                    let outcome = TargetOutcome::failed(&target.name, err.to_string());
                    self.notifier.notify(&outcome.message());
                    outcome
                }
            };
            summary.record(outcome);
        }
        summary.finish();
        self.notifier.notify(&summary.render());
        summary
    }
}
