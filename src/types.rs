use std::fmt;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunMode {
    pub dry_run: bool,
    pub safe_mode: bool,
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupMode {
    Offsite,
    Local,
}

impl BackupMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupMode::Offsite => "offsite",
            BackupMode::Local => "local",
        }
    }

    pub fn required_tools(&self) -> &'static [&'static str] {
        match self {
            BackupMode::Offsite => &["restic"],
            BackupMode::Local => &["rsync", "nice", "ionice"],
        }
    }
}

impl fmt::Display for BackupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStatus {
    SkippedDisabled,
    SkippedNoValidPaths,
    SkippedLocked,
    Success,
    SuccessPartial,
    Failed,
}

impl TargetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetStatus::SkippedDisabled => "skipped-disabled",
            TargetStatus::SkippedNoValidPaths => "skipped-no-valid-paths",
            TargetStatus::SkippedLocked => "skipped-locked",
            TargetStatus::Success => "success",
            TargetStatus::SuccessPartial => "success-partial",
            TargetStatus::Failed => "failed",
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            TargetStatus::SkippedDisabled
                | TargetStatus::SkippedNoValidPaths
                | TargetStatus::SkippedLocked
        )
    }

    pub fn is_processed(&self) -> bool {
        matches!(self, TargetStatus::Success | TargetStatus::SuccessPartial)
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOutcome {
    pub target: String,
    pub status: TargetStatus,
    pub detail: String,
}

impl TargetOutcome {
    pub fn new(target: &str, status: TargetStatus, detail: impl Into<String>) -> Self {
        Self {
            target: target.to_string(),
            status,
            detail: detail.into(),
        }
    }

    pub fn failed(target: &str, detail: impl Into<String>) -> Self {
        Self::new(target, TargetStatus::Failed, detail)
    }

    pub fn message(&self) -> String {
        if self.detail.is_empty() {
            format!("{}: {}", self.target, self.status)
        } else {
            format!("{}: {} ({})", self.target, self.status, self.detail)
        }
    }
}
