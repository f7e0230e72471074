use std::fmt;
use std::path::PathBuf;
use std::process::Command;

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::types::RunMode;
use crate::util::command::{run_captured, CommandOutput, CommandTracker};

/// restic: "backup completed, but some source files could not be read".
pub const PARTIAL_EXIT_CODE: i32 = 3;
const ALREADY_INITIALIZED_MARKERS: [&str; 2] = ["already initialized", "already exists"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryHandle(String);

impl RepositoryHandle {
    pub fn for_target(bucket: &str, target: &str) -> Self {
        RepositoryHandle(format!("b2:{}:{}", bucket, target))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepositoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRecord {
    pub id: String,
    pub timestamp: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupResult {
    Success,
    Partial { message: String },
    Failed { status: i32, message: String },
}

impl BackupResult {
    pub fn from_output(output: &CommandOutput) -> Self {
        match output.status {
            0 => BackupResult::Success,
            PARTIAL_EXIT_CODE => BackupResult::Partial {
                message: output.message(),
            },
            status => BackupResult::Failed {
                status,
                message: output.message(),
            },
        }
    }
}

pub trait RepositoryGateway {
    fn exists(&self, repo: &RepositoryHandle) -> bool;
    fn initialize(&self, repo: &RepositoryHandle) -> Result<()>;
    fn list_locks(&self, repo: &RepositoryHandle) -> Result<Vec<String>>;
    fn read_lock(&self, repo: &RepositoryHandle, id: &str) -> Result<LockRecord>;
    fn unlock(&self, repo: &RepositoryHandle) -> Result<()>;
    fn backup(&self, repo: &RepositoryHandle, paths: &[PathBuf], host: &str) -> Result<BackupResult>;
    fn prune(&self, repo: &RepositoryHandle, retention_args: &[String]) -> Result<()>;
    fn check(&self, repo: &RepositoryHandle) -> Result<()>;
}

#[derive(Debug, Clone)]
pub enum Passphrase {
    Value(String),
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ResticCredentials {
    pub account_id: String,
    pub account_key: String,
    pub passphrase: Passphrase,
}

#[derive(Debug, Deserialize)]
struct LockFile {
    #[serde(default)]
    time: Option<String>,
}

pub struct ResticGateway {
    program: String,
    credentials: ResticCredentials,
    run_mode: RunMode,
    tracker: CommandTracker,
}

impl ResticGateway {
    pub fn new(credentials: ResticCredentials, run_mode: RunMode, tracker: CommandTracker) -> Self {
        Self {
            program: "restic".to_string(),
            credentials,
            run_mode,
            tracker,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, repo: &RepositoryHandle) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-r").arg(repo.as_str());
        cmd.env("B2_ACCOUNT_ID", &self.credentials.account_id)
            .env("B2_ACCOUNT_KEY", &self.credentials.account_key);
        match &self.credentials.passphrase {
            Passphrase::Value(value) => {
                cmd.env("RESTIC_PASSWORD", value).env_remove("RESTIC_PASSWORD_FILE");
            }
            Passphrase::File(path) => {
                cmd.env("RESTIC_PASSWORD_FILE", path).env_remove("RESTIC_PASSWORD");
            }
        }
        cmd
    }

    fn run(&self, mut cmd: Command) -> Result<CommandOutput> {
        run_captured(&mut cmd, self.run_mode, &self.tracker)
    }

    fn run_checked(&self, operation: &str, cmd: Command) -> Result<CommandOutput> {
        let output = self.run(cmd)?;
        if !output.success() {
            return Err(EngineError::Failed {
                operation: operation.to_string(),
                status: output.status,
                message: output.message(),
            }
            .into());
        }
        Ok(output)
    }
}

impl RepositoryGateway for ResticGateway {
    fn exists(&self, repo: &RepositoryHandle) -> bool {
        let mut cmd = self.command(repo);
        cmd.arg("cat").arg("config");
        match self.run(cmd) {
            Ok(output) => output.success(),
            Err(err) => {
                debug!(repository = %repo, error = %err, "existence probe failed");
                false
            }
        }
    }

    fn initialize(&self, repo: &RepositoryHandle) -> Result<()> {
        let mut cmd = self.command(repo);
        cmd.arg("init");
        let output = self.run(cmd)?;
        if output.success() || is_already_initialized(&output) {
            return Ok(());
        }
        Err(EngineError::Init {
            repository: repo.to_string(),
            status: output.status,
            message: output.message(),
        }
        .into())
    }

    fn list_locks(&self, repo: &RepositoryHandle) -> Result<Vec<String>> {
        let mut cmd = self.command(repo);
        cmd.arg("list").arg("locks").arg("--no-lock");
        let output = self.run_checked("list locks", cmd)?;
        Ok(parse_lock_ids(&output.stdout))
    }

    fn read_lock(&self, repo: &RepositoryHandle, id: &str) -> Result<LockRecord> {
        let mut cmd = self.command(repo);
        cmd.arg("cat").arg("lock").arg(id).arg("--no-lock");
        let output = self.run_checked("cat lock", cmd)?;
        Ok(parse_lock_record(id, &output.stdout))
    }

    fn unlock(&self, repo: &RepositoryHandle) -> Result<()> {
        let mut cmd = self.command(repo);
        cmd.arg("unlock");
        self.run_checked("unlock", cmd).map(|_| ())
    }

    fn backup(&self, repo: &RepositoryHandle, paths: &[PathBuf], host: &str) -> Result<BackupResult> {
        let mut cmd = self.command(repo);
        cmd.arg("backup");
        for path in paths {
            cmd.arg(path);
        }
        cmd.arg("--host").arg(host);
        let output = self.run(cmd)?;
        Ok(BackupResult::from_output(&output))
    }

    fn prune(&self, repo: &RepositoryHandle, retention_args: &[String]) -> Result<()> {
        let mut cmd = self.command(repo);
        cmd.arg("forget").arg("--prune").args(retention_args);
        self.run_checked("forget --prune", cmd).map(|_| ())
    }

    fn check(&self, repo: &RepositoryHandle) -> Result<()> {
        let mut cmd = self.command(repo);
        cmd.arg("check");
        self.run_checked("check", cmd).map(|_| ())
    }
}

fn is_already_initialized(output: &CommandOutput) -> bool {
    let text = format!("{}\n{}", output.stdout, output.stderr).to_ascii_lowercase();
    ALREADY_INITIALIZED_MARKERS
        .iter()
        .any(|marker| text.contains(marker))
}

fn parse_lock_ids(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.chars().all(|c| c.is_ascii_hexdigit()))
        .map(str::to_string)
        .collect()
}

fn parse_lock_record(id: &str, body: &str) -> LockRecord {
    let timestamp = serde_json::from_str::<LockFile>(body)
        .ok()
        .and_then(|lock| lock.time)
        .and_then(|time| DateTime::parse_from_rfc3339(time.trim()).ok());
    LockRecord {
        id: id.to_string(),
        timestamp,
    }
}
