use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, FixedOffset, Utc};

use crate::backup::mirror::Mirror;
use crate::backup::repository::{BackupResult, LockRecord, RepositoryGateway, RepositoryHandle};
use crate::error::{BackvaultError, EngineError, Result};
use crate::notify::Notifier;
use crate::util::command::CommandOutput;

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages().iter().any(|m| m.contains(needle))
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, text: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(text.to_string());
        }
    }
}

pub fn lock_aged(id: &str, minutes: i64) -> LockRecord {
    let time: DateTime<FixedOffset> = (Utc::now() - Duration::minutes(minutes)).into();
    LockRecord {
        id: id.to_string(),
        timestamp: Some(time),
    }
}

pub fn lock_without_time(id: &str) -> LockRecord {
    LockRecord {
        id: id.to_string(),
        timestamp: None,
    }
}

pub struct FakeGateway {
    pub exists: bool,
    pub init_error: Option<String>,
    pub locks: RefCell<Vec<LockRecord>>,
    pub list_fails: bool,
    pub unreadable_locks: Vec<String>,
    pub unlock_clears: bool,
    pub backup_result: BackupResult,
    pub prune_fails: bool,
    pub check_fails: bool,
    pub calls: RefCell<Vec<String>>,
    pub backup_paths: RefCell<Vec<Vec<PathBuf>>>,
    pub backup_hosts: RefCell<Vec<String>>,
    pub prune_args: RefCell<Vec<Vec<String>>>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            exists: true,
            init_error: None,
            locks: RefCell::new(Vec::new()),
            list_fails: false,
            unreadable_locks: Vec::new(),
            unlock_clears: true,
            backup_result: BackupResult::Success,
            prune_fails: false,
            check_fails: false,
            calls: RefCell::new(Vec::new()),
            backup_paths: RefCell::new(Vec::new()),
            backup_hosts: RefCell::new(Vec::new()),
            prune_args: RefCell::new(Vec::new()),
        }
    }
}

impl FakeGateway {
    pub fn with_locks(locks: Vec<LockRecord>) -> Self {
        Self {
            locks: RefCell::new(locks),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn called(&self, op: &str) -> bool {
        self.calls.borrow().iter().any(|c| c == op)
    }

    fn record(&self, op: &str) {
        self.calls.borrow_mut().push(op.to_string());
    }

    fn failure(operation: &str) -> BackvaultError {
        EngineError::Failed {
            operation: operation.to_string(),
            status: 1,
            message: "simulated failure".to_string(),
        }
        .into()
    }
}

impl RepositoryGateway for FakeGateway {
    fn exists(&self, _repo: &RepositoryHandle) -> bool {
        self.record("exists");
        self.exists
    }

    fn initialize(&self, repo: &RepositoryHandle) -> Result<()> {
        self.record("init");
        match &self.init_error {
            Some(message) => Err(EngineError::Init {
                repository: repo.to_string(),
                status: 1,
                message: message.clone(),
            }
            .into()),
            None => Ok(()),
        }
    }

    fn list_locks(&self, _repo: &RepositoryHandle) -> Result<Vec<String>> {
        self.record("list_locks");
        if self.list_fails {
            return Err(Self::failure("list locks"));
        }
        Ok(self.locks.borrow().iter().map(|l| l.id.clone()).collect())
    }

    fn read_lock(&self, _repo: &RepositoryHandle, id: &str) -> Result<LockRecord> {
        self.record(&format!("read_lock:{}", id));
        if self.unreadable_locks.iter().any(|u| u == id) {
            return Err(Self::failure("cat lock"));
        }
        self.locks
            .borrow()
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .ok_or_else(|| Self::failure("cat lock"))
    }

    fn unlock(&self, _repo: &RepositoryHandle) -> Result<()> {
        self.record("unlock");
        if self.unlock_clears {
            self.locks.borrow_mut().clear();
            Ok(())
        } else {
            Err(Self::failure("unlock"))
        }
    }

    fn backup(&self, _repo: &RepositoryHandle, paths: &[PathBuf], host: &str) -> Result<BackupResult> {
        self.record("backup");
        self.backup_paths.borrow_mut().push(paths.to_vec());
        self.backup_hosts.borrow_mut().push(host.to_string());
        Ok(self.backup_result.clone())
    }

    fn prune(&self, _repo: &RepositoryHandle, retention_args: &[String]) -> Result<()> {
        self.record("prune");
        self.prune_args.borrow_mut().push(retention_args.to_vec());
        if self.prune_fails {
            return Err(Self::failure("forget --prune"));
        }
        Ok(())
    }

    fn check(&self, _repo: &RepositoryHandle) -> Result<()> {
        self.record("check");
        if self.check_fails {
            return Err(Self::failure("check"));
        }
        Ok(())
    }
}

pub struct FakeMirror {
    pub statuses: RefCell<Vec<i32>>,
    pub invocations: RefCell<Vec<(Vec<PathBuf>, PathBuf)>>,
}

impl FakeMirror {
    pub fn new(statuses: Vec<i32>) -> Self {
        Self {
            statuses: RefCell::new(statuses),
            invocations: RefCell::new(Vec::new()),
        }
    }
}

impl Mirror for FakeMirror {
    fn mirror(&self, sources: &[PathBuf], dest: &Path) -> Result<CommandOutput> {
        self.invocations
            .borrow_mut()
            .push((sources.to_vec(), dest.to_path_buf()));
        let mut statuses = self.statuses.borrow_mut();
        let status = if statuses.is_empty() { 0 } else { statuses.remove(0) };
        Ok(CommandOutput {
            status,
            stdout: "Number of files: 3\nTotal transferred file size: 12 bytes\n".to_string(),
            stderr: String::new(),
        })
    }
}
