use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::{EngineError, Result};
use crate::types::RunMode;

pub type CommandTracker = Arc<Mutex<Option<String>>>;

pub fn new_tracker() -> CommandTracker {
    Arc::new(Mutex::new(None))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    pub fn tail(&self, lines: usize) -> String {
        let all: Vec<&str> = self
            .stdout
            .lines()
            .chain(self.stderr.lines())
            .map(str::trim_end)
            .filter(|l| !l.trim().is_empty())
            .collect();
        let start = all.len().saturating_sub(lines);
        all[start..].join("\n")
    }

    pub fn message(&self) -> String {
        let stderr = self.stderr.trim();
        let source = if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        };
        source
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("")
            .trim()
            .to_string()
    }
}

pub fn format_command(cmd: &Command) -> String {
    let program = cmd.get_program().to_string_lossy();
    let args: Vec<String> = cmd
        .get_args()
        .map(|a| a.to_string_lossy().to_string())
        .collect();
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

pub fn maybe_print_command(cmd: &Command, run_mode: RunMode) {
    if !run_mode.dry_run && !run_mode.verbose {
        return;
    }
    let prefix = if run_mode.dry_run { "dry-run: " } else { "" };
    println!("{}{}", prefix, format_command(cmd));
}

pub fn run_captured(
    cmd: &mut Command,
    run_mode: RunMode,
    tracker: &CommandTracker,
) -> Result<CommandOutput> {
    maybe_print_command(cmd, run_mode);
    if run_mode.dry_run {
        return Ok(CommandOutput::default());
    }
    let line = format_command(cmd);
    set_current(tracker, Some(line.clone()));
    let output = cmd.output();
    set_current(tracker, None);
    let output = output.map_err(|e| EngineError::Spawn {
        program: cmd.get_program().to_string_lossy().to_string(),
        reason: e.to_string(),
    })?;
    let status = output.status.code().unwrap_or(1);
    debug!(command = %line, status, "command finished");
    Ok(CommandOutput {
        status,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

fn set_current(tracker: &CommandTracker, value: Option<String>) {
    if let Ok(mut current) = tracker.lock() {
        *current = value;
    }
}

pub fn nice_ionice(args: &[String]) -> Command {
    let mut cmd = Command::new("nice");
    cmd.arg("-n")
        .arg("19")
        .arg("ionice")
        .arg("-c")
        .arg("3")
        .arg("-n7");
    for arg in args {
        cmd.arg(arg);
    }
    cmd
}

pub fn find_in_path(tool: &str) -> Option<PathBuf> {
    if tool.contains('/') {
        let path = Path::new(tool);
        return path.is_file().then(|| path.to_path_buf());
    }
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(tool))
        .find(|candidate| candidate.is_file())
}

pub fn require_tools(tools: &[&str]) -> Result<()> {
    let missing: Vec<&str> = tools
        .iter()
        .copied()
        .filter(|tool| find_in_path(tool).is_none())
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(EngineError::MissingTool(missing.join(", ")).into())
}
