use std::sync::Arc;
use std::thread;

use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};

use crate::notify::Notifier;
use crate::util::command::CommandTracker;

pub fn abort_message(signal: i32, running: Option<&str>) -> String {
    let code = 128 + signal;
    match running {
        Some(command) => format!(
            "backup aborted by signal {} while running `{}` (exit code {})",
            signal, command, code
        ),
        None => format!("backup aborted by signal {} (exit code {})", signal, code),
    }
}

pub fn signal_handler(tracker: &CommandTracker, notifier: Arc<dyn Notifier>) {
    let tracker = tracker.clone();
    thread::spawn(move || {
        let mut signals = match Signals::new([SIGINT, SIGTERM]) {
            Ok(signals) => signals,
            Err(err) => {
                eprintln!("signal handler setup failed: {}", err);
                return;
            }
        };
        if let Some(signal) = signals.forever().next() {
            let running = match tracker.lock() {
                Ok(current) => current.clone(),
                Err(_) => None,
            };
            notifier.notify(&abort_message(signal, running.as_deref()));
            std::process::exit(128 + signal);
        }
    });
}
