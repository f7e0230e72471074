use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use chrono::Local;
use serde::Serialize;
use tracing::{info, warn};

const WEBHOOK_TIMEOUT_SECS: u64 = 10;
const WEBHOOK_ATTEMPTS: u32 = 3;
const WEBHOOK_RETRY_PAUSE_MS: u64 = 1500;

/// Best-effort sink for human-readable progress and outcome messages.
/// Implementations must never fail the caller.
pub trait Notifier: Send + Sync {
    fn notify(&self, text: &str);
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

#[derive(Debug, Clone)]
pub struct NotifyLog {
    path: PathBuf,
}

impl NotifyLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, text: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        writeln!(file, "{}", format_log_line(&stamp, text))
    }
}

fn format_log_line(stamp: &str, text: &str) -> String {
    format!("[{}] {}", stamp, text)
}

pub struct WebhookNotifier {
    url: Option<String>,
    client: Option<reqwest::blocking::Client>,
    log: Option<NotifyLog>,
}

impl WebhookNotifier {
    pub fn new(url: Option<String>, log: Option<NotifyLog>) -> Self {
        let url = url.filter(|u| !u.trim().is_empty());
        let client = match &url {
            Some(_) => match reqwest::blocking::Client::builder()
                .connect_timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
                .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
                .build()
            {
                Ok(client) => Some(client),
                Err(err) => {
                    warn!(error = %err, "notification client setup failed; webhook disabled");
                    None
                }
            },
            None => None,
        };
        Self { url, client, log }
    }

    fn post(&self, text: &str) {
        let (Some(url), Some(client)) = (&self.url, &self.client) else {
            return;
        };
        for attempt in 1..=WEBHOOK_ATTEMPTS {
            let result = client
                .post(url)
                .json(&WebhookPayload { text })
                .send()
                .and_then(|res| res.error_for_status());
            match result {
                Ok(_) => return,
                Err(err) => {
                    warn!(attempt, error = %err, "notification delivery failed");
                    if attempt < WEBHOOK_ATTEMPTS {
                        thread::sleep(Duration::from_millis(WEBHOOK_RETRY_PAUSE_MS));
                    }
                }
            }
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, text: &str) {
        info!(target: "backvault::notify", "{}", text);
        if let Some(log) = &self.log {
            if let Err(err) = log.append(text) {
                warn!(path = %log.path().display(), error = %err, "notification log write failed");
            }
        }
        self.post(text);
    }
}
