use std::path::PathBuf;

use chrono::{Duration, Weekday};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::backup::retention::RetentionSpec;

pub const DEFAULT_STALE_LOCK_MINUTES: i64 = 30;
pub const DEFAULT_MIRROR_GRACE_DAYS: i64 = 60;
pub const DEFAULT_CHECK_WEEKDAY: Weekday = Weekday::Sun;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub targets: Vec<Value>,
    #[serde(default)]
    pub options: ConfigOptions,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOptions {
    #[serde(default)]
    pub stale_lock_minutes: Option<i64>,
    #[serde(default)]
    pub mirror_grace_days: Option<i64>,
    #[serde(default)]
    pub check_weekday: Option<String>,
    #[serde(default)]
    pub strict_lock_listing: Option<bool>,
    #[serde(default)]
    pub log_file: Option<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum LocationSpec {
    Path(String),
    Object { path: String },
}

impl LocationSpec {
    pub fn path(&self) -> &str {
        match self {
            LocationSpec::Path(path) => path,
            LocationSpec::Object { path } => path,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TargetConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub locations: Vec<LocationSpec>,
    #[serde(default = "default_true")]
    pub offsite_enabled: bool,
    #[serde(default)]
    pub local_enabled: bool,
    #[serde(default)]
    pub retention: Option<Map<String, Value>>,
    #[serde(default)]
    pub check_weekly: bool,
}

#[derive(Debug, Clone)]
pub struct Target {
    pub name: String,
    pub enabled: bool,
    pub locations: Vec<String>,
    pub offsite_enabled: bool,
    pub local_enabled: bool,
    pub retention: Option<RetentionSpec>,
    pub check_weekly: bool,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub stale_lock_window: Duration,
    pub mirror_grace: Duration,
    pub check_weekday: Weekday,
    pub strict_lock_listing: bool,
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stale_lock_window: Duration::minutes(DEFAULT_STALE_LOCK_MINUTES),
            mirror_grace: Duration::days(DEFAULT_MIRROR_GRACE_DAYS),
            check_weekday: DEFAULT_CHECK_WEEKDAY,
            strict_lock_listing: false,
            log_file: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub targets: Vec<Target>,
    pub settings: Settings,
}

fn default_true() -> bool {
    true
}
