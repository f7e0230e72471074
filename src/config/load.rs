use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{Duration, Weekday};
use serde_json::Value;

use crate::backup::retention::RetentionSpec;
use crate::config::model::{Config, ConfigOptions, RuntimeConfig, Settings, Target, TargetConfig};
use crate::error::{BackvaultError, ConfigError, Result};
use crate::util::paths::is_safe_name;

pub fn load_config(path: &Path) -> Result<RuntimeConfig> {
    let mut contents = String::new();
    File::open(path)
        .map_err(|e| BackvaultError::message(format!("open config {}: {}", path.display(), e)))?
        .read_to_string(&mut contents)
        .map_err(|e| BackvaultError::message(format!("read config {}: {}", path.display(), e)))?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> Result<RuntimeConfig> {
    let value: Value =
        serde_json::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
    let (raw_targets, options) = match value {
        Value::Array(items) => (items, ConfigOptions::default()),
        Value::Object(_) => {
            let cfg: Config =
                serde_json::from_value(value).map_err(|e| ConfigError::Parse(e.to_string()))?;
            (cfg.targets, cfg.options)
        }
        _ => {
            return Err(ConfigError::Parse(
                "expected a list of targets or an object with a targets list".to_string(),
            )
            .into())
        }
    };
    let mut configs = Vec::with_capacity(raw_targets.len());
    for (index, raw) in raw_targets.into_iter().enumerate() {
        let target: TargetConfig = serde_json::from_value(raw)
            .map_err(|e| ConfigError::Parse(format!("target {}: {}", index + 1, e)))?;
        configs.push(target);
    }
    Ok(RuntimeConfig {
        targets: parse_targets(configs)?,
        settings: parse_settings(options)?,
    })
}

fn parse_targets(configs: Vec<TargetConfig>) -> Result<Vec<Target>> {
    let mut targets = Vec::with_capacity(configs.len());
    let mut names = HashSet::new();
    for target in configs {
        if target.name.trim().is_empty() {
            return Err(ConfigError::Invalid("target name is required".to_string()).into());
        }
        if !is_safe_name(&target.name) {
            return Err(ConfigError::Invalid(format!(
                "target {} name must use only letters, digits, '.', '-', '_'",
                target.name
            ))
            .into());
        }
        if !names.insert(target.name.clone()) {
            return Err(ConfigError::Invalid(format!("duplicate target name {}", target.name)).into());
        }
        let mut locations = Vec::with_capacity(target.locations.len());
        for (index, location) in target.locations.iter().enumerate() {
            let path = location.path();
            if path.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "target {}: location {} path is empty",
                    target.name,
                    index + 1
                ))
                .into());
            }
            locations.push(path.to_string());
        }
        targets.push(Target {
            name: target.name,
            enabled: target.enabled,
            locations,
            offsite_enabled: target.offsite_enabled,
            local_enabled: target.local_enabled,
            retention: target.retention.as_ref().map(RetentionSpec::from_map),
            check_weekly: target.check_weekly,
        });
    }
    Ok(targets)
}

fn parse_settings(options: ConfigOptions) -> Result<Settings> {
    let mut settings = Settings::default();
    if let Some(minutes) = options.stale_lock_minutes {
        if minutes <= 0 {
            return Err(ConfigError::Invalid("staleLockMinutes must be positive".to_string()).into());
        }
        settings.stale_lock_window = Duration::try_minutes(minutes).ok_or_else(|| {
            ConfigError::Invalid("staleLockMinutes out of range".to_string())
        })?;
    }
    if let Some(days) = options.mirror_grace_days {
        if days <= 0 {
            return Err(ConfigError::Invalid("mirrorGraceDays must be positive".to_string()).into());
        }
        settings.mirror_grace = Duration::try_days(days).ok_or_else(|| {
            ConfigError::Invalid("mirrorGraceDays out of range".to_string())
        })?;
    }
    if let Some(day) = options.check_weekday {
        settings.check_weekday = day.trim().parse::<Weekday>().map_err(|_| {
            ConfigError::Invalid(format!("checkWeekday {} is not a weekday", day))
        })?;
    }
    if let Some(strict) = options.strict_lock_listing {
        settings.strict_lock_listing = strict;
    }
    settings.log_file = options
        .log_file
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_config_with_options() {
        let mut file = NamedTempFile::new().expect("tempfile");
        let json = r#"{
  "options": { "staleLockMinutes": 45, "checkWeekday": "wed", "strictLockListing": true },
  "targets": [
    {
      "name": "photos",
      "locations": ["/srv/photos", { "path": "/srv/raw" }],
      "localEnabled": true,
      "retention": { "keepDaily": 7, "keepWeekly": 4 },
      "checkWeekly": true
    },
    { "name": "scratch", "enabled": false, "locations": [] }
  ]
}"#;
        file.write_all(json.as_bytes()).expect("write");
        let cfg = load_config(file.path()).expect("load");
        assert_eq!(cfg.targets.len(), 2);
        let photos = &cfg.targets[0];
        assert!(photos.enabled);
        assert!(photos.offsite_enabled);
        assert!(photos.local_enabled);
        assert!(photos.check_weekly);
        assert_eq!(photos.locations, vec!["/srv/photos", "/srv/raw"]);
        assert_eq!(
            photos.retention.as_ref().map(|r| r.to_args()),
            Some(vec![
                "--keep-daily".to_string(),
                "7".to_string(),
                "--keep-weekly".to_string(),
                "4".to_string()
            ])
        );
        assert!(!cfg.targets[1].enabled);
        assert_eq!(cfg.settings.stale_lock_window, Duration::minutes(45));
        assert_eq!(cfg.settings.check_weekday, Weekday::Wed);
        assert!(cfg.settings.strict_lock_listing);
    }

    #[test]
    fn bare_target_list_uses_defaults() {
        let cfg = parse_config(r#"[{"name":"docs","locations":["/home"],"retention":null}]"#)
            .expect("parse");
        let docs = &cfg.targets[0];
        assert!(docs.enabled);
        assert!(!docs.local_enabled);
        assert!(!docs.check_weekly);
        assert!(docs.retention.is_none());
        assert_eq!(cfg.settings.stale_lock_window, Duration::minutes(30));
        assert_eq!(cfg.settings.mirror_grace, Duration::days(60));
        assert_eq!(cfg.settings.check_weekday, Weekday::Sun);
        assert!(!cfg.settings.strict_lock_listing);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = parse_config(r#"[{"name":"a","locations":["/a"]},{"name":"a","locations":["/b"]}]"#)
            .unwrap_err();
        assert!(err.to_string().contains("duplicate target name a"));
    }

    #[test]
    fn unsafe_names_are_rejected() {
        let err = parse_config(r#"[{"name":"../etc","locations":["/a"]}]"#).unwrap_err();
        assert!(matches!(err, BackvaultError::Config(ConfigError::Invalid(_))));
    }

    #[test]
    fn syntax_errors_are_parse_errors() {
        let err = parse_config("{ not json").unwrap_err();
        assert!(matches!(err, BackvaultError::Config(ConfigError::Parse(_))));
    }

    #[test]
    fn oversized_durations_are_rejected() {
        let err = parse_config(r#"{"targets":[],"options":{"staleLockMinutes":9223372036854775807}}"#)
            .unwrap_err();
        assert!(matches!(err, BackvaultError::Config(ConfigError::Invalid(_))));
        assert!(err.to_string().contains("staleLockMinutes out of range"));
        let err = parse_config(r#"{"targets":[],"options":{"mirrorGraceDays":9223372036854775807}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("mirrorGraceDays out of range"));
    }

    #[test]
    fn target_errors_name_the_field_and_position() {
        let err = parse_config(r#"[{"name":"docs","locations":["/a"]},{"locations":["/b"]}]"#)
            .unwrap_err();
        assert!(matches!(err, BackvaultError::Config(ConfigError::Parse(_))));
        let text = err.to_string();
        assert!(text.contains("target 2"));
        assert!(text.contains("missing field `name`"));

        let err = parse_config(r#"{"targets":[{"name":"docs","enabled":"yes"}]}"#).unwrap_err();
        assert!(err.to_string().contains("target 1"));

        let err = parse_config(r#""docs""#).unwrap_err();
        assert!(matches!(err, BackvaultError::Config(ConfigError::Parse(_))));
    }

    #[test]
    fn location_paths_are_kept_verbatim() {
        let cfg = parse_config(r#"[{"name":"docs","locations":[" /srv/odd name "]}]"#)
            .expect("parse");
        assert_eq!(cfg.targets[0].locations, vec![" /srv/odd name ".to_string()]);
        let err = parse_config(r#"[{"name":"docs","locations":["   "]}]"#).unwrap_err();
        assert!(err.to_string().contains("path is empty"));
    }

    #[test]
    fn bad_weekday_is_rejected() {
        let err = parse_config(r#"{"targets":[],"options":{"checkWeekday":"someday"}}"#).unwrap_err();
        assert!(err.to_string().contains("someday"));
    }
}
