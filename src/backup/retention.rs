use serde_json::{Map, Value};
use tracing::debug;

pub const DEFAULT_KEEP_WITHIN: &str = "1m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionKey {
    KeepLast,
    KeepHourly,
    KeepDaily,
    KeepWeekly,
    KeepMonthly,
    KeepYearly,
    KeepWithin,
    GroupBy,
}

impl RetentionKey {
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "keepLast" => Some(RetentionKey::KeepLast),
            "keepHourly" => Some(RetentionKey::KeepHourly),
            "keepDaily" => Some(RetentionKey::KeepDaily),
            "keepWeekly" => Some(RetentionKey::KeepWeekly),
            "keepMonthly" => Some(RetentionKey::KeepMonthly),
            "keepYearly" => Some(RetentionKey::KeepYearly),
            "keepWithin" => Some(RetentionKey::KeepWithin),
            "groupBy" => Some(RetentionKey::GroupBy),
            _ => None,
        }
    }

    pub fn flag(&self) -> &'static str {
        match self {
            RetentionKey::KeepLast => "--keep-last",
            RetentionKey::KeepHourly => "--keep-hourly",
            RetentionKey::KeepDaily => "--keep-daily",
            RetentionKey::KeepWeekly => "--keep-weekly",
            RetentionKey::KeepMonthly => "--keep-monthly",
            RetentionKey::KeepYearly => "--keep-yearly",
            RetentionKey::KeepWithin => "--keep-within",
            RetentionKey::GroupBy => "--group-by",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionSpec {
    rules: Vec<(RetentionKey, String)>,
}

impl Default for RetentionSpec {
    fn default() -> Self {
        Self {
            rules: vec![(RetentionKey::KeepWithin, DEFAULT_KEEP_WITHIN.to_string())],
        }
    }
}

impl RetentionSpec {
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let mut rules = Vec::new();
        for (key, value) in map {
            let Some(parsed) = RetentionKey::parse(key) else {
                debug!(key = %key, "ignoring unrecognized retention key");
                continue;
            };
            let literal = match value {
                Value::Number(n) => n.to_string(),
                Value::String(s) if !s.trim().is_empty() => s.clone(),
                _ => {
                    debug!(key = %key, "ignoring retention value that is not a count or duration");
                    continue;
                }
            };
            rules.push((parsed, literal));
        }
        if rules.is_empty() {
            return Self::default();
        }
        Self { rules }
    }

    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.rules.len() * 2);
        for (key, value) in &self.rules {
            args.push(key.flag().to_string());
            args.push(value.clone());
        }
        args
    }
}

pub fn retention_args(spec: Option<&RetentionSpec>) -> Vec<String> {
    match spec {
        Some(spec) => spec.to_args(),
        None => RetentionSpec::default().to_args(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(json: &str) -> Map<String, Value> {
        serde_json::from_str(json).expect("json object")
    }

    #[test]
    fn daily_and_weekly_translate_in_order() {
        let spec = RetentionSpec::from_map(&map(r#"{"keepDaily":7,"keepWeekly":4}"#));
        assert_eq!(
            spec.to_args(),
            vec!["--keep-daily", "7", "--keep-weekly", "4"]
        );
    }

    #[test]
    fn document_order_is_preserved() {
        let spec = RetentionSpec::from_map(&map(r#"{"keepYearly":2,"keepLast":10,"keepWithin":"14d"}"#));
        assert_eq!(
            spec.to_args(),
            vec!["--keep-yearly", "2", "--keep-last", "10", "--keep-within", "14d"]
        );
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let spec = RetentionSpec::from_map(&map(r#"{"keepForever":true,"groupBy":"host,paths"}"#));
        assert_eq!(spec.to_args(), vec!["--group-by", "host,paths"]);
    }

    #[test]
    fn literal_values_are_not_reinterpreted() {
        let spec = RetentionSpec::from_map(&map(r#"{"keepWithin":"1y2m3d","keepDaily":"7"}"#));
        assert_eq!(
            spec.to_args(),
            vec!["--keep-within", "1y2m3d", "--keep-daily", "7"]
        );
    }

    #[test]
    fn default_applies_when_absent_or_empty() {
        assert_eq!(retention_args(None), vec!["--keep-within", "1m"]);
        let spec = RetentionSpec::from_map(&map(r#"{"bogus":1}"#));
        assert_eq!(spec, RetentionSpec::default());
    }
}
