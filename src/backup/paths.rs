use std::fs;
use std::path::PathBuf;

use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub existing: Vec<PathBuf>,
    pub missing: Vec<String>,
}

impl ResolvedPaths {
    pub fn is_empty(&self) -> bool {
        self.existing.is_empty()
    }
}

pub fn resolve_locations(target: &str, locations: &[String]) -> ResolvedPaths {
    let mut resolved = ResolvedPaths::default();
    for location in locations {
        let path = PathBuf::from(location);
        if fs::symlink_metadata(&path).is_ok() {
            resolved.existing.push(path);
        } else {
            warn!(target = %target, path = %location, "source path does not exist");
            resolved.missing.push(location.clone());
        }
    }
    resolved
}
