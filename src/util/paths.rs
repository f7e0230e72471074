use std::fs;
use std::path::Path;

use crate::error::{BackvaultError, Result};

const HOSTNAME_SOURCES: [&str; 2] = ["/proc/sys/kernel/hostname", "/etc/hostname"];

pub fn is_safe_name(name: &str) -> bool {
    if name.is_empty() || name == "." || name == ".." {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    let meta = fs::metadata(path)
        .map_err(|e| BackvaultError::message(format!("stat {}: {}", path.display(), e)))?;
    if !meta.is_dir() {
        return Err(BackvaultError::message(format!(
            "{} is not a directory",
            path.display()
        )));
    }
    Ok(())
}

pub fn local_hostname() -> String {
    for source in HOSTNAME_SOURCES {
        if let Ok(text) = fs::read_to_string(source) {
            let name = text.trim();
            if !name.is_empty() {
                return name.to_string();
            }
        }
    }
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn safe_names() {
        assert!(is_safe_name("photos-2024_v1.0"));
        assert!(!is_safe_name(""));
        assert!(!is_safe_name(".."));
        assert!(!is_safe_name("a/b"));
        assert!(!is_safe_name("with space"));
    }

    #[test]
    fn ensure_directory_rejects_files() {
        let dir = TempDir::new().expect("tempdir");
        ensure_directory(dir.path()).expect("dir ok");
        let file = dir.path().join("file");
        fs::write(&file, b"x").expect("write");
        assert!(ensure_directory(&file).is_err());
        assert!(ensure_directory(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn hostname_is_never_empty() {
        assert!(!local_hostname().is_empty());
    }
}
