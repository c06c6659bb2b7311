//! Startup version bookkeeping.
//!
//! The bot registers its command list with Telegram only when the running
//! version differs from the one recorded in the startup file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::error::AppResult;

#[derive(Debug, Serialize, Deserialize)]
struct StartupRecord {
    #[serde(rename = "VERSION")]
    version: String,
}

/// Reads and updates the startup file.
#[derive(Debug, Clone)]
pub struct StartupFile {
    path: PathBuf,
    version: String,
}

impl StartupFile {
    pub fn new(path: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            version: version.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the command list should be synced with the platform.
    ///
    /// True on first start (no file yet, which is then created) and whenever the
    /// recorded version differs from the running one.
    pub fn needs_sync(&self) -> AppResult<bool> {
        if !self.path.exists() {
            self.write_current()?;
            return Ok(true);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let recorded = match serde_json::from_str::<StartupRecord>(&content) {
            Ok(record) => record.version,
            Err(e) => {
                log::warn!("Startup file {} is unreadable ({}), forcing sync", self.path.display(), e);
                return Ok(true);
            }
        };
        Ok(recorded != self.version)
    }

    /// Records the running version.
    pub fn write_current(&self) -> AppResult<()> {
        let record = StartupRecord {
            version: self.version.clone(),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&record)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_first_start_requests_sync_and_creates_file() {
        let dir = tempdir().unwrap();
        let startup = StartupFile::new(dir.path().join(".startup.json"), "1.0.0");
        assert!(startup.needs_sync().unwrap());
        assert!(startup.path().exists());
    }

    #[test]
    fn test_same_version_skips_sync() {
        let dir = tempdir().unwrap();
        let startup = StartupFile::new(dir.path().join(".startup.json"), "1.0.0");
        startup.write_current().unwrap();
        assert!(!startup.needs_sync().unwrap());
    }

    #[test]
    fn test_version_change_requests_sync() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".startup.json");
        StartupFile::new(&path, "0.9.0").write_current().unwrap();
        let startup = StartupFile::new(&path, "1.0.0");
        assert!(startup.needs_sync().unwrap());
        startup.write_current().unwrap();
        assert!(!startup.needs_sync().unwrap());
    }

    #[test]
    fn test_garbage_file_requests_sync() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".startup.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(StartupFile::new(&path, "1.0.0").needs_sync().unwrap());
    }
}
