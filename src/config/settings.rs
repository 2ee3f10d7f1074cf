//! Application settings and paths.
//!
//! Settings live in a JSON file under the XDG config directory. A missing
//! file is not an error; every field falls back to its default.

use crate::error::{ConfigError, ConfigResult};
use crate::scanner::budget::DEFAULT_FALLBACK;
use crate::scanner::tcp::DEFAULT_MAX_RETRIES;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Application directory paths following the XDG Base Directory layout.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/oscan)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Locate the configuration directory. Nothing is created on disk.
    pub fn new() -> ConfigResult<Self> {
        let project =
            ProjectDirs::from("com", "oscan", "oscan").ok_or(ConfigError::DirectoryNotFound)?;

        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Defaults applied beneath command-line flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Probe timeout in milliseconds.
    pub timeout_ms: u64,
    /// Concurrency used when the descriptor limit is unbounded.
    pub fallback_concurrency: usize,
    /// Retries after descriptor exhaustion before a port counts as closed.
    pub max_retries: u32,
    /// `plain` or `json`.
    pub output_format: String,
    /// Directory that receives service dumps.
    pub dump_dir: PathBuf,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 500,
            fallback_concurrency: DEFAULT_FALLBACK,
            max_retries: DEFAULT_MAX_RETRIES,
            output_format: "plain".to_string(),
            dump_dir: PathBuf::from("."),
        }
    }
}

impl AppSettings {
    /// Load settings from the default location, or defaults if there is none.
    pub fn load() -> ConfigResult<Self> {
        let file = Paths::new()?.settings_file();
        match Self::load_from(&file) {
            Err(ConfigError::ReadFailed { ref source, .. })
                if source.kind() == io::ErrorKind::NotFound =>
            {
                tracing::debug!(path = %file.display(), "no settings file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_settings() {
        let settings = AppSettings::default();
        assert_eq!(settings.timeout_ms, 500);
        assert_eq!(settings.fallback_concurrency, 1000);
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.output_format, "plain");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "timeout_ms": 1500, "dump_dir": "/tmp/loot" }}"#).unwrap();

        let settings = AppSettings::load_from(file.path()).unwrap();
        assert_eq!(settings.timeout_ms, 1500);
        assert_eq!(settings.dump_dir, PathBuf::from("/tmp/loot"));
        assert_eq!(settings.max_retries, 5);
    }

    #[test]
    fn test_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timeout_ms = 3").unwrap();

        let err = AppSettings::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFormat(_)));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppSettings::load_from(&dir.path().join("settings.json")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFailed { .. }));
    }
}
