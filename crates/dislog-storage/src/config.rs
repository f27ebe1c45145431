//! Configuration for the event logger

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default base directory, relative to the working directory
pub const DEFAULT_BASE_DIR: &str = "dislog";

/// Configuration for an [`EventLogger`](crate::EventLogger)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Root under which bucket directories are created
    pub base_dir: PathBuf,
    /// Whether to fsync after every record. Records are always flushed to
    /// the OS; files are always synced on rotation and shutdown.
    pub sync_on_write: bool,
    /// Permission bits for bucket directories (unix only)
    pub dir_mode: u32,
    /// Permission bits for bucket files (unix only)
    pub file_mode: u32,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            sync_on_write: false,
            dir_mode: 0o700,
            file_mode: 0o600,
        }
    }
}

impl LoggerConfig {
    /// Create a configuration with a custom base directory
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Default::default()
        }
    }

    /// Set whether every record is fsynced
    pub fn with_sync_on_write(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }

    /// Set directory and file permission bits
    pub fn with_modes(mut self, dir_mode: u32, file_mode: u32) -> Self {
        self.dir_mode = dir_mode;
        self.file_mode = file_mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggerConfig::default();
        assert_eq!(config.base_dir, PathBuf::from("dislog"));
        assert!(!config.sync_on_write);
        assert_eq!(config.dir_mode, 0o700);
        assert_eq!(config.file_mode, 0o600);
    }

    #[test]
    fn test_builder_methods() {
        let config = LoggerConfig::with_base_dir("/var/lib/dislog")
            .with_sync_on_write(true)
            .with_modes(0o750, 0o640);
        assert_eq!(config.base_dir, PathBuf::from("/var/lib/dislog"));
        assert!(config.sync_on_write);
        assert_eq!((config.dir_mode, config.file_mode), (0o750, 0o640));
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: LoggerConfig =
            serde_json::from_str(r#"{"base_dir": "elsewhere"}"#).unwrap();
        assert_eq!(config.base_dir, PathBuf::from("elsewhere"));
        assert_eq!(config.file_mode, 0o600);
    }
}
