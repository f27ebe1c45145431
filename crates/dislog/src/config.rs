//! Command line and configuration file
//!
//! Settings come from an optional TOML file with `[storage]` and
//! `[logging]` tables; command line flags override the file.
//!
//! ```toml
//! [storage]
//! base_dir = "/var/lib/dislog"
//! sync_on_write = true
//!
//! [logging]
//! default_level = "info"
//!
//! [logging.file]
//! directory = "/var/log/dislog"
//! rotation = "daily"
//! ```

use std::path::{Path, PathBuf};

use clap::Parser;
use dislog_logging::LogConfig;
use dislog_storage::LoggerConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading the configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Parser)]
#[command(
    name = "dislog",
    about = "Record guild events as weekly per-guild NDJSON files"
)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Directory the weekly log folders are created in
    #[arg(long)]
    pub base_dir: Option<PathBuf>,
    /// Read gateway events from this file instead of stdin
    #[arg(long)]
    pub input: Option<PathBuf>,
    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
    /// Human-readable diagnostic output instead of JSONL
    #[arg(long)]
    pub pretty: bool,
    /// fsync every entry
    #[arg(long)]
    pub sync: bool,
}

/// Complete runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: LoggerConfig,
    pub logging: LogConfig,
}

impl AppConfig {
    /// Parse TOML text
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Read and parse a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Build the configuration for a command line: file first, flags on top
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        Ok(config.with_overrides(cli))
    }

    /// Apply command line flags
    pub fn with_overrides(mut self, cli: &Cli) -> Self {
        if let Some(base_dir) = &cli.base_dir {
            self.storage.base_dir = base_dir.clone();
        }
        if let Some(level) = &cli.log_level {
            self.logging.default_level = level.clone();
        }
        if cli.pretty {
            self.logging.console.pretty = true;
        }
        if cli.sync {
            self.storage.sync_on_write = true;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let cli = Cli::parse_from(["dislog"]);
        let config = AppConfig::resolve(&cli).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.storage.base_dir, PathBuf::from("dislog"));
    }

    #[test]
    fn test_toml_file() {
        let config = AppConfig::from_toml_str(
            r#"
            [storage]
            base_dir = "/var/lib/dislog"
            sync_on_write = true

            [logging]
            default_level = "debug"
            "#,
            Path::new("test.toml"),
        )
        .unwrap();
        assert_eq!(config.storage.base_dir, PathBuf::from("/var/lib/dislog"));
        assert!(config.storage.sync_on_write);
        assert_eq!(config.storage.file_mode, 0o600);
        assert_eq!(config.logging.default_level, "debug");
    }

    #[test]
    fn test_flags_override_file() {
        let file = AppConfig::from_toml_str(
            "[storage]\nbase_dir = \"from-file\"\n",
            Path::new("test.toml"),
        )
        .unwrap();
        let cli = Cli::parse_from([
            "dislog",
            "--base-dir",
            "from-flag",
            "--log-level",
            "warn",
            "--pretty",
            "--sync",
        ]);

        let config = file.with_overrides(&cli);
        assert_eq!(config.storage.base_dir, PathBuf::from("from-flag"));
        assert_eq!(config.logging.default_level, "warn");
        assert!(config.logging.console.pretty);
        assert!(config.storage.sync_on_write);
    }

    #[test]
    fn test_bad_toml_names_file() {
        let err = AppConfig::from_toml_str("[storage", Path::new("broken.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
