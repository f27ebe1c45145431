//! Diagnostic logging for dislog
//!
//! This is the process's own log (startup, rotations, dropped events), not
//! the event logs dislog writes. It wires `tracing` to the console and,
//! optionally, to rolling JSONL files.
//!
//! # Quick Start
//!
//! ```ignore
//! use dislog_logging::{DislogSubscriberBuilder, LogConfig};
//!
//! // JSONL to stderr
//! let _guard = DislogSubscriberBuilder::new().init()?;
//!
//! // Human-readable output while developing
//! let _guard = DislogSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init()?;
//! ```
//!
//! Keep the returned guard alive for as long as file output should be
//! written; dropping it flushes the background writer.

pub mod config;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Errors from subscriber setup
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The rolling file appender could not be created
    #[error("Failed to create log file appender: {0}")]
    Appender(#[from] InitError),

    /// A global subscriber was already installed
    #[error("Failed to install subscriber: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// Builder for configuring and initializing the dislog logging subscriber
pub struct DislogSubscriberBuilder {
    config: LogConfig,
}

impl DislogSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    ///
    /// Default: JSONL output to the console
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Use human-readable console output
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.config.console.pretty = pretty;
        self
    }

    /// Current configuration
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Initialize the subscriber globally
    ///
    /// Returns the file writer's guard when file output is configured.
    ///
    /// # Errors
    ///
    /// Fails if the log directory cannot be prepared or a global subscriber
    /// is already set.
    pub fn init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.default_level));
        let jsonl = &self.config.jsonl;

        let file_writer = match &self.config.file {
            Some(file_config) => Some(create_file_writer(file_config)?),
            None => None,
        };

        let registry = Registry::default().with(env_filter);

        // Separate arms for pretty vs JSONL console to satisfy the type system
        let guard = match (
            self.config.console.enabled,
            self.config.console.pretty,
            file_writer,
        ) {
            // Pretty console + File
            (true, true, Some((writer, guard))) => {
                let console_layer = tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(self.config.console.ansi)
                    .with_target(true);

                let file_layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(jsonl.include_current_span)
                    .with_span_list(jsonl.include_spans)
                    .flatten_event(jsonl.flatten_events)
                    .with_file(jsonl.include_location)
                    .with_line_number(jsonl.include_location)
                    .with_writer(writer);

                registry.with(console_layer).with(file_layer).try_init()?;
                Some(guard)
            }

            // JSONL console + File
            (true, false, Some((writer, guard))) => {
                let console_layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(jsonl.include_current_span)
                    .with_span_list(jsonl.include_spans)
                    .flatten_event(jsonl.flatten_events)
                    .with_file(jsonl.include_location)
                    .with_line_number(jsonl.include_location)
                    .with_writer(std::io::stderr);

                let file_layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(jsonl.include_current_span)
                    .with_span_list(jsonl.include_spans)
                    .flatten_event(jsonl.flatten_events)
                    .with_file(jsonl.include_location)
                    .with_line_number(jsonl.include_location)
                    .with_writer(writer);

                registry.with(console_layer).with(file_layer).try_init()?;
                Some(guard)
            }

            // File only (no console)
            (false, _, Some((writer, guard))) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(jsonl.include_current_span)
                    .with_span_list(jsonl.include_spans)
                    .flatten_event(jsonl.flatten_events)
                    .with_file(jsonl.include_location)
                    .with_line_number(jsonl.include_location)
                    .with_writer(writer);

                registry.with(file_layer).try_init()?;
                Some(guard)
            }

            // Pretty console only
            (true, true, None) => {
                let console_layer = tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(self.config.console.ansi)
                    .with_target(true);
                registry.with(console_layer).try_init()?;
                None
            }

            // JSONL console only (DEFAULT)
            (true, false, None) => {
                let console_layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(jsonl.include_current_span)
                    .with_span_list(jsonl.include_spans)
                    .flatten_event(jsonl.flatten_events)
                    .with_file(jsonl.include_location)
                    .with_line_number(jsonl.include_location)
                    .with_writer(std::io::stderr);
                registry.with(console_layer).try_init()?;
                None
            }

            // Nothing enabled - just the filter
            (false, _, None) => {
                registry.try_init()?;
                None
            }
        };

        tracing::debug!(
            level = %self.config.default_level,
            file = guard.is_some(),
            "Logging initialized"
        );
        Ok(guard)
    }
}

impl Default for DislogSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a rotation strategy onto the appender's
fn appender_rotation(strategy: RotationStrategy) -> Rotation {
    match strategy {
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
        RotationStrategy::Never => Rotation::NEVER,
    }
}

/// Create the non-blocking file writer for `config`
fn create_file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), InitError> {
    let appender = RollingFileAppender::builder()
        .rotation(appender_rotation(config.rotation))
        .filename_prefix(&config.prefix)
        .filename_suffix("log")
        .build(&config.directory)?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize logging for testing (minimal output)
///
/// Safe to call from many tests; only the first call installs anything.
pub fn init_testing() {
    let _ = DislogSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .init();
}
