//! # dislog
//!
//! The runnable side of dislog: reads gateway events, turns the guild ones
//! into log entries and hands them to the event logger, and closes every
//! file cleanly when asked to stop.
//!
//! - [`gateway`]: the upstream NDJSON event format
//! - [`translate`]: gateway events to `(guild, entry)` pairs
//! - [`dispatch`]: the read-translate-append loop
//! - [`config`]: command line and TOML configuration
//! - [`signal`]: termination signals

pub mod config;
pub mod dispatch;
pub mod gateway;
pub mod signal;
pub mod translate;

pub use config::{AppConfig, Cli, ConfigError};
pub use dispatch::{DispatchStats, Dispatcher, StopReason};
pub use gateway::{GatewayError, GatewayEvent};
pub use translate::{ChannelDirectory, Translator};
