//! # Dislog Storage
//!
//! The write path of dislog: per-entity, weekly-bucketed, append-only NDJSON
//! files.
//!
//! ## Features
//!
//! - **HandleCache**: at most one open file per entity, rotated when an
//!   append falls into a different ISO week
//! - **EventLogger**: the append pipeline (stamp, encode, acquire, write)
//! - **Lifecycle**: closes every open file exactly once on shutdown
//!
//! ## Storage Format
//!
//! ```text
//! {base_dir}/{isoYear}-{isoWeek}/{entity}.ndjson
//! ```
//!
//! Each line is one `{"type", "time", "data"}` object. Files are only ever
//! appended to.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dislog_core::EntityId;
//! use dislog_storage::{EventLogger, Lifecycle, LoggerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let logger = Arc::new(EventLogger::new(LoggerConfig::with_base_dir("dislog")));
//!     let lifecycle = Lifecycle::new(logger.clone());
//!
//!     logger
//!         .append(EntityId::new(42), "msg", &serde_json::json!({"content": "hi"}))
//!         .await
//!         .unwrap();
//!
//!     lifecycle.shutdown().await;
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logger;

// Re-exports
pub use cache::{CacheStats, CloseReport, HandleCache, SlotGuard};
pub use config::LoggerConfig;
pub use error::{AppendError, StorageError};
pub use lifecycle::Lifecycle;
pub use logger::EventLogger;
