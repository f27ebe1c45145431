//! The append pipeline
//!
//! [`EventLogger`] is the write path: lock the entity, stamp the entry with
//! the current time, encode it in memory, get the entity's file for that
//! instant from the [`HandleCache`], and append the line. Any failing step
//! ends the call; the logger never retries.
//!
//! The stamp is read under the entity lock, so with a monotonic clock the
//! lines of one file are in time order and a week boundary costs exactly one
//! rotation no matter how many appends race across it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dislog_core::{encode_record, Clock, CodecError, EntityId, Entry, SystemClock};
use serde::Serialize;
use tracing::{instrument, trace};

use crate::cache::{CacheStats, CloseReport, HandleCache};
use crate::config::LoggerConfig;
use crate::error::AppendError;

/// Per-entity, weekly-bucketed event logger
///
/// Each instance owns its own handle cache, so independent loggers over
/// different base directories can coexist in one process.
pub struct EventLogger {
    cache: HandleCache,
    clock: Arc<dyn Clock>,
}

impl EventLogger {
    /// Create a logger stamping entries with system time
    pub fn new(config: LoggerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a logger with a custom time source
    pub fn with_clock(config: LoggerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache: HandleCache::new(config),
            clock,
        }
    }

    /// Append an arbitrary payload under the `kind` tag
    ///
    /// # Errors
    ///
    /// [`AppendError::Encoding`] if `payload` cannot be serialized (nothing
    /// is written), [`AppendError::Io`] if the file cannot be opened or
    /// written.
    #[instrument(skip_all, fields(entity = %entity, kind = %kind))]
    pub async fn append<P>(&self, entity: EntityId, kind: &str, payload: &P) -> Result<(), AppendError>
    where
        P: Serialize + ?Sized,
    {
        self.write_stamped(entity, |now| encode_record(kind, now, payload)).await
    }

    /// Append one of the recognized entries
    #[instrument(skip_all, fields(entity = %entity, kind = %entry.kind()))]
    pub async fn append_entry(&self, entity: EntityId, entry: &Entry) -> Result<(), AppendError> {
        self.write_stamped(entity, |now| entry.encode(now)).await
    }

    async fn write_stamped<F>(&self, entity: EntityId, encode: F) -> Result<(), AppendError>
    where
        F: FnOnce(DateTime<Utc>) -> Result<Vec<u8>, CodecError>,
    {
        let mut slot = self.cache.lock(entity).await;
        let now = self.clock.now_utc();
        let line = encode(now)?;
        self.cache.ensure_bucket(&mut slot, now).await?;
        slot.write_record(&line).await?;
        trace!(bytes = line.len(), bucket = ?slot.bucket(), "Appended entry");
        Ok(())
    }

    /// Flush and close every open file
    pub async fn close_all(&self) -> CloseReport {
        self.cache.close_all().await
    }

    /// The underlying handle cache
    pub fn cache(&self) -> &HandleCache {
        &self.cache
    }

    /// Activity counters of the handle cache
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Configuration in use
    pub fn config(&self) -> &LoggerConfig {
        self.cache.config()
    }
}

impl std::fmt::Debug for EventLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLogger")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
