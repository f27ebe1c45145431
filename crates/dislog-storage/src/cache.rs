//! File handle cache
//!
//! Owns the single open file per entity and decides when it has to be
//! rotated. Each entity has a slot guarded by its own async mutex; a caller
//! holds that lock from the bucket check through the write, so rotation and
//! the append that triggered it look atomic to every other caller for the
//! same entity while different entities proceed independently.
//!
//! ## Slot states
//!
//! ```text
//! NoFile --acquire--> Open(b)
//! Open(b) --acquire, bucket(t) == b--> Open(b)
//! Open(b) --acquire, bucket(t) != b--> Open(bucket(t))   (rotation)
//! Open(b) --close_all--> NoFile
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dislog_core::{bucket_path, BucketKey, EntityId};
use tokio::fs::{DirBuilder, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::config::LoggerConfig;
use crate::error::StorageError;

/// An open bucket file
#[derive(Debug)]
struct OpenLog {
    bucket: BucketKey,
    path: PathBuf,
    file: File,
}

impl OpenLog {
    /// Flush and sync, then drop the handle
    async fn close(mut self) -> Result<(), std::io::Error> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(())
    }
}

/// What the cache holds for one entity
#[derive(Debug, Default)]
enum LogSlot {
    #[default]
    NoFile,
    Open(OpenLog),
}

impl LogSlot {
    /// Whether a valid open record exists for exactly this bucket
    fn is_open_for(&self, bucket: BucketKey) -> bool {
        match self {
            LogSlot::Open(open) => open.bucket == bucket,
            LogSlot::NoFile => false,
        }
    }

    fn bucket(&self) -> Option<BucketKey> {
        match self {
            LogSlot::Open(open) => Some(open.bucket),
            LogSlot::NoFile => None,
        }
    }

    fn path(&self) -> Option<&Path> {
        match self {
            LogSlot::Open(open) => Some(&open.path),
            LogSlot::NoFile => None,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    opened: AtomicU64,
    rotations: AtomicU64,
    closed: AtomicU64,
    close_failures: AtomicU64,
}

/// Snapshot of cache activity since creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Files opened, including the first open for an entity
    pub opened: u64,
    /// Opens that replaced a file for a different bucket
    pub rotations: u64,
    /// Files closed, by rotation or `close_all`
    pub closed: u64,
    /// Closes whose flush or sync failed
    pub close_failures: u64,
}

/// Outcome of [`HandleCache::close_all`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloseReport {
    /// Files that were open and have been closed
    pub closed: usize,
    /// Of those, how many failed to flush or sync
    pub failures: usize,
}

/// Registry of open bucket files, at most one per entity
#[derive(Debug)]
pub struct HandleCache {
    config: LoggerConfig,
    slots: DashMap<EntityId, Arc<Mutex<LogSlot>>>,
    counters: Counters,
}

impl HandleCache {
    /// Create an empty cache
    pub fn new(config: LoggerConfig) -> Self {
        Self {
            config,
            slots: DashMap::new(),
            counters: Counters::default(),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// The slot for an entity, created empty on first use
    ///
    /// The map reference is released before the caller awaits the slot lock.
    fn slot(&self, entity: EntityId) -> Arc<Mutex<LogSlot>> {
        self.slots.entry(entity).or_default().value().clone()
    }

    /// Get the file for `entity` that `time` belongs in
    ///
    /// Opens it if the entity has no file, rotates if the open file belongs
    /// to another bucket, and otherwise hands back the open file unchanged.
    /// The entity stays locked until the returned guard is dropped.
    ///
    /// `time` is taken as given. Callers that read a clock before calling
    /// this can race each other across a week boundary and rotate back and
    /// forth; read the clock after [`lock`](Self::lock) to avoid that.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::CreateDir`] or [`StorageError::Open`] if the
    /// new bucket file cannot be prepared. The entity's previous record is
    /// left in place in that case.
    #[instrument(skip_all, fields(entity = %entity))]
    pub async fn acquire(
        &self,
        entity: EntityId,
        time: DateTime<Utc>,
    ) -> Result<SlotGuard, StorageError> {
        let mut guard = self.lock(entity).await;
        self.ensure_bucket(&mut guard, time).await?;
        Ok(guard)
    }

    /// Lock the entity's slot without touching its file
    pub async fn lock(&self, entity: EntityId) -> SlotGuard {
        let slot = self.slot(entity).lock_owned().await;
        SlotGuard {
            entity,
            slot,
            sync_on_write: self.config.sync_on_write,
        }
    }

    /// Make the guarded slot hold the file for the bucket of `time`
    ///
    /// # Errors
    ///
    /// Same as [`acquire`](Self::acquire).
    pub async fn ensure_bucket(
        &self,
        guard: &mut SlotGuard,
        time: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let target = BucketKey::for_time(time);
        if !guard.slot.is_open_for(target) {
            self.rotate(guard.entity, &mut *guard.slot, target).await?;
        }
        Ok(())
    }

    /// Install a file for `target`, closing whatever was open before
    ///
    /// The new file is fully opened before the slot is touched, so a failure
    /// leaves the slot exactly as it was. Until the old record is closed
    /// below, the entity holds two handles; only the new one is reachable
    /// through the slot.
    async fn rotate(
        &self,
        entity: EntityId,
        slot: &mut LogSlot,
        target: BucketKey,
    ) -> Result<(), StorageError> {
        let path = bucket_path(&self.config.base_dir, entity, target);
        let file = self.open_bucket_file(&path).await?;

        let previous = std::mem::replace(
            slot,
            LogSlot::Open(OpenLog {
                bucket: target,
                path: path.clone(),
                file,
            }),
        );
        self.counters.opened.fetch_add(1, Ordering::Relaxed);

        match previous {
            LogSlot::Open(old) => {
                self.counters.rotations.fetch_add(1, Ordering::Relaxed);
                info!(
                    entity = %entity,
                    from = %old.bucket,
                    to = %target,
                    path = %path.display(),
                    "Rotated log file"
                );
                self.close_record(entity, old).await;
            }
            LogSlot::NoFile => {
                debug!(entity = %entity, bucket = %target, path = %path.display(), "Opened log file");
            }
        }

        Ok(())
    }

    /// Create the bucket directory and open the file for appending
    async fn open_bucket_file(&self, path: &Path) -> Result<File, StorageError> {
        if let Some(dir) = path.parent() {
            let mut builder = DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            builder.mode(self.config.dir_mode);
            builder
                .create(dir)
                .await
                .map_err(|source| StorageError::CreateDir {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        options.mode(self.config.file_mode);
        options.open(path).await.map_err(|source| StorageError::Open {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Best-effort close; failures are logged and counted, never returned
    async fn close_record(&self, entity: EntityId, record: OpenLog) -> bool {
        let path = record.path.clone();
        let bucket = record.bucket;
        self.counters.closed.fetch_add(1, Ordering::Relaxed);

        match record.close().await {
            Ok(()) => {
                debug!(entity = %entity, bucket = %bucket, path = %path.display(), "Closed log file");
                true
            }
            Err(e) => {
                self.counters.close_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    entity = %entity,
                    path = %path.display(),
                    error = %e,
                    "Failed to close log file cleanly"
                );
                false
            }
        }
    }

    /// Flush and close every open file
    ///
    /// Every slot ends up `NoFile`. Calling this again closes nothing.
    /// Slots nobody else is holding are dropped from the map afterwards.
    #[instrument(skip(self))]
    pub async fn close_all(&self) -> CloseReport {
        let slots: Vec<(EntityId, Arc<Mutex<LogSlot>>)> = self
            .slots
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut report = CloseReport::default();
        for (entity, slot) in slots {
            let mut slot = slot.lock().await;
            if let LogSlot::Open(record) = std::mem::take(&mut *slot) {
                report.closed += 1;
                if !self.close_record(entity, record).await {
                    report.failures += 1;
                }
            }
        }

        // A slot still referenced elsewhere may be about to receive a file
        self.slots.retain(|_, slot| {
            Arc::strong_count(slot) > 1
                || slot
                    .try_lock()
                    .map_or(true, |held| matches!(*held, LogSlot::Open(_)))
        });

        info!(
            closed = report.closed,
            failures = report.failures,
            "Closed all log files"
        );
        report
    }

    /// Number of entities that currently have a file open
    pub async fn open_count(&self) -> usize {
        let slots: Vec<_> = self.slots.iter().map(|e| e.value().clone()).collect();
        let mut count = 0;
        for slot in slots {
            if matches!(*slot.lock().await, LogSlot::Open(_)) {
                count += 1;
            }
        }
        count
    }

    /// Bucket of the entity's open file, if any
    pub async fn current_bucket(&self, entity: EntityId) -> Option<BucketKey> {
        let slot = self.slots.get(&entity).map(|e| e.value().clone())?;
        let guard = slot.lock().await;
        guard.bucket()
    }

    /// Path of the entity's open file, if any
    pub async fn current_path(&self, entity: EntityId) -> Option<PathBuf> {
        let slot = self.slots.get(&entity).map(|e| e.value().clone())?;
        let guard = slot.lock().await;
        guard.path().map(Path::to_path_buf)
    }

    /// Activity counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            opened: self.counters.opened.load(Ordering::Relaxed),
            rotations: self.counters.rotations.load(Ordering::Relaxed),
            closed: self.counters.closed.load(Ordering::Relaxed),
            close_failures: self.counters.close_failures.load(Ordering::Relaxed),
        }
    }
}

/// Exclusive access to one entity's open file
///
/// Holds the entity's lock; drop it to let other appends for the same
/// entity proceed.
#[derive(Debug)]
pub struct SlotGuard {
    entity: EntityId,
    slot: OwnedMutexGuard<LogSlot>,
    sync_on_write: bool,
}

impl SlotGuard {
    /// Entity this guard is for
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Bucket of the held file
    pub fn bucket(&self) -> Option<BucketKey> {
        self.slot.bucket()
    }

    /// Path of the held file
    pub fn path(&self) -> Option<&Path> {
        self.slot.path()
    }

    /// Append one complete record and flush it to the OS
    pub async fn write_record(&mut self, record: &[u8]) -> Result<(), StorageError> {
        let open = match &mut *self.slot {
            LogSlot::Open(open) => open,
            LogSlot::NoFile => return Err(StorageError::NotOpen(self.entity)),
        };

        let write_err = |source| StorageError::Write {
            path: open.path.clone(),
            source,
        };

        open.file.write_all(record).await.map_err(write_err)?;
        open.file.flush().await.map_err(write_err)?;
        if self.sync_on_write {
            open.file.sync_data().await.map_err(write_err)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn create_test_cache() -> (HandleCache, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let cache = HandleCache::new(LoggerConfig::with_base_dir(temp_dir.path()));
        (cache, temp_dir)
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_first_acquire_opens_file() {
        let (cache, temp) = create_test_cache();
        let entity = EntityId::new(42);

        assert_eq!(cache.current_bucket(entity).await, None);

        let guard = cache.acquire(entity, at(2024, 3, 15, 10)).await.unwrap();
        assert_eq!(guard.bucket(), Some(BucketKey::new(2024, 11)));
        assert_eq!(guard.path(), Some(temp.path().join("2024-11/42.ndjson").as_path()));
        drop(guard);

        assert!(temp.path().join("2024-11/42.ndjson").exists());
        assert_eq!(cache.open_count().await, 1);
        assert_eq!(cache.stats().opened, 1);
        assert_eq!(cache.stats().rotations, 0);
    }

    #[tokio::test]
    async fn test_same_bucket_reuses_handle() {
        let (cache, _temp) = create_test_cache();
        let entity = EntityId::new(1);

        drop(cache.acquire(entity, at(2024, 3, 11, 0)).await.unwrap());
        drop(cache.acquire(entity, at(2024, 3, 17, 23)).await.unwrap());

        let stats = cache.stats();
        assert_eq!(stats.opened, 1);
        assert_eq!(stats.closed, 0);
    }

    #[tokio::test]
    async fn test_backwards_time_rotates_back() {
        let (cache, _temp) = create_test_cache();
        let entity = EntityId::new(1);

        drop(cache.acquire(entity, at(2024, 3, 18, 0)).await.unwrap());
        drop(cache.acquire(entity, at(2024, 3, 15, 0)).await.unwrap());

        assert_eq!(cache.current_bucket(entity).await, Some(BucketKey::new(2024, 11)));
        assert_eq!(cache.stats().rotations, 1);
    }

    #[tokio::test]
    async fn test_write_record_appends() {
        let (cache, temp) = create_test_cache();
        let entity = EntityId::new(9);

        for line in ["a\n", "b\n"] {
            let mut guard = cache.acquire(entity, at(2024, 3, 15, 10)).await.unwrap();
            guard.write_record(line.as_bytes()).await.unwrap();
        }

        let contents = std::fs::read_to_string(temp.path().join("2024-11/9.ndjson")).unwrap();
        assert_eq!(contents, "a\nb\n");
    }

    #[tokio::test]
    async fn test_close_all_is_idempotent() {
        let (cache, _temp) = create_test_cache();
        for id in 1..=3 {
            drop(cache.acquire(EntityId::new(id), at(2024, 3, 15, 10)).await.unwrap());
        }

        let first = cache.close_all().await;
        assert_eq!(first, CloseReport { closed: 3, failures: 0 });
        assert_eq!(cache.open_count().await, 0);

        let second = cache.close_all().await;
        assert_eq!(second, CloseReport::default());
        assert_eq!(cache.stats().closed, 3);
    }

    #[tokio::test]
    async fn test_close_all_drops_idle_slots() {
        let (cache, _temp) = create_test_cache();
        for id in 1..=4 {
            drop(cache.acquire(EntityId::new(id), at(2024, 3, 15, 10)).await.unwrap());
        }
        assert_eq!(cache.slots.len(), 4);

        // A caller still holding the slot keeps it in the map
        let held = cache.slot(EntityId::new(9));
        cache.close_all().await;
        assert_eq!(cache.slots.len(), 1);
        assert!(cache.slots.contains_key(&EntityId::new(9)));

        drop(held);
        cache.close_all().await;
        assert!(cache.slots.is_empty());
    }

    #[tokio::test]
    async fn test_lock_then_ensure_bucket() {
        let (cache, temp) = create_test_cache();
        let entity = EntityId::new(4);

        let mut guard = cache.lock(entity).await;
        assert_eq!(guard.bucket(), None);
        assert!(matches!(
            guard.write_record(b"early\n").await,
            Err(StorageError::NotOpen(e)) if e == entity
        ));

        cache.ensure_bucket(&mut guard, at(2024, 3, 18, 1)).await.unwrap();
        guard.write_record(b"late\n").await.unwrap();
        drop(guard);

        let contents = std::fs::read_to_string(temp.path().join("2024-12/4.ndjson")).unwrap();
        assert_eq!(contents, "late\n");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_write_failure_reports_path() {
        let (cache, temp) = create_test_cache();
        let entity = EntityId::new(42);
        let path = temp.path().join("2024-11/42.ndjson");
        std::fs::create_dir_all(temp.path().join("2024-11")).unwrap();
        std::os::unix::fs::symlink("/dev/full", &path).unwrap();

        let mut guard = cache.acquire(entity, at(2024, 3, 15, 10)).await.unwrap();
        let err = guard.write_record(b"{}\n").await.unwrap_err();
        match &err {
            StorageError::Write { path: failed, source } => {
                assert_eq!(failed, &path);
                assert_eq!(source.kind(), std::io::ErrorKind::StorageFull);
            }
            other => panic!("expected a write error, got {other:?}"),
        }

        // The handle stays installed and keeps failing without panicking
        assert!(guard.write_record(b"{}\n").await.is_err());
        drop(guard);
        assert_eq!(cache.current_bucket(entity).await, Some(BucketKey::new(2024, 11)));
    }

    #[tokio::test]
    async fn test_close_all_on_empty_cache() {
        let (cache, _temp) = create_test_cache();
        assert_eq!(cache.close_all().await, CloseReport::default());
    }

    #[tokio::test]
    async fn test_acquire_after_close_all_reopens() {
        let (cache, _temp) = create_test_cache();
        let entity = EntityId::new(5);

        drop(cache.acquire(entity, at(2024, 3, 15, 10)).await.unwrap());
        cache.close_all().await;
        assert_eq!(cache.current_bucket(entity).await, None);

        drop(cache.acquire(entity, at(2024, 3, 15, 11)).await.unwrap());
        assert_eq!(cache.current_bucket(entity).await, Some(BucketKey::new(2024, 11)));
        // Reopening after shutdown is a fresh open, not a rotation
        assert_eq!(cache.stats().rotations, 0);
        assert_eq!(cache.stats().opened, 2);
    }

    #[tokio::test]
    async fn test_failed_open_leaves_slot_untouched() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("base");
        let cache = HandleCache::new(LoggerConfig::with_base_dir(&base));
        let entity = EntityId::new(3);

        drop(cache.acquire(entity, at(2024, 3, 15, 10)).await.unwrap());

        // A plain file where the next bucket directory should go
        std::fs::write(base.join("2024-12"), b"in the way").unwrap();

        let err = cache.acquire(entity, at(2024, 3, 18, 10)).await.unwrap_err();
        assert!(matches!(err, StorageError::CreateDir { .. }));

        assert_eq!(cache.current_bucket(entity).await, Some(BucketKey::new(2024, 11)));
        assert_eq!(cache.stats().rotations, 0);
        assert_eq!(cache.stats().closed, 0);
    }

    #[tokio::test]
    async fn test_failed_first_open_stays_no_file() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("not-a-dir");
        std::fs::write(&base, b"file").unwrap();
        let cache = HandleCache::new(LoggerConfig::with_base_dir(&base));

        let result = cache.acquire(EntityId::new(1), at(2024, 3, 15, 10)).await;
        assert!(result.is_err());
        assert_eq!(cache.current_bucket(EntityId::new(1)).await, None);
        assert_eq!(cache.open_count().await, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_and_dir_modes() {
        use std::os::unix::fs::PermissionsExt;

        let (cache, temp) = create_test_cache();
        drop(cache.acquire(EntityId::new(1), at(2024, 3, 15, 10)).await.unwrap());

        let dir_mode = std::fs::metadata(temp.path().join("2024-11"))
            .unwrap()
            .permissions()
            .mode();
        let file_mode = std::fs::metadata(temp.path().join("2024-11/1.ndjson"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(dir_mode & 0o777, 0o700);
        assert_eq!(file_mode & 0o777, 0o600);
    }
}
