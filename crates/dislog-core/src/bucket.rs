//! Weekly buckets
//!
//! Every log file covers one entity for one ISO-8601 week. The bucket of an
//! instant is its ISO week-numbering year and ISO week number, which differ
//! from the calendar year around New Year: 2021-01-01 belongs to week 53 of
//! 2020.

use std::fmt::{self, Display};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::EntityId;

/// File extension of bucket files
pub const LOG_FILE_EXTENSION: &str = "ndjson";

/// An (ISO year, ISO week) pair
///
/// Ordering is by year, then week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    /// ISO week-numbering year
    pub year: i32,
    /// ISO week number, 1..=53
    pub week: u32,
}

impl BucketKey {
    /// Create a bucket key
    pub const fn new(year: i32, week: u32) -> Self {
        Self { year, week }
    }

    /// The bucket an instant falls into
    pub fn for_time(time: DateTime<Utc>) -> Self {
        let iso = time.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    /// Whether an instant falls into this bucket
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        Self::for_time(time) == *self
    }

    /// Name of the directory holding this bucket's files
    pub fn dir_name(&self) -> String {
        self.to_string()
    }
}

impl Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.year, self.week)
    }
}

/// Storage path of an entity's file for a bucket
///
/// `{base}/{year}-{week}/{entity}.ndjson`. Years and weeks are not zero
/// padded, and since a week never exceeds two digits and the entity is the
/// file stem, distinct (entity, bucket) pairs never share a path.
pub fn bucket_path(base: impl AsRef<Path>, entity: EntityId, bucket: BucketKey) -> PathBuf {
    base.as_ref()
        .join(bucket.dir_name())
        .join(format!("{}.{}", entity, LOG_FILE_EXTENSION))
}
