//! # Dislog Core
//!
//! Core types shared by every dislog crate.
//!
//! dislog records a stream of guild events as newline-delimited JSON, one
//! file per guild per ISO week. This crate holds the pieces that carry no
//! I/O of their own:
//!
//! - [`EntityId`] and [`Snowflake`]: identifiers for log owners and the
//!   objects referenced inside entries
//! - [`BucketKey`] and [`bucket_path`]: the (ISO year, ISO week) bucket an
//!   instant falls into and where that bucket lives on disk
//! - [`Entry`] and its payloads: the closed set of recognized entry kinds
//! - [`codec`]: the single-line `{type, time, data}` record format
//! - [`Clock`]: time abstraction so rotation can be tested deterministically
//!
//! ## Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use dislog_core::{bucket_path, BucketKey, EntityId};
//!
//! let t = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
//! let bucket = BucketKey::for_time(t);
//! assert_eq!((bucket.year, bucket.week), (2020, 53));
//!
//! let path = bucket_path("logs", EntityId::new(42), bucket);
//! assert_eq!(path, std::path::Path::new("logs/2020-53/42.ndjson"));
//! ```

pub mod bucket;
pub mod clock;
pub mod codec;
pub mod entry;
pub mod error;
pub mod identity;

// Re-export main types
pub use bucket::{bucket_path, BucketKey, LOG_FILE_EXTENSION};
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{decode_record, encode_record, Record};
pub use entry::{
    ChannelEntry, ChannelRef, Entry, EntryKind, MessageDeleteEntry, MessageEntry, UserRef,
};
pub use error::CodecError;
pub use identity::{EntityId, Snowflake};
