//! Recognized entry kinds and their payloads
//!
//! The set of kinds is closed: the translation layer maps upstream events
//! onto one of the [`Entry`] variants, and each variant's payload shape is
//! fixed. Adding a kind means adding a variant here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::{self, Record};
use crate::error::CodecError;
use crate::identity::Snowflake;

/// Tag identifying the kind of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// A message was posted
    #[serde(rename = "msg")]
    MessageCreated,
    /// A message was deleted
    #[serde(rename = "delmsg")]
    MessageDeleted,
    /// A channel was created or changed
    #[serde(rename = "chan")]
    ChannelUpdated,
}

impl EntryKind {
    /// All recognized kinds
    pub const ALL: [EntryKind; 3] = [
        EntryKind::MessageCreated,
        EntryKind::MessageDeleted,
        EntryKind::ChannelUpdated,
    ];

    /// The `type` tag written to the log
    pub const fn as_str(self) -> &'static str {
        match self {
            EntryKind::MessageCreated => "msg",
            EntryKind::MessageDeleted => "delmsg",
            EntryKind::ChannelUpdated => "chan",
        }
    }

    /// Look up a kind by its `type` tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user as it appears in an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: Snowflake,
    /// `username#discriminator`
    pub tag: String,
}

impl UserRef {
    /// Build a reference from the user's name parts
    pub fn new(id: Snowflake, username: &str, discriminator: &str) -> Self {
        Self {
            id,
            tag: format!("{}#{}", username, discriminator),
        }
    }
}

/// A channel as it appears in an entry
///
/// The name is resolved at logging time and is empty when it could not be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: Snowflake,
    pub name: String,
}

/// Payload of [`EntryKind::MessageCreated`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntry {
    pub author: UserRef,
    pub id: Snowflake,
    pub channel: ChannelRef,
    pub content: String,
    /// When the message was posted, per the upstream platform
    #[serde(rename = "time")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "editedTimestamp")]
    pub edited_timestamp: Option<DateTime<Utc>>,
}

/// Payload of [`EntryKind::MessageDeleted`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDeleteEntry {
    pub id: Snowflake,
    pub channel: ChannelRef,
}

/// Payload of [`EntryKind::ChannelUpdated`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEntry {
    pub id: Snowflake,
    pub name: String,
    pub topic: String,
}

/// One loggable event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Message(MessageEntry),
    MessageDelete(MessageDeleteEntry),
    Channel(ChannelEntry),
}

impl Entry {
    /// The kind tag of this entry
    pub fn kind(&self) -> EntryKind {
        match self {
            Entry::Message(_) => EntryKind::MessageCreated,
            Entry::MessageDelete(_) => EntryKind::MessageDeleted,
            Entry::Channel(_) => EntryKind::ChannelUpdated,
        }
    }

    /// Encode as a single newline-terminated record stamped with `time`
    pub fn encode(&self, time: DateTime<Utc>) -> Result<Vec<u8>, CodecError> {
        let kind = self.kind().as_str();
        match self {
            Entry::Message(data) => codec::encode_record(kind, time, data),
            Entry::MessageDelete(data) => codec::encode_record(kind, time, data),
            Entry::Channel(data) => codec::encode_record(kind, time, data),
        }
    }

    /// Rebuild an entry from a decoded record
    pub fn from_record(record: Record) -> Result<Self, CodecError> {
        let kind =
            EntryKind::from_tag(&record.kind).ok_or_else(|| CodecError::unknown_kind(&record.kind))?;
        let entry = match kind {
            EntryKind::MessageCreated => {
                Entry::Message(serde_json::from_value(record.data).map_err(CodecError::Decode)?)
            }
            EntryKind::MessageDeleted => Entry::MessageDelete(
                serde_json::from_value(record.data).map_err(CodecError::Decode)?,
            ),
            EntryKind::ChannelUpdated => {
                Entry::Channel(serde_json::from_value(record.data).map_err(CodecError::Decode)?)
            }
        };
        Ok(entry)
    }

    /// Decode one log line back into its stamp and entry
    pub fn decode(line: impl AsRef<[u8]>) -> Result<(DateTime<Utc>, Self), CodecError> {
        let record = codec::decode_record(line)?;
        let time = record.time;
        Ok((time, Self::from_record(record)?))
    }
}

impl From<MessageEntry> for Entry {
    fn from(entry: MessageEntry) -> Self {
        Entry::Message(entry)
    }
}

impl From<MessageDeleteEntry> for Entry {
    fn from(entry: MessageDeleteEntry) -> Self {
        Entry::MessageDelete(entry)
    }
}

impl From<ChannelEntry> for Entry {
    fn from(entry: ChannelEntry) -> Self {
        Entry::Channel(entry)
    }
}
