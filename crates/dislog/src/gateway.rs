//! Upstream gateway events
//!
//! dislog reads the chat platform's gateway dispatches as one JSON object
//! per line, `{"t": <event name>, "d": <payload>}`. Only the events that
//! map onto an entry kind are decoded; every other event name is kept as
//! [`GatewayEvent::Other`] so the caller can count and skip it.

use chrono::{DateTime, Utc};
use dislog_core::Snowflake;
use serde::Deserialize;
use thiserror::Error;

/// Errors while reading a gateway line
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The line is not a JSON envelope
    #[error("Malformed gateway line: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The payload does not match its event name
    #[error("Invalid {event} payload: {source}")]
    Payload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    t: Option<String>,
    #[serde(default)]
    d: serde_json::Value,
}

/// Author of a message
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: Snowflake,
    pub username: String,
    #[serde(default)]
    pub discriminator: String,
}

/// `MESSAGE_CREATE` payload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageCreate {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub author: User,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub edited_timestamp: Option<DateTime<Utc>>,
}

/// `MESSAGE_DELETE` payload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageDelete {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

/// `CHANNEL_CREATE` / `CHANNEL_UPDATE` payload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Channel {
    pub id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
}

/// A decoded gateway dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    MessageCreate(MessageCreate),
    MessageDelete(MessageDelete),
    ChannelCreate(Channel),
    ChannelUpdate(Channel),
    /// Any event name dislog does not log
    Other(String),
}

impl GatewayEvent {
    /// Parse one line
    pub fn parse(line: &str) -> Result<Self, GatewayError> {
        let envelope: Envelope = serde_json::from_str(line).map_err(GatewayError::Malformed)?;
        let name = envelope.t.unwrap_or_default();

        fn payload<T: for<'de> Deserialize<'de>>(
            name: &str,
            d: serde_json::Value,
        ) -> Result<T, GatewayError> {
            serde_json::from_value(d).map_err(|source| GatewayError::Payload {
                event: name.to_string(),
                source,
            })
        }

        let event = match name.as_str() {
            "MESSAGE_CREATE" => GatewayEvent::MessageCreate(payload(&name, envelope.d)?),
            "MESSAGE_DELETE" => GatewayEvent::MessageDelete(payload(&name, envelope.d)?),
            "CHANNEL_CREATE" => GatewayEvent::ChannelCreate(payload(&name, envelope.d)?),
            "CHANNEL_UPDATE" => GatewayEvent::ChannelUpdate(payload(&name, envelope.d)?),
            _ => GatewayEvent::Other(name),
        };
        Ok(event)
    }

    /// The guild the event belongs to, if it carries a valid one
    pub fn guild_id(&self) -> Option<Snowflake> {
        let id = match self {
            GatewayEvent::MessageCreate(m) => m.guild_id,
            GatewayEvent::MessageDelete(m) => m.guild_id,
            GatewayEvent::ChannelCreate(c) | GatewayEvent::ChannelUpdate(c) => c.guild_id,
            GatewayEvent::Other(_) => None,
        };
        id.filter(|id| id.is_valid())
    }
}
