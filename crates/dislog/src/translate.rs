//! Translation from gateway events to log entries

use dashmap::DashMap;
use dislog_core::{
    ChannelEntry, ChannelRef, EntityId, Entry, MessageDeleteEntry, MessageEntry, Snowflake, UserRef,
};
use tracing::trace;

use crate::gateway::{Channel, GatewayEvent};

/// Channel names learned from channel events
///
/// Messages only carry a channel id; the name written next to it comes from
/// here and is empty for channels not seen yet.
#[derive(Debug, Default)]
pub struct ChannelDirectory {
    names: DashMap<Snowflake, String>,
}

impl ChannelDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a channel's current name
    pub fn remember(&self, id: Snowflake, name: impl Into<String>) {
        self.names.insert(id, name.into());
    }

    /// Reference to a channel, named if known
    pub fn channel_ref(&self, id: Snowflake) -> ChannelRef {
        let name = self
            .names
            .get(&id)
            .map(|name| name.value().clone())
            .unwrap_or_default();
        ChannelRef { id, name }
    }

    /// Number of known channels
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no channel is known
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Maps gateway events onto `(guild, entry)` pairs
#[derive(Debug, Default)]
pub struct Translator {
    channels: ChannelDirectory,
}

impl Translator {
    /// Create a translator with no known channels
    pub fn new() -> Self {
        Self::default()
    }

    /// Known channel names
    pub fn channels(&self) -> &ChannelDirectory {
        &self.channels
    }

    /// Translate an event
    ///
    /// Returns `None` for events without a guild and for event kinds that
    /// are not logged.
    pub fn translate(&self, event: &GatewayEvent) -> Option<(EntityId, Entry)> {
        let guild = match event.guild_id() {
            Some(guild) => EntityId::from(guild),
            None => {
                trace!(event = ?event, "Skipping event without guild");
                return None;
            }
        };

        let entry = match event {
            GatewayEvent::MessageCreate(msg) => Entry::Message(MessageEntry {
                author: UserRef::new(msg.author.id, &msg.author.username, &msg.author.discriminator),
                id: msg.id,
                channel: self.channels.channel_ref(msg.channel_id),
                content: msg.content.clone(),
                timestamp: msg.timestamp,
                edited_timestamp: msg.edited_timestamp,
            }),
            GatewayEvent::MessageDelete(msg) => Entry::MessageDelete(MessageDeleteEntry {
                id: msg.id,
                channel: self.channels.channel_ref(msg.channel_id),
            }),
            GatewayEvent::ChannelCreate(channel) | GatewayEvent::ChannelUpdate(channel) => {
                Entry::Channel(self.channel_entry(channel))
            }
            GatewayEvent::Other(_) => return None,
        };

        Some((guild, entry))
    }

    fn channel_entry(&self, channel: &Channel) -> ChannelEntry {
        let name = channel.name.clone().unwrap_or_default();
        if !name.is_empty() {
            self.channels.remember(channel.id, name.clone());
        }
        ChannelEntry {
            id: channel.id,
            name,
            topic: channel.topic.clone().unwrap_or_default(),
        }
    }
}
