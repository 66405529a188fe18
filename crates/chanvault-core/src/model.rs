//! The channel/message model consumed by the sync engine.
//!
//! These are plain value types produced by the platform client adapters.
//! They carry only what the engine needs: ids, the attachment URLs, and
//! enough channel shape to decide text-capability and category membership.

use crate::ids::{AttachmentId, CategoryId, ChannelId, MessageId, ServerId};

/// A single file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: AttachmentId,
    /// Direct download URL as reported by the platform.
    pub url: String,
}

/// A message as observed either in a history page or a live event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// Whether this message carries anything worth downloading.
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}

/// Kind of a channel, as far as the engine cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Regular text channel with message history.
    Text,
    /// Voice channel; no message history to mirror.
    Voice,
    /// Category container channel.
    Category,
    /// Anything else (forum, stage, ...).
    Other,
}

impl ChannelKind {
    /// Text-capable channels are the only ones eligible for backup.
    pub fn is_text(self) -> bool {
        matches!(self, ChannelKind::Text)
    }
}

/// A channel as listed by the platform directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub server_id: ServerId,
    pub name: String,
    pub kind: ChannelKind,
    /// Parent category, or [`CategoryId::NONE`] for top-level channels.
    pub category_id: CategoryId,
}

impl ChannelInfo {
    /// Convenience constructor for a text channel.
    pub fn text(
        id: impl Into<ChannelId>,
        server_id: impl Into<ServerId>,
        name: impl Into<String>,
        category_id: CategoryId,
    ) -> Self {
        Self {
            id: id.into(),
            server_id: server_id.into(),
            name: name.into(),
            kind: ChannelKind::Text,
            category_id,
        }
    }
}
