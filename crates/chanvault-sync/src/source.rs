//! Injected platform collaborator interfaces.
//!
//! The engine never opens its own platform session. The host wires in two
//! capabilities at construction time:
//!
//! - [`ChannelDirectory`] — the live server/channel/category listing and
//!   the permission check for reading history
//! - [`HistorySource`] — paged message history after a watermark
//!
//! Live new-message events arrive as plain [`Message`] values on whatever
//! channel the host chooses (see
//! [`SyncOrchestrator::run_live`](crate::orchestrator::SyncOrchestrator::run_live)).

use async_trait::async_trait;

use chanvault_core::{CategoryId, ChannelId, ChannelInfo, Message, MessageId, Result, ServerId};

/// Live view of the platform's server and channel topology.
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    /// Servers the session is a member of.
    async fn servers(&self) -> Result<Vec<ServerId>>;

    /// All channels of a server, regardless of kind.
    async fn channels(&self, server: ServerId) -> Result<Vec<ChannelInfo>>;

    /// The full category→channel membership of a server.
    ///
    /// Used by the selector's cache rebuild; one call covers every channel
    /// of the server, not just the one that missed.
    async fn category_members(
        &self,
        server: ServerId,
    ) -> Result<Vec<(CategoryId, Vec<ChannelId>)>>;

    /// Whether the session may read a channel's message history.
    async fn can_read_history(&self, channel: ChannelId) -> Result<bool>;

    /// Look up a channel by id across all servers, if it still exists.
    async fn find_channel(&self, channel: ChannelId) -> Result<Option<ChannelInfo>>;
}

/// Paged message-history access.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// The next page of messages strictly after `cursor`, delivered in
    /// ascending-id order. An empty page means the cursor is at the head
    /// of history.
    ///
    /// Implementations should return
    /// [`Error::PermissionDenied`](chanvault_core::Error::PermissionDenied)
    /// when the platform refuses access; the orchestrator skips the channel
    /// for that sweep pass and retries on the next one.
    async fn page_after(&self, channel: ChannelId, cursor: MessageId) -> Result<Vec<Message>>;
}
