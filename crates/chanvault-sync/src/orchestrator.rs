//! The sync orchestrator: full-server backfill and live-event ingestion.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use chanvault_core::{ChannelInfo, Message, Result};

use crate::queue::{DownloadQueue, DownloadTask};
use crate::select::ChannelSelector;
use crate::source::{ChannelDirectory, HistorySource};
use crate::store::{CursorStore, MetadataStore};

/// Orchestrator tuning knobs.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Pacing delay between history pages of a single channel.
    pub page_delay: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            page_delay: Duration::from_secs(1),
        }
    }
}

/// Statistics from one full-server sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepStats {
    /// Channels that ran the paging sequence.
    pub channels_backed_up: usize,
    /// Channels skipped (not whitelisted, or no history permission).
    pub channels_skipped: usize,
    /// History pages processed.
    pub pages: usize,
    /// Messages observed.
    pub messages: usize,
    /// Download tasks enqueued.
    pub enqueued: usize,
}

/// Drives backfill and live-event ingestion.
///
/// Holds no per-channel state beyond transient loop variables: resumption
/// lives in the [`CursorStore`], eligibility in the [`ChannelSelector`].
///
/// Per channel the backfill pass is `Idle → Paging → Draining → Idle`:
/// request the page strictly after the cursor, enqueue one download task
/// per attachment, advance the cursor to the highest id in the page,
/// persist, then block until the download queue drains before the next
/// page. An empty page terminates the pass. The live path processes a
/// single message with no paging and no draining.
pub struct SyncOrchestrator {
    directory: Arc<dyn ChannelDirectory>,
    history: Arc<dyn HistorySource>,
    selector: Arc<ChannelSelector>,
    cursors: Arc<CursorStore>,
    metadata: Arc<MetadataStore>,
    queue: Arc<DownloadQueue>,
    config: OrchestratorConfig,
}

impl SyncOrchestrator {
    pub fn new(
        directory: Arc<dyn ChannelDirectory>,
        history: Arc<dyn HistorySource>,
        selector: Arc<ChannelSelector>,
        cursors: Arc<CursorStore>,
        metadata: Arc<MetadataStore>,
        queue: Arc<DownloadQueue>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            directory,
            history,
            selector,
            cursors,
            metadata,
            queue,
            config,
        }
    }

    /// Full-server sweep: every server, every text channel, eligibility
    /// checked once per channel per sweep.
    ///
    /// Invoked at startup and whenever the whitelist changes. The
    /// selector's category cache is invalidated at sweep start so channel
    /// moves are picked up.
    pub async fn backfill_all(&self) -> Result<SweepStats> {
        metrics::gauge!("backfill_running").set(1.0);
        self.selector.invalidate();

        let mut stats = SweepStats::default();
        for server in self.directory.servers().await? {
            for channel in self.directory.channels(server).await? {
                if !channel.kind.is_text() {
                    continue;
                }
                let category = self.selector.category_of(server, channel.id).await;
                match self.selector.is_eligible(channel.id, category) {
                    Some(key) => {
                        if let Err(e) = self.metadata.record(channel.id, &channel.name, category) {
                            tracing::warn!(
                                "Failed to persist metadata for {}: {}",
                                channel.id,
                                e
                            );
                        }
                        self.backfill_channel(&channel, &key, &mut stats).await;
                    }
                    None => {
                        tracing::info!(
                            "Skipping backup of {}, not on whitelist",
                            channel.name
                        );
                        metrics::counter!("backfill_channels_skipped_total").increment(1);
                        stats.channels_skipped += 1;
                    }
                }
            }
        }

        metrics::gauge!("backfill_running").set(0.0);
        tracing::info!(
            "Sweep complete: {} channels backed up, {} skipped, {} pages, {} tasks",
            stats.channels_backed_up,
            stats.channels_skipped,
            stats.pages,
            stats.enqueued
        );
        Ok(stats)
    }

    /// Paged walk of one channel's history from its cursor forward.
    ///
    /// Failures are per-channel: a permission refusal or page error skips
    /// the channel for this pass and the next sweep retries it.
    async fn backfill_channel(&self, channel: &ChannelInfo, key: &str, stats: &mut SweepStats) {
        match self.directory.can_read_history(channel.id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!("Insufficient access to {}", channel.name);
                metrics::counter!("backfill_channels_skipped_total").increment(1);
                stats.channels_skipped += 1;
                return;
            }
            Err(e) => {
                tracing::warn!("Permission check for {} failed: {}", channel.name, e);
                stats.channels_skipped += 1;
                return;
            }
        }

        tracing::info!("Backing up {} on server {}", channel.name, channel.server_id);
        stats.channels_backed_up += 1;
        let mut cursor = self.cursors.get(channel.id);

        loop {
            let page = match self.history.page_after(channel.id, cursor).await {
                Ok(page) => page,
                Err(e) if e.is_permission_denied() => {
                    tracing::info!("Lost history access to {} mid-sweep", channel.name);
                    return;
                }
                Err(e) => {
                    tracing::warn!("History page for {} failed: {}", channel.name, e);
                    return;
                }
            };
            if page.is_empty() {
                break;
            }

            let mut highest = cursor;
            for message in &page {
                stats.messages += 1;
                if message.id > highest {
                    highest = message.id;
                }
                self.enqueue_attachments(channel, message, key, stats);
            }
            stats.pages += 1;
            metrics::counter!("backfill_pages_total").increment(1);
            metrics::counter!("backfill_messages_total").increment(page.len() as u64);

            if highest > cursor {
                cursor = highest;
                match self.cursors.advance(channel.id, cursor) {
                    Ok(_) => {
                        tracing::info!("{} is now on position {}", channel.name, cursor);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to persist cursor for {}: {}", channel.id, e);
                    }
                }
            }

            // Draining: throttle paging to download completion.
            self.queue.wait_empty().await;
            if !self.config.page_delay.is_zero() {
                tokio::time::sleep(self.config.page_delay).await;
            }
        }

        tracing::info!(
            "Done backing up {} on server {}",
            channel.name,
            channel.server_id
        );
    }

    /// Live path: process one new-message notification.
    ///
    /// No paging and no draining — a single message is cheap enough not to
    /// need backpressure. Ineligible or unknown channels are ignored.
    pub async fn handle_live_message(&self, message: &Message) -> Result<()> {
        let Some(channel) = self.directory.find_channel(message.channel_id).await? else {
            return Ok(());
        };
        if !channel.kind.is_text() {
            return Ok(());
        }

        let category = self
            .selector
            .category_of(channel.server_id, channel.id)
            .await;
        let Some(key) = self.selector.is_eligible(channel.id, category) else {
            return Ok(());
        };

        if let Err(e) = self.metadata.record(channel.id, &channel.name, category) {
            tracing::warn!("Failed to persist metadata for {}: {}", channel.id, e);
        }

        let mut stats = SweepStats::default();
        self.enqueue_attachments(&channel, message, &key, &mut stats);
        metrics::counter!("live_messages_total").increment(1);

        self.cursors.advance(channel.id, message.id)?;
        Ok(())
    }

    /// Consume a live new-message event stream until the sender closes.
    ///
    /// The host adapts the platform's message-received hook onto this
    /// channel. Handler errors are logged and the stream continues.
    pub async fn run_live(&self, mut events: mpsc::UnboundedReceiver<Message>) {
        while let Some(message) = events.recv().await {
            if let Err(e) = self.handle_live_message(&message).await {
                tracing::warn!(
                    "Live message {} in {} failed: {}",
                    message.id,
                    message.channel_id,
                    e
                );
            }
        }
        tracing::debug!("Live event stream closed");
    }

    fn enqueue_attachments(
        &self,
        channel: &ChannelInfo,
        message: &Message,
        key: &str,
        stats: &mut SweepStats,
    ) {
        for attachment in &message.attachments {
            tracing::info!("Queued download for message {}", message.id);
            self.queue.push(DownloadTask {
                server_id: channel.server_id,
                channel_id: channel.id,
                message_id: message.id,
                attachment_id: attachment.id,
                url: attachment.url.clone(),
                whitelist_key: key.to_string(),
            });
            stats.enqueued += 1;
        }
    }
}
