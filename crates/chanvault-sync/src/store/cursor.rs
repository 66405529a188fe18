//! Per-channel resumption watermarks.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use chanvault_core::{ChannelId, MessageId, Result};

use super::{CURSOR_STATE, StateBackend};

/// Persists the id of the last fully processed message per channel.
///
/// The watermark is monotonically non-decreasing for the lifetime of the
/// store: [`CursorStore::advance`] refuses to move backwards, so an
/// interleaved backfill write can never clobber a newer live-path write.
/// Entries are never deleted — a channel that falls out of scope keeps its
/// cursor so backfill can resume if it is re-whitelisted.
///
/// Wire format: newline-delimited `channelID=lastMessageID` records, fully
/// rewritten on every accepted advance.
pub struct CursorStore {
    backend: Arc<dyn StateBackend>,
    cursors: Mutex<HashMap<ChannelId, MessageId>>,
}

impl CursorStore {
    /// Load cursors from the backend. Unparsable lines are logged and
    /// skipped.
    pub fn load(backend: Arc<dyn StateBackend>) -> Result<Self> {
        let mut cursors = HashMap::new();

        if let Some(contents) = backend.load(CURSOR_STATE)? {
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match parse_line(line) {
                    Some((channel, message)) => {
                        cursors.insert(channel, message);
                    }
                    None => {
                        tracing::warn!("Skipping unparsable cursor line: {:?}", line);
                    }
                }
            }
            tracing::debug!("Loaded {} channel read positions", cursors.len());
        }

        Ok(Self {
            backend,
            cursors: Mutex::new(cursors),
        })
    }

    /// Watermark for a channel, or [`MessageId::ZERO`] if never backfilled.
    pub fn get(&self, channel: ChannelId) -> MessageId {
        self.cursors
            .lock()
            .get(&channel)
            .copied()
            .unwrap_or(MessageId::ZERO)
    }

    /// Advance the watermark for a channel and persist the full map.
    ///
    /// Returns `true` if the watermark moved. An `id` at or behind the
    /// current watermark is a no-op (and does not rewrite the file), which
    /// keeps the cursor non-decreasing under concurrent backfill/live
    /// writers.
    pub fn advance(&self, channel: ChannelId, id: MessageId) -> Result<bool> {
        let mut cursors = self.cursors.lock();
        let current = cursors.get(&channel).copied().unwrap_or(MessageId::ZERO);
        if id <= current {
            return Ok(false);
        }
        cursors.insert(channel, id);
        self.backend.save(CURSOR_STATE, &serialize(&cursors))?;
        Ok(true)
    }

    /// Number of channels with a recorded watermark.
    pub fn len(&self) -> usize {
        self.cursors.lock().len()
    }

    /// Whether any watermark has been recorded.
    pub fn is_empty(&self) -> bool {
        self.cursors.lock().is_empty()
    }
}

fn parse_line(line: &str) -> Option<(ChannelId, MessageId)> {
    let (channel, message) = line.split_once('=')?;
    Some((channel.parse().ok()?, message.parse().ok()?))
}

fn serialize(cursors: &HashMap<ChannelId, MessageId>) -> String {
    // Sorted for deterministic files (and friendlier diffs when debugging).
    let mut entries: Vec<_> = cursors.iter().collect();
    entries.sort_by_key(|(channel, _)| **channel);

    let mut out = String::new();
    for (channel, message) in entries {
        out.push_str(&format!("{channel}={message}\n"));
    }
    out
}
