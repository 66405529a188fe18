//! Per-channel display-name and category bookkeeping.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use chanvault_core::{CategoryId, ChannelId, Result};

use super::{METADATA_STATE, StateBackend};

/// What the store remembers about a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMeta {
    pub name: String,
    pub category_id: CategoryId,
}

/// Persists per-channel display names and parent categories.
///
/// This is bookkeeping only — archival folder decisions and operator
/// auditing — and never feeds eligibility.
///
/// Wire format: newline-delimited `channelID=displayName,categoryID`
/// records. The name is delimited by the first `=` and the **last** `,`, so
/// display names containing commas round-trip.
pub struct MetadataStore {
    backend: Arc<dyn StateBackend>,
    channels: Mutex<HashMap<ChannelId, ChannelMeta>>,
}

impl MetadataStore {
    /// Load metadata from the backend. Unparsable lines are logged and
    /// skipped.
    pub fn load(backend: Arc<dyn StateBackend>) -> Result<Self> {
        let mut channels = HashMap::new();

        if let Some(contents) = backend.load(METADATA_STATE)? {
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match parse_line(line) {
                    Some((channel, meta)) => {
                        channels.insert(channel, meta);
                    }
                    None => {
                        tracing::warn!("Skipping unparsable metadata line: {:?}", line);
                    }
                }
            }
            tracing::debug!("Loaded {} channel metadata records", channels.len());
        }

        Ok(Self {
            backend,
            channels: Mutex::new(channels),
        })
    }

    /// Current metadata for a channel, if recorded.
    pub fn get(&self, channel: ChannelId) -> Option<ChannelMeta> {
        self.channels.lock().get(&channel).cloned()
    }

    /// Record the observed name and category for a channel.
    ///
    /// Persists only when the name or the category actually changed;
    /// returns `true` in that case.
    pub fn record(
        &self,
        channel: ChannelId,
        name: &str,
        category_id: CategoryId,
    ) -> Result<bool> {
        let mut channels = self.channels.lock();
        let changed = match channels.get(&channel) {
            Some(meta) => meta.name != name || meta.category_id != category_id,
            None => true,
        };
        if !changed {
            return Ok(false);
        }
        channels.insert(
            channel,
            ChannelMeta {
                name: name.to_string(),
                category_id,
            },
        );
        self.backend.save(METADATA_STATE, &serialize(&channels))?;
        Ok(true)
    }
}

fn parse_line(line: &str) -> Option<(ChannelId, ChannelMeta)> {
    let (channel, rest) = line.split_once('=')?;
    let (name, category) = rest.rsplit_once(',')?;
    Some((
        channel.parse().ok()?,
        ChannelMeta {
            name: name.to_string(),
            category_id: category.parse().ok()?,
        },
    ))
}

fn serialize(channels: &HashMap<ChannelId, ChannelMeta>) -> String {
    let mut entries: Vec<_> = channels.iter().collect();
    entries.sort_by_key(|(channel, _)| **channel);

    let mut out = String::new();
    for (channel, meta) in entries {
        out.push_str(&format!("{channel}={},{}\n", meta.name, meta.category_id));
    }
    out
}
