//! Channel eligibility: whitelist matching with a category fallback.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use chanvault_core::{CategoryId, ChannelId, ServerId};

use crate::source::ChannelDirectory;
use crate::store::WhitelistStore;

/// The externally-owned whitelist matching predicate.
///
/// `key` is an opaque whitelist entry; `id` is a raw platform id (channel
/// or category). The policy decides what a key means — the engine only
/// cares about match order.
pub trait WhitelistPolicy: Send + Sync {
    fn object_ok(&self, key: &str, id: u64) -> bool;
}

/// Decides whether a channel is in scope for backup.
///
/// Whitelist keys are tested in configured order against the channel id
/// first, then against the category id; the first positive match wins, so
/// channel-level entries take precedence over category-level ones by
/// construction.
///
/// Category lookups go through a channel→category cache. On a miss the
/// selector rescans the *entire* category membership of the owning server
/// and repopulates every mapping observed — an O(serverChannelCount)
/// operation amortized across all siblings. The cache is memoization only,
/// never authoritative; [`ChannelSelector::invalidate`] clears it, and the
/// orchestrator does so at the start of every full sweep so a channel that
/// moved categories is re-resolved no later than the next sweep.
pub struct ChannelSelector {
    whitelist: Arc<WhitelistStore>,
    policy: Arc<dyn WhitelistPolicy>,
    directory: Arc<dyn ChannelDirectory>,
    category_cache: Mutex<HashMap<ChannelId, CategoryId>>,
}

impl ChannelSelector {
    pub fn new(
        whitelist: Arc<WhitelistStore>,
        policy: Arc<dyn WhitelistPolicy>,
        directory: Arc<dyn ChannelDirectory>,
    ) -> Self {
        Self {
            whitelist,
            policy,
            directory,
            category_cache: Mutex::new(HashMap::new()),
        }
    }

    /// First whitelist key (in list order) matching the given raw id.
    pub fn match_key(&self, id: u64) -> Option<String> {
        self.whitelist
            .keys()
            .into_iter()
            .find(|key| self.policy.object_ok(key, id))
    }

    /// Whether the channel is in scope, and under which whitelist key.
    ///
    /// The channel id is tested before the category id, so a channel-level
    /// match always wins over a category-level one.
    pub fn is_eligible(&self, channel: ChannelId, category: CategoryId) -> Option<String> {
        self.match_key(channel.get())
            .or_else(|| self.match_key(category.get()))
    }

    /// Parent category of a channel, via the cache.
    ///
    /// On a miss the whole server's category membership is rescanned and
    /// cached. Returns [`CategoryId::NONE`] if the channel has no parent
    /// category or disappeared mid-rebuild (non-fatal).
    pub async fn category_of(&self, server: ServerId, channel: ChannelId) -> CategoryId {
        if let Some(category) = self.category_cache.lock().get(&channel) {
            return *category;
        }

        match self.directory.category_members(server).await {
            Ok(members) => {
                let mut cache = self.category_cache.lock();
                for (category, channels) in members {
                    for member in channels {
                        cache.insert(member, category);
                    }
                }
                cache.get(&channel).copied().unwrap_or(CategoryId::NONE)
            }
            Err(e) => {
                tracing::warn!(
                    "Category scan of server {} failed: {}; treating channel {} as uncategorized",
                    server,
                    e,
                    channel
                );
                CategoryId::NONE
            }
        }
    }

    /// Drop every cached channel→category mapping.
    pub fn invalidate(&self) {
        self.category_cache.lock().clear();
    }

    /// Number of cached channel→category mappings.
    pub fn cached_mappings(&self) -> usize {
        self.category_cache.lock().len()
    }
}
