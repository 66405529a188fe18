//! Startup reconciliation of on-disk backups against current eligibility.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chanvault_core::{ChannelId, ChannelInfo, Result};

use crate::select::ChannelSelector;
use crate::source::ChannelDirectory;

/// One-shot sweep that retires backup folders for channels no longer in
/// scope.
///
/// For each direct subdirectory of the backup root whose name parses as a
/// channel id, the folder is **moved** (never deleted) into the quarantine
/// root when the channel no longer exists, is not text-capable, or is no
/// longer whitelisted. Retirement is thereby reversible and auditable.
/// Non-numeric directory names (the whitelist-key folders) are skipped.
///
/// Runs once at startup, before the first sweep.
pub struct ArchiveReconciler {
    directory: Arc<dyn ChannelDirectory>,
    selector: Arc<ChannelSelector>,
    backup_root: PathBuf,
    removed_root: PathBuf,
}

impl ArchiveReconciler {
    pub fn new(
        directory: Arc<dyn ChannelDirectory>,
        selector: Arc<ChannelSelector>,
        backup_root: impl Into<PathBuf>,
        removed_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            directory,
            selector,
            backup_root: backup_root.into(),
            removed_root: removed_root.into(),
        }
    }

    /// Run the sweep. Returns the number of folders retired.
    ///
    /// Individual move failures are logged and do not abort the sweep.
    pub async fn run(&self) -> Result<usize> {
        fs::create_dir_all(&self.backup_root)?;
        fs::create_dir_all(&self.removed_root)?;

        // Snapshot of every channel across all servers.
        let mut known: HashMap<ChannelId, ChannelInfo> = HashMap::new();
        for server in self.directory.servers().await? {
            for channel in self.directory.channels(server).await? {
                known.insert(channel.id, channel);
            }
        }

        let mut retired = 0usize;
        for entry in fs::read_dir(&self.backup_root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Ok(channel_id) = name.parse::<ChannelId>() else {
                continue;
            };

            if self.should_retire(channel_id, known.get(&channel_id)).await {
                let dest = self.removed_root.join(name);
                match fs::rename(entry.path(), &dest) {
                    Ok(()) => {
                        metrics::counter!("reconcile_folders_retired_total").increment(1);
                        tracing::info!(
                            "Retired backup folder for channel {} to {}",
                            channel_id,
                            dest.display()
                        );
                        retired += 1;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Failed to retire backup folder for channel {}: {}",
                            channel_id,
                            e
                        );
                    }
                }
            }
        }

        Ok(retired)
    }

    async fn should_retire(&self, channel_id: ChannelId, info: Option<&ChannelInfo>) -> bool {
        match info {
            // Channel no longer exists anywhere.
            None => true,
            // Exists, but is not a text channel anymore.
            Some(info) if !info.kind.is_text() => true,
            // Exists and is text-capable: retire only if no longer eligible.
            Some(info) => {
                let category = self
                    .selector
                    .category_of(info.server_id, channel_id)
                    .await;
                self.selector.is_eligible(channel_id, category).is_none()
            }
        }
    }
}
