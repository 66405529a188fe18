//! The attachment download worker.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

use chanvault_core::Result;

use crate::fetch::Fetcher;
use crate::queue::{DownloadQueue, DownloadTask};

/// Every extension the engine may have written in the past. The dedupe
/// check probes all of them, so a file re-served under a different
/// content type is still recognized as already captured.
pub const FILE_EXTENSIONS: &[&str] = &[
    "bmp", "gif", "jpg", "png", "tiff", "webp", "mp4", "ogg", "webm", "txt", "bin",
];

/// Map a media type to a file extension. Unrecognized types fall back to
/// `.bin` at the call site.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/bmp" => Some("bmp"),
        "image/gif" => Some("gif"),
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/tiff" => Some("tiff"),
        "image/webp" => Some("webp"),
        "video/mp4" => Some("mp4"),
        "video/ogg" => Some("ogg"),
        "video/webm" => Some("webm"),
        "text/plain" => Some("txt"),
        _ => None,
    }
}

/// Single worker draining the [`DownloadQueue`].
///
/// Downloads are serialized — one fetch at a time, no parallelism. Per
/// task: compute `{root}/{whitelistKey}/{channelID}`, skip if any known
/// extension of `{messageID}-{attachmentID}` already exists, fetch, sniff
/// the content type, write, and notify observers with the final path.
///
/// Delivery is at-most-once with no retry: any failure is logged with the
/// url and message id and the task is abandoned. The backfill sweep will
/// not re-discover the message, since the cursor has already advanced.
pub struct Downloader {
    queue: Arc<DownloadQueue>,
    fetcher: Arc<dyn Fetcher>,
    backup_root: PathBuf,
    observers: Mutex<Vec<crossbeam_channel::Sender<PathBuf>>>,
    running: AtomicBool,
    shutdown: Notify,
}

impl Downloader {
    pub fn new(
        queue: Arc<DownloadQueue>,
        fetcher: Arc<dyn Fetcher>,
        backup_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            queue,
            fetcher,
            backup_root: backup_root.into(),
            observers: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
            shutdown: Notify::new(),
        }
    }

    /// Register an observer for "file downloaded" notifications.
    ///
    /// Each successfully written file is announced once with its final
    /// path. Used by external display/relay features.
    pub fn subscribe(&self) -> crossbeam_channel::Receiver<PathBuf> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.observers.lock().push(tx);
        rx
    }

    /// Signal the worker loop to stop after the current task.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }

    /// Whether the worker loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run the perpetual worker loop until [`Downloader::stop`] is called.
    pub async fn run(&self) {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(
            "Download worker started, backup root {}",
            self.backup_root.display()
        );

        while self.running.load(Ordering::SeqCst) {
            let task = tokio::select! {
                task = self.queue.pop() => task,
                _ = self.shutdown.notified() => break,
            };

            match self.process(&task).await {
                Ok(Some(path)) => {
                    tracing::info!(
                        "Downloaded {} for message {}",
                        task.url,
                        task.message_id
                    );
                    let observers = self.observers.lock();
                    for observer in observers.iter() {
                        // A closed receiver just means the observer went away.
                        let _ = observer.send(path.clone());
                    }
                }
                Ok(None) => {} // skipped or dropped; already logged
                Err(e) => {
                    metrics::counter!("download_dropped_total").increment(1);
                    tracing::warn!(
                        "Error downloading {} for message {}: {}",
                        task.url,
                        task.message_id,
                        e
                    );
                }
            }
        }

        tracing::info!("Download worker stopped");
    }

    /// Handle one task. `Ok(Some(path))` means a file was written;
    /// `Ok(None)` means the task was skipped (duplicate) or dropped
    /// (non-success status).
    async fn process(&self, task: &DownloadTask) -> Result<Option<PathBuf>> {
        let dest_dir = self
            .backup_root
            .join(&task.whitelist_key)
            .join(task.channel_id.to_string());
        tokio::fs::create_dir_all(&dest_dir).await?;

        let stem = task.file_stem();
        if already_downloaded(&dest_dir, &stem) {
            metrics::counter!("download_deduped_total").increment(1);
            tracing::info!("Skipping already downloaded file {}", stem);
            return Ok(None);
        }

        let Some(body) = self.fetcher.fetch(&task.url).await? else {
            metrics::counter!("download_dropped_total").increment(1);
            tracing::warn!(
                "Dropping {} for message {}: non-success status",
                task.url,
                task.message_id
            );
            return Ok(None);
        };

        let extension = match body.content_type.as_deref().and_then(extension_for) {
            Some(ext) => ext,
            None => {
                metrics::counter!("download_unknown_type_total").increment(1);
                tracing::info!(
                    "Unknown content type {:?} for {}, storing as .bin",
                    body.content_type,
                    task.url
                );
                "bin"
            }
        };

        let path = dest_dir.join(format!("{stem}.{extension}"));
        tokio::fs::write(&path, &body.bytes).await?;

        metrics::counter!("download_files_total").increment(1);
        metrics::counter!("download_bytes_total").increment(body.bytes.len() as u64);

        Ok(Some(path))
    }
}

/// Whether any known extension of the stem already exists in `dir`.
fn already_downloaded(dir: &Path, stem: &str) -> bool {
    FILE_EXTENSIONS
        .iter()
        .any(|ext| dir.join(format!("{stem}.{ext}")).exists())
}
