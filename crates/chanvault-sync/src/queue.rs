//! The pending-attachment download queue.

use std::collections::VecDeque;
use std::pin::pin;

use parking_lot::Mutex;
use tokio::sync::Notify;

use chanvault_core::{AttachmentId, ChannelId, MessageId, ServerId};

/// One attachment to fetch and write to disk.
///
/// Immutable value, consumed exactly once by the downloader; a failed task
/// is dropped permanently (no retry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub server_id: ServerId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub attachment_id: AttachmentId,
    pub url: String,
    /// Whitelist key the channel matched; the top-level backup folder name.
    pub whitelist_key: String,
}

impl DownloadTask {
    /// Filename stem for this attachment: `{messageID}-{attachmentID}`.
    pub fn file_stem(&self) -> String {
        format!("{}-{}", self.message_id, self.attachment_id)
    }
}

/// Unbounded FIFO of pending downloads.
///
/// Shared-write, single-consumer: the backfill loop and the live handler
/// both push; only the [`Downloader`](crate::download::Downloader) pops.
/// Waits are blocking (notify-based), not fixed-delay polls, which
/// preserves the same ordering and backpressure contract as a busy-poll
/// while removing the fixed latency.
pub struct DownloadQueue {
    tasks: Mutex<VecDeque<DownloadTask>>,
    /// Signaled on push; permits are stored, so a push before the consumer
    /// parks is never lost.
    task_ready: Notify,
    /// Signaled when a pop leaves the queue empty.
    drained: Notify,
}

impl Default for DownloadQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadQueue {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(VecDeque::new()),
            task_ready: Notify::new(),
            drained: Notify::new(),
        }
    }

    /// Append a task. Non-blocking; callable from any number of producers.
    pub fn push(&self, task: DownloadTask) {
        let depth = {
            let mut tasks = self.tasks.lock();
            tasks.push_back(task);
            tasks.len()
        };
        metrics::gauge!("download_queue_depth").set(depth as f64);
        self.task_ready.notify_one();
    }

    /// Remove and return the oldest task, waiting until one is available.
    pub async fn pop(&self) -> DownloadTask {
        loop {
            let notified = pin!(self.task_ready.notified());
            {
                let mut tasks = self.tasks.lock();
                if let Some(task) = tasks.pop_front() {
                    let depth = tasks.len();
                    drop(tasks);
                    metrics::gauge!("download_queue_depth").set(depth as f64);
                    if depth == 0 {
                        self.drained.notify_waiters();
                    }
                    return task;
                }
            }
            notified.await;
        }
    }

    /// Current number of pending tasks.
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Whether no tasks are pending.
    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Block until the queue length reaches zero.
    ///
    /// This is the backfill drain barrier: it throttles paging to download
    /// completion and bounds the queue's memory growth. A task already
    /// handed to the downloader counts as drained.
    pub async fn wait_empty(&self) {
        loop {
            let mut notified = pin!(self.drained.notified());
            // Register before checking so a drain between the check and the
            // await is not missed.
            notified.as_mut().enable();
            if self.tasks.lock().is_empty() {
                return;
            }
            notified.await;
        }
    }
}
