//! End-to-end tests for the sync engine: backfill, live path, download
//! worker, and startup reconciliation wired together with in-memory
//! platform fakes.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use chanvault_core::{
    Attachment, AttachmentId, CategoryId, ChannelId, ChannelInfo, ChannelKind, Message, MessageId,
    Result, ServerId,
};
use chanvault_sync::{
    ArchiveReconciler, ChannelSelector, CursorStore, DownloadQueue, Downloader, FetchedBody,
    Fetcher, FileBackend, MetadataStore, OrchestratorConfig, StateBackend, SyncOrchestrator,
    WhitelistPolicy, WhitelistStore,
};

// ═══════════════════════════════════════════════════════════════════════════
// Platform fakes
// ═══════════════════════════════════════════════════════════════════════════

const SERVER: ServerId = ServerId(1);

/// In-memory platform: one server, a channel list, category layout, and
/// full per-channel message history.
#[derive(Default)]
struct FakePlatform {
    channels: Mutex<Vec<ChannelInfo>>,
    categories: Mutex<Vec<(CategoryId, Vec<ChannelId>)>>,
    history: Mutex<HashMap<ChannelId, Vec<Message>>>,
    denied: Mutex<HashSet<ChannelId>>,
    page_size: usize,
}

impl FakePlatform {
    fn new(page_size: usize) -> Arc<Self> {
        Arc::new(Self {
            page_size,
            ..Self::default()
        })
    }

    fn add_channel(&self, channel: ChannelInfo) {
        self.channels.lock().push(channel);
    }

    fn set_categories(&self, categories: Vec<(CategoryId, Vec<ChannelId>)>) {
        *self.categories.lock() = categories;
    }

    fn add_history(&self, channel: ChannelId, messages: Vec<Message>) {
        self.history.lock().insert(channel, messages);
    }

    fn deny_history(&self, channel: ChannelId) {
        self.denied.lock().insert(channel);
    }
}

#[async_trait]
impl chanvault_sync::ChannelDirectory for FakePlatform {
    async fn servers(&self) -> Result<Vec<ServerId>> {
        Ok(vec![SERVER])
    }

    async fn channels(&self, _server: ServerId) -> Result<Vec<ChannelInfo>> {
        Ok(self.channels.lock().clone())
    }

    async fn category_members(
        &self,
        _server: ServerId,
    ) -> Result<Vec<(CategoryId, Vec<ChannelId>)>> {
        Ok(self.categories.lock().clone())
    }

    async fn can_read_history(&self, channel: ChannelId) -> Result<bool> {
        Ok(!self.denied.lock().contains(&channel))
    }

    async fn find_channel(&self, channel: ChannelId) -> Result<Option<ChannelInfo>> {
        Ok(self
            .channels
            .lock()
            .iter()
            .find(|c| c.id == channel)
            .cloned())
    }
}

#[async_trait]
impl chanvault_sync::HistorySource for FakePlatform {
    async fn page_after(&self, channel: ChannelId, cursor: MessageId) -> Result<Vec<Message>> {
        let history = self.history.lock();
        let Some(messages) = history.get(&channel) else {
            return Ok(vec![]);
        };
        Ok(messages
            .iter()
            .filter(|m| m.id > cursor)
            .take(self.page_size)
            .cloned()
            .collect())
    }
}

/// Policy: a key matches the set of raw ids configured for it.
#[derive(Default)]
struct SetPolicy {
    matches: HashMap<String, HashSet<u64>>,
}

impl SetPolicy {
    fn with(entries: &[(&str, &[u64])]) -> Arc<Self> {
        let mut matches = HashMap::new();
        for (key, ids) in entries {
            matches.insert(key.to_string(), ids.iter().copied().collect());
        }
        Arc::new(Self { matches })
    }
}

impl WhitelistPolicy for SetPolicy {
    fn object_ok(&self, key: &str, id: u64) -> bool {
        self.matches.get(key).is_some_and(|ids| ids.contains(&id))
    }
}

/// Fetcher that serves `image/png` bytes for every URL.
struct PngFetcher;

#[async_trait]
impl Fetcher for PngFetcher {
    async fn fetch(&self, _url: &str) -> Result<Option<FetchedBody>> {
        Ok(Some(FetchedBody {
            content_type: Some("image/png".to_string()),
            bytes: b"\x89PNG".to_vec(),
        }))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Harness
// ═══════════════════════════════════════════════════════════════════════════

struct Harness {
    selector: Arc<ChannelSelector>,
    cursors: Arc<CursorStore>,
    queue: Arc<DownloadQueue>,
    orchestrator: SyncOrchestrator,
    downloader: Arc<Downloader>,
    backup_root: PathBuf,
    removed_root: PathBuf,
    _root: TempDir,
}

fn message(channel: ChannelId, id: u64, attachments: &[u64]) -> Message {
    Message {
        id: MessageId(id),
        channel_id: channel,
        attachments: attachments
            .iter()
            .map(|a| Attachment {
                id: AttachmentId(*a),
                url: format!("https://cdn.example/{id}/{a}"),
            })
            .collect(),
    }
}

fn harness(platform: Arc<FakePlatform>, keys: &[&str], policy: Arc<SetPolicy>) -> Harness {
    let root = TempDir::new().unwrap();
    let backup_root = root.path().join("backup");
    let removed_root = root.path().join("backup-removed");
    let backend: Arc<dyn StateBackend> =
        Arc::new(FileBackend::new(root.path().join("state")).unwrap());

    let whitelist = Arc::new(WhitelistStore::load(backend.clone()).unwrap());
    for key in keys {
        whitelist.insert(key).unwrap();
    }
    let selector = Arc::new(ChannelSelector::new(whitelist, policy, platform.clone()));
    let cursors = Arc::new(CursorStore::load(backend.clone()).unwrap());
    let metadata = Arc::new(MetadataStore::load(backend).unwrap());
    let queue = Arc::new(DownloadQueue::new());

    let orchestrator = SyncOrchestrator::new(
        platform.clone(),
        platform,
        selector.clone(),
        cursors.clone(),
        metadata,
        queue.clone(),
        OrchestratorConfig {
            page_delay: Duration::ZERO,
        },
    );
    let downloader = Arc::new(Downloader::new(
        queue.clone(),
        Arc::new(PngFetcher),
        &backup_root,
    ));

    Harness {
        selector,
        cursors,
        queue,
        orchestrator,
        downloader,
        backup_root,
        removed_root,
        _root: root,
    }
}

impl Harness {
    /// Spawn the download worker loop.
    fn spawn_worker(&self) -> tokio::task::JoinHandle<()> {
        let downloader = self.downloader.clone();
        tokio::spawn(async move { downloader.run().await })
    }

    /// Stop the worker and wait for it to finish the in-flight task, so
    /// file assertions see everything written.
    async fn finish_worker(&self, worker: tokio::task::JoinHandle<()>) {
        self.downloader.stop();
        worker.await.unwrap();
    }
}

fn count_files(dir: &Path) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Backfill
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test(flavor = "multi_thread")]
async fn backfill_advances_cursor_and_downloads_attachments() {
    let channel = ChannelId(22);
    let platform = FakePlatform::new(10);
    platform.add_channel(ChannelInfo::text(22u64, 1u64, "general", CategoryId::NONE));
    // Page: 10, 11 (no attachments), 12 (one attachment).
    platform.add_history(
        channel,
        vec![
            message(channel, 10, &[]),
            message(channel, 11, &[]),
            message(channel, 12, &[7]),
        ],
    );

    let h = harness(platform, &["key-a"], SetPolicy::with(&[("key-a", &[22])]));
    let worker = h.spawn_worker();

    let stats = h.orchestrator.backfill_all().await.unwrap();
    h.finish_worker(worker).await;

    assert_eq!(h.cursors.get(channel), MessageId(12));
    assert_eq!(stats.enqueued, 1);
    assert_eq!(stats.pages, 1);
    assert_eq!(stats.channels_backed_up, 1);
    assert_eq!(count_files(&h.backup_root.join("key-a/22")), 1);
    assert!(h.backup_root.join("key-a/22/12-7.png").is_file());
}

#[tokio::test(flavor = "multi_thread")]
async fn rerun_at_head_of_history_is_idempotent() {
    let channel = ChannelId(22);
    let platform = FakePlatform::new(10);
    platform.add_channel(ChannelInfo::text(22u64, 1u64, "general", CategoryId::NONE));
    platform.add_history(channel, vec![message(channel, 12, &[7])]);

    let h = harness(platform, &["key-a"], SetPolicy::with(&[("key-a", &[22])]));
    let worker = h.spawn_worker();

    h.orchestrator.backfill_all().await.unwrap();
    assert_eq!(h.cursors.get(channel), MessageId(12));

    // Second sweep with the cursor at the head: zero enqueues, cursor
    // unchanged.
    let stats = h.orchestrator.backfill_all().await.unwrap();
    h.finish_worker(worker).await;

    assert_eq!(stats.enqueued, 0);
    assert_eq!(stats.pages, 0);
    assert_eq!(h.cursors.get(channel), MessageId(12));
}

#[tokio::test(flavor = "multi_thread")]
async fn backfill_pages_through_long_history() {
    let channel = ChannelId(22);
    let platform = FakePlatform::new(2); // force multiple pages
    platform.add_channel(ChannelInfo::text(22u64, 1u64, "general", CategoryId::NONE));
    platform.add_history(
        channel,
        vec![
            message(channel, 10, &[1]),
            message(channel, 11, &[]),
            message(channel, 12, &[2]),
            message(channel, 13, &[3]),
            message(channel, 14, &[]),
        ],
    );

    let h = harness(platform, &["key-a"], SetPolicy::with(&[("key-a", &[22])]));
    let worker = h.spawn_worker();

    let stats = h.orchestrator.backfill_all().await.unwrap();
    h.finish_worker(worker).await;

    assert_eq!(stats.pages, 3);
    assert_eq!(stats.messages, 5);
    assert_eq!(stats.enqueued, 3);
    assert_eq!(h.cursors.get(channel), MessageId(14));
    assert_eq!(count_files(&h.backup_root.join("key-a/22")), 3);
}

#[tokio::test]
async fn unwhitelisted_and_denied_channels_are_skipped() {
    let platform = FakePlatform::new(10);
    platform.add_channel(ChannelInfo::text(22u64, 1u64, "kept", CategoryId::NONE));
    platform.add_channel(ChannelInfo::text(23u64, 1u64, "ignored", CategoryId::NONE));
    platform.add_channel(ChannelInfo::text(24u64, 1u64, "private", CategoryId::NONE));
    platform.add_channel(ChannelInfo {
        id: ChannelId(25),
        server_id: SERVER,
        name: "voice".into(),
        kind: ChannelKind::Voice,
        category_id: CategoryId::NONE,
    });
    platform.deny_history(ChannelId(24));

    let h = harness(
        platform,
        &["key-a"],
        SetPolicy::with(&[("key-a", &[22, 24])]),
    );
    let stats = h.orchestrator.backfill_all().await.unwrap();

    // 22 backed up (empty history), 23 not whitelisted, 24 denied, 25 not
    // text-capable (never considered at all).
    assert_eq!(stats.channels_backed_up, 1);
    assert_eq!(stats.channels_skipped, 2);
    assert_eq!(stats.enqueued, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn category_whitelisting_uses_channel_match_first() {
    let channel = ChannelId(30);
    let platform = FakePlatform::new(10);
    platform.add_channel(ChannelInfo::text(30u64, 1u64, "art", CategoryId(500)));
    platform.set_categories(vec![(CategoryId(500), vec![channel])]);
    platform.add_history(channel, vec![message(channel, 5, &[1])]);

    // Category key listed first; channel-level match must still win.
    let h = harness(
        platform,
        &["key-cat", "key-chan"],
        SetPolicy::with(&[("key-cat", &[500]), ("key-chan", &[30])]),
    );
    let worker = h.spawn_worker();

    h.orchestrator.backfill_all().await.unwrap();
    h.finish_worker(worker).await;

    assert!(h.backup_root.join("key-chan/30/5-1.png").is_file());
    assert!(!h.backup_root.join("key-cat").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn category_only_match_backs_up_under_category_key() {
    let channel = ChannelId(31);
    let platform = FakePlatform::new(10);
    platform.add_channel(ChannelInfo::text(31u64, 1u64, "memes", CategoryId(500)));
    platform.set_categories(vec![(CategoryId(500), vec![channel])]);
    platform.add_history(channel, vec![message(channel, 6, &[1])]);

    let h = harness(
        platform,
        &["key-cat"],
        SetPolicy::with(&[("key-cat", &[500])]),
    );
    let worker = h.spawn_worker();

    h.orchestrator.backfill_all().await.unwrap();
    h.finish_worker(worker).await;

    assert!(h.backup_root.join("key-cat/31/6-1.png").is_file());
}

// ═══════════════════════════════════════════════════════════════════════════
// Live path
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test(flavor = "multi_thread")]
async fn live_message_enqueues_and_advances_cursor() {
    let channel = ChannelId(22);
    let platform = FakePlatform::new(10);
    platform.add_channel(ChannelInfo::text(22u64, 1u64, "general", CategoryId::NONE));

    let h = harness(platform, &["key-a"], SetPolicy::with(&[("key-a", &[22])]));
    let worker = h.spawn_worker();

    h.orchestrator
        .handle_live_message(&message(channel, 40, &[9]))
        .await
        .unwrap();

    assert_eq!(h.cursors.get(channel), MessageId(40));
    h.queue.wait_empty().await;
    h.finish_worker(worker).await;

    assert!(h.backup_root.join("key-a/22/40-9.png").is_file());
}

#[tokio::test]
async fn live_message_for_ineligible_channel_is_ignored() {
    let channel = ChannelId(23);
    let platform = FakePlatform::new(10);
    platform.add_channel(ChannelInfo::text(23u64, 1u64, "offtopic", CategoryId::NONE));

    let h = harness(platform, &["key-a"], SetPolicy::with(&[("key-a", &[22])]));
    h.orchestrator
        .handle_live_message(&message(channel, 40, &[9]))
        .await
        .unwrap();

    assert_eq!(h.cursors.get(channel), MessageId::ZERO);
    assert!(h.queue.is_empty());
}

#[tokio::test]
async fn live_message_for_unknown_channel_is_ignored() {
    let platform = FakePlatform::new(10);
    let h = harness(platform, &["key-a"], SetPolicy::with(&[("key-a", &[22])]));

    h.orchestrator
        .handle_live_message(&message(ChannelId(99), 40, &[9]))
        .await
        .unwrap();
    assert!(h.queue.is_empty());
}

#[tokio::test]
async fn cursor_stays_monotone_across_live_and_backfill() {
    let channel = ChannelId(22);
    let platform = FakePlatform::new(10);
    platform.add_channel(ChannelInfo::text(22u64, 1u64, "general", CategoryId::NONE));

    let h = harness(platform, &["key-a"], SetPolicy::with(&[("key-a", &[22])]));

    // Live handler observes message 50 first.
    h.orchestrator
        .handle_live_message(&message(channel, 50, &[]))
        .await
        .unwrap();
    assert_eq!(h.cursors.get(channel), MessageId(50));

    // A stale backfill write behind the live watermark is refused.
    assert!(!h.cursors.advance(channel, MessageId(12)).unwrap());
    assert_eq!(h.cursors.get(channel), MessageId(50));
}

#[tokio::test(flavor = "multi_thread")]
async fn run_live_consumes_stream_until_closed() {
    let channel = ChannelId(22);
    let platform = FakePlatform::new(10);
    platform.add_channel(ChannelInfo::text(22u64, 1u64, "general", CategoryId::NONE));

    let h = harness(platform, &["key-a"], SetPolicy::with(&[("key-a", &[22])]));

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    tx.send(message(channel, 60, &[])).unwrap();
    tx.send(message(channel, 61, &[])).unwrap();
    drop(tx);

    h.orchestrator.run_live(rx).await;
    assert_eq!(h.cursors.get(channel), MessageId(61));
}

// ═══════════════════════════════════════════════════════════════════════════
// Reconciliation
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn reconciler_retires_out_of_scope_folders() {
    let platform = FakePlatform::new(10);
    platform.add_channel(ChannelInfo::text(22u64, 1u64, "kept", CategoryId::NONE));
    platform.add_channel(ChannelInfo::text(23u64, 1u64, "dropped", CategoryId::NONE));
    platform.add_channel(ChannelInfo {
        id: ChannelId(25),
        server_id: SERVER,
        name: "was-text".into(),
        kind: ChannelKind::Voice,
        category_id: CategoryId::NONE,
    });

    let h = harness(
        platform.clone(),
        &["key-a"],
        SetPolicy::with(&[("key-a", &[22])]),
    );

    // Seed on-disk folders named by channel id at the backup root, plus a
    // whitelist-key folder that must be left alone.
    for name in ["22", "23", "24", "25", "key-a"] {
        std::fs::create_dir_all(h.backup_root.join(name)).unwrap();
        std::fs::write(h.backup_root.join(name).join("1-1.png"), b"x").unwrap();
    }

    let reconciler = ArchiveReconciler::new(
        platform,
        h.selector.clone(),
        h.backup_root.clone(),
        h.removed_root.clone(),
    );
    let retired = reconciler.run().await.unwrap();

    // 22 still eligible; 23 exists but unwhitelisted; 24 gone from the
    // platform; 25 no longer text-capable; "key-a" skipped (not an id).
    assert_eq!(retired, 3);
    assert!(h.backup_root.join("22").is_dir());
    assert!(h.backup_root.join("key-a").is_dir());
    for name in ["23", "24", "25"] {
        assert!(!h.backup_root.join(name).exists());
        // Moved, not deleted: contents preserved under the quarantine root.
        assert!(h.removed_root.join(name).join("1-1.png").is_file());
    }
}

#[tokio::test]
async fn reconciler_keeps_category_whitelisted_folders() {
    let channel = ChannelId(30);
    let platform = FakePlatform::new(10);
    platform.add_channel(ChannelInfo::text(30u64, 1u64, "art", CategoryId(500)));
    platform.set_categories(vec![(CategoryId(500), vec![channel])]);

    let h = harness(
        platform.clone(),
        &["key-cat"],
        SetPolicy::with(&[("key-cat", &[500])]),
    );
    std::fs::create_dir_all(h.backup_root.join("30")).unwrap();

    let reconciler = ArchiveReconciler::new(
        platform,
        h.selector.clone(),
        h.backup_root.clone(),
        h.removed_root.clone(),
    );
    assert_eq!(reconciler.run().await.unwrap(), 0);
    assert!(h.backup_root.join("30").is_dir());
}
