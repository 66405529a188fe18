//! Incremental channel-backup synchronization engine.
//!
//! This crate mirrors the message history and file attachments of selected
//! channels onto local durable storage, and keeps mirroring new activity as
//! it arrives, without re-downloading content already captured.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐      ┌──────────────────┐
//! │  Full Sweep      │      │   Live Events    │
//! │  (paged history) │      │  (new messages)  │
//! └────────┬─────────┘      └────────┬─────────┘
//!          │   SyncOrchestrator      │
//!          └──────────┬──────────────┘
//!                     │ eligibility (ChannelSelector)
//!                     │ watermarks  (CursorStore)
//!                     ▼
//!          ┌──────────────────────────┐
//!          │      DownloadQueue       │
//!          └────────────┬─────────────┘
//!                       ▼
//!          ┌──────────────────────────┐
//!          │       Downloader         │  fetch, sniff type, dedupe,
//!          │   (single worker loop)   │  write {msg}-{att}.{ext}
//!          └──────────────────────────┘
//! ```
//!
//! The [`ArchiveReconciler`] runs once at startup and quarantines on-disk
//! folders for channels that are no longer in scope.
//!
//! The chat-platform client, the admin-command surface, and the whitelist
//! matching predicate are injected collaborators; see [`source`], [`fetch`]
//! and [`select::WhitelistPolicy`]. This crate never opens its own platform
//! session.

pub mod download;
pub mod fetch;
pub mod orchestrator;
pub mod queue;
pub mod reconcile;
pub mod select;
pub mod source;
pub mod store;

// Shared error type lives in the core crate.
pub use chanvault_core::{Error, Result};

pub use download::{Downloader, FILE_EXTENSIONS, extension_for};
pub use fetch::{FetchedBody, Fetcher, HttpFetcher};
pub use orchestrator::{OrchestratorConfig, SweepStats, SyncOrchestrator};
pub use queue::{DownloadQueue, DownloadTask};
pub use reconcile::ArchiveReconciler;
pub use select::{ChannelSelector, WhitelistPolicy};
pub use source::{ChannelDirectory, HistorySource};
pub use store::{
    ChannelMeta, CursorStore, FileBackend, MetadataStore, StateBackend, WhitelistStore,
};
