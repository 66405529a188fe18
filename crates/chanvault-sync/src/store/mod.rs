//! Durable state stores for the sync engine.
//!
//! Three small stores persist the engine's state between runs:
//!
//! - [`CursorStore`] — per-channel "last processed message" watermark
//! - [`MetadataStore`] — per-channel display name and parent category
//! - [`WhitelistStore`] — ordered opaque whitelist keys
//!
//! All three share the same persistence model: the in-memory map is the
//! authority, and every mutation rewrites the **entire** serialized state
//! through a [`StateBackend`]. Losing the most recent write on a crash is
//! acceptable; losing a historical one is not, and the full-rewrite model
//! guarantees that since each save is a strict superset of the previous
//! state. Unparsable lines are logged and skipped on load, never fatal.
//!
//! The backend is a trait so a future implementation can switch to an
//! append-only or transactional store without touching the sync logic.

mod backend;
#[cfg(test)]
pub(crate) use backend::testing;
mod cursor;
mod metadata;
mod whitelist;

pub use backend::{FileBackend, StateBackend};
pub use cursor::CursorStore;
pub use metadata::{ChannelMeta, MetadataStore};
pub use whitelist::WhitelistStore;

/// Backend key for the cursor file.
pub const CURSOR_STATE: &str = "backup-channel-read";
/// Backend key for the channel metadata file.
pub const METADATA_STATE: &str = "backup-channel-names";
/// Backend key for the whitelist file.
pub const WHITELIST_STATE: &str = "backup-whitelist";
