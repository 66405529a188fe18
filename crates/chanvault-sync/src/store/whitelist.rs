//! Ordered whitelist keys.

use std::sync::Arc;

use parking_lot::Mutex;

use chanvault_core::Result;

use super::{StateBackend, WHITELIST_STATE};

/// Persists the ordered list of opaque whitelist keys.
///
/// The keys are owned by the external admin surface; this store only
/// inserts and removes by key. Order is significant — the selector tests
/// keys in list order and the first match wins — so the list is kept in
/// insertion order and persisted that way.
///
/// Wire format: one key per line.
pub struct WhitelistStore {
    backend: Arc<dyn StateBackend>,
    keys: Mutex<Vec<String>>,
}

impl WhitelistStore {
    /// Load the whitelist from the backend.
    pub fn load(backend: Arc<dyn StateBackend>) -> Result<Self> {
        let mut keys = Vec::new();

        if let Some(contents) = backend.load(WHITELIST_STATE)? {
            for line in contents.lines() {
                let line = line.trim();
                if !line.is_empty() {
                    keys.push(line.to_string());
                }
            }
            tracing::debug!("Loaded {} whitelist keys", keys.len());
        }

        Ok(Self {
            backend,
            keys: Mutex::new(keys),
        })
    }

    /// Snapshot of the keys in match order.
    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().clone()
    }

    /// Append a key and persist. Returns `false` if the key was already
    /// present (the list is left untouched).
    pub fn insert(&self, key: &str) -> Result<bool> {
        let mut keys = self.keys.lock();
        if keys.iter().any(|k| k == key) {
            return Ok(false);
        }
        keys.push(key.to_string());
        self.backend.save(WHITELIST_STATE, &serialize(&keys))?;
        Ok(true)
    }

    /// Remove a key and persist. Returns `false` if the key was not
    /// present.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let mut keys = self.keys.lock();
        let Some(pos) = keys.iter().position(|k| k == key) else {
            return Ok(false);
        };
        keys.remove(pos);
        self.backend.save(WHITELIST_STATE, &serialize(&keys))?;
        Ok(true)
    }

    /// Whether no keys are configured.
    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }
}

fn serialize(keys: &[String]) -> String {
    let mut out = String::new();
    for key in keys {
        out.push_str(key);
        out.push('\n');
    }
    out
}
