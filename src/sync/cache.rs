use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// The synchronously readable value of a key.
///
/// `None` means the key is known to be absent. The `Arc` is shared between
/// reads, so two snapshots taken without an intervening change point to the
/// same allocation.
pub type Snapshot = Option<Arc<str>>;

/// Last-known value per key.
///
/// A key missing from the cache has never been loaded, which is distinct from
/// a key cached as `None` (loaded, known absent).
#[derive(Default)]
pub struct KeyedCache {
    entries: RwLock<HashMap<String, Snapshot>>,
}

impl KeyedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached snapshot, or `None` if the key was never loaded.
    pub fn get(&self, key: &str) -> Option<Snapshot> {
        self.entries.read().get(key).cloned()
    }

    /// Overwrite the entry for `key`.
    pub fn set(&self, key: &str, value: Snapshot) {
        self.entries.write().insert(key.to_string(), value);
    }

    /// Remove the entry for `key`, returning it to the unloaded state.
    pub fn delete(&self, key: &str) -> Option<Snapshot> {
        self.entries.write().remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
