use super::area::{StorageArea, StorageEvent, StorageListener};
use crate::error::{Result, StoreError};
use crate::sync::run_isolated;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::error;

/// In-memory [`StorageArea`].
///
/// Local calls (`set_item`, `remove_item`, `clear`) change the data silently.
/// The `*_remote` methods change it as another tab would, and report the
/// change to the external-change listeners.
#[derive(Default)]
pub struct MemoryStorage {
    items: Mutex<BTreeMap<String, String>>,
    listeners: Mutex<Vec<StorageListener>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the total size of keys plus values, in bytes.
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Set or remove `key` on behalf of another context.
    pub fn apply_remote(&self, key: &str, value: Option<&str>) {
        let old_value = {
            let mut items = self.items.lock();
            match value {
                Some(value) => items.insert(key.to_string(), value.to_string()),
                None => items.remove(key),
            }
        };
        let event = match value {
            Some(value) => StorageEvent::set(key, old_value, value),
            None => StorageEvent::removed(key, old_value),
        };
        self.dispatch(&event);
    }

    /// Clear the area on behalf of another context.
    pub fn clear_remote(&self) {
        self.items.lock().clear();
        self.dispatch(&StorageEvent::cleared());
    }

    fn dispatch(&self, event: &StorageEvent) {
        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            if let Err(reason) = run_isolated(|| listener(event)) {
                error!(reason = %reason, "storage listener panicked");
            }
        }
    }

    fn used_bytes_without(items: &BTreeMap<String, String>, key: &str) -> usize {
        items
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl StorageArea for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.lock();
        if let Some(quota) = self.quota {
            let needed = Self::used_bytes_without(&items, key) + key.len() + value.len();
            if needed > quota {
                return Err(StoreError::QuotaExceeded { key: key.to_string() });
            }
        }
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.items.lock().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.items.lock().clear();
        Ok(())
    }

    fn on_external_change(&self, listener: StorageListener) -> Result<()> {
        self.listeners.lock().push(listener);
        Ok(())
    }
}
