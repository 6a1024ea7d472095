use crate::error::{Result, StoreError};
use std::sync::Arc;

/// A change made to a storage area by another context.
///
/// `key` is `None` when the other context cleared the whole area.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl StorageEvent {
    pub fn set(key: impl Into<String>, old_value: Option<String>, new_value: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            old_value,
            new_value: Some(new_value.into()),
        }
    }

    pub fn removed(key: impl Into<String>, old_value: Option<String>) -> Self {
        Self {
            key: Some(key.into()),
            old_value,
            new_value: None,
        }
    }

    pub fn cleared() -> Self {
        Self::default()
    }
}

pub type StorageListener = Arc<dyn Fn(&StorageEvent) + Send + Sync>;

/// Synchronous key/value storage with the Web Storage surface.
pub trait StorageArea: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    fn remove_item(&self, key: &str) -> Result<()>;

    fn clear(&self) -> Result<()>;

    /// Register for changes made by other contexts sharing this area.
    ///
    /// Changes made through this handle are never reported back to it.
    fn on_external_change(&self, _listener: StorageListener) -> Result<()> {
        Err(StoreError::Unsupported("external storage events"))
    }
}
