//! Per-component bindings over keyed stores.
//!
//! A [`KeyBinding`] fixes one key of an [`ExternalStore`] and exposes the
//! calls a component makes against it: seed on mount, subscribe for
//! re-render, read the snapshot on every render, and write or delete.

use crate::error::Result;
use crate::sync::{Completion, ExternalStore, Snapshot, Subscription};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// One key of a shared store.
///
/// Bindings are cheap to clone; every clone talks to the same store.
///
/// # Examples
///
/// ```
/// use keysync::storage::{MemoryStorage, StorageArea, StorageSyncStore};
/// use keysync::KeyBinding;
/// use std::sync::Arc;
///
/// let area: Arc<dyn StorageArea> = Arc::new(MemoryStorage::new());
/// let store = Arc::new(StorageSyncStore::local(Some(area)));
/// let theme = KeyBinding::new(store, "theme");
///
/// let _ = theme.init();
/// let _ = theme.set("dark".to_string());
/// assert_eq!(theme.snapshot().as_deref(), Some("dark"));
/// assert_eq!(theme.server_snapshot(), None);
/// ```
pub struct KeyBinding<S> {
    store: Arc<S>,
    key: String,
}

impl<S: ExternalStore> KeyBinding<S> {
    pub fn new(store: Arc<S>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Seed the store for this key. Safe to call on every mount.
    pub fn init(&self) -> Completion {
        self.store.init(&self.key)
    }

    pub fn subscribe<F>(&self, on_change: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.store.subscribe(&self.key, Arc::new(on_change))
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot(&self.key)
    }

    pub fn server_snapshot(&self) -> Snapshot {
        self.store.server_snapshot(&self.key)
    }

    /// Map the current snapshot through `transform`.
    pub fn value_with<T>(&self, transform: impl FnOnce(Option<&str>) -> T) -> T {
        let snapshot = self.snapshot();
        transform(snapshot.as_deref())
    }

    /// Decode the current value as JSON. An absent value decodes to `None`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match self.snapshot() {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn set(&self, args: S::Write) -> Completion {
        self.store.write(&self.key, args)
    }

    /// Delete with the store's default delete arguments.
    pub fn delete(&self) -> Completion {
        self.store.delete(&self.key, S::Delete::default())
    }

    pub fn delete_with(&self, args: S::Delete) -> Completion {
        self.store.delete(&self.key, args)
    }
}

impl<S> Clone for KeyBinding<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key: self.key.clone(),
        }
    }
}
