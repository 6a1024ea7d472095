use super::area::{StorageArea, StorageEvent, StorageListener};
use crate::config::StoreConfig;
use crate::sync::{Callback, Completion, ExternalStore, KeyedState, Snapshot, Subscription};
use std::sync::Arc;
use tracing::{debug, warn};

/// Keyed external store over a [`StorageArea`].
///
/// The area is synchronous, so every operation has settled by the time it
/// returns and its [`Completion`] is already ready. A failed write or delete
/// leaves the cached snapshot untouched and sends no notification.
pub struct StorageSyncStore {
    state: Arc<KeyedState>,
    area: Option<Arc<dyn StorageArea>>,
    synced: bool,
}

impl StorageSyncStore {
    pub fn new(area: Option<Arc<dyn StorageArea>>, config: StoreConfig) -> Self {
        let state = Arc::new(KeyedState::new(config));
        let synced = area.as_ref().is_some_and(|area| Self::attach(&state, area.as_ref()));
        Self { state, area, synced }
    }

    /// A store over persistent local storage.
    pub fn local(area: Option<Arc<dyn StorageArea>>) -> Self {
        Self::new(area, StoreConfig::local())
    }

    /// A store over per-session storage.
    pub fn session(area: Option<Arc<dyn StorageArea>>) -> Self {
        Self::new(area, StoreConfig::session())
    }

    fn attach(state: &Arc<KeyedState>, area: &dyn StorageArea) -> bool {
        let weak = Arc::downgrade(state);
        let listener: StorageListener = Arc::new(move |event: &StorageEvent| {
            if let Some(state) = weak.upgrade() {
                apply_event(&state, event);
            }
        });

        match area.on_external_change(listener) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    store = %state.label(),
                    error = %err,
                    "storage events unavailable; changes from other contexts will not be observed"
                );
                false
            }
        }
    }

    pub fn config(&self) -> &StoreConfig {
        self.state.config()
    }

    pub fn is_available(&self) -> bool {
        self.area.is_some()
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn subscribe<F>(&self, key: &str, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.state.subscribe(key, Arc::new(callback))
    }

    pub fn snapshot(&self, key: &str) -> Snapshot {
        self.state.snapshot(key)
    }

    pub fn server_snapshot(&self, _key: &str) -> Snapshot {
        None
    }

    pub fn init(&self, key: &str) -> Completion {
        let Some(area) = &self.area else {
            return Completion::done();
        };
        if !self.state.begin_load(key) {
            return Completion::done();
        }

        match area.get_item(key) {
            Ok(value) => {
                debug!(store = %self.state.label(), key = %key, found = value.is_some(), "loaded storage key");
                self.state.finish_load(key, value);
                Completion::done()
            }
            Err(err) => {
                warn!(store = %self.state.label(), key = %key, error = %err, "storage read failed");
                Completion::ready(Err(err))
            }
        }
    }

    pub fn write(&self, key: &str, value: impl Into<String>) -> Completion {
        let Some(area) = &self.area else {
            return Completion::done();
        };
        let value = value.into();

        if let Err(err) = area.set_item(key, &value) {
            warn!(store = %self.state.label(), key = %key, error = %err, "storage write failed");
            return Completion::ready(Err(err));
        }
        debug!(store = %self.state.label(), key = %key, "wrote storage key");
        self.state.store_local(key, value);
        Completion::done()
    }

    pub fn delete(&self, key: &str) -> Completion {
        let Some(area) = &self.area else {
            return Completion::done();
        };

        if let Err(err) = area.remove_item(key) {
            warn!(store = %self.state.label(), key = %key, error = %err, "storage delete failed");
            return Completion::ready(Err(err));
        }
        debug!(store = %self.state.label(), key = %key, "deleted storage key");
        self.state.remove_local(key);
        Completion::done()
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        self.state.registry().subscriber_count(key)
    }

    /// Keys currently held in the cache, loaded or known-absent.
    pub fn cached_keys(&self) -> Vec<String> {
        self.state.cache().keys()
    }
}

fn apply_event(state: &KeyedState, event: &StorageEvent) {
    match &event.key {
        Some(key) => {
            if state.apply_external(key, event.new_value.clone()) {
                debug!(store = %state.label(), key = %key, "storage key changed externally");
            }
        }
        None => {
            let cleared = state.apply_external_clear();
            debug!(store = %state.label(), cleared, "storage cleared externally");
        }
    }
}

impl ExternalStore for StorageSyncStore {
    type Write = String;
    type Delete = ();

    fn init(&self, key: &str) -> Completion {
        StorageSyncStore::init(self, key)
    }

    fn snapshot(&self, key: &str) -> Snapshot {
        StorageSyncStore::snapshot(self, key)
    }

    fn subscribe(&self, key: &str, callback: Callback) -> Subscription {
        self.state.subscribe(key, callback)
    }

    fn write(&self, key: &str, value: String) -> Completion {
        StorageSyncStore::write(self, key, value)
    }

    fn delete(&self, key: &str, _args: ()) -> Completion {
        StorageSyncStore::delete(self, key)
    }
}
