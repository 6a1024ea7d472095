use super::cache::{KeyedCache, Snapshot};
use super::registry::{Callback, SubscriberRegistry, Subscription};
use crate::config::{EmptyValuePolicy, StoreConfig};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Cache, subscribers and load bookkeeping shared by every keyed store.
///
/// Every mutation that changes what [`KeyedState::snapshot`] returns is
/// followed by a notification for that key only. No lock is held while
/// subscribers run.
pub(crate) struct KeyedState {
    cache: KeyedCache,
    registry: SubscriberRegistry,
    loaded: Mutex<HashSet<String>>,
    pending: Mutex<HashMap<String, PendingKey>>,
    config: StoreConfig,
}

/// Local mutations of one key whose persistence has not settled yet.
#[derive(Default)]
struct PendingKey {
    in_flight: usize,
    deferred: Option<Deferred>,
}

/// Last external observation held back while a key had local mutations in
/// flight.
enum Deferred {
    Value(Option<String>),
    Removed,
}

/// Marks a local mutation of `key` as in flight until dropped.
///
/// While any mutation of a key is in flight, external observations for it are
/// held back, since they may be echoes of an older local write. When the last
/// one settles, the most recent held-back observation is applied.
pub(crate) struct PendingMutation {
    state: Arc<KeyedState>,
    key: String,
}

impl Drop for PendingMutation {
    fn drop(&mut self) {
        self.state.settle_mutation(&self.key);
    }
}

impl KeyedState {
    pub(crate) fn new(config: StoreConfig) -> Self {
        Self {
            cache: KeyedCache::new(),
            registry: SubscriberRegistry::new(),
            loaded: Mutex::new(HashSet::new()),
            pending: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub(crate) fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn label(&self) -> &str {
        &self.config.label
    }

    pub(crate) fn cache(&self) -> &KeyedCache {
        &self.cache
    }

    pub(crate) fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    pub(crate) fn snapshot(&self, key: &str) -> Snapshot {
        self.cache.get(key).flatten()
    }

    pub(crate) fn subscribe(&self, key: &str, callback: Callback) -> Subscription {
        self.registry.subscribe(key, callback)
    }

    pub(crate) fn is_loaded(&self, key: &str) -> bool {
        self.loaded.lock().contains(key)
    }

    /// Claim the initial load for `key`.
    ///
    /// Returns `false` when a load already started or the key is already
    /// cached. The claim is recorded before any I/O begins, so two callers
    /// racing on the same key produce one read.
    pub(crate) fn begin_load(&self, key: &str) -> bool {
        let mut loaded = self.loaded.lock();
        if loaded.contains(key) || self.cache.contains(key) {
            return false;
        }
        loaded.insert(key.to_string());
        true
    }

    /// Apply the result of an initial load.
    ///
    /// A value that arrived through a write or a change event while the load
    /// was in flight is newer, and is kept.
    pub(crate) fn finish_load(&self, key: &str, value: Option<String>) {
        let Some(value) = value else {
            debug!(store = %self.label(), key = %key, "initial load found no value");
            return;
        };
        if self.cache.contains(key) {
            debug!(store = %self.label(), key = %key, "initial load superseded");
            return;
        }
        self.cache.set(key, self.normalize(value));
        self.registry.notify(key);
    }

    /// Record a value written through this store and notify.
    pub(crate) fn store_local(&self, key: &str, value: String) {
        self.cache.set(key, self.normalize(value));
        self.registry.notify(key);
    }

    /// Forget a key deleted through this store and notify.
    pub(crate) fn remove_local(&self, key: &str) {
        self.cache.delete(key);
        self.registry.notify(key);
    }

    pub(crate) fn begin_mutation(self: &Arc<Self>, key: &str) -> PendingMutation {
        self.pending.lock().entry(key.to_string()).or_default().in_flight += 1;
        PendingMutation {
            state: Arc::clone(self),
            key: key.to_string(),
        }
    }

    fn settle_mutation(&self, key: &str) {
        let deferred = {
            let mut pending = self.pending.lock();
            let Some(entry) = pending.get_mut(key) else {
                return;
            };
            entry.in_flight = entry.in_flight.saturating_sub(1);
            if entry.in_flight > 0 {
                return;
            }
            pending.remove(key).and_then(|entry| entry.deferred)
        };

        match deferred {
            Some(Deferred::Value(value)) => {
                self.apply_external(key, value);
            }
            Some(Deferred::Removed) => {
                self.apply_external_removal(key);
            }
            None => {}
        }
    }

    /// Hold `observation` back if `key` has local mutations in flight.
    fn defer(&self, key: &str, observation: impl FnOnce() -> Deferred) -> bool {
        match self.pending.lock().get_mut(key) {
            Some(entry) => {
                entry.deferred = Some(observation());
                debug!(store = %self.label(), key = %key, "external change deferred behind local write");
                true
            }
            None => false,
        }
    }

    /// Apply a value observed from outside this store.
    ///
    /// Notifies only when the snapshot actually changes, so the echo of a
    /// local write is silent.
    pub(crate) fn apply_external(&self, key: &str, value: Option<String>) -> bool {
        if self.defer(key, || Deferred::Value(value.clone())) {
            return false;
        }
        let next = value.and_then(|v| self.normalize(v));
        let changed = match self.cache.get(key) {
            Some(current) => current.as_deref() != next.as_deref(),
            None => true,
        };
        if !changed {
            return false;
        }
        self.cache.set(key, next);
        self.registry.notify(key);
        true
    }

    /// Apply a deletion observed from outside this store.
    pub(crate) fn apply_external_removal(&self, key: &str) -> bool {
        if self.defer(key, || Deferred::Removed) {
            return false;
        }
        if self.cache.delete(key).is_none() {
            return false;
        }
        self.registry.notify(key);
        true
    }

    /// Mark every cached value as known-absent, notifying keys that held one.
    pub(crate) fn apply_external_clear(&self) -> usize {
        let mut cleared = 0;
        for key in self.cache.keys() {
            if self.cache.get(&key).flatten().is_some() {
                self.cache.set(&key, None);
                self.registry.notify(&key);
                cleared += 1;
            }
        }
        cleared
    }

    fn normalize(&self, value: String) -> Snapshot {
        match self.config.empty_values {
            EmptyValuePolicy::TreatAsAbsent if value.is_empty() => None,
            _ => Some(Arc::from(value)),
        }
    }
}
