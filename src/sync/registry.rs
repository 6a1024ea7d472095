use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tracing::error;

/// Zero-argument notification callback.
pub type Callback = Arc<dyn Fn() + Send + Sync>;

struct Subscriber {
    id: u64,
    callback: Callback,
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    subscribers: HashMap<String, Vec<Subscriber>>,
}

impl RegistryInner {
    fn remove(&mut self, key: &str, id: u64) {
        if let Some(list) = self.subscribers.get_mut(key) {
            list.retain(|s| s.id != id);
            if list.is_empty() {
                self.subscribers.remove(key);
            }
        }
    }
}

/// Per-key notification callbacks.
///
/// Callbacks for one key fire in subscription order. A key whose last
/// subscriber leaves is removed from the registry entirely.
#[derive(Default)]
pub struct SubscriberRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `key`.
    ///
    /// The callback stays registered until the returned [`Subscription`] is
    /// dropped or [`Subscription::unsubscribe`] is called.
    pub fn subscribe(&self, key: &str, callback: Callback) -> Subscription {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner
            .subscribers
            .entry(key.to_string())
            .or_default()
            .push(Subscriber { id, callback });

        Subscription {
            registry: Arc::downgrade(&self.inner),
            key: key.to_string(),
            id,
            active: true,
        }
    }

    /// Invoke every callback registered for `key`.
    ///
    /// The delivery list is captured before the first callback runs, so
    /// callbacks may subscribe or unsubscribe freely. A panicking callback is
    /// logged and skipped. Returns how many callbacks completed normally.
    pub fn notify(&self, key: &str) -> usize {
        let callbacks: Vec<Callback> = {
            let inner = self.inner.lock();
            match inner.subscribers.get(key) {
                Some(list) => list.iter().map(|s| Arc::clone(&s.callback)).collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for callback in callbacks {
            match run_isolated(|| callback()) {
                Ok(()) => delivered += 1,
                Err(reason) => {
                    error!(key = %key, reason = %reason, "subscriber panicked during notification");
                }
            }
        }
        delivered
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        self.inner.lock().subscribers.get(key).map_or(0, Vec::len)
    }

    /// Whether the registry holds an entry for `key` at all.
    pub fn is_tracked(&self, key: &str) -> bool {
        self.inner.lock().subscribers.contains_key(key)
    }

    pub fn tracked_keys(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

/// Run `f`, converting a panic into its message.
pub(crate) fn run_isolated(f: impl FnOnce()) -> std::result::Result<(), String> {
    catch_isolated(f)
}

pub(crate) fn catch_isolated<R>(f: impl FnOnce() -> R) -> std::result::Result<R, String> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|panic| panic_message(panic.as_ref()).to_string())
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// RAII handle for a registered callback.
#[must_use = "dropping a Subscription unsubscribes it immediately"]
pub struct Subscription {
    registry: Weak<Mutex<RegistryInner>>,
    key: String,
    id: u64,
    active: bool,
}

impl Subscription {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Remove the callback now rather than at drop.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().remove(&self.key, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}
