use crate::sync::run_isolated;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::error;

type Subscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Subscribers<T> {
    next_id: u64,
    entries: Vec<(u64, Subscriber<T>)>,
}

/// A thread-safe container for a single piece of state.
///
/// Clones share the same state and subscribers, so handing a clone to a
/// child component gives it the same view as its parent.
pub struct Store<T> {
    state: Arc<RwLock<T>>,
    subscribers: Arc<Mutex<Subscribers<T>>>,
}

/// Identifies a subscription made with [`Store::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl<T: Clone> Store<T> {
    pub fn new(initial: T) -> Self {
        Self {
            state: Arc::new(RwLock::new(initial)),
            subscribers: Arc::new(Mutex::new(Subscribers {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Get a clone of the current state.
    pub fn get(&self) -> T {
        self.state.read().clone()
    }

    /// Update the state in place, then notify.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        let current = {
            let mut state = self.state.write();
            f(&mut state);
            state.clone()
        };
        self.notify(&current);
    }

    pub fn set(&self, new_state: T) {
        *self.state.write() = new_state.clone();
        self.notify(&new_state);
    }

    /// Call `callback` with the new state after every update.
    pub fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut subscribers = self.subscribers.lock();
        let id = subscribers.next_id;
        subscribers.next_id += 1;
        subscribers.entries.push((id, Arc::new(callback)));
        SubscriberId(id)
    }

    /// Returns `false` if `id` was already removed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.entries.len();
        subscribers.entries.retain(|(entry, _)| *entry != id.0);
        subscribers.entries.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().entries.len()
    }

    // Runs with no lock held so subscribers may read or update the store.
    fn notify(&self, state: &T) {
        let subscribers: Vec<Subscriber<T>> = self
            .subscribers
            .lock()
            .entries
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for subscriber in subscribers {
            if let Err(reason) = run_isolated(|| subscriber(state)) {
                error!(reason = %reason, "store subscriber panicked");
            }
        }
    }

    /// Read state without cloning it.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.state.read())
    }
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<T: Clone + Default> Default for Store<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
