//! Key-scoped synchronization primitives.
//!
//! The building blocks shared by the cookie and storage stores:
//! - [`KeyedCache`] - last-known value per key
//! - [`SubscriberRegistry`] - per-key notification callbacks
//! - [`Completion`] - opt-in signal for background persistence
//! - [`TaskQueue`] - cooperative driver for spawned persistence work
//! - [`ExternalStore`] - the contract a per-component binding consumes

mod cache;
mod completion;
mod registry;
mod state;
mod task_queue;

pub use cache::{KeyedCache, Snapshot};
pub use completion::Completion;
pub use registry::{Callback, SubscriberRegistry, Subscription};
pub use task_queue::TaskQueue;
pub(crate) use registry::{catch_isolated, run_isolated};
pub(crate) use state::KeyedState;

/// A synchronous external store addressed by key.
///
/// `snapshot` must be a pure read of current state: two calls without an
/// intervening notification return the same value. `write` and `delete`
/// update the snapshot and notify before returning, and report persistence
/// through the returned [`Completion`].
pub trait ExternalStore: Send + Sync {
    /// Arguments accepted by [`ExternalStore::write`].
    type Write;
    /// Arguments accepted by [`ExternalStore::delete`].
    type Delete: Default;

    /// Seed the cache for `key` from the backing mechanism, once.
    fn init(&self, key: &str) -> Completion;

    fn snapshot(&self, key: &str) -> Snapshot;

    /// Snapshot used when rendering without a host environment. Always absent.
    fn server_snapshot(&self, _key: &str) -> Snapshot {
        None
    }

    fn subscribe(&self, key: &str, callback: Callback) -> Subscription;

    fn write(&self, key: &str, args: Self::Write) -> Completion;

    fn delete(&self, key: &str, args: Self::Delete) -> Completion;
}
