//! # Keysync
//!
//! Key-scoped synchronization between UI components and external stores.
//!
//! Keysync keeps a shared cache per store so that every component reading
//! the same key sees the same value, and only the components watching a key
//! re-render when it changes.
//!
//! ## Keyed stores
//!
//! - `CookieSyncStore` - cookies, read and written through an async mechanism
//! - `StorageSyncStore` - Web Storage style areas (local and session)
//! - `KeyBinding` - one key of either store, as a component consumes it
//!
//! Writes update the cache and notify before they return; persistence runs
//! in the background and reports through an optional `Completion`.
//!
//! ## Component state
//!
//! - `Store<T>` - thread-safe single-value state container
//! - `StepCounter` - bounded step state for multi-step flows
//! - `VisibilityObserver` - fires a callback when a target scrolls into view

pub mod binding;
pub mod config;
pub mod cookie;
pub mod error;
pub mod step;
pub mod storage;
pub mod store;
pub mod sync;
pub mod visibility;

// Re-export main types for convenience
pub use binding::KeyBinding;
pub use config::{EmptyValuePolicy, StoreConfig};
pub use cookie::{CookieAttributes, CookieDeleteAttributes, CookieEnvironment, CookieSyncStore};
pub use error::{Result, StoreError};
pub use step::{StepCounter, StepOptions};
pub use storage::{MemoryStorage, StorageArea, StorageSyncStore};
pub use store::Store;
pub use sync::{Completion, ExternalStore, Snapshot, Subscription, TaskQueue};
pub use visibility::{IntersectionEntry, ObserverOptions, VisibilityObserver};
