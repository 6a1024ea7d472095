//! Web Storage backed keyed stores.
//!
//! [`StorageSyncStore`] serves both persistent local storage and per-session
//! storage; the two differ only in the [`StorageArea`] they are built over.

mod area;
mod memory;
mod store;

pub use area::{StorageArea, StorageEvent, StorageListener};
pub use memory::MemoryStorage;
pub use store::StorageSyncStore;
