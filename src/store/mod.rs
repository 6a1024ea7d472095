//! Single-value state containers.
//!
//! [`Store`] holds one value behind a lock and calls its subscribers with
//! the new value after every change. It backs the step counter and any other
//! state that is not tied to an external keyed store.

mod store;

pub use store::{Store, SubscriberId};
