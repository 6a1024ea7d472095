//! Cookie backed keyed store.
//!
//! - [`CookieSyncStore`] - the keyed store itself
//! - [`CookieMechanism`] - asynchronous cookie access it is built on
//! - [`DocumentCookieStore`] - a mechanism over a raw cookie string
//! - [`codec`] - cookie string parsing and serialization

pub mod codec;
mod mechanism;
mod polyfill;
mod store;
mod types;

pub use mechanism::CookieMechanism;
pub use polyfill::{CookieDocument, DocumentCookieStore, MemoryDocument};
pub use store::{CookieEnvironment, CookieSyncStore};
pub use types::{
    Cookie, CookieAttributes, CookieChangeEvent, CookieChangeListener, CookieDeleteAttributes,
    CookieDeleteOptions, CookieInit, SameSite,
};
