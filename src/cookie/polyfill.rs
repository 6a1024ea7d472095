//! A [`CookieMechanism`] over a plain `document.cookie`-style accessor.
//!
//! Hosts without a native cookie store only offer a string that reads as
//! `name=value; ...` and accepts one serialized cookie per write. This module
//! layers the asynchronous API and change events on top of that by diffing
//! the cookie string after every write. Writes made by other code are only
//! seen on the next write or [`DocumentCookieStore::poll_changes`].

use super::codec::{parse_cookie_string, parse_cookie_write, serialize_cookie, serialize_deletion};
use super::mechanism::CookieMechanism;
use super::types::{Cookie, CookieChangeEvent, CookieChangeListener, CookieDeleteOptions, CookieInit};
use crate::error::{Result, StoreError};
use crate::sync::run_isolated;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error};

/// Raw read/write access to a cookie string.
pub trait CookieDocument: Send + Sync {
    /// All visible cookies as `name=value` pairs joined by `"; "`.
    fn read(&self) -> String;

    /// Apply one serialized cookie write.
    fn write(&self, cookie: &str) -> Result<()>;
}

struct StoredCookie {
    name: String,
    value: String,
    expires: Option<SystemTime>,
}

/// In-process [`CookieDocument`] with browser-like write semantics.
///
/// A write whose `expires` lies in the past removes the cookie, and expired
/// cookies disappear from reads. Cookies are keyed by encoded name only.
#[derive(Default)]
pub struct MemoryDocument {
    cookies: Mutex<Vec<StoredCookie>>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored cookies, including expired ones not yet pruned.
    pub fn stored(&self) -> usize {
        self.cookies.lock().len()
    }
}

impl CookieDocument for MemoryDocument {
    fn read(&self) -> String {
        let now = SystemTime::now();
        self.cookies
            .lock()
            .iter()
            .filter(|c| c.expires.map_or(true, |at| at > now))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn write(&self, cookie: &str) -> Result<()> {
        let write = parse_cookie_write(cookie)
            .ok_or_else(|| StoreError::InvalidCookie(cookie.to_string()))?;
        let now = SystemTime::now();
        let mut cookies = self.cookies.lock();
        cookies.retain(|c| c.expires.map_or(true, |at| at > now));

        if write.expires.is_some_and(|at| at <= now) {
            cookies.retain(|c| c.name != write.name);
            return Ok(());
        }

        let stored = StoredCookie {
            name: write.name,
            value: write.value,
            expires: write.expires,
        };
        match cookies.iter_mut().find(|c| c.name == stored.name) {
            Some(existing) => *existing = stored,
            None => cookies.push(stored),
        }
        Ok(())
    }
}

/// Cookie mechanism built on a [`CookieDocument`].
pub struct DocumentCookieStore<D> {
    document: D,
    listeners: Mutex<Vec<CookieChangeListener>>,
    previous: Mutex<BTreeMap<String, Cookie>>,
}

impl<D: CookieDocument> DocumentCookieStore<D> {
    pub fn new(document: D) -> Self {
        let store = Self {
            document,
            listeners: Mutex::new(Vec::new()),
            previous: Mutex::new(BTreeMap::new()),
        };
        *store.previous.lock() = store.current_map();
        store
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    fn current(&self) -> Vec<Cookie> {
        parse_cookie_string(&self.document.read())
    }

    fn current_map(&self) -> BTreeMap<String, Cookie> {
        let mut map = BTreeMap::new();
        for cookie in self.current() {
            map.entry(cookie.name.clone()).or_insert(cookie);
        }
        map
    }

    /// Diff the cookie string against the last observed state and dispatch
    /// one event to every listener if anything changed.
    pub fn poll_changes(&self) -> CookieChangeEvent {
        let current = self.current_map();
        let event = {
            let mut previous = self.previous.lock();
            let changed: Vec<Cookie> = current
                .values()
                .filter(|c| previous.get(&c.name).map_or(true, |p| p.value != c.value))
                .cloned()
                .collect();
            let deleted: Vec<Cookie> = previous
                .values()
                .filter(|p| !current.contains_key(&p.name))
                .cloned()
                .collect();
            let event = CookieChangeEvent { changed, deleted };
            if !event.is_empty() {
                *previous = current;
            }
            event
        };

        if !event.is_empty() {
            debug!(
                changed = event.changed.len(),
                deleted = event.deleted.len(),
                "cookie change detected"
            );
            self.dispatch(&event);
        }
        event
    }

    fn dispatch(&self, event: &CookieChangeEvent) {
        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            if let Err(reason) = run_isolated(|| listener(event)) {
                error!(reason = %reason, "cookie change listener panicked");
            }
        }
    }
}

impl DocumentCookieStore<MemoryDocument> {
    /// A polyfill over a fresh [`MemoryDocument`].
    pub fn in_memory() -> Self {
        Self::new(MemoryDocument::new())
    }
}

#[async_trait]
impl<D: CookieDocument> CookieMechanism for DocumentCookieStore<D> {
    async fn get(&self, name: &str) -> Result<Option<Cookie>> {
        Ok(self.current().into_iter().find(|c| c.name == name))
    }

    async fn get_all(&self) -> Result<Vec<Cookie>> {
        Ok(self.current())
    }

    async fn set(&self, init: CookieInit) -> Result<()> {
        self.document.write(&serialize_cookie(&init)?)?;
        self.poll_changes();
        Ok(())
    }

    async fn delete(&self, options: CookieDeleteOptions) -> Result<()> {
        self.document.write(&serialize_deletion(&options))?;
        self.poll_changes();
        Ok(())
    }

    fn add_change_listener(&self, listener: CookieChangeListener) -> Result<()> {
        self.listeners.lock().push(listener);
        Ok(())
    }

    fn remove_change_listener(&self, listener: &CookieChangeListener) -> Result<()> {
        self.listeners.lock().retain(|l| !Arc::ptr_eq(l, listener));
        Ok(())
    }
}
