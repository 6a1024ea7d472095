use super::types::{Cookie, CookieChangeListener, CookieDeleteOptions, CookieInit};
use crate::error::{Result, StoreError};
use async_trait::async_trait;

/// Asynchronous cookie access with change notification.
///
/// This is the shape of the browser `CookieStore` API. Implementations report
/// mutations to registered listeners as [`CookieChangeEvent`]s, including
/// mutations made through this same mechanism.
///
/// [`CookieChangeEvent`]: super::CookieChangeEvent
#[async_trait]
pub trait CookieMechanism: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<Cookie>>;

    async fn get_all(&self) -> Result<Vec<Cookie>>;

    /// Every visible cookie called `name`. Hosts may hold several cookies
    /// with one name under different paths or domains.
    async fn get_all_named(&self, name: &str) -> Result<Vec<Cookie>> {
        let mut cookies = self.get_all().await?;
        cookies.retain(|c| c.name == name);
        Ok(cookies)
    }

    async fn set(&self, init: CookieInit) -> Result<()>;

    async fn delete(&self, options: CookieDeleteOptions) -> Result<()>;

    /// Register a change listener.
    ///
    /// Fails when the mechanism cannot deliver change events at all.
    fn add_change_listener(&self, listener: CookieChangeListener) -> Result<()>;

    /// Unregister a listener previously passed to `add_change_listener`,
    /// matched by pointer identity.
    fn remove_change_listener(&self, _listener: &CookieChangeListener) -> Result<()> {
        Err(StoreError::Unsupported("removing cookie change listeners"))
    }
}
