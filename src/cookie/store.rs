use super::mechanism::CookieMechanism;
use super::types::{CookieAttributes, CookieChangeEvent, CookieChangeListener, CookieDeleteAttributes};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::sync::{Callback, Completion, ExternalStore, KeyedState, Snapshot, Subscription};
use futures::channel::oneshot;
use futures::task::{Spawn, SpawnExt};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// The capabilities a cookie store needs from its host.
///
/// `spawner` runs the mechanism's asynchronous calls so that store operations
/// can return before persistence settles.
#[derive(Clone)]
pub struct CookieEnvironment {
    mechanism: Arc<dyn CookieMechanism>,
    spawner: Arc<dyn Spawn + Send + Sync>,
}

impl CookieEnvironment {
    pub fn new(mechanism: Arc<dyn CookieMechanism>, spawner: Arc<dyn Spawn + Send + Sync>) -> Self {
        Self { mechanism, spawner }
    }

    pub fn mechanism(&self) -> &Arc<dyn CookieMechanism> {
        &self.mechanism
    }
}

/// Keyed external store over cookies.
///
/// Without an environment the store is inert: snapshots are absent and every
/// operation completes immediately with `Ok(())`.
///
/// # Examples
///
/// ```
/// use keysync::cookie::{CookieAttributes, CookieEnvironment, CookieSyncStore, DocumentCookieStore};
/// use keysync::sync::TaskQueue;
/// use keysync::StoreConfig;
/// use std::sync::Arc;
///
/// let queue = Arc::new(TaskQueue::new());
/// let env = CookieEnvironment::new(Arc::new(DocumentCookieStore::in_memory()), queue.clone());
/// let store = CookieSyncStore::new(Some(env), StoreConfig::cookies());
///
/// let _pending = store.write("theme", CookieAttributes::new("dark"));
/// assert_eq!(store.snapshot("theme").as_deref(), Some("dark"));
///
/// queue.run_until_stalled();
/// ```
pub struct CookieSyncStore {
    state: Arc<KeyedState>,
    env: Option<CookieEnvironment>,
    listener: Option<CookieChangeListener>,
}

impl CookieSyncStore {
    /// Create a store and attach its change listener.
    ///
    /// If the mechanism refuses the listener, the failure is logged once and
    /// the store keeps working without cross-context updates.
    pub fn new(env: Option<CookieEnvironment>, config: StoreConfig) -> Self {
        let state = Arc::new(KeyedState::new(config));
        let listener = env.as_ref().and_then(|env| Self::attach(&state, env));
        Self { state, env, listener }
    }

    /// A store for hosts without cookies, such as server rendering.
    pub fn detached() -> Self {
        Self::new(None, StoreConfig::cookies())
    }

    fn attach(state: &Arc<KeyedState>, env: &CookieEnvironment) -> Option<CookieChangeListener> {
        let weak = Arc::downgrade(state);
        let listener: CookieChangeListener = Arc::new(move |event: &CookieChangeEvent| {
            if let Some(state) = weak.upgrade() {
                apply_change(&state, event);
            }
        });

        match env.mechanism.add_change_listener(Arc::clone(&listener)) {
            Ok(()) => Some(listener),
            Err(err) => {
                warn!(
                    store = %state.label(),
                    error = %err,
                    "cookie change events unavailable; external changes will not be observed"
                );
                None
            }
        }
    }

    pub fn config(&self) -> &StoreConfig {
        self.state.config()
    }

    /// Whether a cookie mechanism is present.
    pub fn is_available(&self) -> bool {
        self.env.is_some()
    }

    /// Whether external changes are being observed.
    pub fn is_synced(&self) -> bool {
        self.listener.is_some()
    }

    pub fn subscribe<F>(&self, name: &str, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.state.subscribe(name, Arc::new(callback))
    }

    pub fn snapshot(&self, name: &str) -> Snapshot {
        self.state.snapshot(name)
    }

    pub fn server_snapshot(&self, _name: &str) -> Snapshot {
        None
    }

    /// Load `name` from the mechanism unless it is loading or loaded already.
    pub fn init(&self, name: &str) -> Completion {
        let Some(env) = &self.env else {
            return Completion::done();
        };
        if !self.state.begin_load(name) {
            return Completion::done();
        }
        debug!(store = %self.state.label(), key = %name, "loading cookie");

        let state = Arc::clone(&self.state);
        let mechanism = Arc::clone(&env.mechanism);
        let key = name.to_string();
        self.spawn(env, "init", name, async move {
            let cookie = mechanism.get(&key).await?;
            state.finish_load(&key, cookie.map(|c| c.value));
            Ok(())
        })
    }

    /// Write a cookie. The snapshot and subscribers update before this
    /// returns; the mechanism write settles later.
    pub fn write(&self, name: &str, attributes: CookieAttributes) -> Completion {
        let Some(env) = &self.env else {
            return Completion::done();
        };
        debug!(store = %self.state.label(), key = %name, "writing cookie");

        let init = attributes.into_init(name);
        let value = init.value.clone();
        let mechanism = Arc::clone(&env.mechanism);
        let pending = self.state.begin_mutation(name);
        self.state.store_local(name, value);

        self.spawn(env, "write", name, async move {
            let result = mechanism.set(init).await;
            drop(pending);
            result
        })
    }

    /// Remove a cookie. The path and domain must match the ones it was
    /// written with.
    pub fn delete(&self, name: &str, attributes: CookieDeleteAttributes) -> Completion {
        let Some(env) = &self.env else {
            return Completion::done();
        };
        debug!(store = %self.state.label(), key = %name, "deleting cookie");

        let options = attributes.into_options(name);
        let mechanism = Arc::clone(&env.mechanism);
        let pending = self.state.begin_mutation(name);
        self.state.remove_local(name);

        self.spawn(env, "delete", name, async move {
            let result = mechanism.delete(options).await;
            drop(pending);
            result
        })
    }

    /// Number of subscribers currently registered for `name`.
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.state.registry().subscriber_count(name)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.state.is_loaded(name)
    }

    fn spawn<F>(&self, env: &CookieEnvironment, op: &'static str, name: &str, work: F) -> Completion
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let label = self.state.label().to_string();
        let key = name.to_string();
        let task = async move {
            let result = work.await;
            if let Err(err) = &result {
                warn!(store = %label, key = %key, op, error = %err, "cookie operation failed");
            }
            // The caller may have dropped its Completion.
            let _ = tx.send(result);
        };

        match env.spawner.spawn(task) {
            Ok(()) => Completion::pending(rx),
            Err(err) => {
                warn!(store = %self.state.label(), key = %name, op, error = %err, "could not schedule cookie operation");
                Completion::ready(Err(StoreError::Spawn(err.to_string())))
            }
        }
    }
}

impl Drop for CookieSyncStore {
    fn drop(&mut self) {
        let (Some(env), Some(listener)) = (&self.env, self.listener.take()) else {
            return;
        };
        if let Err(err) = env.mechanism.remove_change_listener(&listener) {
            debug!(store = %self.state.label(), error = %err, "cookie change listener left attached");
        }
    }
}

fn apply_change(state: &KeyedState, event: &CookieChangeEvent) {
    for cookie in &event.changed {
        if cookie.name.is_empty() {
            continue;
        }
        if state.apply_external(&cookie.name, Some(cookie.value.clone())) {
            debug!(store = %state.label(), key = %cookie.name, "cookie changed externally");
        }
    }
    for cookie in &event.deleted {
        if cookie.name.is_empty() {
            continue;
        }
        if state.apply_external_removal(&cookie.name) {
            debug!(store = %state.label(), key = %cookie.name, "cookie deleted externally");
        }
    }
}

impl ExternalStore for CookieSyncStore {
    type Write = CookieAttributes;
    type Delete = CookieDeleteAttributes;

    fn init(&self, key: &str) -> Completion {
        CookieSyncStore::init(self, key)
    }

    fn snapshot(&self, key: &str) -> Snapshot {
        CookieSyncStore::snapshot(self, key)
    }

    fn subscribe(&self, key: &str, callback: Callback) -> Subscription {
        self.state.subscribe(key, callback)
    }

    fn write(&self, key: &str, args: CookieAttributes) -> Completion {
        CookieSyncStore::write(self, key, args)
    }

    fn delete(&self, key: &str, args: CookieDeleteAttributes) -> Completion {
        CookieSyncStore::delete(self, key, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookie::polyfill::{CookieDocument, DocumentCookieStore};
    use crate::cookie::types::{Cookie, CookieDeleteOptions, CookieInit};
    use crate::sync::TaskQueue;
    use async_trait::async_trait;
    use futures::executor::block_on;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mechanism with canned reads, a read counter and a manual change feed.
    #[derive(Default)]
    struct ScriptedCookies {
        values: Mutex<Vec<Cookie>>,
        reads: AtomicUsize,
        listeners: Mutex<Vec<CookieChangeListener>>,
        fail_writes: bool,
        refuse_listeners: bool,
    }

    impl ScriptedCookies {
        fn with(cookies: &[(&str, &str)]) -> Self {
            Self {
                values: Mutex::new(cookies.iter().map(|(n, v)| Cookie::new(*n, *v)).collect()),
                ..Default::default()
            }
        }

        fn emit(&self, event: CookieChangeEvent) {
            for listener in self.listeners.lock().iter() {
                listener(&event);
            }
        }
    }

    #[async_trait]
    impl CookieMechanism for ScriptedCookies {
        async fn get(&self, name: &str) -> Result<Option<Cookie>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.values.lock().iter().find(|c| c.name == name).cloned())
        }

        async fn get_all(&self) -> Result<Vec<Cookie>> {
            Ok(self.values.lock().clone())
        }

        async fn set(&self, init: CookieInit) -> Result<()> {
            if self.fail_writes {
                return Err(StoreError::Backend("cookie jar is read-only".into()));
            }
            self.values.lock().push(Cookie::new(init.name, init.value));
            Ok(())
        }

        async fn delete(&self, options: CookieDeleteOptions) -> Result<()> {
            self.values.lock().retain(|c| c.name != options.name);
            Ok(())
        }

        fn add_change_listener(&self, listener: CookieChangeListener) -> Result<()> {
            if self.refuse_listeners {
                return Err(StoreError::Unsupported("cookie change events"));
            }
            self.listeners.lock().push(listener);
            Ok(())
        }
    }

    fn store_over(mechanism: Arc<ScriptedCookies>) -> (CookieSyncStore, Arc<TaskQueue>) {
        let queue = Arc::new(TaskQueue::new());
        let env = CookieEnvironment::new(mechanism, queue.clone());
        (CookieSyncStore::new(Some(env), StoreConfig::cookies()), queue)
    }

    fn counting(store: &CookieSyncStore, name: &str) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let sub = store.subscribe(name, move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        (count, sub)
    }

    #[test]
    fn init_loads_and_notifies_once() {
        let mechanism = Arc::new(ScriptedCookies::with(&[("theme", "dark")]));
        let (store, queue) = store_over(mechanism);
        let (count, _sub) = counting(&store, "theme");

        let completion = store.init("theme");
        assert_eq!(store.snapshot("theme"), None);

        queue.run_until_stalled();
        assert!(block_on(completion).is_ok());
        assert_eq!(store.snapshot("theme").as_deref(), Some("dark"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_init_reads_once() {
        let mechanism = Arc::new(ScriptedCookies::with(&[("theme", "dark")]));
        let (store, queue) = store_over(mechanism.clone());

        let first = store.init("theme");
        let second = store.init("theme");
        assert!(second.is_ready());

        queue.run_until_stalled();
        block_on(first).unwrap();
        assert_eq!(mechanism.reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn init_of_missing_cookie_is_silent() {
        let mechanism = Arc::new(ScriptedCookies::default());
        let (store, queue) = store_over(mechanism);
        let (count, _sub) = counting(&store, "theme");

        let _ = store.init("theme");
        queue.run_until_stalled();

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(store.snapshot("theme"), None);
        assert!(store.is_loaded("theme"));
    }

    #[test]
    fn write_is_visible_before_persistence() {
        let mechanism = Arc::new(ScriptedCookies::default());
        let (store, queue) = store_over(mechanism.clone());
        let (count, _sub) = counting(&store, "theme");

        let completion = store.write("theme", CookieAttributes::new("light"));
        assert_eq!(store.snapshot("theme").as_deref(), Some("light"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(mechanism.values.lock().is_empty());

        queue.run_until_stalled();
        block_on(completion).unwrap();
        assert_eq!(mechanism.values.lock()[0].value, "light");
    }

    #[test]
    fn persistence_failure_reaches_the_completion() {
        let mechanism = Arc::new(ScriptedCookies {
            fail_writes: true,
            ..Default::default()
        });
        let (store, queue) = store_over(mechanism);

        let completion = store.write("theme", CookieAttributes::new("light"));
        queue.run_until_stalled();

        assert!(matches!(block_on(completion), Err(StoreError::Backend(_))));
        assert_eq!(store.snapshot("theme").as_deref(), Some("light"));
    }

    #[test]
    fn external_delete_clears_and_notifies() {
        let mechanism = Arc::new(ScriptedCookies::default());
        let (store, queue) = store_over(mechanism.clone());
        let _ = store.write("theme", CookieAttributes::new("dark"));
        queue.run_until_stalled();
        let (count, _sub) = counting(&store, "theme");

        mechanism.emit(CookieChangeEvent {
            changed: vec![],
            deleted: vec![Cookie::new("theme", "")],
        });

        assert_eq!(store.snapshot("theme"), None);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn external_change_skips_unnamed_and_unchanged() {
        let mechanism = Arc::new(ScriptedCookies::default());
        let (store, queue) = store_over(mechanism.clone());
        let _ = store.write("theme", CookieAttributes::new("dark"));
        queue.run_until_stalled();
        let (count, _sub) = counting(&store, "theme");

        mechanism.emit(CookieChangeEvent {
            changed: vec![Cookie::new("", "x"), Cookie::new("theme", "dark")],
            deleted: vec![],
        });
        assert_eq!(count.load(Ordering::SeqCst), 0);

        mechanism.emit(CookieChangeEvent {
            changed: vec![Cookie::new("theme", "light")],
            deleted: vec![],
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(store.snapshot("theme").as_deref(), Some("light"));
    }

    #[test]
    fn refused_listener_degrades_to_local_sync() {
        let mechanism = Arc::new(ScriptedCookies {
            refuse_listeners: true,
            ..Default::default()
        });
        let (store, _queue) = store_over(mechanism);

        assert!(store.is_available());
        assert!(!store.is_synced());
        let _ = store.write("theme", CookieAttributes::new("dark"));
        assert_eq!(store.snapshot("theme").as_deref(), Some("dark"));
    }

    #[test]
    fn detached_store_is_inert() {
        let store = CookieSyncStore::detached();
        let (count, _sub) = counting(&store, "theme");

        assert!(store.init("theme").is_ready());
        assert!(block_on(store.write("theme", CookieAttributes::new("dark"))).is_ok());
        assert!(block_on(store.delete("theme", CookieDeleteAttributes::default())).is_ok());

        assert_eq!(store.snapshot("theme"), None);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!store.is_available());
    }

    #[test]
    fn polyfill_echo_does_not_double_notify() {
        let queue = Arc::new(TaskQueue::new());
        let env = CookieEnvironment::new(Arc::new(DocumentCookieStore::in_memory()), queue.clone());
        let store = CookieSyncStore::new(Some(env), StoreConfig::cookies());
        let (count, _sub) = counting(&store, "theme");

        let _ = store.write("theme", CookieAttributes::new("dark"));
        queue.run_until_stalled();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let _ = store.delete("theme", CookieDeleteAttributes::default());
        queue.run_until_stalled();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(store.snapshot("theme"), None);
    }

    fn polyfill_store() -> (CookieSyncStore, Arc<TaskQueue>, Arc<DocumentCookieStore<crate::cookie::MemoryDocument>>) {
        let queue = Arc::new(TaskQueue::new());
        let cookies = Arc::new(DocumentCookieStore::in_memory());
        let env = CookieEnvironment::new(cookies.clone(), queue.clone());
        (CookieSyncStore::new(Some(env), StoreConfig::cookies()), queue, cookies)
    }

    fn recording(store: &Arc<CookieSyncStore>, name: &'static str) -> (Arc<Mutex<Vec<Option<String>>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reader = Arc::downgrade(store);
        let sub = store.subscribe(name, move || {
            if let Some(store) = reader.upgrade() {
                sink.lock().push(store.snapshot(name).map(|s| s.to_string()));
            }
        });
        (seen, sub)
    }

    #[test]
    fn back_to_back_writes_do_not_replay_older_echoes() {
        let (store, queue, cookies) = polyfill_store();
        let store = Arc::new(store);
        let (seen, _sub) = recording(&store, "theme");

        let _ = store.write("theme", CookieAttributes::new("a"));
        let _ = store.write("theme", CookieAttributes::new("b"));
        queue.run_until_stalled();

        assert_eq!(*seen.lock(), vec![Some("a".to_string()), Some("b".to_string())]);
        assert_eq!(cookies.document().read(), "theme=b");
    }

    #[test]
    fn write_then_delete_never_resurrects_the_value() {
        let (store, queue, cookies) = polyfill_store();
        let store = Arc::new(store);
        let (seen, _sub) = recording(&store, "theme");

        let _ = store.write("theme", CookieAttributes::new("a"));
        let _ = store.delete("theme", CookieDeleteAttributes::default());
        queue.run_until_stalled();

        assert_eq!(*seen.lock(), vec![Some("a".to_string()), None]);
        assert_eq!(store.snapshot("theme"), None);
        assert_eq!(cookies.document().read(), "");
    }

    #[test]
    fn external_change_after_local_write_lands_once_settled() {
        let mechanism = Arc::new(ScriptedCookies::default());
        let (store, queue) = store_over(mechanism.clone());
        let (count, _sub) = counting(&store, "theme");

        let _ = store.write("theme", CookieAttributes::new("a"));
        mechanism.emit(CookieChangeEvent {
            changed: vec![Cookie::new("theme", "other-tab")],
            deleted: vec![],
        });
        assert_eq!(store.snapshot("theme").as_deref(), Some("a"));

        queue.run_until_stalled();
        assert_eq!(store.snapshot("theme").as_deref(), Some("other-tab"));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn out_of_range_expiry_fails_only_its_own_write() {
        let (store, queue, cookies) = polyfill_store();

        let lang = store.write("lang", CookieAttributes::new("ko"));
        let far = std::time::UNIX_EPOCH + std::time::Duration::from_secs(300_000_000_000);
        let theme = store.write("theme", CookieAttributes::new("dark").expires(far));
        let sid = store.write("sid", CookieAttributes::new("abc"));
        queue.run_until_stalled();

        assert!(block_on(lang).is_ok());
        assert!(matches!(block_on(theme), Err(StoreError::InvalidCookie(_))));
        assert!(block_on(sid).is_ok());
        assert_eq!(cookies.document().read(), "lang=ko; sid=abc");
    }

    #[test]
    fn pre_epoch_expiry_removes_the_cookie() {
        let (store, queue, cookies) = polyfill_store();
        let _ = store.write("theme", CookieAttributes::new("dark"));
        queue.run_until_stalled();

        let past = std::time::UNIX_EPOCH - std::time::Duration::from_secs(1);
        let expired = store.write("theme", CookieAttributes::new("dark").expires(past));
        let sid = store.write("sid", CookieAttributes::new("abc"));
        queue.run_until_stalled();

        assert!(block_on(expired).is_ok());
        assert!(block_on(sid).is_ok());
        assert_eq!(cookies.document().read(), "sid=abc");
        assert_eq!(store.snapshot("theme"), None);
    }

    #[test]
    fn dropping_the_store_detaches_its_listener() {
        let (store, _queue, cookies) = polyfill_store();
        assert!(store.is_synced());
        assert_eq!(cookies.listener_count(), 1);

        drop(store);
        assert_eq!(cookies.listener_count(), 0);
    }
}
