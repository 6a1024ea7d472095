//! Two components sharing a theme cookie and a cart in local storage

use keysync::cookie::{CookieDocument, DocumentCookieStore};
use keysync::{
    CookieAttributes, CookieEnvironment, CookieSyncStore, KeyBinding, MemoryStorage, StorageArea,
    StorageSyncStore, StoreConfig, TaskQueue,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> keysync::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    println!("=== Theme Sync Example ===\n");

    let queue = Arc::new(TaskQueue::new());
    let cookies = Arc::new(DocumentCookieStore::in_memory());
    cookies.document().write("theme=light; path=/")?;

    let env = CookieEnvironment::new(cookies.clone(), queue.clone());
    let store = Arc::new(CookieSyncStore::new(Some(env), StoreConfig::cookies()));

    // Two components bound to the same key
    let header = KeyBinding::new(store.clone(), "theme");
    let sidebar = KeyBinding::new(store, "theme");

    let _header_sub = header.subscribe({
        let header = header.clone();
        move || println!("header sees theme = {:?}", header.snapshot())
    });
    let _sidebar_sub = sidebar.subscribe({
        let sidebar = sidebar.clone();
        move || println!("sidebar sees theme = {:?}", sidebar.snapshot())
    });

    println!("Loading...");
    let _ = header.init();
    let _ = sidebar.init();
    queue.run_until_stalled();

    println!("\nSwitching to dark...");
    let saved = header.set(CookieAttributes::new("dark").path("/"));
    queue.run_until_stalled();
    futures::executor::block_on(saved)?;
    println!("document.cookie = {:?}", cookies.document().read());

    println!("\nAnother tab clears the cookie...");
    cookies
        .document()
        .write("theme=; expires=Thu, 01 Jan 1970 00:00:00 GMT; path=/")?;
    cookies.poll_changes();

    let shared = Arc::new(MemoryStorage::new());
    let area: Arc<dyn StorageArea> = shared.clone();
    let cart = KeyBinding::new(Arc::new(StorageSyncStore::local(Some(area))), "cart");
    let _cart_sub = cart.subscribe({
        let cart = cart.clone();
        move || println!("cart items = {:?}", cart.json::<Vec<String>>())
    });

    println!("\nAdding to cart...");
    let _ = cart.set(r#"["tea"]"#.to_string());
    shared.apply_remote("cart", Some(r#"["tea","biscuits"]"#));

    Ok(())
}
