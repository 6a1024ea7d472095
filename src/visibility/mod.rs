//! Intersection-observer binding.
//!
//! The host delivers [`IntersectionEntry`] batches to
//! [`VisibilityObserver::handle_entries`]; the observer fires its callback
//! when the observed target comes into view.

use crate::sync::run_isolated;
use parking_lot::RwLock;
use serde::Deserialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// One observation of the target's visibility.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionEntry {
    pub target: String,
    pub is_intersecting: bool,
    pub intersection_ratio: f64,
}

impl IntersectionEntry {
    pub fn new(target: impl Into<String>, is_intersecting: bool, intersection_ratio: f64) -> Self {
        Self {
            target: target.into(),
            is_intersecting,
            intersection_ratio,
        }
    }
}

/// Settings handed to the host observer.
///
/// `root` of `None` means the viewport.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ObserverOptions {
    pub root: Option<String>,
    pub root_margin: String,
    pub thresholds: Vec<f64>,
    pub once: bool,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            root: None,
            root_margin: "0px".to_string(),
            thresholds: vec![0.0],
            once: false,
        }
    }
}

impl ObserverOptions {
    pub fn root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn root_margin(mut self, margin: impl Into<String>) -> Self {
        self.root_margin = margin.into();
        self
    }

    pub fn thresholds(mut self, thresholds: impl Into<Vec<f64>>) -> Self {
        self.thresholds = thresholds.into();
        self
    }

    pub fn once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }
}

pub type IntersectCallback = Arc<dyn Fn(&IntersectionEntry) + Send + Sync>;

pub struct VisibilityObserver {
    options: ObserverOptions,
    callback: RwLock<IntersectCallback>,
    connected: AtomicBool,
}

impl VisibilityObserver {
    pub fn new<F>(options: ObserverOptions, on_intersect: F) -> Self
    where
        F: Fn(&IntersectionEntry) + Send + Sync + 'static,
    {
        Self {
            options,
            callback: RwLock::new(Arc::new(on_intersect)),
            connected: AtomicBool::new(true),
        }
    }

    pub fn options(&self) -> &ObserverOptions {
        &self.options
    }

    /// Replace the callback without reconnecting. The next intersecting
    /// entry goes to the new one.
    pub fn set_callback<F>(&self, on_intersect: F)
    where
        F: Fn(&IntersectionEntry) + Send + Sync + 'static,
    {
        *self.callback.write() = Arc::new(on_intersect);
    }

    /// Handle a batch from the host. Only the first entry is considered.
    ///
    /// Returns `true` if the callback ran.
    pub fn handle_entries(&self, entries: &[IntersectionEntry]) -> bool {
        if !self.is_connected() {
            return false;
        }
        let Some(entry) = entries.first() else {
            return false;
        };
        if !entry.is_intersecting {
            return false;
        }

        let callback = self.callback.read().clone();
        if let Err(reason) = run_isolated(|| callback(entry)) {
            error!(target_id = %entry.target, reason = %reason, "intersection callback panicked");
        }
        if self.options.once {
            self.disconnect();
        }
        true
    }

    pub fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            debug!(root_margin = %self.options.root_margin, "visibility observer disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for VisibilityObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisibilityObserver")
            .field("options", &self.options)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
