//! Bounded step state for multi-step flows.
//!
//! A [`StepCounter`] is shared by cloning: every clone moves the same step
//! and reaches the same subscribers.

use crate::store::{Store, SubscriberId};
use serde::Deserialize;

/// Bounds and starting point of a [`StepCounter`].
///
/// Either bound may be left open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StepOptions {
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub initial: i64,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            min: None,
            max: None,
            initial: 1,
        }
    }
}

impl StepOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min(mut self, min: i64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: i64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn initial(mut self, initial: i64) -> Self {
        self.initial = initial;
        self
    }

    fn clamp(&self, step: i64) -> i64 {
        match (self.min, self.max) {
            (Some(min), _) if step < min => min,
            (_, Some(max)) if step > max => max,
            _ => step,
        }
    }
}

/// Current step plus the moves allowed on it.
///
/// ```
/// use keysync::step::{StepCounter, StepOptions};
///
/// let wizard = StepCounter::new(StepOptions::new().min(1).max(3));
/// wizard.next();
/// wizard.next();
/// wizard.next();
/// assert_eq!(wizard.step(), 3);
/// wizard.reset();
/// assert_eq!(wizard.step(), 1);
/// ```
#[derive(Clone)]
pub struct StepCounter {
    store: Store<i64>,
    options: StepOptions,
}

impl StepCounter {
    /// The initial step is used as given, even outside the bounds.
    pub fn new(options: StepOptions) -> Self {
        Self {
            store: Store::new(options.initial),
            options,
        }
    }

    pub fn options(&self) -> &StepOptions {
        &self.options
    }

    pub fn step(&self) -> i64 {
        self.store.get()
    }

    pub fn next(&self) {
        let max = self.options.max;
        self.store.update(|step| {
            let moved = step.saturating_add(1);
            *step = max.map_or(moved, |max| moved.min(max));
        });
    }

    pub fn prev(&self) {
        let min = self.options.min;
        self.store.update(|step| {
            let moved = step.saturating_sub(1);
            *step = min.map_or(moved, |min| moved.max(min));
        });
    }

    pub fn reset(&self) {
        self.store.set(self.options.initial);
    }

    pub fn go_to(&self, step: i64) {
        self.store.set(self.options.clamp(step));
    }

    /// Called with the new step after every move, including no-op moves at
    /// a bound.
    pub fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(i64) + Send + Sync + 'static,
    {
        self.store.subscribe(move |step: &i64| callback(*step))
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.store.unsubscribe(id)
    }
}

impl Default for StepCounter {
    fn default() -> Self {
        Self::new(StepOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rstest::rstest;
    use std::sync::Arc;

    #[test]
    fn defaults_start_at_one_unbounded() {
        let counter = StepCounter::default();
        assert_eq!(counter.step(), 1);
        counter.prev();
        counter.prev();
        assert_eq!(counter.step(), -1);
    }

    #[test]
    fn next_and_prev_stop_at_bounds() {
        let counter = StepCounter::new(StepOptions::new().min(1).max(2));
        counter.next();
        counter.next();
        assert_eq!(counter.step(), 2);
        counter.prev();
        counter.prev();
        assert_eq!(counter.step(), 1);
    }

    #[rstest]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(3, 3)]
    #[case(5, 5)]
    #[case(9, 5)]
    fn go_to_clamps_into_bounds(#[case] target: i64, #[case] expected: i64) {
        let counter = StepCounter::new(StepOptions::new().min(1).max(5));
        counter.go_to(target);
        assert_eq!(counter.step(), expected);
    }

    #[test]
    fn reset_returns_to_initial() {
        let counter = StepCounter::new(StepOptions::new().initial(3).max(10));
        counter.go_to(8);
        counter.reset();
        assert_eq!(counter.step(), 3);
    }

    #[test]
    fn clones_share_step_and_subscribers() {
        let counter = StepCounter::new(StepOptions::new().max(4));
        let child = counter.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let id = counter.subscribe(move |step| seen_clone.lock().push(step));

        child.next();
        child.go_to(4);
        child.next();
        assert_eq!(counter.step(), 4);
        assert_eq!(*seen.lock(), vec![2, 4, 4]);

        assert!(child.unsubscribe(id));
        child.reset();
        assert_eq!(seen.lock().len(), 3);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: StepOptions = serde_json::from_str(r#"{"max": 4}"#).unwrap();
        assert_eq!(options, StepOptions::new().max(4));
        assert_eq!(options.initial, 1);
    }
}
