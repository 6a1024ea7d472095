use super::registry::catch_isolated;
use futures::task::{noop_waker_ref, FutureObj, Spawn, SpawnError};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::error;

/// A cooperative task queue for single-threaded hosts.
///
/// Spawned futures are held until the host's event loop calls
/// [`TaskQueue::run_until_stalled`]. Tasks still pending after a pass stay
/// queued for the next one. A task that panics is logged and dropped; the
/// rest of the batch still runs.
///
/// # Examples
///
/// ```
/// use futures::task::SpawnExt;
/// use keysync::sync::TaskQueue;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// let queue = TaskQueue::new();
/// let ran = Arc::new(AtomicBool::new(false));
/// let ran_clone = ran.clone();
/// queue.spawn(async move { ran_clone.store(true, Ordering::SeqCst) }).unwrap();
///
/// assert!(!ran.load(Ordering::SeqCst));
/// queue.run_until_stalled();
/// assert!(ran.load(Ordering::SeqCst));
/// ```
#[derive(Default)]
pub struct TaskQueue {
    tasks: Mutex<Vec<FutureObj<'static, ()>>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Poll every queued task once. Returns how many finished, counting
    /// tasks that panicked.
    pub fn run_pending(&self) -> usize {
        let batch = std::mem::take(&mut *self.tasks.lock());
        let mut cx = Context::from_waker(noop_waker_ref());
        let mut completed = 0;
        let mut parked = Vec::new();

        for mut task in batch {
            match catch_isolated(|| Pin::new(&mut task).poll(&mut cx)) {
                Ok(Poll::Ready(())) => completed += 1,
                Ok(Poll::Pending) => parked.push(task),
                Err(reason) => {
                    error!(reason = %reason, "spawned task panicked");
                    completed += 1;
                }
            }
        }

        // Tasks spawned while polling were queued behind the batch.
        let mut tasks = self.tasks.lock();
        parked.append(&mut tasks);
        *tasks = parked;
        completed
    }

    /// Keep polling until a pass completes nothing.
    pub fn run_until_stalled(&self) -> usize {
        let mut total = 0;
        loop {
            let completed = self.run_pending();
            if completed == 0 {
                return total;
            }
            total += completed;
        }
    }
}

impl Spawn for TaskQueue {
    fn spawn_obj(&self, future: FutureObj<'static, ()>) -> Result<(), SpawnError> {
        self.tasks.lock().push(future);
        Ok(())
    }
}
