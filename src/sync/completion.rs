use crate::error::{Result, StoreError};
use futures::channel::oneshot;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Opt-in completion signal for the persistence side of a store operation.
///
/// Store operations apply their cache update and notifications before they
/// return; the `Completion` only reports how the underlying mechanism call
/// settled. Awaiting it is optional, and dropping it does not cancel the work.
#[must_use = "a Completion may be dropped, but then persistence errors go unobserved"]
pub struct Completion {
    state: State,
}

enum State {
    Ready(Option<Result<()>>),
    Pending(oneshot::Receiver<Result<()>>),
}

impl Completion {
    /// An already-settled successful completion.
    pub fn done() -> Self {
        Self::ready(Ok(()))
    }

    pub fn ready(result: Result<()>) -> Self {
        Self {
            state: State::Ready(Some(result)),
        }
    }

    pub(crate) fn pending(receiver: oneshot::Receiver<Result<()>>) -> Self {
        Self {
            state: State::Pending(receiver),
        }
    }

    /// Whether the result is already available without polling.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }
}

impl Future for Completion {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            State::Ready(result) => Poll::Ready(result.take().unwrap_or(Ok(()))),
            State::Pending(receiver) => match Pin::new(receiver).poll(cx) {
                Poll::Ready(Ok(result)) => Poll::Ready(result),
                Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(StoreError::Abandoned)),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("ready", &self.is_ready())
            .finish()
    }
}
