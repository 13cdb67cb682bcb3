//! Shutdown signal handed to long-running tasks.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll, ready},
};

use tokio_util::{
    sync::{CancellationToken, WaitForCancellationFutureOwned},
    task::task_tracker::TaskTrackerToken,
};

/// Resolves once shutdown has been requested, yielding a guard.
///
/// The owning [`TaskManager`](crate::TaskManager) does not finish waiting
/// until every guard has been dropped, so a task can hold it across its
/// cleanup work.
pub struct GracefulShutdown {
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    guard: Option<GracefulShutdownGuard>,
}

impl GracefulShutdown {
    pub(crate) fn new(token: CancellationToken, tracker_token: TaskTrackerToken) -> Self {
        Self {
            cancelled: Box::pin(token.cancelled_owned()),
            guard: Some(GracefulShutdownGuard(tracker_token)),
        }
    }
}

impl fmt::Debug for GracefulShutdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GracefulShutdown")
            .field("fired", &self.guard.is_none())
            .finish()
    }
}

impl Future for GracefulShutdown {
    type Output = GracefulShutdownGuard;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        ready!(this.cancelled.as_mut().poll(cx));
        match this.guard.take() {
            Some(guard) => Poll::Ready(guard),
            // Polled again after completion.
            None => Poll::Pending,
        }
    }
}

/// Keeps shutdown pending while held.
#[must_use = "dropping the guard releases the shutdown immediately"]
pub struct GracefulShutdownGuard(#[allow(dead_code)] TaskTrackerToken);

impl fmt::Debug for GracefulShutdownGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GracefulShutdownGuard").finish()
    }
}
