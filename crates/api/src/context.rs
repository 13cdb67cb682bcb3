//! Deadline and cancellation carried through a lookup.

use std::{future::Future, time::Duration};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::ExchangeError;

/// Horizon used for deadlines too far away to represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// The instant `timeout` from now, clamped to a far-future horizon instead of
/// overflowing.
pub fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + FAR_FUTURE.min(timeout))
}

/// Why a call bounded by a [`LookupContext`] stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interrupted {
    /// The context was cancelled.
    #[error("cancelled")]
    Cancelled,
    /// The context deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl From<Interrupted> for ExchangeError {
    fn from(reason: Interrupted) -> Self {
        match reason {
            Interrupted::Cancelled => ExchangeError::Cancelled,
            Interrupted::DeadlineExceeded => ExchangeError::DeadlineExceeded,
        }
    }
}

/// Wall-clock budget and cancellation token shared by every sub-call of a
/// lookup.
///
/// Cloning shares the token. [`child`](Self::child) derives a context that
/// can be cancelled on its own.
#[derive(Debug, Clone)]
pub struct LookupContext {
    deadline: Instant,
    token: CancellationToken,
}

impl LookupContext {
    /// Context expiring at `deadline`, cancelled through `token`.
    pub fn new(deadline: Instant, token: CancellationToken) -> Self {
        Self { deadline, token }
    }

    /// Context expiring `budget` from now with a fresh token.
    pub fn with_budget(budget: Duration) -> Self {
        Self::new(deadline_after(budget), CancellationToken::new())
    }

    /// Deadline of the context.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// The context's cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Time left before the deadline, zero once passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Whether the context was cancelled or its deadline passed.
    pub fn is_done(&self) -> bool {
        self.token.is_cancelled() || Instant::now() >= self.deadline
    }

    /// Cancel the context and every child derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Child context whose deadline is the earlier of this one and
    /// `timeout` from now.
    pub fn child(&self, timeout: Duration) -> Self {
        let deadline = self.deadline.min(deadline_after(timeout));
        Self::new(deadline, self.token.child_token())
    }

    /// Drive `fut` until it completes, the context is cancelled, or the
    /// deadline passes. The future is dropped on interruption.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Interrupted::Cancelled),
            _ = tokio::time::sleep_until(self.deadline) => Err(Interrupted::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }

    /// Sleep for `duration`, returning early with the interruption reason.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        self.run(tokio::time::sleep(duration)).await
    }
}
