//! Task management for Shardline nodes.
//!
//! A [`TaskManager`] owns the root [`CancellationToken`] of a node. Every
//! background task is spawned through a cloneable [`TaskExecutor`], which
//! tracks it so shutdown can cancel and then join all of them.
//!
//! Long-running loops use [`TaskExecutor::spawn_with_graceful_shutdown_signal`]
//! and select on the [`GracefulShutdown`] future they are handed:
//!
//! ```ignore
//! executor.spawn_with_graceful_shutdown_signal("health", |shutdown| async move {
//!     let mut shutdown = std::pin::pin!(shutdown);
//!     loop {
//!         tokio::select! {
//!             guard = &mut shutdown => { drop(guard); break; }
//!             _ = tokio::time::sleep(interval) => tick().await,
//!         }
//!     }
//! });
//! ```

mod metrics;
mod shutdown;

pub use shutdown::{GracefulShutdown, GracefulShutdownGuard};

use std::{future::Future, time::Duration};

use tokio::{runtime::Handle, task::JoinHandle};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, warn};

use crate::metrics::{IncCounterOnDrop, TaskExecutorMetrics};

/// Owner of the node-wide shutdown signal.
#[derive(Debug)]
pub struct TaskManager {
    executor: TaskExecutor,
}

impl TaskManager {
    /// Create a manager spawning onto the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self {
            executor: TaskExecutor {
                handle,
                token: CancellationToken::new(),
                tracker: TaskTracker::new(),
                metrics: TaskExecutorMetrics::default(),
            },
        }
    }

    /// Create a manager spawning onto the current runtime.
    ///
    /// Panics outside a tokio runtime, like [`Handle::current`].
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Executor for spawning tasks owned by this manager.
    pub fn executor(&self) -> TaskExecutor {
        self.executor.clone()
    }

    /// Signal every task to stop. Idempotent.
    pub fn shutdown(&self) {
        debug!("task manager shutting down");
        self.executor.token.cancel();
        self.executor.tracker.close();
    }

    /// Wait until every tracked task and shutdown guard is gone.
    ///
    /// Only completes after [`shutdown`](Self::shutdown).
    pub async fn wait(&self) {
        self.executor.tracker.wait().await;
    }

    /// Shut down and wait at most `timeout`. Returns false on timeout.
    pub async fn graceful_shutdown_with_timeout(self, timeout: Duration) -> bool {
        self.shutdown();
        let finished = tokio::time::timeout(timeout, self.wait()).await.is_ok();
        if !finished {
            warn!(
                remaining = self.executor.tracker.len(),
                "tasks did not finish before shutdown timeout"
            );
        }
        finished
    }
}

/// Cloneable handle for spawning tracked tasks.
#[derive(Debug, Clone)]
pub struct TaskExecutor {
    handle: Handle,
    token: CancellationToken,
    tracker: TaskTracker,
    metrics: TaskExecutorMetrics,
}

impl TaskExecutor {
    /// Whether shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Spawn a task that is dropped at its next await point once shutdown
    /// is requested.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.metrics.inc_regular_tasks();
        let finished = IncCounterOnDrop::new(self.metrics.finished_regular_tasks_total.clone());
        let token = self.token.clone();
        let task = async move {
            let _finished = finished;
            tokio::select! {
                _ = token.cancelled() => {}
                _ = fut => {}
            }
        };
        self.tracker.spawn_on(task, &self.handle)
    }

    /// Spawn a task that receives the shutdown signal and decides itself
    /// when to stop.
    pub fn spawn_with_graceful_shutdown_signal<F, Fut>(
        &self,
        name: &'static str,
        f: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(GracefulShutdown) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.metrics.inc_graceful_tasks();
        let finished = IncCounterOnDrop::new(self.metrics.finished_graceful_tasks_total.clone());
        let shutdown = GracefulShutdown::new(self.token.clone(), self.tracker.token());
        let fut = f(shutdown);
        let task = async move {
            let _finished = finished;
            fut.await;
            debug!(task = name, "task finished");
        };
        self.tracker.spawn_on(task, &self.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    };

    #[tokio::test]
    async fn test_graceful_task_stops_on_shutdown() {
        let manager = TaskManager::current();
        let executor = manager.executor();
        let ticks = Arc::new(AtomicUsize::new(0));
        let cleaned_up = Arc::new(AtomicBool::new(false));

        let (t, c) = (ticks.clone(), cleaned_up.clone());
        executor.spawn_with_graceful_shutdown_signal("ticker", |shutdown| async move {
            let mut shutdown = std::pin::pin!(shutdown);
            loop {
                tokio::select! {
                    guard = &mut shutdown => {
                        c.store(true, Ordering::SeqCst);
                        drop(guard);
                        break;
                    }
                    _ = tokio::time::sleep(Duration::from_millis(1)) => {
                        t.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(manager.graceful_shutdown_with_timeout(Duration::from_secs(5)).await);
        assert!(cleaned_up.load(Ordering::SeqCst));
        assert!(ticks.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test]
    async fn test_regular_task_cancelled_on_shutdown() {
        let manager = TaskManager::current();
        let executor = manager.executor();
        let handle = executor.spawn(std::future::pending());

        manager.shutdown();
        assert!(executor.is_shutdown());
        handle.await.unwrap();
        manager.wait().await;
    }
}
