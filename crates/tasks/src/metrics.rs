//! Task executor metrics.

use core::fmt;
use metrics::Counter;

/// Counters for tasks spawned through a [`TaskExecutor`](crate::TaskExecutor).
#[derive(Clone, Debug)]
pub(crate) struct TaskExecutorMetrics {
    /// Number of spawned regular tasks
    regular_tasks_total: Counter,
    /// Number of finished regular tasks
    pub(crate) finished_regular_tasks_total: Counter,
    /// Number of spawned tasks that observe the shutdown signal
    graceful_tasks_total: Counter,
    /// Number of finished tasks that observe the shutdown signal
    pub(crate) finished_graceful_tasks_total: Counter,
}

impl Default for TaskExecutorMetrics {
    fn default() -> Self {
        Self {
            regular_tasks_total: metrics::counter!("executor.spawn.regular_tasks_total"),
            finished_regular_tasks_total: metrics::counter!(
                "executor.spawn.finished_regular_tasks_total"
            ),
            graceful_tasks_total: metrics::counter!("executor.spawn.graceful_tasks_total"),
            finished_graceful_tasks_total: metrics::counter!(
                "executor.spawn.finished_graceful_tasks_total"
            ),
        }
    }
}

impl TaskExecutorMetrics {
    pub(crate) fn inc_regular_tasks(&self) {
        self.regular_tasks_total.increment(1);
    }

    pub(crate) fn inc_graceful_tasks(&self) {
        self.graceful_tasks_total.increment(1);
    }
}

/// Increments a counter when dropped, so finished counts include panicked
/// and aborted tasks.
pub(crate) struct IncCounterOnDrop(Counter);

impl fmt::Debug for IncCounterOnDrop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IncCounterOnDrop").finish()
    }
}

impl IncCounterOnDrop {
    pub(crate) const fn new(counter: Counter) -> Self {
        Self(counter)
    }
}

impl Drop for IncCounterOnDrop {
    fn drop(&mut self) {
        self.0.increment(1);
    }
}
