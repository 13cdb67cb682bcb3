use std::time::Duration;

/// Default cap on successful peer samples per sync check.
pub const DEFAULT_MAX_QUERY: usize = 50;

/// Default interval between background sync checks.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for [`HealthMonitor`](crate::HealthMonitor).
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Stop sampling after this many peers answered.
    pub max_query: usize,

    /// Interval between background sync checks.
    pub update_interval: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            max_query: DEFAULT_MAX_QUERY,
            update_interval: DEFAULT_UPDATE_INTERVAL,
        }
    }
}

impl HealthConfig {
    /// Set the sample cap.
    pub fn with_max_query(mut self, max_query: usize) -> Self {
        self.max_query = max_query;
        self
    }

    /// Set the background check interval.
    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }
}
