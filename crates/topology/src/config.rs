//! Routing table configuration.

use std::time::Duration;

/// Default interval between health refreshes of the routing table.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Default largest lag, in blocks, a peer may report and still be routed to.
pub const DEFAULT_HEALTHY_FALL_BEHIND: i64 = 50;

/// Default number of peers probed concurrently during a refresh.
pub const DEFAULT_MAX_CONCURRENT_PROBES: usize = 16;

/// Configuration for [`HealthyRoutingTable`](crate::HealthyRoutingTable).
#[derive(Debug, Clone)]
pub struct TopologyConfig {
    /// Interval between refreshes.
    pub refresh_interval: Duration,

    /// Peers reporting a larger lag are dropped from the table.
    pub healthy_fall_behind: i64,

    /// Concurrent health probes during a refresh.
    pub max_concurrent_probes: usize,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            healthy_fall_behind: DEFAULT_HEALTHY_FALL_BEHIND,
            max_concurrent_probes: DEFAULT_MAX_CONCURRENT_PROBES,
        }
    }
}

impl TopologyConfig {
    /// Set the refresh interval.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Set the healthy lag threshold.
    pub fn with_healthy_fall_behind(mut self, blocks: i64) -> Self {
        self.healthy_fall_behind = blocks;
        self
    }

    /// Set the number of concurrent probes.
    pub fn with_max_concurrent_probes(mut self, probes: usize) -> Self {
        self.max_concurrent_probes = probes.max(1);
        self
    }
}
