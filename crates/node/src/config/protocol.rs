//! Lookup, backfill and health settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use shardline_backfill::{BackfillConfig, DEFAULT_HISTORY_DEPTH};
use shardline_health::{DEFAULT_MAX_QUERY, DEFAULT_UPDATE_INTERVAL, HealthConfig};
use shardline_locator::{
    DEFAULT_ALPHA, DEFAULT_LOOKUP_BUDGET, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_INTERVAL,
};
use shardline_topology::{DEFAULT_HEALTHY_FALL_BEHIND, DEFAULT_REFRESH_INTERVAL, TopologyConfig};

/// Chunk lookup settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorSettings {
    /// Peers nearest the chunk asked first.
    pub alpha: usize,
    /// Lookup attempts before asking full nodes.
    pub max_attempts: usize,
    /// Seconds between attempts.
    pub retry_interval_secs: u64,
    /// Wall-clock budget of a lookup, in seconds.
    pub lookup_budget_secs: u64,
    /// Exchanges in flight at once per round.
    pub max_concurrent_queries: usize,
}

impl Default for LocatorSettings {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_interval_secs: DEFAULT_RETRY_INTERVAL.as_secs(),
            lookup_budget_secs: DEFAULT_LOOKUP_BUDGET.as_secs(),
            max_concurrent_queries: 1,
        }
    }
}

/// Health sampling settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    /// Successful peer samples per sync check.
    pub max_query: usize,
    /// Seconds between background sync checks.
    pub update_interval_secs: u64,
    /// Largest lag a peer may report and still be routed to.
    pub healthy_fall_behind: i64,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            max_query: DEFAULT_MAX_QUERY,
            update_interval_secs: DEFAULT_UPDATE_INTERVAL.as_secs(),
            healthy_fall_behind: DEFAULT_HEALTHY_FALL_BEHIND,
        }
    }
}

impl HealthSettings {
    pub(crate) fn to_config(&self) -> HealthConfig {
        HealthConfig::default()
            .with_max_query(self.max_query)
            .with_update_interval(Duration::from_secs(self.update_interval_secs))
    }
}

/// Routing table settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologySettings {
    /// Seconds between routing table refreshes.
    pub refresh_interval_secs: u64,
}

impl Default for TopologySettings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL.as_secs(),
        }
    }
}

impl TopologySettings {
    pub(crate) fn to_config(&self, healthy_fall_behind: i64) -> TopologyConfig {
        TopologyConfig::default()
            .with_refresh_interval(Duration::from_secs(self.refresh_interval_secs))
            .with_healthy_fall_behind(healthy_fall_behind)
    }
}

/// History backfill settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackfillSettings {
    /// Preceding chunks checked before a chunk is stored.
    pub depth: u64,
}

impl Default for BackfillSettings {
    fn default() -> Self {
        Self {
            depth: DEFAULT_HISTORY_DEPTH,
        }
    }
}

impl BackfillSettings {
    pub(crate) fn to_config(&self) -> BackfillConfig {
        BackfillConfig::default().with_depth(self.depth)
    }
}
