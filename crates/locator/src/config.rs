//! Lookup configuration.

use std::time::Duration;

use shardline_primitives::{NodeRole, PeerId};

/// Default number of peers seeding each attempt.
pub const DEFAULT_ALPHA: usize = 3;

/// Default number of attempts before falling back to full nodes.
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Default pause between attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(30);

/// Default wall-clock budget of a lookup.
pub const DEFAULT_LOOKUP_BUDGET: Duration = Duration::from_secs(60 * 60);

/// Configuration for [`ChunkLocator`](crate::ChunkLocator).
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    /// Peers nearest the chunk that seed each attempt.
    pub alpha: usize,

    /// Attempts before giving up on the sharded network.
    pub max_attempts: usize,

    /// Pause between attempts.
    pub retry_interval: Duration,

    /// Wall-clock budget shared by every attempt and the fallback.
    pub lookup_budget: Duration,

    /// Exchanges in flight at once within a round. 1 queries sequentially.
    pub max_concurrent_queries: usize,

    /// Local node role.
    pub role: NodeRole,

    /// Whether the node runs on a test network, where lookups are not retried.
    pub testnet: bool,

    /// Archival peers asked directly when the sharded lookup fails.
    pub full_nodes: Vec<PeerId>,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            lookup_budget: DEFAULT_LOOKUP_BUDGET,
            max_concurrent_queries: 1,
            role: NodeRole::Sharding,
            testnet: false,
            full_nodes: Vec::new(),
        }
    }
}

impl LocatorConfig {
    /// Whether failed attempts are retried.
    pub fn retries_enabled(&self) -> bool {
        !self.testnet && self.role.retries_lookups()
    }

    /// Set the seed count.
    pub fn with_alpha(mut self, alpha: usize) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the attempt limit.
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the pause between attempts.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Set the lookup budget.
    pub fn with_lookup_budget(mut self, budget: Duration) -> Self {
        self.lookup_budget = budget;
        self
    }

    /// Set the number of concurrent exchanges per round.
    pub fn with_max_concurrent_queries(mut self, queries: usize) -> Self {
        self.max_concurrent_queries = queries.max(1);
        self
    }

    /// Set the node role.
    pub fn with_role(mut self, role: NodeRole) -> Self {
        self.role = role;
        self
    }

    /// Mark the node as running on a test network.
    pub fn with_testnet(mut self, testnet: bool) -> Self {
        self.testnet = testnet;
        self
    }

    /// Set the fallback full nodes.
    pub fn with_full_nodes(mut self, full_nodes: Vec<PeerId>) -> Self {
        self.full_nodes = full_nodes;
        self
    }
}
