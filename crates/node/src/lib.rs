//! Shardline node assembly.
//!
//! - [`NodeConfig`]: TOML configuration with defaults for every field
//! - [`RequestHandler`]: answers chunk, header, record and health requests
//!   from peers
//! - [`ShardNode`]: wires the locator, backfill coordinator, health monitor
//!   and routing table over a [`PeerNetwork`](shardline_api::PeerNetwork)
//!   and starts their background loops
//!
//! # Usage
//!
//! ```ignore
//! let config = NodeConfig::load_or_default("shardline.toml")?;
//! let manager = TaskManager::current();
//! let _observability = init_observability(&config, &manager.executor())?;
//!
//! let node = ShardNode::launch(config, chain, store, network, &manager.executor())?;
//! let bodies = node.locator.locate(&key).await?;
//! ```

mod builder;
mod config;
mod handler;

pub use builder::{
    FULL_NODE_ADDR_TTL, NodeBackfill, NodeClient, NodeHandler, NodeLocator, NodeMonitor,
    NodeReplicator, ObservabilityGuard, ShardNode, init_observability,
};
pub use config::{
    BackfillSettings, ConfigError, ExchangeSettings, FullNodeAddr, HealthSettings,
    LocatorSettings, NodeConfig, TopologySettings,
};
pub use handler::{ChunkIngest, RequestHandler, SyncStatus};
