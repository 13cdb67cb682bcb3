//! Health-aware routing for chunk lookups.
//!
//! The [`HealthyRoutingTable`] holds the connected peers that recently
//! reported themselves as keeping up with the chain. Lookups are seeded
//! from it, so lagging peers, which are unlikely to hold recent chunks,
//! are never asked first.
//!
//! # Usage
//!
//! ```ignore
//! let table = HealthyRoutingTable::new(local_peer_id, TopologyConfig::default());
//! table.clone().spawn_refresh_loop(network.clone(), client.clone(), &executor);
//!
//! let seeds = table.nearest_peers(&key.dht_id(), 3);
//! ```

mod config;
mod table;

pub use config::{
    DEFAULT_HEALTHY_FALL_BEHIND, DEFAULT_MAX_CONCURRENT_PROBES, DEFAULT_REFRESH_INTERVAL,
    TopologyConfig,
};
pub use table::HealthyRoutingTable;
