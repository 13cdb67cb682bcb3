//! Chunk lookup on the sharded network.
//!
//! [`ChunkLocator`] runs an iterative nearest-peer search: each attempt asks
//! the peers closest to the chunk, follows their redirects to closer peers,
//! and never asks the same peer twice. Sharding nodes retry on a fixed
//! interval and finally ask the configured full nodes. Every step shares a
//! single [`LookupContext`](shardline_api::LookupContext) budget.

mod config;
mod frontier;
mod locator;

pub use config::{
    DEFAULT_ALPHA, DEFAULT_LOOKUP_BUDGET, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_INTERVAL,
    LocatorConfig,
};
pub use frontier::SearchFrontier;
pub use locator::ChunkLocator;
