//! Abstractions shared by the Shardline protocol crates.
//!
//! The core protocols (locator, backfill, health) are written against the
//! traits here rather than concrete implementations:
//!
//! - [`ChainLog`] and [`LocalChunkStore`] are collaborators owned by the host
//!   node.
//! - [`PeerNetwork`] is the transport substrate.
//! - [`PeerExchange`], [`PeerRequests`] and [`Replicator`] are request
//!   clients built on top of the substrate.
//! - [`RoutingTable`], [`PeerDirectory`] and [`AddressBook`] describe the
//!   peers the node knows.

mod context;
mod error;
mod network;
mod peers;
mod storage;

pub use context::{Interrupted, LookupContext, deadline_after};
pub use error::{ExchangeError, ShardError, ShardResult};
pub use network::PeerNetwork;
pub use peers::{
    AddressBook, ExchangeOutcome, PeerDirectory, PeerExchange, PeerRequests, Replicator,
    RoutingTable,
};
pub use storage::{ChainLog, ChunkSource, LocalChunkStore};
