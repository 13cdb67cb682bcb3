//! Test utilities for shardline crates.
//!
//! - [`MockChainLog`]: chain log over generated chunk records
//! - [`ScriptedExchange`]: per-peer scripted chunk exchange
//! - [`MockPeerRequests`], [`StaticDirectory`], [`StaticRoutingTable`]:
//!   fixed peer sets for health and routing tests
//! - [`RecordingReplicator`]: captures replication requests
//! - [`SimHub`], [`SimNetwork`]: in-process stream substrate

mod chain;
mod exchange;
mod network;
mod peers;

pub use chain::{MockChainLog, TEST_CHUNK_LEN, bodies_for, chunk_key, chunk_record};
pub use exchange::{PeerBehavior, ScriptedExchange};
pub use network::{InboundHandler, SimHub, SimNetwork, SimStream};
pub use peers::{MockPeerRequests, RecordingReplicator, StaticDirectory, StaticRoutingTable};
