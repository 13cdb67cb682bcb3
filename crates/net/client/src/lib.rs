//! Outbound requests to Shardline peers.
//!
//! [`NetworkClient`] implements the single-peer round trips used by the
//! core protocols:
//!
//! - chunk exchange ([`PeerExchange`](shardline_api::PeerExchange)): body,
//!   or a redirect whose addresses are added to the address book
//! - health queries ([`PeerRequests`](shardline_api::PeerRequests))
//! - header and chunk record range queries across several peers
//!
//! [`NetworkReplicator`] pushes stored chunks to the peers nearest them.

mod client;
mod config;
mod replicator;

pub use client::NetworkClient;
pub use config::{
    DEFAULT_DIAL_TIMEOUT, DEFAULT_READ_DEADLINE, DEFAULT_REDIRECT_TTL, DEFAULT_REQUEST_TIMEOUT,
    ExchangeConfig,
};
pub use replicator::NetworkReplicator;
