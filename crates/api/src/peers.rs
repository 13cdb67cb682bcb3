//! Peer-facing abstractions: routing, addressing and request clients.

use std::time::Duration;

use async_trait::async_trait;
use auto_impl::auto_impl;
use libp2p::{Multiaddr, PeerId};
use shardline_primitives::{BlockBodies, ChunkKey, ChunkRecord, DhtId, Header};

use crate::{ExchangeError, LookupContext, ShardResult};

/// Result of asking one peer for a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The peer holds the chunk.
    Body(BlockBodies),
    /// The peer does not hold it and knows these closer peers.
    Redirect(Vec<PeerId>),
}

/// One chunk request/response round trip with a single peer.
///
/// Implementations do not retry.
#[async_trait]
#[auto_impl(&, Arc)]
pub trait PeerExchange: Send + Sync {
    /// Ask `peer` for `key`, bounded by `ctx`.
    async fn exchange(
        &self,
        ctx: &LookupContext,
        peer: PeerId,
        key: &ChunkKey,
    ) -> Result<ExchangeOutcome, ExchangeError>;
}

/// Health-related queries to a single peer.
#[async_trait]
#[auto_impl(&, Arc)]
pub trait PeerRequests: Send + Sync {
    /// The peer's latest header.
    async fn last_header(&self, peer: PeerId) -> Result<Header, ExchangeError>;

    /// Whether the peer reports itself within `max_fall_behind` blocks of
    /// the network.
    async fn is_healthy(&self, peer: PeerId, max_fall_behind: i64) -> Result<bool, ExchangeError>;
}

/// Pushes a stored chunk to the peers responsible for it.
#[async_trait]
#[auto_impl(&, Arc)]
pub trait Replicator: Send + Sync {
    /// Notify peers that `record` should be stored.
    async fn replicate(&self, record: &ChunkRecord) -> ShardResult<()>;
}

/// Currently connected peers.
#[auto_impl(&, Arc)]
pub trait PeerDirectory: Send + Sync {
    /// Snapshot of connected peers.
    fn connected_peers(&self) -> Vec<PeerId>;
}

/// Peers usable for lookups, ordered by DHT distance.
#[auto_impl(&, Arc)]
pub trait RoutingTable: Send + Sync {
    /// The local node's peer id.
    fn local_peer_id(&self) -> PeerId;

    /// Up to `count` peers nearest `target`, nearest first.
    fn nearest_peers(&self, target: &DhtId, count: usize) -> Vec<PeerId>;

    /// Every peer currently in the table.
    fn peers(&self) -> Vec<PeerId>;

    /// Up to `count` peers strictly closer to `target` than the local node,
    /// nearest first.
    fn closer_peers(&self, target: &DhtId, count: usize) -> Vec<PeerId> {
        let local_distance = DhtId::from_peer(&self.local_peer_id()).distance(target);
        self.nearest_peers(target, count)
            .into_iter()
            .take_while(|peer| DhtId::from_peer(peer).distance(target) < local_distance)
            .collect()
    }
}

/// Known addresses of remote peers, each with an expiry.
#[auto_impl(&, Arc)]
pub trait AddressBook: Send + Sync {
    /// Record addresses for `peer`, valid for `ttl`.
    ///
    /// Existing entries keep the later of the two expiries.
    fn add_addrs(&self, peer: PeerId, addrs: Vec<Multiaddr>, ttl: Duration);

    /// Unexpired addresses for `peer`.
    fn addrs(&self, peer: &PeerId) -> Vec<Multiaddr>;
}
