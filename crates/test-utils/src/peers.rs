//! Mock peer directories, routing tables and request clients.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use parking_lot::Mutex;
use shardline_api::{
    ExchangeError, PeerDirectory, PeerRequests, Replicator, RoutingTable, ShardError, ShardResult,
};
use shardline_primitives::{ChunkRecord, DhtId, Header, PeerId};

/// Fixed set of connected peers.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    peers: Vec<PeerId>,
}

impl StaticDirectory {
    /// Directory reporting `peers` as connected.
    pub fn new(peers: Vec<PeerId>) -> Self {
        Self { peers }
    }
}

impl PeerDirectory for StaticDirectory {
    fn connected_peers(&self) -> Vec<PeerId> {
        self.peers.clone()
    }
}

/// Routing table over a fixed peer list, ordered by DHT distance.
#[derive(Debug, Clone)]
pub struct StaticRoutingTable {
    local: PeerId,
    peers: Vec<PeerId>,
}

impl StaticRoutingTable {
    /// Table for `local` holding `peers`.
    pub fn new(local: PeerId, peers: Vec<PeerId>) -> Self {
        Self { local, peers }
    }
}

impl RoutingTable for StaticRoutingTable {
    fn local_peer_id(&self) -> PeerId {
        self.local
    }

    fn nearest_peers(&self, target: &DhtId, count: usize) -> Vec<PeerId> {
        let mut peers = self.peers.clone();
        peers.sort_by_key(|peer| DhtId::from_peer(peer).distance(target));
        peers.truncate(count);
        peers
    }

    fn peers(&self) -> Vec<PeerId> {
        self.peers.clone()
    }
}

/// Answers header and health requests from fixed tables. Peers missing
/// from a table fail with a dial error.
#[derive(Debug, Default)]
pub struct MockPeerRequests {
    heights: HashMap<PeerId, u64>,
    health: HashMap<PeerId, bool>,
    header_requests: AtomicUsize,
    health_probes: AtomicUsize,
}

impl MockPeerRequests {
    /// No peer answers anything.
    pub fn new() -> Self {
        Self::default()
    }

    /// `peer` reports `height` as its latest header.
    pub fn with_height(mut self, peer: PeerId, height: u64) -> Self {
        self.heights.insert(peer, height);
        self
    }

    /// `peer` answers health probes with `healthy`.
    pub fn with_health(mut self, peer: PeerId, healthy: bool) -> Self {
        self.health.insert(peer, healthy);
        self
    }

    /// Number of header requests made.
    pub fn header_requests(&self) -> usize {
        self.header_requests.load(Ordering::SeqCst)
    }

    /// Number of health probes made.
    pub fn health_probes(&self) -> usize {
        self.health_probes.load(Ordering::SeqCst)
    }
}

fn unreachable_peer(peer: PeerId) -> ExchangeError {
    ExchangeError::Dial {
        peer,
        reason: "connection refused".to_string(),
    }
}

#[async_trait]
impl PeerRequests for MockPeerRequests {
    async fn last_header(&self, peer: PeerId) -> Result<Header, ExchangeError> {
        self.header_requests.fetch_add(1, Ordering::SeqCst);
        self.heights
            .get(&peer)
            .map(|height| Header::at_height(*height))
            .ok_or_else(|| unreachable_peer(peer))
    }

    async fn is_healthy(&self, peer: PeerId, _max_fall_behind: i64) -> Result<bool, ExchangeError> {
        self.health_probes.fetch_add(1, Ordering::SeqCst);
        self.health
            .get(&peer)
            .copied()
            .ok_or_else(|| unreachable_peer(peer))
    }
}

/// Records replication requests.
#[derive(Debug, Default)]
pub struct RecordingReplicator {
    replicated: Mutex<Vec<ChunkRecord>>,
    fail: bool,
}

impl RecordingReplicator {
    /// Replicator accepting every request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replicator failing every request after recording it.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Records replicated so far, in call order.
    pub fn replicated(&self) -> Vec<ChunkRecord> {
        self.replicated.lock().clone()
    }
}

#[async_trait]
impl Replicator for RecordingReplicator {
    async fn replicate(&self, record: &ChunkRecord) -> ShardResult<()> {
        self.replicated.lock().push(record.clone());
        if self.fail {
            return Err(ShardError::NoPeerResponded {
                request: "StoreChunk",
            });
        }
        Ok(())
    }
}
