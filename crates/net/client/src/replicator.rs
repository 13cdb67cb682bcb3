use std::sync::Arc;

use async_trait::async_trait;
use shardline_api::{AddressBook, PeerNetwork, Replicator, RoutingTable, ShardError, ShardResult};
use shardline_primitives::ChunkRecord;
use tracing::{debug, warn};

use crate::NetworkClient;

/// Pushes `StoreChunk` notifications to the peers nearest a chunk.
pub struct NetworkReplicator<N, B, R> {
    client: Arc<NetworkClient<N, B, R>>,
    replication_factor: usize,
}

impl<N, B, R> std::fmt::Debug for NetworkReplicator<N, B, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkReplicator")
            .field("replication_factor", &self.replication_factor)
            .finish_non_exhaustive()
    }
}

impl<N, B, R> NetworkReplicator<N, B, R> {
    /// Replicate to `replication_factor` nearest peers through `client`.
    pub fn new(client: Arc<NetworkClient<N, B, R>>, replication_factor: usize) -> Self {
        Self {
            client,
            replication_factor,
        }
    }
}

#[async_trait]
impl<N, B, R> Replicator for NetworkReplicator<N, B, R>
where
    N: PeerNetwork,
    B: AddressBook,
    R: RoutingTable,
{
    async fn replicate(&self, record: &ChunkRecord) -> ShardResult<()> {
        let key = record.key();
        let targets = self
            .client
            .routing()
            .nearest_peers(&key.dht_id(), self.replication_factor);

        let mut accepted = 0usize;
        for peer in &targets {
            match self.client.store_chunk(*peer, record).await {
                Ok(true) => accepted += 1,
                Ok(false) => debug!(%peer, chunk = %key, "peer declined replication"),
                Err(err) => warn!(%peer, chunk = %key, %err, "replication request failed"),
            }
        }
        debug!(chunk = %key, accepted, targets = targets.len(), "replication finished");

        if accepted == 0 && !targets.is_empty() {
            return Err(ShardError::NoPeerResponded {
                request: "StoreChunk",
            });
        }
        Ok(())
    }
}
