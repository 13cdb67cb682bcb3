use std::{collections::HashMap, sync::Arc};

use futures::{StreamExt, stream};
use parking_lot::RwLock;
use shardline_api::{PeerDirectory, PeerRequests, RoutingTable};
use shardline_primitives::{DhtId, PeerId};
use shardline_tasks::TaskExecutor;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::TopologyConfig;

/// Connected peers that last reported themselves healthy, indexed by DHT id.
pub struct HealthyRoutingTable {
    /// Local peer, never part of the table.
    local: PeerId,

    /// Healthy peers and their DHT ids.
    peers: RwLock<HashMap<PeerId, DhtId>>,

    /// Configuration.
    config: TopologyConfig,
}

impl std::fmt::Debug for HealthyRoutingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthyRoutingTable")
            .field("local", &self.local)
            .field("peers", &self.peers.read().len())
            .finish_non_exhaustive()
    }
}

impl HealthyRoutingTable {
    /// Create an empty table for the node `local`.
    pub fn new(local: PeerId, config: TopologyConfig) -> Arc<Self> {
        Arc::new(Self {
            local,
            peers: RwLock::new(HashMap::new()),
            config,
        })
    }

    /// Table configuration.
    pub fn config(&self) -> &TopologyConfig {
        &self.config
    }

    /// Insert a peer. Returns false for the local peer or a peer already present.
    pub fn add_peer(&self, peer: PeerId) -> bool {
        if peer == self.local {
            return false;
        }
        self.peers
            .write()
            .insert(peer, DhtId::from_peer(&peer))
            .is_none()
    }

    /// Whether `peer` is in the table.
    pub fn contains(&self, peer: &PeerId) -> bool {
        self.peers.read().contains_key(peer)
    }

    /// Number of peers in the table.
    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }

    /// Probe every connected peer and replace the table with those that
    /// report themselves healthy. Returns the new table size.
    ///
    /// Peers that fail to answer are left out.
    pub async fn refresh<D, Q>(&self, directory: &D, requests: &Q) -> usize
    where
        D: PeerDirectory + ?Sized,
        Q: PeerRequests + ?Sized,
    {
        let threshold = self.config.healthy_fall_behind;
        let candidates: Vec<PeerId> = directory
            .connected_peers()
            .into_iter()
            .filter(|peer| *peer != self.local)
            .collect();
        let probed = candidates.len();

        let healthy: HashMap<PeerId, DhtId> = stream::iter(candidates)
            .map(|peer| async move {
                match requests.is_healthy(peer, threshold).await {
                    Ok(true) => Some(peer),
                    Ok(false) => {
                        trace!(%peer, "peer reports itself unhealthy");
                        None
                    }
                    Err(err) => {
                        debug!(%peer, %err, "health probe failed");
                        None
                    }
                }
            })
            .buffer_unordered(self.config.max_concurrent_probes.max(1))
            .filter_map(std::future::ready)
            .map(|peer| (peer, DhtId::from_peer(&peer)))
            .collect()
            .await;

        let size = healthy.len();
        *self.peers.write() = healthy;
        metrics::gauge!("shardline_routing_table_peers").set(size as f64);
        debug!(probed, healthy = size, "routing table refreshed");
        size
    }

    /// Spawn the refresh loop on `executor`.
    ///
    /// The table is refreshed immediately and then every
    /// [`TopologyConfig::refresh_interval`] until shutdown.
    pub fn spawn_refresh_loop<D, Q>(
        self: Arc<Self>,
        directory: Arc<D>,
        requests: Arc<Q>,
        executor: &TaskExecutor,
    ) -> JoinHandle<()>
    where
        D: PeerDirectory + ?Sized + 'static,
        Q: PeerRequests + ?Sized + 'static,
    {
        let interval = self.config.refresh_interval;
        executor.spawn_with_graceful_shutdown_signal("routing_refresh", move |shutdown| {
            async move {
                info!(?interval, "routing table refresh loop started");
                let mut shutdown = std::pin::pin!(shutdown);
                loop {
                    tokio::select! {
                        guard = &mut shutdown => {
                            debug!("routing table refresh loop shutting down");
                            drop(guard);
                            break;
                        }
                        _ = self.refresh(directory.as_ref(), requests.as_ref()) => {}
                    }
                    tokio::select! {
                        guard = &mut shutdown => {
                            debug!("routing table refresh loop shutting down");
                            drop(guard);
                            break;
                        }
                        _ = tokio::time::sleep(interval) => {
                            trace!("routing table refresh woken by timer");
                        }
                    }
                }
            }
        })
    }
}

impl RoutingTable for HealthyRoutingTable {
    fn local_peer_id(&self) -> PeerId {
        self.local
    }

    fn nearest_peers(&self, target: &DhtId, count: usize) -> Vec<PeerId> {
        let mut peers: Vec<_> = self
            .peers
            .read()
            .iter()
            .map(|(peer, id)| (id.distance(target), *peer))
            .collect();
        peers.sort_unstable();
        peers.into_iter().take(count).map(|(_, peer)| peer).collect()
    }

    fn peers(&self) -> Vec<PeerId> {
        self.peers.read().keys().copied().collect()
    }
}
