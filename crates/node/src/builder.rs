//! Component wiring.

use std::{sync::Arc, time::Duration};

use eyre::Result;
use futures::future::BoxFuture;
use libp2p::{PeerId, StreamProtocol};
use metrics_exporter_prometheus::PrometheusHandle;
use shardline_api::{AddressBook, ChainLog, LocalChunkStore, PeerNetwork};
use shardline_backfill::BackfillCoordinator;
use shardline_health::HealthMonitor;
use shardline_locator::ChunkLocator;
use shardline_net_client::{NetworkClient, NetworkReplicator};
use shardline_net_peers::{DEFAULT_PRUNE_INTERVAL, MemoryAddressBook};
use shardline_observability::{WorkerGuard, initialize_logging, install_prometheus_recorder};
use shardline_tasks::TaskExecutor;
use shardline_topology::HealthyRoutingTable;
use tracing::info;

use crate::{NodeConfig, RequestHandler};

/// How long configured full node addresses stay in the address book.
pub const FULL_NODE_ADDR_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Request client of a node on network `N`.
pub type NodeClient<N> = NetworkClient<N, MemoryAddressBook, HealthyRoutingTable>;

/// Chunk locator of a node storing into `S` on network `N`.
pub type NodeLocator<S, N> = ChunkLocator<S, NodeClient<N>, HealthyRoutingTable>;

/// Replicator of a node on network `N`.
pub type NodeReplicator<N> = NetworkReplicator<N, MemoryAddressBook, HealthyRoutingTable>;

/// Backfill coordinator of a node.
pub type NodeBackfill<C, S, N> =
    BackfillCoordinator<C, S, NodeLocator<S, N>, NodeReplicator<N>>;

/// Health monitor of a node.
pub type NodeMonitor<C, N> = HealthMonitor<C, N, NodeClient<N>>;

/// Inbound request handler of a node.
pub type NodeHandler<C, S> = RequestHandler<C, S, HealthyRoutingTable, MemoryAddressBook>;

/// A running node's components.
///
/// Background loops (routing table refresh, address book pruning, and sync
/// sampling on sharding nodes) run on the executor passed to [`ShardNode::launch`] and stop when
/// it shuts down.
pub struct ShardNode<C, S, N> {
    /// Configuration the node was launched with.
    pub config: NodeConfig,
    /// Known peer addresses.
    pub address_book: Arc<MemoryAddressBook>,
    /// Healthy peers used for lookups.
    pub routing: Arc<HealthyRoutingTable>,
    /// Outbound requests.
    pub client: Arc<NodeClient<N>>,
    /// Sync and fall-behind tracking.
    pub monitor: Arc<NodeMonitor<C, N>>,
    /// Chunk lookups.
    pub locator: Arc<NodeLocator<S, N>>,
    /// Chunk storage with history backfill.
    pub backfill: Arc<NodeBackfill<C, S, N>>,
    /// Inbound requests.
    pub handler: Arc<NodeHandler<C, S>>,
}

impl<C, S, N> std::fmt::Debug for ShardNode<C, S, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardNode")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C, S, N> ShardNode<C, S, N>
where
    C: ChainLog + 'static,
    S: LocalChunkStore + 'static,
    N: PeerNetwork,
{
    /// Wire the components over `network` and start the background loops.
    pub fn launch(
        config: NodeConfig,
        chain: Arc<C>,
        store: Arc<S>,
        network: Arc<N>,
        executor: &TaskExecutor,
    ) -> Result<Self> {
        config.validate()?;
        let local = network.local_peer_id();

        let address_book = Arc::new(MemoryAddressBook::new());
        for full in config.full_node_addrs()? {
            address_book.add_addrs(full.peer_id, vec![full.addr], FULL_NODE_ADDR_TTL);
        }

        let routing = HealthyRoutingTable::new(local, config.topology_config());
        let client = Arc::new(NetworkClient::new(
            network.clone(),
            address_book.clone(),
            routing.clone(),
            config.exchange_config(),
        ));
        let monitor = HealthMonitor::new(
            chain.clone(),
            network.clone(),
            client.clone(),
            config.role,
            config.health_config(),
        );
        let locator = Arc::new(ChunkLocator::new(
            store.clone(),
            client.clone(),
            routing.clone(),
            config.locator_config()?,
        ));
        let replicator = Arc::new(NetworkReplicator::new(client.clone(), config.locator.alpha));
        let backfill = Arc::new(BackfillCoordinator::new(
            chain.clone(),
            store.clone(),
            locator.clone(),
            replicator,
            executor.clone(),
            config.backfill_config(),
        ));
        let handler = Arc::new(RequestHandler::new(
            chain,
            store,
            routing.clone(),
            address_book.clone(),
            monitor.clone(),
            backfill.clone(),
            config.role,
            config.locator.alpha,
        ));

        let _refresh = routing
            .clone()
            .spawn_refresh_loop(network, client.clone(), executor);
        let _update = monitor.clone().spawn_update_loop(executor);
        let _prune = address_book
            .clone()
            .spawn_prune_loop(DEFAULT_PRUNE_INTERVAL, executor);

        info!(
            peer = %local,
            role = %config.role,
            testnet = config.testnet,
            full_nodes = config.full_nodes.len(),
            "node launched"
        );

        Ok(Self {
            config,
            address_book,
            routing,
            client,
            monitor,
            locator,
            backfill,
            handler,
        })
    }

    /// Inbound stream callback serving every request through the handler.
    pub fn stream_handler<T>(
        &self,
    ) -> impl Fn(PeerId, StreamProtocol, T) -> BoxFuture<'static, ()> + Send + Sync + use<C, S, N, T>
    where
        T: futures::AsyncRead + futures::AsyncWrite + Unpin + Send + 'static,
    {
        let handler = self.handler.clone();
        move |remote, _protocol, stream| {
            let handler = handler.clone();
            Box::pin(async move { handler.serve_stream(remote, stream).await })
        }
    }
}

/// Keeps logging and metrics export running.
#[derive(Debug)]
#[must_use = "dropping the guard stops the file log writer"]
pub struct ObservabilityGuard {
    /// Flushes the file log writer when dropped.
    pub log_guard: Option<WorkerGuard>,
    /// Handle to the installed Prometheus recorder.
    pub prometheus: Option<PrometheusHandle>,
}

/// Install logging and, when configured, the Prometheus exporter.
///
/// Hold the returned guard until the process exits.
pub fn init_observability(
    config: &NodeConfig,
    executor: &TaskExecutor,
) -> Result<ObservabilityGuard> {
    let log_guard = initialize_logging(&config.logging)?;
    let prometheus = install_prometheus_recorder(&config.metrics, executor)?;
    Ok(ObservabilityGuard {
        log_guard,
        prometheus,
    })
}
