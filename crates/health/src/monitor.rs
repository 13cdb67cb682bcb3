use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};

use rand::seq::SliceRandom;
use shardline_api::{ChainLog, PeerDirectory, PeerRequests, ShardError, ShardResult};
use shardline_primitives::{Header, NodeRole};
use shardline_tasks::TaskExecutor;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::HealthConfig;

/// Lag reported before the first successful sample: unknown, treated as
/// maximally behind.
pub const FALL_BEHIND_UNKNOWN: i64 = i64::MAX;

/// Tracks the local node's lag behind its peers.
pub struct HealthMonitor<C, D, Q> {
    chain: Arc<C>,
    directory: Arc<D>,
    requests: Arc<Q>,
    role: NodeRole,
    config: HealthConfig,
    /// Blocks behind the highest sampled peer.
    fall_behind: AtomicI64,
}

impl<C, D, Q> std::fmt::Debug for HealthMonitor<C, D, Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("role", &self.role)
            .field("fall_behind", &self.fall_behind.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<C, D, Q> HealthMonitor<C, D, Q>
where
    C: ChainLog + 'static,
    D: PeerDirectory + 'static,
    Q: PeerRequests + 'static,
{
    /// Create a monitor with an unknown lag.
    pub fn new(
        chain: Arc<C>,
        directory: Arc<D>,
        requests: Arc<Q>,
        role: NodeRole,
        config: HealthConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            chain,
            directory,
            requests,
            role,
            config,
            fall_behind: AtomicI64::new(FALL_BEHIND_UNKNOWN),
        })
    }

    /// Last estimated lag in blocks, [`FALL_BEHIND_UNKNOWN`] before any
    /// successful sample.
    pub fn fall_behind(&self) -> i64 {
        self.fall_behind.load(Ordering::Relaxed)
    }

    /// Sample connected peers and decide whether the local chain has caught up.
    ///
    /// Peers are asked in random order; failed peers are skipped and
    /// sampling stops after [`HealthConfig::max_query`] answers. Returns
    /// [`ShardError::Unknown`] if no peer answered or the local header is
    /// unavailable. On success the stored lag is replaced.
    pub async fn is_sync(&self) -> ShardResult<bool> {
        let mut peers = self.directory.connected_peers();
        peers.shuffle(&mut rand::rng());

        let mut max_height: Option<u64> = None;
        let mut samples = 0usize;
        for peer in peers {
            if samples >= self.config.max_query {
                break;
            }
            match self.requests.last_header(peer).await {
                Ok(header) => {
                    trace!(%peer, height = header.height, "sampled peer height");
                    samples += 1;
                    max_height = Some(max_height.map_or(header.height, |h| h.max(header.height)));
                }
                Err(err) => debug!(%peer, %err, "failed to sample peer height"),
            }
        }
        metrics::counter!("shardline_health_samples_total").increment(samples as u64);

        let Some(max_height) = max_height else {
            debug!("no peer answered the height sample");
            return Err(ShardError::Unknown);
        };

        let local = match self.chain.get_last_header().await {
            Ok(header) => header,
            Err(err) => {
                warn!(%err, "failed to read local header");
                return Err(ShardError::Unknown);
            }
        };

        let fall_behind = i64::try_from(max_height.saturating_sub(local.height)).unwrap_or(i64::MAX);
        self.fall_behind.store(fall_behind, Ordering::Relaxed);
        metrics::gauge!("shardline_fall_behind").set(fall_behind as f64);

        let synced = local.height >= max_height;
        debug!(local = local.height, max_height, samples, fall_behind, synced, "sync check");
        Ok(synced)
    }

    /// Whether the last estimated lag is within `max_fall_behind` blocks.
    ///
    /// Never touches the network.
    pub fn is_healthy(&self, max_fall_behind: i64) -> bool {
        self.fall_behind() <= max_fall_behind
    }

    /// The latest local header; chain log errors are returned unchanged.
    pub async fn last_header(&self) -> ShardResult<Header> {
        self.chain.get_last_header().await
    }

    /// Spawn the background refresh on `executor`.
    ///
    /// Full nodes do not track their lag; `None` is returned for them.
    pub fn spawn_update_loop(self: Arc<Self>, executor: &TaskExecutor) -> Option<JoinHandle<()>> {
        if !self.role.tracks_health() {
            debug!(role = %self.role, "health update loop not started");
            return None;
        }

        let interval = self.config.update_interval;
        Some(executor.spawn_with_graceful_shutdown_signal("health_update", move |shutdown| {
            async move {
                info!(?interval, "health update loop started");
                let mut shutdown = std::pin::pin!(shutdown);
                loop {
                    tokio::select! {
                        guard = &mut shutdown => {
                            debug!("health update loop shutting down");
                            drop(guard);
                            break;
                        }
                        result = self.is_sync() => {
                            if let Err(err) = result {
                                debug!(%err, "background sync check failed");
                            }
                        }
                    }
                    tokio::select! {
                        guard = &mut shutdown => {
                            debug!("health update loop shutting down");
                            drop(guard);
                            break;
                        }
                        _ = tokio::time::sleep(interval) => {}
                    }
                }
            }
        }))
    }
}
