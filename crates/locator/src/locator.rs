use std::sync::Arc;

use async_trait::async_trait;
use futures::{StreamExt, stream};
use shardline_api::{
    ChunkSource, ExchangeOutcome, LocalChunkStore, LookupContext, PeerExchange, RoutingTable,
    ShardError, ShardResult,
};
use shardline_primitives::{BlockBodies, ChunkKey, PeerId};
use tracing::{debug, info, trace, warn};

use crate::{LocatorConfig, SearchFrontier};

/// What one round of exchanges produced.
enum RoundOutcome {
    Found { peer: PeerId, bodies: BlockBodies },
    Closer(Vec<PeerId>),
}

/// Finds chunk bodies on the sharded network.
///
/// Each attempt starts from the `alpha` peers nearest the chunk and follows
/// redirects round by round until a peer returns the bodies or no new peer
/// is left. Sharding nodes retry failed attempts; when every attempt fails
/// the configured full nodes are asked directly.
pub struct ChunkLocator<S, E, R> {
    store: Arc<S>,
    exchange: Arc<E>,
    routing: Arc<R>,
    config: LocatorConfig,
}

impl<S, E, R> std::fmt::Debug for ChunkLocator<S, E, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkLocator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S, E, R> ChunkLocator<S, E, R>
where
    S: LocalChunkStore,
    E: PeerExchange,
    R: RoutingTable,
{
    /// Create a locator.
    pub fn new(store: Arc<S>, exchange: Arc<E>, routing: Arc<R>, config: LocatorConfig) -> Self {
        Self {
            store,
            exchange,
            routing,
            config,
        }
    }

    /// The locator configuration.
    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Find `key` on the network within the configured lookup budget.
    pub async fn locate(&self, key: &ChunkKey) -> ShardResult<BlockBodies> {
        let ctx = LookupContext::with_budget(self.config.lookup_budget);
        self.locate_with_context(&ctx, key).await
    }

    /// Find `key` on the network, bounded by `ctx`.
    ///
    /// Returns [`ShardError::NotFound`] when every attempt and every full
    /// node failed, and [`ShardError::Cancelled`] when `ctx` was cancelled.
    pub async fn locate_with_context(
        &self,
        ctx: &LookupContext,
        key: &ChunkKey,
    ) -> ShardResult<BlockBodies> {
        key.validate()?;
        metrics::counter!("shardline_lookups_total").increment(1);

        let mut attempt = 0;
        loop {
            attempt += 1;
            if let Some((peer, bodies)) = self.attempt_once(ctx, key).await {
                metrics::counter!("shardline_lookups_found_total", "source" => "network")
                    .increment(1);
                metrics::histogram!("shardline_lookup_attempts").record(attempt as f64);
                debug!(chunk = %key, %peer, attempt, "chunk found");
                return Ok(bodies);
            }

            if ctx.is_done() || !self.config.retries_enabled() || attempt >= self.config.max_attempts
            {
                break;
            }
            warn!(chunk = %key, attempt, "chunk not found, retrying");
            if ctx.sleep(self.config.retry_interval).await.is_err() {
                break;
            }
        }

        if !self.config.role.is_full()
            && let Some((peer, bodies)) = self.query_full_nodes(ctx, key).await
        {
            metrics::counter!("shardline_lookups_found_total", "source" => "full_node")
                .increment(1);
            info!(chunk = %key, %peer, "chunk found on full node");
            return Ok(bodies);
        }

        if ctx.token().is_cancelled() {
            return Err(ShardError::Cancelled);
        }
        metrics::counter!("shardline_lookups_not_found_total").increment(1);
        warn!(chunk = %key, attempts = attempt, "chunk not found");
        Err(ShardError::NotFound { key: key.clone() })
    }

    /// Run a single iterative lookup for `key`.
    ///
    /// Returns the answering peer and its bodies, or `None` when the
    /// frontier ran dry or `ctx` ended. No peer is asked twice.
    pub async fn attempt_once(
        &self,
        ctx: &LookupContext,
        key: &ChunkKey,
    ) -> Option<(PeerId, BlockBodies)> {
        let seeds = self.routing.nearest_peers(&key.dht_id(), self.config.alpha);
        if seeds.is_empty() {
            warn!(chunk = %key, "no healthy peers to query");
        }
        let mut frontier = SearchFrontier::new(self.routing.local_peer_id(), seeds);

        let mut round = 0usize;
        while !frontier.is_exhausted() {
            if ctx.is_done() {
                debug!(chunk = %key, round, "lookup interrupted");
                return None;
            }
            round += 1;
            let peers = frontier.take_round();
            trace!(chunk = %key, round, peers = peers.len(), "querying round");
            match self.query_round(ctx, key, peers).await {
                RoundOutcome::Found { peer, bodies } => return Some((peer, bodies)),
                RoundOutcome::Closer(closer) => frontier.extend(closer),
            }
        }
        trace!(chunk = %key, rounds = round, queried = frontier.queried_len(), "frontier exhausted");
        None
    }

    async fn query_round(
        &self,
        ctx: &LookupContext,
        key: &ChunkKey,
        peers: Vec<PeerId>,
    ) -> RoundOutcome {
        let mut closer = Vec::new();

        if self.config.max_concurrent_queries <= 1 {
            for peer in peers {
                match self.query_peer(ctx, peer, key).await {
                    Some(ExchangeOutcome::Body(bodies)) => {
                        return RoundOutcome::Found { peer, bodies };
                    }
                    Some(ExchangeOutcome::Redirect(peers)) => closer.extend(peers),
                    None => {}
                }
            }
            return RoundOutcome::Closer(closer);
        }

        // Dropping the stream on the first body cancels the exchanges still in flight.
        let mut answers = stream::iter(peers)
            .map(|peer| async move { (peer, self.query_peer(ctx, peer, key).await) })
            .buffer_unordered(self.config.max_concurrent_queries);
        while let Some((peer, outcome)) = answers.next().await {
            match outcome {
                Some(ExchangeOutcome::Body(bodies)) => return RoundOutcome::Found { peer, bodies },
                Some(ExchangeOutcome::Redirect(peers)) => closer.extend(peers),
                None => {}
            }
        }
        RoundOutcome::Closer(closer)
    }

    async fn query_peer(
        &self,
        ctx: &LookupContext,
        peer: PeerId,
        key: &ChunkKey,
    ) -> Option<ExchangeOutcome> {
        match self.exchange.exchange(ctx, peer, key).await {
            Ok(outcome) => {
                if let ExchangeOutcome::Redirect(peers) = &outcome {
                    trace!(chunk = %key, %peer, closer = peers.len(), "redirected");
                }
                Some(outcome)
            }
            Err(err) => {
                metrics::counter!("shardline_lookup_exchange_failures_total").increment(1);
                debug!(chunk = %key, %peer, %err, "exchange failed");
                None
            }
        }
    }

    async fn query_full_nodes(
        &self,
        ctx: &LookupContext,
        key: &ChunkKey,
    ) -> Option<(PeerId, BlockBodies)> {
        for &peer in &self.config.full_nodes {
            if ctx.is_done() {
                return None;
            }
            match self.exchange.exchange(ctx, peer, key).await {
                Ok(ExchangeOutcome::Body(bodies)) => return Some((peer, bodies)),
                Ok(ExchangeOutcome::Redirect(_)) => {
                    debug!(chunk = %key, %peer, "full node does not hold chunk");
                }
                Err(err) => debug!(chunk = %key, %peer, %err, "full node request failed"),
            }
        }
        None
    }
}

#[async_trait]
impl<S, E, R> ChunkSource for ChunkLocator<S, E, R>
where
    S: LocalChunkStore,
    E: PeerExchange,
    R: RoutingTable,
{
    async fn get_chunk(&self, key: &ChunkKey, query_remote: bool) -> ShardResult<BlockBodies> {
        key.validate()?;
        if let Some(bodies) = self.store.get(key)? {
            trace!(chunk = %key, "chunk served locally");
            return Ok(bodies);
        }
        if !query_remote {
            return Err(ShardError::NotFound { key: key.clone() });
        }
        self.locate(key).await
    }
}
