//! Inbound request handling.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{AsyncRead, AsyncWrite};
use libp2p::PeerId;
use shardline_api::{
    AddressBook, ChainLog, ChunkSource, LocalChunkStore, PeerDirectory, PeerRequests, Replicator,
    RoutingTable, ShardError, ShardResult,
};
use shardline_backfill::BackfillCoordinator;
use shardline_health::HealthMonitor;
use shardline_net_proto::{
    AddrInfo, P2PRequest, P2PResponse, ResponsePayload, read_request, write_response,
};
use shardline_primitives::{ChunkKey, Header, NodeRole};
use tracing::{debug, trace};

/// Sync state served to peers.
#[async_trait]
pub trait SyncStatus: Send + Sync {
    /// Sample peers and report whether the local chain caught up.
    async fn is_sync(&self) -> ShardResult<bool>;

    /// Whether the last estimated lag is within `max_fall_behind`.
    fn is_healthy(&self, max_fall_behind: i64) -> bool;

    /// The latest local header.
    async fn last_header(&self) -> ShardResult<Header>;
}

#[async_trait]
impl<C, D, Q> SyncStatus for HealthMonitor<C, D, Q>
where
    C: ChainLog + 'static,
    D: PeerDirectory + 'static,
    Q: PeerRequests + 'static,
{
    async fn is_sync(&self) -> ShardResult<bool> {
        HealthMonitor::is_sync(self).await
    }

    fn is_healthy(&self, max_fall_behind: i64) -> bool {
        HealthMonitor::is_healthy(self, max_fall_behind)
    }

    async fn last_header(&self) -> ShardResult<Header> {
        HealthMonitor::last_header(self).await
    }
}

/// Stores chunks peers ask this node to keep.
#[async_trait]
pub trait ChunkIngest: Send + Sync {
    /// Store `key` and its missing history.
    async fn ensure_chunk_and_history(
        &self,
        key: &ChunkKey,
        replicate_out: bool,
    ) -> ShardResult<()>;
}

#[async_trait]
impl<C, S, G, P> ChunkIngest for BackfillCoordinator<C, S, G, P>
where
    C: ChainLog,
    S: LocalChunkStore,
    G: ChunkSource,
    P: Replicator + 'static,
{
    async fn ensure_chunk_and_history(
        &self,
        key: &ChunkKey,
        replicate_out: bool,
    ) -> ShardResult<()> {
        BackfillCoordinator::ensure_chunk_and_history(self, key, replicate_out).await
    }
}

/// Answers requests from remote peers.
///
/// Chunk requests are served from the local store (and, on full nodes, from
/// the chain log), or redirected to routing table peers closer to the chunk
/// than this node.
pub struct RequestHandler<C, S, R, B> {
    chain: Arc<C>,
    store: Arc<S>,
    routing: Arc<R>,
    address_book: Arc<B>,
    sync: Arc<dyn SyncStatus>,
    ingest: Arc<dyn ChunkIngest>,
    role: NodeRole,
    alpha: usize,
}

impl<C, S, R, B> std::fmt::Debug for RequestHandler<C, S, R, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandler")
            .field("role", &self.role)
            .field("alpha", &self.alpha)
            .finish_non_exhaustive()
    }
}

impl<C, S, R, B> RequestHandler<C, S, R, B>
where
    C: ChainLog,
    S: LocalChunkStore,
    R: RoutingTable,
    B: AddressBook,
{
    /// Create a handler for a node with `role`, redirecting to at most
    /// `alpha` closer peers.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chain: Arc<C>,
        store: Arc<S>,
        routing: Arc<R>,
        address_book: Arc<B>,
        sync: Arc<dyn SyncStatus>,
        ingest: Arc<dyn ChunkIngest>,
        role: NodeRole,
        alpha: usize,
    ) -> Self {
        Self {
            chain,
            store,
            routing,
            address_book,
            sync,
            ingest,
            role,
            alpha,
        }
    }

    /// Answer `request` from `remote`.
    pub async fn handle(&self, remote: PeerId, request: P2PRequest) -> P2PResponse {
        let kind = request.kind();
        metrics::counter!("shardline_inbound_requests_total", "request" => kind).increment(1);
        trace!(%remote, request = kind, "handling request");

        let response = match request {
            P2PRequest::FetchChunk(key) => self.fetch_chunk(remote, &key).await,
            P2PRequest::GetChunkRecord(range) => self
                .chain
                .get_chunk_records(range)
                .await
                .map(ResponsePayload::ChunkRecords),
            P2PRequest::GetHeader(range) => self
                .chain
                .get_headers(range)
                .await
                .map(ResponsePayload::Headers),
            P2PRequest::GetLastHeader => self.sync.last_header().await.map(ResponsePayload::Header),
            P2PRequest::IsSync => self
                .sync
                .is_sync()
                .await
                .map(|is_ok| ResponsePayload::Reply { is_ok }),
            P2PRequest::IsHealthy { max_fall_behind } => Ok(ResponsePayload::Reply {
                is_ok: self.sync.is_healthy(max_fall_behind),
            }),
            P2PRequest::StoreChunk(record) => self
                .ingest
                .ensure_chunk_and_history(&record.key(), false)
                .await
                .map(|()| ResponsePayload::Reply { is_ok: true }),
        };

        match response {
            Ok(payload) => P2PResponse::Payload(payload),
            Err(err) => {
                debug!(%remote, request = kind, %err, "request failed");
                P2PResponse::error(err)
            }
        }
    }

    /// Local bodies for `key`, or closer peers with their addresses.
    ///
    /// Full nodes fall back to the chain log before redirecting.
    async fn fetch_chunk(&self, remote: PeerId, key: &ChunkKey) -> ShardResult<ResponsePayload> {
        key.validate()?;
        if let Some(bodies) = self.store.get(key)? {
            trace!(%remote, chunk = %key, "serving chunk");
            return Ok(ResponsePayload::BlockBodies(bodies));
        }
        if self.role.is_full() {
            match self.chain.get_chunk_block_body(key).await {
                Ok(bodies) => {
                    trace!(%remote, chunk = %key, "serving chunk from chain log");
                    return Ok(ResponsePayload::BlockBodies(bodies));
                }
                Err(err) => debug!(%remote, chunk = %key, %err, "chunk missing from chain log"),
            }
        }

        let closer: Vec<AddrInfo> = self
            .routing
            .closer_peers(&key.dht_id(), self.alpha)
            .into_iter()
            .filter(|peer| *peer != remote)
            .map(|peer| AddrInfo {
                peer_id: peer,
                addrs: self.address_book.addrs(&peer),
            })
            .collect();

        if closer.is_empty() {
            return Err(ShardError::NotFound { key: key.clone() });
        }
        trace!(%remote, chunk = %key, closer = closer.len(), "redirecting");
        Ok(ResponsePayload::AddrInfos(closer))
    }

    /// Serve one inbound stream: read a signed request, check it was signed
    /// by `remote`, and write the response before closing the stream.
    pub async fn serve_stream<T>(&self, remote: PeerId, mut stream: T)
    where
        T: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let signed = match read_request(&mut stream).await {
            Ok(signed) => signed,
            Err(err) => {
                debug!(%remote, %err, "failed to read request");
                return;
            }
        };
        let response = match signed.verify(&remote) {
            Ok(request) => self.handle(remote, request).await,
            Err(err) => {
                metrics::counter!("shardline_inbound_rejected_total").increment(1);
                debug!(%remote, %err, "rejected unsigned request");
                P2PResponse::error(err)
            }
        };
        if let Err(err) = write_response(&mut stream, &response).await {
            debug!(%remote, %err, "failed to write response");
        }
    }
}
