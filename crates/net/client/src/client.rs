//! Request client over the peer substrate.

use std::sync::Arc;

use async_trait::async_trait;
use libp2p::PeerId;
use shardline_api::{
    AddressBook, ExchangeError, ExchangeOutcome, Interrupted, LookupContext, PeerExchange,
    PeerNetwork, PeerRequests, RoutingTable, ShardError, ShardResult,
};
use shardline_net_proto::{
    P2PRequest, P2PResponse, ProtoError, ResponsePayload, SignedRequest, read_response,
    write_request,
};
use shardline_primitives::{ChunkKey, ChunkRecord, Header, HeightRange};
use tracing::{debug, trace};

use crate::ExchangeConfig;

/// Sends signed requests to single peers and decodes their responses.
///
/// Each request opens its own stream. Failures are returned to the caller
/// and never retried here.
pub struct NetworkClient<N, B, R> {
    network: Arc<N>,
    address_book: Arc<B>,
    routing: Arc<R>,
    config: ExchangeConfig,
}

impl<N, B, R> std::fmt::Debug for NetworkClient<N, B, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<N, B, R> NetworkClient<N, B, R>
where
    N: PeerNetwork,
    B: AddressBook,
    R: RoutingTable,
{
    /// Create a client over `network`.
    pub fn new(network: Arc<N>, address_book: Arc<B>, routing: Arc<R>, config: ExchangeConfig) -> Self {
        Self {
            network,
            address_book,
            routing,
            config,
        }
    }

    /// Client configuration.
    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// The routing table used for range queries.
    pub fn routing(&self) -> &Arc<R> {
        &self.routing
    }

    /// Send `request` to `peer` and return the response payload.
    ///
    /// Opening the stream is bounded by the dial timeout, writing the request
    /// and reading the response by the read deadline, both capped by `ctx`.
    pub async fn request(
        &self,
        ctx: &LookupContext,
        peer: PeerId,
        request: &P2PRequest,
    ) -> Result<ResponsePayload, ExchangeError> {
        let kind = request.kind();
        metrics::counter!("shardline_requests_total", "request" => kind).increment(1);

        let result = self.request_inner(ctx, peer, request).await;
        if let Err(err) = &result {
            metrics::counter!("shardline_request_failures_total", "request" => kind).increment(1);
            debug!(%peer, request = kind, %err, "request failed");
        }
        result
    }

    async fn request_inner(
        &self,
        ctx: &LookupContext,
        peer: PeerId,
        request: &P2PRequest,
    ) -> Result<ResponsePayload, ExchangeError> {
        let signed = SignedRequest::sign(request, self.network.keypair()).map_err(proto_error)?;

        let dial_ctx = ctx.child(self.config.dial_timeout);
        let addrs = self.address_book.addrs(&peer);
        let mut stream = match dial_ctx
            .run(self.network.open_stream(peer, addrs, request.protocol()))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => {
                return Err(ExchangeError::Dial {
                    peer,
                    reason: err.to_string(),
                });
            }
            Err(Interrupted::DeadlineExceeded) if !ctx.is_done() => {
                return Err(ExchangeError::DialTimeout { peer });
            }
            Err(interrupted) => return Err(interrupted.into()),
        };
        trace!(%peer, request = request.kind(), "stream open");

        let read_ctx = ctx.child(self.config.read_deadline);
        let response = match read_ctx
            .run(async {
                write_request(&mut stream, signed).await?;
                read_response(&mut stream).await
            })
            .await
        {
            Ok(response) => response.map_err(proto_error)?,
            Err(Interrupted::DeadlineExceeded) if !ctx.is_done() => {
                return Err(ExchangeError::ReadTimeout { peer });
            }
            Err(interrupted) => return Err(interrupted.into()),
        };

        match response {
            P2PResponse::Payload(payload) => Ok(payload),
            P2PResponse::Error(message) => Err(ExchangeError::Remote { message }),
        }
    }

    /// Send `request` bounded only by the per-request timeout.
    async fn simple_request(
        &self,
        peer: PeerId,
        request: &P2PRequest,
    ) -> Result<ResponsePayload, ExchangeError> {
        let ctx = LookupContext::with_budget(self.config.request_timeout);
        self.request(&ctx, peer, request).await
    }

    /// Headers in `range` from the first peer that answers, trying `preferred`
    /// before the routing table.
    pub async fn headers_from_peers(
        &self,
        range: HeightRange,
        preferred: &[PeerId],
    ) -> ShardResult<Vec<Header>> {
        let request = P2PRequest::GetHeader(range);
        for peer in self.query_order(preferred) {
            match self.simple_request(peer, &request).await {
                Ok(ResponsePayload::Headers(headers)) => return Ok(headers),
                Ok(_) => debug!(%peer, "unexpected response to header request"),
                Err(_) => continue,
            }
        }
        Err(ShardError::NoPeerResponded {
            request: request.kind(),
        })
    }

    /// Chunk records for chunk indices in `range` from the first peer that
    /// answers, trying `preferred` before the routing table.
    pub async fn chunk_records_from_peers(
        &self,
        range: HeightRange,
        preferred: &[PeerId],
    ) -> ShardResult<Vec<ChunkRecord>> {
        let request = P2PRequest::GetChunkRecord(range);
        for peer in self.query_order(preferred) {
            match self.simple_request(peer, &request).await {
                Ok(ResponsePayload::ChunkRecords(records)) => return Ok(records),
                Ok(_) => debug!(%peer, "unexpected response to chunk record request"),
                Err(_) => continue,
            }
        }
        Err(ShardError::NoPeerResponded {
            request: request.kind(),
        })
    }

    /// Ask `peer` to store `record` and its missing history.
    pub async fn store_chunk(&self, peer: PeerId, record: &ChunkRecord) -> Result<bool, ExchangeError> {
        match self
            .simple_request(peer, &P2PRequest::StoreChunk(record.clone()))
            .await?
        {
            ResponsePayload::Reply { is_ok } => Ok(is_ok),
            _ => Err(ExchangeError::UnexpectedResponse { expected: "Reply" }),
        }
    }

    /// Ask `peer` whether it considers itself synced.
    pub async fn is_sync(&self, peer: PeerId) -> Result<bool, ExchangeError> {
        match self.simple_request(peer, &P2PRequest::IsSync).await? {
            ResponsePayload::Reply { is_ok } => Ok(is_ok),
            _ => Err(ExchangeError::UnexpectedResponse { expected: "Reply" }),
        }
    }

    /// `preferred` followed by routing table peers, without duplicates.
    fn query_order(&self, preferred: &[PeerId]) -> Vec<PeerId> {
        let mut order: Vec<PeerId> = Vec::with_capacity(preferred.len());
        for peer in preferred.iter().copied().chain(self.routing.peers()) {
            if !order.contains(&peer) {
                order.push(peer);
            }
        }
        order
    }
}

#[async_trait]
impl<N, B, R> PeerExchange for NetworkClient<N, B, R>
where
    N: PeerNetwork,
    B: AddressBook,
    R: RoutingTable,
{
    async fn exchange(
        &self,
        ctx: &LookupContext,
        peer: PeerId,
        key: &ChunkKey,
    ) -> Result<ExchangeOutcome, ExchangeError> {
        match self
            .request(ctx, peer, &P2PRequest::FetchChunk(key.clone()))
            .await?
        {
            ResponsePayload::BlockBodies(bodies) => Ok(ExchangeOutcome::Body(bodies)),
            ResponsePayload::AddrInfos(infos) => {
                let mut closer = Vec::with_capacity(infos.len());
                for info in infos {
                    self.address_book
                        .add_addrs(info.peer_id, info.addrs, self.config.redirect_ttl);
                    closer.push(info.peer_id);
                }
                trace!(%peer, chunk = %key, closer = closer.len(), "redirected");
                Ok(ExchangeOutcome::Redirect(closer))
            }
            _ => Err(ExchangeError::UnexpectedResponse {
                expected: "BlockBodies or AddrInfos",
            }),
        }
    }
}

#[async_trait]
impl<N, B, R> PeerRequests for NetworkClient<N, B, R>
where
    N: PeerNetwork,
    B: AddressBook,
    R: RoutingTable,
{
    async fn last_header(&self, peer: PeerId) -> Result<Header, ExchangeError> {
        match self.simple_request(peer, &P2PRequest::GetLastHeader).await? {
            ResponsePayload::Header(header) => Ok(header),
            _ => Err(ExchangeError::UnexpectedResponse { expected: "Header" }),
        }
    }

    async fn is_healthy(&self, peer: PeerId, max_fall_behind: i64) -> Result<bool, ExchangeError> {
        match self
            .simple_request(peer, &P2PRequest::IsHealthy { max_fall_behind })
            .await?
        {
            ResponsePayload::Reply { is_ok } => Ok(is_ok),
            _ => Err(ExchangeError::UnexpectedResponse { expected: "Reply" }),
        }
    }
}

fn proto_error(err: ProtoError) -> ExchangeError {
    match err {
        ProtoError::Io(err) => ExchangeError::Io(err),
        other => ExchangeError::Codec {
            reason: other.to_string(),
        },
    }
}
