//! Request and response envelopes.

use libp2p::{Multiaddr, PeerId, StreamProtocol};
use serde::{Deserialize, Serialize};
use shardline_primitives::{BlockBodies, ChunkKey, ChunkRecord, Header, HeightRange};

use crate::{
    FETCH_CHUNK_PROTOCOL, GET_CHUNK_RECORD_PROTOCOL, GET_HEADER_PROTOCOL,
    GET_LAST_HEADER_PROTOCOL, IS_HEALTHY_PROTOCOL, IS_SYNC_PROTOCOL, STORE_CHUNK_PROTOCOL,
};

/// A peer together with the addresses it can be dialed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddrInfo {
    /// The peer.
    pub peer_id: PeerId,
    /// Its known addresses.
    pub addrs: Vec<Multiaddr>,
}

/// Requests a node serves to its peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::IntoStaticStr)]
pub enum P2PRequest {
    /// Latest local header.
    GetLastHeader,
    /// Headers in a height range.
    GetHeader(HeightRange),
    /// Chunk records in a chunk index range.
    GetChunkRecord(HeightRange),
    /// A chunk body, or closer peers.
    FetchChunk(ChunkKey),
    /// Whether the serving node considers itself synced.
    IsSync,
    /// Whether the serving node is within the given number of blocks of
    /// the network.
    IsHealthy {
        /// Largest acceptable lag.
        max_fall_behind: i64,
    },
    /// Ask the serving node to store a chunk and its missing history.
    StoreChunk(ChunkRecord),
}

impl P2PRequest {
    /// Stream protocol this request is sent on.
    pub fn protocol(&self) -> StreamProtocol {
        StreamProtocol::new(match self {
            Self::GetLastHeader => GET_LAST_HEADER_PROTOCOL,
            Self::GetHeader(_) => GET_HEADER_PROTOCOL,
            Self::GetChunkRecord(_) => GET_CHUNK_RECORD_PROTOCOL,
            Self::FetchChunk(_) => FETCH_CHUNK_PROTOCOL,
            Self::IsSync => IS_SYNC_PROTOCOL,
            Self::IsHealthy { .. } => IS_HEALTHY_PROTOCOL,
            Self::StoreChunk(_) => STORE_CHUNK_PROTOCOL,
        })
    }

    /// Short name for logs and metrics.
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

/// Successful response payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::IntoStaticStr)]
pub enum ResponsePayload {
    /// Boolean answer.
    Reply {
        /// The answer.
        is_ok: bool,
    },
    /// A single header.
    Header(Header),
    /// A list of headers.
    Headers(Vec<Header>),
    /// A list of chunk records.
    ChunkRecords(Vec<ChunkRecord>),
    /// Chunk bodies.
    BlockBodies(BlockBodies),
    /// Closer peers that may hold the requested chunk.
    AddrInfos(Vec<AddrInfo>),
}

/// Response envelope: exactly one payload or an error string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum P2PResponse {
    /// The request succeeded.
    Payload(ResponsePayload),
    /// The request failed.
    Error(String),
}

impl P2PResponse {
    /// Error response with the given message.
    pub fn error(message: impl ToString) -> Self {
        Self::Error(message.to_string())
    }

    /// Boolean reply.
    pub fn reply(is_ok: bool) -> Self {
        Self::Payload(ResponsePayload::Reply { is_ok })
    }
}

impl From<ResponsePayload> for P2PResponse {
    fn from(payload: ResponsePayload) -> Self {
        Self::Payload(payload)
    }
}

impl From<Result<ResponsePayload, String>> for P2PResponse {
    fn from(result: Result<ResponsePayload, String>) -> Self {
        match result {
            Ok(payload) => Self::Payload(payload),
            Err(message) => Self::Error(message),
        }
    }
}
