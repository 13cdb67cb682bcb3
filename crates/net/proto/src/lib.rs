//! Wire protocol for Shardline peer streams.
//!
//! Every request kind has its own stream protocol. A requester opens a
//! stream, writes one [`SignedRequest`] frame and reads a [`P2PResponse`]
//! until the responder closes the stream.

mod codec;
mod error;
mod message;
mod signed;

pub use codec::{
    MAX_REQUEST_SIZE, MAX_RESPONSE_SIZE, MessageCodec, read_request, read_response,
    write_request, write_response,
};
pub use error::ProtoError;
pub use message::{AddrInfo, P2PRequest, P2PResponse, ResponsePayload};
pub use signed::SignedRequest;

/// Protocol for [`P2PRequest::GetLastHeader`].
pub const GET_LAST_HEADER_PROTOCOL: &str = "/shardline/get-last-header/1.0.0";
/// Protocol for [`P2PRequest::GetHeader`].
pub const GET_HEADER_PROTOCOL: &str = "/shardline/get-header/1.0.0";
/// Protocol for [`P2PRequest::GetChunkRecord`].
pub const GET_CHUNK_RECORD_PROTOCOL: &str = "/shardline/get-chunk-record/1.0.0";
/// Protocol for [`P2PRequest::FetchChunk`].
pub const FETCH_CHUNK_PROTOCOL: &str = "/shardline/fetch-chunk/1.0.0";
/// Protocol for [`P2PRequest::IsSync`].
pub const IS_SYNC_PROTOCOL: &str = "/shardline/is-sync/1.0.0";
/// Protocol for [`P2PRequest::IsHealthy`].
pub const IS_HEALTHY_PROTOCOL: &str = "/shardline/is-healthy/1.0.0";
/// Protocol for [`P2PRequest::StoreChunk`].
pub const STORE_CHUNK_PROTOCOL: &str = "/shardline/store-chunk/1.0.0";

/// Every protocol a node serves.
pub const PROTOCOLS: [&str; 7] = [
    GET_LAST_HEADER_PROTOCOL,
    GET_HEADER_PROTOCOL,
    GET_CHUNK_RECORD_PROTOCOL,
    FETCH_CHUNK_PROTOCOL,
    IS_SYNC_PROTOCOL,
    IS_HEALTHY_PROTOCOL,
    STORE_CHUNK_PROTOCOL,
];
