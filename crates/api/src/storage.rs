//! Chain log and local chunk storage collaborators.

use async_trait::async_trait;
use auto_impl::auto_impl;
use shardline_primitives::{BlockBodies, ChunkKey, ChunkRecord, Header, HeightRange};

use crate::ShardResult;

/// Authoritative source of block data on this node.
///
/// Calls block until the chain answers; no timeout applies at this layer.
/// Errors are returned as [`ShardError::Chain`](crate::ShardError::Chain)
/// and propagated unchanged by callers.
#[async_trait]
#[auto_impl(&, Arc)]
pub trait ChainLog: Send + Sync {
    /// Block bodies covered by `key`.
    async fn get_chunk_block_body(&self, key: &ChunkKey) -> ShardResult<BlockBodies>;

    /// Records of the chunks with indices in `range`.
    async fn get_chunk_records(&self, range: HeightRange) -> ShardResult<Vec<ChunkRecord>>;

    /// Headers with heights in `range`.
    async fn get_headers(&self, range: HeightRange) -> ShardResult<Vec<Header>>;

    /// The latest local header.
    async fn get_last_header(&self) -> ShardResult<Header>;
}

/// Local persistence of chunks.
///
/// Keys address chunks by content hash. A key covering a sub-range of a
/// stored chunk (such as a single-block probe) matches that chunk.
#[auto_impl(&, Arc)]
pub trait LocalChunkStore: Send + Sync {
    /// Whether the chunk is stored.
    fn exists(&self, key: &ChunkKey) -> ShardResult<bool>;

    /// Bodies for the heights covered by `key`, if the chunk is stored.
    fn get(&self, key: &ChunkKey) -> ShardResult<Option<BlockBodies>>;

    /// Store the chunk.
    fn put(&self, key: &ChunkKey, bodies: BlockBodies) -> ShardResult<()>;

    /// Mark the chunk as recently confirmed so retention keeps it.
    fn refresh_retention(&self, key: &ChunkKey) -> ShardResult<()>;
}

/// Retrieves chunks from wherever they can be found.
#[async_trait]
#[auto_impl(&, Arc)]
pub trait ChunkSource: Send + Sync {
    /// Local store first; the network only when `query_remote` is set.
    async fn get_chunk(&self, key: &ChunkKey, query_remote: bool) -> ShardResult<BlockBodies>;
}
