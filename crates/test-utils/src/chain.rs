//! In-memory chain log.

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use parking_lot::RwLock;
use shardline_api::{ChainLog, ShardError, ShardResult};
use shardline_primitives::{
    BlockBodies, BlockBody, ChunkKey, ChunkRecord, Header, HeightRange,
};

/// Blocks per chunk used by [`chunk_record`].
pub const TEST_CHUNK_LEN: u64 = 10;

/// Record of chunk `index` with [`TEST_CHUNK_LEN`] blocks and a hash
/// derived from the index.
pub fn chunk_record(index: u64) -> ChunkRecord {
    ChunkRecord {
        hash: format!("chunk-{index}").into_bytes(),
        start: index * TEST_CHUNK_LEN,
        end: index * TEST_CHUNK_LEN + TEST_CHUNK_LEN - 1,
    }
}

/// Key of chunk `index`, see [`chunk_record`].
pub fn chunk_key(index: u64) -> ChunkKey {
    chunk_record(index).key()
}

/// Deterministic bodies for the heights covered by `key`.
pub fn bodies_for(key: &ChunkKey) -> BlockBodies {
    BlockBodies::new(
        (key.start()..=key.end())
            .map(|height| BlockBody {
                height,
                hash: height.to_be_bytes().to_vec(),
                payload: key.hash().to_vec(),
            })
            .collect(),
    )
}

/// Chain log over a fixed set of chunk records.
#[derive(Debug, Default)]
pub struct MockChainLog {
    records: RwLock<BTreeMap<u64, ChunkRecord>>,
    last_height: RwLock<u64>,
    fail_last_header: AtomicBool,
    fail_records: AtomicBool,
    fail_bodies: AtomicBool,
    body_fetches: AtomicUsize,
}

impl MockChainLog {
    /// Empty chain at height zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the latest header height.
    pub fn with_last_height(self, height: u64) -> Self {
        *self.last_height.write() = height;
        self
    }

    /// Add [`chunk_record`] for every index in `indices`.
    pub fn with_chunks(self, indices: impl IntoIterator<Item = u64>) -> Self {
        {
            let mut records = self.records.write();
            for index in indices {
                records.insert(index, chunk_record(index));
            }
        }
        self
    }

    /// Make `get_last_header` fail.
    pub fn fail_last_header(&self, fail: bool) {
        self.fail_last_header.store(fail, Ordering::SeqCst);
    }

    /// Make `get_chunk_records` fail.
    pub fn fail_records(&self, fail: bool) {
        self.fail_records.store(fail, Ordering::SeqCst);
    }

    /// Make `get_chunk_block_body` fail.
    pub fn fail_bodies(&self, fail: bool) {
        self.fail_bodies.store(fail, Ordering::SeqCst);
    }

    /// Number of `get_chunk_block_body` calls so far.
    pub fn body_fetches(&self) -> usize {
        self.body_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainLog for MockChainLog {
    async fn get_chunk_block_body(&self, key: &ChunkKey) -> ShardResult<BlockBodies> {
        self.body_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_bodies.load(Ordering::SeqCst) {
            return Err(ShardError::chain("block bodies unavailable"));
        }
        let known = self.records.read().values().any(|r| r.hash == key.hash());
        if !known {
            return Err(ShardError::chain(format!("unknown chunk {key}")));
        }
        Ok(bodies_for(key))
    }

    async fn get_chunk_records(&self, range: HeightRange) -> ShardResult<Vec<ChunkRecord>> {
        if self.fail_records.load(Ordering::SeqCst) {
            return Err(ShardError::chain("chunk records unavailable"));
        }
        Ok(self
            .records
            .read()
            .range(range.start..=range.end)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn get_headers(&self, range: HeightRange) -> ShardResult<Vec<Header>> {
        let last = *self.last_height.read();
        Ok((range.start..=range.end.min(last))
            .map(Header::at_height)
            .collect())
    }

    async fn get_last_header(&self) -> ShardResult<Header> {
        if self.fail_last_header.load(Ordering::SeqCst) {
            return Err(ShardError::chain("last header unavailable"));
        }
        Ok(Header::at_height(*self.last_height.read()))
    }
}
