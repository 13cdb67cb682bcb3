//! In-memory chunk store (does not persist across restarts).

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use parking_lot::RwLock;
use shardline_api::{LocalChunkStore, ShardError, ShardResult};
use shardline_primitives::{BlockBodies, ChunkKey, ChunkRecord};
use tracing::trace;

#[derive(Debug, Clone)]
struct StoredChunk {
    record: ChunkRecord,
    bodies: BlockBodies,
}

impl StoredChunk {
    fn covers(&self, key: &ChunkKey) -> bool {
        key.start() >= self.record.start && key.end() <= self.record.end
    }
}

/// Chunks keyed by content hash.
///
/// Nothing is ever evicted, so retention refreshes are only counted.
#[derive(Debug, Default)]
pub struct MemoryChunkStore {
    chunks: RwLock<HashMap<Vec<u8>, StoredChunk>>,
    writes: AtomicUsize,
    retention_touches: AtomicUsize,
}

impl MemoryChunkStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    /// Whether no chunk is stored.
    pub fn is_empty(&self) -> bool {
        self.chunks.read().is_empty()
    }

    /// Number of `put` calls so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Number of successful `refresh_retention` calls so far.
    pub fn retention_touches(&self) -> usize {
        self.retention_touches.load(Ordering::Relaxed)
    }

    /// Records of every stored chunk.
    pub fn records(&self) -> Vec<ChunkRecord> {
        self.chunks
            .read()
            .values()
            .map(|chunk| chunk.record.clone())
            .collect()
    }
}

impl LocalChunkStore for MemoryChunkStore {
    fn exists(&self, key: &ChunkKey) -> ShardResult<bool> {
        Ok(self
            .chunks
            .read()
            .get(key.hash())
            .is_some_and(|chunk| chunk.covers(key)))
    }

    fn get(&self, key: &ChunkKey) -> ShardResult<Option<BlockBodies>> {
        Ok(self
            .chunks
            .read()
            .get(key.hash())
            .filter(|chunk| chunk.covers(key))
            .map(|chunk| chunk.bodies.slice(key)))
    }

    fn put(&self, key: &ChunkKey, bodies: BlockBodies) -> ShardResult<()> {
        key.validate()?;
        self.chunks.write().insert(
            key.hash().to_vec(),
            StoredChunk {
                record: ChunkRecord::from(key),
                bodies,
            },
        );
        self.writes.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("shardline_store_writes_total").increment(1);
        trace!(chunk = %key, "chunk stored");
        Ok(())
    }

    fn refresh_retention(&self, key: &ChunkKey) -> ShardResult<()> {
        if !self.exists(key)? {
            return Err(ShardError::storage(format!("chunk {key} is not stored")));
        }
        self.retention_touches.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shardline_primitives::BlockBody;

    fn bodies(key: &ChunkKey) -> BlockBodies {
        BlockBodies::new(
            (key.start()..=key.end())
                .map(|height| BlockBody {
                    height,
                    hash: Vec::new(),
                    payload: Vec::new(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_probe_matches_stored_chunk() {
        let store = MemoryChunkStore::new();
        let key = ChunkKey::new(b"h1".to_vec(), 10, 19);
        assert!(!store.exists(&key.probe()).unwrap());

        store.put(&key, bodies(&key)).unwrap();
        assert!(store.exists(&key).unwrap());
        assert!(store.exists(&key.probe()).unwrap());
        assert_eq!(store.get(&key.probe()).unwrap().map(|b| b.len()), Some(1));
        assert!(!store.exists(&ChunkKey::new(b"h1".to_vec(), 20, 29)).unwrap());
    }

    #[test]
    fn test_refresh_requires_stored_chunk() {
        let store = MemoryChunkStore::new();
        let key = ChunkKey::new(b"h1".to_vec(), 10, 19);
        assert_matches!(store.refresh_retention(&key), Err(ShardError::Storage { .. }));

        store.put(&key, bodies(&key)).unwrap();
        store.refresh_retention(&key).unwrap();
        assert_eq!(store.writes(), 1);
        assert_eq!(store.retention_touches(), 1);
    }

    #[test]
    fn test_put_rejects_invalid_key() {
        let store = MemoryChunkStore::new();
        let key = ChunkKey::new(Vec::new(), 0, 9);
        assert_matches!(
            store.put(&key, BlockBodies::default()),
            Err(ShardError::InvalidParam { .. })
        );
        assert!(store.is_empty());
    }
}
