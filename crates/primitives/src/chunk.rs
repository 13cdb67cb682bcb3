//! Chunk identification and payload types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{DhtId, HeightRange};

/// Reasons a [`ChunkKey`] cannot be used in a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidChunkKey {
    /// The content hash is empty.
    #[error("chunk hash is empty")]
    EmptyHash,
    /// The end height lies below the start height.
    #[error("chunk end {end} is below start {start}")]
    InvertedRange {
        /// Start height.
        start: u64,
        /// End height.
        end: u64,
    },
}

/// Identifies a contiguous range of blocks.
///
/// The DHT identifier depends on the content hash only, so a key narrowed to
/// a single block (see [`ChunkKey::probe`]) routes to the same peers as the
/// full chunk.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkKey {
    hash: Vec<u8>,
    start: u64,
    end: u64,
}

impl ChunkKey {
    /// Create a key for blocks `start..=end` with the given content hash.
    pub fn new(hash: impl Into<Vec<u8>>, start: u64, end: u64) -> Self {
        Self {
            hash: hash.into(),
            start,
            end,
        }
    }

    /// Check that the key can be sent over the wire.
    pub fn validate(&self) -> Result<(), InvalidChunkKey> {
        if self.hash.is_empty() {
            return Err(InvalidChunkKey::EmptyHash);
        }
        if self.end < self.start {
            return Err(InvalidChunkKey::InvertedRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    /// Content hash of the chunk.
    pub fn hash(&self) -> &[u8] {
        &self.hash
    }

    /// First block height (inclusive).
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Last block height (inclusive).
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of blocks covered by the key.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start).saturating_add(1)
    }

    /// Always false: a key covers at least one block.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Position of this chunk in the fixed-size chunking scheme.
    pub fn index(&self) -> u64 {
        self.start / self.len()
    }

    /// Chunk indices of up to `depth` chunks immediately preceding this one.
    ///
    /// Returns `None` for the first chunk.
    pub fn predecessors(&self, depth: u64) -> Option<HeightRange> {
        let index = self.index();
        if index == 0 || depth == 0 {
            return None;
        }
        Some(HeightRange::new(index.saturating_sub(depth), index - 1))
    }

    /// Same chunk narrowed to its first block: enough to confirm existence.
    pub fn probe(&self) -> Self {
        Self {
            hash: self.hash.clone(),
            start: self.start,
            end: self.start,
        }
    }

    /// Position of the chunk in the DHT key space.
    pub fn dht_id(&self) -> DhtId {
        DhtId::from_content_hash(&self.hash)
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hash = hex::encode(&self.hash);
        let short = hash.get(..16).unwrap_or(&hash);
        write!(f, "{short}@{}..={}", self.start, self.end)
    }
}

impl fmt::Debug for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkKey")
            .field("hash", &hex::encode(&self.hash))
            .field("start", &self.start)
            .field("end", &self.end)
            .finish()
    }
}

/// Metadata describing a stored chunk, without its body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Content hash of the chunk.
    pub hash: Vec<u8>,
    /// First block height (inclusive).
    pub start: u64,
    /// Last block height (inclusive).
    pub end: u64,
}

impl ChunkRecord {
    /// Key addressing the whole chunk described by this record.
    pub fn key(&self) -> ChunkKey {
        ChunkKey::new(self.hash.clone(), self.start, self.end)
    }
}

impl From<&ChunkKey> for ChunkRecord {
    fn from(key: &ChunkKey) -> Self {
        Self {
            hash: key.hash.clone(),
            start: key.start,
            end: key.end,
        }
    }
}

/// A single block body inside a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockBody {
    /// Block height.
    pub height: u64,
    /// Block hash.
    pub hash: Vec<u8>,
    /// Opaque encoded body.
    pub payload: Vec<u8>,
}

/// Block bodies of a chunk, ordered by height.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockBodies {
    /// The bodies.
    pub items: Vec<BlockBody>,
}

impl BlockBodies {
    /// Wrap a list of bodies.
    pub fn new(items: Vec<BlockBody>) -> Self {
        Self { items }
    }

    /// Number of bodies.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no bodies are present.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Bodies restricted to the heights covered by `key`.
    pub fn slice(&self, key: &ChunkKey) -> Self {
        Self {
            items: self
                .items
                .iter()
                .filter(|body| body.height >= key.start && body.height <= key.end)
                .cloned()
                .collect(),
        }
    }
}
