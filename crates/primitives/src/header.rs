//! Block header and height range types.

use serde::{Deserialize, Serialize};

/// A block header, reduced to what peers exchange for sync estimation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Block height.
    pub height: u64,
    /// Block hash.
    pub hash: Vec<u8>,
    /// Parent block hash.
    pub parent_hash: Vec<u8>,
    /// Block timestamp in seconds since the unix epoch.
    pub timestamp: u64,
}

impl Header {
    /// Header at `height` with empty hashes.
    pub fn at_height(height: u64) -> Self {
        Self {
            height,
            hash: Vec::new(),
            parent_hash: Vec::new(),
            timestamp: 0,
        }
    }
}

/// Inclusive range of block heights or chunk indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeightRange {
    /// First value (inclusive).
    pub start: u64,
    /// Last value (inclusive).
    pub end: u64,
}

impl HeightRange {
    /// Create `start..=end`.
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of values in the range, zero if inverted.
    pub fn len(&self) -> u64 {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }

    /// Whether the range is inverted.
    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Whether `value` lies in the range.
    pub fn contains(&self, value: u64) -> bool {
        value >= self.start && value <= self.end
    }
}
