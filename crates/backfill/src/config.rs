/// Default number of preceding chunks checked before storing a chunk.
pub const DEFAULT_HISTORY_DEPTH: u64 = 10;

/// Configuration for [`BackfillCoordinator`](crate::BackfillCoordinator).
#[derive(Debug, Clone)]
pub struct BackfillConfig {
    /// Preceding chunks checked for network presence.
    pub depth: u64,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_HISTORY_DEPTH,
        }
    }
}

impl BackfillConfig {
    /// Set the history depth.
    pub fn with_depth(mut self, depth: u64) -> Self {
        self.depth = depth;
        self
    }
}
