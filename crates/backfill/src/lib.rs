//! Keeps chunk history discoverable.
//!
//! Before a chunk is stored, the [`BackfillCoordinator`] checks that the
//! chunks preceding it can still be found. Predecessors that cannot are
//! fetched from the chain log and stored locally alongside the new chunk.
//!
//! The walk stops at the newest predecessor found present and assumes
//! everything older is covered. History lost from the network after that
//! point is not rediscovered.

mod config;
mod coordinator;

pub use config::{BackfillConfig, DEFAULT_HISTORY_DEPTH};
pub use coordinator::BackfillCoordinator;
