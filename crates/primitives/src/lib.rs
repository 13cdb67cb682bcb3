//! Core primitive types for Shardline nodes.
//!
//! This crate provides the data model shared by every other crate, kept
//! separate to avoid circular dependencies.
//!
//! # Types
//!
//! ## Chunks
//! - [`ChunkKey`] - Content hash plus inclusive block height range
//! - [`ChunkRecord`] - Stored chunk metadata without the body
//! - [`BlockBodies`], [`BlockBody`] - Retrieved chunk payload
//!
//! ## Chain
//! - [`Header`] - Block header as far as health sampling needs it
//! - [`HeightRange`] - Inclusive range of heights or chunk indices
//!
//! ## Addressing
//! - [`DhtId`] - 256-bit identifier in the DHT key space
//! - [`PeerId`] - libp2p peer identifier

mod chunk;
mod dht;
mod header;
mod role;

pub use chunk::{BlockBodies, BlockBody, ChunkKey, ChunkRecord, InvalidChunkKey};
pub use dht::{DHT_ID_SIZE, DhtDistance, DhtId};
pub use header::{Header, HeightRange};
pub use role::NodeRole;

// Re-export libp2p identifiers used across the stack
pub use libp2p::{Multiaddr, PeerId};
