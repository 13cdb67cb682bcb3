//! Local chunk storage.
//!
//! [`MemoryChunkStore`] implements [`LocalChunkStore`](shardline_api::LocalChunkStore)
//! in memory. A chunk is addressed by its content hash, and any key whose
//! height range lies inside the stored chunk matches it, so single-block
//! existence probes resolve against the full chunk.

mod memory;

pub use memory::MemoryChunkStore;
