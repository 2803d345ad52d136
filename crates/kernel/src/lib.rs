//! World Kernel: voxel chunks, point-in-time snapshots and the block payload format.
//!
//! # Invariants
//! - A chunk's block grid has a fixed volume; every encoded payload covers it exactly.
//! - A snapshot is released exactly once, when its handle is dropped.

pub mod chunk;
mod rng;

pub use chunk::{
    BlockId, BlockRun, Chunk, ChunkData, ChunkError, ChunkPos, ChunkSnapshot, AIR, CHUNK_SIZE_X,
    CHUNK_SIZE_Y, CHUNK_SIZE_Z, CHUNK_VOLUME,
};
pub use rng::splitmix64;
