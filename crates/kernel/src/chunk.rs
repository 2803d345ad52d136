use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use glam::IVec3;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::rng::splitmix64;

/// Block type identifier. `0` is air.
pub type BlockId = u16;

pub const AIR: BlockId = 0;

pub const CHUNK_SIZE_X: usize = 32;
pub const CHUNK_SIZE_Y: usize = 64;
pub const CHUNK_SIZE_Z: usize = 32;
pub const CHUNK_VOLUME: usize = CHUNK_SIZE_X * CHUNK_SIZE_Y * CHUNK_SIZE_Z;

const STONE: BlockId = 1;
const DIRT: BlockId = 2;
const GRASS: BlockId = 3;

/// Errors from chunk block access and payload decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    #[error("block position {x},{y},{z} is outside the chunk")]
    OutOfBounds { x: i32, y: i32, z: i32 },
    #[error("block payload covers {actual} blocks, expected {expected}")]
    VolumeMismatch { expected: u64, actual: u64 },
    #[error("snapshot of chunk {snapshot} cannot be encoded as chunk {chunk}")]
    ForeignSnapshot { chunk: ChunkPos, snapshot: ChunkPos },
}

/// Chunk coordinate in chunk units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The chunk containing a world block position.
    pub fn containing(block: IVec3) -> Self {
        Self {
            x: block.x.div_euclid(CHUNK_SIZE_X as i32),
            y: block.y.div_euclid(CHUNK_SIZE_Y as i32),
            z: block.z.div_euclid(CHUNK_SIZE_Z as i32),
        }
    }

    /// World position of the chunk's minimum corner.
    pub fn origin(&self) -> IVec3 {
        IVec3::new(
            self.x * CHUNK_SIZE_X as i32,
            self.y * CHUNK_SIZE_Y as i32,
            self.z * CHUNK_SIZE_Z as i32,
        )
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.x, self.y, self.z)
    }
}

/// A run of identical blocks in x-fastest order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRun {
    pub block: BlockId,
    pub length: u32,
}

/// Run-length encoded block payload of one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkData {
    pub pos: ChunkPos,
    pub runs: Vec<BlockRun>,
}

impl ChunkData {
    pub fn from_blocks(pos: ChunkPos, blocks: &[BlockId]) -> Self {
        let mut runs: Vec<BlockRun> = Vec::new();
        for &block in blocks {
            match runs.last_mut() {
                Some(run) if run.block == block && run.length < u32::MAX => run.length += 1,
                _ => runs.push(BlockRun { block, length: 1 }),
            }
        }
        Self { pos, runs }
    }

    /// Number of blocks the runs cover.
    pub fn block_count(&self) -> u64 {
        self.runs.iter().map(|r| u64::from(r.length)).sum()
    }

    /// Expand the runs, checking that they cover exactly one chunk volume.
    pub fn to_blocks(&self) -> Result<Vec<BlockId>, ChunkError> {
        let actual = self.block_count();
        if actual != CHUNK_VOLUME as u64 {
            return Err(ChunkError::VolumeMismatch {
                expected: CHUNK_VOLUME as u64,
                actual,
            });
        }
        let mut blocks = Vec::with_capacity(CHUNK_VOLUME);
        for run in &self.runs {
            blocks.extend(std::iter::repeat_n(run.block, run.length as usize));
        }
        Ok(blocks)
    }
}

fn index(local: IVec3) -> Result<usize, ChunkError> {
    let in_range = |v: i32, size: usize| v >= 0 && (v as usize) < size;
    if !in_range(local.x, CHUNK_SIZE_X) || !in_range(local.y, CHUNK_SIZE_Y) || !in_range(local.z, CHUNK_SIZE_Z) {
        return Err(ChunkError::OutOfBounds {
            x: local.x,
            y: local.y,
            z: local.z,
        });
    }
    let (x, y, z) = (local.x as usize, local.y as usize, local.z as usize);
    Ok(x + CHUNK_SIZE_X * (z + CHUNK_SIZE_Z * y))
}

/// A fixed-size voxel grid.
///
/// Blocks sit behind a lock so the chunk can keep mutating while a persistence
/// job holds a [`ChunkSnapshot`] of an earlier state.
#[derive(Debug)]
pub struct Chunk {
    pos: ChunkPos,
    blocks: RwLock<Vec<BlockId>>,
    active_snapshots: Arc<AtomicUsize>,
}

impl Chunk {
    /// An all-air chunk.
    pub fn new(pos: ChunkPos) -> Self {
        Self::with_blocks(pos, vec![AIR; CHUNK_VOLUME])
    }

    /// Deterministic heightmap terrain: stone, two layers of dirt, grass on top.
    pub fn generate(pos: ChunkPos, seed: u64) -> Self {
        let origin = pos.origin();
        let mut blocks = vec![AIR; CHUNK_VOLUME];
        for z in 0..CHUNK_SIZE_Z {
            for x in 0..CHUNK_SIZE_X {
                let wx = origin.x + x as i32;
                let wz = origin.z + z as i32;
                let column = (u64::from(wx as u32) << 32) | u64::from(wz as u32);
                let height = 16 + (splitmix64(seed ^ column) % 16) as i32;
                for y in 0..CHUNK_SIZE_Y {
                    let wy = origin.y + y as i32;
                    let block = if wy < height - 3 {
                        STONE
                    } else if wy < height - 1 {
                        DIRT
                    } else if wy == height - 1 {
                        GRASS
                    } else {
                        AIR
                    };
                    blocks[x + CHUNK_SIZE_X * (z + CHUNK_SIZE_Z * y)] = block;
                }
            }
        }
        Self::with_blocks(pos, blocks)
    }

    /// Rebuild a chunk from an encoded block payload.
    pub fn from_data(data: &ChunkData) -> Result<Self, ChunkError> {
        Ok(Self::with_blocks(data.pos, data.to_blocks()?))
    }

    fn with_blocks(pos: ChunkPos, blocks: Vec<BlockId>) -> Self {
        Self {
            pos,
            blocks: RwLock::new(blocks),
            active_snapshots: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    /// Block at a chunk-local position.
    pub fn get_block(&self, local: IVec3) -> Result<BlockId, ChunkError> {
        let i = index(local)?;
        Ok(self.blocks.read()[i])
    }

    /// Set a block, returning the previous one.
    pub fn set_block(&self, local: IVec3, block: BlockId) -> Result<BlockId, ChunkError> {
        let i = index(local)?;
        let mut blocks = self.blocks.write();
        Ok(std::mem::replace(&mut blocks[i], block))
    }

    /// Freeze a copy of the current block data.
    ///
    /// The chunk counts as snapshotted until the returned handle is dropped or
    /// passed to [`Chunk::encode_and_release_snapshot`].
    pub fn create_snapshot(&self) -> ChunkSnapshot {
        let blocks = self.blocks.read().clone();
        self.active_snapshots.fetch_add(1, Ordering::AcqRel);
        tracing::trace!(pos = %self.pos, "chunk snapshot taken");
        ChunkSnapshot {
            pos: self.pos,
            blocks,
            release: Arc::clone(&self.active_snapshots),
        }
    }

    pub fn active_snapshots(&self) -> usize {
        self.active_snapshots.load(Ordering::Acquire)
    }

    pub fn is_snapshotted(&self) -> bool {
        self.active_snapshots() > 0
    }

    /// Encode the live block data.
    pub fn encode(&self) -> ChunkData {
        ChunkData::from_blocks(self.pos, &self.blocks.read())
    }

    /// Encode a snapshot's block data, then release the snapshot.
    ///
    /// The snapshot is released even when it was taken from another chunk.
    pub fn encode_and_release_snapshot(&self, snapshot: ChunkSnapshot) -> Result<ChunkData, ChunkError> {
        if snapshot.pos != self.pos {
            return Err(ChunkError::ForeignSnapshot {
                chunk: self.pos,
                snapshot: snapshot.pos,
            });
        }
        Ok(snapshot.encode())
    }
}

/// Point-in-time copy of a chunk's blocks. Releases on drop.
#[derive(Debug)]
pub struct ChunkSnapshot {
    pos: ChunkPos,
    blocks: Vec<BlockId>,
    release: Arc<AtomicUsize>,
}

impl ChunkSnapshot {
    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    pub fn get_block(&self, local: IVec3) -> Result<BlockId, ChunkError> {
        Ok(self.blocks[index(local)?])
    }

    pub fn encode(&self) -> ChunkData {
        ChunkData::from_blocks(self.pos, &self.blocks)
    }
}

impl Drop for ChunkSnapshot {
    fn drop(&mut self) {
        self.release.fetch_sub(1, Ordering::AcqRel);
        tracing::trace!(pos = %self.pos, "chunk snapshot released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_chunk_is_air() {
        let chunk = Chunk::new(ChunkPos::new(0, 0, 0));
        assert_eq!(chunk.get_block(IVec3::new(5, 5, 5)).unwrap(), AIR);
        let data = chunk.encode();
        assert_eq!(data.runs.len(), 1);
        assert_eq!(data.block_count(), CHUNK_VOLUME as u64);
    }

    #[test]
    fn set_block_returns_previous() {
        let chunk = Chunk::new(ChunkPos::default());
        let at = IVec3::new(1, 2, 3);
        assert_eq!(chunk.set_block(at, 7).unwrap(), AIR);
        assert_eq!(chunk.set_block(at, 8).unwrap(), 7);
        assert_eq!(chunk.get_block(at).unwrap(), 8);
    }

    #[test]
    fn out_of_bounds_rejected() {
        let chunk = Chunk::new(ChunkPos::default());
        let err = chunk.get_block(IVec3::new(-1, 0, 0)).unwrap_err();
        assert_eq!(err, ChunkError::OutOfBounds { x: -1, y: 0, z: 0 });
        assert!(chunk.set_block(IVec3::new(0, CHUNK_SIZE_Y as i32, 0), 1).is_err());
        assert!(chunk.get_block(IVec3::new(0, 0, CHUNK_SIZE_Z as i32)).is_err());
    }

    #[test]
    fn snapshot_ignores_later_mutation() {
        let chunk = Chunk::new(ChunkPos::default());
        let at = IVec3::new(4, 4, 4);
        chunk.set_block(at, 1).unwrap();
        let snapshot = chunk.create_snapshot();
        chunk.set_block(at, 2).unwrap();

        assert_eq!(snapshot.get_block(at).unwrap(), 1);
        let data = chunk.encode_and_release_snapshot(snapshot).unwrap();
        let restored = Chunk::from_data(&data).unwrap();
        assert_eq!(restored.get_block(at).unwrap(), 1);
        assert_eq!(chunk.get_block(at).unwrap(), 2);
    }

    #[test]
    fn snapshot_released_once() {
        let chunk = Chunk::new(ChunkPos::default());
        let a = chunk.create_snapshot();
        let b = chunk.create_snapshot();
        assert_eq!(chunk.active_snapshots(), 2);
        chunk.encode_and_release_snapshot(a).unwrap();
        assert_eq!(chunk.active_snapshots(), 1);
        drop(b);
        assert!(!chunk.is_snapshotted());
    }

    #[test]
    fn foreign_snapshot_is_rejected_and_released() {
        let chunk = Chunk::new(ChunkPos::new(0, 0, 0));
        let other = Chunk::new(ChunkPos::new(1, 0, 0));
        let snapshot = other.create_snapshot();
        let err = chunk.encode_and_release_snapshot(snapshot).unwrap_err();
        assert_eq!(
            err,
            ChunkError::ForeignSnapshot {
                chunk: ChunkPos::new(0, 0, 0),
                snapshot: ChunkPos::new(1, 0, 0),
            }
        );
        assert!(!other.is_snapshotted());
    }

    #[test]
    fn payload_round_trip_preserves_blocks() {
        let chunk = Chunk::generate(ChunkPos::new(2, 0, -1), 42);
        let data = chunk.encode();
        let restored = Chunk::from_data(&data).unwrap();
        assert_eq!(restored.pos(), ChunkPos::new(2, 0, -1));
        assert_eq!(restored.encode(), data);
    }

    #[test]
    fn payload_with_wrong_volume_rejected() {
        let data = ChunkData {
            pos: ChunkPos::default(),
            runs: vec![BlockRun { block: 1, length: 10 }],
        };
        assert_eq!(
            Chunk::from_data(&data).unwrap_err(),
            ChunkError::VolumeMismatch {
                expected: CHUNK_VOLUME as u64,
                actual: 10,
            }
        );
    }

    #[test]
    fn generation_is_deterministic() {
        let a = Chunk::generate(ChunkPos::new(0, 0, 0), 7).encode();
        let b = Chunk::generate(ChunkPos::new(0, 0, 0), 7).encode();
        let c = Chunk::generate(ChunkPos::new(0, 0, 0), 8).encode();
        assert_eq!(a, b);
        assert_ne!(a, c);

        let chunk = Chunk::generate(ChunkPos::new(0, 0, 0), 7);
        assert_eq!(chunk.get_block(IVec3::new(0, 0, 0)).unwrap(), STONE);
        assert_eq!(chunk.get_block(IVec3::new(0, 63, 0)).unwrap(), AIR);
    }

    #[test]
    fn containing_handles_negative_coordinates() {
        assert_eq!(ChunkPos::containing(IVec3::new(-1, 0, 31)), ChunkPos::new(-1, 0, 0));
        assert_eq!(ChunkPos::containing(IVec3::new(32, 64, -33)), ChunkPos::new(1, 1, -2));
        assert_eq!(ChunkPos::new(1, -1, 2).origin(), IVec3::new(32, -64, 64));
        assert_eq!(ChunkPos::new(1, -1, 2).to_string(), "1.-1.2");
    }
}
