//! # Chunk Module
//!
//! This module provides the `Chunk` struct, the unit of streaming. A chunk is a
//! full-height column of `BLOCK_WIDTH x BLOCK_HEIGHT x BLOCK_DEPTH` blocks
//! addressed by a 2D `ChunkCoord`.
//!
//! ## Lifecycle
//!
//! ```text
//! Unrequested -> Queued -> LoadingOrGenerating -> Ready <-> Dirty
//!                                                 Ready/Dirty -> Evicting -> Unrequested
//! ```
//!
//! Only `Ready` and `Dirty` chunks hold block data; edits are refused in every
//! other state. `Dirty` means the mesh lags behind the blocks and the worker
//! owes the chunk a remesh. A chunk that is no longer resident is simply absent
//! from the world's map, which is what `Unrequested` stands for.

use std::fmt;

use cgmath::Point3;

use crate::engine_state::error::WorldError;
use crate::engine_state::rendering::ChunkMesh;

use super::block::block_type::BlockType;

mod block_array;

pub use block_array::{BlockArray, BlockDataError};

/// Size of a chunk along X, in blocks.
pub const BLOCK_WIDTH: usize = 16;
/// Size of a chunk along Y, in blocks.
pub const BLOCK_HEIGHT: usize = 256;
/// Size of a chunk along Z, in blocks.
pub const BLOCK_DEPTH: usize = 16;
/// The total number of blocks in a chunk.
pub const BLOCK_COUNT: usize = BLOCK_WIDTH * BLOCK_HEIGHT * BLOCK_DEPTH;

/// Integer coordinate of a chunk on the XZ plane.
///
/// Chunk `(x, z)` covers world blocks `x * BLOCK_WIDTH .. (x + 1) * BLOCK_WIDTH`
/// and likewise along Z.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    /// Smallest chunk index whose blocks are addressable with `i32`.
    pub const MIN: i32 = i32::MIN / BLOCK_WIDTH as i32;
    /// Largest chunk index whose blocks are addressable with `i32`.
    pub const MAX: i32 = i32::MAX / BLOCK_WIDTH as i32;

    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Returns the chunk containing the world block column `(block_x, block_z)`.
    pub fn containing(block_x: i32, block_z: i32) -> Self {
        Self {
            x: block_x.div_euclid(BLOCK_WIDTH as i32),
            z: block_z.div_euclid(BLOCK_DEPTH as i32),
        }
    }

    /// Returns the chunk containing a world-space position.
    ///
    /// Positions beyond the `i32` block range saturate to the outermost chunk.
    pub fn from_world_position(position: Point3<f32>) -> Self {
        Self::containing(position.x.floor() as i32, position.z.floor() as i32)
    }

    /// World block coordinate of this chunk's local `(0, 0, 0)`.
    ///
    /// Only defined for indices in `MIN..=MAX`.
    pub fn origin(self) -> Point3<i32> {
        Point3::new(
            self.x * BLOCK_WIDTH as i32,
            0,
            self.z * BLOCK_DEPTH as i32,
        )
    }

    /// Distance along the larger axis, in chunks. Windows are squares in this metric.
    pub fn chebyshev_distance(self, other: ChunkCoord) -> u32 {
        self.x.abs_diff(other.x).max(self.z.abs_diff(other.z))
    }

    /// Squared euclidean distance, in chunks. Used to order generation nearest first.
    pub fn distance_squared(self, other: ChunkCoord) -> u64 {
        let dx = u64::from(self.x.abs_diff(other.x));
        let dz = u64::from(self.z.abs_diff(other.z));
        dx * dx + dz * dz
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// A block position relative to its chunk's origin.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LocalPosition {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

/// Resolves a world block coordinate to its chunk and the offset inside it.
///
/// # Returns
/// `None` if `y` lies outside `0..BLOCK_HEIGHT`.
pub fn split_block_position(position: Point3<i32>) -> Option<(ChunkCoord, LocalPosition)> {
    if position.y < 0 || position.y >= BLOCK_HEIGHT as i32 {
        return None;
    }
    let coord = ChunkCoord::containing(position.x, position.z);
    let local = LocalPosition {
        x: position.x.rem_euclid(BLOCK_WIDTH as i32) as usize,
        y: position.y as usize,
        z: position.z.rem_euclid(BLOCK_DEPTH as i32) as usize,
    };
    Some((coord, local))
}

/// Lifecycle state of a chunk.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChunkState {
    Unrequested,
    Queued,
    LoadingOrGenerating,
    Ready,
    Dirty,
    Evicting,
}

impl ChunkState {
    /// Returns whether `self -> next` is an edge of the lifecycle.
    pub fn can_transition_to(self, next: ChunkState) -> bool {
        use ChunkState::*;
        matches!(
            (self, next),
            (Unrequested, Queued)
                | (Queued, LoadingOrGenerating)
                | (Queued, Unrequested)
                | (LoadingOrGenerating, Ready)
                | (LoadingOrGenerating, Unrequested)
                | (Ready, Dirty)
                | (Dirty, Ready)
                | (Ready, Evicting)
                | (Dirty, Evicting)
                | (Evicting, Dirty)
                | (Evicting, Unrequested)
        )
    }

    /// True for the states that hold block data and accept edits.
    pub fn is_ready(self) -> bool {
        matches!(self, ChunkState::Ready | ChunkState::Dirty)
    }
}

/// One streamed chunk: its blocks, its mesh, and where it is in its lifecycle.
#[derive(Debug)]
pub struct Chunk {
    coord: ChunkCoord,
    state: ChunkState,
    blocks: Option<BlockArray>,
    mesh: ChunkMesh,
    /// Bumped on every block edit; meshes and saves record the revision they saw.
    revision: u64,
    /// The blocks differ from what is on disk.
    modified: bool,
}

impl Chunk {
    /// Creates an `Unrequested` chunk with no block data.
    pub fn new(coord: ChunkCoord) -> Self {
        Chunk {
            coord,
            state: ChunkState::Unrequested,
            blocks: None,
            mesh: ChunkMesh::default(),
            revision: 0,
            modified: false,
        }
    }

    /// Creates a chunk that is already `Queued` for generation.
    pub fn queued(coord: ChunkCoord) -> Self {
        let mut chunk = Self::new(coord);
        chunk.state = ChunkState::Queued;
        chunk
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    pub fn state(&self) -> ChunkState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn mesh(&self) -> &ChunkMesh {
        &self.mesh
    }

    /// Moves the chunk along one lifecycle edge.
    ///
    /// # Errors
    /// `InvalidTransition` if `next` is not reachable from the current state;
    /// the chunk is left unchanged.
    pub fn transition(&mut self, next: ChunkState) -> Result<(), WorldError> {
        if !self.state.can_transition_to(next) {
            return Err(WorldError::InvalidTransition {
                coord: self.coord,
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Stores freshly loaded or generated blocks and their mesh, making the chunk `Ready`.
    ///
    /// `modified` marks data that is not yet on disk.
    pub fn install(
        &mut self,
        blocks: BlockArray,
        mesh: ChunkMesh,
        modified: bool,
    ) -> Result<(), WorldError> {
        self.transition(ChunkState::Ready)?;
        self.blocks = Some(blocks);
        self.mesh = mesh;
        self.modified = modified;
        Ok(())
    }

    /// Reads one block.
    ///
    /// # Returns
    /// `None` unless the chunk is `Ready` or `Dirty`.
    pub fn block(&self, local: LocalPosition) -> Option<BlockType> {
        if !self.is_ready() {
            return None;
        }
        self.blocks
            .as_ref()
            .map(|blocks| blocks.get(local.x, local.y, local.z))
    }

    /// Writes one block, flagging the chunk for remeshing and saving.
    ///
    /// # Errors
    /// `ChunkNotLoaded` unless the chunk is `Ready` or `Dirty`.
    pub fn set_block(&mut self, local: LocalPosition, block_type: BlockType) -> Result<(), WorldError> {
        let blocks = match (self.state.is_ready(), self.blocks.as_mut()) {
            (true, Some(blocks)) => blocks,
            _ => return Err(WorldError::ChunkNotLoaded(self.coord)),
        };
        blocks.set(local.x, local.y, local.z, block_type);
        self.revision += 1;
        self.modified = true;
        if self.state == ChunkState::Ready {
            self.state = ChunkState::Dirty;
        }
        Ok(())
    }

    /// Topmost non-air `y` of a column, or `None` for an all-air column or a chunk without data.
    pub fn column_height(&self, x: usize, z: usize) -> Option<usize> {
        if !self.is_ready() {
            return None;
        }
        self.blocks.as_ref()?.column_height(x, z)
    }

    /// Copies the blocks together with the revision they belong to.
    pub fn snapshot(&self) -> Option<(BlockArray, u64)> {
        self.blocks
            .as_ref()
            .map(|blocks| (blocks.clone(), self.revision))
    }

    /// Installs a mesh built from a snapshot.
    ///
    /// # Returns
    /// `true` if the mesh matches the current revision and the chunk is `Ready`
    /// again; `false` if a later edit already made it stale.
    pub fn install_mesh(&mut self, mesh: ChunkMesh) -> bool {
        if !self.state.is_ready() || mesh.revision() < self.mesh.revision() {
            return false;
        }
        let current = mesh.revision() == self.revision;
        self.mesh = mesh;
        if current && self.state == ChunkState::Dirty {
            self.state = ChunkState::Ready;
        }
        current
    }

    /// Clears the modified flag if nothing changed since `revision` was saved.
    pub fn mark_persisted(&mut self, revision: u64) {
        if self.revision == revision {
            self.modified = false;
        }
    }

    /// Removes the block data from an `Evicting` chunk.
    pub fn take_blocks(&mut self) -> Option<BlockArray> {
        self.blocks.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_chunk() -> Chunk {
        let mut chunk = Chunk::queued(ChunkCoord::new(0, 0));
        chunk.transition(ChunkState::LoadingOrGenerating).unwrap();
        chunk
            .install(BlockArray::new(), ChunkMesh::default(), false)
            .unwrap();
        chunk
    }

    #[test]
    fn containing_handles_negative_blocks() {
        assert_eq!(ChunkCoord::containing(0, 0), ChunkCoord::new(0, 0));
        assert_eq!(ChunkCoord::containing(15, 16), ChunkCoord::new(0, 1));
        assert_eq!(ChunkCoord::containing(-1, -16), ChunkCoord::new(-1, -1));
        assert_eq!(ChunkCoord::containing(-17, 0), ChunkCoord::new(-2, 0));
    }

    #[test]
    fn far_positions_saturate_to_the_outermost_chunk() {
        let coord = ChunkCoord::from_world_position(Point3::new(1.0e12, 0.0, -1.0e12));
        assert_eq!(coord, ChunkCoord::new(ChunkCoord::MAX, ChunkCoord::MIN));
        assert_eq!(coord.origin(), Point3::new(i32::MAX - 15, 0, i32::MIN));
    }

    #[test]
    fn split_resolves_local_offsets() {
        let (coord, local) = split_block_position(Point3::new(-1, 5, 17)).unwrap();
        assert_eq!(coord, ChunkCoord::new(-1, 1));
        assert_eq!(local, LocalPosition { x: 15, y: 5, z: 1 });
        assert!(split_block_position(Point3::new(0, -1, 0)).is_none());
        assert!(split_block_position(Point3::new(0, BLOCK_HEIGHT as i32, 0)).is_none());
    }

    #[test]
    fn distances() {
        let a = ChunkCoord::new(0, 0);
        let b = ChunkCoord::new(3, -2);
        assert_eq!(a.chebyshev_distance(b), 3);
        assert_eq!(a.distance_squared(b), 13);
    }

    #[test]
    fn edits_require_ready_state() {
        let mut chunk = Chunk::queued(ChunkCoord::new(2, 2));
        let local = LocalPosition { x: 0, y: 0, z: 0 };
        assert!(matches!(
            chunk.set_block(local, BlockType::DIRT),
            Err(WorldError::ChunkNotLoaded(_))
        ));
        assert_eq!(chunk.block(local), None);
    }

    #[test]
    fn edit_marks_dirty_and_modified() {
        let mut chunk = ready_chunk();
        let local = LocalPosition { x: 1, y: 2, z: 3 };
        chunk.set_block(local, BlockType::WOOD).unwrap();
        assert_eq!(chunk.state(), ChunkState::Dirty);
        assert!(chunk.is_modified());
        assert_eq!(chunk.revision(), 1);
        assert_eq!(chunk.block(local), Some(BlockType::WOOD));
    }

    #[test]
    fn stale_mesh_keeps_chunk_dirty() {
        let mut chunk = ready_chunk();
        let local = LocalPosition { x: 1, y: 2, z: 3 };
        chunk.set_block(local, BlockType::WOOD).unwrap();
        let (_, revision) = chunk.snapshot().unwrap();
        chunk.set_block(local, BlockType::DIRT).unwrap();

        assert!(!chunk.install_mesh(ChunkMesh::with_revision(revision)));
        assert_eq!(chunk.state(), ChunkState::Dirty);
        assert!(chunk.install_mesh(ChunkMesh::with_revision(chunk.revision())));
        assert_eq!(chunk.state(), ChunkState::Ready);
    }

    #[test]
    fn persisted_flag_tracks_revision() {
        let mut chunk = ready_chunk();
        let local = LocalPosition { x: 0, y: 0, z: 0 };
        chunk.set_block(local, BlockType::WOOD).unwrap();
        let saved = chunk.revision();
        chunk.set_block(local, BlockType::DIRT).unwrap();
        chunk.mark_persisted(saved);
        assert!(chunk.is_modified());
        chunk.mark_persisted(chunk.revision());
        assert!(!chunk.is_modified());
    }

    #[test]
    fn lifecycle_rejects_skipped_states() {
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0));
        assert!(chunk.transition(ChunkState::Ready).is_err());
        assert_eq!(chunk.state(), ChunkState::Unrequested);
        chunk.transition(ChunkState::Queued).unwrap();
        assert!(chunk.transition(ChunkState::Evicting).is_err());
    }
}
