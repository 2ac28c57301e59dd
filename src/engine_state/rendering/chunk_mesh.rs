//! # Chunk Mesh
//!
//! Converts a chunk's blocks into triangles. Every face of a solid block that
//! touches a non-solid cell becomes one quad (two triangles, six vertices).
//!
//! ## Solid mask
//!
//! Neighbour tests run against a bit vector with a one-cell border of padding
//! on every side (`MASK_WIDTH x MASK_HEIGHT x MASK_DEPTH`). The border is never
//! solid, so faces on the chunk boundary are always emitted and no lookup needs
//! a bounds check.

use bitvec::prelude::BitVec;

use super::Vertex;
use crate::engine_state::voxels::{
    block::{block_side::BlockSide, BlockServer},
    chunk::{BlockArray, ChunkCoord, BLOCK_DEPTH, BLOCK_HEIGHT, BLOCK_WIDTH},
};

const MASK_WIDTH: usize = BLOCK_WIDTH + 2;
const MASK_HEIGHT: usize = BLOCK_HEIGHT + 2;
const MASK_DEPTH: usize = BLOCK_DEPTH + 2;
const MASK_SIZE: usize = MASK_WIDTH * MASK_HEIGHT * MASK_DEPTH;

/// Unit-cube corners of each face, counter-clockwise seen from outside.
/// Indexed by `BlockSide as usize`.
const FACE_CORNERS: [[[f32; 3]; 4]; 6] = [
    // FRONT (-Z)
    [[1.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]],
    // BACK (+Z)
    [[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0]],
    // LEFT (-X)
    [[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 1.0, 0.0]],
    // RIGHT (+X)
    [[1.0, 0.0, 1.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [1.0, 1.0, 1.0]],
    // TOP (+Y)
    [[0.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
    // BOTTOM (-Y)
    [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1.0], [0.0, 0.0, 1.0]],
];

const CORNER_UVS: [[f32; 2]; 4] = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];

/// Two triangles per quad.
const QUAD_CORNER_ORDER: [usize; 6] = [0, 1, 2, 0, 2, 3];

#[inline]
fn mask_index(x: usize, y: usize, z: usize) -> usize {
    x + MASK_WIDTH * y + MASK_WIDTH * MASK_HEIGHT * z
}

/// Triangle list for one chunk, tagged with the block revision it was built from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkMesh {
    vertices: Vec<Vertex>,
    revision: u64,
}

impl ChunkMesh {
    /// An empty mesh claiming to match `revision`.
    pub fn with_revision(revision: u64) -> Self {
        ChunkMesh {
            vertices: Vec::new(),
            revision,
        }
    }

    /// Builds the mesh of the chunk at `coord`.
    ///
    /// # Arguments
    /// * `coord` - Chunk the blocks belong to; vertices are placed in world space
    /// * `blocks` - The chunk's block data
    /// * `block_server` - Registry deciding solidity and texture indices
    /// * `revision` - Block revision the data was copied at
    pub fn build(
        coord: ChunkCoord,
        blocks: &BlockArray,
        block_server: &BlockServer,
        revision: u64,
    ) -> Self {
        let mut solid_mask: BitVec = BitVec::repeat(false, MASK_SIZE);
        for x in 0..BLOCK_WIDTH {
            for z in 0..BLOCK_DEPTH {
                for (y, block) in blocks.column(x, z).iter().enumerate() {
                    if block_server.is_solid(*block) {
                        solid_mask.set(mask_index(x + 1, y + 1, z + 1), true);
                    }
                }
            }
        }

        let origin = coord.origin();
        let mut vertices = Vec::new();

        for x in 0..BLOCK_WIDTH {
            for z in 0..BLOCK_DEPTH {
                for (y, block) in blocks.column(x, z).iter().enumerate() {
                    if !solid_mask[mask_index(x + 1, y + 1, z + 1)] {
                        continue;
                    }
                    let Some(descriptor) = block_server.descriptor(*block) else {
                        continue;
                    };

                    for side in BlockSide::all() {
                        let normal = side.normal();
                        let neighbour = mask_index(
                            (x as i32 + 1 + normal.x) as usize,
                            (y as i32 + 1 + normal.y) as usize,
                            (z as i32 + 1 + normal.z) as usize,
                        );
                        if solid_mask[neighbour] {
                            continue;
                        }

                        let base = [
                            (origin.x + x as i32) as f32,
                            y as f32,
                            (origin.z + z as i32) as f32,
                        ];
                        let corners = &FACE_CORNERS[side as usize];
                        for corner in QUAD_CORNER_ORDER {
                            let offset = corners[corner];
                            vertices.push(Vertex::new(
                                [
                                    base[0] + offset[0],
                                    base[1] + offset[1],
                                    base[2] + offset[2],
                                ],
                                CORNER_UVS[corner],
                                descriptor.texture_index(side),
                                side as u32,
                            ));
                        }
                    }
                }
            }
        }

        ChunkMesh { vertices, revision }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn face_count(&self) -> usize {
        self.vertices.len() / QUAD_CORNER_ORDER.len()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::block_type::BlockType;

    fn build(blocks: &BlockArray) -> ChunkMesh {
        ChunkMesh::build(ChunkCoord::new(0, 0), blocks, &BlockServer::new(), 0)
    }

    #[test]
    fn empty_chunk_has_no_faces() {
        assert!(build(&BlockArray::new()).is_empty());
    }

    #[test]
    fn lone_block_has_six_faces() {
        let mut blocks = BlockArray::new();
        blocks.set(4, 10, 4, BlockType::DIRT);
        let mesh = build(&blocks);
        assert_eq!(mesh.face_count(), 6);
        assert_eq!(mesh.vertex_count(), 36);
    }

    #[test]
    fn shared_faces_are_culled() {
        let mut blocks = BlockArray::new();
        blocks.set(4, 10, 4, BlockType::DIRT);
        blocks.set(5, 10, 4, BlockType::DIRT);
        assert_eq!(build(&blocks).face_count(), 10);
    }

    #[test]
    fn vertices_are_in_world_space() {
        let mut blocks = BlockArray::new();
        blocks.set(0, 0, 0, BlockType::DIRT);
        let mesh = ChunkMesh::build(ChunkCoord::new(-1, 2), &blocks, &BlockServer::new(), 3);
        assert_eq!(mesh.revision(), 3);
        for vertex in mesh.vertices() {
            assert!((-16.0..=-15.0).contains(&vertex.position[0]));
            assert!((0.0..=1.0).contains(&vertex.position[1]));
            assert!((32.0..=33.0).contains(&vertex.position[2]));
        }
    }

    #[test]
    fn grass_top_uses_top_texture() {
        let mut blocks = BlockArray::new();
        blocks.set(1, 1, 1, BlockType::GRASS);
        let mesh = build(&blocks);
        let top: Vec<_> = mesh
            .vertices()
            .iter()
            .filter(|vertex| vertex.side == BlockSide::TOP as u32)
            .collect();
        assert_eq!(top.len(), 6);
        assert!(top.iter().all(|vertex| vertex.texture_index == 3));
        assert!(top.iter().all(|vertex| vertex.position[1] == 2.0));
    }

    #[test]
    fn non_solid_descriptor_is_not_meshed() {
        let mut server = BlockServer::new();
        let mut glass = server.descriptor(BlockType::WHITE).unwrap().clone();
        glass.solid = false;
        server.register(BlockType::WHITE, glass);

        let mut blocks = BlockArray::new();
        blocks.set(2, 2, 2, BlockType::WHITE);
        blocks.set(3, 2, 2, BlockType::DIRT);
        let mesh = ChunkMesh::build(ChunkCoord::new(0, 0), &blocks, &server, 0);
        assert_eq!(mesh.face_count(), 6);
    }
}
