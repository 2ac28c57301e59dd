//! # World Generation
//!
//! Deterministic heightmap terrain. Every column of a chunk samples a seeded
//! Perlin field at its world position, maps the sample to a height, and fills
//! dirt below a single grass block.
//!
//! The generator keeps no state besides its noise field, so the same
//! `(seed, coord)` pair always produces the same `BlockArray`. That is what makes
//! it safe to regenerate a chunk whose save file could not be read.

use noise::{NoiseFn, Perlin};

use super::block::block_type::BlockType;
use super::chunk::{BlockArray, ChunkCoord, BLOCK_DEPTH, BLOCK_HEIGHT, BLOCK_WIDTH};

/// Scaling factor applied to world coordinates when sampling Perlin noise.
pub const PERLIN_SCALE_FACTOR: f64 = 0.01;

/// Seeded, re-entrant terrain generator.
#[derive(Clone, Debug)]
pub struct WorldGeneration {
    seed: u32,
    perlin: Perlin,
}

impl WorldGeneration {
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            perlin: Perlin::new(seed),
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Replaces the noise field's seed. Chunks generated afterwards follow the new seed.
    pub fn reseed(&mut self, seed: u32) {
        *self = Self::new(seed);
    }

    /// Terrain height of the world column `(block_x, block_z)`, in `0..BLOCK_HEIGHT`.
    ///
    /// A height of `h` means blocks `0..h` are solid; `0` is an empty column.
    pub fn column_height(&self, block_x: i32, block_z: i32) -> usize {
        let sample = self.perlin.get([
            block_x as f64 * PERLIN_SCALE_FACTOR,
            block_z as f64 * PERLIN_SCALE_FACTOR,
        ]);
        let height = (sample + 1.0) / 2.0 * BLOCK_HEIGHT as f64;
        (height.max(0.0) as usize).min(BLOCK_HEIGHT - 1)
    }

    /// Generates the blocks of one chunk.
    pub fn generate(&self, coord: ChunkCoord) -> BlockArray {
        let mut blocks = BlockArray::new();
        let origin = coord.origin();

        for x in 0..BLOCK_WIDTH {
            for z in 0..BLOCK_DEPTH {
                let height = self.column_height(origin.x + x as i32, origin.z + z as i32);
                if height == 0 {
                    continue;
                }
                let column = blocks.column_mut(x, z);
                column[..height - 1].fill(BlockType::DIRT);
                column[height - 1] = BlockType::GRASS;
            }
        }

        blocks
    }
}
