//! # Block Array Module
//!
//! Dense per-chunk voxel storage. Every cell holds one `BlockType`; there is no
//! sparsity, so lookups are a single index computation.
//!
//! ## Layout
//!
//! Cells are stored x-major, then z, then y:
//! `index = (x * BLOCK_DEPTH + z) * BLOCK_HEIGHT + y`.
//! The same order is used for the on-disk chunk record, so serialisation is a
//! straight copy of the storage codes. Keeping a column contiguous also makes
//! height queries a scan over one slice.

use std::fmt;

use thiserror::Error;

use super::{BLOCK_COUNT, BLOCK_DEPTH, BLOCK_HEIGHT, BLOCK_WIDTH};
use crate::engine_state::voxels::block::block_type::BlockType;

/// Reasons a serialised block array cannot be decoded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockDataError {
    #[error("expected {expected} bytes of block data, found {found}")]
    WrongLength { expected: usize, found: usize },

    #[error("unknown block code {code} at offset {offset}")]
    UnknownCode { code: u8, offset: usize },
}

/// A fixed-size 3D grid of block types covering one chunk.
#[derive(Clone, PartialEq, Eq)]
pub struct BlockArray {
    blocks: Box<[BlockType]>,
}

impl BlockArray {
    /// Creates an array filled with `AIR`.
    pub fn new() -> Self {
        Self::filled(BlockType::AIR)
    }

    /// Creates an array with every cell set to `block_type`.
    pub fn filled(block_type: BlockType) -> Self {
        Self {
            blocks: vec![block_type; BLOCK_COUNT].into_boxed_slice(),
        }
    }

    #[inline]
    fn index(x: usize, y: usize, z: usize) -> usize {
        debug_assert!(x < BLOCK_WIDTH && y < BLOCK_HEIGHT && z < BLOCK_DEPTH);
        (x * BLOCK_DEPTH + z) * BLOCK_HEIGHT + y
    }

    /// Gets the block at the specified chunk-relative coordinates.
    ///
    /// # Panics
    /// Panics if the coordinates are out of bounds.
    pub fn get(&self, x: usize, y: usize, z: usize) -> BlockType {
        self.blocks[Self::index(x, y, z)]
    }

    /// Sets the block at the specified chunk-relative coordinates.
    ///
    /// # Panics
    /// Panics if the coordinates are out of bounds.
    pub fn set(&mut self, x: usize, y: usize, z: usize, block_type: BlockType) {
        self.blocks[Self::index(x, y, z)] = block_type;
    }

    /// Returns the column at `(x, z)`, bottom to top.
    pub fn column(&self, x: usize, z: usize) -> &[BlockType] {
        let start = Self::index(x, 0, z);
        &self.blocks[start..start + BLOCK_HEIGHT]
    }

    /// Returns the column at `(x, z)` for writing, bottom to top.
    pub fn column_mut(&mut self, x: usize, z: usize) -> &mut [BlockType] {
        let start = Self::index(x, 0, z);
        &mut self.blocks[start..start + BLOCK_HEIGHT]
    }

    /// Returns the largest `y` in the column whose block is not `AIR`.
    ///
    /// # Returns
    /// `None` if the whole column is air.
    pub fn column_height(&self, x: usize, z: usize) -> Option<usize> {
        self.column(x, z).iter().rposition(|block| !block.is_air())
    }

    /// Encodes the array as one storage code per cell, in storage order.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.blocks.iter().map(|block| block.code()).collect()
    }

    /// Decodes an array written by `to_bytes`.
    ///
    /// # Errors
    /// Fails if the length is not exactly one chunk or a code is unknown.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BlockDataError> {
        if bytes.len() != BLOCK_COUNT {
            return Err(BlockDataError::WrongLength {
                expected: BLOCK_COUNT,
                found: bytes.len(),
            });
        }

        let blocks = bytes
            .iter()
            .enumerate()
            .map(|(offset, &code)| {
                BlockType::from_code(code).ok_or(BlockDataError::UnknownCode { code, offset })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            blocks: blocks.into_boxed_slice(),
        })
    }

    /// Counts the cells that are not air.
    pub fn solid_count(&self) -> usize {
        self.blocks.iter().filter(|block| !block.is_air()).count()
    }
}

impl Default for BlockArray {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BlockArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockArray")
            .field("solid_count", &self.solid_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get() {
        let mut array = BlockArray::new();
        array.set(3, 100, 15, BlockType::WOOD);
        assert_eq!(array.get(3, 100, 15), BlockType::WOOD);
        assert_eq!(array.get(3, 101, 15), BlockType::AIR);
        assert_eq!(array.solid_count(), 1);
    }

    #[test]
    fn column_height_finds_topmost_solid() {
        let mut array = BlockArray::new();
        assert_eq!(array.column_height(0, 0), None);
        array.set(0, 0, 0, BlockType::DIRT);
        array.set(0, 7, 0, BlockType::GRASS);
        assert_eq!(array.column_height(0, 0), Some(7));
        assert_eq!(array.column_height(1, 0), None);
    }

    #[test]
    fn byte_order_is_x_then_z_then_y() {
        let mut array = BlockArray::new();
        array.set(0, 1, 0, BlockType::DIRT);
        array.set(0, 0, 1, BlockType::GRASS);
        array.set(1, 0, 0, BlockType::WOOD);
        let bytes = array.to_bytes();
        assert_eq!(bytes.len(), BLOCK_COUNT);
        assert_eq!(bytes[1], BlockType::DIRT.code());
        assert_eq!(bytes[BLOCK_HEIGHT], BlockType::GRASS.code());
        assert_eq!(bytes[BLOCK_DEPTH * BLOCK_HEIGHT], BlockType::WOOD.code());
    }

    #[test]
    fn decoding_rejects_bad_input() {
        assert_eq!(
            BlockArray::from_bytes(&[0u8; 10]),
            Err(BlockDataError::WrongLength {
                expected: BLOCK_COUNT,
                found: 10
            })
        );

        let mut bytes = vec![0u8; BLOCK_COUNT];
        bytes[42] = 250;
        assert_eq!(
            BlockArray::from_bytes(&bytes),
            Err(BlockDataError::UnknownCode {
                code: 250,
                offset: 42
            })
        );
    }

    #[test]
    fn decoding_restores_contents() {
        let mut array = BlockArray::new();
        for (i, block_type) in BlockType::ALL.into_iter().enumerate() {
            array.set(i, i * 20, BLOCK_DEPTH - 1 - i, block_type);
        }
        let decoded = BlockArray::from_bytes(&array.to_bytes()).expect("valid bytes");
        assert_eq!(decoded, array);
    }
}
