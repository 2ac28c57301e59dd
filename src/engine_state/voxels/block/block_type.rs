//! # Block Type Module
//!
//! This module defines the different types of blocks in the voxel world and
//! their one-byte storage codes.

use num_derive::FromPrimitive;

use super::BlockTypeSize;

/// Enumerates all possible block types in the voxel world.
///
/// The discriminant is the block's one-byte storage code, used both in memory and
/// in chunk files. The `FromPrimitive` derive allows conversion back from those
/// codes when a chunk is read from disk.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, FromPrimitive)]
pub enum BlockType {
    /// An air block, which is non-solid and transparent.
    #[default]
    AIR = 0,

    /// A basic dirt block, used for everything below the surface.
    DIRT = 1,

    /// A grass block with different textures on top and sides.
    GRASS = 2,

    /// A wooden block with a bark texture on all sides.
    WOOD = 3,

    /// A plain white block, often used for testing.
    WHITE = 4,
}

impl BlockType {
    /// Every block type, in code order.
    pub const ALL: [BlockType; 5] = [
        BlockType::AIR,
        BlockType::DIRT,
        BlockType::GRASS,
        BlockType::WOOD,
        BlockType::WHITE,
    ];

    /// Converts a storage code to a `BlockType`.
    ///
    /// # Returns
    /// `None` if the code does not name a known block type.
    pub fn from_code(code: BlockTypeSize) -> Option<Self> {
        num::FromPrimitive::from_u8(code)
    }

    /// Returns the one-byte storage code of this block type.
    pub fn code(self) -> BlockTypeSize {
        self as BlockTypeSize
    }

    /// Returns true for every type except `AIR`.
    pub fn is_air(self) -> bool {
        self == BlockType::AIR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_back_to_types() {
        for block_type in BlockType::ALL {
            assert_eq!(BlockType::from_code(block_type.code()), Some(block_type));
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert_eq!(BlockType::from_code(200), None);
    }
}
