//! # Block Module
//!
//! This module provides the core block-related functionality: block type
//! definitions, block faces, and the `BlockServer` registry that maps each
//! type to its material description.

use std::collections::HashMap;

use block_side::BlockSide;
use block_type::BlockType;
use serde::{Deserialize, Serialize};

pub mod block_side;
pub mod block_type;

/// The underlying integer type used to represent block types in memory and on disk.
pub type BlockTypeSize = u8;

/// Texture indices for each block type, one per face in `BlockSide` order:
/// [Front, Back, Left, Right, Top, Bottom]
const DEFAULT_TEXTURE_INDICES: [(BlockType, [u32; 6]); 4] = [
    (BlockType::WOOD, [0, 0, 0, 0, 0, 0]),
    (BlockType::DIRT, [1, 1, 1, 1, 1, 1]),
    (BlockType::GRASS, [2, 2, 2, 2, 3, 1]),
    (BlockType::WHITE, [4, 4, 4, 4, 4, 4]),
];

/// Visual and material description of one block type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockDescriptor {
    /// Human readable name, used in logs
    pub name: String,
    /// Whether the block occludes neighbours and stops raycasts
    pub solid: bool,
    /// Atlas index of each face, indexed by `BlockSide as usize`
    pub texture_indices: [u32; 6],
}

impl BlockDescriptor {
    /// Returns the atlas index used for `side`.
    pub fn texture_index(&self, side: BlockSide) -> u32 {
        self.texture_indices[side as usize]
    }
}

/// Registry mapping each `BlockType` to its `BlockDescriptor`.
///
/// The server is owned by the game and shared with the world, which consults
/// it when building chunk meshes.
#[derive(Clone, Debug)]
pub struct BlockServer {
    descriptors: HashMap<BlockType, BlockDescriptor>,
}

impl BlockServer {
    /// Creates a registry with the built-in block set.
    pub fn new() -> Self {
        let mut descriptors = HashMap::new();
        descriptors.insert(
            BlockType::AIR,
            BlockDescriptor {
                name: "air".to_string(),
                solid: false,
                texture_indices: [0; 6],
            },
        );
        for (block_type, texture_indices) in DEFAULT_TEXTURE_INDICES {
            descriptors.insert(
                block_type,
                BlockDescriptor {
                    name: format!("{:?}", block_type).to_lowercase(),
                    solid: true,
                    texture_indices,
                },
            );
        }
        Self { descriptors }
    }

    /// Replaces the descriptor of `block_type`.
    ///
    /// `AIR` always stays non-solid; a solid air descriptor is ignored.
    pub fn register(&mut self, block_type: BlockType, descriptor: BlockDescriptor) {
        if block_type.is_air() && descriptor.solid {
            log::warn!("Refusing to register a solid descriptor for air");
            return;
        }
        self.descriptors.insert(block_type, descriptor);
    }

    /// Looks up the descriptor of `block_type`.
    pub fn descriptor(&self, block_type: BlockType) -> Option<&BlockDescriptor> {
        self.descriptors.get(&block_type)
    }

    /// Returns whether blocks of this type are solid. Unregistered types are not.
    pub fn is_solid(&self, block_type: BlockType) -> bool {
        self.descriptors
            .get(&block_type)
            .map(|descriptor| descriptor.solid)
            .unwrap_or(false)
    }
}

impl Default for BlockServer {
    fn default() -> Self {
        Self::new()
    }
}
