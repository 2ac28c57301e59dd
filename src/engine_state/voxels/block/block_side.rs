//! # Block Side Module
//!
//! This module defines the six faces of a voxel block. Faces are reported by
//! raycasts and used by placement to pick the neighbouring cell.

use cgmath::{Point3, Vector3};

/// Represents the six possible faces of a voxel block.
///
/// Each variant is named after the face of the unit cube it identifies. A ray
/// travelling towards positive Z enters a block through its `FRONT` face.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum BlockSide {
    /// The face at minimum Z (normal -Z)
    FRONT = 0,

    /// The face at maximum Z (normal +Z)
    BACK = 1,

    /// The face at minimum X (normal -X)
    LEFT = 2,

    /// The face at maximum X (normal +X)
    RIGHT = 3,

    /// The face at maximum Y (normal +Y)
    TOP = 4,

    /// The face at minimum Y (normal -Y)
    BOTTOM = 5,
}

impl BlockSide {
    /// Returns an array containing all six block faces in a consistent order.
    ///
    /// The order is: [FRONT, BACK, LEFT, RIGHT, TOP, BOTTOM], matching the
    /// discriminants, so `side as usize` indexes per-face tables.
    pub fn all() -> [BlockSide; 6] {
        [
            BlockSide::FRONT,
            BlockSide::BACK,
            BlockSide::LEFT,
            BlockSide::RIGHT,
            BlockSide::TOP,
            BlockSide::BOTTOM,
        ]
    }

    /// Returns the outward unit normal of this face.
    pub fn normal(self) -> Vector3<i32> {
        match self {
            BlockSide::FRONT => Vector3::new(0, 0, -1),
            BlockSide::BACK => Vector3::new(0, 0, 1),
            BlockSide::LEFT => Vector3::new(-1, 0, 0),
            BlockSide::RIGHT => Vector3::new(1, 0, 0),
            BlockSide::TOP => Vector3::new(0, 1, 0),
            BlockSide::BOTTOM => Vector3::new(0, -1, 0),
        }
    }

    /// Returns the coordinate of the block sharing this face with `block`.
    ///
    /// Placement uses this with the face a raycast struck to fill the cell in
    /// front of the targeted block.
    pub fn adjacent(self, block: Point3<i32>) -> Point3<i32> {
        block + self.normal()
    }
}
