//! # Engine State Module
//!
//! The core engine module that manages the voxel world and everything it needs.
//!
//! ## Key Components
//!
//! * `voxels` - Voxel data, generation, persistence and the streaming `World`
//! * `rendering` - Chunk meshing and the renderer contract meshes are drawn through
//! * `settings` - `WorldSettings`, loaded from JSON
//! * `error` - Error types shared by the modules above

pub mod error;
pub mod rendering;
pub mod settings;
pub mod voxels;
