//! Rendering support for the voxel world.
//!
//! This module turns chunk blocks into vertex data and defines the small
//! interface the world draws through. Surface, device and pipeline management
//! belong to the host application; the world only needs something that can
//! bind a shader, bind a mesh and draw.

mod chunk_mesh;
mod renderer;
mod vertex;

// Re-export commonly used types
pub use chunk_mesh::ChunkMesh;
pub use renderer::{ChunkRenderer, MeshView};
pub use vertex::Vertex;
