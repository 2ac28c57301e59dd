//! The narrow renderer contract the world draws through.
//!
//! The world never creates pipelines or buffers. It is handed a target that can
//! bind a shader, bind a mesh and issue a draw, and calls nothing else.

use super::Vertex;
use crate::engine_state::voxels::chunk::ChunkCoord;

/// A chunk mesh as handed to the renderer for one draw.
///
/// `coord` and `revision` identify the contents, so a renderer can keep GPU
/// buffers across frames and only re-upload when the revision changes.
#[derive(Copy, Clone, Debug)]
pub struct MeshView<'a> {
    pub coord: ChunkCoord,
    pub revision: u64,
    pub vertices: &'a [Vertex],
}

impl<'a> MeshView<'a> {
    /// Raw vertex bytes, ready for a buffer upload.
    pub fn as_bytes(&self) -> &'a [u8] {
        bytemuck::cast_slice(self.vertices)
    }
}

/// Per-frame render target for chunk meshes.
pub trait ChunkRenderer {
    /// Handle of the chunk shader/pipeline, owned by the caller.
    type Shader: ?Sized;

    fn bind_shader(&mut self, shader: &Self::Shader);

    /// Uploads (if needed) and binds the vertex buffer of one chunk.
    fn bind_mesh(&mut self, mesh: MeshView<'_>);

    /// Draws `vertex_count` vertices of the bound mesh as a triangle list.
    fn draw(&mut self, vertex_count: u32);
}
