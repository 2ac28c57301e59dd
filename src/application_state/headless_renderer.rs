//! A `ChunkRenderer` that records what it is asked to draw instead of drawing it.

use std::collections::HashMap;

use crate::engine_state::{
    rendering::{ChunkRenderer, MeshView},
    voxels::chunk::ChunkCoord,
};

/// Stand-in for a compiled chunk pipeline.
#[derive(Clone, Debug)]
pub struct ChunkShader {
    pub label: String,
}

impl ChunkShader {
    pub fn new(label: &str) -> Self {
        ChunkShader {
            label: label.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    /// Revision of the mesh "uploaded" for each chunk
    uploaded: HashMap<ChunkCoord, u64>,
    uploads: usize,
    uploaded_bytes: usize,
    frames: usize,
    total_draws: usize,
    frame_vertices: u64,
}

impl HeadlessRenderer {
    pub fn begin_frame(&mut self) {
        self.frames += 1;
        self.frame_vertices = 0;
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn total_draws(&self) -> usize {
        self.total_draws
    }

    /// Mesh uploads so far; a chunk is uploaded again only when its revision changes.
    pub fn uploads(&self) -> usize {
        self.uploads
    }

    /// Bytes of vertex data uploaded so far.
    pub fn uploaded_bytes(&self) -> usize {
        self.uploaded_bytes
    }

    pub fn frame_vertices(&self) -> u64 {
        self.frame_vertices
    }
}

impl ChunkRenderer for HeadlessRenderer {
    type Shader = ChunkShader;

    fn bind_shader(&mut self, shader: &ChunkShader) {
        log::trace!("Binding shader {}", shader.label);
    }

    fn bind_mesh(&mut self, mesh: MeshView<'_>) {
        if self.uploaded.insert(mesh.coord, mesh.revision) != Some(mesh.revision) {
            self.uploads += 1;
            self.uploaded_bytes += mesh.as_bytes().len();
        }
    }

    fn draw(&mut self, vertex_count: u32) {
        self.total_draws += 1;
        self.frame_vertices += u64::from(vertex_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::rendering::Vertex;

    #[test]
    fn reupload_only_on_new_revision() {
        let mut renderer = HeadlessRenderer::default();
        let view = |revision| MeshView {
            coord: ChunkCoord::new(0, 0),
            revision,
            vertices: &[],
        };
        renderer.bind_mesh(view(0));
        renderer.bind_mesh(view(0));
        renderer.bind_mesh(view(1));
        assert_eq!(renderer.uploads(), 2);
    }

    #[test]
    fn upload_counts_vertex_bytes() {
        let mut renderer = HeadlessRenderer::default();
        let vertices = [Vertex::new([0.0; 3], [0.0; 2], 0, 0); 6];
        renderer.bind_mesh(MeshView {
            coord: ChunkCoord::new(2, 3),
            revision: 4,
            vertices: &vertices,
        });
        assert_eq!(renderer.uploaded_bytes(), 6 * std::mem::size_of::<Vertex>());
    }

    #[test]
    fn frame_counts_reset() {
        let mut renderer = HeadlessRenderer::default();
        renderer.begin_frame();
        renderer.draw(36);
        renderer.begin_frame();
        renderer.draw(6);
        assert_eq!(renderer.frames(), 2);
        assert_eq!(renderer.total_draws(), 2);
        assert_eq!(renderer.frame_vertices(), 6);
    }
}
