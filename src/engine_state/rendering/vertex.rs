//! Vertex data for chunk meshes.
//!
//! The layout is `#[repr(C)]` and `Pod` so a renderer can upload a mesh with a
//! single `bytemuck::cast_slice`.

/// A vertex of a chunk mesh.
///
/// # Memory Layout
/// - Position: 3x f32 (12 bytes), world space
/// - UV: 2x f32 (8 bytes), within the face's atlas tile
/// - Texture index: u32 (4 bytes), atlas tile from the block's descriptor
/// - Side: u32 (4 bytes), `BlockSide` discriminant, lets the shader pick a normal
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub texture_index: u32,
    pub side: u32,
}

impl Vertex {
    pub fn new(position: [f32; 3], uv: [f32; 2], texture_index: u32, side: u32) -> Self {
        Vertex {
            position,
            uv,
            texture_index,
            side,
        }
    }
}
