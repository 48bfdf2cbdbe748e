//! Vertex layout and mesh containers

use ash::vk;
use bytemuck::{Pod, Zeroable};
use std::mem::{offset_of, size_of};

/// 2D vertex with color and texture coordinates
///
/// Field order defines the GPU attribute offsets: position at 0, color at 8,
/// texture coordinates at 20.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    /// Screen-space position in pixels
    pub position: [f32; 2],
    /// Linear RGB color
    pub color: [f32; 3],
    /// Texture coordinates
    pub tex_coord: [f32; 2],
}

impl Vertex {
    /// Create a vertex with zero texture coordinates
    pub const fn new(position: [f32; 2], color: [f32; 3]) -> Self {
        Self {
            position,
            color,
            tex_coord: [0.0, 0.0],
        }
    }

    /// Create a vertex with explicit texture coordinates
    pub const fn with_tex_coord(position: [f32; 2], color: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            position,
            color,
            tex_coord,
        }
    }

    /// Vertex buffer binding description
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Vertex attribute descriptions
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: offset_of!(Self, position) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(Self, color) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 2,
                format: vk::Format::R32G32_SFLOAT,
                offset: offset_of!(Self, tex_coord) as u32,
            },
        ]
    }
}

/// An ordered list of vertices owned by the caller
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Vertices in draw order
    pub vertices: Vec<Vertex>,
}

impl Mesh {
    /// Wrap a vertex list
    pub fn new(vertices: Vec<Vertex>) -> Self {
        Self { vertices }
    }

    /// Number of vertices
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Whether the mesh has no vertices
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}
