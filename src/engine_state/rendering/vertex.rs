//! Vertex format of terrain meshes.
//!
//! This module defines the vertex layout shared by chunk geometry generation and the
//! GPU mesh renderer.

use cgmath::{Point3, Vector3};

/// A vertex of a terrain mesh.
///
/// The layout matches the vertex shader input and is uploaded as-is.
///
/// # Memory Layout
/// - Position: [f32; 3] (12 bytes)
/// - Color: [f32; 3] (12 bytes)
/// - Normal: [f32; 3] (12 bytes)
/// - Texture Coordinates: [f32; 2] (8 bytes)
///
/// Total size: 44 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// Position relative to the owning object's origin
    pub position: [f32; 3],
    /// Linear RGB color
    pub color: [f32; 3],
    /// Unit surface normal
    pub normal: [f32; 3],
    /// Texture coordinates, tiled
    pub uv: [f32; 2],
}

impl Vertex {
    /// Creates a new vertex.
    ///
    /// # Arguments
    /// * `position` - Position relative to the mesh origin
    /// * `color` - Linear RGB color
    /// * `normal` - Unit surface normal
    /// * `uv` - Texture coordinates
    pub fn new(position: Point3<f32>, color: [f32; 3], normal: Vector3<f32>, uv: [f32; 2]) -> Self {
        Vertex {
            position: position.into(),
            color,
            normal: normal.into(),
            uv,
        }
    }

    /// Position as a point.
    pub fn position(&self) -> Point3<f32> {
        Point3::from(self.position)
    }

    /// Normal as a vector.
    pub fn normal(&self) -> Vector3<f32> {
        Vector3::from(self.normal)
    }

    /// Returns the vertex buffer layout description for the shader pipeline.
    ///
    /// # Shader Attributes
    /// - `location = 0`: position (vec3<f32>)
    /// - `location = 1`: color (vec3<f32>)
    /// - `location = 2`: normal (vec3<f32>)
    /// - `location = 3`: uv (vec2<f32>)
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 9]>() as wgpu::BufferAddress,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}
