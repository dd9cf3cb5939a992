//! # Procedural Geometry Generation
//!
//! Primitive shapes built in code rather than loaded from model files.
//!
//! ## Supported Primitives
//!
//! - **Plane**: two-triangle quad on the XZ plane, normal +Y
//! - **Cube**: unit cube with per-face normals
//!
//! ## Usage
//!
//! ```rust
//! use prism::gfx::geometry::{generate, PrimitiveType};
//!
//! let plane = generate(PrimitiveType::Plane);
//! assert_eq!(plane.vertex_count(), 4);
//! assert_eq!(plane.triangle_count(), 2);
//! ```

pub mod primitives;

pub use primitives::*;

use crate::gfx::scene::vertex::{compute_tangents, Vertex3D};

/// Shapes the scene can build without an asset file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Plane,
    Cube,
}

/// Generated geometry data ready for GPU upload
#[derive(Debug, Clone, Default)]
pub struct GeometryData {
    /// Vertex positions (x, y, z)
    pub vertices: Vec<[f32; 3]>,
    /// Texture coordinates (u, v)
    pub tex_coords: Vec<[f32; 2]>,
    /// Normal vectors (x, y, z)
    pub normals: Vec<[f32; 3]>,
    /// Triangle indices
    pub indices: Vec<u32>,
}

impl GeometryData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Interleaves the attribute streams into [`Vertex3D`]s with tangents
    pub fn to_scene_format(&self) -> (Vec<Vertex3D>, Vec<u32>) {
        let mut vertices: Vec<Vertex3D> = self
            .vertices
            .iter()
            .enumerate()
            .map(|(i, &position)| Vertex3D {
                position,
                normal: self.normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
                tex_coords: self.tex_coords.get(i).copied().unwrap_or([0.0, 0.0]),
                tangent: [0.0; 3],
            })
            .collect();
        compute_tangents(&mut vertices, &self.indices);

        (vertices, self.indices.clone())
    }
}

/// Builds the geometry for `primitive`
pub fn generate(primitive: PrimitiveType) -> GeometryData {
    match primitive {
        PrimitiveType::Plane => generate_plane(),
        PrimitiveType::Cube => generate_cube(),
    }
}
