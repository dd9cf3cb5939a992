//! # Vertex Data Structures
//!
//! GPU vertex format shared by every mesh and every pipeline.

/// A 3D vertex with position, normal, texture coordinate and tangent.
///
/// # Memory Layout
///
/// The `#[repr(C)]` attribute ensures the struct has a C-compatible memory
/// layout, which is required for GPU buffer operations. The stride is 44
/// bytes.
///
/// # Examples
///
/// ```no_run
/// use prism::gfx::scene::vertex::Vertex3D;
///
/// let vertex = Vertex3D {
///     position: [0.0, 1.0, 0.0],
///     normal: [0.0, 1.0, 0.0],
///     tex_coords: [0.5, 0.5],
///     tangent: [1.0, 0.0, 0.0],
/// };
/// ```
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex3D {
    /// 3D position coordinates [x, y, z]
    pub position: [f32; 3],
    /// Normal vector for lighting calculations
    pub normal: [f32; 3],
    /// Texture coordinate [u, v]
    pub tex_coords: [f32; 2],
    /// Tangent along +u, used to build the normal-map basis
    pub tangent: [f32; 3],
}

impl Vertex3D {
    const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2,
        3 => Float32x3
    ];

    /// Returns the vertex buffer layout for wgpu rendering.
    ///
    /// - Attribute 0: Position (Float32x3)
    /// - Attribute 1: Normal (Float32x3)
    /// - Attribute 2: Texture coordinate (Float32x2)
    /// - Attribute 3: Tangent (Float32x3)
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex3D>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Derives per-vertex tangents from triangle UV gradients
///
/// Tangents of triangles sharing a vertex are accumulated, then
/// Gram-Schmidt orthogonalised against the vertex normal. Vertices without
/// usable UVs get an arbitrary tangent perpendicular to the normal.
pub fn compute_tangents(vertices: &mut [Vertex3D], indices: &[u32]) {
    let mut accumulated = vec![[0.0f32; 3]; vertices.len()];

    for triangle in indices.chunks_exact(3) {
        let [i0, i1, i2] = [triangle[0] as usize, triangle[1] as usize, triangle[2] as usize];
        if i0 >= vertices.len() || i1 >= vertices.len() || i2 >= vertices.len() {
            continue;
        }
        let (v0, v1, v2) = (vertices[i0], vertices[i1], vertices[i2]);

        let edge1 = sub(v1.position, v0.position);
        let edge2 = sub(v2.position, v0.position);
        let du1 = v1.tex_coords[0] - v0.tex_coords[0];
        let dv1 = v1.tex_coords[1] - v0.tex_coords[1];
        let du2 = v2.tex_coords[0] - v0.tex_coords[0];
        let dv2 = v2.tex_coords[1] - v0.tex_coords[1];

        let det = du1 * dv2 - du2 * dv1;
        if det.abs() < f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let tangent = [
            (edge1[0] * dv2 - edge2[0] * dv1) * r,
            (edge1[1] * dv2 - edge2[1] * dv1) * r,
            (edge1[2] * dv2 - edge2[2] * dv1) * r,
        ];

        for index in [i0, i1, i2] {
            for axis in 0..3 {
                accumulated[index][axis] += tangent[axis];
            }
        }
    }

    for (vertex, tangent) in vertices.iter_mut().zip(accumulated) {
        let n = vertex.normal;
        let n_dot_t = dot(n, tangent);
        let orthogonal = sub(tangent, [n[0] * n_dot_t, n[1] * n_dot_t, n[2] * n_dot_t]);
        vertex.tangent = normalize(orthogonal).unwrap_or_else(|| any_perpendicular(n));
    }
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn normalize(v: [f32; 3]) -> Option<[f32; 3]> {
    let length = dot(v, v).sqrt();
    (length > 1e-6).then(|| [v[0] / length, v[1] / length, v[2] / length])
}

fn any_perpendicular(n: [f32; 3]) -> [f32; 3] {
    let axis = if n[0].abs() < 0.9 { [1.0, 0.0, 0.0] } else { [0.0, 1.0, 0.0] };
    let d = dot(n, axis);
    normalize(sub(axis, [n[0] * d, n[1] * d, n[2] * d])).unwrap_or([1.0, 0.0, 0.0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_stride() {
        assert_eq!(std::mem::size_of::<Vertex3D>(), 44);
        assert_eq!(Vertex3D::desc().array_stride, 44);
    }

    #[test]
    fn test_tangent_follows_u_axis() {
        let vertex = |x: f32, z: f32, u: f32, v: f32| Vertex3D {
            position: [x, 0.0, z],
            normal: [0.0, 1.0, 0.0],
            tex_coords: [u, v],
            tangent: [0.0; 3],
        };
        let mut vertices = vec![
            vertex(-1.0, -1.0, 0.0, 0.0),
            vertex(1.0, -1.0, 1.0, 0.0),
            vertex(1.0, 1.0, 1.0, 1.0),
        ];

        compute_tangents(&mut vertices, &[0, 1, 2]);

        for v in &vertices {
            assert!((v.tangent[0] - 1.0).abs() < 1e-5);
            assert!(v.tangent[1].abs() < 1e-5);
        }
    }

    #[test]
    fn test_degenerate_uvs_still_yield_unit_tangent() {
        let mut vertices = vec![
            Vertex3D {
                position: [0.0, 0.0, 0.0],
                normal: [0.0, 0.0, 1.0],
                tex_coords: [0.0, 0.0],
                tangent: [0.0; 3],
            };
            3
        ];
        vertices[1].position = [1.0, 0.0, 0.0];
        vertices[2].position = [0.0, 1.0, 0.0];

        compute_tangents(&mut vertices, &[0, 1, 2]);

        let t = vertices[0].tangent;
        assert!((dot(t, t) - 1.0).abs() < 1e-5);
        assert!(dot(t, [0.0, 0.0, 1.0]).abs() < 1e-5);
    }
}
