//! # Primitive Shape Generation
//!
//! All shapes come with normals and texture coordinates; tangents are
//! derived when the data is converted to [`Vertex3D`](crate::gfx::scene::vertex::Vertex3D).

use super::GeometryData;

/// Generate the ground quad: corners at (±1, 0, ±1), normal +Y
///
/// UVs run (0,0) → (1,0) → (1,1) → (0,1) around the corners, split into the
/// triangles `0 1 2` and `0 2 3`.
pub fn generate_plane() -> GeometryData {
    GeometryData {
        vertices: vec![
            [-1.0, 0.0, -1.0],
            [1.0, 0.0, -1.0],
            [1.0, 0.0, 1.0],
            [-1.0, 0.0, 1.0],
        ],
        tex_coords: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
        normals: vec![[0.0, 1.0, 0.0]; 4],
        indices: vec![0, 1, 2, 0, 2, 3],
    }
}

/// Generate a unit cube centered at the origin
///
/// Vertices span -0.5 to 0.5 on all axes. Each face has its own four
/// vertices so normals stay flat, and UVs cover 0 to 1 per face.
pub fn generate_cube() -> GeometryData {
    // (normal, u axis, v axis) per face; corners are normal ± u ± v
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ];

    let mut data = GeometryData::new();
    for (face, (normal, u_axis, v_axis)) in faces.iter().enumerate() {
        let base = (face * 4) as u32;
        for (u, v) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            let corner = |axis: usize| {
                0.5 * normal[axis] + (u - 0.5) * u_axis[axis] + (v - 0.5) * v_axis[axis]
            };
            data.vertices.push([corner(0), corner(1), corner(2)]);
            data.normals.push(*normal);
            data.tex_coords.push([u, 1.0 - v]);
        }
        // counter-clockwise seen from outside
        data.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
        [
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
        ]
    }

    #[test]
    fn test_plane_generation() {
        let plane = generate_plane();
        assert_eq!(plane.vertex_count(), 4);
        assert_eq!(plane.indices, vec![0, 1, 2, 0, 2, 3]);
        assert!(plane.normals.iter().all(|n| *n == [0.0, 1.0, 0.0]));
        assert!(plane.vertices.iter().all(|p| p[1] == 0.0 && p[0].abs() == 1.0 && p[2].abs() == 1.0));
    }

    #[test]
    fn test_cube_generation() {
        let cube = generate_cube();
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.triangle_count(), 12);
        assert!(cube.vertices.iter().flatten().all(|c| c.abs() == 0.5));
    }

    #[test]
    fn test_cube_winding_faces_outward() {
        let cube = generate_cube();
        for triangle in cube.indices.chunks_exact(3) {
            let [a, b, c] = [0, 1, 2].map(|i| cube.vertices[triangle[i] as usize]);
            let e1 = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
            let e2 = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
            let face = cross(e1, e2);
            let n = cube.normals[triangle[0] as usize];
            assert!(face[0] * n[0] + face[1] * n[1] + face[2] * n[2] > 0.0);
        }
    }

    #[test]
    fn test_scene_format_has_unit_tangents() {
        let (vertices, indices) = generate_cube().to_scene_format();
        assert_eq!(indices.len(), 36);
        for v in vertices {
            let t = v.tangent;
            let length = (t[0] * t[0] + t[1] * t[1] + t[2] * t[2]).sqrt();
            assert!((length - 1.0).abs() < 1e-4);
        }
    }
}
