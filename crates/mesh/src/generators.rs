//! Procedural mesh generators for tests and demos.
//!
//! Deterministic, resolution-configurable meshes with welded vertices, so
//! tests can make exact assertions about counts and connectivity.

use glam::Vec3;
use std::collections::HashMap;

use crate::mesh::TriMesh;

/// Generates an icosphere of the given radius centered at the origin.
///
/// Starts from a regular icosahedron and subdivides each face
/// `subdivisions` times, projecting new vertices back onto the sphere.
/// Shared edge midpoints are welded, so the result is a closed manifold.
///
/// # Example
/// ```
/// use chisel_mesh::generators::icosphere;
/// let mesh = icosphere(0, 1.0);
/// assert_eq!(mesh.vertex_count(), 12);
/// assert_eq!(mesh.triangle_count(), 20);
/// ```
pub fn icosphere(subdivisions: u32, radius: f32) -> TriMesh {
    // Golden-ratio icosahedron.
    let t = (1.0 + 5.0_f32.sqrt()) / 2.0;
    let mut positions: Vec<Vec3> = [
        (-1.0, t, 0.0),
        (1.0, t, 0.0),
        (-1.0, -t, 0.0),
        (1.0, -t, 0.0),
        (0.0, -1.0, t),
        (0.0, 1.0, t),
        (0.0, -1.0, -t),
        (0.0, 1.0, -t),
        (t, 0.0, -1.0),
        (t, 0.0, 1.0),
        (-t, 0.0, -1.0),
        (-t, 0.0, 1.0),
    ]
    .iter()
    .map(|&(x, y, z)| Vec3::new(x, y, z).normalize())
    .collect();

    let mut indices: Vec<u32> = vec![
        0, 11, 5, 0, 5, 1, 0, 1, 7, 0, 7, 10, 0, 10, 11, //
        1, 5, 9, 5, 11, 4, 11, 10, 2, 10, 7, 6, 7, 1, 8, //
        3, 9, 4, 3, 4, 2, 3, 2, 6, 3, 6, 8, 3, 8, 9, //
        4, 9, 5, 2, 4, 11, 6, 2, 10, 8, 6, 7, 9, 8, 1,
    ];

    for _ in 0..subdivisions {
        let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
        let mut next = Vec::with_capacity(indices.len() * 4);

        let mut midpoint = |a: u32, b: u32, positions: &mut Vec<Vec3>| -> u32 {
            let key = (a.min(b), a.max(b));
            *midpoints.entry(key).or_insert_with(|| {
                let mid = ((positions[a as usize] + positions[b as usize]) * 0.5).normalize();
                positions.push(mid);
                positions.len() as u32 - 1
            })
        };

        for tri in indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]];
            let ab = midpoint(a, b, &mut positions);
            let bc = midpoint(b, c, &mut positions);
            let ca = midpoint(c, a, &mut positions);
            next.extend_from_slice(&[a, ab, ca, b, bc, ab, c, ca, bc, ab, bc, ca]);
        }
        indices = next;
    }

    for p in &mut positions {
        *p *= radius;
    }

    // The generated soup is valid by construction.
    TriMesh::new(positions, indices).expect("icosphere generator produced a valid mesh")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icosphere_counts() {
        // V = 10 * 4^n + 2, F = 20 * 4^n for a subdivided icosahedron.
        for n in 0..3u32 {
            let mesh = icosphere(n, 1.0);
            let f = 20 * 4usize.pow(n);
            assert_eq!(mesh.triangle_count(), f);
            assert_eq!(mesh.vertex_count(), 10 * 4usize.pow(n) + 2);
        }
    }

    #[test]
    fn test_icosphere_vertices_on_sphere() {
        let mesh = icosphere(2, 2.5);
        for p in &mesh.positions {
            assert!((p.length() - 2.5).abs() < 1e-5);
        }
    }

    #[test]
    fn test_icosphere_is_closed() {
        // Every edge must be shared by exactly two triangles.
        let mesh = icosphere(1, 1.0);
        let mut edge_use: HashMap<(u32, u32), u32> = HashMap::new();
        for t in 0..mesh.triangle_count() as u32 {
            let [a, b, c] = mesh.triangle(t);
            for (u, v) in [(a, b), (b, c), (c, a)] {
                *edge_use.entry((u.min(v), u.max(v))).or_default() += 1;
            }
        }
        assert!(edge_use.values().all(|&count| count == 2));
    }
}
