//! Vertex normal computation.
//!
//! Two paths: a full accumulate-then-normalize pass used at build time, and
//! an incremental pass that refreshes only the vertices a stroke touched.

use glam::Vec3;
use std::collections::HashSet;

use crate::mesh::TriMesh;

/// Recompute every vertex normal from triangle geometry.
///
/// Face normals are accumulated at each corner and the result normalized,
/// producing smooth averaged normals.
pub fn compute_vertex_normals(mesh: &mut TriMesh) {
    for n in &mut mesh.normals {
        *n = Vec3::ZERO;
    }

    for t in 0..mesh.triangle_count() as u32 {
        let [ia, ib, ic] = mesh.triangle(t);
        let [a, b, c] = mesh.triangle_positions(t);
        let face = (b - a).cross(c - a);
        mesh.normals[ia as usize] += face;
        mesh.normals[ib as usize] += face;
        mesh.normals[ic as usize] += face;
    }

    for n in &mut mesh.normals {
        *n = n.normalize_or_zero();
    }
}

/// Incrementally refresh the normals of a touched region.
///
/// For each touched triangle the face normal is recomputed from current
/// positions and accumulated into those of its corners that are in the
/// touched-vertex set. Touched vertices had their normals zeroed when they
/// were displaced; vertices on the rim of the region keep their existing
/// normal as the base and pick up the changed adjacent faces on top of it.
/// Vertices outside the set are never written.
///
/// Finally every touched vertex is renormalized; a zero-magnitude sum is
/// left as the zero vector rather than producing NaNs.
pub fn refresh_touched(
    mesh: &mut TriMesh,
    triangles: impl IntoIterator<Item = u32>,
    vertices: &HashSet<u32>,
) {
    for t in triangles {
        let [ia, ib, ic] = mesh.triangle(t);
        let [a, b, c] = mesh.triangle_positions(t);
        let face = (b - a).cross(c - a).normalize_or_zero();

        if vertices.contains(&ia) {
            mesh.normals[ia as usize] += face;
        }
        if vertices.contains(&ib) {
            mesh.normals[ib as usize] += face;
        }
        if vertices.contains(&ic) {
            mesh.normals[ic as usize] += face;
        }
    }

    for &v in vertices {
        let n = mesh.normals[v as usize];
        let len = n.length();
        if len > 0.0 {
            mesh.normals[v as usize] = n / len;
        }
    }
}
