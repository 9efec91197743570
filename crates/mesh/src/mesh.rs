//! Deformable triangle-mesh buffers.
//!
//! A [`TriMesh`] owns flat, mutable position and normal buffers plus a fixed
//! triangle index buffer. Connectivity never changes after construction; the
//! sculpting engine edits positions in place and patches normals
//! incrementally.

use glam::Vec3;
use thiserror::Error;

/// Identifies a mesh across the editor, history, and collaborator calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u32);

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("index buffer length {0} is not divisible by 3")]
    IndexBufferLength(usize),
    #[error("position buffer length {0} is not divisible by 3")]
    PositionBufferLength(usize),
    #[error("triangle {triangle} references vertex {index}, but the mesh has {vertex_count} vertices")]
    IndexOutOfRange {
        triangle: usize,
        index: u32,
        vertex_count: usize,
    },
    #[error("mesh has no triangles")]
    Empty,
}

/// Triangle mesh with mutable position/normal buffers and fixed connectivity.
///
/// Invariants (checked at construction, preserved by all mutation paths):
/// - `positions.len() == normals.len()`
/// - `indices.len() % 3 == 0` and every index `< positions.len()`
#[derive(Debug, Clone)]
pub struct TriMesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    indices: Vec<u32>,
}

impl TriMesh {
    /// Build a mesh from a triangle soup, validating connectivity.
    ///
    /// Fails without attaching any state if the buffers are malformed.
    /// Vertex normals are computed as part of the build.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Result<Self, MeshError> {
        if indices.len() % 3 != 0 {
            return Err(MeshError::IndexBufferLength(indices.len()));
        }
        if indices.is_empty() {
            return Err(MeshError::Empty);
        }
        for (tri, chunk) in indices.chunks_exact(3).enumerate() {
            for &index in chunk {
                if index as usize >= positions.len() {
                    return Err(MeshError::IndexOutOfRange {
                        triangle: tri,
                        index,
                        vertex_count: positions.len(),
                    });
                }
            }
        }

        let normals = vec![Vec3::ZERO; positions.len()];
        let mut mesh = Self {
            positions,
            normals,
            indices,
        };
        crate::normals::compute_vertex_normals(&mut mesh);
        Ok(mesh)
    }

    /// Build a mesh from raw import buffers (flat `[x, y, z, x, y, z, ...]`).
    ///
    /// This is the ingestion point for the import collaborator; file parsing
    /// happens upstream.
    pub fn from_raw(positions: &[f32], indices: &[u32]) -> Result<Self, MeshError> {
        if positions.len() % 3 != 0 {
            return Err(MeshError::PositionBufferLength(positions.len()));
        }
        let positions: Vec<Vec3> = bytemuck::cast_slice::<f32, Vec3>(positions).to_vec();
        Self::new(positions, indices.to_vec())
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertex indices of triangle `t`.
    #[inline]
    pub fn triangle(&self, t: u32) -> [u32; 3] {
        let i = t as usize * 3;
        [self.indices[i], self.indices[i + 1], self.indices[i + 2]]
    }

    /// Current positions of triangle `t`'s corners.
    #[inline]
    pub fn triangle_positions(&self, t: u32) -> [Vec3; 3] {
        let [a, b, c] = self.triangle(t);
        [
            self.positions[a as usize],
            self.positions[b as usize],
            self.positions[c as usize],
        ]
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }
}
