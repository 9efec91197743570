//! Mesh registry for the editor.
//!
//! Owns every sculptable mesh together with its BVH and the pristine
//! buffers captured at load time, and tracks which mesh the brush is
//! currently aimed at.

use glam::Vec3;
use thiserror::Error;
use tracing::{debug, trace};

use chisel_mesh::{Bvh, MeshError, MeshId, TriMesh};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Mesh(#[from] MeshError),
    #[error("no mesh with id {0:?}")]
    UnknownMesh(MeshId),
}

/// One sculptable mesh and the acceleration/recovery state that travels
/// with it.
#[derive(Debug, Clone)]
pub struct SculptMesh {
    pub id: MeshId,
    pub mesh: TriMesh,
    pub bvh: Bvh,
    /// Load-time buffers for [`ModelSet::reset_active`].
    original_positions: Vec<Vec3>,
    original_normals: Vec<Vec3>,
}

/// All loaded meshes plus the active selection.
///
/// Ids are handed out monotonically and never reused, so history entries
/// recorded against a removed mesh stay unambiguous.
#[derive(Debug, Default)]
pub struct ModelSet {
    meshes: Vec<SculptMesh>,
    active: Option<usize>,
    next_id: u32,
}

impl ModelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate, index, and register a mesh; it becomes the active one.
    pub fn add(&mut self, positions: Vec<Vec3>, indices: Vec<u32>) -> Result<MeshId, ModelError> {
        let mesh = TriMesh::new(positions, indices)?;
        Ok(self.insert(mesh))
    }

    /// Register a mesh from raw import buffers (flat `[x, y, z, ...]`).
    pub fn add_raw(&mut self, positions: &[f32], indices: &[u32]) -> Result<MeshId, ModelError> {
        let mesh = TriMesh::from_raw(positions, indices)?;
        Ok(self.insert(mesh))
    }

    /// Register an already-validated mesh; it becomes the active one.
    pub fn insert(&mut self, mesh: TriMesh) -> MeshId {
        let id = MeshId(self.next_id);
        self.next_id += 1;
        let bvh = Bvh::build(&mesh);
        debug!(
            ?id,
            vertices = mesh.vertex_count(),
            triangles = mesh.triangle_count(),
            "registered mesh"
        );
        self.meshes.push(SculptMesh {
            id,
            original_positions: mesh.positions.clone(),
            original_normals: mesh.normals.clone(),
            mesh,
            bvh,
        });
        self.active = Some(self.meshes.len() - 1);
        id
    }

    /// Drop a mesh. The active selection falls back to the last remaining
    /// mesh, or to nothing.
    pub fn remove(&mut self, id: MeshId) -> Result<(), ModelError> {
        let index = self.index_of(id).ok_or(ModelError::UnknownMesh(id))?;
        self.meshes.remove(index);
        debug!(?id, remaining = self.meshes.len(), "removed mesh");
        self.active = if self.meshes.is_empty() {
            None
        } else {
            Some(self.meshes.len() - 1)
        };
        Ok(())
    }

    pub fn set_active(&mut self, id: MeshId) -> Result<(), ModelError> {
        let index = self.index_of(id).ok_or(ModelError::UnknownMesh(id))?;
        trace!(?id, "active mesh changed");
        self.active = Some(index);
        Ok(())
    }

    pub fn active(&self) -> Option<&SculptMesh> {
        self.active.map(|i| &self.meshes[i])
    }

    pub fn active_mut(&mut self) -> Option<&mut SculptMesh> {
        self.active.map(|i| &mut self.meshes[i])
    }

    pub fn active_id(&self) -> Option<MeshId> {
        self.active().map(|m| m.id)
    }

    pub fn get(&self, id: MeshId) -> Option<&SculptMesh> {
        self.index_of(id).map(|i| &self.meshes[i])
    }

    pub fn get_mut(&mut self, id: MeshId) -> Option<&mut SculptMesh> {
        self.index_of(id).map(|i| &mut self.meshes[i])
    }

    /// Restore the active mesh to its load-time buffers and rebuild its
    /// bounds.
    pub fn reset_active(&mut self) -> Option<MeshId> {
        let entry = self.active.map(|i| &mut self.meshes[i])?;
        entry.mesh.positions.copy_from_slice(&entry.original_positions);
        entry.mesh.normals.copy_from_slice(&entry.original_normals);
        entry.bvh.refit_all(&entry.mesh);
        debug!(id = ?entry.id, "reset mesh to original buffers");
        Some(entry.id)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SculptMesh> {
        self.meshes.iter()
    }

    fn index_of(&self, id: MeshId) -> Option<usize> {
        self.meshes.iter().position(|m| m.id == id)
    }
}
