//! Snapshot-based undo/redo.
//!
//! Each history entry is a full copy of one mesh's position and normal
//! buffers, tagged with the mesh it belongs to. Undoing an entry recorded
//! against a non-active mesh first switches the active selection, so the
//! restore is always visible.

use glam::Vec3;
use tracing::debug;

use chisel_mesh::MeshId;

use crate::models::{ModelSet, SculptMesh};

/// Full-buffer copy of one mesh's deformable state.
#[derive(Debug, Clone)]
pub struct Snapshot {
    mesh: MeshId,
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
}

impl Snapshot {
    pub fn capture(entry: &SculptMesh) -> Self {
        Self {
            mesh: entry.id,
            positions: entry.mesh.positions.clone(),
            normals: entry.mesh.normals.clone(),
        }
    }

    pub fn mesh(&self) -> MeshId {
        self.mesh
    }

    /// Swap this snapshot's buffers into the mesh, leaving the mesh's
    /// previous state in `self`. The BVH is refit afterwards by the caller.
    fn restore(&mut self, entry: &mut SculptMesh) {
        std::mem::swap(&mut entry.mesh.positions, &mut self.positions);
        std::mem::swap(&mut entry.mesh.normals, &mut self.normals);
    }
}

/// Undo and redo stacks of full-buffer snapshots.
///
/// Connectivity is immutable, so restoring a snapshot followed by a full
/// BVH refit is equivalent to rebuilding the index from scratch.
#[derive(Debug, Default)]
pub struct History {
    undo: Vec<Snapshot>,
    redo: Vec<Snapshot>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the pre-stroke state of a new deforming gesture. Any redo
    /// entries are invalidated; the timeline forks here.
    ///
    /// The snapshot is captured by the caller before the gesture's first
    /// displacement, so recording can wait until a substep actually moves a
    /// vertex.
    pub fn begin_gesture(&mut self, snapshot: Snapshot) {
        self.redo.clear();
        debug!(mesh = ?snapshot.mesh, depth = self.undo.len() + 1, "gesture recorded");
        self.undo.push(snapshot);
    }

    /// Revert the most recent gesture. Returns the affected mesh id, or
    /// `None` when the undo stack is empty.
    pub fn undo(&mut self, models: &mut ModelSet) -> Option<MeshId> {
        Self::apply(&mut self.undo, &mut self.redo, models, "undo")
    }

    /// Reapply the most recently undone gesture.
    pub fn redo(&mut self, models: &mut ModelSet) -> Option<MeshId> {
        Self::apply(&mut self.redo, &mut self.undo, models, "redo")
    }

    fn apply(
        from: &mut Vec<Snapshot>,
        to: &mut Vec<Snapshot>,
        models: &mut ModelSet,
        label: &str,
    ) -> Option<MeshId> {
        let Some(mut snapshot) = from.pop() else {
            debug!("nothing to {label}");
            return None;
        };
        let id = snapshot.mesh;
        let Some(entry) = models.get_mut(id) else {
            // The tagged mesh was removed; its history is dead weight.
            debug!(mesh = ?id, "dropping history entry for removed mesh");
            return None;
        };

        // Current state moves to the opposite stack via the buffer swap.
        snapshot.restore(entry);
        entry.bvh.refit_all(&entry.mesh);
        to.push(snapshot);

        if models.active_id() != Some(id) {
            // Infallible: the entry was just looked up.
            let _ = models.set_active(id);
        }
        debug!(mesh = ?id, "{label} applied");
        Some(id)
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }
}
