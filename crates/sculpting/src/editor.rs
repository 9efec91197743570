//! Frame-driven sculpting orchestration.
//!
//! [`SculptEditor`] owns the mesh registry, the undo history, and the
//! in-flight stroke state. The host calls [`SculptEditor::process_frame`]
//! once per rendered frame with the current pointer/ray sample; everything
//! else - resampling, brush application, incremental normal refresh, BVH
//! refit, snapshot recording - happens inside.

use glam::{Quat, Vec2, Vec3};
use tracing::{debug, trace};

use chisel_mesh::{normals, MeshId, Ray};

use crate::brush::{apply_brush, BrushParams};
use crate::history::{History, Snapshot};
use crate::models::{ModelError, ModelSet};
use crate::stroke::{self, StrokePhase, StrokeSession};

/// Placement of the on-surface brush cursor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorTransform {
    pub position: Vec3,
    /// Rotates +Z onto the averaged surface normal.
    pub rotation: Quat,
    pub radius: f32,
}

impl CursorTransform {
    fn at(position: Vec3, normal: Vec3, radius: f32) -> Self {
        Self {
            position,
            rotation: Quat::from_rotation_arc(Vec3::Z, normal),
            radius,
        }
    }
}

/// One frame's worth of pointer input, sampled by the host.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput {
    /// Pointer position in normalized window coordinates (`[0, 1]`).
    pub pointer: Vec2,
    /// Window size in physical pixels; together with `pointer` this gives
    /// the pixel-space movement the resampler guards on.
    pub viewport: Vec2,
    /// Picking ray through the pointer, in mesh-local space.
    pub ray: Ray,
    /// Primary (sculpt) button held.
    pub primary: bool,
    /// Secondary button held; sculpts with the brush direction flipped.
    pub secondary: bool,
}

/// What the host should draw and how it should treat camera input.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameOutput {
    /// Brush cursor, or `None` when the pointer is off the mesh.
    pub cursor: Option<CursorTransform>,
    /// Cursor on the mirrored side when symmetry is enabled.
    pub mirror_cursor: Option<CursorTransform>,
    /// True while a stroke owns the pointer; the host should not orbit.
    pub suppress_orbit: bool,
    /// Brush applications performed this frame (per side).
    pub substeps: u32,
}

/// The sculpting engine's top-level state machine.
#[derive(Debug, Default)]
pub struct SculptEditor {
    models: ModelSet,
    history: History,
    session: StrokeSession,
}

impl SculptEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn models(&self) -> &ModelSet {
        &self.models
    }

    pub fn add_mesh(&mut self, positions: Vec<Vec3>, indices: Vec<u32>) -> Result<MeshId, ModelError> {
        self.models.add(positions, indices)
    }

    /// Register a mesh from raw import buffers (flat `[x, y, z, ...]`).
    pub fn add_mesh_raw(&mut self, positions: &[f32], indices: &[u32]) -> Result<MeshId, ModelError> {
        self.models.add_raw(positions, indices)
    }

    pub fn insert_mesh(&mut self, mesh: chisel_mesh::TriMesh) -> MeshId {
        self.models.insert(mesh)
    }

    pub fn set_active_mesh(&mut self, id: MeshId) -> Result<(), ModelError> {
        self.session.reset();
        self.models.set_active(id)
    }

    pub fn remove_mesh(&mut self, id: MeshId) -> Result<(), ModelError> {
        self.session.reset();
        self.models.remove(id)
    }

    /// Restore the active mesh to its load-time state. Not a history
    /// operation; the reset itself cannot be undone.
    pub fn reset_active(&mut self) -> Option<MeshId> {
        self.session.reset();
        self.models.reset_active()
    }

    pub fn undo(&mut self) -> Option<MeshId> {
        self.session.reset();
        self.history.undo(&mut self.models)
    }

    pub fn redo(&mut self) -> Option<MeshId> {
        self.session.reset();
        self.history.redo(&mut self.models)
    }

    pub fn is_stroke_active(&self) -> bool {
        self.session.phase != StrokePhase::Idle
    }

    pub fn undo_len(&self) -> usize {
        self.history.undo_len()
    }

    pub fn redo_len(&self) -> usize {
        self.history.redo_len()
    }

    /// Advance the editor by one frame of pointer input.
    pub fn process_frame(&mut self, input: &FrameInput, params: &BrushParams) -> FrameOutput {
        let session = &mut self.session;
        let button = input.primary || input.secondary;
        let pointer_px = input.pointer * input.viewport;

        let Some(entry) = self.models.active_mut() else {
            trace!("no active mesh, frame ignored");
            return FrameOutput::default();
        };

        let Some(hit) = entry.bvh.raycast(&entry.mesh, &input.ray) else {
            // Off the mesh: hide the cursor and break the stroke segment so
            // re-entry does not sweep a dab across the gap.
            session.last_cast = None;
            if !button {
                session.reset();
            }
            return FrameOutput {
                suppress_orbit: false,
                ..Default::default()
            };
        };

        let mut output = FrameOutput {
            suppress_orbit: button,
            ..Default::default()
        };
        let mut cursor_normal = None;

        if !button {
            // Hover: orient the cursor without touching geometry.
            if session.phase != StrokePhase::Idle {
                debug!("stroke ended");
            }
            session.reset();
            let preview = apply_brush(
                &mut entry.mesh,
                &entry.bvh,
                hit.point,
                params,
                false,
                true,
                &mut session.touched,
            );
            session.touched.clear();
            cursor_normal = preview.averaged_normal;
        } else if let Some(cast) = session.last_cast.as_mut() {
            session.phase = StrokePhase::Dragging;
            let dabs = stroke::resample(
                cast,
                &mut session.last_pointer_px,
                pointer_px,
                hit.point,
                hit.distance,
                params,
            );

            if dabs.is_empty() {
                // Movement below one substep: keep the anchor where it is so
                // the distance accumulates, but still orient the cursor.
                let preview = apply_brush(
                    &mut entry.mesh,
                    &entry.bvh,
                    hit.point,
                    params,
                    false,
                    true,
                    &mut session.touched,
                );
                session.touched.clear();
                cursor_normal = preview.averaged_normal;
            } else {
                // Captured before the first dab can mutate the buffers, but
                // recorded only once a dab displaces a vertex: a drag whose
                // sphere never reaches a vertex must leave history untouched.
                let mut pending =
                    (!session.snapshotted).then(|| Snapshot::capture(entry));
                output.substeps = dabs.len() as u32;

                for dab in &dabs {
                    let result = apply_brush(
                        &mut entry.mesh,
                        &entry.bvh,
                        *dab,
                        params,
                        input.secondary,
                        false,
                        &mut session.touched,
                    );
                    if result.averaged_normal.is_some() {
                        cursor_normal = result.averaged_normal;
                    }
                    let mut displaced = result.displaced;
                    if let Some(plane) = params.symmetry {
                        let mirrored = apply_brush(
                            &mut entry.mesh,
                            &entry.bvh,
                            plane.mirror(*dab),
                            params,
                            input.secondary,
                            false,
                            &mut session.touched,
                        );
                        displaced += mirrored.displaced;
                        if let Some(n) = mirrored.averaged_normal {
                            output.mirror_cursor = Some(CursorTransform::at(
                                plane.mirror(hit.point),
                                n,
                                params.radius,
                            ));
                        }
                    }
                    if displaced > 0 {
                        if let Some(snapshot) = pending.take() {
                            self.history.begin_gesture(snapshot);
                            session.snapshotted = true;
                        }
                    }
                }

                // One maintenance pass per frame covering every substep:
                // patch the normals the brush zeroed, then refit the visited
                // BVH nodes over the moved geometry.
                normals::refresh_touched(
                    &mut entry.mesh,
                    session.touched.triangles.iter().copied(),
                    &session.touched.vertices,
                );
                entry
                    .bvh
                    .refit(&entry.mesh, session.touched.nodes.iter().copied());
                trace!(
                    substeps = output.substeps,
                    vertices = session.touched.vertices.len(),
                    nodes = session.touched.nodes.len(),
                    "frame maintenance"
                );
                session.touched.clear();
            }
        } else {
            // Press (or re-entry mid-gesture): anchor the resampler here.
            session.last_cast = Some(hit.point);
            session.last_pointer_px = pointer_px;
            if session.phase == StrokePhase::Idle {
                session.phase = StrokePhase::Pressed;
            }
            let preview = apply_brush(
                &mut entry.mesh,
                &entry.bvh,
                hit.point,
                params,
                false,
                true,
                &mut session.touched,
            );
            session.touched.clear();
            cursor_normal = preview.averaged_normal;
        }

        let normal = cursor_normal.unwrap_or(Vec3::Z);
        output.cursor = Some(CursorTransform::at(hit.point, normal, params.radius));
        if output.mirror_cursor.is_none() {
            if let Some(plane) = params.symmetry {
                output.mirror_cursor = Some(CursorTransform::at(
                    plane.mirror(hit.point),
                    plane.mirror(normal),
                    params.radius,
                ));
            }
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chisel_mesh::icosphere;

    fn editor_with_sphere() -> SculptEditor {
        let mut editor = SculptEditor::new();
        editor.insert_mesh(icosphere(3, 1.0));
        editor
    }

    fn frame(pointer: Vec2, primary: bool) -> FrameInput {
        FrameInput {
            pointer,
            viewport: Vec2::new(1920.0, 1080.0),
            // Ray straight down -Z through the pointer's world offset, so
            // moving the pointer sweeps the hit across the +Z pole.
            ray: Ray {
                origin: Vec3::new(pointer.x - 0.5, pointer.y - 0.5, 3.0),
                direction: Vec3::NEG_Z,
            },
            primary,
            secondary: false,
        }
    }

    #[test]
    fn test_hover_shows_cursor_without_deforming() {
        let mut editor = editor_with_sphere();
        let before = editor.models().active().unwrap().mesh.positions.clone();

        let out = editor.process_frame(&frame(Vec2::new(0.5, 0.5), false), &BrushParams::default());

        assert!(out.cursor.is_some());
        assert!(!out.suppress_orbit);
        assert_eq!(out.substeps, 0);
        assert_eq!(editor.models().active().unwrap().mesh.positions, before);
        assert_eq!(editor.undo_len(), 0);
    }

    #[test]
    fn test_miss_hides_cursor() {
        let mut editor = editor_with_sphere();
        let input = FrameInput {
            ray: Ray {
                origin: Vec3::new(5.0, 0.0, 3.0),
                direction: Vec3::NEG_Z,
            },
            ..frame(Vec2::new(0.9, 0.5), false)
        };
        let out = editor.process_frame(&input, &BrushParams::default());
        assert!(out.cursor.is_none());
        assert!(!out.suppress_orbit);
    }

    #[test]
    fn test_press_anchors_without_deforming() {
        let mut editor = editor_with_sphere();
        let before = editor.models().active().unwrap().mesh.positions.clone();

        let out = editor.process_frame(&frame(Vec2::new(0.5, 0.5), true), &BrushParams::default());

        assert!(out.suppress_orbit);
        assert_eq!(out.substeps, 0);
        assert!(editor.is_stroke_active());
        assert_eq!(editor.models().active().unwrap().mesh.positions, before);
        // Snapshot waits for the first deforming substep.
        assert_eq!(editor.undo_len(), 0);
    }

    #[test]
    fn test_drag_deforms_and_records_one_gesture() {
        let mut editor = editor_with_sphere();
        let params = BrushParams::default();
        let before = editor.models().active().unwrap().mesh.positions.clone();

        editor.process_frame(&frame(Vec2::new(0.45, 0.5), true), &params);
        let mut total_substeps = 0;
        for i in 1..=6 {
            let x = 0.45 + i as f32 * 0.02;
            let out = editor.process_frame(&frame(Vec2::new(x, 0.5), true), &params);
            total_substeps += out.substeps;
        }
        assert!(total_substeps > 0);
        assert_ne!(editor.models().active().unwrap().mesh.positions, before);
        // However many frames, one gesture means one undo entry.
        assert_eq!(editor.undo_len(), 1);

        // Displaced vertices got their normals refreshed, not left zeroed.
        for n in &editor.models().active().unwrap().mesh.normals {
            assert!(n.length() > 0.9);
        }

        editor.process_frame(&frame(Vec2::new(0.6, 0.5), false), &params);
        assert!(!editor.is_stroke_active());

        editor.undo().unwrap();
        assert_eq!(editor.models().active().unwrap().mesh.positions, before);
    }

    #[test]
    fn test_non_deforming_drag_leaves_history_untouched() {
        // Coarse mesh, tiny brush: the icosahedron's face interiors are far
        // from every vertex, so dabs run without displacing anything.
        let mut editor = SculptEditor::new();
        editor.insert_mesh(icosphere(0, 1.0));
        let params = BrushParams {
            radius: 0.02,
            ..Default::default()
        };
        let before = editor.models().active().unwrap().mesh.positions.clone();

        // Sweep across the interior of the face straddling +X/+Z.
        editor.process_frame(&frame(Vec2::new(0.78, 0.46), true), &params);
        let mut substeps = 0;
        for i in 1..=5 {
            let p = Vec2::new(0.78, 0.46 + i as f32 * 0.02);
            substeps += editor.process_frame(&frame(p, true), &params).substeps;
        }
        editor.process_frame(&frame(Vec2::new(0.78, 0.56), false), &params);

        assert!(substeps > 0, "the drag should have resampled into dabs");
        assert_eq!(editor.models().active().unwrap().mesh.positions, before);
        // No displacement, no gesture: undo stays empty.
        assert_eq!(editor.undo_len(), 0);
        assert!(editor.undo().is_none());
    }

    #[test]
    fn test_stationary_press_and_release_leaves_no_history() {
        let mut editor = editor_with_sphere();
        let params = BrushParams::default();

        editor.process_frame(&frame(Vec2::new(0.5, 0.5), true), &params);
        editor.process_frame(&frame(Vec2::new(0.5, 0.5), true), &params);
        editor.process_frame(&frame(Vec2::new(0.5, 0.5), false), &params);

        assert_eq!(editor.undo_len(), 0);
        assert!(editor.undo().is_none());
    }

    #[test]
    fn test_symmetry_mirrors_displacement() {
        let mut editor = editor_with_sphere();
        let params = BrushParams {
            symmetry: Some(crate::brush::SymmetryPlane::X),
            radius: 0.15,
            ..Default::default()
        };

        // Stroke offset from the mirror plane so the two sides are distinct.
        editor.process_frame(&frame(Vec2::new(0.7, 0.5), true), &params);
        let mut out = FrameOutput::default();
        for i in 1..=5 {
            let x = 0.7 + i as f32 * 0.015;
            out = editor.process_frame(&frame(Vec2::new(x, 0.5), true), &params);
        }
        assert!(out.mirror_cursor.is_some());

        // Both sides of the x = 0 plane gained material.
        let mesh = &editor.models().active().unwrap().mesh;
        let raised = |side: f32| {
            mesh.positions
                .iter()
                .filter(|p| p.x * side > 0.05 && p.z > 0.5)
                .any(|p| p.length() > 1.0 + 1e-4)
        };
        assert!(raised(1.0));
        assert!(raised(-1.0));
    }

    #[test]
    fn test_undo_mid_hover_cancels_session() {
        let mut editor = editor_with_sphere();
        let params = BrushParams::default();
        editor.process_frame(&frame(Vec2::new(0.45, 0.5), true), &params);
        for i in 1..=4 {
            editor.process_frame(&frame(Vec2::new(0.45 + i as f32 * 0.02, 0.5), true), &params);
        }
        assert!(editor.is_stroke_active());

        editor.undo();
        assert!(!editor.is_stroke_active());
    }
}
