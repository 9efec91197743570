//! Stroke resampling and per-frame bookkeeping.
//!
//! Pointer events arrive once per rendered frame, but brush intensity is
//! tuned per substep. [`resample`] walks the cursor from the previous cast
//! point toward the current hit in fixed-length steps so a stroke deposits
//! the same material whether it was swept in one slow frame or ten fast
//! ones.

use glam::{Vec2, Vec3};
use std::collections::HashSet;
use tracing::trace;

use crate::brush::BrushParams;

/// Substep length as a fraction of the brush radius.
const STEP_RADIUS_FRACTION: f32 = 0.15;

/// Screen-space movement floor, scaled by brush radius over hit distance.
/// Dabs stop once the pointer has travelled less than this many pixels
/// worth of on-screen brush, which keeps slow precise drags from stacking
/// substeps in place.
const PIXEL_GUARD: f32 = 200.0;

/// Ids touched by brush applications, accumulated over one frame.
///
/// Triangles and vertices feed the incremental normal refresh; nodes feed
/// the BVH refit. All three are cleared together after the per-frame
/// maintenance pass.
#[derive(Debug, Clone, Default)]
pub struct TouchedSets {
    pub triangles: HashSet<u32>,
    pub vertices: HashSet<u32>,
    pub nodes: HashSet<u32>,
}

impl TouchedSets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.triangles.clear();
        self.vertices.clear();
        self.nodes.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty() && self.vertices.is_empty() && self.nodes.is_empty()
    }
}

/// Where the active stroke is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrokePhase {
    /// No button held.
    #[default]
    Idle,
    /// Button held, waiting for the first drag frame.
    Pressed,
    /// Deforming; `last_cast` anchors the resampler.
    Dragging,
}

/// Mutable stroke state carried between frames.
#[derive(Debug, Clone, Default)]
pub struct StrokeSession {
    pub phase: StrokePhase,
    /// Surface point of the previous dab. `None` when the cursor left the
    /// mesh, which restarts the stroke at the next hit instead of sweeping
    /// across the gap.
    pub last_cast: Option<Vec3>,
    /// Pointer position of the previous dab, in physical pixels.
    pub last_pointer_px: Vec2,
    /// Whether the current gesture has pushed its undo snapshot yet.
    pub snapshotted: bool,
    /// Ids touched so far this frame, drained by the maintenance pass.
    pub touched: TouchedSets,
}

impl StrokeSession {
    pub fn reset(&mut self) {
        self.phase = StrokePhase::Idle;
        self.last_cast = None;
        self.snapshotted = false;
        self.touched.clear();
    }
}

/// Resample pointer movement into brush substep positions.
///
/// Walks `last_cast` toward `hit_point` (and `last_pointer` toward
/// `pointer_px`) by a fixed fraction per substep, emitting one dab position
/// per step, until the remaining surface distance drops under one step, the
/// screen-space guard trips, or the step budget is exhausted. The budget
/// check runs after each dab, so a frame emits at most `max_substeps + 1`
/// dabs.
///
/// On a zero-substep frame neither anchor is advanced, so small movements
/// accumulate across frames until they amount to a full step.
pub fn resample(
    last_cast: &mut Vec3,
    last_pointer: &mut Vec2,
    pointer_px: Vec2,
    hit_point: Vec3,
    hit_distance: f32,
    params: &BrushParams,
) -> Vec<Vec3> {
    let step = params.radius * STEP_RADIUS_FRACTION;
    let mut cast_dist = last_cast.distance(hit_point);
    if cast_dist <= step {
        return Vec::new();
    }

    // Fixed lerp fraction per substep, floored so one frame never needs
    // more than `max_substeps` iterations to span the swept distance.
    let percent = (step / cast_dist).max(1.0 / params.max_substeps as f32);
    let mut m_dist = last_pointer.distance(pointer_px);
    let m_step = m_dist * percent;
    let screen_floor = params.radius * PIXEL_GUARD / hit_distance;

    let mut dabs = Vec::new();
    while cast_dist > step && m_dist > screen_floor {
        *last_cast = last_cast.lerp(hit_point, percent);
        *last_pointer = last_pointer.lerp(pointer_px, percent);
        cast_dist -= step;
        m_dist -= m_step;
        dabs.push(*last_cast);
        // Post-increment budget check: the dab that exceeds the budget has
        // already been kept.
        if dabs.len() as u32 > params.max_substeps {
            break;
        }
    }

    trace!(substeps = dabs.len(), "resampled stroke segment");
    dabs
}
