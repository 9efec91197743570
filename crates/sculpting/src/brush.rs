//! Brush parameters and the falloff/displacement model.
//!
//! A brush application is one bounded sphere query plus one pass of
//! per-vertex displacement. The constants in the displacement math - the
//! clay plane-pull factor (`0.3`), the flatten scale (`0.01 * 0.5`) - are
//! empirical tuning, not derived; changing them changes the feel of the
//! brush.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use chisel_mesh::{Bvh, TriMesh};

use crate::stroke::TouchedSets;

/// Base displacement scale: intensity is a unitless 1-50 slider value and
/// this converts it to world units per substep.
const INTENSITY_SCALE: f32 = 0.0001;

/// Displacement function of the brush.
///
/// A closed set with branching math, not an open plugin surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BrushMode {
    /// Raise (or lower, inverted) the surface along the averaged normal.
    #[default]
    Draw,
    /// Build up material while pulling the surface toward the local plane,
    /// producing a flat-topped ridge instead of a pure bump.
    Clay,
    /// Pull affected vertices toward the averaged reference plane.
    Flatten,
}

/// Plane through the origin across which strokes are mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymmetryPlane {
    /// Mirror across x = 0.
    X,
    /// Mirror across y = 0.
    Y,
    /// Mirror across z = 0.
    Z,
}

impl SymmetryPlane {
    /// Reflect a point (or direction) across the plane.
    pub fn mirror(&self, v: Vec3) -> Vec3 {
        match self {
            SymmetryPlane::X => Vec3::new(-v.x, v.y, v.z),
            SymmetryPlane::Y => Vec3::new(v.x, -v.y, v.z),
            SymmetryPlane::Z => Vec3::new(v.x, v.y, -v.z),
        }
    }
}

#[derive(Debug, Error)]
pub enum BrushParamsError {
    #[error("brush radius must be positive and finite, got {0}")]
    InvalidRadius(f32),
    #[error("max_substeps must be at least 1")]
    InvalidMaxSubsteps,
    #[error("intensity must be finite, got {0}")]
    InvalidIntensity(f32),
}

/// Current brush configuration, owned by the UI layer and consumed by value
/// at query time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BrushParams {
    /// Brush sphere radius in world units.
    pub radius: f32,
    pub mode: BrushMode,
    /// Unitless strength (UI slider range 1-50).
    pub intensity: f32,
    /// Swap raise/lower without holding the secondary button.
    pub invert: bool,
    /// Hard cap on resampled substeps per frame.
    pub max_substeps: u32,
    /// Mirror strokes across this plane when set.
    pub symmetry: Option<SymmetryPlane>,
}

impl Default for BrushParams {
    fn default() -> Self {
        Self {
            radius: 0.1,
            mode: BrushMode::Draw,
            intensity: 25.0,
            invert: false,
            max_substeps: 10,
            symmetry: None,
        }
    }
}

impl BrushParams {
    pub fn validate(&self) -> Result<(), BrushParamsError> {
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(BrushParamsError::InvalidRadius(self.radius));
        }
        if self.max_substeps == 0 {
            return Err(BrushParamsError::InvalidMaxSubsteps);
        }
        if !self.intensity.is_finite() {
            return Err(BrushParamsError::InvalidIntensity(self.intensity));
        }
        Ok(())
    }
}

/// Result of one brush application.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrushApply {
    /// Averaged outward normal over the affected vertices, used to orient
    /// the cursor. `None` when no vertex fell inside the sphere.
    pub averaged_normal: Option<Vec3>,
    /// Number of vertices displaced (0 for preview applications).
    pub displaced: usize,
}

/// Apply the brush at `center` (mesh-local space).
///
/// Queries the BVH for affected vertices, accumulates touched
/// triangle/vertex/node ids into `touched`, and - unless `preview_only` -
/// displaces positions in place and zeroes the stored normals of displaced
/// vertices, leaving them stale for the per-frame incremental refresh.
///
/// Vertices are gathered first and each is read exactly once during the
/// displacement pass, so per-vertex updates are order-insensitive.
pub fn apply_brush(
    mesh: &mut TriMesh,
    bvh: &Bvh,
    center: Vec3,
    params: &BrushParams,
    secondary: bool,
    preview_only: bool,
    touched: &mut TouchedSets,
) -> BrushApply {
    let radius = params.radius;
    let r2 = radius * radius;

    // Bounded query: fully contained leaves skip per-vertex distance tests.
    // `seen` dedupes within this application; `touched` accumulates across
    // every substep of the frame.
    let mut indices: Vec<u32> = Vec::new();
    let mut seen: std::collections::HashSet<u32> = std::collections::HashSet::new();
    bvh.query_sphere(
        center,
        radius,
        &mut |tri, contained| {
            touched.triangles.insert(tri);
            for v in mesh.triangle(tri) {
                if contained || mesh.positions[v as usize].distance_squared(center) <= r2 {
                    if seen.insert(v) {
                        indices.push(v);
                    }
                    touched.vertices.insert(v);
                }
            }
        },
        &mut |node| {
            touched.nodes.insert(node);
        },
    );

    if indices.is_empty() {
        // Undefined averaged normal: skip displacement entirely.
        return BrushApply::default();
    }

    // Averaged stroke normal and (for deforming strokes) the reference plane
    // point at the centroid of the affected vertices.
    let mut normal = Vec3::ZERO;
    let mut plane_point = Vec3::ZERO;
    for &v in &indices {
        normal += mesh.normals[v as usize];
        if !preview_only {
            plane_point += mesh.positions[v as usize];
        }
    }
    let normal = normal.normalize_or_zero();

    if preview_only {
        return BrushApply {
            averaged_normal: (normal != Vec3::ZERO).then_some(normal),
            displaced: 0,
        };
    }

    plane_point /= indices.len() as f32;

    let target_height = params.intensity * INTENSITY_SCALE;
    let sign = if params.invert != secondary { -1.0 } else { 1.0 };

    for &v in &indices {
        let mut pos = mesh.positions[v as usize];
        let dist = pos.distance(center);
        // In [0, 1] by construction: only in-radius vertices were gathered.
        let falloff = 1.0 - dist / radius;

        match params.mode {
            BrushMode::Draw => {
                let t = falloff * falloff;
                pos += normal * (sign * t * target_height);
            }
            BrushMode::Clay => {
                let t = falloff * falloff * falloff;
                let plane_dist = normal.dot(pos - plane_point);
                let clamped = sign * (t * 4.0).min(1.0);
                pos += normal * (clamped * target_height - sign * plane_dist * clamped * 0.3);
            }
            BrushMode::Flatten => {
                let t = falloff * falloff;
                let plane_dist = normal.dot(pos - plane_point);
                pos += normal * (-plane_dist * t * params.intensity * 0.01 * 0.5);
            }
        }

        mesh.positions[v as usize] = pos;
        // Stale until the incremental normal refresh runs.
        mesh.normals[v as usize] = Vec3::ZERO;
    }

    BrushApply {
        averaged_normal: (normal != Vec3::ZERO).then_some(normal),
        displaced: indices.len(),
    }
}
