//! Ray-mesh picking against the BVH.
//!
//! Moller-Trumbore ray/triangle intersection with a distance-ordered BVH
//! traversal, returning only the nearest hit - the camera collaborator's
//! `raycast(ray) -> Option<(point, distance)>` contract.

use glam::Vec3;

use crate::bvh::Bvh;
use crate::mesh::TriMesh;

/// Epsilon for floating point comparisons in ray intersection
const EPSILON: f32 = 1e-6;

/// A ray in mesh-local space.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    /// Should be normalized so `distance` values are world units.
    pub direction: Vec3,
}

/// Nearest intersection of a ray with a mesh.
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    /// Intersection point on the surface.
    pub point: Vec3,
    /// Distance along the ray.
    pub distance: f32,
    /// Triangle that was hit.
    pub triangle: u32,
}

/// Moller-Trumbore ray-triangle intersection.
///
/// Returns the hit distance if the ray intersects the triangle in front of
/// its origin. Back faces are reported too: the sculpting cursor must stick
/// to the surface regardless of winding, like a double-sided material.
pub fn ray_triangle_intersection(
    ray_origin: Vec3,
    ray_dir: Vec3,
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
) -> Option<f32> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;

    let pvec = ray_dir.cross(edge2);
    let det = edge1.dot(pvec);

    // Near-zero determinant: ray lies in the triangle's plane or misses.
    if det.abs() < EPSILON {
        return None;
    }

    let inv_det = 1.0 / det;
    let tvec = ray_origin - v0;

    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(edge1);
    let v = ray_dir.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(qvec) * inv_det;
    if t < EPSILON {
        return None;
    }

    Some(t)
}

impl Bvh {
    /// Nearest-hit raycast against the mesh this BVH was built over.
    ///
    /// Children are visited near-to-far and subtrees beyond the best hit so
    /// far are pruned.
    pub fn raycast(&self, mesh: &TriMesh, ray: &Ray) -> Option<RayHit> {
        let mut best: Option<(f32, u32)> = None;
        self.raycast_node(mesh, ray, 0, &mut best);
        best.map(|(t, triangle)| RayHit {
            point: ray.origin + ray.direction * t,
            distance: t,
            triangle,
        })
    }

    fn raycast_node(&self, mesh: &TriMesh, ray: &Ray, id: u32, best: &mut Option<(f32, u32)>) {
        let Some(entry) = ray_aabb_entry(ray, &self.node_bounds(id)) else {
            return;
        };
        if let Some((t, _)) = best {
            if entry > *t {
                return;
            }
        }

        match self.children(id) {
            None => {
                for t in self.leaf_triangles(id) {
                    let [a, b, c] = mesh.triangle_positions(t);
                    if let Some(hit) = ray_triangle_intersection(ray.origin, ray.direction, a, b, c)
                    {
                        if best.is_none_or(|(cur, _)| hit < cur) {
                            *best = Some((hit, t));
                        }
                    }
                }
            }
            Some((left, right)) => {
                let near_left = ray_aabb_entry(ray, &self.node_bounds(left)).unwrap_or(f32::MAX);
                let near_right = ray_aabb_entry(ray, &self.node_bounds(right)).unwrap_or(f32::MAX);
                let (first, second) = if near_left <= near_right {
                    (left, right)
                } else {
                    (right, left)
                };
                self.raycast_node(mesh, ray, first, best);
                self.raycast_node(mesh, ray, second, best);
            }
        }
    }
}

/// Slab test. Returns the entry distance (clamped to 0 when the origin is
/// inside the box), or `None` on a miss.
fn ray_aabb_entry(ray: &Ray, aabb: &crate::bvh::Aabb) -> Option<f32> {
    let inv = ray.direction.recip();
    let t0 = (aabb.min - ray.origin) * inv;
    let t1 = (aabb.max - ray.origin) * inv;
    let t_min = t0.min(t1);
    let t_max = t0.max(t1);
    let near = t_min.max_element().max(0.0);
    let far = t_max.min_element();
    (near <= far).then_some(near)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::icosphere;

    #[test]
    fn test_ray_triangle_hit_and_miss() {
        let v0 = Vec3::new(-1.0, -1.0, 0.0);
        let v1 = Vec3::new(1.0, -1.0, 0.0);
        let v2 = Vec3::new(0.0, 1.0, 0.0);

        let hit = ray_triangle_intersection(Vec3::new(0.0, 0.0, 5.0), -Vec3::Z, v0, v1, v2);
        assert!((hit.unwrap() - 5.0).abs() < 1e-5);

        let miss = ray_triangle_intersection(Vec3::new(3.0, 0.0, 5.0), -Vec3::Z, v0, v1, v2);
        assert!(miss.is_none());
    }

    #[test]
    fn test_raycast_nearest_hit_on_sphere() {
        let mesh = icosphere(3, 1.0);
        let bvh = Bvh::build(&mesh);

        let ray = Ray {
            origin: Vec3::new(0.0, 0.0, 4.0),
            direction: -Vec3::Z,
        };
        let hit = bvh.raycast(&mesh, &ray).unwrap();
        // Front of the sphere, not the back face.
        assert!(hit.point.z > 0.9);
        assert!((hit.distance - (4.0 - hit.point.z)).abs() < 1e-4);
    }

    #[test]
    fn test_raycast_miss() {
        let mesh = icosphere(2, 1.0);
        let bvh = Bvh::build(&mesh);
        let ray = Ray {
            origin: Vec3::new(5.0, 5.0, 5.0),
            direction: Vec3::Z,
        };
        assert!(bvh.raycast(&mesh, &ray).is_none());
    }
}
