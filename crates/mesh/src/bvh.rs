//! Bounding volume hierarchy over mesh triangles.
//!
//! The tree is a flat arena of nodes referenced by `u32` index, with parent
//! links so a partial refit can walk bottom-up without back-pointer cycles.
//! It is built once per mesh topology and supports two operations the
//! sculpting engine relies on:
//!
//! - [`Bvh::query_sphere`] - a tri-state bounded traversal ("shapecast") that
//!   classifies every visited node as contained in, intersecting, or disjoint
//!   from the query sphere and reports candidate triangles
//! - [`Bvh::refit`] - recomputes bounding boxes for a set of node ids plus
//!   their ancestors after local deformation, without restructuring the tree

use glam::Vec3;
use std::collections::HashSet;
use tracing::debug;

use crate::mesh::TriMesh;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(f32::MIN),
        }
    }

    pub fn include_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn longest_axis(&self) -> usize {
        let size = self.max - self.min;
        if size.x >= size.y && size.x >= size.z {
            0
        } else if size.y >= size.z {
            1
        } else {
            2
        }
    }

    /// Sphere overlap test via the closest point on the box.
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        let closest = center.clamp(self.min, self.max);
        closest.distance_squared(center) <= radius * radius
    }

    /// True when every corner of the box lies inside the sphere.
    ///
    /// Exact equivalent of testing all eight corners: per axis, the farthest
    /// corner from the center is the one at the larger absolute offset.
    pub fn inside_sphere(&self, center: Vec3, radius: f32) -> bool {
        let dx = (self.min.x - center.x).abs().max((self.max.x - center.x).abs());
        let dy = (self.min.y - center.y).abs().max((self.max.y - center.y).abs());
        let dz = (self.min.z - center.z).abs().max((self.max.z - center.z).abs());
        dx * dx + dy * dy + dz * dz <= radius * radius
    }
}

const NO_NODE: u32 = u32::MAX;

/// Target triangle count per leaf.
const MAX_LEAF_TRIS: usize = 4;

#[derive(Debug, Clone, Copy)]
struct BvhNode {
    aabb: Aabb,
    /// `NO_NODE` for leaves.
    left: u32,
    right: u32,
    /// `NO_NODE` for the root.
    parent: u32,
    /// Leaf range into `Bvh::tri_order`; empty for internal nodes.
    tri_start: u32,
    tri_count: u32,
}

impl BvhNode {
    fn is_leaf(&self) -> bool {
        self.left == NO_NODE
    }
}

/// Flat-arena BVH over a mesh's triangles.
#[derive(Debug, Clone)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    /// Triangle ids reordered so each leaf owns a contiguous range.
    tri_order: Vec<u32>,
}

impl Bvh {
    /// Construct a balanced BVH by median split on the longest centroid axis.
    ///
    /// The mesh has already been validated at build time, so construction
    /// itself cannot fail.
    pub fn build(mesh: &TriMesh) -> Self {
        let tri_count = mesh.triangle_count();
        let mut tri_aabbs = Vec::with_capacity(tri_count);
        let mut centroids = Vec::with_capacity(tri_count);
        for t in 0..tri_count as u32 {
            let [a, b, c] = mesh.triangle_positions(t);
            let mut aabb = Aabb::empty();
            aabb.include_point(a);
            aabb.include_point(b);
            aabb.include_point(c);
            tri_aabbs.push(aabb);
            centroids.push((a + b + c) / 3.0);
        }

        let mut tri_order: Vec<u32> = (0..tri_count as u32).collect();
        let mut bvh = Self {
            nodes: Vec::with_capacity(tri_count * 2),
            tri_order: Vec::new(),
        };
        bvh.build_node(&mut tri_order, 0, &tri_aabbs, &centroids, NO_NODE);
        bvh.tri_order = tri_order;
        debug!(
            triangles = tri_count,
            nodes = bvh.nodes.len(),
            "built triangle index"
        );
        bvh
    }

    /// Recursively build the subtree for `tris`, which starts at `offset`
    /// within the final triangle-order array. Returns the node id.
    fn build_node(
        &mut self,
        tris: &mut [u32],
        offset: usize,
        tri_aabbs: &[Aabb],
        centroids: &[Vec3],
        parent: u32,
    ) -> u32 {
        let mut aabb = Aabb::empty();
        for &t in tris.iter() {
            aabb = aabb.union(&tri_aabbs[t as usize]);
        }

        let id = self.nodes.len() as u32;
        self.nodes.push(BvhNode {
            aabb,
            left: NO_NODE,
            right: NO_NODE,
            parent,
            tri_start: offset as u32,
            tri_count: tris.len() as u32,
        });

        if tris.len() <= MAX_LEAF_TRIS {
            return id;
        }

        // Median split on the longest axis of the centroid bounds.
        let mut centroid_bounds = Aabb::empty();
        for &t in tris.iter() {
            centroid_bounds.include_point(centroids[t as usize]);
        }
        let axis = centroid_bounds.longest_axis();
        let mid = tris.len() / 2;
        tris.select_nth_unstable_by(mid, |&a, &b| {
            centroids[a as usize][axis]
                .partial_cmp(&centroids[b as usize][axis])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let (left_tris, right_tris) = tris.split_at_mut(mid);
        let left = self.build_node(left_tris, offset, tri_aabbs, centroids, id);
        let right = self.build_node(right_tris, offset + mid, tri_aabbs, centroids, id);

        let node = &mut self.nodes[id as usize];
        node.left = left;
        node.right = right;
        node.tri_count = 0;
        id
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_bounds(&self, id: u32) -> Aabb {
        self.nodes[id as usize].aabb
    }

    /// Child ids of an internal node; `None` for leaves.
    pub(crate) fn children(&self, id: u32) -> Option<(u32, u32)> {
        let node = &self.nodes[id as usize];
        (!node.is_leaf()).then_some((node.left, node.right))
    }

    /// Triangle ids owned by a leaf (empty for internal nodes).
    pub(crate) fn leaf_triangles(&self, id: u32) -> impl Iterator<Item = u32> + '_ {
        let node = &self.nodes[id as usize];
        let start = node.tri_start as usize;
        let end = start + node.tri_count as usize;
        self.tri_order[start..end].iter().copied()
    }

    /// Depth-first bounded sphere query.
    ///
    /// Every node whose bounds were classified - at every depth, disjoint
    /// nodes included - is reported through `visit_node`; the caller uses
    /// that set to refit exactly the subtree a deformation touched. For each
    /// candidate triangle, `visit_triangle(triangle_id, fully_contained)` is
    /// invoked once; `fully_contained` means per-vertex containment tests can
    /// be skipped.
    pub fn query_sphere(
        &self,
        center: Vec3,
        radius: f32,
        visit_triangle: &mut impl FnMut(u32, bool),
        visit_node: &mut impl FnMut(u32),
    ) {
        if self.nodes.is_empty() {
            return;
        }
        self.query_node(0, center, radius, visit_triangle, visit_node);
    }

    fn query_node(
        &self,
        id: u32,
        center: Vec3,
        radius: f32,
        visit_triangle: &mut impl FnMut(u32, bool),
        visit_node: &mut impl FnMut(u32),
    ) {
        visit_node(id);
        let node = &self.nodes[id as usize];

        if !node.aabb.intersects_sphere(center, radius) {
            // Disjoint: prune.
            return;
        }

        if node.aabb.inside_sphere(center, radius) {
            // Contained: the whole subtree is inside the sphere. Descendant
            // node ids are still reported so a later refit over the visited
            // set restores tight leaf boxes.
            self.collect_subtree(id, visit_triangle, visit_node);
            return;
        }

        // Intersected: descend, or hand out triangles for exact testing.
        if node.is_leaf() {
            let start = node.tri_start as usize;
            let end = start + node.tri_count as usize;
            for &t in &self.tri_order[start..end] {
                visit_triangle(t, false);
            }
        } else {
            self.query_node(node.left, center, radius, visit_triangle, visit_node);
            self.query_node(node.right, center, radius, visit_triangle, visit_node);
        }
    }

    /// Report every triangle under `id` as fully contained, visiting all
    /// descendant nodes. `visit_node` has already run for `id` itself.
    fn collect_subtree(
        &self,
        id: u32,
        visit_triangle: &mut impl FnMut(u32, bool),
        visit_node: &mut impl FnMut(u32),
    ) {
        let node = &self.nodes[id as usize];
        if node.is_leaf() {
            let start = node.tri_start as usize;
            let end = start + node.tri_count as usize;
            for &t in &self.tri_order[start..end] {
                visit_triangle(t, true);
            }
        } else {
            visit_node(node.left);
            self.collect_subtree(node.left, visit_triangle, visit_node);
            visit_node(node.right);
            self.collect_subtree(node.right, visit_triangle, visit_node);
        }
    }

    /// Recompute bounding boxes for the given nodes and all their ancestors.
    ///
    /// Leaves are rebuilt from current triangle positions; internal nodes
    /// from their children. Tree topology is untouched. Must be called after
    /// any position mutation that invalidates previously computed boxes -
    /// skipping it makes later queries silently miss triangles.
    pub fn refit(&mut self, mesh: &TriMesh, node_ids: impl IntoIterator<Item = u32>) {
        let mut set: HashSet<u32> = HashSet::new();
        for id in node_ids {
            let mut current = id;
            // Walk up to the root; stop early once an already-queued ancestor
            // is found, its own chain is complete.
            while set.insert(current) {
                let parent = self.nodes[current as usize].parent;
                if parent == NO_NODE {
                    break;
                }
                current = parent;
            }
        }

        // Children always live at higher indices than their parent, so a
        // descending sweep recomputes leaves before internals.
        let mut order: Vec<u32> = set.into_iter().collect();
        order.sort_unstable_by(|a, b| b.cmp(a));
        for id in order {
            self.recompute_bounds(mesh, id);
        }
    }

    /// Rebuild-equivalent full refit, used after unbounded position changes
    /// such as an undo/redo restore.
    pub fn refit_all(&mut self, mesh: &TriMesh) {
        for id in (0..self.nodes.len() as u32).rev() {
            self.recompute_bounds(mesh, id);
        }
    }

    fn recompute_bounds(&mut self, mesh: &TriMesh, id: u32) {
        let node = self.nodes[id as usize];
        let aabb = if node.is_leaf() {
            let start = node.tri_start as usize;
            let end = start + node.tri_count as usize;
            let mut aabb = Aabb::empty();
            for &t in &self.tri_order[start..end] {
                let [a, b, c] = mesh.triangle_positions(t);
                aabb.include_point(a);
                aabb.include_point(b);
                aabb.include_point(c);
            }
            aabb
        } else {
            self.nodes[node.left as usize]
                .aabb
                .union(&self.nodes[node.right as usize].aabb)
        };
        self.nodes[id as usize].aabb = aabb;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::icosphere;
    use std::collections::HashSet;

    /// Vertices within `radius` of `center`, by the engine's query path.
    fn query_vertices(bvh: &Bvh, mesh: &TriMesh, center: Vec3, radius: f32) -> HashSet<u32> {
        let mut vertices = HashSet::new();
        let r2 = radius * radius;
        bvh.query_sphere(
            center,
            radius,
            &mut |tri, contained| {
                for v in mesh.triangle(tri) {
                    if contained || mesh.positions[v as usize].distance_squared(center) <= r2 {
                        vertices.insert(v);
                    }
                }
            },
            &mut |_| {},
        );
        vertices
    }

    fn brute_force_vertices(mesh: &TriMesh, center: Vec3, radius: f32) -> HashSet<u32> {
        let r2 = radius * radius;
        let mut vertices = HashSet::new();
        // Only vertices referenced by a triangle can be reported by the BVH.
        for t in 0..mesh.triangle_count() as u32 {
            for v in mesh.triangle(t) {
                if mesh.positions[v as usize].distance_squared(center) <= r2 {
                    vertices.insert(v);
                }
            }
        }
        vertices
    }

    #[test]
    fn test_containment_matches_brute_force() {
        let mesh = icosphere(3, 1.0);
        let bvh = Bvh::build(&mesh);

        // Radii both larger and smaller than typical leaf extents, so both
        // the contained fast path and the exact per-vertex path are hit.
        for (center, radius) in [
            (Vec3::new(0.0, 0.0, 1.0), 0.1),
            (Vec3::new(0.0, 0.0, 1.0), 0.6),
            (Vec3::new(0.3, -0.2, 0.9), 0.25),
            (Vec3::ZERO, 2.0),
            (Vec3::new(5.0, 0.0, 0.0), 0.5),
        ] {
            let fast = query_vertices(&bvh, &mesh, center, radius);
            let brute = brute_force_vertices(&mesh, center, radius);
            assert_eq!(fast, brute, "center {center:?} radius {radius}");
        }
    }

    #[test]
    fn test_contained_fast_path_taken() {
        let mesh = icosphere(3, 1.0);
        let bvh = Bvh::build(&mesh);

        let mut contained_tris = 0usize;
        bvh.query_sphere(
            Vec3::new(0.0, 0.0, 1.0),
            0.5,
            &mut |_, contained| {
                if contained {
                    contained_tris += 1;
                }
            },
            &mut |_| {},
        );
        // A brush radius well above leaf size must swallow whole leaves.
        assert!(contained_tris > 0);
    }

    #[test]
    fn test_refit_matches_rebuild() {
        let mut mesh = icosphere(3, 1.0);
        let mut bvh = Bvh::build(&mesh);

        let center = Vec3::new(0.0, 0.0, 1.0);
        let radius = 0.3;

        let mut touched_nodes = HashSet::new();
        let touched = {
            let mut vertices = HashSet::new();
            let r2 = radius * radius;
            bvh.query_sphere(
                center,
                radius,
                &mut |tri, contained| {
                    for v in mesh.triangle(tri) {
                        if contained || mesh.positions[v as usize].distance_squared(center) <= r2 {
                            vertices.insert(v);
                        }
                    }
                },
                &mut |node| {
                    touched_nodes.insert(node);
                },
            );
            vertices
        };
        assert!(!touched.is_empty());

        // Displace the queried vertices outward by a sizeable amount.
        for &v in &touched {
            let p = mesh.positions[v as usize];
            mesh.positions[v as usize] = p + p.normalize() * 0.2;
        }

        bvh.refit(&mesh, touched_nodes.iter().copied());
        let rebuilt = Bvh::build(&mesh);

        // Queries anywhere must agree with a freshly built index.
        for (c, r) in [
            (center, radius),
            (center, 0.6),
            (Vec3::new(0.0, 0.0, 1.2), 0.25),
            (Vec3::new(0.0, 1.0, 0.0), 0.3),
            (Vec3::ZERO, 1.5),
        ] {
            assert_eq!(
                query_vertices(&bvh, &mesh, c, r),
                query_vertices(&rebuilt, &mesh, c, r),
                "center {c:?} radius {r}"
            );
        }
    }

    #[test]
    fn test_refit_all_matches_rebuild() {
        let mut mesh = icosphere(2, 1.0);
        let mut bvh = Bvh::build(&mesh);

        // Unbounded change: squash the whole sphere.
        for p in &mut mesh.positions {
            p.z *= 0.25;
        }
        bvh.refit_all(&mesh);
        let rebuilt = Bvh::build(&mesh);

        // Rebuilding re-partitions triangles from the squashed centroids, so
        // node ids do not correspond between the trees; compare what queries
        // observe. The root box is partition-independent.
        let a = bvh.node_bounds(0);
        let b = rebuilt.node_bounds(0);
        assert!((a.min - b.min).length() < 1e-6);
        assert!((a.max - b.max).length() < 1e-6);

        for (c, r) in [
            (Vec3::new(0.0, 0.0, 0.25), 0.2),
            (Vec3::new(0.9, 0.0, 0.0), 0.3),
            (Vec3::new(0.0, -0.8, 0.1), 0.25),
            (Vec3::ZERO, 0.6),
            (Vec3::ZERO, 1.5),
        ] {
            assert_eq!(
                query_vertices(&bvh, &mesh, c, r),
                query_vertices(&rebuilt, &mesh, c, r),
                "center {c:?} radius {r}"
            );
        }
    }

    #[test]
    fn test_disjoint_sphere_reports_no_triangles() {
        let mesh = icosphere(2, 1.0);
        let bvh = Bvh::build(&mesh);
        let mut tris = 0usize;
        bvh.query_sphere(
            Vec3::new(10.0, 0.0, 0.0),
            0.5,
            &mut |_, _| tris += 1,
            &mut |_| {},
        );
        assert_eq!(tris, 0);
    }

    #[test]
    fn test_every_leaf_range_covers_all_triangles() {
        let mesh = icosphere(2, 1.0);
        let bvh = Bvh::build(&mesh);
        let mut seen: Vec<u32> = bvh.tri_order.clone();
        seen.sort_unstable();
        let expected: Vec<u32> = (0..mesh.triangle_count() as u32).collect();
        assert_eq!(seen, expected);
    }
}
