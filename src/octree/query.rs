//! Octree queries: nearest shape, containing shape, first ray hit, box overlap

use crate::aabb::BoundsExt;
use crate::float_types::{
    Real,
    parry3d::{
        bounding_volume::{Aabb, BoundingVolume},
        query::Ray,
    },
};
use crate::octree::{NearestHit, NodeId, Octree, OctreeNode, RayHit};
use crate::traits::ShapeIndex;
use nalgebra::Point3;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Heap entry ordered so that the smallest key pops first.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    key: Real,
    node: NodeId,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .key
            .total_cmp(&self.key)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// `true` when `(d, shape)` beats the current best under lowest-index tie-breaking.
#[inline]
fn improves(d: Real, shape: usize, best: Option<(Real, usize)>) -> bool {
    match best {
        None => true,
        Some((best_d, best_shape)) => d < best_d || (d == best_d && shape < best_shape),
    }
}

impl<P: ShapeIndex> Octree<P> {
    /// Nearest shape to `point` (no distance limit).
    pub fn nearest(&self, point: &Point3<Real>) -> Option<NearestHit> {
        self.nearest_within(point, Real::INFINITY)
    }

    /// Nearest shape to `point` among those within squared distance `max_distance_squared`.
    ///
    /// Best-first descent: nodes are visited in order of their box distance and
    /// pruned once that lower bound exceeds the best distance found. Every shape
    /// of a visited leaf is evaluated, so exact ties resolve to the lowest index.
    pub fn nearest_within(
        &self,
        point: &Point3<Real>,
        max_distance_squared: Real,
    ) -> Option<NearestHit> {
        let mut best: Option<NearestHit> = None;
        let mut best_key: Option<(Real, usize)> = None;
        let mut limit = max_distance_squared;

        let mut consider = |shape: usize, best: &mut Option<NearestHit>, limit: &mut Real| {
            let (nearest, d2) = self.shapes.nearest_point(shape, point);
            if d2 <= *limit && improves(d2, shape, best_key) {
                best_key = Some((d2, shape));
                *limit = d2;
                *best = Some(NearestHit {
                    shape,
                    point: nearest,
                    distance_squared: d2,
                });
            }
        };

        for &shape in &self.isolated {
            consider(shape, &mut best, &mut limit);
        }

        let Some(root) = self.root else {
            return best;
        };

        let mut queue = BinaryHeap::new();
        queue.push(Candidate {
            key: self.nodes[root].bounds().distance_squared_to(point),
            node: root,
        });

        while let Some(Candidate { key, node }) = queue.pop() {
            if key > limit {
                break;
            }
            match &self.nodes[node] {
                OctreeNode::Leaf { shapes, .. } => {
                    for &shape in shapes {
                        consider(shape, &mut best, &mut limit);
                    }
                },
                OctreeNode::Internal { .. } => {
                    for child in self.nodes[node].children() {
                        let d2 = self.nodes[child].bounds().distance_squared_to(point);
                        if d2 <= limit {
                            queue.push(Candidate { key: d2, node: child });
                        }
                    }
                },
            }
        }
        best
    }

    /// Lowest-index shape containing `point`, or `None` when no shape does.
    pub fn find_inside(&self, point: &Point3<Real>) -> Option<usize> {
        let mut found: Option<usize> = None;
        let mut test = |shape: usize| {
            if found.is_none_or(|f| shape < f) && self.shapes.contains(shape, point) {
                found = Some(shape);
            }
        };

        for &shape in &self.isolated {
            test(shape);
        }

        let Some(root) = self.root else {
            return found;
        };
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            let n = &self.nodes[node];
            if !n.bounds().contains_point(point) {
                continue;
            }
            match n {
                OctreeNode::Leaf { shapes, .. } => shapes.iter().for_each(|&s| test(s)),
                OctreeNode::Internal { .. } => stack.extend(n.children()),
            }
        }
        found
    }

    /// Every shape containing `point`, sorted by index.
    pub fn find_all_inside(&self, point: &Point3<Real>) -> Vec<usize> {
        let mut hits: Vec<usize> = self
            .isolated
            .iter()
            .copied()
            .filter(|&s| self.shapes.contains(s, point))
            .collect();
        if let Some(root) = self.root {
            let mut stack = vec![root];
            while let Some(node) = stack.pop() {
                let n = &self.nodes[node];
                if !n.bounds().contains_point(point) {
                    continue;
                }
                match n {
                    OctreeNode::Leaf { shapes, .. } => hits.extend(
                        shapes
                            .iter()
                            .copied()
                            .filter(|&s| self.shapes.contains(s, point)),
                    ),
                    OctreeNode::Internal { .. } => stack.extend(n.children()),
                }
            }
        }
        hits.sort_unstable();
        hits.dedup();
        hits
    }

    /// First shape hit by `ray` within `[0, max_toi]`; ties go to the lowest index.
    pub fn intersect_ray(&self, ray: &Ray, max_toi: Real) -> Option<RayHit> {
        let mut best: Option<(Real, usize)> = None;
        let mut limit = max_toi;

        let consider = |shape: usize, best: &mut Option<(Real, usize)>, limit: &mut Real| {
            if let Some(toi) = self.shapes.cast_ray(shape, ray, *limit) {
                if toi <= *limit && improves(toi, shape, *best) {
                    *best = Some((toi, shape));
                    *limit = toi;
                }
            }
        };

        for &shape in &self.isolated {
            consider(shape, &mut best, &mut limit);
        }

        if let Some(root) = self.root {
            let mut queue = BinaryHeap::new();
            if let Some(entry) = self.nodes[root].bounds().ray_entry(ray, limit) {
                queue.push(Candidate {
                    key: entry,
                    node: root,
                });
            }
            while let Some(Candidate { key, node }) = queue.pop() {
                if key > limit {
                    break;
                }
                match &self.nodes[node] {
                    OctreeNode::Leaf { shapes, .. } => {
                        for &shape in shapes {
                            consider(shape, &mut best, &mut limit);
                        }
                    },
                    OctreeNode::Internal { .. } => {
                        for child in self.nodes[node].children() {
                            if let Some(entry) = self.nodes[child].bounds().ray_entry(ray, limit) {
                                queue.push(Candidate { key: entry, node: child });
                            }
                        }
                    },
                }
            }
        }

        best.map(|(toi, shape)| RayHit {
            shape,
            toi,
            point: ray.point_at(toi),
        })
    }

    /// Every shape whose box overlaps `query`, sorted by index.
    pub fn find_box(&self, query: &Aabb) -> Vec<usize> {
        let mut hits: Vec<usize> = self
            .isolated
            .iter()
            .copied()
            .filter(|&s| self.shapes.overlaps(s, query))
            .collect();
        if let Some(root) = self.root {
            let mut stack = vec![root];
            while let Some(node) = stack.pop() {
                let n = &self.nodes[node];
                if !n.bounds().intersects(query) {
                    continue;
                }
                match n {
                    OctreeNode::Leaf { shapes, .. } => hits.extend(
                        shapes
                            .iter()
                            .copied()
                            .filter(|&s| self.shapes.overlaps(s, query)),
                    ),
                    OctreeNode::Internal { .. } => stack.extend(n.children()),
                }
            }
        }
        hits.sort_unstable();
        hits.dedup();
        hits
    }
}
