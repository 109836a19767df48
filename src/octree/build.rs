//! Octree construction

use crate::aabb::{BoundsExt, BoundsQuality, inflation_for};
use crate::errors::MeshError;
use crate::float_types::{
    Real,
    parry3d::bounding_volume::{Aabb, BoundingVolume},
};
use crate::octree::{NodeId, Octree, OctreeConfig, OctreeNode, SplitPointStrategy};
use crate::traits::ShapeIndex;
use nalgebra::Point3;

impl<P: ShapeIndex> Octree<P> {
    /// Build the tree, picking split points with `strategy`.
    ///
    /// Degenerate shapes never abort the build: each one is recorded as a
    /// `GeometryDegenerate` entry. Finite point-like shapes are still searchable
    /// (they are scanned linearly by every query); shapes with non-finite or
    /// inverted boxes cannot be located and never appear in query results.
    pub fn with_strategy<SP: SplitPointStrategy>(
        shapes: P,
        config: OctreeConfig,
        strategy: &SP,
    ) -> Self {
        let mut degenerate = Vec::new();
        let mut isolated = Vec::new();
        let mut indexed = Vec::with_capacity(shapes.len());
        let mut bounds: Option<Aabb> = None;

        for i in 0..shapes.len() {
            let bb = shapes.bounding_box(i);
            let reason = match bb.quality() {
                BoundsQuality::Valid => {
                    indexed.push(i);
                    bounds = Some(match bounds {
                        Some(b) => b.merged(&bb),
                        None => bb,
                    });
                    continue;
                },
                BoundsQuality::ZeroExtent => {
                    isolated.push(i);
                    "bounding box has zero extent in every direction"
                },
                BoundsQuality::NonFinite => "bounding box has a non-finite coordinate",
                BoundsQuality::Inverted => "bounding box minimum exceeds its maximum",
            };
            tracing::warn!(shape = i, reason, "degenerate shape excluded from octree");
            degenerate.push(MeshError::GeometryDegenerate {
                shape: i,
                reason: reason.to_string(),
            });
        }

        let mut tree = Octree {
            shapes,
            nodes: Vec::new(),
            root: None,
            isolated,
            degenerate,
            config,
            depth: 0,
        };

        if let Some(bounds) = bounds {
            let bounds = bounds.loosened(inflation_for(&bounds));
            let root = tree.build_node(strategy, bounds, indexed, 0);
            tree.root = Some(root);
        }

        let stats = tree.stats();
        tracing::debug!(
            shapes = tree.shapes.len(),
            nodes = stats.nodes,
            leaves = stats.leaves,
            depth = stats.depth,
            shape_refs = stats.shape_refs,
            degenerate = tree.degenerate.len(),
            "octree built"
        );
        tree
    }

    fn build_node<SP: SplitPointStrategy>(
        &mut self,
        strategy: &SP,
        bounds: Aabb,
        indices: Vec<usize>,
        depth: usize,
    ) -> NodeId {
        self.depth = self.depth.max(depth);
        let id = self.nodes.len();
        self.nodes.push(OctreeNode::empty_leaf(bounds));

        if indices.len() <= self.config.leaf_capacity || depth >= self.config.max_depth {
            self.nodes[id] = OctreeNode::Leaf {
                bounds,
                shapes: indices,
            };
            return id;
        }

        let split = strategy
            .split_candidates(&self.shapes, &indices, &bounds)
            .into_iter()
            .find_map(|split| {
                let parts = self.distribute(&indices, &bounds, &split);
                let largest = parts.iter().map(Vec::len).max().unwrap_or(0);
                // No child got rid of any shape: splitting further would recurse forever.
                (largest < indices.len()).then_some((split, parts))
            });

        let Some((split, parts)) = split else {
            tracing::trace!(depth, shapes = indices.len(), "unsplittable node kept as leaf");
            self.nodes[id] = OctreeNode::Leaf {
                bounds,
                shapes: indices,
            };
            return id;
        };

        let mut children = [None; 8];
        for (octant, part) in parts.into_iter().enumerate() {
            if part.is_empty() {
                continue;
            }
            let child_bounds = bounds.octant(&split, octant);
            children[octant] = Some(self.build_node(strategy, child_bounds, part, depth + 1));
        }
        self.nodes[id] = OctreeNode::Internal {
            bounds,
            split,
            children,
        };
        id
    }

    /// Assign every shape to each octant its box overlaps.
    fn distribute(
        &self,
        indices: &[usize],
        bounds: &Aabb,
        split: &Point3<Real>,
    ) -> [Vec<usize>; 8] {
        let octants: [Aabb; 8] = std::array::from_fn(|o| bounds.octant(split, o));
        let mut parts: [Vec<usize>; 8] = Default::default();
        for &i in indices {
            for (octant, child) in octants.iter().enumerate() {
                if self.shapes.overlaps(i, child) {
                    parts[octant].push(i);
                }
            }
        }
        parts
    }
}
