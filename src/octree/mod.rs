//! Generic octree over a [`ShapeIndex`](crate::traits::ShapeIndex)
//!
//! The tree is built once and is read-only afterwards, so any number of threads
//! may query it concurrently. Nodes live in a flat arena and refer to their
//! children by index.

pub mod build;
pub mod node;
pub mod query;
pub mod traits;

#[cfg(not(feature = "parallel"))]
pub mod serial;

#[cfg(feature = "parallel")]
pub mod parallel;

pub use node::{NodeId, OctreeNode};
pub use traits::{CentroidSplit, SplitPointStrategy};

use crate::errors::MeshError;
use crate::float_types::{Real, parry3d::bounding_volume::Aabb};
use crate::traits::ShapeIndex;
use nalgebra::Point3;

/// Construction limits for an [`Octree`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OctreeConfig {
    /// A node holding more shapes than this is split.
    pub leaf_capacity: usize,
    /// Nodes at this depth are never split, whatever they hold.
    pub max_depth: usize,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            leaf_capacity: 8,
            max_depth: 10,
        }
    }
}

impl OctreeConfig {
    pub const fn with_leaf_capacity(mut self, leaf_capacity: usize) -> Self {
        self.leaf_capacity = if leaf_capacity == 0 { 1 } else { leaf_capacity };
        self
    }

    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Result of a nearest-shape query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestHit {
    pub shape: usize,
    pub point: Point3<Real>,
    pub distance_squared: Real,
}

/// Result of a ray query: the first shape hit along the ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub shape: usize,
    /// Ray parameter of the hit (`ray.origin + toi * ray.dir`).
    pub toi: Real,
    pub point: Point3<Real>,
}

/// Summary numbers describing a built tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OctreeStats {
    pub nodes: usize,
    pub leaves: usize,
    pub depth: usize,
    /// Sum of leaf list lengths; exceeds the shape count when shapes straddle splits.
    pub shape_refs: usize,
}

#[derive(Debug, Clone)]
pub struct Octree<P: ShapeIndex> {
    shapes: P,
    nodes: Vec<OctreeNode>,
    /// `None` when no shape could be placed in the tree.
    root: Option<NodeId>,
    /// Finite point-like shapes kept out of the tree and scanned linearly.
    isolated: Vec<usize>,
    degenerate: Vec<MeshError>,
    config: OctreeConfig,
    depth: usize,
}

impl<P: ShapeIndex> Octree<P> {
    /// Build with the default configuration and split strategy.
    pub fn new(shapes: P) -> Self {
        Self::with_config(shapes, OctreeConfig::default())
    }

    pub fn with_config(shapes: P, config: OctreeConfig) -> Self {
        Self::with_strategy(shapes, config, &CentroidSplit)
    }

    #[inline]
    pub const fn shapes(&self) -> &P {
        &self.shapes
    }

    #[inline]
    pub const fn config(&self) -> &OctreeConfig {
        &self.config
    }

    /// Root bounds, or `None` for a tree without indexable shapes.
    pub fn bounds(&self) -> Option<&Aabb> {
        self.root.map(|r| self.nodes[r].bounds())
    }

    #[inline]
    pub fn nodes(&self) -> &[OctreeNode] {
        &self.nodes
    }

    #[inline]
    pub const fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Shapes rejected or isolated at build time, one `GeometryDegenerate` per shape.
    #[inline]
    pub fn degenerate_shapes(&self) -> &[MeshError] {
        &self.degenerate
    }

    /// Point-like shapes that are searched linearly instead of through the tree.
    #[inline]
    pub fn isolated_shapes(&self) -> &[usize] {
        &self.isolated
    }

    /// Leaf nodes in arena order.
    pub fn leaves(&self) -> impl Iterator<Item = (&Aabb, &[usize])> {
        self.nodes.iter().filter_map(|n| match n {
            OctreeNode::Leaf { bounds, shapes } => Some((bounds, shapes.as_slice())),
            OctreeNode::Internal { .. } => None,
        })
    }

    pub fn stats(&self) -> OctreeStats {
        let (leaves, shape_refs) = self
            .leaves()
            .fold((0, 0), |(l, r), (_, s)| (l + 1, r + s.len()));
        OctreeStats {
            nodes: self.nodes.len(),
            leaves,
            depth: self.depth,
            shape_refs,
        }
    }

    /// Bounding box of shape `index`, checked against the collection size.
    pub fn shape_bounds(&self, index: usize) -> Result<Aabb, MeshError> {
        MeshError::check_index(crate::errors::EntityKind::Shape, index, self.shapes.len())?;
        Ok(self.shapes.bounding_box(index))
    }
}
