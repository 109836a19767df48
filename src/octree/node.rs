//! Octree node data structure

use crate::float_types::{Real, parry3d::bounding_volume::Aabb};
use nalgebra::Point3;

/// Index of a node inside the tree's node arena.
pub type NodeId = usize;

/// An octree node. Children are addressed by octant: bit 0 set means the upper
/// half along x, bit 1 along y, bit 2 along z.
#[derive(Debug, Clone, PartialEq)]
pub enum OctreeNode {
    /// Terminal node holding the shapes whose box overlaps `bounds`.
    Leaf { bounds: Aabb, shapes: Vec<usize> },

    /// Node split at `split` into up to eight non-empty children.
    Internal {
        bounds: Aabb,
        split: Point3<Real>,
        children: [Option<NodeId>; 8],
    },
}

impl OctreeNode {
    /// Create an empty leaf covering `bounds`
    pub const fn empty_leaf(bounds: Aabb) -> Self {
        OctreeNode::Leaf {
            bounds,
            shapes: Vec::new(),
        }
    }

    #[inline]
    pub const fn bounds(&self) -> &Aabb {
        match self {
            OctreeNode::Leaf { bounds, .. } | OctreeNode::Internal { bounds, .. } => bounds,
        }
    }

    #[inline]
    pub const fn is_leaf(&self) -> bool {
        matches!(self, OctreeNode::Leaf { .. })
    }

    /// Child node ids, skipping empty octants.
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        let slots: &[Option<NodeId>] = match self {
            OctreeNode::Leaf { .. } => &[],
            OctreeNode::Internal { children, .. } => children,
        };
        slots.iter().flatten().copied()
    }
}
