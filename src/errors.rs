//! Error kinds raised by the octree, coupling, merge and remap layers

use crate::mesh::MeshRevision;
use std::fmt::Display;

/// Which entity space an index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Point,
    Face,
    Cell,
    Patch,
    Shape,
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Point => "point",
            EntityKind::Face => "face",
            EntityKind::Cell => "cell",
            EntityKind::Patch => "patch",
            EntityKind::Shape => "shape",
        };
        f.write_str(name)
    }
}

/// Which input of a two-partition operation a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The receiving partition (`A`), whose numbering is kept.
    Master,
    /// The partition being added (`B`).
    Added,
}

impl Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Master => f.write_str("master"),
            Side::Added => f.write_str("added"),
        }
    }
}

/// All the failures the subsystem reports
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshError {
    /// (GeometryDegenerate) A shape's bounding box is NaN, inverted or has zero measure.
    /// Reported per shape; never aborts an octree build.
    #[error("(GeometryDegenerate) shape {shape}: {reason}")]
    GeometryDegenerate { shape: usize, reason: String },

    /// (AmbiguousCoupling) More than one boundary face matches within tolerance and the
    /// candidates cannot be told apart.
    #[error("(AmbiguousCoupling) {side} face {face} has indistinguishable candidates {candidates:?}")]
    AmbiguousCoupling {
        side: Side,
        face: usize,
        candidates: Vec<usize>,
    },

    /// (TopologyInconsistent) Owner/neighbour, patch or orientation invariants are violated.
    #[error("(TopologyInconsistent) {0}")]
    TopologyInconsistent(String),

    /// (UnmappedField) Some merged entities have no source value and no policy was chosen.
    #[error("(UnmappedField) field '{field}' leaves {unresolved} entities without a value and no remap policy was given")]
    UnmappedField { field: String, unresolved: usize },

    /// (IndexOutOfRange) A caller-supplied index is outside `0..len`.
    #[error("(IndexOutOfRange) {kind} index {index} is out of range (len = {len})")]
    IndexOutOfRange {
        kind: EntityKind,
        index: usize,
        len: usize,
    },

    /// (StaleField) A field snapshot was computed on another mesh revision.
    #[error("(StaleField) field computed on revision {field_revision}, expected revision {expected}")]
    StaleField {
        field_revision: MeshRevision,
        expected: MeshRevision,
    },

    /// (FieldSizeMismatch) A field snapshot does not have one value per entity.
    #[error("(FieldSizeMismatch) field has {found} values, mesh has {expected} entities")]
    FieldSizeMismatch { expected: usize, found: usize },

    /// (FieldKindMismatch) A field snapshot lives on a different entity kind.
    #[error("(FieldKindMismatch) field lives on {found} entities, expected {expected}")]
    FieldKindMismatch {
        expected: EntityKind,
        found: EntityKind,
    },
}

impl MeshError {
    /// Shorthand for an index check failure.
    pub const fn out_of_range(kind: EntityKind, index: usize, len: usize) -> Self {
        MeshError::IndexOutOfRange { kind, index, len }
    }

    /// Checks `index < len`.
    pub const fn check_index(kind: EntityKind, index: usize, len: usize) -> Result<(), Self> {
        if index < len {
            Ok(())
        } else {
            Err(MeshError::out_of_range(kind, index, len))
        }
    }

    pub fn topology(message: impl Into<String>) -> Self {
        MeshError::TopologyInconsistent(message.into())
    }
}
