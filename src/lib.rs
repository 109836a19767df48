//! Spatial search and partition stitching for polyhedral meshes.
//!
//! An [octree](octree) indexes any collection implementing
//! [`ShapeIndex`](traits::ShapeIndex) and answers nearest, containment, ray and box
//! queries. On top of it the crate merges two mesh partitions into one:
//! [coupling](coupling) pairs matching boundary faces, [merge] stitches the
//! partitions together and records every old-to-new index in an
//! [`AddedMeshMap`](merge::AddedMeshMap), and [remap] carries field values defined
//! on the inputs onto the merged mesh.
//!
//! # Features
//! #### Default
//! - **f64**: use f64 as Real
//!
//! #### Optional
//! - **f32**: use f32 as Real, this conflicts with f64
//! - **parallel**: use rayon for batch octree queries

#![forbid(unsafe_code)]
#![warn(clippy::missing_const_for_fn, clippy::approx_constant, clippy::all)]

pub mod aabb;
pub mod coupling;
pub mod errors;
pub mod float_types;
pub mod merge;
pub mod mesh;
pub mod octree;
pub mod remap;
pub mod traits;

#[cfg(any(
    all(feature = "f64", feature = "f32"),
    not(any(feature = "f64", feature = "f32"))
))]
compile_error!("Either 'f64' or 'f32' feature must be specified, but not both");

pub use coupling::{CoupleMap, CouplingOptions, match_boundaries};
pub use errors::{EntityKind, MeshError, Side};
pub use merge::{AddedMeshMap, MergeOptions, PartitionMap, PointMergeScope, add_mesh, merge_meshes};
pub use mesh::{Face, MeshPartition, MeshRevision, Patch};
pub use octree::{Octree, OctreeConfig};
pub use remap::{FieldLocation, FieldRemapper, FieldSnapshot, RemapPolicy};
pub use traits::ShapeIndex;
