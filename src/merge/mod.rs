//! Stitching two mesh partitions into one
//!
//! The master partition keeps its numbering; the added partition's points, faces
//! and cells are appended after it. Coupled boundary face pairs collapse into one
//! internal face, coincident points collapse into the master's point, and patches
//! with the same name are concatenated. Nothing is modified until the merged mesh
//! has been fully built and validated.

pub mod map;

pub use map::{AddedMeshMap, CoupledFace, PartitionMap};

use crate::coupling::{CoupleMap, CouplingOptions, check_pairs, match_boundaries};
use crate::errors::MeshError;
use crate::float_types::{Real, tolerance};
use crate::mesh::tree_data::PointShapes;
use crate::mesh::{Face, MeshPartition};
use crate::octree::Octree;
use hashbrown::{HashMap, HashSet};
use nalgebra::Point3;

/// Which added points may collapse onto master points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointMergeScope {
    /// Any added point within tolerance of a master point.
    #[default]
    All,
    /// Only points of coupled faces, matched against points of coupled faces.
    CoupledFaces,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOptions {
    /// Maximum distance between two points that are merged.
    pub point_tolerance: Real,
    pub point_scope: PointMergeScope,
    /// Drop merged patches that end up with no faces.
    pub prune_empty_patches: bool,
    /// Used when no coupling is supplied to the merge.
    pub coupling: CouplingOptions,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            point_tolerance: tolerance(),
            point_scope: PointMergeScope::default(),
            prune_empty_patches: false,
            coupling: CouplingOptions::default(),
        }
    }
}

impl MergeOptions {
    /// Sets both the point merge and the face coupling tolerance.
    pub fn with_tolerance(mut self, tolerance: Real) -> Self {
        self.point_tolerance = tolerance;
        self.coupling.tolerance = tolerance;
        self
    }

    pub fn with_point_scope(mut self, scope: PointMergeScope) -> Self {
        self.point_scope = scope;
        self
    }

    pub fn with_pruned_patches(mut self, prune: bool) -> Self {
        self.prune_empty_patches = prune;
        self
    }

    pub fn with_coupling(mut self, coupling: CouplingOptions) -> Self {
        self.coupling = coupling;
        self
    }
}

/// Renumbers the added points: merged ones point at a master point, the rest get
/// fresh indices after the master's points. Returns the map and the new points.
fn merge_points(
    master: &MeshPartition,
    added: &MeshPartition,
    couples: &CoupleMap,
    options: &MergeOptions,
) -> Result<(Vec<usize>, Vec<Point3<Real>>), MeshError> {
    let tol = options.point_tolerance;
    let (targets, in_scope) = match options.point_scope {
        PointMergeScope::All => ((0..master.n_points()).collect(), vec![true; added.n_points()]),
        PointMergeScope::CoupledFaces => {
            let mut targets: Vec<usize> = couples
                .pairs()
                .iter()
                .flat_map(|&(fa, _)| master.faces()[fa].vertices.iter().copied())
                .collect();
            targets.sort_unstable();
            targets.dedup();
            let mut in_scope = vec![false; added.n_points()];
            for &(_, fb) in couples.pairs() {
                for &v in &added.faces()[fb].vertices {
                    in_scope[v] = true;
                }
            }
            (targets, in_scope)
        },
    };

    let shapes = PointShapes::with_subset(master.points(), targets, tol)?;
    let tree = Octree::new(&shapes);

    let mut map = Vec::with_capacity(added.n_points());
    let mut new_points = Vec::new();
    for (p, point) in added.points().iter().enumerate() {
        let target = if in_scope[p] {
            tree.nearest_within(point, tol * tol)
                .map(|hit| shapes.point_label(hit.shape))
        } else {
            None
        };
        match target {
            Some(t) => map.push(t),
            None => {
                map.push(master.n_points() + new_points.len());
                new_points.push(*point);
            },
        }
    }
    Ok((map, new_points))
}

/// Merge `added` into a copy of `master`.
///
/// `couples` pairs boundary faces of `master` with boundary faces of `added`; when
/// `None`, [`match_boundaries`] runs with `options.coupling`. Faces of the result
/// are ordered as: master internal faces, coupled faces, added internal faces, then
/// the boundary patches (master's names first, then names new in `added`).
pub fn merge_meshes(
    master: &MeshPartition,
    added: &MeshPartition,
    couples: Option<&CoupleMap>,
    options: &MergeOptions,
) -> Result<(MeshPartition, AddedMeshMap), MeshError> {
    let computed;
    let couples = match couples {
        Some(couples) => couples,
        None => {
            computed = match_boundaries(master, added, &options.coupling)?;
            &computed
        },
    };
    check_pairs(couples, master, added)?;

    let (point_map_b, new_points) = merge_points(master, added, couples, options)?;
    let cell_offset = master.n_cells();
    let translate = |face: &Face| {
        Face::new(
            face.vertices.iter().map(|&v| point_map_b[v]).collect(),
            face.owner + cell_offset,
            face.neighbour.map(|n| n + cell_offset),
        )
    };

    let coupled_a: HashSet<usize> = couples.pairs().iter().map(|&(a, _)| a).collect();
    let coupled_b: HashSet<usize> = couples.pairs().iter().map(|&(_, b)| b).collect();
    let mut face_map_a = vec![None; master.n_faces()];
    let mut face_map_b = vec![None; added.n_faces()];

    let mut internal: Vec<Face> = Vec::with_capacity(
        master.n_internal_faces() + couples.len() + added.n_internal_faces(),
    );
    for (f, face) in master.faces()[..master.n_internal_faces()].iter().enumerate() {
        face_map_a[f] = Some(internal.len());
        internal.push(face.clone());
    }

    let mut coupled_faces = Vec::with_capacity(couples.len());
    for &(fa, fb) in couples.pairs() {
        let face_a = &master.faces()[fa];
        let face_b = translate(&added.faces()[fb]);
        let mut va = face_a.vertices.clone();
        let mut vb = face_b.vertices.clone();
        va.sort_unstable();
        vb.sort_unstable();
        if va != vb {
            return Err(MeshError::topology(format!(
                "coupled faces {fa} (master) and {fb} (added) do not share the same points"
            )));
        }
        let (_, area_a) = master.face_centre_and_area(fa);
        let (_, area_b) = added.face_centre_and_area(fb);
        if area_a.dot(&area_b) >= 0.0 {
            return Err(MeshError::topology(format!(
                "coupled faces {fa} (master) and {fb} (added) are not oppositely oriented"
            )));
        }
        let merged_face = internal.len();
        face_map_a[fa] = Some(merged_face);
        coupled_faces.push(CoupledFace {
            master_face: fa,
            added_face: fb,
            merged_face,
            master_area: area_a.norm(),
            added_area: area_b.norm(),
        });
        internal.push(Face::internal(face_a.vertices.clone(), face_a.owner, face_b.owner));
    }

    for (f, face) in added.faces()[..added.n_internal_faces()].iter().enumerate() {
        face_map_b[f] = Some(internal.len());
        internal.push(translate(face));
    }

    let mut names: Vec<&str> = master.patches().iter().map(|p| p.name.as_str()).collect();
    for patch in added.patches() {
        if !names.contains(&patch.name.as_str()) {
            names.push(patch.name.as_str());
        }
    }

    let mut patch_map_a = vec![None; master.patches().len()];
    let mut patch_map_b = vec![None; added.patches().len()];
    let mut boundary: Vec<(String, Vec<Face>)> = Vec::with_capacity(names.len());
    let mut next_face = internal.len();
    for name in names {
        let ia = master.patch_index(name);
        let ib = added.patch_index(name);
        let mut faces = Vec::new();
        let mut slots_a = Vec::new();
        let mut slots_b = Vec::new();
        if let Some(ia) = ia {
            for f in master.patches()[ia].range().filter(|f| !coupled_a.contains(f)) {
                slots_a.push((f, next_face + faces.len()));
                faces.push(master.faces()[f].clone());
            }
        }
        if let Some(ib) = ib {
            for f in added.patches()[ib].range().filter(|f| !coupled_b.contains(f)) {
                slots_b.push((f, next_face + faces.len()));
                faces.push(translate(&added.faces()[f]));
            }
        }
        if faces.is_empty() && options.prune_empty_patches {
            tracing::trace!(patch = name, "empty patch pruned");
            continue;
        }
        slots_a.into_iter().for_each(|(f, new)| face_map_a[f] = Some(new));
        slots_b.into_iter().for_each(|(f, new)| face_map_b[f] = Some(new));
        let merged_index = boundary.len();
        if let Some(ia) = ia {
            patch_map_a[ia] = Some(merged_index);
        }
        if let Some(ib) = ib {
            patch_map_b[ib] = Some(merged_index);
        }
        next_face += faces.len();
        boundary.push((name.to_string(), faces));
    }

    let mut points = master.points().to_vec();
    points.extend(new_points.iter().copied());
    let merged = MeshPartition::from_parts(points, internal, boundary)?;

    let patch_names = |mesh: &MeshPartition, map: &[Option<usize>]| -> HashMap<String, usize> {
        mesh.patches()
            .iter()
            .zip(map)
            .filter_map(|(p, m)| m.map(|m| (p.name.clone(), m)))
            .collect()
    };

    let master_map = PartitionMap {
        old_point_to_new: (0..master.n_points()).collect(),
        old_face_to_new: face_map_a,
        old_cell_to_new: (0..master.n_cells()).collect(),
        patch_map: patch_names(master, &patch_map_a),
        old_patch_to_new: patch_map_a,
        old_patches: master.patches().to_vec(),
        added_points: 0,
        added_faces: 0,
        added_cells: 0,
    };
    let added_faces = face_map_b.iter().filter(|f| f.is_some()).count();
    let added_map = PartitionMap {
        old_point_to_new: point_map_b,
        old_face_to_new: face_map_b,
        old_cell_to_new: (0..added.n_cells()).map(|c| c + cell_offset).collect(),
        patch_map: patch_names(added, &patch_map_b),
        old_patch_to_new: patch_map_b,
        old_patches: added.patches().to_vec(),
        added_points: new_points.len(),
        added_faces,
        added_cells: added.n_cells(),
    };

    tracing::debug!(
        master = %master.revision(),
        added = %added.revision(),
        merged = %merged.revision(),
        cells = merged.n_cells(),
        faces = merged.n_faces(),
        points = merged.n_points(),
        coupled = coupled_faces.len(),
        "partitions merged"
    );

    let map = AddedMeshMap {
        master: master_map,
        added: added_map,
        coupled_faces,
        ambiguous_matches: 0,
        merged_points: merged.n_points(),
        merged_faces: merged.n_faces(),
        merged_cells: merged.n_cells(),
        merged_patches: merged.patches().to_vec(),
        master_revision: master.revision(),
        added_revision: added.revision(),
        merged_revision: merged.revision(),
    };
    Ok((merged, map))
}

/// Merge `added` into `master` in place. On error `master` is left untouched.
pub fn add_mesh(
    master: &mut MeshPartition,
    added: &MeshPartition,
    couples: Option<&CoupleMap>,
    options: &MergeOptions,
) -> Result<AddedMeshMap, MeshError> {
    let (merged, map) = merge_meshes(master, added, couples, options)?;
    *master = merged;
    Ok(map)
}
