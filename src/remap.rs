//! Carrying per-entity field values through a merge
//!
//! A [`FieldSnapshot`] is bound to the mesh revision it was computed on. The only
//! way to move it to the merged mesh is [`FieldRemapper::remap`], which copies every
//! value that has a source and resolves the rest through an explicit
//! [`RemapPolicy`].

use crate::aabb::inflation_for;
use crate::errors::{EntityKind, MeshError, Side};
use crate::float_types::Real;
use crate::merge::AddedMeshMap;
use crate::mesh::tree_data::PointShapes;
use crate::mesh::{MeshPartition, MeshRevision};
use crate::octree::Octree;
use hashbrown::HashMap;
use nalgebra::{Matrix3, Point3, Vector3};
use std::ops::{Add, Mul};

/// Values that can be stored in a field and blended by interpolation.
pub trait FieldValue: Copy + Add<Output = Self> + Mul<Real, Output = Self> {}

impl<T: Copy + Add<Output = T> + Mul<Real, Output = T>> FieldValue for T {}

/// Entities a field is defined on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldLocation {
    Point,
    Face,
    Cell,
}

impl FieldLocation {
    pub const fn kind(&self) -> EntityKind {
        match self {
            FieldLocation::Point => EntityKind::Point,
            FieldLocation::Face => EntityKind::Face,
            FieldLocation::Cell => EntityKind::Cell,
        }
    }

    /// One position per entity: points, face centres or cell centres.
    fn positions(&self, mesh: &MeshPartition) -> Vec<Point3<Real>> {
        match self {
            FieldLocation::Point => mesh.points().to_vec(),
            FieldLocation::Face => mesh.face_centres(),
            FieldLocation::Cell => mesh.cell_centres(),
        }
    }
}

/// Dense per-entity values computed on one mesh revision.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSnapshot<T> {
    location: FieldLocation,
    revision: MeshRevision,
    /// Face values carry the sign of the face area vector (fluxes).
    oriented: bool,
    values: Vec<T>,
}

pub type ScalarField = FieldSnapshot<Real>;
pub type VectorField = FieldSnapshot<Vector3<Real>>;
pub type TensorField = FieldSnapshot<Matrix3<Real>>;

impl<T> FieldSnapshot<T> {
    /// Binds `values` to the current revision of `mesh`; one value per entity.
    pub fn new(
        mesh: &MeshPartition,
        location: FieldLocation,
        values: Vec<T>,
    ) -> Result<Self, MeshError> {
        let expected = mesh.entity_count(location.kind());
        if values.len() != expected {
            return Err(MeshError::FieldSizeMismatch {
                expected,
                found: values.len(),
            });
        }
        Ok(FieldSnapshot {
            location,
            revision: mesh.revision(),
            oriented: false,
            values,
        })
    }

    pub fn from_fn<F: FnMut(usize) -> T>(mesh: &MeshPartition, location: FieldLocation, f: F) -> Self {
        FieldSnapshot {
            location,
            revision: mesh.revision(),
            oriented: false,
            values: (0..mesh.entity_count(location.kind())).map(f).collect(),
        }
    }

    #[inline]
    pub const fn location(&self) -> FieldLocation {
        self.location
    }

    #[inline]
    pub const fn revision(&self) -> MeshRevision {
        self.revision
    }

    /// Marks a face field as oriented with its faces, so that a value changes sign
    /// when the face is flipped. No effect on point and cell fields.
    pub fn oriented(mut self) -> Self {
        self.oriented = self.location == FieldLocation::Face;
        self
    }

    #[inline]
    pub const fn is_oriented(&self) -> bool {
        self.oriented
    }

    #[inline]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn into_values(self) -> Vec<T> {
        self.values
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&T, MeshError> {
        MeshError::check_index(self.location.kind(), index, self.values.len())?;
        Ok(&self.values[index])
    }

    /// `true` while `mesh` is still in the state this field was computed on.
    pub fn is_current(&self, mesh: &MeshPartition) -> bool {
        self.revision == mesh.revision()
    }
}

impl<T: Clone> FieldSnapshot<T> {
    pub fn uniform(mesh: &MeshPartition, location: FieldLocation, value: T) -> Self {
        FieldSnapshot {
            location,
            revision: mesh.revision(),
            oriented: false,
            values: vec![value; mesh.entity_count(location.kind())],
        }
    }
}

/// How merged entities without a source value get one.
#[derive(Debug, Clone, PartialEq)]
pub enum RemapPolicy<T> {
    Fixed(T),
    /// Value of the nearest entity that has a source value.
    Nearest,
    /// Blend both sources where both exist (area-weighted on coupled faces, equal
    /// weights on coincident points). Added values of an oriented field are taken
    /// in the merged face's orientation first. Entities with no source stay
    /// unresolved.
    Interpolate,
}

/// Remaps fields defined on the inputs of one merge onto its result.
#[derive(Debug, Clone, Copy)]
pub struct FieldRemapper<'a> {
    merged: &'a MeshPartition,
    map: &'a AddedMeshMap,
}

impl<'a> FieldRemapper<'a> {
    /// `merged` must be the mesh `map` was produced with.
    pub fn new(merged: &'a MeshPartition, map: &'a AddedMeshMap) -> Result<Self, MeshError> {
        if merged.revision() != map.merged_revision() {
            return Err(MeshError::StaleField {
                field_revision: merged.revision(),
                expected: map.merged_revision(),
            });
        }
        Ok(FieldRemapper { merged, map })
    }

    fn check_source<T>(
        &self,
        side: Side,
        location: FieldLocation,
        field: &FieldSnapshot<T>,
    ) -> Result<(), MeshError> {
        if field.location != location {
            return Err(MeshError::FieldKindMismatch {
                expected: location.kind(),
                found: field.location.kind(),
            });
        }
        let expected = self.map.revision(side);
        if field.revision != expected {
            return Err(MeshError::StaleField {
                field_revision: field.revision,
                expected,
            });
        }
        let count = self.map.side(side).source_count(location.kind());
        if field.values.len() != count {
            return Err(MeshError::FieldSizeMismatch {
                expected: count,
                found: field.values.len(),
            });
        }
        Ok(())
    }

    /// For each merged entity, its lowest-numbered preimage on each side.
    fn preimages(&self, location: FieldLocation) -> Vec<(Option<usize>, Option<usize>)> {
        let mut pre = vec![(None, None); self.map.merged_count(location.kind())];
        let mut record = |targets: &mut dyn Iterator<Item = (usize, usize)>, side: Side| {
            for (old, new) in targets {
                let slot = match side {
                    Side::Master => &mut pre[new].0,
                    Side::Added => &mut pre[new].1,
                };
                if slot.is_none() {
                    *slot = Some(old);
                }
            }
        };
        for side in [Side::Master, Side::Added] {
            let pmap = self.map.side(side);
            match location {
                FieldLocation::Point => {
                    record(&mut pmap.old_point_to_new().iter().copied().enumerate(), side)
                },
                FieldLocation::Cell => {
                    record(&mut pmap.old_cell_to_new().iter().copied().enumerate(), side)
                },
                FieldLocation::Face => record(
                    &mut pmap
                        .old_face_to_new()
                        .iter()
                        .enumerate()
                        .filter_map(|(old, new)| new.map(|n| (old, n))),
                    side,
                ),
            }
        }
        if location == FieldLocation::Face {
            for cf in self.map.coupled_faces() {
                pre[cf.merged_face].1 = Some(cf.added_face);
            }
        }
        pre
    }

    /// Interpolation weights `(master, added)` for merged entity `index`.
    fn weights(&self, location: FieldLocation, index: usize, areas: &HashMap<usize, (Real, Real)>) -> (Real, Real) {
        match (location, areas.get(&index)) {
            (FieldLocation::Face, Some(&(am, aa))) if am + aa > 0.0 => (am / (am + aa), aa / (am + aa)),
            _ => (0.5, 0.5),
        }
    }

    /// Remaps one field onto the merged mesh.
    ///
    /// `master` and `added` are the field on each input (either may be absent).
    /// Values with a source are copied unchanged; when both inputs have a value the
    /// master's wins unless `policy` is `Interpolate`. If either input is
    /// [oriented](FieldSnapshot::oriented), the added side's value on a coupled face
    /// is negated, since that face now points into the added cell. Entities without any source
    /// are resolved by `policy`; if that is impossible the call fails with
    /// `UnmappedField` before producing anything.
    pub fn remap<T: FieldValue>(
        &self,
        name: &str,
        location: FieldLocation,
        master: Option<&FieldSnapshot<T>>,
        added: Option<&FieldSnapshot<T>>,
        policy: Option<&RemapPolicy<T>>,
    ) -> Result<FieldSnapshot<T>, MeshError> {
        if let Some(field) = master {
            self.check_source(Side::Master, location, field)?;
        }
        if let Some(field) = added {
            self.check_source(Side::Added, location, field)?;
        }

        let interpolate = matches!(policy, Some(RemapPolicy::Interpolate));
        let oriented = location == FieldLocation::Face
            && master.into_iter().chain(added).any(|f| f.oriented);
        let areas: HashMap<usize, (Real, Real)> = self
            .map
            .coupled_faces()
            .iter()
            .map(|cf| (cf.merged_face, (cf.master_area, cf.added_area)))
            .collect();

        let mut values: Vec<Option<T>> = self
            .preimages(location)
            .into_iter()
            .enumerate()
            .map(|(index, (m, a))| {
                let from_master = m.zip(master).map(|(i, f)| f.values[i]);
                let from_added = a.zip(added).map(|(i, f)| {
                    if oriented && areas.contains_key(&index) {
                        f.values[i] * -1.0
                    } else {
                        f.values[i]
                    }
                });
                match (from_master, from_added) {
                    (Some(x), Some(y)) if interpolate => {
                        let (wm, wa) = self.weights(location, index, &areas);
                        Some(x * wm + y * wa)
                    },
                    (Some(x), _) => Some(x),
                    (None, y) => y,
                }
            })
            .collect();

        let unresolved: Vec<usize> = values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_none())
            .map(|(i, _)| i)
            .collect();
        let unmapped = |count: usize| MeshError::UnmappedField {
            field: name.to_string(),
            unresolved: count,
        };

        if !unresolved.is_empty() {
            match policy {
                None | Some(RemapPolicy::Interpolate) => return Err(unmapped(unresolved.len())),
                Some(RemapPolicy::Fixed(value)) => {
                    unresolved.iter().for_each(|&i| values[i] = Some(*value));
                },
                Some(RemapPolicy::Nearest) => {
                    let positions = location.positions(self.merged);
                    let valued: Vec<usize> = (0..values.len()).filter(|&i| values[i].is_some()).collect();
                    if valued.is_empty() {
                        return Err(unmapped(unresolved.len()));
                    }
                    let radius = inflation_for(&self.merged.bounding_box());
                    let shapes = PointShapes::with_subset(&positions, valued, radius)?;
                    let tree = Octree::new(&shapes);
                    let queries: Vec<Point3<Real>> = unresolved.iter().map(|&i| positions[i]).collect();
                    let hits = tree.nearest_batch(&queries);
                    let mut filled = Vec::with_capacity(unresolved.len());
                    for (&i, hit) in unresolved.iter().zip(hits) {
                        let hit = hit.ok_or_else(|| unmapped(unresolved.len()))?;
                        filled.push((i, values[shapes.point_label(hit.shape)]));
                    }
                    filled.into_iter().for_each(|(i, v)| values[i] = v);
                },
            }
            tracing::trace!(field = name, resolved = unresolved.len(), "unmapped entities filled by policy");
        }

        let values = values
            .into_iter()
            .collect::<Option<Vec<T>>>()
            .ok_or_else(|| unmapped(unresolved.len()))?;
        Ok(FieldSnapshot {
            location,
            revision: self.merged.revision(),
            oriented,
            values,
        })
    }

    /// Remaps a named field set. A field present on only one side needs a policy in
    /// `policies` for the entities the other side contributed. Either every field is
    /// remapped or an error is returned.
    pub fn remap_fields<T: FieldValue>(
        &self,
        location: FieldLocation,
        master: &HashMap<String, FieldSnapshot<T>>,
        added: &HashMap<String, FieldSnapshot<T>>,
        policies: &HashMap<String, RemapPolicy<T>>,
    ) -> Result<HashMap<String, FieldSnapshot<T>>, MeshError> {
        let mut names: Vec<&String> = master.keys().chain(added.keys()).collect();
        names.sort();
        names.dedup();
        names
            .into_iter()
            .map(|name| {
                let field = self.remap(
                    name,
                    location,
                    master.get(name),
                    added.get(name),
                    policies.get(name),
                )?;
                Ok((name.clone(), field))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{MergeOptions, merge_meshes};

    fn cubes() -> (MeshPartition, MeshPartition) {
        let a = MeshPartition::cube(1.0).unwrap();
        let mut b = MeshPartition::cube(1.0).unwrap();
        b.move_points(|p| p + Vector3::x());
        (a, b)
    }

    #[test]
    fn cell_values_follow_cells() {
        let (a, b) = cubes();
        let (merged, map) = merge_meshes(&a, &b, None, &MergeOptions::default()).unwrap();
        let remapper = FieldRemapper::new(&merged, &map).unwrap();
        let fa = ScalarField::new(&a, FieldLocation::Cell, vec![1.5]).unwrap();
        let fb = ScalarField::new(&b, FieldLocation::Cell, vec![-2.0]).unwrap();
        let out = remapper
            .remap("p", FieldLocation::Cell, Some(&fa), Some(&fb), None)
            .unwrap();
        assert_eq!(out.values(), &[1.5, -2.0]);
        assert!(out.is_current(&merged));
    }

    #[test]
    fn coupled_face_keeps_master_value_or_blends() {
        let (a, b) = cubes();
        let (merged, map) = merge_meshes(&a, &b, None, &MergeOptions::default()).unwrap();
        let remapper = FieldRemapper::new(&merged, &map).unwrap();
        let fa = ScalarField::from_fn(&a, FieldLocation::Face, |f| f as Real);
        let fb = ScalarField::from_fn(&b, FieldLocation::Face, |f| 10.0 + f as Real);
        let kept = remapper
            .remap("phi", FieldLocation::Face, Some(&fa), Some(&fb), None)
            .unwrap();
        let coupled = map.coupled_faces()[0];
        assert_eq!(kept.values()[coupled.merged_face], coupled.master_face as Real);
        let blended = remapper
            .remap(
                "phi",
                FieldLocation::Face,
                Some(&fa),
                Some(&fb),
                Some(&RemapPolicy::Interpolate),
            )
            .unwrap();
        let expected = 0.5 * coupled.master_face as Real + 0.5 * (10.0 + coupled.added_face as Real);
        assert!((blended.values()[coupled.merged_face] - expected).abs() < 1e-12);
    }

    #[test]
    fn missing_side_needs_a_policy() {
        let (a, b) = cubes();
        let (merged, map) = merge_meshes(&a, &b, None, &MergeOptions::default()).unwrap();
        let remapper = FieldRemapper::new(&merged, &map).unwrap();
        let fa = VectorField::uniform(&a, FieldLocation::Cell, Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(
            remapper.remap("U", FieldLocation::Cell, Some(&fa), None, None),
            Err(MeshError::UnmappedField {
                field: "U".to_string(),
                unresolved: 1
            })
        );
        let fixed = remapper
            .remap(
                "U",
                FieldLocation::Cell,
                Some(&fa),
                None,
                Some(&RemapPolicy::Fixed(Vector3::zeros())),
            )
            .unwrap();
        assert_eq!(fixed.values()[1], Vector3::zeros());
        let nearest = remapper
            .remap("U", FieldLocation::Cell, Some(&fa), None, Some(&RemapPolicy::Nearest))
            .unwrap();
        assert_eq!(nearest.values()[1], Vector3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn snapshot_checks() {
        let (a, _) = cubes();
        assert_eq!(
            ScalarField::new(&a, FieldLocation::Point, vec![0.0; 3]),
            Err(MeshError::FieldSizeMismatch {
                expected: 8,
                found: 3
            })
        );
        let field = ScalarField::uniform(&a, FieldLocation::Face, 1.0);
        assert_eq!(field.len(), 6);
        assert!(field.get(6).is_err());
    }
}
