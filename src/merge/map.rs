//! Old-to-new index translation produced by a merge

use crate::errors::{EntityKind, MeshError, Side};
use crate::float_types::Real;
use crate::mesh::{MeshRevision, Patch};
use hashbrown::HashMap;

/// Where the entities of one input partition went in the merged mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionMap {
    pub(crate) old_point_to_new: Vec<usize>,
    /// `None` for faces that no longer exist (the added side of a coupled pair).
    pub(crate) old_face_to_new: Vec<Option<usize>>,
    pub(crate) old_cell_to_new: Vec<usize>,
    /// `None` for patches pruned from the merged mesh.
    pub(crate) old_patch_to_new: Vec<Option<usize>>,
    pub(crate) old_patches: Vec<Patch>,
    /// Old patch name to merged patch index.
    pub(crate) patch_map: HashMap<String, usize>,
    pub(crate) added_points: usize,
    pub(crate) added_faces: usize,
    pub(crate) added_cells: usize,
}

impl PartitionMap {
    #[inline]
    pub fn old_point_to_new(&self) -> &[usize] {
        &self.old_point_to_new
    }

    #[inline]
    pub fn old_face_to_new(&self) -> &[Option<usize>] {
        &self.old_face_to_new
    }

    #[inline]
    pub fn old_cell_to_new(&self) -> &[usize] {
        &self.old_cell_to_new
    }

    #[inline]
    pub fn old_patch_to_new(&self) -> &[Option<usize>] {
        &self.old_patch_to_new
    }

    #[inline]
    pub const fn patch_map(&self) -> &HashMap<String, usize> {
        &self.patch_map
    }

    pub fn point(&self, old: usize) -> Result<usize, MeshError> {
        MeshError::check_index(EntityKind::Point, old, self.old_point_to_new.len())?;
        Ok(self.old_point_to_new[old])
    }

    pub fn face(&self, old: usize) -> Result<Option<usize>, MeshError> {
        MeshError::check_index(EntityKind::Face, old, self.old_face_to_new.len())?;
        Ok(self.old_face_to_new[old])
    }

    pub fn cell(&self, old: usize) -> Result<usize, MeshError> {
        MeshError::check_index(EntityKind::Cell, old, self.old_cell_to_new.len())?;
        Ok(self.old_cell_to_new[old])
    }

    /// Number of entities of `kind` in the source partition.
    pub fn source_count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Point => self.old_point_to_new.len(),
            EntityKind::Face => self.old_face_to_new.len(),
            EntityKind::Cell => self.old_cell_to_new.len(),
            EntityKind::Patch => self.old_patch_to_new.len(),
            EntityKind::Shape => 0,
        }
    }

    /// Entities of `kind` this partition introduced into the merged mesh.
    pub const fn added_count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Point => self.added_points,
            EntityKind::Face => self.added_faces,
            EntityKind::Cell => self.added_cells,
            EntityKind::Patch | EntityKind::Shape => 0,
        }
    }

    /// For each face of `merged_patch` (merged patch number `merged_index`), its local
    /// index inside the old patch of this partition it came from, or `None` when it
    /// came from elsewhere.
    pub fn patch_face_addressing(
        &self,
        merged_index: usize,
        merged_patch: &Patch,
    ) -> Vec<Option<usize>> {
        let mut addressing = vec![None; merged_patch.size];
        for (old, target) in self.old_patch_to_new.iter().enumerate() {
            if *target != Some(merged_index) {
                continue;
            }
            let old_patch = &self.old_patches[old];
            for (local, f) in old_patch.range().enumerate() {
                if let Some(new) = self.old_face_to_new[f] {
                    if merged_patch.range().contains(&new) {
                        addressing[new - merged_patch.start] = Some(local);
                    }
                }
            }
        }
        addressing
    }
}

/// A boundary face pair that became one internal face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoupledFace {
    pub master_face: usize,
    pub added_face: usize,
    pub merged_face: usize,
    pub master_area: Real,
    pub added_area: Real,
}

/// Complete record of one merge: both partition maps, the coupled faces and the
/// revisions they relate.
#[derive(Debug, Clone, PartialEq)]
pub struct AddedMeshMap {
    pub(crate) master: PartitionMap,
    pub(crate) added: PartitionMap,
    pub(crate) coupled_faces: Vec<CoupledFace>,
    pub(crate) ambiguous_matches: usize,
    pub(crate) merged_points: usize,
    pub(crate) merged_faces: usize,
    pub(crate) merged_cells: usize,
    pub(crate) merged_patches: Vec<Patch>,
    pub(crate) master_revision: MeshRevision,
    pub(crate) added_revision: MeshRevision,
    pub(crate) merged_revision: MeshRevision,
}

impl AddedMeshMap {
    #[inline]
    pub const fn master(&self) -> &PartitionMap {
        &self.master
    }

    #[inline]
    pub const fn added(&self) -> &PartitionMap {
        &self.added
    }

    #[inline]
    pub const fn side(&self, side: Side) -> &PartitionMap {
        match side {
            Side::Master => &self.master,
            Side::Added => &self.added,
        }
    }

    #[inline]
    pub fn coupled_faces(&self) -> &[CoupledFace] {
        &self.coupled_faces
    }

    /// Always zero for a map that exists: ambiguity aborts the merge.
    #[inline]
    pub const fn ambiguous_matches(&self) -> usize {
        self.ambiguous_matches
    }

    pub fn merged_count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Point => self.merged_points,
            EntityKind::Face => self.merged_faces,
            EntityKind::Cell => self.merged_cells,
            EntityKind::Patch => self.merged_patches.len(),
            EntityKind::Shape => 0,
        }
    }

    #[inline]
    pub fn merged_patches(&self) -> &[Patch] {
        &self.merged_patches
    }

    pub const fn revision(&self, side: Side) -> MeshRevision {
        match side {
            Side::Master => self.master_revision,
            Side::Added => self.added_revision,
        }
    }

    #[inline]
    pub const fn merged_revision(&self) -> MeshRevision {
        self.merged_revision
    }

    /// [`PartitionMap::patch_face_addressing`] for merged patch `merged_patch`.
    pub fn patch_face_addressing(
        &self,
        side: Side,
        merged_patch: usize,
    ) -> Result<Vec<Option<usize>>, MeshError> {
        MeshError::check_index(EntityKind::Patch, merged_patch, self.merged_patches.len())?;
        Ok(self
            .side(side)
            .patch_face_addressing(merged_patch, &self.merged_patches[merged_patch]))
    }
}
