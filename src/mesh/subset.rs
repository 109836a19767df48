//! Extracting a cell subset as a standalone `MeshPartition`

use crate::errors::{EntityKind, MeshError};
use crate::mesh::{Face, MeshPartition};

/// New-to-old addressing of a subset mesh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubsetMap {
    pub point_map: Vec<usize>,
    pub face_map: Vec<usize>,
    pub cell_map: Vec<usize>,
}

impl MeshPartition {
    /// Mesh made of the cells `cells` (any order, duplicates ignored).
    ///
    /// Internal faces cut by the subset become boundary faces in `exposed_patch`,
    /// which is appended when no patch of that name exists. Their orientation is
    /// flipped where the kept cell was the neighbour, so they still point outwards.
    pub fn subset_cells(
        &self,
        cells: &[usize],
        exposed_patch: &str,
    ) -> Result<(MeshPartition, SubsetMap), MeshError> {
        let mut new_cell = vec![None; self.n_cells()];
        for &c in cells {
            MeshError::check_index(EntityKind::Cell, c, self.n_cells())?;
            new_cell[c] = Some(0);
        }
        let mut cell_map = Vec::new();
        for (old, slot) in new_cell.iter_mut().enumerate() {
            if slot.is_some() {
                *slot = Some(cell_map.len());
                cell_map.push(old);
            }
        }

        let mut internal = Vec::new();
        let mut internal_src = Vec::new();
        let mut exposed = Vec::new();
        let mut exposed_src = Vec::new();
        for f in 0..self.n_internal_faces() {
            let face = &self.faces[f];
            let Some(nei) = face.neighbour else { continue };
            match (new_cell[face.owner], new_cell[nei]) {
                (Some(o), Some(n)) => {
                    internal.push(Face::internal(face.vertices.clone(), o, n));
                    internal_src.push(f);
                },
                (Some(o), None) => {
                    exposed.push(Face::boundary(face.vertices.clone(), o));
                    exposed_src.push(f);
                },
                (None, Some(n)) => {
                    exposed.push(Face::boundary(face.reversed_vertices(), n));
                    exposed_src.push(f);
                },
                (None, None) => {},
            }
        }

        let mut patches: Vec<(String, Vec<Face>, Vec<usize>)> = Vec::new();
        for patch in &self.patches {
            let mut faces = Vec::new();
            let mut src = Vec::new();
            for f in patch.range() {
                if let Some(o) = new_cell[self.faces[f].owner] {
                    faces.push(Face::boundary(self.faces[f].vertices.clone(), o));
                    src.push(f);
                }
            }
            patches.push((patch.name.clone(), faces, src));
        }
        match patches.iter_mut().find(|(name, _, _)| name == exposed_patch) {
            Some((_, faces, src)) => {
                faces.extend(exposed);
                src.extend(exposed_src);
            },
            None => patches.push((exposed_patch.to_string(), exposed, exposed_src)),
        }

        let mut face_map = internal_src;
        for (_, _, src) in &patches {
            face_map.extend(src);
        }

        // compact points, keeping their relative order
        let mut new_point: Vec<Option<usize>> = vec![None; self.n_points()];
        let all_faces = internal.iter().chain(patches.iter().flat_map(|(_, f, _)| f));
        for face in all_faces {
            for &v in &face.vertices {
                new_point[v] = Some(0);
            }
        }
        let mut point_map = Vec::new();
        for (old, slot) in new_point.iter_mut().enumerate() {
            if slot.is_some() {
                *slot = Some(point_map.len());
                point_map.push(old);
            }
        }
        // every vertex of a kept face was numbered above
        let renumber = |face: &mut Face| {
            face.vertices
                .iter_mut()
                .for_each(|v| *v = new_point[*v].unwrap_or(*v));
        };
        internal.iter_mut().for_each(renumber);
        let boundary = patches
            .into_iter()
            .map(|(name, mut faces, _)| {
                faces.iter_mut().for_each(renumber);
                (name, faces)
            })
            .collect();
        let points = point_map.iter().map(|&p| self.points[p]).collect();

        let mesh = MeshPartition::from_parts(points, internal, boundary)?;
        Ok((
            mesh,
            SubsetMap {
                point_map,
                face_map,
                cell_map,
            },
        ))
    }
}
