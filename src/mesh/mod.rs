//! `MeshPartition`: a polyhedral mesh described by points, faces and boundary patches
//!
//! Faces are stored with all internal faces first, followed by the boundary faces
//! patch by patch. A face's vertex loop is oriented so that its right-hand normal
//! points out of its owner cell (and into its neighbour, for internal faces).

pub mod shapes;
pub mod subset;
pub mod tree_data;

use crate::aabb::BoundsExt;
use crate::errors::{EntityKind, MeshError};
use crate::float_types::{Real, parry3d::bounding_volume::Aabb};
use hashbrown::HashSet;
use nalgebra::{Point3, Vector3};
use std::fmt::Display;
use std::ops::Range;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

/// Identity of one state of a mesh. Every construction or mutation of a
/// [`MeshPartition`] produces a fresh revision; data computed on a mesh is only
/// meaningful against the revision it was computed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshRevision(u64);

impl MeshRevision {
    fn next() -> Self {
        MeshRevision(NEXT_REVISION.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl Display for MeshRevision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Face {
    /// Point indices; the loop orientation defines the face normal.
    pub vertices: Vec<usize>,
    pub owner: usize,
    /// `Some` for internal faces.
    pub neighbour: Option<usize>,
}

impl Face {
    pub const fn new(vertices: Vec<usize>, owner: usize, neighbour: Option<usize>) -> Self {
        Face {
            vertices,
            owner,
            neighbour,
        }
    }

    pub const fn boundary(vertices: Vec<usize>, owner: usize) -> Self {
        Face::new(vertices, owner, None)
    }

    pub const fn internal(vertices: Vec<usize>, owner: usize, neighbour: usize) -> Self {
        Face::new(vertices, owner, Some(neighbour))
    }

    #[inline]
    pub const fn is_internal(&self) -> bool {
        self.neighbour.is_some()
    }

    /// Same loop, opposite normal.
    pub fn reversed_vertices(&self) -> Vec<usize> {
        let mut v = self.vertices.clone();
        v.reverse();
        v
    }
}

/// A named, contiguous range of boundary faces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub name: String,
    pub start: usize,
    pub size: usize,
}

impl Patch {
    pub fn new(name: impl Into<String>, start: usize, size: usize) -> Self {
        Patch {
            name: name.into(),
            start,
            size,
        }
    }

    #[inline]
    pub const fn range(&self) -> Range<usize> {
        self.start..self.start + self.size
    }
}

#[derive(Debug, Clone)]
pub struct MeshPartition {
    points: Vec<Point3<Real>>,
    faces: Vec<Face>,
    patches: Vec<Patch>,
    n_cells: usize,
    n_internal_faces: usize,
    revision: MeshRevision,

    /// Lazily calculated AABB that spans `points`.
    bounding_box: OnceLock<Aabb>,
}

impl MeshPartition {
    /// Build and validate a mesh. See [`MeshPartition::validate`] for the checks.
    pub fn new(
        points: Vec<Point3<Real>>,
        faces: Vec<Face>,
        patches: Vec<Patch>,
    ) -> Result<Self, MeshError> {
        let mut mesh = MeshPartition {
            points,
            faces,
            patches,
            n_cells: 0,
            n_internal_faces: 0,
            revision: MeshRevision::next(),
            bounding_box: OnceLock::new(),
        };
        mesh.n_internal_faces = mesh.faces.iter().take_while(|f| f.is_internal()).count();
        // a cell needs at least one face, so labels stay below twice the face count
        let label_limit = mesh.faces.len().saturating_mul(2);
        for (f, face) in mesh.faces.iter().enumerate() {
            let last = face.owner.max(face.neighbour.unwrap_or(0));
            if last >= label_limit {
                return Err(MeshError::topology(format!(
                    "face {f} refers to cell {last}, more cells than {} faces can bound",
                    mesh.faces.len()
                )));
            }
            mesh.n_cells = mesh.n_cells.max(last + 1);
        }
        mesh.validate()?;
        Ok(mesh)
    }

    /// Build from internal faces plus per-patch boundary face lists; patch ranges are
    /// derived from the list order.
    pub fn from_parts(
        points: Vec<Point3<Real>>,
        internal_faces: Vec<Face>,
        boundary: Vec<(String, Vec<Face>)>,
    ) -> Result<Self, MeshError> {
        let mut faces = internal_faces;
        let mut patches = Vec::with_capacity(boundary.len());
        for (name, patch_faces) in boundary {
            patches.push(Patch::new(name, faces.len(), patch_faces.len()));
            faces.extend(patch_faces);
        }
        Self::new(points, faces, patches)
    }

    #[inline]
    pub fn points(&self) -> &[Point3<Real>] {
        &self.points
    }

    #[inline]
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    #[inline]
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    #[inline]
    pub fn n_points(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn n_faces(&self) -> usize {
        self.faces.len()
    }

    #[inline]
    pub const fn n_internal_faces(&self) -> usize {
        self.n_internal_faces
    }

    #[inline]
    pub fn n_boundary_faces(&self) -> usize {
        self.faces.len() - self.n_internal_faces
    }

    #[inline]
    pub const fn n_cells(&self) -> usize {
        self.n_cells
    }

    #[inline]
    pub const fn revision(&self) -> MeshRevision {
        self.revision
    }

    /// Number of entities of `kind` (points, faces, cells or patches).
    pub fn entity_count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Point => self.n_points(),
            EntityKind::Face => self.n_faces(),
            EntityKind::Cell => self.n_cells(),
            EntityKind::Patch => self.patches.len(),
            EntityKind::Shape => 0,
        }
    }

    #[inline]
    pub fn boundary_faces(&self) -> Range<usize> {
        self.n_internal_faces..self.faces.len()
    }

    pub fn patch_index(&self, name: &str) -> Option<usize> {
        self.patches.iter().position(|p| p.name == name)
    }

    /// Patch holding `face`, or `None` for internal faces.
    pub fn patch_of_face(&self, face: usize) -> Option<usize> {
        self.patches.iter().position(|p| p.range().contains(&face))
    }

    /// Lazily computed bounds of all points.
    pub fn bounding_box(&self) -> Aabb {
        *self.bounding_box.get_or_init(|| {
            Aabb::from_point_iter(self.points.iter().copied())
                .unwrap_or_else(|| Aabb::new(Point3::origin(), Point3::origin()))
        })
    }

    /// Apply `f` to every point. The mesh gets a new revision.
    pub fn move_points<F: Fn(&Point3<Real>) -> Point3<Real>>(&mut self, f: F) {
        self.points.iter_mut().for_each(|p| *p = f(p));
        self.bounding_box = OnceLock::new();
        self.revision = MeshRevision::next();
    }

    /// Area-weighted centre and area vector of `face`.
    pub fn face_centre_and_area(&self, face: usize) -> (Point3<Real>, Vector3<Real>) {
        polygon_centre_and_area(&self.faces[face].vertices, &self.points)
    }

    pub fn face_centres(&self) -> Vec<Point3<Real>> {
        (0..self.faces.len())
            .map(|f| self.face_centre_and_area(f).0)
            .collect()
    }

    pub fn face_areas(&self) -> Vec<Vector3<Real>> {
        (0..self.faces.len())
            .map(|f| self.face_centre_and_area(f).1)
            .collect()
    }

    /// Faces of every cell, in face order.
    pub fn cell_faces(&self) -> Vec<Vec<usize>> {
        let mut cells = vec![Vec::new(); self.n_cells];
        for (f, face) in self.faces.iter().enumerate() {
            cells[face.owner].push(f);
            if let Some(n) = face.neighbour {
                cells[n].push(f);
            }
        }
        cells
    }

    /// Distinct points of `cell`, sorted.
    pub fn cell_points(&self, cell_faces: &[usize]) -> Vec<usize> {
        let mut pts: Vec<usize> = cell_faces
            .iter()
            .flat_map(|&f| self.faces[f].vertices.iter().copied())
            .collect();
        pts.sort_unstable();
        pts.dedup();
        pts
    }

    /// Cell centres and volumes by pyramid decomposition about an estimated centre.
    pub fn cell_centres_and_volumes(&self) -> (Vec<Point3<Real>>, Vec<Real>) {
        let (face_centres, face_areas): (Vec<_>, Vec<_>) = (0..self.faces.len())
            .map(|f| self.face_centre_and_area(f))
            .unzip();

        let mut estimate = vec![Vector3::zeros(); self.n_cells];
        let mut n_faces = vec![0usize; self.n_cells];
        for (f, face) in self.faces.iter().enumerate() {
            estimate[face.owner] += face_centres[f].coords;
            n_faces[face.owner] += 1;
            if let Some(n) = face.neighbour {
                estimate[n] += face_centres[f].coords;
                n_faces[n] += 1;
            }
        }
        let estimate: Vec<Point3<Real>> = estimate
            .iter()
            .zip(&n_faces)
            .map(|(sum, &n)| Point3::from(sum / (n.max(1) as Real)))
            .collect();

        let mut weighted = vec![Vector3::zeros(); self.n_cells];
        let mut volume3 = vec![0.0; self.n_cells];
        let mut accumulate = |cell: usize, signed_area: Vector3<Real>, fc: &Point3<Real>| {
            let pyr3 = signed_area.dot(&(fc - estimate[cell]));
            let pyr_centre = fc.coords * 0.75 + estimate[cell].coords * 0.25;
            weighted[cell] += pyr_centre * pyr3;
            volume3[cell] += pyr3;
        };
        for (f, face) in self.faces.iter().enumerate() {
            accumulate(face.owner, face_areas[f], &face_centres[f]);
            if let Some(n) = face.neighbour {
                accumulate(n, -face_areas[f], &face_centres[f]);
            }
        }

        let centres = (0..self.n_cells)
            .map(|c| {
                if volume3[c].abs() > Real::EPSILON {
                    Point3::from(weighted[c] / volume3[c])
                } else {
                    estimate[c]
                }
            })
            .collect();
        let volumes = volume3.into_iter().map(|v| v / 3.0).collect();
        (centres, volumes)
    }

    pub fn cell_centres(&self) -> Vec<Point3<Real>> {
        self.cell_centres_and_volumes().0
    }

    /// Checks every structural invariant:
    /// - faces have at least three distinct, in-range vertices
    /// - internal faces precede boundary faces and never have `owner == neighbour`
    /// - patches have unique names and tile the boundary faces in order
    /// - every cell has at least four faces and its outward face areas sum to zero
    pub fn validate(&self) -> Result<(), MeshError> {
        let n_points = self.points.len();
        for (f, face) in self.faces.iter().enumerate() {
            if face.vertices.len() < 3 {
                return Err(MeshError::topology(format!(
                    "face {f} has only {} vertices",
                    face.vertices.len()
                )));
            }
            for &v in &face.vertices {
                MeshError::check_index(EntityKind::Point, v, n_points)?;
            }
            let distinct: HashSet<usize> = face.vertices.iter().copied().collect();
            if distinct.len() != face.vertices.len() {
                return Err(MeshError::topology(format!("face {f} repeats a vertex")));
            }
            match face.neighbour {
                Some(n) if n == face.owner => {
                    return Err(MeshError::topology(format!(
                        "face {f} has owner and neighbour {n}"
                    )));
                },
                Some(_) if f >= self.n_internal_faces => {
                    return Err(MeshError::topology(format!(
                        "internal face {f} found after the first boundary face"
                    )));
                },
                _ => {},
            }
        }

        let mut expected_start = self.n_internal_faces;
        let mut names = HashSet::new();
        for patch in &self.patches {
            if !names.insert(patch.name.as_str()) {
                return Err(MeshError::topology(format!(
                    "duplicate patch name '{}'",
                    patch.name
                )));
            }
            if patch.start != expected_start {
                return Err(MeshError::topology(format!(
                    "patch '{}' starts at {} but should start at {expected_start}",
                    patch.name, patch.start
                )));
            }
            expected_start += patch.size;
        }
        if expected_start != self.faces.len() {
            return Err(MeshError::topology(format!(
                "patches cover faces up to {expected_start} but the mesh has {} faces",
                self.faces.len()
            )));
        }

        self.check_closed_cells()
    }

    fn check_closed_cells(&self) -> Result<(), MeshError> {
        let mut sum = vec![Vector3::<Real>::zeros(); self.n_cells];
        let mut magnitude = vec![0.0; self.n_cells];
        let mut count = vec![0usize; self.n_cells];
        for (f, face) in self.faces.iter().enumerate() {
            let (_, area) = self.face_centre_and_area(f);
            let mag = area.norm();
            sum[face.owner] += area;
            magnitude[face.owner] += mag;
            count[face.owner] += 1;
            if let Some(n) = face.neighbour {
                sum[n] -= area;
                magnitude[n] += mag;
                count[n] += 1;
            }
        }
        for c in 0..self.n_cells {
            if count[c] < 4 {
                return Err(MeshError::topology(format!(
                    "cell {c} has {} faces, a closed cell needs at least 4",
                    count[c]
                )));
            }
            if sum[c].norm() > 1e-6 * magnitude[c] {
                return Err(MeshError::topology(format!(
                    "cell {c} is not closed or its faces are inconsistently oriented"
                )));
            }
        }
        Ok(())
    }

    /// Cell containing `point`, located through a freshly built octree.
    /// Build a [`tree_data::CellLocator`] instead when locating many points.
    pub fn find_cell(&self, point: &Point3<Real>) -> Option<usize> {
        tree_data::CellLocator::new(self, tree_data::CellRepresentation::default())
            .find_cell(point)
    }
}

/// Area-weighted centre and area vector of the polygon `vertices`, triangulated as a
/// fan about the vertex average.
pub fn polygon_centre_and_area(
    vertices: &[usize],
    points: &[Point3<Real>],
) -> (Point3<Real>, Vector3<Real>) {
    let n = vertices.len();
    if n == 3 {
        let [a, b, c] = [points[vertices[0]], points[vertices[1]], points[vertices[2]]];
        let centre = Point3::from((a.coords + b.coords + c.coords) / 3.0);
        return (centre, (b - a).cross(&(c - a)) * 0.5);
    }
    let estimate = Point3::from(
        vertices
            .iter()
            .fold(Vector3::zeros(), |acc, &v| acc + points[v].coords)
            / (n.max(1) as Real),
    );
    let mut sum_n = Vector3::zeros();
    let mut sum_a = 0.0;
    let mut sum_ac = Vector3::zeros();
    for i in 0..n {
        let p = points[vertices[i]];
        let q = points[vertices[(i + 1) % n]];
        let c = (p.coords + q.coords + estimate.coords) / 3.0;
        let normal = (q - p).cross(&(estimate - p));
        let a = normal.norm();
        sum_n += normal;
        sum_a += a;
        sum_ac += c * a;
    }
    let centre = if sum_a > Real::EPSILON {
        Point3::from(sum_ac / sum_a)
    } else {
        estimate
    };
    (centre, sum_n * 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revisions_are_unique() {
        let a = MeshPartition::cube(1.0).unwrap();
        let b = MeshPartition::cube(1.0).unwrap();
        assert_ne!(a.revision(), b.revision());
        let mut c = a.clone();
        assert_eq!(a.revision(), c.revision());
        c.move_points(|p| p + Vector3::x());
        assert_ne!(a.revision(), c.revision());
        assert_eq!(c.bounding_box().mins.x, 1.0);
    }

    #[test]
    fn unit_cube_geometry() {
        let cube = MeshPartition::cube(2.0).unwrap();
        assert_eq!(cube.n_cells(), 1);
        assert_eq!(cube.n_faces(), 6);
        assert_eq!(cube.n_internal_faces(), 0);
        let (centres, volumes) = cube.cell_centres_and_volumes();
        assert!((volumes[0] - 8.0).abs() < 1e-12);
        assert!((centres[0] - Point3::new(1.0, 1.0, 1.0)).norm() < 1e-12);
        for f in 0..6 {
            let (fc, area) = cube.face_centre_and_area(f);
            assert!((area.norm() - 4.0).abs() < 1e-12);
            // outward: from cell centre toward face centre
            assert!(area.dot(&(fc - centres[0])) > 0.0);
        }
    }

    #[test]
    fn rejects_flipped_face() {
        let cube = MeshPartition::cube(1.0).unwrap();
        let mut faces = cube.faces().to_vec();
        faces[2].vertices.reverse();
        let err = MeshPartition::new(cube.points().to_vec(), faces, cube.patches().to_vec());
        assert!(matches!(err, Err(MeshError::TopologyInconsistent(_))));
    }

    #[test]
    fn rejects_out_of_range_vertex() {
        let cube = MeshPartition::cube(1.0).unwrap();
        let mut faces = cube.faces().to_vec();
        faces[0].vertices[0] = 99;
        let err = MeshPartition::new(cube.points().to_vec(), faces, cube.patches().to_vec());
        assert_eq!(
            err.unwrap_err(),
            MeshError::IndexOutOfRange {
                kind: EntityKind::Point,
                index: 99,
                len: 8
            }
        );
    }

    #[test]
    fn rejects_huge_cell_label() {
        let cube = MeshPartition::cube(1.0).unwrap();
        for label in [usize::MAX, usize::MAX - 1, 12] {
            let mut faces = cube.faces().to_vec();
            faces[3].owner = label;
            let err = MeshPartition::new(cube.points().to_vec(), faces, cube.patches().to_vec());
            assert!(matches!(err, Err(MeshError::TopologyInconsistent(_))));
        }
    }

    #[test]
    fn rejects_gapped_patches() {
        let cube = MeshPartition::cube(1.0).unwrap();
        let patches = vec![Patch::new("walls", 0, 5)];
        let err = MeshPartition::new(cube.points().to_vec(), cube.faces().to_vec(), patches);
        assert!(matches!(err, Err(MeshError::TopologyInconsistent(_))));
    }

    #[test]
    fn finds_cell_in_block() {
        let block =
            MeshPartition::hex_block(Point3::origin(), [3, 2, 2], Vector3::new(1.0, 1.0, 1.0))
                .unwrap();
        // cell (i=2, j=1, k=0) = 2 + 3 * (1 + 2 * 0)
        assert_eq!(block.find_cell(&Point3::new(2.5, 1.5, 0.5)), Some(5));
        assert_eq!(block.find_cell(&Point3::new(3.5, 1.5, 0.5)), None);
    }
}
