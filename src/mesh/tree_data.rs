//! `ShapeIndex` adapters that expose mesh cells, faces and points to an octree

use crate::aabb::BoundsExt;
use crate::errors::{EntityKind, MeshError};
use crate::float_types::{
    EPSILON, Real,
    parry3d::{
        bounding_volume::Aabb,
        query::{PointQuery, Ray, RayCast},
        shape::{Ball, Triangle},
    },
};
use crate::mesh::MeshPartition;
use crate::octree::{NearestHit, Octree, OctreeConfig};
use crate::traits::ShapeIndex;
use nalgebra::{Point3, Vector3};

/// How a cell answers "does this cell contain the point?"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellRepresentation {
    /// Inside every face plane. Exact for convex cells.
    #[default]
    FacePlanes,
    /// Inside one of the tetrahedra (cell centre, face centre, edge). Handles
    /// non-convex cells at a higher cost.
    FaceCentreTets,
}

/// Fan triangles `(centre, v_i, v_i+1)` of a face.
fn face_triangles<'a>(
    vertices: &'a [usize],
    points: &'a [Point3<Real>],
    centre: Point3<Real>,
) -> impl Iterator<Item = Triangle> + 'a {
    let n = vertices.len();
    (0..n).map(move |i| Triangle::new(centre, points[vertices[i]], points[vertices[(i + 1) % n]]))
}

fn signed_volume(a: &Point3<Real>, b: &Point3<Real>, c: &Point3<Real>, d: &Point3<Real>) -> Real {
    (b - a).dot(&(c - a).cross(&(d - a)))
}

fn point_in_tet(p: &Point3<Real>, t: [&Point3<Real>; 4]) -> bool {
    let [a, b, c, d] = t;
    let total = signed_volume(a, b, c, d);
    if total.abs() <= EPSILON {
        return false;
    }
    let slack = -EPSILON * total.abs();
    [
        signed_volume(p, b, c, d),
        signed_volume(a, p, c, d),
        signed_volume(a, b, p, d),
        signed_volume(a, b, c, p),
    ]
    .iter()
    .all(|v| v * total.signum() >= slack)
}

/// A subset of the cells of a mesh as octree shapes.
#[derive(Debug, Clone)]
pub struct CellShapes<'a> {
    mesh: &'a MeshPartition,
    labels: Vec<usize>,
    representation: CellRepresentation,
    cell_faces: Vec<Vec<usize>>,
    cell_centres: Vec<Point3<Real>>,
    face_centres: Vec<Point3<Real>>,
    face_areas: Vec<Vector3<Real>>,
    bounds: Vec<Aabb>,
}

impl<'a> CellShapes<'a> {
    /// Every cell of `mesh`.
    pub fn new(mesh: &'a MeshPartition, representation: CellRepresentation) -> Self {
        let labels = (0..mesh.n_cells()).collect();
        Self::build(mesh, labels, representation)
    }

    /// The cells `labels` of `mesh`; shape `i` is cell `labels[i]`.
    pub fn with_subset(
        mesh: &'a MeshPartition,
        labels: Vec<usize>,
        representation: CellRepresentation,
    ) -> Result<Self, MeshError> {
        for &c in &labels {
            MeshError::check_index(EntityKind::Cell, c, mesh.n_cells())?;
        }
        Ok(Self::build(mesh, labels, representation))
    }

    fn build(mesh: &'a MeshPartition, labels: Vec<usize>, representation: CellRepresentation) -> Self {
        let cell_faces = mesh.cell_faces();
        let cell_centres = mesh.cell_centres();
        let (face_centres, face_areas) = (0..mesh.n_faces())
            .map(|f| mesh.face_centre_and_area(f))
            .unzip();
        let bounds = labels
            .iter()
            .map(|&c| {
                let pts = mesh.cell_points(&cell_faces[c]);
                Aabb::from_point_iter(pts.iter().map(|&p| mesh.points()[p]))
                    .unwrap_or_else(|| Aabb::new(cell_centres[c], cell_centres[c]))
            })
            .collect();
        CellShapes {
            mesh,
            labels,
            representation,
            cell_faces,
            cell_centres,
            face_centres,
            face_areas,
            bounds,
        }
    }

    #[inline]
    pub fn cell_label(&self, shape: usize) -> usize {
        self.labels[shape]
    }

    #[inline]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    #[inline]
    pub const fn representation(&self) -> CellRepresentation {
        self.representation
    }

    /// Area vector of `face` pointing out of `cell`.
    fn outward_area(&self, face: usize, cell: usize) -> Vector3<Real> {
        if self.mesh.faces()[face].owner == cell {
            self.face_areas[face]
        } else {
            -self.face_areas[face]
        }
    }
}

impl ShapeIndex for CellShapes<'_> {
    fn len(&self) -> usize {
        self.labels.len()
    }

    fn bounding_box(&self, index: usize) -> Aabb {
        self.bounds[index]
    }

    fn contains(&self, index: usize, point: &Point3<Real>) -> bool {
        if !BoundsExt::contains_point(&self.bounds[index], point) {
            return false;
        }
        let cell = self.labels[index];
        let faces = &self.cell_faces[cell];
        match self.representation {
            CellRepresentation::FacePlanes => faces.iter().all(|&f| {
                let area = self.outward_area(f, cell);
                let mag = area.norm();
                let slack = EPSILON * mag * mag.sqrt();
                (point - self.face_centres[f]).dot(&area) <= slack
            }),
            CellRepresentation::FaceCentreTets => {
                let cc = &self.cell_centres[cell];
                let points = self.mesh.points();
                faces.iter().any(|&f| {
                    let vertices = &self.mesh.faces()[f].vertices;
                    let n = vertices.len();
                    (0..n).any(|i| {
                        let a = &points[vertices[i]];
                        let b = &points[vertices[(i + 1) % n]];
                        point_in_tet(point, [cc, &self.face_centres[f], a, b])
                    })
                })
            },
        }
    }

    fn nearest_point(&self, index: usize, point: &Point3<Real>) -> (Point3<Real>, Real) {
        let centre = self.cell_centres[self.labels[index]];
        (centre, (centre - point).norm_squared())
    }

    fn cast_ray(&self, index: usize, ray: &Ray, max_toi: Real) -> Option<Real> {
        let cell = self.labels[index];
        let points = self.mesh.points();
        self.cell_faces[cell]
            .iter()
            .flat_map(|&f| {
                face_triangles(&self.mesh.faces()[f].vertices, points, self.face_centres[f])
            })
            .filter_map(|tri| tri.cast_local_ray(ray, max_toi, true))
            .min_by(|a, b| a.total_cmp(b))
    }

    fn shape_points(&self) -> Vec<Point3<Real>> {
        self.labels.iter().map(|&c| self.cell_centres[c]).collect()
    }
}

/// A subset of the faces of a mesh as octree shapes.
#[derive(Debug, Clone)]
pub struct FaceShapes<'a> {
    mesh: &'a MeshPartition,
    labels: Vec<usize>,
    centres: Vec<Point3<Real>>,
    bounds: Vec<Aabb>,
    tolerance: Real,
}

impl<'a> FaceShapes<'a> {
    /// The faces `labels` of `mesh`. A point within `tolerance` of a face counts as
    /// contained by it.
    pub fn new(
        mesh: &'a MeshPartition,
        labels: Vec<usize>,
        tolerance: Real,
    ) -> Result<Self, MeshError> {
        for &f in &labels {
            MeshError::check_index(EntityKind::Face, f, mesh.n_faces())?;
        }
        Ok(Self::build(mesh, labels, tolerance))
    }

    /// Every boundary face of `mesh`.
    pub fn boundary(mesh: &'a MeshPartition, tolerance: Real) -> Self {
        Self::build(mesh, mesh.boundary_faces().collect(), tolerance)
    }

    fn build(mesh: &'a MeshPartition, labels: Vec<usize>, tolerance: Real) -> Self {
        let centres = labels.iter().map(|&f| mesh.face_centre_and_area(f).0).collect();
        let bounds = labels
            .iter()
            .map(|&f| {
                let vertices = &mesh.faces()[f].vertices;
                Aabb::from_point_iter(vertices.iter().map(|&v| mesh.points()[v]))
                    .unwrap_or_else(|| Aabb::new(Point3::origin(), Point3::origin()))
            })
            .collect();
        FaceShapes {
            mesh,
            labels,
            centres,
            bounds,
            tolerance,
        }
    }

    #[inline]
    pub fn face_label(&self, shape: usize) -> usize {
        self.labels[shape]
    }

    #[inline]
    pub fn centre(&self, shape: usize) -> Point3<Real> {
        self.centres[shape]
    }
}

impl ShapeIndex for FaceShapes<'_> {
    fn len(&self) -> usize {
        self.labels.len()
    }

    fn bounding_box(&self, index: usize) -> Aabb {
        self.bounds[index]
    }

    fn contains(&self, index: usize, point: &Point3<Real>) -> bool {
        self.bounds[index].distance_squared_to(point) <= self.tolerance * self.tolerance
            && self.nearest_point(index, point).1 <= self.tolerance * self.tolerance
    }

    fn nearest_point(&self, index: usize, point: &Point3<Real>) -> (Point3<Real>, Real) {
        let vertices = &self.mesh.faces()[self.labels[index]].vertices;
        face_triangles(vertices, self.mesh.points(), self.centres[index])
            .map(|tri| {
                let projected = tri.project_local_point(point, true).point;
                (projected, (projected - point).norm_squared())
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((self.centres[index], (self.centres[index] - point).norm_squared()))
    }

    fn cast_ray(&self, index: usize, ray: &Ray, max_toi: Real) -> Option<Real> {
        let vertices = &self.mesh.faces()[self.labels[index]].vertices;
        face_triangles(vertices, self.mesh.points(), self.centres[index])
            .filter_map(|tri| tri.cast_local_ray(ray, max_toi, true))
            .min_by(|a, b| a.total_cmp(b))
    }

    fn shape_points(&self) -> Vec<Point3<Real>> {
        self.centres.clone()
    }
}

/// Points as small spheres of radius `radius`.
#[derive(Debug, Clone)]
pub struct PointShapes<'a> {
    points: &'a [Point3<Real>],
    labels: Vec<usize>,
    radius: Real,
}

impl<'a> PointShapes<'a> {
    pub fn new(points: &'a [Point3<Real>], radius: Real) -> Self {
        PointShapes {
            points,
            labels: (0..points.len()).collect(),
            radius,
        }
    }

    pub fn with_subset(
        points: &'a [Point3<Real>],
        labels: Vec<usize>,
        radius: Real,
    ) -> Result<Self, MeshError> {
        for &p in &labels {
            MeshError::check_index(EntityKind::Point, p, points.len())?;
        }
        Ok(PointShapes {
            points,
            labels,
            radius,
        })
    }

    #[inline]
    pub fn point_label(&self, shape: usize) -> usize {
        self.labels[shape]
    }

    #[inline]
    pub const fn radius(&self) -> Real {
        self.radius
    }
}

impl ShapeIndex for PointShapes<'_> {
    fn len(&self) -> usize {
        self.labels.len()
    }

    fn bounding_box(&self, index: usize) -> Aabb {
        let p = self.points[self.labels[index]];
        Aabb::new(p, p).inflated(self.radius)
    }

    fn contains(&self, index: usize, point: &Point3<Real>) -> bool {
        (self.points[self.labels[index]] - point).norm_squared() <= self.radius * self.radius
    }

    fn nearest_point(&self, index: usize, point: &Point3<Real>) -> (Point3<Real>, Real) {
        let p = self.points[self.labels[index]];
        (p, (p - point).norm_squared())
    }

    fn cast_ray(&self, index: usize, ray: &Ray, max_toi: Real) -> Option<Real> {
        let p = self.points[self.labels[index]];
        let local = Ray::new(ray.origin - p.coords, ray.dir);
        Ball::new(self.radius).cast_local_ray(&local, max_toi, true)
    }

    fn shape_points(&self) -> Vec<Point3<Real>> {
        self.labels.iter().map(|&p| self.points[p]).collect()
    }
}

/// Point location over the cells of a mesh.
#[derive(Debug, Clone)]
pub struct CellLocator<'a> {
    tree: Octree<CellShapes<'a>>,
}

impl<'a> CellLocator<'a> {
    pub fn new(mesh: &'a MeshPartition, representation: CellRepresentation) -> Self {
        Self::with_config(mesh, representation, OctreeConfig::default())
    }

    pub fn with_config(
        mesh: &'a MeshPartition,
        representation: CellRepresentation,
        config: OctreeConfig,
    ) -> Self {
        CellLocator {
            tree: Octree::with_config(CellShapes::new(mesh, representation), config),
        }
    }

    #[inline]
    pub const fn tree(&self) -> &Octree<CellShapes<'a>> {
        &self.tree
    }

    /// Lowest-numbered cell containing `point`.
    pub fn find_cell(&self, point: &Point3<Real>) -> Option<usize> {
        self.tree
            .find_inside(point)
            .map(|s| self.tree.shapes().cell_label(s))
    }

    /// Cell whose centre is nearest to `point`; `shape` in the hit is the cell label.
    pub fn nearest_cell(&self, point: &Point3<Real>) -> Option<NearestHit> {
        self.tree.nearest(point).map(|hit| NearestHit {
            shape: self.tree.shapes().cell_label(hit.shape),
            ..hit
        })
    }

    /// First cell face crossed by `ray`, as `(cell, toi)`.
    pub fn intersect_ray(&self, ray: &Ray, max_toi: Real) -> Option<(usize, Real)> {
        self.tree
            .intersect_ray(ray, max_toi)
            .map(|hit| (self.tree.shapes().cell_label(hit.shape), hit.toi))
    }
}
