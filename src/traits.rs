use crate::aabb::BoundsExt;
use crate::float_types::{
    Real,
    parry3d::{bounding_volume::{Aabb, BoundingVolume}, query::Ray},
};
use nalgebra::Point3;

/// Geometric queries on an indexed collection of shapes.
///
/// This is the only thing an [`Octree`](crate::octree::Octree) knows about the
/// geometry it indexes. Shapes are addressed by a dense index `0..len()`; callers
/// of the per-shape methods guarantee the index is in range.
///
/// Implementations must keep every point returned by [`ShapeIndex::nearest_point`]
/// and every ray hit inside [`ShapeIndex::bounding_box`] of the same shape,
/// otherwise tree pruning may miss it.
pub trait ShapeIndex {
    /// Number of shapes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bounding box of shape `index`.
    fn bounding_box(&self, index: usize) -> Aabb;

    /// Does (the box of) shape `index` overlap `bounds`?
    fn overlaps(&self, index: usize, bounds: &Aabb) -> bool {
        self.bounding_box(index).intersects(bounds)
    }

    /// Does shape `index` contain `point`?
    fn contains(&self, index: usize, point: &Point3<Real>) -> bool;

    /// Nearest point of shape `index` to `point`, with the squared distance.
    fn nearest_point(&self, index: usize, point: &Point3<Real>) -> (Point3<Real>, Real);

    /// Time of impact of `ray` with shape `index` in `[0, max_toi]`.
    fn cast_ray(&self, index: usize, ray: &Ray, max_toi: Real) -> Option<Real>;

    /// One representative point per shape.
    fn shape_points(&self) -> Vec<Point3<Real>> {
        (0..self.len())
            .map(|i| self.bounding_box(i).center())
            .collect()
    }
}

impl<T: ShapeIndex + ?Sized> ShapeIndex for &T {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn bounding_box(&self, index: usize) -> Aabb {
        (**self).bounding_box(index)
    }

    fn overlaps(&self, index: usize, bounds: &Aabb) -> bool {
        (**self).overlaps(index, bounds)
    }

    fn contains(&self, index: usize, point: &Point3<Real>) -> bool {
        (**self).contains(index, point)
    }

    fn nearest_point(&self, index: usize, point: &Point3<Real>) -> (Point3<Real>, Real) {
        (**self).nearest_point(index, point)
    }

    fn cast_ray(&self, index: usize, ray: &Ray, max_toi: Real) -> Option<Real> {
        (**self).cast_ray(index, ray, max_toi)
    }

    fn shape_points(&self) -> Vec<Point3<Real>> {
        (**self).shape_points()
    }
}

/// Plain boxes are shapes too: handy for broad-phase indexing and for tests.
impl ShapeIndex for [Aabb] {
    fn len(&self) -> usize {
        <[Aabb]>::len(self)
    }

    fn bounding_box(&self, index: usize) -> Aabb {
        self[index]
    }

    fn contains(&self, index: usize, point: &Point3<Real>) -> bool {
        self[index].contains_point(point)
    }

    fn nearest_point(&self, index: usize, point: &Point3<Real>) -> (Point3<Real>, Real) {
        let b = &self[index];
        let nearest = point.sup(&b.mins).inf(&b.maxs);
        (nearest, (nearest - point).norm_squared())
    }

    fn cast_ray(&self, index: usize, ray: &Ray, max_toi: Real) -> Option<Real> {
        self[index].ray_entry(ray, max_toi)
    }
}

impl ShapeIndex for Vec<Aabb> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn bounding_box(&self, index: usize) -> Aabb {
        self[index]
    }

    fn contains(&self, index: usize, point: &Point3<Real>) -> bool {
        ShapeIndex::contains(self.as_slice(), index, point)
    }

    fn nearest_point(&self, index: usize, point: &Point3<Real>) -> (Point3<Real>, Real) {
        ShapeIndex::nearest_point(self.as_slice(), index, point)
    }

    fn cast_ray(&self, index: usize, ray: &Ray, max_toi: Real) -> Option<Real> {
        ShapeIndex::cast_ray(self.as_slice(), index, ray, max_toi)
    }
}
