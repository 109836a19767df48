//! Axis-aligned box helpers layered over parry's [`Aabb`].

use crate::float_types::{
    EPSILON, Real,
    parry3d::{
        bounding_volume::{Aabb, BoundingVolume},
        query::{Ray, RayCast},
    },
};
use nalgebra::{Point3, Vector3};

/// Classification of a shape bounding box before it enters a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsQuality {
    /// Finite, ordered and with positive extent along at least one axis.
    Valid,
    /// Finite and ordered, but every extent is zero (a point box).
    ZeroExtent,
    /// Some coordinate is NaN or infinite.
    NonFinite,
    /// `mins > maxs` along some axis.
    Inverted,
}

pub trait BoundsExt {
    /// The smallest box enclosing `points`; `None` when the iterator is empty.
    fn from_point_iter<I: IntoIterator<Item = Point3<Real>>>(points: I) -> Option<Aabb>;

    fn quality(&self) -> BoundsQuality;

    /// Squared distance from `point` to the closed box (zero inside).
    fn distance_squared_to(&self, point: &Point3<Real>) -> Real;

    /// Closed containment test, robust to infinite boxes.
    fn contains_point(&self, point: &Point3<Real>) -> bool;

    /// The sub-box of octant `octant` (bit 0 = +x, bit 1 = +y, bit 2 = +z) around `split`.
    fn octant(&self, split: &Point3<Real>, octant: usize) -> Aabb;

    /// Entry time of `ray` into the box within `[0, max_toi]`, or `None` on a miss.
    fn ray_entry(&self, ray: &Ray, max_toi: Real) -> Option<Real>;

    /// Grows the box by `amount` on every side.
    fn inflated(&self, amount: Real) -> Aabb;
}

impl BoundsExt for Aabb {
    fn from_point_iter<I: IntoIterator<Item = Point3<Real>>>(points: I) -> Option<Aabb> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Aabb::new(first, first);
        for p in iter {
            bounds.mins = bounds.mins.inf(&p);
            bounds.maxs = bounds.maxs.sup(&p);
        }
        Some(bounds)
    }

    fn quality(&self) -> BoundsQuality {
        let finite = self.mins.iter().chain(self.maxs.iter()).all(|c| c.is_finite());
        if !finite {
            return BoundsQuality::NonFinite;
        }
        let extents = self.maxs - self.mins;
        if extents.iter().any(|&e| e < 0.0) {
            return BoundsQuality::Inverted;
        }
        if extents.iter().all(|&e| e <= EPSILON) {
            return BoundsQuality::ZeroExtent;
        }
        BoundsQuality::Valid
    }

    fn distance_squared_to(&self, point: &Point3<Real>) -> Real {
        let mut d2 = 0.0;
        for axis in 0..3 {
            let c = point[axis];
            let excess = if c < self.mins[axis] {
                self.mins[axis] - c
            } else if c > self.maxs[axis] {
                c - self.maxs[axis]
            } else {
                0.0
            };
            d2 += excess * excess;
        }
        d2
    }

    fn contains_point(&self, point: &Point3<Real>) -> bool {
        (0..3).all(|axis| point[axis] >= self.mins[axis] && point[axis] <= self.maxs[axis])
    }

    fn octant(&self, split: &Point3<Real>, octant: usize) -> Aabb {
        let mut mins = self.mins;
        let mut maxs = self.maxs;
        for axis in 0..3 {
            if octant & (1 << axis) == 0 {
                maxs[axis] = split[axis];
            } else {
                mins[axis] = split[axis];
            }
        }
        Aabb::new(mins, maxs)
    }

    fn ray_entry(&self, ray: &Ray, max_toi: Real) -> Option<Real> {
        if self.contains_point(&ray.origin) {
            return Some(0.0);
        }
        self.cast_local_ray(ray, max_toi, true)
    }

    fn inflated(&self, amount: Real) -> Aabb {
        self.loosened(amount)
    }
}

/// Cube-ish half extent used to inflate point shapes so their box is never degenerate.
pub fn inflation_for(bounds: &Aabb) -> Real {
    let diag: Vector3<Real> = bounds.maxs - bounds.mins;
    let scale = diag.norm();
    if scale.is_finite() && scale > 0.0 {
        scale * 1e-6
    } else {
        1e-6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> Aabb {
        Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn quality_classification() {
        assert_eq!(unit().quality(), BoundsQuality::Valid);
        let p = Point3::new(0.5, 0.5, 0.5);
        assert_eq!(Aabb::new(p, p).quality(), BoundsQuality::ZeroExtent);
        let nan = Aabb::new(Point3::new(Real::NAN, 0.0, 0.0), p);
        assert_eq!(nan.quality(), BoundsQuality::NonFinite);
        let inverted = Aabb::new(Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 1.0));
        assert_eq!(inverted.quality(), BoundsQuality::Inverted);
        // a flat face box is still usable
        let flat = Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 0.0));
        assert_eq!(flat.quality(), BoundsQuality::Valid);
    }

    #[test]
    fn distance_and_containment() {
        let b = unit();
        assert_eq!(b.distance_squared_to(&Point3::new(0.5, 0.5, 0.5)), 0.0);
        assert_eq!(b.distance_squared_to(&Point3::new(2.0, 0.5, 0.5)), 1.0);
        assert_eq!(b.distance_squared_to(&Point3::new(2.0, 2.0, 0.5)), 2.0);
        assert!(b.contains_point(&Point3::new(1.0, 1.0, 1.0)));
        assert!(!b.contains_point(&Point3::new(1.0 + 1e-9, 1.0, 1.0)));
    }

    #[test]
    fn octants_tile_the_box() {
        let b = unit();
        let split = Point3::new(0.25, 0.5, 0.75);
        let volume: Real = (0..8)
            .map(|o| {
                let e = b.octant(&split, o).extents();
                e.x * e.y * e.z
            })
            .sum();
        assert!((volume - 1.0).abs() < 1e-12);
        let upper = b.octant(&split, 7);
        assert_eq!(upper.mins, split);
        assert_eq!(upper.maxs, b.maxs);
    }

    #[test]
    fn ray_entry_slab() {
        let b = unit();
        let ray = Ray::new(Point3::new(-1.0, 0.5, 0.5), Vector3::x());
        assert_eq!(b.ray_entry(&ray, 10.0), Some(1.0));
        assert_eq!(b.ray_entry(&ray, 0.5), None);
        let away = Ray::new(Point3::new(-1.0, 0.5, 0.5), -Vector3::x());
        assert_eq!(b.ray_entry(&away, 10.0), None);
        let inside = Ray::new(Point3::new(0.5, 0.5, 0.5), Vector3::y());
        assert_eq!(b.ray_entry(&inside, 10.0), Some(0.0));
    }

    #[test]
    fn bounds_of_points() {
        assert!(Aabb::from_point_iter(std::iter::empty()).is_none());
        let b = Aabb::from_point_iter([
            Point3::new(1.0, -1.0, 0.0),
            Point3::new(-2.0, 3.0, 0.5),
        ])
        .unwrap();
        assert_eq!(b.mins, Point3::new(-2.0, -1.0, 0.0));
        assert_eq!(b.maxs, Point3::new(1.0, 3.0, 0.5));
    }
}
