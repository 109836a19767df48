//! Split point selection for octree construction

use crate::aabb::BoundsExt;
use crate::float_types::{Real, parry3d::bounding_volume::Aabb};
use crate::traits::ShapeIndex;
use nalgebra::Point3;

/// Trait for picking the point a node is split around
pub trait SplitPointStrategy {
    /// Candidate split points for the shapes `indices` of a node covering `bounds`,
    /// in order of preference. The builder takes the first candidate that actually
    /// separates the shapes; an empty list turns the node into a leaf.
    fn split_candidates<P: ShapeIndex + ?Sized>(
        &self,
        shapes: &P,
        indices: &[usize],
        bounds: &Aabb,
    ) -> Vec<Point3<Real>>;
}

/// Default strategy: centroid of the shape box centres, falling back to the per-axis
/// median when the centroid does not separate anything (clustered or collinear input).
#[derive(Debug, Clone, Copy, Default)]
pub struct CentroidSplit;

impl SplitPointStrategy for CentroidSplit {
    fn split_candidates<P: ShapeIndex + ?Sized>(
        &self,
        shapes: &P,
        indices: &[usize],
        bounds: &Aabb,
    ) -> Vec<Point3<Real>> {
        if indices.is_empty() {
            return Vec::new();
        }
        let centres: Vec<Point3<Real>> = indices
            .iter()
            .map(|&i| shapes.bounding_box(i).center())
            .collect();

        // All shapes centred on the same spot: splitting cannot help.
        let spread = match Aabb::from_point_iter(centres.iter().copied()) {
            Some(spread) => spread,
            None => return Vec::new(),
        };
        if (spread.maxs - spread.mins).iter().all(|&e| e <= 0.0) {
            return Vec::new();
        }

        let centroid = centres
            .iter()
            .fold(Point3::origin(), |acc, c| acc + c.coords)
            / centres.len() as Real;

        let mut median = Point3::origin();
        for axis in 0..3 {
            let mut coords: Vec<Real> = centres.iter().map(|c| c[axis]).collect();
            coords.sort_by(|a, b| a.total_cmp(b));
            median[axis] = coords[coords.len() / 2];
        }

        let clamp = |p: Point3<Real>| p.sup(&bounds.mins).inf(&bounds.maxs);
        let mut candidates = vec![clamp(centroid)];
        let median = clamp(median);
        if median != candidates[0] {
            candidates.push(median);
        }
        candidates.push(bounds.center());
        candidates.dedup();
        candidates
    }
}
