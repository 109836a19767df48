//! Serial batch queries

use crate::float_types::Real;
use crate::octree::{NearestHit, Octree};
use crate::traits::ShapeIndex;
use nalgebra::Point3;

impl<P: ShapeIndex> Octree<P> {
    /// Nearest shape for each point of `points`.
    pub fn nearest_batch(&self, points: &[Point3<Real>]) -> Vec<Option<NearestHit>> {
        points.iter().map(|p| self.nearest(p)).collect()
    }

    /// Containing shape for each point of `points`.
    pub fn find_inside_batch(&self, points: &[Point3<Real>]) -> Vec<Option<usize>> {
        points.iter().map(|p| self.find_inside(p)).collect()
    }
}
