//! Parallel batch queries

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::float_types::Real;
use crate::octree::{NearestHit, Octree};
use crate::traits::ShapeIndex;
use nalgebra::Point3;

#[cfg(feature = "parallel")]
impl<P: ShapeIndex + Sync> Octree<P> {
    /// Nearest shape for each point of `points`, queried in parallel.
    pub fn nearest_batch(&self, points: &[Point3<Real>]) -> Vec<Option<NearestHit>> {
        points.par_iter().map(|p| self.nearest(p)).collect()
    }

    /// Containing shape for each point of `points`, queried in parallel.
    pub fn find_inside_batch(&self, points: &[Point3<Real>]) -> Vec<Option<usize>> {
        points.par_iter().map(|p| self.find_inside(p)).collect()
    }
}
