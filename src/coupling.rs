//! Boundary face correspondence between two mesh partitions
//!
//! Faces are matched by their centres: a face of `A` and a face of `B` are coupled
//! when each is the other's nearest candidate within the matching tolerance.

use crate::errors::{EntityKind, MeshError, Side};
use crate::float_types::{Real, parry3d::bounding_volume::Aabb, tolerance};
use crate::mesh::MeshPartition;
use crate::mesh::tree_data::FaceShapes;
use crate::octree::{Octree, OctreeConfig};
use hashbrown::HashSet;
use nalgebra::{Point3, Vector3};

/// How boundary faces are matched.
#[derive(Debug, Clone, PartialEq)]
pub struct CouplingOptions {
    /// Maximum centre distance of a coupled pair.
    pub tolerance: Real,
    /// Two candidates whose distances differ by less than this cannot be told apart.
    pub resolution: Real,
    /// Restrict `A`'s candidate faces to these patches (`None`: all boundary faces).
    pub patches_a: Option<Vec<String>>,
    /// Restrict `B`'s candidate faces to these patches.
    pub patches_b: Option<Vec<String>>,
    /// Look candidates up through an octree instead of scanning every face.
    pub accelerate: bool,
    pub octree: OctreeConfig,
}

impl Default for CouplingOptions {
    fn default() -> Self {
        let tolerance = tolerance();
        Self {
            tolerance,
            resolution: tolerance * 1e-3,
            patches_a: None,
            patches_b: None,
            accelerate: true,
            octree: OctreeConfig::default(),
        }
    }
}

impl CouplingOptions {
    pub fn with_tolerance(mut self, tolerance: Real) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_resolution(mut self, resolution: Real) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_patches_a<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.patches_a = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_patches_b<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.patches_b = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_acceleration(mut self, accelerate: bool) -> Self {
        self.accelerate = accelerate;
        self
    }
}

/// Coupled boundary faces of two partitions.
#[derive(Debug, Clone, PartialEq)]
pub struct CoupleMap {
    /// `(face in A, face in B)`, sorted by the `A` face.
    pairs: Vec<(usize, usize)>,
    tolerance: Real,
    unmatched_a: Vec<usize>,
    unmatched_b: Vec<usize>,
}

impl CoupleMap {
    /// A coupling supplied by the caller. Pairs are sorted by their `A` face; a face
    /// may appear in at most one pair. Unmatched face lists are left empty.
    pub fn from_pairs(mut pairs: Vec<(usize, usize)>, tolerance: Real) -> Result<Self, MeshError> {
        pairs.sort_unstable();
        let mut seen_a = HashSet::new();
        let mut seen_b = HashSet::new();
        for &(a, b) in &pairs {
            if !seen_a.insert(a) || !seen_b.insert(b) {
                return Err(MeshError::topology(format!(
                    "face pair ({a}, {b}) reuses a face that is already coupled"
                )));
            }
        }
        Ok(CoupleMap {
            pairs,
            tolerance,
            unmatched_a: Vec::new(),
            unmatched_b: Vec::new(),
        })
    }

    #[inline]
    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    #[inline]
    pub const fn tolerance(&self) -> Real {
        self.tolerance
    }

    /// Candidate faces of `A` that found no partner; they stay exterior boundary.
    #[inline]
    pub fn unmatched_a(&self) -> &[usize] {
        &self.unmatched_a
    }

    #[inline]
    pub fn unmatched_b(&self) -> &[usize] {
        &self.unmatched_b
    }
}

/// Boundary faces of `mesh` belonging to `patches`, or every boundary face.
fn candidate_faces(mesh: &MeshPartition, patches: Option<&[String]>) -> Result<Vec<usize>, MeshError> {
    let Some(names) = patches else {
        return Ok(mesh.boundary_faces().collect());
    };
    let mut faces = Vec::new();
    for name in names {
        let patch = mesh
            .patch_index(name)
            .ok_or_else(|| MeshError::topology(format!("mesh has no patch named '{name}'")))?;
        faces.extend(mesh.patches()[patch].range());
    }
    faces.sort_unstable();
    faces.dedup();
    Ok(faces)
}

/// For each `from` face, the single nearest `to` face within tolerance (as a face
/// label of `to`), or `None`.
fn best_candidates(
    from_centres: &[Point3<Real>],
    from_labels: &[usize],
    to: &MeshPartition,
    to_labels: &[usize],
    side: Side,
    options: &CouplingOptions,
) -> Result<Vec<Option<usize>>, MeshError> {
    let tol = options.tolerance;
    let to_shapes = FaceShapes::new(to, to_labels.to_vec(), tol)?;
    let to_centres: Vec<Point3<Real>> = (0..to_labels.len()).map(|s| to_shapes.centre(s)).collect();
    let tree = options
        .accelerate
        .then(|| Octree::with_config(&to_shapes, options.octree));

    let mut best = Vec::with_capacity(from_centres.len());
    for (i, centre) in from_centres.iter().enumerate() {
        let shapes: Vec<usize> = match &tree {
            Some(tree) => {
                let reach = Vector3::repeat(tol);
                tree.find_box(&Aabb::new(*centre - reach, *centre + reach))
            },
            None => (0..to_labels.len()).collect(),
        };
        let mut candidates: Vec<(Real, usize)> = shapes
            .into_iter()
            .map(|s| ((to_centres[s] - centre).norm(), to_labels[s]))
            .filter(|&(d, _)| d <= tol)
            .collect();
        candidates.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)));

        if let [(d0, _), (d1, _), ..] = candidates.as_slice() {
            if d1 - d0 < options.resolution {
                let tied = candidates
                    .iter()
                    .take_while(|(d, _)| d - d0 < options.resolution)
                    .map(|&(_, f)| f)
                    .collect();
                return Err(MeshError::AmbiguousCoupling {
                    side,
                    face: from_labels[i],
                    candidates: tied,
                });
            }
        }
        best.push(candidates.first().map(|&(_, f)| f));
    }
    Ok(best)
}

/// Couple the boundary faces of `a` and `b` by mutual-nearest face centres.
pub fn match_boundaries(
    a: &MeshPartition,
    b: &MeshPartition,
    options: &CouplingOptions,
) -> Result<CoupleMap, MeshError> {
    let faces_a = candidate_faces(a, options.patches_a.as_deref())?;
    let faces_b = candidate_faces(b, options.patches_b.as_deref())?;
    let centres_a: Vec<Point3<Real>> = faces_a.iter().map(|&f| a.face_centre_and_area(f).0).collect();
    let centres_b: Vec<Point3<Real>> = faces_b.iter().map(|&f| b.face_centre_and_area(f).0).collect();

    let a_to_b = best_candidates(&centres_a, &faces_a, b, &faces_b, Side::Master, options)?;
    let b_to_a = best_candidates(&centres_b, &faces_b, a, &faces_a, Side::Added, options)?;

    let b_slot = |face: usize| faces_b.binary_search(&face).ok();
    let mut pairs = Vec::new();
    let mut matched_b = vec![false; faces_b.len()];
    let mut unmatched_a = Vec::new();
    for (i, &fa) in faces_a.iter().enumerate() {
        let mutual = a_to_b[i]
            .and_then(|fb| b_slot(fb).map(|j| (fb, j)))
            .filter(|&(_, j)| b_to_a[j] == Some(fa));
        match mutual {
            Some((fb, j)) => {
                pairs.push((fa, fb));
                matched_b[j] = true;
            },
            None => unmatched_a.push(fa),
        }
    }
    let unmatched_b = faces_b
        .iter()
        .zip(&matched_b)
        .filter(|&(_, &m)| !m)
        .map(|(&f, _)| f)
        .collect::<Vec<_>>();

    tracing::debug!(
        candidates_a = faces_a.len(),
        candidates_b = faces_b.len(),
        coupled = pairs.len(),
        tolerance = options.tolerance,
        "boundary faces coupled"
    );

    Ok(CoupleMap {
        pairs,
        tolerance: options.tolerance,
        unmatched_a,
        unmatched_b,
    })
}

/// Checks that every pair couples a boundary face of `a` with a boundary face of `b`.
pub(crate) fn check_pairs(
    couples: &CoupleMap,
    a: &MeshPartition,
    b: &MeshPartition,
) -> Result<(), MeshError> {
    for &(fa, fb) in couples.pairs() {
        MeshError::check_index(EntityKind::Face, fa, a.n_faces())?;
        MeshError::check_index(EntityKind::Face, fb, b.n_faces())?;
        if fa < a.n_internal_faces() || fb < b.n_internal_faces() {
            return Err(MeshError::topology(format!(
                "coupled pair ({fa}, {fb}) involves an internal face"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::shapes::BlockSide;

    fn unit_block(origin: Point3<Real>, divisions: [usize; 3], spacing: Vector3<Real>) -> MeshPartition {
        MeshPartition::hex_block(origin, divisions, spacing).unwrap()
    }

    #[test]
    fn touching_blocks_couple() {
        let a = unit_block(Point3::origin(), [1, 2, 1], Vector3::new(1.0, 1.0, 1.0));
        let b = unit_block(Point3::new(1.0, 0.0, 0.0), [1, 2, 1], Vector3::new(1.0, 1.0, 1.0));
        for accelerate in [true, false] {
            let options = CouplingOptions::default().with_acceleration(accelerate);
            let couples = match_boundaries(&a, &b, &options).unwrap();
            assert_eq!(couples.len(), 2);
            let xmax = &a.patches()[a.patch_index("xmax").unwrap()];
            let xmin = &b.patches()[b.patch_index("xmin").unwrap()];
            assert_eq!(couples.pairs(), &[(xmax.start, xmin.start), (xmax.start + 1, xmin.start + 1)]);
            assert_eq!(couples.unmatched_a().len(), a.n_boundary_faces() - 2);
            assert_eq!(couples.unmatched_b().len(), b.n_boundary_faces() - 2);
        }
    }

    #[test]
    fn distant_blocks_do_not_couple() {
        let a = MeshPartition::cube(1.0).unwrap();
        let b = unit_block(Point3::new(3.0, 0.0, 0.0), [1, 1, 1], Vector3::new(1.0, 1.0, 1.0));
        let couples = match_boundaries(&a, &b, &CouplingOptions::default()).unwrap();
        assert!(couples.is_empty());
    }

    #[test]
    fn equidistant_candidates_are_ambiguous() {
        let a = MeshPartition::cube(1.0).unwrap();
        // two half-height faces at x = 1, each 0.25 away from a's face centre
        let b = unit_block(Point3::new(1.0, 0.0, 0.0), [1, 2, 1], Vector3::new(1.0, 0.5, 1.0));
        let options = CouplingOptions::default().with_tolerance(0.3);
        let err = match_boundaries(&a, &b, &options).unwrap_err();
        let xmin = b.patches()[b.patch_index("xmin").unwrap()].start;
        match err {
            MeshError::AmbiguousCoupling {
                side, candidates, ..
            } => {
                assert_eq!(side, Side::Master);
                assert_eq!(candidates, vec![xmin, xmin + 1]);
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn patch_filter_limits_candidates() {
        let a = unit_block(Point3::origin(), [1, 1, 1], Vector3::new(1.0, 1.0, 1.0));
        let b = MeshPartition::hex_block_with_patches(
            Point3::new(1.0, 0.0, 0.0),
            [1, 1, 1],
            Vector3::new(1.0, 1.0, 1.0),
            |side, _| match side {
                BlockSide::XMin => "interface".to_string(),
                _ => "walls".to_string(),
            },
        )
        .unwrap();
        let options = CouplingOptions::default().with_patches_a(["xmax"]).with_patches_b(["walls"]);
        assert!(match_boundaries(&a, &b, &options).unwrap().is_empty());
        let options = CouplingOptions::default().with_patches_a(["xmax"]).with_patches_b(["interface"]);
        assert_eq!(match_boundaries(&a, &b, &options).unwrap().len(), 1);
        let missing = CouplingOptions::default().with_patches_b(["nope"]);
        assert!(matches!(
            match_boundaries(&a, &b, &missing),
            Err(MeshError::TopologyInconsistent(_))
        ));
    }

    #[test]
    fn caller_pairs_must_be_unique() {
        assert!(CoupleMap::from_pairs(vec![(3, 1), (2, 1)], 1e-6).is_err());
        let map = CoupleMap::from_pairs(vec![(3, 1), (2, 0)], 1e-6).unwrap();
        assert_eq!(map.pairs(), &[(2, 0), (3, 1)]);
    }
}
