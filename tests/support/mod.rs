//! Test support library
//! Provides mesh builders and brute-force references shared by the integration tests.
#![allow(dead_code)]

use meshstitch::{
    MeshPartition, ShapeIndex,
    float_types::{
        Real,
        parry3d::{bounding_volume::Aabb, query::Ray},
    },
    mesh::shapes::BlockSide,
};
use nalgebra::{Point3, Vector3};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Quick helper to compare floating-point results with an acceptable tolerance.
pub fn approx_eq(a: Real, b: Real, eps: Real) -> bool {
    (a - b).abs() < eps
}

pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Unit-spaced block with the default `xmin` .. `zmax` patches.
pub fn block(origin: [Real; 3], divisions: [usize; 3]) -> MeshPartition {
    MeshPartition::hex_block(
        Point3::new(origin[0], origin[1], origin[2]),
        divisions,
        Vector3::new(1.0, 1.0, 1.0),
    )
    .unwrap()
}

/// The two partitions of the interface scenario:
/// - `A`: 2x2x1 cells on `[0,2]x[0,2]x[0,1]`, its `+x` side is patch `interface`
///   (2 faces), everything else `walls`.
/// - `B`: 1x3x1 cells on `[2,3]x[0,3]x[0,1]`, the two `-x` faces touching `A` are
///   `interface`, everything else `walls`.
pub fn interface_pair() -> (MeshPartition, MeshPartition) {
    let a = MeshPartition::hex_block_with_patches(
        Point3::origin(),
        [2, 2, 1],
        Vector3::new(1.0, 1.0, 1.0),
        |side, _| match side {
            BlockSide::XMax => "interface".to_string(),
            _ => "walls".to_string(),
        },
    )
    .unwrap();
    let b = MeshPartition::hex_block_with_patches(
        Point3::new(2.0, 0.0, 0.0),
        [1, 3, 1],
        Vector3::new(1.0, 1.0, 1.0),
        |side, [_, j, _]| match side {
            BlockSide::XMin if j < 2 => "interface".to_string(),
            _ => "walls".to_string(),
        },
    )
    .unwrap();
    (a, b)
}

/// Random boxes with corners in `[0, extent)^3` and sizes up to `max_size`.
pub fn random_boxes(rng: &mut StdRng, n: usize, extent: Real, max_size: Real) -> Vec<Aabb> {
    (0..n)
        .map(|_| {
            let min = Point3::new(
                rng.random_range(0.0..extent),
                rng.random_range(0.0..extent),
                rng.random_range(0.0..extent),
            );
            let size = Vector3::new(
                rng.random_range(0.01..max_size),
                rng.random_range(0.01..max_size),
                rng.random_range(0.01..max_size),
            );
            Aabb::new(min, min + size)
        })
        .collect()
}

pub fn random_point(rng: &mut StdRng, lo: Real, hi: Real) -> Point3<Real> {
    Point3::new(
        rng.random_range(lo..hi),
        rng.random_range(lo..hi),
        rng.random_range(lo..hi),
    )
}

/// Exhaustive nearest shape: `(shape, distance squared)`, lowest index on ties.
pub fn brute_nearest<S: ShapeIndex + ?Sized>(shapes: &S, point: &Point3<Real>) -> Option<(usize, Real)> {
    let mut best: Option<(usize, Real)> = None;
    for i in 0..shapes.len() {
        let (_, d2) = shapes.nearest_point(i, point);
        if best.is_none_or(|(_, b)| d2 < b) {
            best = Some((i, d2));
        }
    }
    best
}

/// Exhaustive first ray hit: `(shape, toi)`, lowest index on ties.
pub fn brute_ray<S: ShapeIndex + ?Sized>(shapes: &S, ray: &Ray, max_toi: Real) -> Option<(usize, Real)> {
    let mut best: Option<(usize, Real)> = None;
    for i in 0..shapes.len() {
        if let Some(toi) = shapes.cast_ray(i, ray, max_toi) {
            if best.is_none_or(|(_, b)| toi < b) {
                best = Some((i, toi));
            }
        }
    }
    best
}

/// Sorted centres of the internal faces, as integer-free comparable tuples.
pub fn internal_face_centres(mesh: &MeshPartition) -> Vec<[Real; 3]> {
    let mut centres: Vec<[Real; 3]> = (0..mesh.n_internal_faces())
        .map(|f| {
            let c = mesh.face_centre_and_area(f).0;
            [c.x, c.y, c.z]
        })
        .collect();
    centres.sort_by(|a, b| {
        a[0].total_cmp(&b[0])
            .then(a[1].total_cmp(&b[1]))
            .then(a[2].total_cmp(&b[2]))
    });
    centres
}
