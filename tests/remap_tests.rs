mod support;

use hashbrown::HashMap;
use meshstitch::{
    FieldLocation, FieldRemapper, FieldSnapshot, MeshError, MergeOptions, RemapPolicy, add_mesh,
    float_types::Real, merge_meshes,
    remap::{ScalarField, TensorField, VectorField},
};
use nalgebra::{Matrix3, Vector3};
use rand::Rng;
use support::*;

#[test]
fn unchanged_entities_are_bit_identical() {
    let (a, b) = interface_pair();
    let mut rng = rng(41);
    let pa: Vec<Real> = (0..a.n_cells()).map(|_| rng.random::<Real>()).collect();
    let pb: Vec<Real> = (0..b.n_cells()).map(|_| rng.random::<Real>()).collect();
    let fa = ScalarField::new(&a, FieldLocation::Cell, pa.clone()).unwrap();
    let fb = ScalarField::new(&b, FieldLocation::Cell, pb.clone()).unwrap();

    let (merged, map) = merge_meshes(&a, &b, None, &MergeOptions::default()).unwrap();
    let remapper = FieldRemapper::new(&merged, &map).unwrap();
    let out = remapper
        .remap("p", FieldLocation::Cell, Some(&fa), Some(&fb), None)
        .unwrap();
    for (old, &v) in pa.iter().enumerate() {
        assert_eq!(out.values()[map.master().cell(old).unwrap()].to_bits(), v.to_bits());
    }
    for (old, &v) in pb.iter().enumerate() {
        assert_eq!(out.values()[map.added().cell(old).unwrap()].to_bits(), v.to_bits());
    }

    // points: every point has a source, shared ones keep A's value
    let ua = VectorField::from_fn(&a, FieldLocation::Point, |p| Vector3::new(p as Real, 0.0, 1.0));
    let ub = VectorField::from_fn(&b, FieldLocation::Point, |p| Vector3::new(-(p as Real), 2.0, 3.0));
    let u = remapper
        .remap("U", FieldLocation::Point, Some(&ua), Some(&ub), None)
        .unwrap();
    for (old, v) in ua.values().iter().enumerate() {
        assert_eq!(&u.values()[map.master().point(old).unwrap()], v);
    }
    for (old, v) in ub.values().iter().enumerate() {
        let new = map.added().point(old).unwrap();
        if new >= a.n_points() {
            assert_eq!(&u.values()[new], v);
        } else {
            assert_eq!(u.values()[new], ua.values()[new]);
        }
    }
}

#[test]
fn face_fields_follow_faces() {
    let (a, b) = interface_pair();
    let (merged, map) = merge_meshes(&a, &b, None, &MergeOptions::default()).unwrap();
    let remapper = FieldRemapper::new(&merged, &map).unwrap();
    let fa = ScalarField::from_fn(&a, FieldLocation::Face, |f| f as Real);
    let fb = ScalarField::from_fn(&b, FieldLocation::Face, |f| 100.0 + f as Real);
    let phi = remapper
        .remap("phi", FieldLocation::Face, Some(&fa), Some(&fb), None)
        .unwrap();
    assert_eq!(phi.len(), merged.n_faces());
    for (old, new) in map.added().old_face_to_new().iter().enumerate() {
        if let Some(new) = new {
            assert_eq!(phi.values()[*new], 100.0 + old as Real);
        }
    }
    for cf in map.coupled_faces() {
        assert_eq!(phi.values()[cf.merged_face], cf.master_face as Real);
    }

    let blended = remapper
        .remap("phi", FieldLocation::Face, Some(&fa), Some(&fb), Some(&RemapPolicy::Interpolate))
        .unwrap();
    for cf in map.coupled_faces() {
        let expected = 0.5 * (cf.master_face as Real) + 0.5 * (100.0 + cf.added_face as Real);
        assert!(approx_eq(blended.values()[cf.merged_face], expected, 1e-12));
    }
}

#[test]
fn missing_values_need_an_explicit_policy() {
    let (a, b) = interface_pair();
    let (merged, map) = merge_meshes(&a, &b, None, &MergeOptions::default()).unwrap();
    let remapper = FieldRemapper::new(&merged, &map).unwrap();
    let fa = ScalarField::from_fn(&a, FieldLocation::Cell, |c| c as Real);

    assert_eq!(
        remapper.remap("T", FieldLocation::Cell, Some(&fa), None, None),
        Err(MeshError::UnmappedField {
            field: "T".to_string(),
            unresolved: 3
        })
    );
    assert!(matches!(
        remapper.remap("T", FieldLocation::Cell, Some(&fa), None, Some(&RemapPolicy::Interpolate)),
        Err(MeshError::UnmappedField { unresolved: 3, .. })
    ));

    let fixed = remapper
        .remap("T", FieldLocation::Cell, Some(&fa), None, Some(&RemapPolicy::Fixed(-1.0)))
        .unwrap();
    assert_eq!(&fixed.values()[4..], &[-1.0, -1.0, -1.0]);

    // B cells sit at x = 2.5; the nearest A cells are the x = 1.5 column
    let nearest = remapper
        .remap("T", FieldLocation::Cell, Some(&fa), None, Some(&RemapPolicy::Nearest))
        .unwrap();
    // A cells: (i, j) -> i + 2 j, so the x = 1.5 column is cells 1 (y = 0.5) and 3 (y = 1.5)
    assert_eq!(nearest.values()[4], 1.0);
    assert_eq!(nearest.values()[5], 3.0);
    assert_eq!(nearest.values()[6], 3.0);
}

#[test]
fn stale_and_mismatched_fields_are_rejected() {
    let (a, mut b) = interface_pair();
    let old_b = ScalarField::uniform(&b, FieldLocation::Cell, 1.0);
    b.move_points(|p| *p);
    let fresh_b = ScalarField::uniform(&b, FieldLocation::Cell, 1.0);
    let fa = ScalarField::uniform(&a, FieldLocation::Cell, 0.0);

    let (merged, map) = merge_meshes(&a, &b, None, &MergeOptions::default()).unwrap();
    let remapper = FieldRemapper::new(&merged, &map).unwrap();
    assert!(matches!(
        remapper.remap("p", FieldLocation::Cell, Some(&fa), Some(&old_b), None),
        Err(MeshError::StaleField { .. })
    ));
    assert!(remapper
        .remap("p", FieldLocation::Cell, Some(&fa), Some(&fresh_b), None)
        .is_ok());
    let faces_a = ScalarField::uniform(&a, FieldLocation::Face, 0.0);
    assert!(matches!(
        remapper.remap("p", FieldLocation::Cell, Some(&faces_a), Some(&fresh_b), None),
        Err(MeshError::FieldKindMismatch { .. })
    ));

    // the merged mesh moves on: the remapper refuses the old map
    let mut moved = merged.clone();
    moved.move_points(|p| p + Vector3::new(0.0, 0.0, 1.0));
    assert!(matches!(
        FieldRemapper::new(&moved, &map),
        Err(MeshError::StaleField { .. })
    ));
}

#[test]
fn field_sets_remap_together() {
    let (mut a, b) = interface_pair();
    let mut master: HashMap<String, TensorField> = HashMap::new();
    let mut added: HashMap<String, TensorField> = HashMap::new();
    master.insert("R".into(), FieldSnapshot::uniform(&a, FieldLocation::Cell, Matrix3::identity()));
    added.insert("R".into(), FieldSnapshot::uniform(&b, FieldLocation::Cell, Matrix3::zeros()));
    master.insert("S".into(), FieldSnapshot::uniform(&a, FieldLocation::Cell, Matrix3::identity() * 2.0));

    let map = add_mesh(&mut a, &b, None, &MergeOptions::default()).unwrap();
    let remapper = FieldRemapper::new(&a, &map).unwrap();

    // "S" exists only on the master: the whole set fails without a policy
    let none = HashMap::new();
    assert!(matches!(
        remapper.remap_fields(FieldLocation::Cell, &master, &added, &none),
        Err(MeshError::UnmappedField { ref field, .. }) if field == "S"
    ));

    let mut policies = HashMap::new();
    policies.insert("S".to_string(), RemapPolicy::Fixed(Matrix3::zeros()));
    let fields = remapper
        .remap_fields(FieldLocation::Cell, &master, &added, &policies)
        .unwrap();
    assert_eq!(fields.len(), 2);
    assert_eq!(fields["R"].values()[0], Matrix3::identity());
    assert_eq!(fields["R"].values()[6], Matrix3::zeros());
    assert_eq!(fields["S"].values()[3], Matrix3::identity() * 2.0);
    assert_eq!(fields["S"].values()[5], Matrix3::zeros());
    assert!(fields.values().all(|f| f.is_current(&a)));
}

#[test]
fn fluxes_keep_their_sign_across_the_interface() {
    let (a, b) = interface_pair();
    let u = Vector3::new(1.0, 0.0, 0.0);
    let flux = |mesh: &meshstitch::MeshPartition| {
        ScalarField::from_fn(mesh, FieldLocation::Face, |f| mesh.face_centre_and_area(f).1.dot(&u))
            .oriented()
    };
    let (fa, fb) = (flux(&a), flux(&b));
    assert!(fa.is_oriented());

    let (merged, map) = merge_meshes(&a, &b, None, &MergeOptions::default()).unwrap();
    let remapper = FieldRemapper::new(&merged, &map).unwrap();
    let out = remapper
        .remap("phi", FieldLocation::Face, Some(&fa), Some(&fb), Some(&RemapPolicy::Interpolate))
        .unwrap();
    assert!(out.is_oriented());
    for f in 0..merged.n_faces() {
        let exact = merged.face_centre_and_area(f).1.dot(&u);
        assert!(approx_eq(out.values()[f], exact, 1e-12), "face {f}: {} vs {exact}", out.values()[f]);
    }
    for cf in map.coupled_faces() {
        assert!(approx_eq(out.values()[cf.merged_face], 1.0, 1e-12));
    }

    // only the added side known: its flux still points from A into B
    let only_b = remapper
        .remap("phi", FieldLocation::Face, None, Some(&fb), Some(&RemapPolicy::Fixed(0.0)))
        .unwrap();
    for cf in map.coupled_faces() {
        assert!(approx_eq(only_b.values()[cf.merged_face], 1.0, 1e-12));
    }

    let cells = ScalarField::uniform(&a, FieldLocation::Cell, 1.0).oriented();
    assert!(!cells.is_oriented());
}
