//! Property tests for `ptm_index`'s invariances: rotation, permutation and
//! scale invariance of the matched structure type and RMSD, and species
//! invariance of structure-type matching for non-alloy-bearing templates.

use nalgebra::{UnitQuaternion, Vector3};
use proptest::prelude::*;

use ptm::api::{ptm_index, InputPoint, Scratch};
use ptm::config::flags;
use ptm::provider::CallbackProvider;
use ptm::templates::StructureKind;

fn no_neighbors() -> CallbackProvider<'static> {
    CallbackProvider::new(|_, _| Some(Vec::new()))
}

fn fcc_positions() -> Vec<Vector3<f64>> {
    let mut points = Vec::with_capacity(12);
    for &sx in &[-0.5, 0.5] {
        for &sy in &[-0.5, 0.5] {
            points.push(Vector3::new(sx, sy, 0.0));
            points.push(Vector3::new(sx, 0.0, sy));
            points.push(Vector3::new(0.0, sx, sy));
        }
    }
    points
}

fn points_from(positions: &[Vector3<f64>]) -> Vec<InputPoint> {
    positions
        .iter()
        .enumerate()
        .map(|(i, &position)| InputPoint { handle: i + 1, position, species: None })
        .collect()
}

fn match_positions(positions: &[Vector3<f64>]) -> ptm::PtmOutput {
    let scratch = Scratch::new();
    let points = points_from(positions);
    let mut provider = no_neighbors();
    ptm_index(&scratch, 0, None, &points, flags::PTM_CHECK_ALL, false, &mut provider).unwrap()
}

proptest! {
    #[test]
    fn rotation_invariance(yaw in -3.0f64..3.0, pitch in -3.0f64..3.0, roll in -3.0f64..3.0) {
        let base = fcc_positions();
        let q = UnitQuaternion::from_euler_angles(roll, pitch, yaw);
        let rotated: Vec<Vector3<f64>> = base.iter().map(|p| q * p).collect();

        let out_base = match_positions(&base);
        let out_rotated = match_positions(&rotated);

        prop_assert_eq!(out_base.kind, out_rotated.kind);
        prop_assert!((out_base.rmsd - out_rotated.rmsd).abs() < 1e-6);
    }

    #[test]
    fn permutation_invariance(seed in 0u64..1000) {
        let base = fcc_positions();
        let mut permuted = base.clone();
        // deterministic pseudo-shuffle from the proptest-generated seed,
        // avoiding any dependency on `rand`'s global state.
        let n = permuted.len();
        for i in (1..n).rev() {
            let j = ((seed.wrapping_mul(2654435761).wrapping_add(i as u64)) % (i as u64 + 1)) as usize;
            permuted.swap(i, j);
        }

        let out_base = match_positions(&base);
        let out_permuted = match_positions(&permuted);

        prop_assert_eq!(out_base.kind, out_permuted.kind);
        prop_assert!((out_base.rmsd - out_permuted.rmsd).abs() < 1e-6);
    }

    #[test]
    fn scale_invariance(alpha in 0.1f64..10.0) {
        let base = fcc_positions();
        let scaled: Vec<Vector3<f64>> = base.iter().map(|p| p * alpha).collect();

        let out_base = match_positions(&base);
        let out_scaled = match_positions(&scaled);

        prop_assert_eq!(out_base.kind, out_scaled.kind);
        prop_assert!((out_base.rmsd - out_scaled.rmsd).abs() < 1e-6);
        prop_assert!((out_scaled.lattice_constant - alpha * out_base.lattice_constant).abs() < 1e-6);
    }

    #[test]
    fn species_do_not_affect_non_fcc_structure_type(species_a in 0i32..5, species_b in 0i32..5) {
        // SC's template carries no alloy-face-subset table, so its
        // structure-type classification must be species-blind: only FCC
        // reports an alloy sub-type.
        let positions = vec![
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(-1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, -1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(0.0, 0.0, -1.0),
        ];
        let scratch = Scratch::new();

        let points_a: Vec<InputPoint> = positions
            .iter()
            .enumerate()
            .map(|(i, &position)| InputPoint { handle: i + 1, position, species: Some(species_a) })
            .collect();
        let points_b: Vec<InputPoint> = positions
            .iter()
            .enumerate()
            .map(|(i, &position)| InputPoint { handle: i + 1, position, species: Some(species_b) })
            .collect();

        let mut provider_a = no_neighbors();
        let mut provider_b = no_neighbors();
        let out_a = ptm_index(&scratch, 0, Some(species_a), &points_a, flags::PTM_CHECK_ALL, false, &mut provider_a).unwrap();
        let out_b = ptm_index(&scratch, 0, Some(species_b), &points_b, flags::PTM_CHECK_ALL, false, &mut provider_b).unwrap();

        prop_assert_eq!(out_a.kind, Some(StructureKind::Sc));
        prop_assert_eq!(out_a.kind, out_b.kind);
        prop_assert!((out_a.rmsd - out_b.rmsd).abs() < 1e-9);
    }
}
