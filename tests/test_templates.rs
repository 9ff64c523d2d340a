//! Static reference library sanity checks: every template builds once,
//! stays internally consistent, and is re-derivable deterministically.

use ptm::templates::{library, template_for, StructureKind};

#[test]
fn test_library_has_one_template_per_structure_kind() {
    let templates = library();
    assert_eq!(templates.len(), StructureKind::all().len());
    for kind in StructureKind::all() {
        assert!(templates.iter().any(|t| t.kind == kind));
    }
}

#[test]
fn test_library_access_is_deterministic_across_calls() {
    let hashes_a: Vec<u64> = StructureKind::all().iter().map(|&k| template_for(k).canonical_hash).collect();
    let hashes_b: Vec<u64> = StructureKind::all().iter().map(|&k| template_for(k).canonical_hash).collect();
    assert_eq!(hashes_a, hashes_b);
}

#[test]
fn test_every_template_point_count_matches_its_structure_kind() {
    for kind in StructureKind::all() {
        let t = template_for(kind);
        assert_eq!(t.points.len(), kind.n_neighbors());
        assert_eq!(t.colors.len(), kind.n_neighbors());
    }
}

#[test]
fn test_diamond_templates_have_outer_parent_tables() {
    for kind in [StructureKind::Dcub, StructureKind::Dhex] {
        let t = template_for(kind);
        let parent = t.outer_parent.as_ref().expect("diamond variants record outer_parent");
        assert_eq!(parent.len(), 12);
        assert!(parent.iter().all(|&p| p < 4));
    }
}

#[test]
fn test_only_fcc_has_alloy_face_subsets() {
    for kind in StructureKind::all() {
        let t = template_for(kind);
        if kind == StructureKind::Fcc {
            assert!(t.alloy_face_subsets.is_some());
        } else {
            assert!(t.alloy_face_subsets.is_none());
        }
    }
}

#[test]
fn test_canonical_hashes_are_distinct_across_structure_kinds() {
    let hashes: Vec<u64> = StructureKind::all().iter().map(|&k| template_for(k).canonical_hash).collect();
    let mut sorted = hashes.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), hashes.len(), "two structure kinds share a canonical hash: {hashes:?}");
}

#[test]
fn test_expected_facet_counts_satisfy_euler_relation() {
    for kind in StructureKind::all() {
        let t = template_for(kind);
        let hull_vertex_count = match kind {
            StructureKind::Dcub | StructureKind::Dhex => 12,
            StructureKind::Graphene => 9,
            _ => kind.n_neighbors(),
        };
        assert_eq!(t.expected_facet_count, 2 * hull_vertex_count - 4, "{kind:?} facet/vertex mismatch");
    }
}
