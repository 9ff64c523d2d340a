//! Fundamental-zone orientation reduction.
//!
//! Point-group symmetry elements are generated from the geometry of each
//! group's generating polytope rather than hand-transcribed quaternion
//! literals: a polytope's nearest-neighbour vertex graph is fed through
//! the same automorphism search `templates.rs` uses for facet graphs, and
//! each automorphism is turned into a candidate rotation via the QCP fit;
//! only the ones that reproduce the polytope exactly (zero residual) are
//! genuine proper rotations.

use std::sync::OnceLock;

use nalgebra::{UnitQuaternion, Vector3};

use crate::graph::{find_automorphisms, Graph};
use crate::qcp;
use crate::templates::StructureKind;

/// Which fundamental-zone symmetry group a template reduces its
/// orientation quaternion into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointGroup {
    /// 24 proper rotations (SC, FCC, BCC).
    Cubic,
    /// 60 proper rotations.
    Icosahedral,
    /// 12 proper rotations, D6 (primitive HCP/DHEX/graphene).
    Hexagonal,
    /// 24-element extension of `Hexagonal` used in conventional-cell mode:
    /// the D6h proper subgroup plus c-axis inversion, realised as the
    /// proper rotation group of a regular dodecagon so it remains a
    /// genuine rotation group.
    HexagonalConventional,
    /// 12 proper rotations (DCUB primitive), the alternating tetrahedral
    /// subgroup.
    Tetrahedral,
}

impl PointGroup {
    /// Selects the group a template reduces into, honouring the
    /// caller's `conventional` request.
    pub fn for_template(kind: StructureKind, conventional: bool) -> PointGroup {
        match kind {
            StructureKind::Sc | StructureKind::Fcc | StructureKind::Bcc => PointGroup::Cubic,
            StructureKind::Ico => PointGroup::Icosahedral,
            StructureKind::Hcp | StructureKind::Dhex | StructureKind::Graphene => {
                if conventional {
                    PointGroup::HexagonalConventional
                } else {
                    PointGroup::Hexagonal
                }
            }
            StructureKind::Dcub => PointGroup::Tetrahedral,
        }
    }

    /// The group's rotation elements, built once and cached.
    pub fn elements(self) -> &'static [UnitQuaternion<f64>] {
        static CUBIC: OnceLock<Vec<UnitQuaternion<f64>>> = OnceLock::new();
        static ICOSAHEDRAL: OnceLock<Vec<UnitQuaternion<f64>>> = OnceLock::new();
        static HEXAGONAL: OnceLock<Vec<UnitQuaternion<f64>>> = OnceLock::new();
        static HEXAGONAL_CONVENTIONAL: OnceLock<Vec<UnitQuaternion<f64>>> = OnceLock::new();
        static TETRAHEDRAL: OnceLock<Vec<UnitQuaternion<f64>>> = OnceLock::new();

        match self {
            PointGroup::Cubic => CUBIC.get_or_init(|| rotations_from_polytope(&cube_vertices())),
            PointGroup::Icosahedral => {
                ICOSAHEDRAL.get_or_init(|| rotations_from_polytope(&icosahedron_vertices()))
            }
            PointGroup::Hexagonal => HEXAGONAL.get_or_init(|| dihedral_group(6)),
            PointGroup::HexagonalConventional => {
                HEXAGONAL_CONVENTIONAL.get_or_init(|| dihedral_group(12))
            }
            PointGroup::Tetrahedral => {
                TETRAHEDRAL.get_or_init(|| rotations_from_polytope(&tetrahedron_vertices()))
            }
        }
    }
}

fn cube_vertices() -> Vec<Vector3<f64>> {
    let mut v = Vec::with_capacity(8);
    for &sx in &[-1.0, 1.0] {
        for &sy in &[-1.0, 1.0] {
            for &sz in &[-1.0, 1.0] {
                v.push(Vector3::new(sx, sy, sz));
            }
        }
    }
    v
}

fn tetrahedron_vertices() -> Vec<Vector3<f64>> {
    vec![
        Vector3::new(1.0, 1.0, 1.0),
        Vector3::new(1.0, -1.0, -1.0),
        Vector3::new(-1.0, 1.0, -1.0),
        Vector3::new(-1.0, -1.0, 1.0),
    ]
}

fn icosahedron_vertices() -> Vec<Vector3<f64>> {
    let phi = (1.0 + 5.0f64.sqrt()) / 2.0;
    let mut v = Vec::with_capacity(12);
    for &s1 in &[-1.0, 1.0] {
        for &s2 in &[-1.0, 1.0] {
            v.push(Vector3::new(0.0, s1 * 1.0, s2 * phi));
            v.push(Vector3::new(s1 * 1.0, s2 * phi, 0.0));
            v.push(Vector3::new(s1 * phi, 0.0, s2 * 1.0));
        }
    }
    v
}

/// Builds the nearest-neighbour graph of `vertices` (edges between pairs
/// at the minimum pairwise distance), finds its automorphisms, and keeps
/// the ones realised by an exact (zero-residual) rotation.
fn rotations_from_polytope(vertices: &[Vector3<f64>]) -> Vec<UnitQuaternion<f64>> {
    let n = vertices.len();
    let min_dist = (0..n)
        .flat_map(|i| (0..n).map(move |j| (i, j)))
        .filter(|&(i, j)| i != j)
        .map(|(i, j)| (vertices[i] - vertices[j]).norm())
        .fold(f64::INFINITY, f64::min);

    let adjacency: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            (0..n).filter(|&j| j != i && ((vertices[i] - vertices[j]).norm() - min_dist).abs() < 1e-6).collect()
        })
        .collect();
    let graph = Graph { n, adjacency, colors: vec![0u32; n] };
    let automorphisms = find_automorphisms(&graph);

    let mut rotations: Vec<UnitQuaternion<f64>> = Vec::new();
    for perm in automorphisms {
        let permuted: Vec<Vector3<f64>> = perm.iter().map(|&i| vertices[i]).collect();
        let Ok(qcp_fit) = qcp::fit(&permuted, vertices) else { continue };
        let rmsd_sq = (qcp_fit.g1 + qcp_fit.g2 - 2.0 * qcp_fit.k0).max(0.0);
        if rmsd_sq > 1e-6 {
            continue; // this automorphism is realised by a reflection, not a rotation
        }
        let already_present = rotations.iter().any(|r| {
            (r.quaternion().coords - qcp_fit.rotation.quaternion().coords).norm() < 1e-6
                || (r.quaternion().coords + qcp_fit.rotation.quaternion().coords).norm() < 1e-6
        });
        if !already_present {
            rotations.push(qcp_fit.rotation);
        }
    }
    rotations
}

/// Analytic construction of the order-`2n` dihedral rotation group D_n:
/// `n` rotations about the z-axis plus `n` 180-degree rotations about
/// in-plane axes spaced `pi/n` apart.
fn dihedral_group(n: usize) -> Vec<UnitQuaternion<f64>> {
    let mut group = Vec::with_capacity(2 * n);
    for k in 0..n {
        let angle = 2.0 * std::f64::consts::PI * k as f64 / n as f64;
        group.push(UnitQuaternion::from_axis_angle(&Vector3::z_axis(), angle));
    }
    for k in 0..n {
        let angle = std::f64::consts::PI * k as f64 / n as f64;
        let axis = Vector3::new(angle.cos(), angle.sin(), 0.0);
        let Some(unit_axis) = nalgebra::Unit::try_new(axis, 1e-9) else { continue };
        group.push(UnitQuaternion::from_axis_angle(&unit_axis, std::f64::consts::PI));
    }
    group
}

/// Reduces `q` into `group`'s fundamental zone: finds the element `g`
/// maximising `|q . g|` and returns `(g^-1 * q, index of g)`. Since `group`
/// is closed under composition, replacing `q` with `h * q` for any `h` in
/// `group` permutes which `g` is chosen but leaves `g^-1 * q` unchanged,
/// so the reduced quaternion does not depend on which symmetry-equivalent
/// orientation the input happened to arrive in.
pub fn reduce(q: UnitQuaternion<f64>, group: &[UnitQuaternion<f64>]) -> (UnitQuaternion<f64>, usize) {
    let mut best_idx = 0;
    let mut best_dot = f64::NEG_INFINITY;
    for (i, g) in group.iter().enumerate() {
        let dot = q.quaternion().coords.dot(&g.quaternion().coords).abs();
        if dot > best_dot {
            best_dot = dot;
            best_idx = i;
        }
    }
    let reduced = group[best_idx].inverse() * q;
    (canonical_sign(reduced), best_idx)
}

/// Canonicalises a unit quaternion's sign (q and -q represent the same
/// rotation) by requiring the scalar part to be non-negative.
fn canonical_sign(q: UnitQuaternion<f64>) -> UnitQuaternion<f64> {
    if q.quaternion().w < 0.0 {
        UnitQuaternion::new_unchecked(-q.into_inner())
    } else {
        q
    }
}
