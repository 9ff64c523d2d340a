//! Compiled-in tolerances and size bounds.
//!
//! There is no file-based configuration surface; the tunables that exist
//! are grouped here rather than scattered as magic numbers through the
//! matcher, mirroring how the teacher groups its neighbour-list tunables
//! into a single config struct.

/// Maximum number of neighbour points a query may supply. Everything
/// downstream of the Voronoi orderer is sized off this bound so the hot
/// path never allocates.
pub const PTM_MAX_INPUT_POINTS: usize = 18;

/// Maximum number of automorphisms a single template's graph list is
/// expected to carry (icosahedral symmetry order 60, doubled for two
/// candidate graphs in the worst case).
pub const MAX_AUTOMORPHISMS_PER_TEMPLATE: usize = 240;

/// Newton iteration bound for the QCP largest-eigenvalue solve.
pub const QCP_MAX_NEWTON_ITERATIONS: u32 = 50;

/// Convergence tolerance for the QCP Newton iteration, relative to the
/// initial eigenvalue estimate `E0`.
pub const QCP_NEWTON_RELATIVE_TOL: f64 = 1e-11;

/// Absolute floor used in place of `QCP_NEWTON_RELATIVE_TOL * E0` when `E0`
/// itself is vanishingly small (a degenerate, already-perfect overlap).
pub const QCP_NEWTON_ABS_FLOOR: f64 = 1e-14;

/// Distance below which a hull-construction point is treated as coincident
/// with an existing vertex, and the volume/area threshold below which a
/// candidate initial tetrahedron or facet is rejected as degenerate.
pub const HULL_EPSILON: f64 = 1e-9;

/// Relative tolerance used when comparing a normalised point set's mean
/// squared norm against 1.
pub const NORMALIZATION_TOL: f64 = 1e-9;

/// Bitmask flags selecting which templates `ptm_index` attempts.
pub mod flags {
    /// Test against the simple-cubic template.
    pub const PTM_CHECK_SC: u32 = 1 << 0;
    /// Test against the face-centred-cubic template.
    pub const PTM_CHECK_FCC: u32 = 1 << 1;
    /// Test against the hexagonal-close-packed template.
    pub const PTM_CHECK_HCP: u32 = 1 << 2;
    /// Test against the icosahedral template.
    pub const PTM_CHECK_ICO: u32 = 1 << 3;
    /// Test against the body-centred-cubic template.
    pub const PTM_CHECK_BCC: u32 = 1 << 4;
    /// Test against the diamond-cubic template.
    pub const PTM_CHECK_DCUB: u32 = 1 << 5;
    /// Test against the diamond-hexagonal template.
    pub const PTM_CHECK_DHEX: u32 = 1 << 6;
    /// Test against the graphene template.
    pub const PTM_CHECK_GRAPHENE: u32 = 1 << 7;
    /// Test against every template.
    pub const PTM_CHECK_ALL: u32 = PTM_CHECK_SC
        | PTM_CHECK_FCC
        | PTM_CHECK_HCP
        | PTM_CHECK_ICO
        | PTM_CHECK_BCC
        | PTM_CHECK_DCUB
        | PTM_CHECK_DHEX
        | PTM_CHECK_GRAPHENE;

    /// Maps a structure kind to its selector bit.
    pub fn bit_for(kind: crate::templates::StructureKind) -> u32 {
        use crate::templates::StructureKind;
        match kind {
            StructureKind::Sc => PTM_CHECK_SC,
            StructureKind::Fcc => PTM_CHECK_FCC,
            StructureKind::Hcp => PTM_CHECK_HCP,
            StructureKind::Ico => PTM_CHECK_ICO,
            StructureKind::Bcc => PTM_CHECK_BCC,
            StructureKind::Dcub => PTM_CHECK_DCUB,
            StructureKind::Dhex => PTM_CHECK_DHEX,
            StructureKind::Graphene => PTM_CHECK_GRAPHENE,
        }
    }
}
