//! Public entry point: `ptm_index`, the `Scratch` per-thread workspace
//! lifecycle, flags/type tags, and output struct.
//!
//! Grounded on `python/coordination.rs`'s function-signature and
//! validation-helper conventions; bindings to external analysis tools are
//! out of scope, so this module is the crate's own top-level Rust
//! surface, not a `pyo3`/`wasm-bindgen` wrapper.

use nalgebra::{Matrix3, UnitQuaternion};

use crate::alloy::AlloyType;
use crate::config::PTM_MAX_INPUT_POINTS;
use crate::error::{PtmError, Result};
use crate::matcher::{self, Candidate, MatchOutcome};
use crate::provider::NeighborProvider;
use crate::templates::StructureKind;

/// Per-thread scratch workspace. The matcher itself is allocation-light
/// (stack-resident fixed-size arrays sized by `PTM_MAX_INPUT_POINTS`), so
/// the only thing this workspace currently owns is the process-wide
/// initialisation flag it checks; it exists as a typed handle so call
/// sites mirror the C API's `voronoi_initialize_local` /
/// `voronoi_uninitialize_local` lifecycle and so a future scratch buffer
/// has somewhere to live without changing the public signature.
///
/// Each thread must own its own handle; `Scratch` is neither `Sync` nor
/// shareable across threads, which it gets for free by not implementing
/// those traits.
pub struct Scratch {
    initialized: bool,
}

impl Scratch {
    /// Creates a new per-thread scratch workspace (`voronoi_initialize_local`
    /// in the C API's naming).
    pub fn new() -> Scratch {
        Scratch { initialized: true }
    }
}

impl Default for Scratch {
    fn default() -> Scratch {
        Scratch::new()
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        self.initialized = false;
    }
}

/// One neighbour point supplied to `ptm_index`: its position relative to
/// the central atom and (for re-querying in two-shell ordering) the
/// host's own handle for it, plus an optional chemical species label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputPoint {
    /// Host-assigned identity of this neighbour, forwarded to the
    /// `NeighborProvider` for two-shell re-querying.
    pub handle: usize,
    /// Relative position from the central atom.
    pub position: nalgebra::Vector3<f64>,
    /// Chemical species label, or `None` when species are unused (alloy
    /// classification is then always `AlloyType::None`).
    pub species: Option<i32>,
}

/// Every output `ptm_index` can populate. All fields are meaningful even
/// on `MATCH_NONE`: `rmsd` is `+inf`, everything else holds
/// `MatchOutcome::none()`'s defaults; there are no partial results.
#[derive(Debug, Clone)]
pub struct PtmOutput {
    /// Matched structure type, or `None` for `MATCH_NONE`.
    pub kind: Option<StructureKind>,
    /// Alloy sub-type (only ever non-`None` for an FCC match with species
    /// supplied).
    pub alloy: AlloyType,
    /// Scale factor recovering the original neighbourhood size.
    pub scale: f64,
    /// Root-mean-square deviation of the best match.
    pub rmsd: f64,
    /// Orientation quaternion, reduced into the matched template's
    /// fundamental zone.
    pub quaternion: UnitQuaternion<f64>,
    /// Deformation gradient `F`.
    pub f: Option<Matrix3<f64>>,
    /// Deformation-gradient residual second-moment matrix.
    pub f_res: Option<Matrix3<f64>>,
    /// Polar-decomposition orthogonal factor `U`, if `F` has one.
    pub u: Option<Matrix3<f64>>,
    /// Polar-decomposition symmetric factor `P`, if `F` has one.
    pub p: Option<Matrix3<f64>>,
    /// Recovered physical nearest-neighbour bond length.
    pub interatomic_distance: f64,
    /// Recovered physical conventional lattice parameter.
    pub lattice_constant: f64,
    /// `output_indices[k]` re-maps template neighbour slot `k` back onto
    /// the caller's own `points` array indices (`output_indices[0]` is
    /// always the central atom's own index, `0`). `None` entries mean "this
    /// template slot has no input point" and only occur for `MATCH_NONE`.
    pub output_indices: Vec<Option<usize>>,
}

impl PtmOutput {
    fn from_outcome(outcome: MatchOutcome) -> PtmOutput {
        let (f, f_res, u, p) = match (&outcome.deformation, &outcome.polar) {
            (Some(d), Some((u, p))) => (Some(d.f), Some(d.f_res), Some(*u), Some(*p)),
            (Some(d), None) => (Some(d.f), Some(d.f_res), None, None),
            (None, _) => (None, None, None, None),
        };
        PtmOutput {
            kind: outcome.kind,
            alloy: outcome.alloy,
            scale: outcome.scale,
            rmsd: outcome.rmsd,
            quaternion: outcome.quaternion,
            f,
            f_res,
            u,
            p,
            interatomic_distance: outcome.interatomic_distance,
            lattice_constant: outcome.lattice_constant,
            output_indices: outcome.mapping,
        }
    }
}

/// The core entry point. `central_handle` and `central_species` identify
/// the atom at the origin; `points` are its candidate neighbours (in
/// arbitrary order; matching is permutation-invariant in their order);
/// `flags` selects which templates to attempt (see `crate::config::flags`);
/// `conventional` requests conventional-cell orientation reduction where
/// the matched template supports it; `provider` supplies the host's own
/// neighbour lists for two-shell ordering (diamond/graphene only).
///
/// Returns `Err` only for the two *precondition* failures that are the
/// caller's responsibility to avoid: an uninitialised `scratch` or too
/// many input points. Every other recoverable/numerical condition is
/// folded into `PtmOutput::kind == None` ("no match"), which is itself
/// `Ok`.
pub fn ptm_index(
    scratch: &Scratch,
    central_handle: usize,
    central_species: Option<i32>,
    points: &[InputPoint],
    flags: u32,
    conventional: bool,
    provider: &mut dyn NeighborProvider,
) -> Result<PtmOutput> {
    if !scratch.initialized {
        return Err(PtmError::Uninitialized);
    }
    if points.len() > PTM_MAX_INPUT_POINTS {
        return Err(PtmError::TooManyPoints { got: points.len(), max: PTM_MAX_INPUT_POINTS });
    }

    let candidates: Vec<Candidate> =
        points.iter().map(|p| Candidate { handle: p.handle, species: p.species, position: p.position }).collect();

    let outcome = matcher::match_atom(central_handle, central_species, &candidates, flags, conventional, provider);
    Ok(PtmOutput::from_outcome(outcome))
}
