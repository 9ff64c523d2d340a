//! # ptm
//!
//! Polyhedral Template Matching: rotation- and permutation-invariant local
//! crystal structure identification.
//!
//! Given a central atom and its candidate neighbours, `ptm_index` orders
//! the neighbourhood by Voronoi solid angle, builds its convex hull and
//! facet graph, canonicalises that graph, and tries it against a static
//! library of reference structure templates (simple cubic, FCC, HCP,
//! icosahedral, BCC, diamond cubic, diamond hexagonal, graphene). The best
//! match (by RMSD over the template's automorphism group) yields an
//! orientation, a deformation gradient, and, for FCC, an alloy sub-type
//! classification.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ptm::api::{ptm_index, InputPoint, Scratch};
//! use ptm::config::flags;
//! use ptm::provider::CallbackProvider;
//!
//! let scratch = Scratch::new();
//! let mut provider = CallbackProvider::new(|_, _| Some(Vec::new()));
//! let output = ptm_index(&scratch, 0, None, &points, flags::PTM_CHECK_ALL, false, &mut provider)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;

// Ambient tunables (size bounds, numerical tolerances, selector flags).
pub mod config;

// Geometry primitives.
pub mod geom;
pub mod hull;
pub mod voronoi;

// Canonicalisation.
pub mod graph;

// Shape matching.
pub mod qcp;
pub mod symmetry;

// Reference data and derived quantities.
pub mod alloy;
pub mod deformation;
pub mod templates;

// Host integration surface.
pub mod provider;

// Per-atom orchestration and the public entry point.
pub mod matcher;

pub mod api;

// Re-exports for convenience.
pub use api::{ptm_index, InputPoint, PtmOutput, Scratch};
pub use error::{PtmError, Result};
pub use templates::StructureKind;
