//! Neighbour-provider contracts.
//!
//! The host simulation's neighbour list is an external collaborator: the
//! core never constructs one itself. Two equivalent ways to supply it are
//! exposed: a raw `extern "C"`-shaped callback, for hosts crossing an FFI
//! boundary, and a typed `NeighborProvider` trait for in-process Rust
//! callers.

use nalgebra::Vector3;

/// A single neighbour record returned by a provider: the neighbour's
/// identity in the host's own indexing (used to re-query its neighbours
/// for two-shell ordering), its chemical species (if any), and its
/// position relative to the atom that was queried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborRecord {
    /// Host-assigned identity of the neighbour atom.
    pub handle: usize,
    /// Chemical species label, or `None` when species are unused.
    pub species: Option<i32>,
    /// Position relative to the queried atom's local frame.
    pub position: Vector3<f64>,
}

/// Given an atom handle, yields up to `max` neighbour records.
pub trait NeighborProvider {
    /// Returns up to `max` neighbours of `atom`, in arbitrary order.
    fn neighbors(&mut self, atom: usize, max: usize) -> Vec<NeighborRecord>;
}

/// Raw callback signature for hosts crossing an FFI boundary. Returns
/// `Some(records)` on success or `None` on failure (a C-style negative
/// return translated to `Option`).
pub type RawNeighborCallback<'a> = dyn FnMut(usize, usize) -> Option<Vec<NeighborRecord>> + 'a;

/// Adapts a raw callback closure to the `NeighborProvider` trait, treating
/// a failed callback as "no neighbours" (the caller-level precondition
/// checks happen before this point, so a raw failure here degrades to the
/// matcher's ordinary `InsufficientNeighbours` path rather than a hard
/// error).
pub struct CallbackProvider<'a> {
    callback: Box<RawNeighborCallback<'a>>,
}

impl<'a> CallbackProvider<'a> {
    /// Wraps a raw callback closure as a `NeighborProvider`.
    pub fn new(callback: impl FnMut(usize, usize) -> Option<Vec<NeighborRecord>> + 'a) -> Self {
        Self { callback: Box::new(callback) }
    }
}

impl NeighborProvider for CallbackProvider<'_> {
    fn neighbors(&mut self, atom: usize, max: usize) -> Vec<NeighborRecord> {
        (self.callback)(atom, max).unwrap_or_default()
    }
}
