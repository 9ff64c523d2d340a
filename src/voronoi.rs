//! Voronoi-cell neighbour ordering and two-shell ordering for
//! diamond/graphene templates.
//!
//! The host's own Voronoi-cell primitive (face neighbours, face vertex
//! lists) is normally supplied by a dedicated tessellation library; no
//! crate in this workspace's dependency set exposes that shape of API for
//! a single, small, unbounded local cluster, so this module builds the
//! cell itself. Since at most `PTM_MAX_INPUT_POINTS` candidates are ever
//! involved, brute-force half-space vertex enumeration is simpler and fast
//! enough, with no need for an incremental algorithm.

use nalgebra::{Matrix3, Vector3};

use crate::config::HULL_EPSILON;
use crate::error::{PtmError, Result};
use crate::geom::triangle_solid_angle;
use crate::provider::NeighborProvider;

/// One candidate neighbour together with the solid angle its Voronoi face
/// subtends at the origin (0 if the candidate is fully occluded and has no
/// face at all).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderedNeighbor {
    /// Index into the original candidate array.
    pub index: usize,
    /// Solid angle of this neighbour's Voronoi face, in steradians.
    pub solid_angle: f64,
}

/// Computes the Voronoi cell of the origin against `candidates` (relative
/// position vectors) by enumerating every triple of bounding planes,
/// solving for their common point, and keeping those that satisfy every
/// other candidate's half-space constraint. Returns, for each candidate,
/// the solid angle its face subtends at the origin.
fn voronoi_face_solid_angles(candidates: &[Vector3<f64>]) -> Vec<f64> {
    let n = candidates.len();
    // plane i: x . p_i <= |p_i|^2 / 2
    let offsets: Vec<f64> = candidates.iter().map(|p| p.norm_squared() / 2.0).collect();

    // vertices[i] = set of vertex positions lying on plane i
    let mut vertices_on_face: Vec<Vec<Vector3<f64>>> = vec![Vec::new(); n];

    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                let a = Matrix3::from_rows(&[
                    candidates[i].transpose(),
                    candidates[j].transpose(),
                    candidates[k].transpose(),
                ]);
                let Some(a_inv) = a.try_inverse() else { continue };
                let rhs = Vector3::new(offsets[i], offsets[j], offsets[k]);
                let x = a_inv * rhs;

                let feasible = (0..n).all(|m| candidates[m].dot(&x) <= offsets[m] + HULL_EPSILON);
                if !feasible {
                    continue;
                }
                for &face in &[i, j, k] {
                    if !vertices_on_face[face].iter().any(|v| (v - x).norm() < HULL_EPSILON) {
                        vertices_on_face[face].push(x);
                    }
                }
                // a vertex can lie on more than 3 planes in degenerate
                // (highly symmetric) templates; pick those up too.
                for m in 0..n {
                    if m == i || m == j || m == k {
                        continue;
                    }
                    if (candidates[m].dot(&x) - offsets[m]).abs() < HULL_EPSILON
                        && !vertices_on_face[m].iter().any(|v| (v - x).norm() < HULL_EPSILON)
                    {
                        vertices_on_face[m].push(x);
                    }
                }
            }
        }
    }

    vertices_on_face
        .into_iter()
        .map(|verts| face_solid_angle(&verts))
        .collect()
}

/// Orders an unordered face polygon's vertices by angle around the face's
/// own centroid direction, then fans from the first vertex and sums
/// per-triangle solid angles (the L'Huilier/Van Oosterom-Strackee
/// triangulation).
fn face_solid_angle(vertices: &[Vector3<f64>]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }
    let centroid: Vector3<f64> = vertices.iter().sum::<Vector3<f64>>() / vertices.len() as f64;
    let normal = centroid.normalize();
    let reference = if normal.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
    let u = (reference - normal * normal.dot(&reference)).normalize();
    let w = normal.cross(&u);

    let mut ordered: Vec<(f64, Vector3<f64>)> = vertices
        .iter()
        .map(|&v| {
            let rel = v - centroid;
            let angle = rel.dot(&w).atan2(rel.dot(&u));
            (angle, v)
        })
        .collect();
    ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

    let pivot = ordered[0].1;
    let mut total = 0.0;
    for window in ordered[1..].windows(2) {
        total += triangle_solid_angle(pivot, window[0].1, window[1].1);
    }
    total
}

/// Sorts `candidates` by decreasing Voronoi-face solid angle, ties broken
/// by increasing squared distance from the origin. Candidates with no face
/// (fully occluded) sort last.
pub fn order_by_solid_angle(candidates: &[Vector3<f64>]) -> Vec<OrderedNeighbor> {
    if candidates.len() < 4 {
        // fewer than 4 candidates can't bound a 3-D cell at all; every
        // candidate degenerates to "no face."
        return candidates.iter().map(|_| 0.0).enumerate().map(|(index, solid_angle)| OrderedNeighbor { index, solid_angle }).collect();
    }
    let solid_angles = voronoi_face_solid_angles(candidates);
    let mut ordered: Vec<OrderedNeighbor> = solid_angles
        .into_iter()
        .enumerate()
        .map(|(index, solid_angle)| OrderedNeighbor { index, solid_angle })
        .collect();
    ordered.sort_by(|a, b| {
        b.solid_angle
            .total_cmp(&a.solid_angle)
            .then_with(|| candidates[a.index].norm_squared().total_cmp(&candidates[b.index].norm_squared()))
    });
    ordered
}

/// Orders candidates and fails with `InsufficientNeighbours` if fewer than
/// `min_required` have a genuine (non-zero solid angle) face.
pub fn order_with_minimum(candidates: &[Vector3<f64>], min_required: usize) -> Result<Vec<OrderedNeighbor>> {
    let ordered = order_by_solid_angle(candidates);
    let usable = ordered.iter().filter(|n| n.solid_angle > 0.0).count();
    if usable < min_required {
        return Err(PtmError::InsufficientNeighbours { have: usable, need: min_required });
    }
    Ok(ordered)
}

/// Result of a two-shell expansion: primary (first-shell) and secondary
/// (second-shell) neighbours, each already translated into the central
/// atom's local frame and paired with the host handle it was recovered
/// under (the provider's own indexing, not necessarily a handle the caller
/// passed in as one of its original candidates).
#[derive(Debug, Clone, PartialEq)]
pub struct TwoShellOrdering {
    /// First-shell neighbours, ordered by decreasing solid angle, as
    /// `(handle, position)`.
    pub primary: Vec<(usize, Vector3<f64>)>,
    /// For each primary neighbour, its selected second-shell neighbours as
    /// `(handle, position)`, position translated into the central atom's
    /// frame.
    pub secondary: Vec<Vec<(usize, Vector3<f64>)>>,
}

/// Performs the two-shell expansion for diamond/graphene templates:
/// selects `n_primary` first-shell neighbours by solid angle, then for
/// each, requests the provider's own neighbour list and keeps the
/// `n_secondary` members nearest to it that are not the central atom
/// itself.
///
/// The central atom's own global handle is required to exclude the
/// back-bond from each primary neighbour's list; when a provider doesn't
/// echo a matching handle the nearest candidate to the reversed bond
/// direction is excluded instead, as the next best discriminator. Each
/// returned second-shell entry keeps the provider's handle for it, so a
/// caller can look the atom back up in its own candidate list rather than
/// reverse-matching by position (which cannot distinguish a second-shell
/// atom from an unrelated first-shell one at the same point).
pub fn two_shell_order(
    central_handle: usize,
    primary_candidates: &[(usize, Vector3<f64>)],
    n_primary: usize,
    n_secondary: usize,
    provider: &mut dyn NeighborProvider,
) -> Result<TwoShellOrdering> {
    let positions: Vec<Vector3<f64>> = primary_candidates.iter().map(|&(_, p)| p).collect();
    let ordered = order_with_minimum(&positions, n_primary)?;
    if ordered.len() < n_primary {
        return Err(PtmError::ShellFailure { shell: 1 });
    }

    let mut primary = Vec::with_capacity(n_primary);
    let mut secondary = Vec::with_capacity(n_primary);

    for entry in ordered.into_iter().take(n_primary) {
        let (handle, position) = primary_candidates[entry.index];
        primary.push((handle, position));

        const MAX_SIBLINGS: usize = 32;
        let siblings = provider.neighbors(handle, MAX_SIBLINGS);
        let back_bond_idx = siblings.iter().position(|s| s.handle == central_handle).unwrap_or_else(|| {
            // fall back: the sibling whose direction is most nearly
            // opposite this bond is the back-bond to the centre.
            siblings
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.position.dot(&(-position)).total_cmp(&b.position.dot(&(-position))))
                .map(|(i, _)| i)
                .unwrap_or(usize::MAX)
        });

        let mut rest: Vec<(usize, Vector3<f64>)> = siblings
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != back_bond_idx)
            .map(|(_, s)| (s.handle, position + s.position))
            .collect();

        if rest.len() < n_secondary {
            return Err(PtmError::ShellFailure { shell: 2 });
        }
        rest.sort_by(|a, b| a.1.norm_squared().total_cmp(&b.1.norm_squared()));
        rest.truncate(n_secondary);
        secondary.push(rest);
    }

    Ok(TwoShellOrdering { primary, secondary })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fcc_neighbors() -> Vec<Vector3<f64>> {
        let mut v = Vec::new();
        for &sx in &[-0.5, 0.5] {
            for &sy in &[-0.5, 0.5] {
                v.push(Vector3::new(sx, sy, 0.0));
                v.push(Vector3::new(sx, 0.0, sy));
                v.push(Vector3::new(0.0, sx, sy));
            }
        }
        v
    }

    #[test]
    fn test_fcc_all_twelve_faces_present_and_equal() {
        let neighbors = fcc_neighbors();
        let ordered = order_by_solid_angle(&neighbors);
        assert_eq!(ordered.len(), 12);
        for entry in &ordered {
            assert!(entry.solid_angle > 0.0);
        }
        let first = ordered[0].solid_angle;
        for entry in &ordered {
            assert!((entry.solid_angle - first).abs() < 1e-6, "FCC faces should be equal by symmetry");
        }
    }

    #[test]
    fn test_sc_six_faces_equal_and_full_sphere() {
        let neighbors = vec![
            Vector3::new(0.5, 0.0, 0.0),
            Vector3::new(-0.5, 0.0, 0.0),
            Vector3::new(0.0, 0.5, 0.0),
            Vector3::new(0.0, -0.5, 0.0),
            Vector3::new(0.0, 0.0, 0.5),
            Vector3::new(0.0, 0.0, -0.5),
        ];
        let ordered = order_by_solid_angle(&neighbors);
        let total: f64 = ordered.iter().map(|o| o.solid_angle).sum();
        assert!((total - 4.0 * std::f64::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn test_insufficient_neighbours_errors() {
        let neighbors = vec![Vector3::new(0.5, 0.0, 0.0), Vector3::new(-0.5, 0.0, 0.0)];
        let result = order_with_minimum(&neighbors, 4);
        assert!(matches!(result, Err(PtmError::InsufficientNeighbours { .. })));
    }
}
