//! Per-query orchestration: order, normalise, hull, graph and canon,
//! per-template match, reduce, deformation gradient, alloy.
//!
//! Recoverable and numerical failures (insufficient neighbours, a
//! degenerate hull, a facet/degree/hash mismatch, QCP non-convergence)
//! only rule out the template currently being attempted; the function
//! always returns a coherent `MatchOutcome`, never an error. Precondition
//! failures (too many points, an uninitialised scratch) are the caller's
//! responsibility to check before reaching this module (see `api.rs`).

use nalgebra::{UnitQuaternion, Vector3};
use tracing::{debug, warn};

use crate::alloy::{self, AlloyType};
use crate::deformation::{self, Deformation};
use crate::geom::normalize;
use crate::graph::{build_graph, canonicalize};
use crate::hull::build_hull;
use crate::provider::NeighborProvider;
use crate::symmetry::{self, PointGroup};
use crate::templates::{self, StructureKind, Template};
use crate::voronoi::{order_with_minimum, two_shell_order};

/// One candidate neighbour supplied to a query, carrying the host's own
/// handle (needed for two-shell re-querying) and optional species label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Host-assigned identity, forwarded to `NeighborProvider` for
    /// two-shell expansion.
    pub handle: usize,
    /// Chemical species label, or `None` when species are unused.
    pub species: Option<i32>,
    /// Position relative to the central atom.
    pub position: Vector3<f64>,
}

/// Outcome of matching one central atom against the enabled templates.
/// `kind == None` means no template matched, a valid outcome with every
/// other field at its default.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// The matched structure type, or `None` for no match.
    pub kind: Option<StructureKind>,
    /// Root-mean-square deviation of the best match.
    pub rmsd: f64,
    /// Scale factor recovering the original neighbourhood size.
    pub scale: f64,
    /// Orientation quaternion, reduced into the structure's fundamental
    /// zone.
    pub quaternion: UnitQuaternion<f64>,
    /// Index, within the matched structure's fundamental-zone point group,
    /// of the symmetry operator applied to reach `quaternion`. A caller
    /// that needs the pre-reduction orientation recovers it by applying
    /// this same operator to `quaternion` and to the deformation gradient;
    /// the library keeps a single template per structure type rather than
    /// one variant per operator, since every symmetry-equivalent point
    /// correspondence is already reachable through the template's own
    /// automorphism group during the QCP fit.
    pub operator_index: Option<usize>,
    /// `mapping[0]` is always `None` (the central atom); `mapping[k]` for
    /// `k >= 1` is the index into the original `candidates` slice matched
    /// to template neighbour slot `k - 1`.
    pub mapping: Vec<Option<usize>>,
    /// Deformation gradient, absent for `MATCH_NONE`.
    pub deformation: Option<Deformation>,
    /// One-sided polar decomposition of the deformation gradient, if it
    /// exists.
    pub polar: Option<(nalgebra::Matrix3<f64>, nalgebra::Matrix3<f64>)>,
    /// Alloy sub-type, `AlloyType::None` unless the match is FCC and
    /// species were supplied.
    pub alloy: AlloyType,
    /// Recovered physical nearest-neighbour bond length.
    pub interatomic_distance: f64,
    /// Recovered physical conventional lattice parameter
    /// (`interatomic_distance * template.lattice_constant_factor`).
    pub lattice_constant: f64,
}

impl MatchOutcome {
    fn none() -> MatchOutcome {
        MatchOutcome {
            kind: None,
            rmsd: f64::INFINITY,
            scale: 1.0,
            quaternion: UnitQuaternion::identity(),
            operator_index: None,
            mapping: Vec::new(),
            deformation: None,
            polar: None,
            alloy: AlloyType::None,
            interatomic_distance: 0.0,
            lattice_constant: 0.0,
        }
    }
}

struct Candidate3 {
    mapping: Vec<Option<usize>>,
    quaternion: UnitQuaternion<f64>,
    scale: f64,
    rmsd: f64,
    /// The normalised points actually used in the winning QCP fit, in
    /// `template.points` order, fed straight into `deformation::compute`
    /// alongside the matching `center` so the deformation gradient is
    /// computed in the same frame the template was tabulated in.
    fitted_points: Vec<Vector3<f64>>,
}

/// Returns, for canonical label `c`, the original vertex number (same
/// convention `graph::CanonicalForm::relabelling` and
/// `Template::canonical_relabelling` both use).
fn base_correspondence(query_relabelling: &[usize], template_relabelling: &[usize]) -> Vec<usize> {
    let n = query_relabelling.len();
    let mut canonical_label_of_template_vertex = vec![0usize; n];
    for (label, &tv) in template_relabelling.iter().enumerate() {
        canonical_label_of_template_vertex[tv] = label;
    }
    (0..n)
        .map(|template_vertex| query_relabelling[canonical_label_of_template_vertex[template_vertex]])
        .collect()
}

/// Tries every automorphism of `template`'s graph, scoring the resulting
/// point correspondence by QCP RMSD, and keeps the best. `query_points` and
/// `template_points` are both indexed by the shared graph-local vertex
/// numbering (`0..graph.n`).
fn best_over_automorphisms(
    template: &Template,
    query_relabelling: &[usize],
    query_points: &[Vector3<f64>],
    template_points: &[Vector3<f64>],
) -> Option<(Vec<usize>, crate::qcp::QcpFit)> {
    let base = base_correspondence(query_relabelling, &template.canonical_relabelling);
    let n = base.len();

    let mut best: Option<(Vec<usize>, crate::qcp::QcpFit)> = None;
    for automorphism in &template.automorphisms {
        let mapping: Vec<usize> = (0..n).map(|t| base[automorphism[t]]).collect();
        let p: Vec<Vector3<f64>> = mapping.iter().map(|&q| query_points[q]).collect();
        let fit = match crate::qcp::fit(&p, template_points) {
            Ok(fit) => fit,
            Err(err) => {
                warn!(?err, "QCP did not converge for a candidate automorphism");
                continue;
            }
        };
        let rmsd_sq = (fit.g1 - fit.k0 * fit.k0 / fit.g2).abs() / n as f64;
        let better = best.as_ref().is_none_or(|(_, best_fit)| {
            let best_rmsd_sq = (best_fit.g1 - best_fit.k0 * best_fit.k0 / best_fit.g2).abs() / n as f64;
            rmsd_sq < best_rmsd_sq
        });
        if better {
            best = Some((mapping, fit));
        }
    }
    best
}

fn scale_and_rmsd(fit: &crate::qcp::QcpFit, n: usize) -> (f64, f64) {
    let scale = fit.k0 / fit.g2;
    let rmsd = ((fit.g1 - scale * fit.k0).abs() / n as f64).sqrt();
    (scale, rmsd)
}

/// Matches a single-shell (or graphene) template: builds the hull/graph
/// directly over all `n` ordered neighbour positions. `hull_points`
/// overrides the positions used only for hull/graph construction
/// (graphene's synthetic buckle); `fit_points` are the true geometry used
/// for the QCP fit.
fn match_flat_template(
    template: &Template,
    original_indices: &[Option<usize>],
    fit_points: &[Vector3<f64>],
    hull_points: &[Vector3<f64>],
) -> Option<Candidate3> {
    let hull = build_hull(hull_points).ok()?;
    if hull.facets.len() != template.expected_facet_count {
        debug!(kind = ?template.kind, "facet count mismatch");
        return None;
    }
    if hull.vertex_indices.len() != fit_points.len() {
        return None;
    }
    let graph = build_graph(&hull, &template.colors);
    if graph.max_degree() > template.max_degree {
        return None;
    }
    // SC's octahedral template is 4-regular; `max_degree` alone only
    // rejects a vertex with *too many* neighbours, not one with too few,
    // so check every vertex's degree explicitly for this template.
    if template.kind == StructureKind::Sc && (0..graph.n).any(|v| graph.degree(v) != 4) {
        return None;
    }
    let canon = canonicalize(&graph);
    if canon.hash != template.canonical_hash {
        return None;
    }

    let (mapping, fit) = best_over_automorphisms(template, &canon.relabelling, fit_points, &template.points)?;
    let (scale, rmsd) = scale_and_rmsd(&fit, fit_points.len());
    let fitted_points: Vec<Vector3<f64>> = mapping.iter().map(|&q| fit_points[q]).collect();

    let full_mapping: Vec<Option<usize>> =
        std::iter::once(None).chain(mapping.iter().map(|&q| original_indices[q])).collect();
    Some(Candidate3 { mapping: full_mapping, quaternion: fit.rotation, scale, rmsd, fitted_points })
}

/// Matches a diamond template: the outer 12-point shell is matched the
/// same way a flat template is, then the 4 inner neighbours are recovered
/// by majority vote over which query primary group each matched outer
/// slot's own group belongs to.
fn match_diamond_template(
    template: &Template,
    primary_indices: &[Option<usize>],
    secondary_indices: &[Vec<Option<usize>>],
    primary_positions: &[Vector3<f64>],
    secondary_positions: &[Vector3<f64>],
) -> Option<Candidate3> {
    let query_outer_parent: Vec<usize> =
        secondary_indices.iter().enumerate().flat_map(|(i, group)| group.iter().map(move |_| i)).collect();

    let hull = build_hull(secondary_positions).ok()?;
    if hull.facets.len() != template.expected_facet_count {
        return None;
    }
    if hull.vertex_indices.len() != secondary_positions.len() {
        return None;
    }
    let outer_colors = vec![1u32; secondary_positions.len()];
    let graph = build_graph(&hull, &outer_colors);
    if graph.max_degree() > template.max_degree {
        return None;
    }
    let canon = canonicalize(&graph);
    if canon.hash != template.canonical_hash {
        return None;
    }

    let template_outer_points = &template.points[4..];
    let (outer_mapping, _) = best_over_automorphisms(template, &canon.relabelling, secondary_positions, template_outer_points)?;
    let template_outer_parent = template.outer_parent.as_ref()?;

    let mut votes = vec![[0usize; 4]; 4];
    for (t, &query_local) in outer_mapping.iter().enumerate() {
        let inner_idx = template_outer_parent[t];
        let group = query_outer_parent[query_local];
        votes[inner_idx][group] += 1;
    }
    let inner_for: Vec<usize> = votes
        .iter()
        .map(|v| v.iter().enumerate().max_by_key(|&(_, count)| *count).map(|(g, _)| g).unwrap_or(0))
        .collect();

    let flat_secondary_indices: Vec<Option<usize>> =
        secondary_indices.iter().flat_map(|g| g.iter().copied()).collect();
    let mut full_mapping = vec![None];
    for &group in &inner_for {
        full_mapping.push(primary_indices[group]);
    }
    for &query_local in &outer_mapping {
        full_mapping.push(flat_secondary_indices[query_local]);
    }

    let mut p_full = Vec::with_capacity(16);
    for &group in &inner_for {
        p_full.push(primary_positions[group]);
    }
    for &query_local in &outer_mapping {
        p_full.push(secondary_positions[query_local]);
    }
    let fit = crate::qcp::fit(&p_full, &template.points).ok()?;
    let (scale, rmsd) = scale_and_rmsd(&fit, p_full.len());

    Some(Candidate3 { mapping: full_mapping, quaternion: fit.rotation, scale, rmsd, fitted_points: p_full })
}

/// Matches one central atom's neighbourhood against every template
/// enabled in `flags`, keeping the minimum-RMSD result.
pub fn match_atom(
    central_handle: usize,
    central_species: Option<i32>,
    candidates: &[Candidate],
    flags: u32,
    conventional: bool,
    provider: &mut dyn NeighborProvider,
) -> MatchOutcome {
    // (kind, fit, center_n, sigma_query)
    let mut best: Option<(StructureKind, Candidate3, Vector3<f64>, f64)> = None;

    let positions: Vec<Vector3<f64>> = candidates.iter().map(|c| c.position).collect();

    for kind in StructureKind::all() {
        if flags & crate::config::flags::bit_for(kind) == 0 {
            continue;
        }
        let template = templates::template_for(kind);

        let result = if kind.is_two_shell() {
            let primary_candidates: Vec<(usize, Vector3<f64>)> =
                candidates.iter().map(|c| (c.handle, c.position)).collect();
            let (n_primary, n_secondary) = match kind {
                StructureKind::Graphene => (3, 2),
                _ => (4, 3),
            };
            let two_shell = match two_shell_order(central_handle, &primary_candidates, n_primary, n_secondary, provider) {
                Ok(t) => t,
                Err(err) => {
                    warn!(?err, kind = ?kind, "two-shell ordering failed");
                    continue;
                }
            };
            // recover, for each primary/secondary neighbour, the index into
            // `candidates` its handle came from. A second-shell atom is
            // re-queried through `provider` and need not be one of the
            // caller's own candidates at all (it may be a sibling the
            // caller never offered directly), so the lookup is by identity
            // and returns `None` rather than falling back to a nearest-
            // position guess.
            let primary_indices: Vec<Option<usize>> = two_shell
                .primary
                .iter()
                .map(|&(handle, _)| index_for_handle(candidates, handle))
                .collect();
            let secondary_group_sizes: Vec<usize> = two_shell.secondary.iter().map(Vec::len).collect();

            let mut all_raw = vec![Vector3::zeros()];
            all_raw.extend(two_shell.primary.iter().map(|&(_, p)| p));
            all_raw.extend(two_shell.secondary.iter().flatten().map(|&(_, p)| p));
            let (normalized, normalization) = normalize(&all_raw);
            let center_n = normalized[0];
            let sigma = normalization.sigma;
            let primary_n = normalized[1..1 + two_shell.primary.len()].to_vec();
            let mut secondary_n = Vec::with_capacity(secondary_group_sizes.len());
            let mut cursor = 1 + two_shell.primary.len();
            for size in &secondary_group_sizes {
                secondary_n.push(normalized[cursor..cursor + size].to_vec());
                cursor += size;
            }

            match kind {
                StructureKind::Graphene => {
                    let secondary_positions_n: Vec<Vector3<f64>> = secondary_n.iter().flatten().copied().collect();
                    let mut all_positions_n = primary_n.clone();
                    all_positions_n.extend(secondary_positions_n.iter().copied());
                    let secondary_flat_indices: Vec<Option<usize>> = two_shell
                        .secondary
                        .iter()
                        .flatten()
                        .map(|&(handle, _)| index_for_handle(candidates, handle))
                        .collect();
                    let mut all_indices = primary_indices.clone();
                    all_indices.extend(secondary_flat_indices);

                    let buckled = crate::templates::buckle_for_hull(&all_positions_n);
                    match_flat_template(template, &all_indices, &all_positions_n, &buckled).map(|c| (c, center_n, sigma))
                }
                _ => {
                    let secondary_positions_n: Vec<Vector3<f64>> = secondary_n.iter().flatten().copied().collect();
                    let secondary_indices: Vec<Vec<Option<usize>>> = two_shell
                        .secondary
                        .iter()
                        .map(|group| {
                            group.iter().map(|&(handle, _)| index_for_handle(candidates, handle)).collect()
                        })
                        .collect();
                    match_diamond_template(template, &primary_indices, &secondary_indices, &primary_n, &secondary_positions_n)
                        .map(|c| (c, center_n, sigma))
                }
            }
        } else {
            let ordered = match order_with_minimum(&positions, kind.n_neighbors()) {
                Ok(o) => o,
                Err(err) => {
                    debug!(?err, kind = ?kind, "insufficient neighbours");
                    continue;
                }
            };
            let taken: Vec<_> = ordered.into_iter().take(kind.n_neighbors()).collect();
            let original_indices: Vec<usize> = taken.iter().map(|o| o.index).collect();
            let selected: Vec<Vector3<f64>> = original_indices.iter().map(|&i| positions[i]).collect();

            let mut all_raw = vec![Vector3::zeros()];
            all_raw.extend(selected.iter().copied());
            let (normalized, normalization) = normalize(&all_raw);
            let center_n = normalized[0];
            let fit_points = normalized[1..].to_vec();
            let original_indices: Vec<Option<usize>> = original_indices.into_iter().map(Some).collect();
            match_flat_template(template, &original_indices, &fit_points, &fit_points)
                .map(|c| (c, center_n, normalization.sigma))
        };

        let Some((candidate3, center_n, sigma_query)) = result else { continue };
        let better = best.as_ref().is_none_or(|(_, b, _, _)| candidate3.rmsd < b.rmsd);
        if better {
            best = Some((kind, candidate3, center_n, sigma_query));
        }
    }

    let Some((kind, candidate3, center_n, sigma_query)) = best else { return MatchOutcome::none() };
    let template = templates::template_for(kind);

    let group = PointGroup::for_template(kind, conventional);
    let (reduced_q, operator_index) = symmetry::reduce(candidate3.quaternion, group.elements());

    let mut matched_points = vec![center_n];
    matched_points.extend(candidate3.fitted_points.iter().copied());
    let deformation = deformation::compute(template, &matched_points);
    let polar = deformation::polar_decompose(&deformation.f);

    let species: Vec<Option<i32>> = std::iter::once(central_species)
        .chain(
            candidate3.mapping[1..]
                .iter()
                .map(|slot| slot.and_then(|i| candidates.get(i)).and_then(|c| c.species)),
        )
        .collect();
    let alloy = alloy::classify(template, &species);

    // `sigma_query` and `template.normalization_sigma` are both
    // normalisation factors (the query's own neighbourhood and the
    // template's ideal geometry, respectively), each the reciprocal of its
    // point set's characteristic (RMS) bond length. Combined with the QCP
    // shape-fit factor `candidate3.scale` (close to 1 for a near-ideal
    // match, invariant to the query's absolute physical size since it is
    // computed entirely on already-normalised points), this recovers the
    // one quantity that does depend on absolute physical size:
    // `interatomic_distance = s / sigma_query`. The external `scale`
    // output is its reciprocal relative to the template's own natural
    // scale, `sigma_query / (s * template.normalization_sigma)`: scaling
    // the raw input by `alpha` scales `sigma_query` by `1/alpha` and
    // leaves `s` unchanged, so `scale` scales by `1/alpha` and
    // `interatomic_distance` by `alpha`, as a physical length should.
    let interatomic_distance = candidate3.scale / sigma_query;
    let scale = sigma_query / (candidate3.scale * template.normalization_sigma);
    let lattice_constant = interatomic_distance * template.lattice_constant_factor;

    MatchOutcome {
        kind: Some(kind),
        rmsd: candidate3.rmsd,
        scale,
        quaternion: reduced_q,
        operator_index: Some(operator_index),
        mapping: candidate3.mapping,
        deformation: Some(deformation),
        polar,
        alloy,
        interatomic_distance,
        lattice_constant,
    }
}

/// Finds the index into `candidates` whose own handle matches `handle`.
/// Returns `None` when the handle came from a provider re-query for an
/// atom the caller never included among its own candidates (expected for
/// second-shell neighbours in a two-shell match).
fn index_for_handle(candidates: &[Candidate], handle: usize) -> Option<usize> {
    candidates.iter().position(|c| c.handle == handle)
}
