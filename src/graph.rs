//! Facet adjacency graph, coloured canonical form, and the generic
//! graph-automorphism search reused for fundamental-zone point-group
//! generation.

use std::collections::{BTreeMap, HashSet};

use itertools::Itertools;

use crate::hull::Hull;

/// An undirected, vertex-coloured graph with no self-loops or parallel
/// edges, indexed `0..n`.
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    /// Number of vertices.
    pub n: usize,
    /// Sorted, deduplicated adjacency lists.
    pub adjacency: Vec<Vec<usize>>,
    /// Per-vertex colour class. Colours encode topological role (e.g.
    /// first-shell vs second-shell), never raw chemical species, so that
    /// structure-type matching stays species-invariant.
    pub colors: Vec<u32>,
}

impl Graph {
    /// Degree of vertex `v`.
    pub fn degree(&self, v: usize) -> usize {
        self.adjacency[v].len()
    }

    /// Maximum vertex degree.
    pub fn max_degree(&self) -> usize {
        self.adjacency.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }
}

/// Builds the facet adjacency graph of a hull: vertices are hull vertices
/// (renumbered `0..k`), edges join vertices sharing a facet edge.
/// `colors` is indexed by the hull's original point indices.
pub fn build_graph(hull: &Hull, colors: &[u32]) -> Graph {
    let verts = &hull.vertex_indices;
    let n = verts.len();
    let local_of: BTreeMap<usize, usize> = verts.iter().enumerate().map(|(i, &g)| (g, i)).collect();

    let mut adj_sets: Vec<HashSet<usize>> = vec![HashSet::new(); n];
    for facet in &hull.facets {
        let v = facet.vertices;
        for (a, b) in [(v[0], v[1]), (v[1], v[2]), (v[2], v[0])] {
            let (la, lb) = (local_of[&a], local_of[&b]);
            if la != lb {
                adj_sets[la].insert(lb);
                adj_sets[lb].insert(la);
            }
        }
    }
    let adjacency = adj_sets
        .into_iter()
        .map(|s| {
            let mut v: Vec<usize> = s.into_iter().collect();
            v.sort_unstable();
            v
        })
        .collect();
    let vertex_colors = verts.iter().map(|&g| colors[g]).collect();
    Graph { n, adjacency, colors: vertex_colors }
}

/// Result of canonicalising a coloured graph.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalForm {
    /// `relabelling[new_label] = original_vertex_index`.
    pub relabelling: Vec<usize>,
    /// Edge-code byte array of length `2 * |edges|`: sorted edges of the
    /// relabelled graph, each edge flattened to two bytes.
    pub edge_code: Vec<u8>,
    /// 64-bit FNV-1a fold over `edge_code`.
    pub hash: u64,
}

/// One round of colour refinement (1-dimensional Weisfeiler-Leman): each
/// vertex's new colour is the rank of `(old_colour, sorted multiset of
/// neighbour colours)` among all such signatures, iterated to a fixpoint.
fn refine(graph: &Graph, colors: &mut [u32]) {
    loop {
        let signatures: Vec<(u32, Vec<u32>)> = (0..graph.n)
            .map(|v| {
                let mut neighbor_colors: Vec<u32> =
                    graph.adjacency[v].iter().map(|&u| colors[u]).collect();
                neighbor_colors.sort_unstable();
                (colors[v], neighbor_colors)
            })
            .collect();

        let unique: Vec<(u32, Vec<u32>)> = signatures.iter().cloned().sorted().dedup().collect();

        let new_colors: Vec<u32> = signatures
            .iter()
            .map(|s| unique.binary_search(s).expect("signature present in its own unique set") as u32)
            .collect();

        if new_colors == colors {
            break;
        }
        colors.copy_from_slice(&new_colors);
    }
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn edge_code_for_discrete_labeling(graph: &Graph, colors: &[u32]) -> (Vec<u8>, Vec<usize>) {
    // `colors` is a discrete partition: a permutation of `0..n`. `colors[v]`
    // is v's new label.
    let n = graph.n;
    let mut relabelling = vec![0usize; n];
    for (orig, &label) in colors.iter().enumerate() {
        relabelling[label as usize] = orig;
    }

    let mut edges: Vec<(u8, u8)> = Vec::with_capacity(graph.edge_count() * 2);
    for orig in 0..n {
        let a = colors[orig] as u8;
        for &neighbor in &graph.adjacency[orig] {
            let b = colors[neighbor] as u8;
            edges.push((a.min(b), a.max(b)));
        }
    }
    edges.sort_unstable();
    edges.dedup();

    let mut edge_code = Vec::with_capacity(edges.len() * 2);
    for (a, b) in edges {
        edge_code.push(a);
        edge_code.push(b);
    }
    (edge_code, relabelling)
}

/// Node budget for the individualisation-refinement canonical-form search,
/// generous for the small, highly-symmetric graphs this crate ever builds
/// (at most 18 vertices) while still bounding pathological inputs.
const CANONICAL_FORM_NODE_BUDGET: usize = 200_000;

/// Computes a canonical labelling of a vertex-coloured graph by
/// individualisation-refinement: repeatedly split the first non-singleton
/// colour class by individualising one of its vertices, re-refine, and
/// recurse; at each fully-discrete leaf, keep the lexicographically
/// smallest edge code. Two colour-isomorphic graphs always agree on the
/// returned `edge_code` and `hash`.
pub fn canonicalize(graph: &Graph) -> CanonicalForm {
    let mut colors = graph.colors.clone();
    refine(graph, &mut colors);

    let mut best: Option<(Vec<u8>, Vec<usize>)> = None;
    let mut budget = CANONICAL_FORM_NODE_BUDGET;
    search_canonical(graph, colors, &mut best, &mut budget);

    let (edge_code, relabelling) = best.expect("graph has at least one discrete leaf");
    let hash = fnv1a64(&edge_code);
    CanonicalForm { relabelling, edge_code, hash }
}

fn search_canonical(
    graph: &Graph,
    colors: Vec<u32>,
    best: &mut Option<(Vec<u8>, Vec<usize>)>,
    budget: &mut usize,
) {
    if *budget == 0 {
        return;
    }
    *budget -= 1;

    let mut cells: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (v, &c) in colors.iter().enumerate() {
        cells.entry(c).or_default().push(v);
    }

    let target = cells.iter().find(|(_, members)| members.len() > 1);
    let Some((&target_color, target_members)) = target else {
        let candidate = edge_code_for_discrete_labeling(graph, &colors);
        if best.as_ref().is_none_or(|(best_code, _)| candidate.0 < *best_code) {
            *best = Some(candidate);
        }
        return;
    };

    for &v in target_members {
        let mut next_colors = colors.clone();
        for c in next_colors.iter_mut() {
            if *c > target_color {
                *c += 1;
            }
        }
        next_colors[v] = target_color + 1;
        refine(graph, &mut next_colors);
        search_canonical(graph, next_colors, best, budget);
    }
}

/// Finds every colour- and adjacency-preserving automorphism of `graph`:
/// permutations `a` (an image array, `a[v]` = image of vertex `v`) with
/// `colors[v] == colors[a[v]]` and `v ~ w` iff `a[v] ~ a[w]`. Computed once
/// per template at static-init time; exhaustive backtracking is fine at
/// this scale (at most 20 vertices).
pub fn find_automorphisms(graph: &Graph) -> Vec<Vec<usize>> {
    let mut result = Vec::new();
    let mut image = vec![usize::MAX; graph.n];
    let mut used = vec![false; graph.n];
    search_automorphisms(graph, 0, &mut image, &mut used, &mut result);
    result
}

fn search_automorphisms(
    graph: &Graph,
    v: usize,
    image: &mut Vec<usize>,
    used: &mut Vec<bool>,
    result: &mut Vec<Vec<usize>>,
) {
    if v == graph.n {
        result.push(image.clone());
        return;
    }
    for candidate in 0..graph.n {
        if used[candidate] || graph.colors[candidate] != graph.colors[v] {
            continue;
        }
        if graph.degree(candidate) != graph.degree(v) {
            continue;
        }
        let consistent = (0..v).all(|u| {
            graph.adjacency[v].contains(&u) == graph.adjacency[candidate].contains(&image[u])
        });
        if !consistent {
            continue;
        }
        image[v] = candidate;
        used[candidate] = true;
        search_automorphisms(graph, v + 1, image, used, result);
        used[candidate] = false;
        image[v] = usize::MAX;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hull::build_hull;
    use nalgebra::Vector3;

    fn v(x: f64, y: f64, z: f64) -> Vector3<f64> {
        Vector3::new(x, y, z)
    }

    fn octahedron_graph() -> Graph {
        let points = vec![v(1.0, 0.0, 0.0), v(-1.0, 0.0, 0.0), v(0.0, 1.0, 0.0), v(0.0, -1.0, 0.0), v(0.0, 0.0, 1.0), v(0.0, 0.0, -1.0)];
        let hull = build_hull(&points).unwrap();
        let colors = vec![0u32; points.len()];
        build_graph(&hull, &colors)
    }

    #[test]
    fn test_octahedron_graph_is_4_regular() {
        let g = octahedron_graph();
        assert_eq!(g.n, 6);
        for vtx in 0..g.n {
            assert_eq!(g.degree(vtx), 4);
        }
    }

    #[test]
    fn test_canonical_form_is_permutation_invariant() {
        let g = octahedron_graph();
        let canon_a = canonicalize(&g);

        // relabel vertices by a fixed permutation and re-canonicalize
        let perm = [3, 1, 4, 0, 5, 2];
        let mut adjacency = vec![Vec::new(); g.n];
        for (old, row) in g.adjacency.iter().enumerate() {
            let mut new_row: Vec<usize> = row.iter().map(|&u| perm[u]).collect();
            new_row.sort_unstable();
            adjacency[perm[old]] = new_row;
        }
        let mut colors = vec![0u32; g.n];
        for (old, &c) in g.colors.iter().enumerate() {
            colors[perm[old]] = c;
        }
        let g2 = Graph { n: g.n, adjacency, colors };
        let canon_b = canonicalize(&g2);

        assert_eq!(canon_a.edge_code, canon_b.edge_code);
        assert_eq!(canon_a.hash, canon_b.hash);
    }

    #[test]
    fn test_octahedron_automorphism_group_has_order_48() {
        let g = octahedron_graph();
        let autos = find_automorphisms(&g);
        assert_eq!(autos.len(), 48);
    }

    #[test]
    fn test_two_colors_restrict_automorphisms() {
        let mut g = octahedron_graph();
        g.colors[0] = 1; // distinguish one vertex (and its antipode stays 0)
        let autos = find_automorphisms(&g);
        assert!(autos.len() < 48);
        for a in &autos {
            assert_eq!(g.colors[a[0]], g.colors[0]);
        }
    }
}
