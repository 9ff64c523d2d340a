//! Incremental 3-D convex hull.
//!
//! Builds the hull by picking an initial tetrahedron that maximises volume,
//! then inserting each remaining point: facets visible from the new point
//! are discarded, the boundary between visible and hidden facets (the
//! "horizon") is found, and a new fan of facets connects the horizon to the
//! new point. With at most `PTM_MAX_INPUT_POINTS + 1` points this runs in a
//! handful of microseconds; there is no need for QuickHull's conflict
//! graphs.

use std::collections::HashSet;

use nalgebra::Vector3;

use crate::config::HULL_EPSILON;
use crate::error::{PtmError, Result};

/// A single triangular hull facet.
#[derive(Debug, Clone, PartialEq)]
pub struct Facet {
    /// Indices into the point set, ordered counter-clockwise as seen from
    /// outside the hull.
    pub vertices: [usize; 3],
    /// Outward unit normal.
    pub normal: Vector3<f64>,
}

/// The result of a hull build.
#[derive(Debug, Clone, PartialEq)]
pub struct Hull {
    /// Triangular facets, CCW-oriented with outward normals.
    pub facets: Vec<Facet>,
    /// Point indices that ended up as hull vertices, sorted ascending.
    pub vertex_indices: Vec<usize>,
}

impl Hull {
    /// Euler's relation for a convex polyhedron with no coplanar facets
    /// merged away: `|facets| == 2*|vertices| - 4`. Templates use this to
    /// reject candidates whose hull shape doesn't match what they expect.
    pub fn satisfies_euler_relation(&self) -> bool {
        self.facets.len() == 2 * self.vertex_indices.len().saturating_sub(2)
    }
}

fn facet_normal(points: &[Vector3<f64>], v: [usize; 3]) -> Vector3<f64> {
    let (a, b, c) = (points[v[0]], points[v[1]], points[v[2]]);
    (b - a).cross(&(c - a))
}

fn signed_distance(points: &[Vector3<f64>], facet: &Facet, p: Vector3<f64>) -> f64 {
    facet.normal.dot(&(p - points[facet.vertices[0]]))
}

/// Builds the convex hull of `points`. Fails with `HullDegenerate` if no
/// non-degenerate initial tetrahedron can be found (collinear or coplanar
/// input).
pub fn build_hull(points: &[Vector3<f64>]) -> Result<Hull> {
    let n = points.len();
    if n < 4 {
        return Err(PtmError::HullDegenerate);
    }

    let (i0, i1) = farthest_pair(points)?;
    let i2 = farthest_from_line(points, i0, i1)?;
    let i3 = farthest_from_plane(points, i0, i1, i2)?;

    let centroid = (points[i0] + points[i1] + points[i2] + points[i3]) / 4.0;
    let mut facets = Vec::new();
    for tri in [[i0, i1, i2], [i0, i1, i3], [i0, i2, i3], [i1, i2, i3]] {
        facets.push(oriented_facet(points, tri, centroid));
    }

    let mut used = vec![false; n];
    for idx in [i0, i1, i2, i3] {
        used[idx] = true;
    }

    for k in 0..n {
        if used[k] {
            continue;
        }
        insert_point(points, &mut facets, k);
        // `insert_point` only marks k as a genuine vertex implicitly by
        // whether it appears in any surviving facet; track that below.
    }

    let vertex_indices = hull_vertex_indices(&facets);
    if vertex_indices.len() < 4 || facets.is_empty() {
        return Err(PtmError::HullDegenerate);
    }

    Ok(Hull { facets, vertex_indices })
}

fn oriented_facet(points: &[Vector3<f64>], tri: [usize; 3], interior_point: Vector3<f64>) -> Facet {
    let raw_normal = facet_normal(points, tri);
    let to_interior = interior_point - points[tri[0]];
    let tri = if raw_normal.dot(&to_interior) > 0.0 {
        [tri[0], tri[2], tri[1]]
    } else {
        tri
    };
    let normal = facet_normal(points, tri);
    let norm = normal.norm();
    let normal = if norm > HULL_EPSILON { normal / norm } else { normal };
    Facet { vertices: tri, normal }
}

fn farthest_pair(points: &[Vector3<f64>]) -> Result<(usize, usize)> {
    let n = points.len();
    let mut best = (-1.0, 0, 1);
    for i in 0..n {
        for j in (i + 1)..n {
            let d2 = (points[i] - points[j]).norm_squared();
            if d2 > best.0 {
                best = (d2, i, j);
            }
        }
    }
    if best.0 < HULL_EPSILON {
        return Err(PtmError::HullDegenerate);
    }
    Ok((best.1, best.2))
}

fn farthest_from_line(points: &[Vector3<f64>], i0: usize, i1: usize) -> Result<usize> {
    let dir = (points[i1] - points[i0]).normalize();
    let mut best = (-1.0, usize::MAX);
    for (k, &p) in points.iter().enumerate() {
        if k == i0 || k == i1 {
            continue;
        }
        let v = p - points[i0];
        let perp = v - dir * v.dot(&dir);
        let d2 = perp.norm_squared();
        if d2 > best.0 {
            best = (d2, k);
        }
    }
    if best.1 == usize::MAX || best.0 < HULL_EPSILON {
        return Err(PtmError::HullDegenerate);
    }
    Ok(best.1)
}

fn farthest_from_plane(points: &[Vector3<f64>], i0: usize, i1: usize, i2: usize) -> Result<usize> {
    let normal = (points[i1] - points[i0]).cross(&(points[i2] - points[i0]));
    let mut best = (-1.0, usize::MAX);
    for (k, &p) in points.iter().enumerate() {
        if k == i0 || k == i1 || k == i2 {
            continue;
        }
        let d = normal.dot(&(p - points[i0])).abs();
        if d > best.0 {
            best = (d, k);
        }
    }
    if best.1 == usize::MAX || best.0 < HULL_EPSILON {
        return Err(PtmError::HullDegenerate);
    }
    Ok(best.1)
}

/// Inserts point `k` into the hull being built, discarding visible facets
/// and fanning the horizon out to the new point. A no-op if `k` lies inside
/// the current hull (it never becomes a vertex).
fn insert_point(points: &[Vector3<f64>], facets: &mut Vec<Facet>, k: usize) {
    let p = points[k];
    let visible: Vec<bool> =
        facets.iter().map(|f| signed_distance(points, f, p) > HULL_EPSILON).collect();
    if !visible.iter().any(|&v| v) {
        return;
    }

    let mut directed_edges: HashSet<(usize, usize)> = HashSet::new();
    for (facet, &is_visible) in facets.iter().zip(visible.iter()) {
        if !is_visible {
            continue;
        }
        let v = facet.vertices;
        for (a, b) in [(v[0], v[1]), (v[1], v[2]), (v[2], v[0])] {
            directed_edges.insert((a, b));
        }
    }
    let horizon: Vec<(usize, usize)> = directed_edges
        .iter()
        .copied()
        .filter(|&(a, b)| !directed_edges.contains(&(b, a)))
        .collect();
    if horizon.is_empty() {
        return;
    }

    let mut kept: Vec<Facet> = facets
        .iter()
        .zip(visible.iter())
        .filter(|(_, &v)| !v)
        .map(|(f, _)| f.clone())
        .collect();
    for (a, b) in horizon {
        let tri = [a, b, k];
        let normal = facet_normal(points, tri);
        let norm = normal.norm();
        let normal = if norm > HULL_EPSILON { normal / norm } else { normal };
        kept.push(Facet { vertices: tri, normal });
    }
    *facets = kept;
}

fn hull_vertex_indices(facets: &[Facet]) -> Vec<usize> {
    let mut set: Vec<usize> = facets.iter().flat_map(|f| f.vertices).collect();
    set.sort_unstable();
    set.dedup();
    set
}
