//! Quaternion Characteristic Polynomial optimal superposition.
//!
//! Given the 3x3 cross-covariance matrix `M = sum_i p_i (x) r_i` between a
//! (mapped) input point set `p` and a reference template `r`, finds the
//! rotation quaternion maximising `sum_i (R(q) r_i) . p_i` in closed form,
//! without an explicit SVD, following Theobald's quaternion characteristic
//! polynomial method.

use nalgebra::{Matrix3, Matrix4, UnitQuaternion, Vector3, Vector4};

use crate::config::{QCP_MAX_NEWTON_ITERATIONS, QCP_NEWTON_ABS_FLOOR, QCP_NEWTON_RELATIVE_TOL};
use crate::error::{PtmError, Result};

/// Outcome of a QCP fit: the optimal rotation, the `k0` inner-product
/// value it achieves, and the two Frobenius-norm invariants `g1`, `g2`
/// needed by the caller to derive scale and RMSD.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QcpFit {
    /// Optimal rotation quaternion.
    pub rotation: UnitQuaternion<f64>,
    /// `k0 = sum_ijk R(q)_jk r_ik p_ij`, the maximised inner product.
    pub k0: f64,
    /// `g1 = sum_i |p_i|^2`.
    pub g1: f64,
    /// `g2 = sum_i |r_i|^2`.
    pub g2: f64,
}

/// Builds the 3x3 cross-covariance matrix `M = sum_i p_i r_i^T`.
pub fn cross_covariance(p: &[Vector3<f64>], r: &[Vector3<f64>]) -> Matrix3<f64> {
    debug_assert_eq!(p.len(), r.len());
    let mut m = Matrix3::zeros();
    for (pi, ri) in p.iter().zip(r.iter()) {
        m += pi * ri.transpose();
    }
    m
}

/// Builds Theobald's 4x4 symmetric, trace-zero "key matrix" K from the
/// cross-covariance matrix M.
fn key_matrix(m: &Matrix3<f64>) -> Matrix4<f64> {
    let sxx = m[(0, 0)];
    let sxy = m[(0, 1)];
    let sxz = m[(0, 2)];
    let syx = m[(1, 0)];
    let syy = m[(1, 1)];
    let syz = m[(1, 2)];
    let szx = m[(2, 0)];
    let szy = m[(2, 1)];
    let szz = m[(2, 2)];

    Matrix4::new(
        sxx + syy + szz, syz - szy, szx - sxz, sxy - syx,
        syz - szy, sxx - syy - szz, sxy + syx, szx + sxz,
        szx - sxz, sxy + syx, -sxx + syy - szz, syz + szy,
        sxy - syx, szx + sxz, syz + szy, -sxx - syy + szz,
    )
}

/// Runs QCP on the point correspondence `p[i] <-> r[i]`.
///
/// `p` and `r` must be the same length and centred (mean-subtracted); the
/// template points `r` are assumed pre-scaled to the library's convention.
/// Fails with `NumericalNonConvergence` if the Newton iteration for the
/// largest eigenvalue does not settle within the configured bound.
pub fn fit(p: &[Vector3<f64>], r: &[Vector3<f64>]) -> Result<QcpFit> {
    let g1: f64 = p.iter().map(|v| v.norm_squared()).sum();
    let g2: f64 = r.iter().map(|v| v.norm_squared()).sum();

    let m = cross_covariance(p, r);
    let k = key_matrix(&m);

    let lambda = largest_eigenvalue_newton(&k, g1, g2)?;
    let q = eigenvector_via_cross_products(&k, lambda);
    let rotation = UnitQuaternion::new_normalize(nalgebra::Quaternion::new(q[0], q[1], q[2], q[3]));

    let k0 = lambda;
    Ok(QcpFit { rotation, k0, g1, g2 })
}

/// Newton iteration on the characteristic quartic of `K`, following
/// Theobald's power-sum/Newton-identity formulation, starting from
/// `lambda0 = E0 = (G1 + G2) / 2`.
fn largest_eigenvalue_newton(k: &Matrix4<f64>, g1: f64, g2: f64) -> Result<f64> {
    // Coefficients of the characteristic quartic det(K - lambda I) =
    // lambda^4 + c3 lambda^3 + c2 lambda^2 + c1 lambda + c0, obtained from
    // K's trace (zero by construction) and its power sums via Newton's
    // identities, matching the closed-form coefficients Theobald derives
    // directly from the elements of M rather than from K's characteristic
    // polynomial by brute force.
    let trace_k2 = (k * k).trace();
    let det_k = k.determinant();
    let adj_trace = {
        // sum of principal 2x2 minors = (trace(K)^2 - trace(K^2)) / 2; K is
        // trace-zero so this reduces to -trace(K^2)/2.
        -trace_k2 / 2.0
    };
    let trace_k3 = (k * k * k).trace();
    // sum of principal 3x3 minors, via Newton's identity e3 = (p1^3 - 3 p1
    // p2 + 2 p3) / 6 with p1 = trace(K) = 0.
    let sum_3x3_minors = trace_k3 / 3.0;

    // c3 = -trace(K) = 0, c2 = sum of principal 2x2 minors = adj_trace,
    // c1 = -(sum of principal 3x3 minors), c0 = det(K).
    let c2 = adj_trace;
    let c1 = -sum_3x3_minors;
    let c0 = det_k;

    let mut lambda = 0.5 * (g1 + g2);
    let mut converged = false;
    for _ in 0..QCP_MAX_NEWTON_ITERATIONS {
        let l2 = lambda * lambda;
        let f = l2 * l2 + c2 * l2 + c1 * lambda + c0;
        let fp = 4.0 * l2 * lambda + 2.0 * c2 * lambda + c1;
        if fp.abs() < f64::EPSILON {
            break;
        }
        let delta = f / fp;
        lambda -= delta;
        let tol = (QCP_NEWTON_RELATIVE_TOL * 0.5 * (g1 + g2)).max(QCP_NEWTON_ABS_FLOOR);
        if delta.abs() < tol {
            converged = true;
            break;
        }
    }

    if !converged {
        return Err(PtmError::NumericalNonConvergence);
    }
    Ok(lambda)
}

/// Solves `(K - lambda I) q = 0` for the unit eigenvector, using the
/// generalised 4D cross product of three rows of the (singular)
/// `K - lambda I` matrix (the rows spanning the orthogonal complement of
/// `q` once `lambda` is a genuine eigenvalue). Picks the combination of
/// three rows with the largest residual determinant to avoid the
/// degenerate branch.
fn eigenvector_via_cross_products(k: &Matrix4<f64>, lambda: f64) -> Vector4<f64> {
    let a = k - Matrix4::identity() * lambda;
    let rows: Vec<Vector4<f64>> = (0..4).map(|i| a.row(i).transpose()).collect();

    let combos: [[usize; 3]; 4] = [[1, 2, 3], [0, 2, 3], [0, 1, 3], [0, 1, 2]];
    let mut best_q = Vector4::zeros();
    let mut best_score = -1.0;
    for combo in combos {
        let q = cross4(rows[combo[0]], rows[combo[1]], rows[combo[2]]);
        let score = q.norm();
        if score > best_score {
            best_score = score;
            best_q = q;
        }
    }
    if best_score < 1e-12 {
        // K - lambda I vanished entirely (p is already exactly aligned with
        // r along every axis): any unit quaternion works; identity rotation.
        return Vector4::new(1.0, 0.0, 0.0, 0.0);
    }
    best_q / best_score
}

/// Generalised cross product of three vectors in R^4: the unique (up to
/// scale) vector orthogonal to all three, via cofactor expansion.
fn cross4(a: Vector4<f64>, b: Vector4<f64>, c: Vector4<f64>) -> Vector4<f64> {
    let mat = |skip: usize| {
        let cols = [a, b, c];
        let idx: Vec<usize> = (0..4).filter(|&i| i != skip).collect();
        Matrix3::new(
            cols[0][idx[0]], cols[1][idx[0]], cols[2][idx[0]],
            cols[0][idx[1]], cols[1][idx[1]], cols[2][idx[1]],
            cols[0][idx[2]], cols[1][idx[2]], cols[2][idx[2]],
        )
    };
    Vector4::new(mat(0).determinant(), -mat(1).determinant(), mat(2).determinant(), -mat(3).determinant())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn v(x: f64, y: f64, z: f64) -> Vector3<f64> {
        Vector3::new(x, y, z)
    }

    fn octahedron() -> Vec<Vector3<f64>> {
        vec![v(1.0, 0.0, 0.0), v(-1.0, 0.0, 0.0), v(0.0, 1.0, 0.0), v(0.0, -1.0, 0.0), v(0.0, 0.0, 1.0), v(0.0, 0.0, -1.0)]
    }

    #[test]
    fn test_identity_fit_has_zero_residual_rotation() {
        let pts = octahedron();
        let fit = fit(&pts, &pts).unwrap();
        // k0 should equal g1 (== g2) for a perfect identity match.
        assert_abs_diff_eq!(fit.k0, fit.g1, epsilon = 1e-8);
        assert_abs_diff_eq!(fit.rotation.angle(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_rotated_input_recovers_the_rotation() {
        let pts = octahedron();
        let q = UnitQuaternion::from_euler_angles(0.3, 0.7, -0.2);
        let rotated: Vec<Vector3<f64>> = pts.iter().map(|p| q * p).collect();

        let fit = fit(&rotated, &pts).unwrap();
        assert_abs_diff_eq!(fit.k0, fit.g1, epsilon = 1e-6);

        // the fitted rotation should map template points back onto `rotated`
        for (r, expected) in pts.iter().zip(rotated.iter()) {
            let mapped = fit.rotation * r;
            assert_abs_diff_eq!(mapped, *expected, epsilon = 1e-5);
        }
    }
}
