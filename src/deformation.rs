//! Deformation gradient and optional polar decomposition.

use nalgebra::{DMatrix, Matrix3, SymmetricEigen, Vector3};

use crate::templates::{StructureKind, Template};

/// Deformation gradient result: `f` maps template vectors onto the
/// matched, normalised input vectors; `f_res` is a residual second-moment
/// matrix (zero iff the match is exact) rather than a single scalar, kept
/// in `f`'s 3x3 shape so a caller can read off anisotropic residual
/// structure instead of a single lumped number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deformation {
    /// The deformation gradient.
    pub f: Matrix3<f64>,
    /// Residual second-moment matrix `(1/(n+1)) sum_i resid_i (x) resid_i`.
    pub f_res: Matrix3<f64>,
}

/// Computes `F` from the matched, normalised points (`matched[k]`
/// corresponds to `template`'s row `k`: row 0 is the central atom, the
/// rest follow `template.points`'s order) via the template's pre-tabulated
/// pseudo-inverse: `F^T = pinv(R) . P`, solving the least-squares system
/// `R . F^T ~= P`.
pub fn compute(template: &Template, matched: &[Vector3<f64>]) -> Deformation {
    debug_assert_eq!(matched.len(), template.points.len() + 1);

    let rows = matched.len();
    let mut p = DMatrix::zeros(rows, 3);
    for (row, point) in matched.iter().enumerate() {
        for axis in 0..3 {
            p[(row, axis)] = point[axis];
        }
    }

    let f_t = &template.pseudo_inverse * &p;
    let mut f = Matrix3::new(
        f_t[(0, 0)], f_t[(1, 0)], f_t[(2, 0)],
        f_t[(0, 1)], f_t[(1, 1)], f_t[(2, 1)],
        f_t[(0, 2)], f_t[(1, 2)], f_t[(2, 2)],
    );

    if template.kind == StructureKind::Graphene {
        // the structure is intrinsically 2-D; force the out-of-plane row
        // to identity so F stays invertible.
        f.set_row(2, &Matrix3::identity().row(2));
    }

    let mut r_rows = Vec::with_capacity(rows);
    r_rows.push(template.center);
    r_rows.extend(template.points.iter().copied());

    let mut second_moment = Matrix3::zeros();
    for (matched_point, template_point) in matched.iter().zip(r_rows.iter()) {
        let resid = matched_point - f * template_point;
        second_moment += resid * resid.transpose();
    }
    second_moment /= rows as f64;

    Deformation { f, f_res: second_moment }
}

/// One-sided polar decomposition `F = U P` with `U` orthogonal and `P`
/// symmetric positive semi-definite, via the eigendecomposition of
/// `C = F^T F`. Returns `None` if `C` is singular (`F` has no polar
/// factorisation, e.g. a degenerate match).
pub fn polar_decompose(f: &Matrix3<f64>) -> Option<(Matrix3<f64>, Matrix3<f64>)> {
    let c = f.transpose() * f;
    let eigen = SymmetricEigen::new(c);
    if eigen.eigenvalues.iter().any(|&lambda| lambda < 0.0) {
        return None;
    }
    let sqrt_diag = Matrix3::from_diagonal(&eigen.eigenvalues.map(|lambda| lambda.max(0.0).sqrt()));
    let p = eigen.eigenvectors * sqrt_diag * eigen.eigenvectors.transpose();
    let p_inv = p.try_inverse()?;
    let u = f * p_inv;
    Some((u, p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::template_for;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_ideal_template_input_gives_identity_with_zero_residual() {
        for kind in StructureKind::all() {
            let t = template_for(kind);
            let mut matched = vec![t.center];
            matched.extend(t.points.iter().copied());

            let deformation = compute(t, &matched);
            assert_abs_diff_eq!(deformation.f, Matrix3::identity(), epsilon = 1e-6);
            assert!(deformation.f_res.norm() < 1e-9, "{kind:?} residual should vanish for ideal input");
        }
    }

    #[test]
    fn test_polar_decomposition_recovers_rotation_times_identity() {
        let t = template_for(StructureKind::Fcc);
        let q = nalgebra::UnitQuaternion::from_euler_angles(0.2, 0.3, 0.1);
        let mut matched = vec![q * t.center];
        matched.extend(t.points.iter().map(|p| q * p));

        let deformation = compute(t, &matched);
        let (u, p) = polar_decompose(&deformation.f).unwrap();
        assert_abs_diff_eq!(p, Matrix3::identity(), epsilon = 1e-5);
        assert_abs_diff_eq!(u, q.to_rotation_matrix().into_inner(), epsilon = 1e-5);
    }
}
