//! Small geometry helpers shared by the hull, Voronoi and QCP stages.

use nalgebra::Vector3;

use crate::config::NORMALIZATION_TOL;

/// A point set's centroid and the scale factor that normalises its mean
/// squared norm to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    /// Arithmetic mean of the input points.
    pub centroid: Vector3<f64>,
    /// Scale factor `sigma` applied after centring; `1/sigma` recovers the
    /// original scale.
    pub sigma: f64,
}

/// Centres `points` on their centroid and scales them so that
/// `mean(||p_i||^2) == 1`. Returns the normalised points alongside the
/// `Normalization` record needed to invert the transform.
///
/// `points` must be non-empty; a single-point input normalises to the
/// origin with `sigma = 1.0` (there is no meaningful scale to recover).
pub fn normalize(points: &[Vector3<f64>]) -> (Vec<Vector3<f64>>, Normalization) {
    let n = points.len() as f64;
    let centroid = points.iter().sum::<Vector3<f64>>() / n;
    let centred: Vec<Vector3<f64>> = points.iter().map(|p| p - centroid).collect();

    let mean_sq_norm = centred.iter().map(|p| p.norm_squared()).sum::<f64>() / n;
    let sigma = if mean_sq_norm > NORMALIZATION_TOL {
        1.0 / mean_sq_norm.sqrt()
    } else {
        1.0
    };

    let scaled: Vec<Vector3<f64>> = centred.iter().map(|p| p * sigma).collect();
    (scaled, Normalization { centroid, sigma })
}

/// Checks the normalisation invariant: `sum(||p_i||^2) / n == 1` within
/// `NORMALIZATION_TOL`.
pub fn is_normalized(points: &[Vector3<f64>]) -> bool {
    let n = points.len() as f64;
    if n == 0.0 {
        return true;
    }
    let mean_sq_norm = points.iter().map(|p| p.norm_squared()).sum::<f64>() / n;
    (mean_sq_norm - 1.0).abs() < 1e-6
}

/// Solid angle subtended at the origin by the triangle `(r1, r2, r3)`, via
/// the Van Oosterom-Strackee / L'Huilier formula used for Voronoi face
/// prominence. Inputs need not be pre-normalised; they are normalised
/// internally.
pub fn triangle_solid_angle(r1: Vector3<f64>, r2: Vector3<f64>, r3: Vector3<f64>) -> f64 {
    let (r1, r2, r3) = (r1.normalize(), r2.normalize(), r3.normalize());
    let numerator = r1.dot(&r2.cross(&r3));
    let denominator = 1.0 + r1.dot(&r2) + r2.dot(&r3) + r3.dot(&r1);
    2.0 * numerator.atan2(denominator).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn v(x: f64, y: f64, z: f64) -> Vector3<f64> {
        Vector3::new(x, y, z)
    }

    #[test]
    fn test_normalize_centres_and_scales() {
        let points = vec![v(1.0, 0.0, 0.0), v(-1.0, 0.0, 0.0), v(0.0, 2.0, 0.0), v(0.0, -2.0, 0.0)];
        let (normalized, norm) = normalize(&points);
        assert_abs_diff_eq!(norm.centroid, Vector3::zeros(), epsilon = 1e-12);
        assert!(is_normalized(&normalized));
    }

    #[test]
    fn test_normalize_recovers_original_scale() {
        let points = vec![v(3.0, 0.0, 0.0), v(0.0, 3.0, 0.0), v(0.0, 0.0, 3.0)];
        let (normalized, norm) = normalize(&points);
        let recovered: Vec<Vector3<f64>> =
            normalized.iter().map(|p| p / norm.sigma + norm.centroid).collect();
        for (orig, rec) in points.iter().zip(recovered.iter()) {
            assert_abs_diff_eq!(orig, rec, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_octant_solid_angle_is_half_pi() {
        // The three positive axes bound exactly one octant of the sphere.
        let omega = triangle_solid_angle(v(1.0, 0.0, 0.0), v(0.0, 1.0, 0.0), v(0.0, 0.0, 1.0));
        assert_abs_diff_eq!(omega, std::f64::consts::FRAC_PI_2, epsilon = 1e-9);
    }
}
