//! Standard normal CDF and quantile function.

use statrs::function::erf::{erfc, erfc_inv};
use std::f64::consts::SQRT_2;

/// Standard normal cumulative distribution function.
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Standard normal quantile function (inverse CDF).
///
/// Returns negative/positive infinity at 0 and 1 and NaN outside [0, 1].
pub fn norm_ppf(p: f64) -> f64 {
    if !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    -SQRT_2 * erfc_inv(2.0 * p)
}

/// Map a uniform value to a normal score, clipping values at or above one
/// to `clip` (and values at or below zero to `1 - clip`) so the score stays
/// finite.
pub fn normal_score(u: f64, clip: f64) -> f64 {
    if u >= 1.0 {
        norm_ppf(clip)
    } else if u <= 0.0 {
        norm_ppf(1.0 - clip)
    } else {
        norm_ppf(u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn known_values() {
        assert_abs_diff_eq!(norm_cdf(0.0), 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(norm_cdf(1.959963984540054), 0.975, epsilon = 1e-12);
        assert_abs_diff_eq!(norm_ppf(0.975), 1.959963984540054, epsilon = 1e-9);
        assert_abs_diff_eq!(norm_ppf(0.5), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn inverse_round_trip() {
        for &x in &[-3.0, -1.2, 0.3, 2.5] {
            assert_abs_diff_eq!(norm_ppf(norm_cdf(x)), x, epsilon = 1e-8);
        }
    }

    #[test]
    fn clipping_keeps_scores_finite() {
        assert!(norm_ppf(1.0).is_infinite());
        let score = normal_score(1.0, 0.999999);
        assert!(score.is_finite());
        assert_abs_diff_eq!(score, norm_ppf(0.999999), epsilon = 1e-12);
        assert!(normal_score(0.0, 0.999999).is_finite());
        assert!(norm_ppf(1.5).is_nan());
    }
}
