//! Empirical distribution built from historical samples.

use super::Marginal;
use crate::errors::{EmulatorError, EmulatorResult};
use serde::{Deserialize, Serialize};

/// Step-function empirical CDF with a piecewise-linear inverse.
///
/// `cdf(x)` is the fraction of samples `<= x`. `ppf(p)` interpolates linearly
/// between the distinct sample values at their empirical probabilities and is
/// clamped to the sample range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmpiricalDistribution {
    sorted: Vec<f64>,
    /// Distinct sample values with their empirical cumulative probabilities.
    knots: Vec<(f64, f64)>,
}

impl EmpiricalDistribution {
    /// Build from samples, ignoring NaN values.
    pub fn new(samples: &[f64]) -> EmulatorResult<Self> {
        let mut sorted: Vec<f64> = samples.iter().copied().filter(|v| !v.is_nan()).collect();
        if sorted.is_empty() {
            return Err(EmulatorError::MissingData(
                "Empirical distribution needs at least one non-missing sample".to_string(),
            ));
        }
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len() as f64;
        let mut knots: Vec<(f64, f64)> = Vec::new();
        for (i, &value) in sorted.iter().enumerate() {
            let p = (i + 1) as f64 / n;
            match knots.last_mut() {
                Some(last) if last.0 == value => last.1 = p,
                _ => knots.push((value, p)),
            }
        }

        Ok(Self { sorted, knots })
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    pub fn min(&self) -> f64 {
        self.sorted[0]
    }

    pub fn max(&self) -> f64 {
        self.sorted[self.sorted.len() - 1]
    }
}

impl Marginal for EmpiricalDistribution {
    fn cdf(&self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }
        let count = self.sorted.partition_point(|v| *v <= x);
        count as f64 / self.sorted.len() as f64
    }

    fn ppf(&self, p: f64) -> f64 {
        if p.is_nan() {
            return f64::NAN;
        }
        let (first_x, first_p) = self.knots[0];
        if p <= first_p {
            return first_x;
        }
        // First knot with probability >= p; exists because the last knot has p = 1
        let upper = self.knots.partition_point(|k| k.1 < p);
        if upper >= self.knots.len() {
            return self.max();
        }
        let (x1, p1) = self.knots[upper];
        let (x0, p0) = self.knots[upper - 1];
        x0 + (p - p0) * (x1 - x0) / (p1 - p0)
    }
}
