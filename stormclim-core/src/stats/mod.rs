//! Univariate distributions and rank statistics used by the emulator.
//!
//! Marginal distributions implement [`Marginal`] so the correlation estimator
//! and the simulators can move between physical values and probabilities
//! without caring whether the marginal is parametric (GEV) or empirical.

pub mod ecdf;
pub mod gev;
pub mod normal;
pub mod rank;

pub use ecdf::EmpiricalDistribution;
pub use gev::{GevFit, GevMethod, GevParams};

/// A continuous univariate distribution with a CDF and its inverse.
pub trait Marginal {
    /// Cumulative probability of `x`. NaN in, NaN out.
    fn cdf(&self, x: f64) -> f64;

    /// Quantile function. Probabilities outside (0, 1) map to the support bounds.
    fn ppf(&self, p: f64) -> f64;
}
