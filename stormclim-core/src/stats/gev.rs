//! Generalized Extreme Value distribution
//!
//! $$F(x) = \exp\left(-\left(1 + \xi \frac{x - \mu}{\sigma}\right)^{-1/\xi}\right)$$
//!
//! The shape follows the hydrological (Coles) sign convention:
//! - $\xi > 0$: Fréchet, heavy upper tail
//! - $\xi = 0$: Gumbel, $F(x) = \exp(-\exp(-(x - \mu)/\sigma))$
//! - $\xi < 0$: Weibull, bounded upper tail

use super::Marginal;
use crate::config::GevConfig;
use crate::utils::optimize::nelder_mead;
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shapes closer to zero than this are evaluated with the Gumbel limit.
const GUMBEL_EPS: f64 = 1e-8;
const EULER_GAMMA: f64 = 0.5772156649015329;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GevParams {
    pub shape: f64,
    pub location: f64,
    pub scale: f64,
}

impl GevParams {
    pub fn new(shape: f64, location: f64, scale: f64) -> Self {
        Self {
            shape,
            location,
            scale,
        }
    }

    pub fn gumbel(location: f64, scale: f64) -> Self {
        Self::new(0.0, location, scale)
    }

    pub fn nan() -> Self {
        Self::new(f64::NAN, f64::NAN, f64::NAN)
    }

    pub fn is_finite(&self) -> bool {
        self.shape.is_finite() && self.location.is_finite() && self.scale.is_finite()
    }

    /// Same location and scale with another shape.
    pub fn with_shape(&self, shape: f64) -> Self {
        Self::new(shape, self.location, self.scale)
    }

    pub fn log_pdf(&self, x: f64) -> f64 {
        if !(self.scale > 0.0) {
            return f64::NEG_INFINITY;
        }
        let z = (x - self.location) / self.scale;
        if self.shape.abs() < GUMBEL_EPS {
            -self.scale.ln() - z - (-z).exp()
        } else {
            let t = 1.0 + self.shape * z;
            if t <= 0.0 {
                return f64::NEG_INFINITY;
            }
            let inv = 1.0 / self.shape;
            -self.scale.ln() - (1.0 + inv) * t.ln() - t.powf(-inv)
        }
    }

    /// Negative log-likelihood of a sample; infinite when a value lies
    /// outside the support.
    pub fn nll(&self, data: &[f64]) -> f64 {
        let ll: f64 = data.iter().map(|x| self.log_pdf(*x)).sum();
        if ll.is_nan() {
            f64::INFINITY
        } else {
            -ll
        }
    }
}

impl Marginal for GevParams {
    fn cdf(&self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }
        let z = (x - self.location) / self.scale;
        if self.shape.abs() < GUMBEL_EPS {
            return (-(-z).exp()).exp();
        }
        let t = 1.0 + self.shape * z;
        if t <= 0.0 {
            // Below the lower bound of a Fréchet or above the upper bound of a Weibull
            return if self.shape > 0.0 { 0.0 } else { 1.0 };
        }
        (-t.powf(-1.0 / self.shape)).exp()
    }

    fn ppf(&self, p: f64) -> f64 {
        if p.is_nan() {
            return f64::NAN;
        }
        let bound = self.location - self.scale / self.shape;
        if p <= 0.0 {
            return if self.shape > GUMBEL_EPS { bound } else { f64::NEG_INFINITY };
        }
        if p >= 1.0 {
            return if self.shape < -GUMBEL_EPS { bound } else { f64::INFINITY };
        }
        let y = -p.ln();
        if self.shape.abs() < GUMBEL_EPS {
            self.location - self.scale * y.ln()
        } else {
            self.location + self.scale * (y.powf(-self.shape) - 1.0) / self.shape
        }
    }
}

/// How a [`GevFit`] was obtained.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GevMethod {
    /// Three-parameter maximum likelihood.
    Gev,
    /// Two-parameter maximum likelihood with zero shape.
    Gumbel,
    /// Too few or constant samples for a likelihood fit.
    Degenerate,
    /// No samples.
    NoData,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GevFit {
    pub params: GevParams,
    pub n_samples: usize,
    pub method: GevMethod,
}

impl GevFit {
    pub fn no_data() -> Self {
        Self {
            params: GevParams::nan(),
            n_samples: 0,
            method: GevMethod::NoData,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitFailure {
    #[error("{model} likelihood did not converge within {iterations} iterations")]
    NotConverged { model: &'static str, iterations: usize },
    #[error("{model} likelihood has no finite optimum")]
    NonFinite { model: &'static str },
}

struct Mle {
    params: GevParams,
    nll: f64,
}

/// Fit a GEV to block maxima by maximum likelihood.
///
/// A Gumbel model is fitted as well. A Fréchet fit (positive shape) is only
/// kept when it improves the negative log-likelihood over the Gumbel by at
/// least `config.gumbel_threshold`; otherwise the Gumbel is returned. The
/// Gumbel is also returned when the three-parameter optimisation fails.
///
/// NaN values are ignored. Fewer than two distinct values cannot support a
/// likelihood fit and give a [`GevMethod::Degenerate`] result centred on the
/// sample mean with a vanishing scale.
pub fn fit_gev(data: &[f64], config: &GevConfig) -> Result<GevFit, FitFailure> {
    let sample: Vec<f64> = data.iter().copied().filter(|v| !v.is_nan()).collect();
    let n = sample.len();
    if n == 0 {
        return Ok(GevFit::no_data());
    }

    let mean = sample.iter().sum::<f64>() / n as f64;
    let std = (sample.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64).sqrt();
    if n < 2 || !(std > 0.0) {
        return Ok(GevFit {
            params: GevParams::gumbel(mean, (mean.abs() * 1e-3).max(1e-6)),
            n_samples: n,
            method: GevMethod::Degenerate,
        });
    }

    // Method of moments for the Gumbel as a starting point
    let scale0 = std * 6.0_f64.sqrt() / std::f64::consts::PI;
    let location0 = mean - EULER_GAMMA * scale0;

    let gumbel = fit_gumbel(&sample, location0, scale0, config)?;
    let gev = match fit_three_parameter(&sample, location0, scale0, config) {
        Ok(gev) => gev,
        Err(e) => {
            warn!("{} ({} samples), keeping the Gumbel fit", e, n);
            return Ok(GevFit {
                params: gumbel.params,
                n_samples: n,
                method: GevMethod::Gumbel,
            });
        }
    };

    let (params, method) = if gev.params.shape > 0.0
        && gumbel.nll - gev.nll < config.gumbel_threshold
    {
        (gumbel.params, GevMethod::Gumbel)
    } else {
        (gev.params, GevMethod::Gev)
    };

    Ok(GevFit {
        params,
        n_samples: n,
        method,
    })
}

fn fit_gumbel(
    sample: &[f64],
    location0: f64,
    scale0: f64,
    config: &GevConfig,
) -> Result<Mle, FitFailure> {
    let objective = |x: &[f64]| GevParams::gumbel(x[0], x[1].exp()).nll(sample);
    let steps = [0.5 * scale0, 0.3];
    let point = minimise(objective, &[location0, scale0.ln()], &steps, config, "Gumbel")?;
    let params = GevParams::gumbel(point[0], point[1].exp());
    Ok(Mle {
        nll: params.nll(sample),
        params,
    })
}

fn fit_three_parameter(
    sample: &[f64],
    location0: f64,
    scale0: f64,
    config: &GevConfig,
) -> Result<Mle, FitFailure> {
    let (lo, hi) = config.shape_bounds;
    let objective = |x: &[f64]| {
        if x[2] <= lo || x[2] >= hi {
            return f64::INFINITY;
        }
        GevParams::new(x[2], x[0], x[1].exp()).nll(sample)
    };

    // Start slightly on the Fréchet side; fall back to the Gumbel if that
    // start leaves a sample outside the support.
    let mut start = [location0, scale0.ln(), 0.1_f64.min(hi / 2.0)];
    if !objective(&start).is_finite() {
        start[2] = 0.0;
    }
    let steps = [0.5 * scale0, 0.3, 0.1];
    let point = minimise(objective, &start, &steps, config, "GEV")?;
    let params = GevParams::new(point[2], point[0], point[1].exp());
    Ok(Mle {
        nll: params.nll(sample),
        params,
    })
}

/// Nelder-Mead with one restart from the first optimum.
fn minimise<F>(
    objective: F,
    start: &[f64],
    steps: &[f64],
    config: &GevConfig,
    model: &'static str,
) -> Result<Vec<f64>, FitFailure>
where
    F: Fn(&[f64]) -> f64,
{
    let first = nelder_mead(&objective, start, steps, config.max_iterations, config.tolerance);
    if !first.value.is_finite() {
        return Err(FitFailure::NonFinite { model });
    }
    let second = nelder_mead(
        &objective,
        &first.point,
        steps,
        config.max_iterations,
        config.tolerance,
    );
    if !second.converged {
        return Err(FitFailure::NotConverged {
            model,
            iterations: config.max_iterations,
        });
    }
    if !second.value.is_finite() {
        return Err(FitFailure::NonFinite { model });
    }
    Ok(second.point)
}
