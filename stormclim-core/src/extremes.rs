//! Per-cluster GEV fitting of wave-family peaks and shape smoothing.

use crate::config::{EmulatorConfig, ShapeSource};
use crate::errors::{EmulatorError, EmulatorResult};
use crate::stats::gev::{fit_gev, GevFit, GevMethod, GevParams};
use crate::storms::StormPeak;
use log::{debug, warn};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Physical variable of a wave family that is fitted with a GEV.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitVariable {
    Hs,
    Tp,
}

impl FitVariable {
    pub const ALL: [FitVariable; 2] = [FitVariable::Hs, FitVariable::Tp];

    fn suffix(&self) -> &'static str {
        match self {
            FitVariable::Hs => "Hs",
            FitVariable::Tp => "Tp",
        }
    }

    fn offset(&self) -> usize {
        match self {
            FitVariable::Hs => 0,
            FitVariable::Tp => 1,
        }
    }
}

/// GEV fits for every (family, variable) pair and every cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GevTable {
    /// Variable names, `<family>_Hs` and `<family>_Tp` per family.
    variables: Vec<String>,
    n_clusters: u32,
    /// Indexed `[variable][cluster - 1]`
    fits: Vec<Vec<GevFit>>,
    /// Indexed `[variable][cluster - 1]`
    smoothed_shape: Vec<Vec<f64>>,
}

impl GevTable {
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn n_clusters(&self) -> u32 {
        self.n_clusters
    }

    fn index(&self, family: usize, variable: FitVariable, cluster: u32) -> EmulatorResult<(usize, usize)> {
        let v = family * 2 + variable.offset();
        if v >= self.variables.len() || cluster == 0 || cluster > self.n_clusters {
            return Err(EmulatorError::Lookup(format!(
                "No GEV fit for family {} {} in cluster {}",
                family,
                variable.suffix(),
                cluster
            )));
        }
        Ok((v, (cluster - 1) as usize))
    }

    pub fn fit(&self, family: usize, variable: FitVariable, cluster: u32) -> EmulatorResult<&GevFit> {
        let (v, c) = self.index(family, variable, cluster)?;
        Ok(&self.fits[v][c])
    }

    pub fn smoothed_shape(&self, family: usize, variable: FitVariable, cluster: u32) -> EmulatorResult<f64> {
        let (v, c) = self.index(family, variable, cluster)?;
        Ok(self.smoothed_shape[v][c])
    }

    /// Distribution parameters with the shape taken from `source`.
    ///
    /// Location and scale always come from the per-cluster fit.
    pub fn params(
        &self,
        family: usize,
        variable: FitVariable,
        cluster: u32,
        source: ShapeSource,
    ) -> EmulatorResult<GevParams> {
        let raw = self.fit(family, variable, cluster)?.params;
        let params = match source {
            ShapeSource::Raw => raw,
            ShapeSource::Smoothed => raw.with_shape(self.smoothed_shape(family, variable, cluster)?),
        };
        if !params.is_finite() {
            return Err(EmulatorError::Lookup(format!(
                "GEV parameters of {} in cluster {} are undefined (no fitted samples)",
                self.variables[family * 2 + variable.offset()],
                cluster
            )));
        }
        Ok(params)
    }
}

/// Fit a GEV per cluster to the Hs and Tp peaks of every wave family.
///
/// Every cluster must own at least one storm. A family with no samples in a
/// cluster is recorded as [`GevMethod::NoData`].
pub fn fit_extremes(
    peaks: &[StormPeak],
    n_clusters: u32,
    centroids: &Array2<f64>,
    config: &EmulatorConfig,
) -> EmulatorResult<GevTable> {
    let n_families = config.n_families();
    let variables = config.gev_variables();
    let mut fits: Vec<Vec<GevFit>> = vec![Vec::with_capacity(n_clusters as usize); variables.len()];

    for cluster in 1..=n_clusters {
        let members: Vec<&StormPeak> = peaks.iter().filter(|p| p.label == cluster).collect();
        if members.is_empty() {
            return Err(EmulatorError::MissingData(format!(
                "Cluster {} has no storms to fit",
                cluster
            )));
        }

        for family in 0..n_families {
            for variable in FitVariable::ALL {
                let name = &variables[family * 2 + variable.offset()];
                let sample: Vec<f64> = members
                    .iter()
                    .map(|p| match variable {
                        FitVariable::Hs => p.waves[family].hs,
                        FitVariable::Tp => p.waves[family].tp,
                    })
                    .collect();

                let fit = fit_gev(&sample, &config.gev).map_err(|e| EmulatorError::Fitting {
                    cluster,
                    variable: name.clone(),
                    reason: e.to_string(),
                })?;

                if fit.method == GevMethod::Degenerate {
                    warn!(
                        "Cluster {} variable {}: {} sample(s) cannot support a likelihood fit, using a degenerate distribution",
                        cluster, name, fit.n_samples
                    );
                }
                debug!(
                    "Cluster {} variable {}: {:?} fit from {} samples {:?}",
                    cluster, name, fit.method, fit.n_samples, fit.params
                );
                fits[family * 2 + variable.offset()].push(fit);
            }
        }
    }

    let smoothed_shape = fits
        .iter()
        .map(|per_cluster| {
            let shapes: Vec<f64> = per_cluster.iter().map(|f| f.params.shape).collect();
            smooth_shape(centroids, &shapes, config.smoothing.n_neighbours)
        })
        .collect();

    Ok(GevTable {
        variables,
        n_clusters,
        fits,
        smoothed_shape,
    })
}

fn distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Smooth a per-cluster shape parameter over the centroid feature space.
///
/// Each cluster's value is a Gaussian-kernel weighted mean of the shapes of
/// its `n_neighbours` nearest centroids (itself included), with the bandwidth
/// set to the distance of the farthest of those neighbours. NaN shapes are
/// ignored.
pub fn smooth_shape(centroids: &Array2<f64>, shapes: &[f64], n_neighbours: usize) -> Vec<f64> {
    let k = shapes.len();
    let m = n_neighbours.clamp(1, k.max(1));

    (0..k)
        .map(|i| {
            let mut neighbours: Vec<(f64, usize)> = (0..k)
                .map(|j| (distance(centroids.row(i), centroids.row(j)), j))
                .collect();
            neighbours.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            neighbours.truncate(m);

            let bandwidth = neighbours.iter().fold(0.0_f64, |h, (d, _)| h.max(*d));
            let (sum, weight) = neighbours
                .iter()
                .filter(|(_, j)| !shapes[*j].is_nan())
                .map(|(d, j)| {
                    let w = if bandwidth > 0.0 {
                        (-(d / bandwidth).powi(2)).exp()
                    } else {
                        1.0
                    };
                    (w * shapes[*j], w)
                })
                .fold((0.0, 0.0), |acc, x| (acc.0 + x.0, acc.1 + x.1));

            if weight > 0.0 {
                sum / weight
            } else {
                f64::NAN
            }
        })
        .collect()
}
