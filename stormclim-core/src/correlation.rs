//! Chromosome probabilities and rank correlations per cluster
//!
//! For every cluster the storm peaks are classified by their chromosome (the
//! set of active wave families). The relative frequency of each chromosome
//! gives its probability, and for every chromosome that occurs a Spearman
//! correlation matrix is estimated between the normal scores of the active
//! families' Hs, Tp and Dir.

use crate::chromosome::{ChromosomeId, ChromosomeSet};
use crate::config::EmulatorConfig;
use crate::errors::{EmulatorError, EmulatorResult};
use crate::extremes::{FitVariable, GevTable};
use crate::stats::normal::normal_score;
use crate::stats::rank::spearman_matrix;
use crate::stats::{EmpiricalDistribution, Marginal};
use crate::storms::StormPeak;
use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Probability of every chromosome, per cluster.
///
/// Each cluster's map holds an entry for every chromosome of the set; the
/// entries sum to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChromosomeProbabilities {
    /// Indexed by `cluster - 1`
    per_cluster: Vec<BTreeMap<ChromosomeId, f64>>,
}

impl ChromosomeProbabilities {
    pub fn n_clusters(&self) -> u32 {
        self.per_cluster.len() as u32
    }

    pub fn cluster(&self, cluster: u32) -> EmulatorResult<&BTreeMap<ChromosomeId, f64>> {
        cluster
            .checked_sub(1)
            .and_then(|c| self.per_cluster.get(c as usize))
            .ok_or_else(|| {
                EmulatorError::Lookup(format!("No chromosome probabilities for cluster {}", cluster))
            })
    }

    pub fn probability(&self, cluster: u32, chromosome: ChromosomeId) -> EmulatorResult<f64> {
        self.cluster(cluster)?.get(&chromosome).copied().ok_or_else(|| {
            EmulatorError::Lookup(format!(
                "Chromosome {} has no probability in cluster {}",
                chromosome, cluster
            ))
        })
    }
}

/// Correlation of one chromosome's variables within a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigmaEntry {
    pub chromosome: ChromosomeId,
    pub genes: Vec<bool>,
    /// Spearman correlation between (Hs, Tp, Dir) of each active family, in
    /// family order. Square with side `3 * weight`.
    pub correlation: DMatrix<f64>,
    /// Number of storm peaks the correlation was estimated from.
    pub n_samples: usize,
    /// `false` when the exact-match pool was too small and every peak with
    /// at least these families active was used instead.
    pub full_data: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigmaTable {
    /// Indexed by `cluster - 1`
    per_cluster: Vec<BTreeMap<ChromosomeId, SigmaEntry>>,
}

impl SigmaTable {
    pub fn n_clusters(&self) -> u32 {
        self.per_cluster.len() as u32
    }

    pub fn cluster(&self, cluster: u32) -> EmulatorResult<&BTreeMap<ChromosomeId, SigmaEntry>> {
        cluster
            .checked_sub(1)
            .and_then(|c| self.per_cluster.get(c as usize))
            .ok_or_else(|| EmulatorError::Lookup(format!("No correlation table for cluster {}", cluster)))
    }

    pub fn entry(&self, cluster: u32, chromosome: ChromosomeId) -> EmulatorResult<&SigmaEntry> {
        self.cluster(cluster)?.get(&chromosome).ok_or_else(|| {
            EmulatorError::Lookup(format!(
                "Chromosome {} has no correlation entry in cluster {}",
                chromosome, cluster
            ))
        })
    }
}

/// Peaks of one cluster with at least one active family.
fn usable_peaks(peaks: &[StormPeak], cluster: u32) -> Vec<&StormPeak> {
    peaks
        .iter()
        .filter(|p| p.label == cluster && p.waves.iter().any(|w| w.is_active()))
        .collect()
}

/// Relative frequency of every chromosome among each cluster's storm peaks.
///
/// Peaks with no active family are discarded. A cluster left without peaks
/// is an error.
pub fn chromosome_probabilities(
    peaks: &[StormPeak],
    chromosomes: &ChromosomeSet,
    n_clusters: u32,
) -> EmulatorResult<ChromosomeProbabilities> {
    let mut per_cluster = Vec::with_capacity(n_clusters as usize);
    for cluster in 1..=n_clusters {
        let usable = usable_peaks(peaks, cluster);
        if usable.is_empty() {
            return Err(EmulatorError::MissingData(format!(
                "Cluster {} has no storm peak with an active wave family",
                cluster
            )));
        }

        let mut counts: BTreeMap<ChromosomeId, usize> =
            chromosomes.iter().map(|c| (c.id, 0)).collect();
        for peak in &usable {
            let id = chromosomes.position(&peak.genes()).ok_or_else(|| {
                EmulatorError::InvalidInput(format!(
                    "Storm {} has {} wave families, expected {}",
                    peak.storm,
                    peak.waves.len(),
                    chromosomes.n_families()
                ))
            })?;
            *counts.entry(id).or_insert(0) += 1;
        }

        let total = usable.len() as f64;
        per_cluster.push(
            counts
                .into_iter()
                .map(|(id, count)| (id, count as f64 / total))
                .collect(),
        );
    }
    Ok(ChromosomeProbabilities { per_cluster })
}

/// Normal scores of the pool's variables, one row per (family, variable).
fn normal_scores(
    pool: &[&StormPeak],
    families: &[usize],
    cluster: u32,
    gev: &GevTable,
    config: &EmulatorConfig,
) -> EmulatorResult<Vec<Vec<f64>>> {
    let mut rows = Vec::with_capacity(3 * families.len());
    for &family in families {
        for variable in FitVariable::ALL {
            let params = gev.params(family, variable, cluster, config.correlation_shape)?;
            rows.push(
                pool.iter()
                    .map(|p| {
                        let x = match variable {
                            FitVariable::Hs => p.waves[family].hs,
                            FitVariable::Tp => p.waves[family].tp,
                        };
                        normal_score(params.cdf(x), config.uniform_clip)
                    })
                    .collect(),
            );
        }

        let directions: Vec<f64> = pool.iter().map(|p| p.waves[family].dir).collect();
        let ecdf = EmpiricalDistribution::new(&directions).map_err(|_| {
            EmulatorError::MissingData(format!(
                "Cluster {} family {} has no direction samples",
                cluster, config.families[family]
            ))
        })?;
        rows.push(
            directions
                .iter()
                .map(|d| normal_score(ecdf.cdf(*d), config.uniform_clip))
                .collect(),
        );
    }
    Ok(rows)
}

/// Spearman correlation tables for every observed chromosome of every cluster.
///
/// Chromosomes with zero probability get no entry.
pub fn chromosome_correlations(
    peaks: &[StormPeak],
    chromosomes: &ChromosomeSet,
    probabilities: &ChromosomeProbabilities,
    gev: &GevTable,
    config: &EmulatorConfig,
) -> EmulatorResult<SigmaTable> {
    let mut per_cluster = Vec::with_capacity(probabilities.n_clusters() as usize);
    for cluster in 1..=probabilities.n_clusters() {
        let usable = usable_peaks(peaks, cluster);
        let genes: Vec<Vec<bool>> = usable.iter().map(|p| p.genes()).collect();
        let mut table = BTreeMap::new();

        for (id, probability) in probabilities.cluster(cluster)? {
            if *probability <= 0.0 {
                continue;
            }
            let chromosome = chromosomes.get(*id)?;

            let exact: Vec<&StormPeak> = usable
                .iter()
                .zip(genes.iter())
                .filter(|(_, g)| **g == chromosome.genes)
                .map(|(p, _)| *p)
                .collect();
            let full_data = exact.len() >= config.min_chromosome_samples;
            let pool = if full_data {
                exact
            } else {
                let relaxed: Vec<&StormPeak> = usable
                    .iter()
                    .zip(genes.iter())
                    .filter(|(_, g)| chromosome.is_covered_by(g))
                    .map(|(p, _)| *p)
                    .collect();
                debug!(
                    "Cluster {} chromosome {}: {} exact matches, using {} peaks sharing its families",
                    cluster,
                    id,
                    exact.len(),
                    relaxed.len()
                );
                relaxed
            };

            let rows = normal_scores(&pool, &chromosome.active_families(), cluster, gev, config)?;
            let (correlation, undefined) = spearman_matrix(&rows);
            if undefined > 0 {
                debug!(
                    "Cluster {} chromosome {}: {} undefined correlation(s) set to 0",
                    cluster, id, undefined
                );
            }

            table.insert(
                *id,
                SigmaEntry {
                    chromosome: *id,
                    genes: chromosome.genes.clone(),
                    correlation,
                    n_samples: pool.len(),
                    full_data,
                },
            );
        }
        per_cluster.push(table);
    }
    Ok(SigmaTable { per_cluster })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShapeSource;
    use crate::extremes::fit_extremes;
    use crate::series::WaveState;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn config() -> EmulatorConfig {
        EmulatorConfig {
            families: vec!["sea".into(), "swell".into()],
            ..Default::default()
        }
    }

    fn state(rng: &mut ChaCha8Rng) -> WaveState {
        let hs = crate::stats::GevParams::gumbel(1.5, 0.4).ppf(rng.gen::<f64>());
        WaveState::new(hs, 6.0 + 2.0 * hs + rng.gen::<f64>(), rng.gen::<f64>() * 360.0)
    }

    /// `n_sea` peaks with only the sea family and `n_both` with both families.
    fn peaks(cluster: u32, n_sea: usize, n_both: usize, seed: u64) -> Vec<StormPeak> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut out = Vec::new();
        for i in 0..(n_sea + n_both) {
            let swell = if i < n_sea {
                WaveState::missing()
            } else {
                state(&mut rng)
            };
            out.push(StormPeak {
                storm: i,
                label: cluster,
                index: i,
                time: i as f64,
                twl: 1.0,
                waves: vec![state(&mut rng), swell],
            });
        }
        out
    }

    #[test]
    fn probabilities_sum_to_one() {
        let mut all = peaks(1, 30, 10, 1);
        all.extend(peaks(2, 5, 15, 2));
        // A peak without any family is ignored
        all.push(StormPeak {
            waves: vec![WaveState::missing(), WaveState::missing()],
            ..all[0].clone()
        });
        let set = ChromosomeSet::enumerate(2).unwrap();
        let probs = chromosome_probabilities(&all, &set, 2).unwrap();

        for cluster in 1..=2 {
            let total: f64 = probs.cluster(cluster).unwrap().values().sum();
            assert_abs_diff_eq!(total, 1.0, epsilon = 1e-12);
            assert_eq!(probs.cluster(cluster).unwrap().len(), 3);
        }
        assert_abs_diff_eq!(probs.probability(1, ChromosomeId(0)).unwrap(), 0.75);
        assert_eq!(probs.probability(1, ChromosomeId(1)).unwrap(), 0.0);
        assert_abs_diff_eq!(probs.probability(2, ChromosomeId(2)).unwrap(), 0.75);
        assert!(probs.cluster(3).is_err());
        assert!(probs.cluster(0).is_err());
    }

    #[test]
    fn cluster_without_active_peaks_is_missing_data() {
        let set = ChromosomeSet::enumerate(2).unwrap();
        let err = chromosome_probabilities(&peaks(1, 3, 0, 4), &set, 2).unwrap_err();
        assert!(matches!(err, EmulatorError::MissingData(_)));
    }

    #[test]
    fn small_pools_fall_back_to_relaxed_matching() {
        let config = config();
        let all = peaks(1, 30, 10, 5);
        let set = ChromosomeSet::enumerate(2).unwrap();
        let gev = fit_extremes(&all, 1, &Array2::zeros((1, 2)), &config).unwrap();
        let probs = chromosome_probabilities(&all, &set, 1).unwrap();
        let sigma = chromosome_correlations(&all, &set, &probs, &gev, &config).unwrap();

        // sea only: 30 exact matches
        let sea = sigma.entry(1, ChromosomeId(0)).unwrap();
        assert!(sea.full_data);
        assert_eq!(sea.n_samples, 30);
        assert_eq!(sea.correlation.shape(), (3, 3));

        // sea + swell: 10 exact matches, relaxed pool has the same 10
        let both = sigma.entry(1, ChromosomeId(2)).unwrap();
        assert!(!both.full_data);
        assert_eq!(both.n_samples, 10);
        assert_eq!(both.correlation.shape(), (6, 6));

        // swell only never occurs
        assert!(sigma.entry(1, ChromosomeId(1)).is_err());
    }

    #[test]
    fn relaxed_pool_includes_supersets() {
        let config = config();
        let all = peaks(1, 5, 40, 6);
        let set = ChromosomeSet::enumerate(2).unwrap();
        let gev = fit_extremes(&all, 1, &Array2::zeros((1, 2)), &config).unwrap();
        let probs = chromosome_probabilities(&all, &set, 1).unwrap();
        let sigma = chromosome_correlations(&all, &set, &probs, &gev, &config).unwrap();

        let sea = sigma.entry(1, ChromosomeId(0)).unwrap();
        assert!(!sea.full_data);
        assert_eq!(sea.n_samples, 45);
        assert!(sigma.entry(1, ChromosomeId(2)).unwrap().full_data);
    }

    #[test]
    fn smoothed_shapes_give_valid_correlations() {
        let config = EmulatorConfig {
            correlation_shape: ShapeSource::Smoothed,
            ..config()
        };
        let mut all = peaks(1, 30, 30, 11);
        all.extend(peaks(2, 25, 35, 12));
        let centroids = Array2::from_shape_vec((2, 2), vec![0.0, 0.0, 1.0, 0.0]).unwrap();
        let set = ChromosomeSet::enumerate(2).unwrap();
        let gev = fit_extremes(&all, 2, &centroids, &config).unwrap();
        let probs = chromosome_probabilities(&all, &set, 2).unwrap();
        let sigma = chromosome_correlations(&all, &set, &probs, &gev, &config).unwrap();

        for cluster in 1..=2 {
            let entries = sigma.cluster(cluster).unwrap();
            assert_eq!(entries.len(), 2);
            for entry in entries.values() {
                let m = &entry.correlation;
                for i in 0..m.nrows() {
                    assert_eq!(m[(i, i)], 1.0);
                    for j in 0..m.ncols() {
                        assert_eq!(m[(i, j)], m[(j, i)]);
                        assert!(m[(i, j)].abs() <= 1.0);
                    }
                }
                assert!(m[(0, 1)] > 0.5, "{}", m);
            }
        }
    }

    #[test]
    fn correlation_matrices_are_valid() {
        let config = config();
        let all = peaks(1, 40, 40, 8);
        let set = ChromosomeSet::enumerate(2).unwrap();
        let gev = fit_extremes(&all, 1, &Array2::zeros((1, 2)), &config).unwrap();
        let probs = chromosome_probabilities(&all, &set, 1).unwrap();
        let sigma = chromosome_correlations(&all, &set, &probs, &gev, &config).unwrap();

        for entry in sigma.cluster(1).unwrap().values() {
            let m = &entry.correlation;
            for i in 0..m.nrows() {
                assert_eq!(m[(i, i)], 1.0);
                for j in 0..m.ncols() {
                    assert_eq!(m[(i, j)], m[(j, i)]);
                    assert!(m[(i, j)].abs() <= 1.0);
                }
            }
            // Tp is built to increase with Hs
            assert!(m[(0, 1)] > 0.5, "{}", m);
        }
    }
}
