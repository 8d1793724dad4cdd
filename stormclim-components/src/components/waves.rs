//! Monte Carlo storm wave simulator
//!
//! Every run of identical daily weather types becomes one storm event. For a
//! fitted cluster the event draws a chromosome from the cluster's chromosome
//! probabilities, a correlated standard normal vector from the chromosome's
//! rank correlation, and maps each component back to a physical value: Hs and
//! Tp through the cluster's GEV quantile function, Dir through the empirical
//! quantile function of the cluster's historical peak directions.
//!
//! Events of tropical-cyclone weather types copy a random historical record
//! from that weather type's wave pool.

use super::{is_admissible, pick, sample_with_limit};
use log::debug;
use nalgebra::{DMatrix, DVector};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stormclim_core::chromosome::ChromosomeId;
use stormclim_core::errors::{EmulatorError, EmulatorResult};
use stormclim_core::extremes::FitVariable;
use stormclim_core::series::{WaveState, WeatherTypeSequence};
use stormclim_core::stats::normal::norm_cdf;
use stormclim_core::stats::{EmpiricalDistribution, Marginal};
use stormclim_core::storms::{collapse_runs, total_water_level, StormEvent};
use stormclim_core::utils::linear_algebra::psd_factor;
use stormclim_core::{EmulatorConfig, FittedParameters};

/// Wave conditions of one simulated storm event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedStorm {
    pub event: StormEvent,
    /// One state per wave family; inactive families are zero.
    pub waves: Vec<WaveState>,
    /// Chromosome the event was drawn from. `None` for tropical-cyclone
    /// weather types.
    pub chromosome: Option<ChromosomeId>,
}

impl SimulatedStorm {
    /// Total water level proxy of the dominant family.
    pub fn twl(&self, coefficient: f64) -> f64 {
        self.waves
            .iter()
            .map(|w| total_water_level(w.hs, w.tp, coefficient))
            .fold(0.0, f64::max)
    }

    fn is_admissible(&self) -> bool {
        self.waves
            .iter()
            .all(|w| w.values().iter().all(|v| is_admissible(*v)))
    }
}

/// Historical wave records of each tropical-cyclone weather type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TcWavePool {
    pools: BTreeMap<u32, Vec<Vec<WaveState>>>,
}

impl TcWavePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the records of one weather type.
    ///
    /// Inactive (NaN) families are stored as zero, matching simulated output.
    pub fn insert(&mut self, weather_type: u32, records: Vec<Vec<WaveState>>) {
        let records = records
            .into_iter()
            .map(|record| {
                record
                    .into_iter()
                    .map(|w| if w.is_active() { w } else { WaveState::zero() })
                    .collect()
            })
            .collect();
        self.pools.insert(weather_type, records);
    }

    pub fn with_records(mut self, weather_type: u32, records: Vec<Vec<WaveState>>) -> Self {
        self.insert(weather_type, records);
        self
    }

    pub fn records(&self, weather_type: u32) -> Option<&[Vec<WaveState>]> {
        self.pools.get(&weather_type).map(|r| r.as_slice())
    }
}

/// Precomputed sampling state of one chromosome.
#[derive(Debug, Clone)]
struct ChromosomeDraw {
    /// `L` with `L Lᵀ` the chromosome's correlation matrix.
    factor: DMatrix<f64>,
    families: Vec<usize>,
}

#[derive(Debug, Clone)]
struct ClusterPlan {
    chromosomes: Vec<ChromosomeId>,
    weights: WeightedIndex<f64>,
    draws: BTreeMap<ChromosomeId, ChromosomeDraw>,
    /// Historical peak directions per family; `None` if the family never
    /// occurs in the cluster.
    directions: Vec<Option<EmpiricalDistribution>>,
}

/// Storm wave simulator over a fitted parameter bundle.
///
/// Construction validates the chromosome tables and factorises every
/// correlation matrix once; the simulator is then shared read-only across
/// realizations.
#[derive(Debug, Clone)]
pub struct WaveSimulator<'a> {
    fitted: &'a FittedParameters,
    config: &'a EmulatorConfig,
    plans: Vec<ClusterPlan>,
}

impl<'a> WaveSimulator<'a> {
    /// Prepare sampling plans for every cluster of `fitted`.
    ///
    /// Rejection limits and the GEV shape source are read from `config`,
    /// which must describe the same wave families as the fit.
    pub fn new(fitted: &'a FittedParameters, config: &'a EmulatorConfig) -> EmulatorResult<Self> {
        if config.families != fitted.families {
            return Err(EmulatorError::InvalidInput(format!(
                "Configured families {:?} differ from the fitted families {:?}",
                config.families, fitted.families
            )));
        }
        let plans = (1..=fitted.n_clusters)
            .map(|cluster| Self::plan(fitted, cluster))
            .collect::<EmulatorResult<Vec<_>>>()?;
        Ok(Self {
            fitted,
            config,
            plans,
        })
    }

    fn plan(fitted: &FittedParameters, cluster: u32) -> EmulatorResult<ClusterPlan> {
        let (chromosomes, weights): (Vec<ChromosomeId>, Vec<f64>) = fitted
            .probabilities
            .cluster(cluster)?
            .iter()
            .filter(|(_, p)| **p > 0.0)
            .map(|(id, p)| (*id, *p))
            .unzip();
        let weights = WeightedIndex::new(&weights).map_err(|e| {
            EmulatorError::Lookup(format!(
                "Chromosome probabilities of cluster {} cannot be sampled: {}",
                cluster, e
            ))
        })?;

        let mut draws = BTreeMap::new();
        for id in &chromosomes {
            let chromosome = fitted.chromosomes.get(*id)?;
            let entry = fitted.sigma.entry(cluster, *id)?;
            let side = 3 * chromosome.weight();
            if entry.genes != chromosome.genes || entry.correlation.shape() != (side, side) {
                return Err(EmulatorError::Lookup(format!(
                    "Correlation entry of chromosome {} in cluster {} does not match its genes",
                    id, cluster
                )));
            }
            draws.insert(
                *id,
                ChromosomeDraw {
                    factor: psd_factor(&entry.correlation),
                    families: chromosome.active_families(),
                },
            );
        }

        let directions = (0..fitted.n_families())
            .map(|family| {
                let samples: Vec<f64> = fitted
                    .cluster_peaks(cluster)
                    .map(|p| p.waves[family].dir)
                    .collect();
                EmpiricalDistribution::new(&samples).ok()
            })
            .collect();

        Ok(ClusterPlan {
            chromosomes,
            weights,
            draws,
            directions,
        })
    }

    /// Simulate one realization of a daily weather-type sequence.
    ///
    /// Returns one storm per run of identical weather types. A failing event
    /// aborts the realization with an error naming its weather type and
    /// index.
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        sequence: &WeatherTypeSequence,
        tc_pool: &TcWavePool,
        rng: &mut R,
    ) -> EmulatorResult<Vec<SimulatedStorm>> {
        let events = collapse_runs(&sequence.labels);
        debug!("Simulating waves for {} storm events", events.len());
        events
            .iter()
            .enumerate()
            .map(|(index, event)| {
                self.simulate_event(index, *event, tc_pool, rng)
                    .map_err(|e| e.at_event(event.label, index))
            })
            .collect()
    }

    fn simulate_event<R: Rng + ?Sized>(
        &self,
        index: usize,
        event: StormEvent,
        tc_pool: &TcWavePool,
        rng: &mut R,
    ) -> EmulatorResult<SimulatedStorm> {
        let label = event.label;
        let max_attempts = self.config.max_resample_attempts;

        if label == 0 {
            return Err(EmulatorError::Lookup("Weather type 0 is not defined".to_string()));
        }

        if label <= self.fitted.n_clusters {
            let plan = &self.plans[(label - 1) as usize];
            return sample_with_limit(
                max_attempts,
                label,
                index,
                || self.draw_cluster_storm(plan, event, rng),
                SimulatedStorm::is_admissible,
                |storm| storm.chromosome,
            );
        }

        let records = tc_pool.records(label).filter(|r| !r.is_empty()).ok_or_else(|| {
            EmulatorError::Lookup(format!("No wave records for weather type {}", label))
        })?;
        let n_families = self.fitted.n_families();
        sample_with_limit(
            max_attempts,
            label,
            index,
            || {
                let record = &records[pick(rng, records.len())];
                if record.len() != n_families {
                    return Err(EmulatorError::InvalidInput(format!(
                        "Wave record of weather type {} has {} families, expected {}",
                        label,
                        record.len(),
                        n_families
                    )));
                }
                Ok(SimulatedStorm {
                    event,
                    waves: record.clone(),
                    chromosome: None,
                })
            },
            SimulatedStorm::is_admissible,
            |_| None,
        )
    }

    fn draw_cluster_storm<R: Rng + ?Sized>(
        &self,
        plan: &ClusterPlan,
        event: StormEvent,
        rng: &mut R,
    ) -> EmulatorResult<SimulatedStorm> {
        let cluster = event.label;
        let id = plan.chromosomes[plan.weights.sample(rng)];
        let draw = plan.draws.get(&id).ok_or_else(|| {
            EmulatorError::Lookup(format!("Chromosome {} has no sampling plan", id))
        })?;

        let z = DVector::<f64>::from_fn(draw.factor.ncols(), |_, _| rng.sample(StandardNormal));
        let y = &draw.factor * z;

        let shape = self.config.simulation_shape;
        let mut waves = vec![WaveState::zero(); self.fitted.n_families()];
        for (slot, &family) in draw.families.iter().enumerate() {
            let hs = self.fitted.gev.params(family, FitVariable::Hs, cluster, shape)?;
            let tp = self.fitted.gev.params(family, FitVariable::Tp, cluster, shape)?;
            let dir = plan.directions[family].as_ref().ok_or_else(|| {
                EmulatorError::Lookup(format!(
                    "Cluster {} has no direction samples for family {}",
                    cluster, self.fitted.families[family]
                ))
            })?;
            waves[family] = WaveState::new(
                hs.ppf(norm_cdf(y[3 * slot])),
                tp.ppf(norm_cdf(y[3 * slot + 1])),
                dir.ppf(norm_cdf(y[3 * slot + 2])),
            );
        }

        Ok(SimulatedStorm {
            event,
            waves,
            chromosome: Some(id),
        })
    }
}
