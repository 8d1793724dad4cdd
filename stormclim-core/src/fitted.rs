//! The fitted parameter bundle consumed by the simulators.

use crate::chromosome::ChromosomeSet;
use crate::config::EmulatorConfig;
use crate::correlation::{
    chromosome_correlations, chromosome_probabilities, ChromosomeProbabilities, SigmaTable,
};
use crate::errors::{EmulatorError, EmulatorResult};
use crate::extremes::{fit_extremes, GevTable};
use crate::series::{HistoricalRecord, SeaStatePartitions};
use crate::storms::{storm_peaks, StormPeak};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Everything estimated from the historical record.
///
/// Built once by [`FittedParameters::fit`] and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedParameters {
    /// Configuration the parameters were fitted with.
    pub config: EmulatorConfig,
    pub families: Vec<String>,
    pub n_clusters: u32,
    pub chromosomes: ChromosomeSet,
    pub gev: GevTable,
    pub probabilities: ChromosomeProbabilities,
    pub sigma: SigmaTable,
    /// Wave state of every historical storm at its maximum total water level.
    pub peaks: Vec<StormPeak>,
}

impl FittedParameters {
    /// Run storm segmentation, extreme-value fitting and chromosome
    /// statistics over a historical record.
    pub fn fit(record: &HistoricalRecord, config: &EmulatorConfig) -> EmulatorResult<Self> {
        config.validate()?;
        if record.families.names() != config.families.as_slice() {
            return Err(EmulatorError::InvalidInput(format!(
                "Wave families {:?} do not match the configured families {:?}",
                record.families.names(),
                config.families
            )));
        }

        let clusters = &record.clusters;
        let n_clusters = clusters.n_clusters();
        let derived;
        let partitions = match &record.partitions {
            Some(p) => p,
            None => {
                derived = SeaStatePartitions::from_families(&record.families);
                &derived
            }
        };

        let peaks = storm_peaks(clusters, &record.families, partitions, config.twl_coefficient)?;
        info!(
            "Segmented {} time steps into {} storms over {} clusters",
            clusters.len(),
            peaks.len(),
            n_clusters
        );

        let gev = fit_extremes(&peaks, n_clusters, clusters.centroids(), config)?;
        info!(
            "Fitted {} GEV variables for {} clusters",
            gev.variables().len(),
            n_clusters
        );

        let chromosomes = ChromosomeSet::enumerate(config.n_families())?;
        let probabilities = chromosome_probabilities(&peaks, &chromosomes, n_clusters)?;
        let sigma = chromosome_correlations(&peaks, &chromosomes, &probabilities, &gev, config)?;
        for cluster in 1..=n_clusters {
            let entries = sigma.cluster(cluster)?;
            debug!(
                "Cluster {}: {} chromosome(s) observed, {} from relaxed pools",
                cluster,
                entries.len(),
                entries.values().filter(|e| !e.full_data).count()
            );
        }
        info!("Estimated chromosome probabilities and correlations");

        Ok(Self {
            config: config.clone(),
            families: config.families.clone(),
            n_clusters,
            chromosomes,
            gev,
            probabilities,
            sigma,
            peaks,
        })
    }

    pub fn n_families(&self) -> usize {
        self.families.len()
    }

    /// Historical storm peaks of one cluster.
    pub fn cluster_peaks(&self, cluster: u32) -> impl Iterator<Item = &StormPeak> {
        self.peaks.iter().filter(move |p| p.label == cluster)
    }
}
