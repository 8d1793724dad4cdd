//! Historical and simulated input series
//!
//! These are the data contracts with the upstream collaborators: the cluster
//! classification (`bmus` and centroids), the wave families and partitions,
//! and the simulated daily weather-type sequences.

use crate::errors::{EmulatorError, EmulatorResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

pub type Time = f64;

/// Cluster label assigned to every historical time step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSeries {
    times: Vec<Time>,
    labels: Vec<u32>,
    n_clusters: u32,
    /// Cluster centroids in the classifier's feature space: shape (n_clusters, n_features)
    centroids: Array2<f64>,
}

impl ClusterSeries {
    /// Build a cluster series, checking that labels cover `1..=n_clusters`
    /// and that times are strictly increasing.
    pub fn new(times: Vec<Time>, labels: Vec<u32>, centroids: Array2<f64>) -> EmulatorResult<Self> {
        if times.is_empty() {
            return Err(EmulatorError::InvalidInput(
                "Cluster series is empty".to_string(),
            ));
        }
        if times.len() != labels.len() {
            return Err(EmulatorError::InvalidInput(format!(
                "Cluster series has {} times but {} labels",
                times.len(),
                labels.len()
            )));
        }
        if times.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(EmulatorError::InvalidInput(
                "Cluster series times must be strictly increasing".to_string(),
            ));
        }
        let n_clusters = centroids.nrows() as u32;
        if let Some(bad) = labels.iter().find(|l| **l == 0 || **l > n_clusters) {
            return Err(EmulatorError::InvalidInput(format!(
                "Cluster label {} outside 1..={}",
                bad, n_clusters
            )));
        }

        Ok(Self {
            times,
            labels,
            n_clusters,
            centroids,
        })
    }

    pub fn times(&self) -> &[Time] {
        &self.times
    }

    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    pub fn n_clusters(&self) -> u32 {
        self.n_clusters
    }

    pub fn centroids(&self) -> &Array2<f64> {
        &self.centroids
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Significant wave height, peak period and mean direction of one family.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaveState {
    pub hs: f64,
    pub tp: f64,
    pub dir: f64,
}

impl WaveState {
    pub fn new(hs: f64, tp: f64, dir: f64) -> Self {
        Self { hs, tp, dir }
    }

    /// An inactive family in simulated output.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn missing() -> Self {
        Self::new(f64::NAN, f64::NAN, f64::NAN)
    }

    pub fn is_active(&self) -> bool {
        !self.hs.is_nan()
    }

    pub fn values(&self) -> [f64; 3] {
        [self.hs, self.tp, self.dir]
    }
}

/// Time series of one wave family. NaN marks time steps without that family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilySeries {
    pub hs: Vec<f64>,
    pub tp: Vec<f64>,
    pub dir: Vec<f64>,
}

impl FamilySeries {
    pub fn new(hs: Vec<f64>, tp: Vec<f64>, dir: Vec<f64>) -> Self {
        Self { hs, tp, dir }
    }

    pub fn len(&self) -> usize {
        self.hs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hs.is_empty()
    }

    pub fn state(&self, index: usize) -> WaveState {
        WaveState::new(self.hs[index], self.tp[index], self.dir[index])
    }
}

/// Historical wave families, time aligned with a [`ClusterSeries`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveFamilies {
    names: Vec<String>,
    families: Vec<FamilySeries>,
}

impl WaveFamilies {
    pub fn new(names: Vec<String>, families: Vec<FamilySeries>) -> EmulatorResult<Self> {
        if names.len() != families.len() || names.is_empty() {
            return Err(EmulatorError::InvalidInput(format!(
                "Expected one series per family name, got {} names and {} series",
                names.len(),
                families.len()
            )));
        }
        let n = families[0].len();
        for (name, family) in names.iter().zip(families.iter()) {
            if family.hs.len() != n || family.tp.len() != n || family.dir.len() != n {
                return Err(EmulatorError::InvalidInput(format!(
                    "Wave family {} is not aligned with the other families",
                    name
                )));
            }
        }
        Ok(Self { names, families })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn n_families(&self) -> usize {
        self.families.len()
    }

    /// Number of time steps.
    pub fn len(&self) -> usize {
        self.families[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn family(&self, index: usize) -> &FamilySeries {
        &self.families[index]
    }

    /// States of every family at one time step.
    pub fn states_at(&self, index: usize) -> Vec<WaveState> {
        self.families.iter().map(|f| f.state(index)).collect()
    }
}

/// Spectral partitions used for the total water level proxy.
///
/// Shape of both matrices: (time, partition).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeaStatePartitions {
    pub hs: Array2<f64>,
    pub tp: Array2<f64>,
}

impl SeaStatePartitions {
    pub fn new(hs: Array2<f64>, tp: Array2<f64>) -> EmulatorResult<Self> {
        if hs.dim() != tp.dim() {
            return Err(EmulatorError::InvalidInput(format!(
                "Partition Hs {:?} and Tp {:?} shapes differ",
                hs.dim(),
                tp.dim()
            )));
        }
        Ok(Self { hs, tp })
    }

    pub fn n_times(&self) -> usize {
        self.hs.nrows()
    }

    /// Use the wave families themselves as partitions.
    pub fn from_families(families: &WaveFamilies) -> Self {
        let n = families.len();
        let f = families.n_families();
        let hs = Array2::from_shape_fn((n, f), |(t, i)| families.family(i).hs[t]);
        let tp = Array2::from_shape_fn((n, f), |(t, i)| families.family(i).tp[t]);
        Self { hs, tp }
    }
}

/// The full historical record consumed by the fitting stage.
#[derive(Debug, Clone)]
pub struct HistoricalRecord {
    pub clusters: ClusterSeries,
    pub families: WaveFamilies,
    /// When absent the families are used as partitions.
    pub partitions: Option<SeaStatePartitions>,
}

impl HistoricalRecord {
    pub fn new(clusters: ClusterSeries, families: WaveFamilies) -> Self {
        Self {
            clusters,
            families,
            partitions: None,
        }
    }

    pub fn with_partitions(mut self, partitions: SeaStatePartitions) -> Self {
        self.partitions = Some(partitions);
        self
    }
}

/// One simulated daily weather-type realization.
///
/// Labels `1..=K` are fitted clusters; larger labels are tropical-cyclone
/// weather types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherTypeSequence {
    pub labels: Vec<u32>,
}

impl WeatherTypeSequence {
    pub fn new(labels: Vec<u32>) -> Self {
        Self { labels }
    }
}

impl From<Vec<u32>> for WeatherTypeSequence {
    fn from(labels: Vec<u32>) -> Self {
        Self::new(labels)
    }
}
