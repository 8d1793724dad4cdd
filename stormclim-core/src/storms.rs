//! Storm segmentation and total water level peaks
//!
//! A storm is a maximal run of time steps sharing one cluster label. Each
//! storm is represented during fitting by the instant of its largest total
//! water level (TWL).

use crate::errors::{EmulatorError, EmulatorResult};
use crate::series::{ClusterSeries, SeaStatePartitions, Time, WaveFamilies, WaveState};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const GRAVITY: f64 = 9.81;

/// A contiguous window of constant cluster label. `end` is inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Storm {
    pub label: u32,
    pub start: usize,
    pub end: usize,
    pub start_time: Time,
    pub end_time: Time,
}

impl Storm {
    /// Number of time steps in the window.
    pub fn n_steps(&self) -> usize {
        self.end - self.start + 1
    }
}

/// The wave state of a storm at its maximum total water level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StormPeak {
    pub storm: usize,
    pub label: u32,
    pub index: usize,
    pub time: Time,
    pub twl: f64,
    /// One state per wave family; NaN where the family is inactive.
    pub waves: Vec<WaveState>,
}

impl StormPeak {
    /// Activation pattern of the wave families at this peak.
    pub fn genes(&self) -> Vec<bool> {
        self.waves.iter().map(|w| w.is_active()).collect()
    }
}

/// A run of identical daily labels in a simulated weather-type sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StormEvent {
    pub label: u32,
    /// Index of the first day of the run.
    pub start_day: usize,
    pub duration: usize,
}

/// Split a cluster series into storms at every label change.
pub fn segment_storms(series: &ClusterSeries) -> Vec<Storm> {
    let labels = series.labels();
    let times = series.times();

    let mut starts: Vec<usize> = vec![0];
    starts.extend((1..labels.len()).filter(|&i| labels[i] != labels[i - 1]));

    starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = match starts.get(n + 1) {
                Some(next) => next - 1,
                None => labels.len() - 1,
            };
            Storm {
                label: labels[start],
                start,
                end,
                start_time: times[start],
                end_time: times[end],
            }
        })
        .collect()
}

/// Run-length encode a daily label sequence into storm events.
pub fn collapse_runs(labels: &[u32]) -> Vec<StormEvent> {
    let mut events: Vec<StormEvent> = Vec::new();
    for (day, &label) in labels.iter().enumerate() {
        match events.last_mut() {
            Some(last) if last.label == label => last.duration += 1,
            _ => events.push(StormEvent {
                label,
                start_day: day,
                duration: 1,
            }),
        }
    }
    events
}

/// Total water level proxy `c * sqrt(Hs * L0)` with deep-water wavelength
/// `L0 = g * Tp^2 / (2 pi)`.
///
/// Monotone in both `hs` and `tp`; NaN if either input is NaN.
pub fn total_water_level(hs: f64, tp: f64, coefficient: f64) -> f64 {
    let l0 = GRAVITY * tp * tp / (2.0 * PI);
    coefficient * (hs * l0).sqrt()
}

impl SeaStatePartitions {
    /// TWL of the dominant partition at every time step.
    ///
    /// NaN where no partition has data.
    pub fn twl_series(&self, coefficient: f64) -> Vec<f64> {
        self.hs
            .outer_iter()
            .zip(self.tp.outer_iter())
            .map(|(hs, tp)| {
                hs.iter()
                    .zip(tp.iter())
                    .map(|(h, t)| total_water_level(*h, *t, coefficient))
                    .filter(|v| !v.is_nan())
                    .fold(f64::NAN, f64::max)
            })
            .collect()
    }
}

/// Locate the maximum TWL of every storm.
///
/// Ties resolve to the first occurrence. A storm whose window holds only NaN
/// TWL values is an error, as is a TWL series shorter than the storms span.
pub fn storm_max_twl(storms: &[Storm], twl: &[f64]) -> EmulatorResult<Vec<(usize, f64)>> {
    let span = storms.iter().map(|s| s.end + 1).max().unwrap_or(0);
    if twl.len() < span {
        return Err(EmulatorError::InvalidInput(format!(
            "Storms span {} time steps but the TWL series has {}",
            span,
            twl.len()
        )));
    }
    storms
        .iter()
        .enumerate()
        .map(|(n, storm)| {
            let mut best: Option<(usize, f64)> = None;
            for i in storm.start..=storm.end {
                let value = twl[i];
                if value.is_nan() {
                    continue;
                }
                match best {
                    Some((_, b)) if value <= b => {}
                    _ => best = Some((i, value)),
                }
            }
            best.ok_or_else(|| {
                EmulatorError::MissingData(format!(
                    "Storm {} (cluster {}, times {} to {}) has no valid total water level",
                    n, storm.label, storm.start_time, storm.end_time
                ))
            })
        })
        .collect()
}

/// Segment the record into storms and extract the wave state at each peak.
pub fn storm_peaks(
    clusters: &ClusterSeries,
    families: &WaveFamilies,
    partitions: &SeaStatePartitions,
    twl_coefficient: f64,
) -> EmulatorResult<Vec<StormPeak>> {
    if families.len() != clusters.len() || partitions.n_times() != clusters.len() {
        return Err(EmulatorError::InvalidInput(format!(
            "Cluster series ({}), wave families ({}) and partitions ({}) must share a time axis",
            clusters.len(),
            families.len(),
            partitions.n_times()
        )));
    }

    let storms = segment_storms(clusters);
    let twl = partitions.twl_series(twl_coefficient);
    let maxima = storm_max_twl(&storms, &twl)?;

    Ok(storms
        .iter()
        .zip(maxima)
        .enumerate()
        .map(|(n, (storm, (index, value)))| StormPeak {
            storm: n,
            label: storm.label,
            index,
            time: clusters.times()[index],
            twl: value,
            waves: families.states_at(index),
        })
        .collect())
}
