//! Tropical-cyclone storm parameters
//!
//! For every storm event the simulator emits the intradaily hydrograph
//! parameters `mu` and `tau` and the storm surge `ss`. Events of fitted
//! clusters draw `(mu, tau)` from the cluster's historical hydrographs. Events
//! of tropical-cyclone weather types first draw whether, and in which
//! category, a cyclone enters; an entering cyclone is taken from the synthetic
//! cyclone records of that category and replaces the event's waves with its
//! own sea state.

use super::{is_admissible, pick, sample_with_limit, SimulatedStorm};
use log::{debug, warn};
use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use stormclim_core::config::TcConfig;
use stormclim_core::errors::{EmulatorError, EmulatorResult};
use stormclim_core::series::{WaveState, WeatherTypeSequence};
use stormclim_core::storms::{collapse_runs, StormEvent};

/// Number of cyclone categories in the transition table.
pub const N_CATEGORIES: usize = 6;

/// Intradaily hydrograph of one historical storm.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hydrograph {
    pub mu: f64,
    pub tau: f64,
}

/// One synthetic tropical cyclone: its sea state, hydrograph `mu` and surge.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TcRecord {
    pub hs: f64,
    pub tp: f64,
    pub dir: f64,
    pub mu: f64,
    pub ss: f64,
}

/// Inputs of the tropical-cyclone simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcInputs {
    /// Minimum central pressure of each historical cyclone (hPa).
    min_pressure: Vec<f64>,
    /// Synthetic record paired with each historical cyclone.
    records: Vec<TcRecord>,
    /// Cumulative probability of each category (rows) per cyclone weather
    /// type (columns, weather type `K + 1 + column`).
    category_change: Array2<f64>,
    /// Historical hydrographs per fitted cluster, indexed by `cluster - 1`.
    hydrographs: Vec<Vec<Hydrograph>>,
}

impl TcInputs {
    pub fn new(
        min_pressure: Vec<f64>,
        records: Vec<TcRecord>,
        category_change: Array2<f64>,
        hydrographs: Vec<Vec<Hydrograph>>,
    ) -> EmulatorResult<Self> {
        if min_pressure.len() != records.len() {
            return Err(EmulatorError::InvalidInput(format!(
                "Got {} cyclone pressures but {} cyclone records",
                min_pressure.len(),
                records.len()
            )));
        }
        if category_change.nrows() != N_CATEGORIES {
            return Err(EmulatorError::InvalidInput(format!(
                "Category table needs {} rows, got {}",
                N_CATEGORIES,
                category_change.nrows()
            )));
        }
        for (column, probabilities) in category_change.columns().into_iter().enumerate() {
            let monotone = probabilities
                .iter()
                .zip(probabilities.iter().skip(1))
                .all(|(a, b)| a <= b);
            let bounded = probabilities.iter().all(|p| (0.0..=1.0).contains(p));
            if !monotone || !bounded {
                return Err(EmulatorError::InvalidInput(format!(
                    "Category table column {} is not a cumulative probability",
                    column
                )));
            }
        }
        Ok(Self {
            min_pressure,
            records,
            category_change,
            hydrographs,
        })
    }

    pub fn n_tc_types(&self) -> usize {
        self.category_change.ncols()
    }
}

/// Hydrograph and surge parameters of one simulated storm event.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TcParameters {
    pub weather_type: u32,
    pub mu: f64,
    pub tau: f64,
    pub ss: f64,
}

impl TcParameters {
    fn is_admissible(&self) -> bool {
        [self.mu, self.tau, self.ss].iter().all(|v| is_admissible(*v))
    }
}

/// Result of one tropical-cyclone realization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcRealization {
    /// Storm waves with cyclone sea states applied.
    pub waves: Vec<SimulatedStorm>,
    pub parameters: Vec<TcParameters>,
    /// Events where the drawn category had no historical cyclone and zero
    /// parameters were emitted.
    pub degenerate: usize,
}

#[derive(Debug, Clone, PartialEq)]
struct Outcome {
    parameters: TcParameters,
    /// Replacement waves of the event, if a cyclone entered.
    waves: Option<Vec<WaveState>>,
    degenerate: bool,
}

impl Outcome {
    /// Parameters and any replacement sea state are finite and non-negative.
    fn is_admissible(&self) -> bool {
        self.parameters.is_admissible()
            && self.waves.iter().flatten().all(|w| {
                w.values().iter().all(|v| is_admissible(*v))
            })
    }
}

#[derive(Debug, Clone)]
pub struct TcSimulator<'a> {
    inputs: &'a TcInputs,
    config: &'a TcConfig,
    n_clusters: u32,
    n_families: usize,
    max_attempts: usize,
    /// Hydrograph `mu` of every cluster, for events without a cyclone.
    all_mu: Vec<f64>,
    /// Indices of the cyclones in each category's pressure band.
    candidates: Vec<Vec<usize>>,
}

impl<'a> TcSimulator<'a> {
    pub fn new(
        inputs: &'a TcInputs,
        config: &'a TcConfig,
        n_clusters: u32,
        n_families: usize,
        max_attempts: usize,
    ) -> EmulatorResult<Self> {
        if n_families == 0 {
            return Err(EmulatorError::InvalidInput(
                "Cyclone sea states need at least one wave family".to_string(),
            ));
        }
        if inputs.hydrographs.len() != n_clusters as usize {
            return Err(EmulatorError::InvalidInput(format!(
                "Expected hydrographs for {} clusters, got {}",
                n_clusters,
                inputs.hydrographs.len()
            )));
        }

        let bands = pressure_bands(&inputs.min_pressure, &config.pressure_edges);
        let candidates: Vec<Vec<usize>> = bands
            .iter()
            .map(|(low, high)| {
                inputs
                    .min_pressure
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| **p > *low && **p <= *high)
                    .map(|(i, _)| i)
                    .collect()
            })
            .collect();
        debug!(
            "Cyclones per category: {:?}",
            candidates.iter().map(|c| c.len()).collect::<Vec<_>>()
        );

        Ok(Self {
            inputs,
            config,
            n_clusters,
            n_families,
            max_attempts,
            all_mu: inputs.hydrographs.iter().flatten().map(|h| h.mu).collect(),
            candidates,
        })
    }

    /// Simulate cyclone parameters for one realization.
    ///
    /// `waves` must be the wave simulation of the same sequence. The input
    /// storms are not modified: events where a cyclone enters are returned
    /// with the cyclone's sea state and every other family zeroed.
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        sequence: &WeatherTypeSequence,
        waves: &[SimulatedStorm],
        rng: &mut R,
    ) -> EmulatorResult<TcRealization> {
        let events = collapse_runs(&sequence.labels);
        if events.len() != waves.len() {
            return Err(EmulatorError::InvalidInput(format!(
                "Sequence has {} storm events but {} simulated storms were given",
                events.len(),
                waves.len()
            )));
        }

        let mut realization = TcRealization {
            waves: Vec::with_capacity(waves.len()),
            parameters: Vec::with_capacity(waves.len()),
            degenerate: 0,
        };
        for (index, (event, storm)) in events.iter().zip(waves.iter()).enumerate() {
            if storm.event != *event {
                return Err(EmulatorError::InvalidInput(format!(
                    "Simulated storm {} does not belong to event {:?}",
                    index, event
                )));
            }
            let outcome = self
                .simulate_event(index, *event, rng)
                .map_err(|e| e.at_event(event.label, index))?;

            if outcome.degenerate {
                warn!(
                    "Weather type {} event {}: no historical cyclone in the drawn category, using zero parameters",
                    event.label, index
                );
                realization.degenerate += 1;
            }
            realization.waves.push(match outcome.waves {
                Some(replacement) => SimulatedStorm {
                    event: *event,
                    waves: replacement,
                    chromosome: None,
                },
                None => storm.clone(),
            });
            realization.parameters.push(outcome.parameters);
        }
        Ok(realization)
    }

    fn simulate_event<R: Rng + ?Sized>(
        &self,
        index: usize,
        event: StormEvent,
        rng: &mut R,
    ) -> EmulatorResult<Outcome> {
        let label = event.label;
        if label == 0 {
            return Err(EmulatorError::Lookup("Weather type 0 is not defined".to_string()));
        }

        if label <= self.n_clusters {
            let pool = &self.inputs.hydrographs[(label - 1) as usize];
            if pool.is_empty() {
                return Err(EmulatorError::Lookup(format!(
                    "No hydrographs for cluster {}",
                    label
                )));
            }
            return sample_with_limit(
                self.max_attempts,
                label,
                index,
                || {
                    let h = pool[pick(rng, pool.len())];
                    Ok(self.outcome(label, h.mu, h.tau, 0.0))
                },
                Outcome::is_admissible,
                |_| None,
            );
        }

        let column = (label - self.n_clusters - 1) as usize;
        if column >= self.inputs.n_tc_types() {
            return Err(EmulatorError::Lookup(format!(
                "Weather type {} has no category transition probabilities",
                label
            )));
        }
        sample_with_limit(
            self.max_attempts,
            label,
            index,
            || self.draw_cyclone(label, column, rng),
            Outcome::is_admissible,
            |_| None,
        )
    }

    fn outcome(&self, weather_type: u32, mu: f64, tau: f64, ss: f64) -> Outcome {
        Outcome {
            parameters: TcParameters {
                weather_type,
                mu,
                tau,
                ss,
            },
            waves: None,
            degenerate: false,
        }
    }

    fn draw_cyclone<R: Rng + ?Sized>(
        &self,
        label: u32,
        column: usize,
        rng: &mut R,
    ) -> EmulatorResult<Outcome> {
        let u: f64 = rng.gen();
        // The terminal category (probability 1) means no cyclone enters
        let category = self
            .inputs
            .category_change
            .column(column)
            .iter()
            .position(|p| *p >= u)
            .unwrap_or(N_CATEGORIES);

        if category == N_CATEGORIES {
            if self.all_mu.is_empty() {
                return Err(EmulatorError::Lookup(
                    "No hydrographs to draw mu from".to_string(),
                ));
            }
            let mu = self.all_mu[pick(rng, self.all_mu.len())];
            return Ok(self.outcome(label, mu, self.config.tau, 0.0));
        }

        let candidates = &self.candidates[category];
        if candidates.is_empty() {
            return Ok(Outcome {
                degenerate: true,
                ..self.outcome(label, 0.0, 0.0, 0.0)
            });
        }

        let record = self.inputs.records[candidates[pick(rng, candidates.len())]];
        let mut waves = vec![WaveState::zero(); self.n_families];
        waves[0] = WaveState::new(record.hs, record.tp, record.dir);
        Ok(Outcome {
            waves: Some(waves),
            ..self.outcome(label, record.mu, self.config.tau, record.ss)
        })
    }
}

/// Pressure interval `(low, high]` of each category, strongest last.
///
/// The weakest category is open up to the largest observed pressure and the
/// strongest down to the smallest one.
pub fn pressure_bands(min_pressure: &[f64], edges: &[f64; 5]) -> Vec<(f64, f64)> {
    let finite = min_pressure.iter().copied().filter(|p| p.is_finite());
    let highest = finite.clone().fold(f64::NEG_INFINITY, f64::max);
    let lowest = finite.fold(f64::INFINITY, f64::min);

    let mut bands = vec![(edges[0], highest + 1.0)];
    bands.extend(edges.windows(2).map(|w| (w[1], w[0])));
    bands.push((lowest - 1.0, edges[4]));
    bands
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn storm(label: u32, start_day: usize, duration: usize) -> SimulatedStorm {
        SimulatedStorm {
            event: StormEvent {
                label,
                start_day,
                duration,
            },
            waves: vec![WaveState::new(1.0, 8.0, 45.0), WaveState::new(0.5, 12.0, 200.0)],
            chromosome: None,
        }
    }

    /// Two clusters, one cyclone weather type (label 3).
    fn inputs(column: [f64; 6]) -> TcInputs {
        TcInputs::new(
            vec![1005.0, 990.0, 950.0],
            vec![
                TcRecord { hs: 2.0, tp: 9.0, dir: 100.0, mu: 0.3, ss: 0.2 },
                TcRecord { hs: 4.0, tp: 11.0, dir: 120.0, mu: 0.4, ss: 0.5 },
                TcRecord { hs: 8.0, tp: 14.0, dir: 140.0, mu: 0.6, ss: 1.1 },
            ],
            ndarray::Array2::from_shape_vec((6, 1), column.to_vec()).unwrap(),
            vec![
                vec![Hydrograph { mu: 0.1, tau: 0.4 }],
                vec![Hydrograph { mu: 0.2, tau: 0.6 }, Hydrograph { mu: 0.25, tau: 0.7 }],
            ],
        )
        .unwrap()
    }

    #[test]
    fn default_bands() {
        let edges = TcConfig::default().pressure_edges;
        let bands = pressure_bands(&[1010.0, 930.0, 900.0], &edges);
        assert_eq!(
            bands,
            vec![
                (1000.0, 1011.0),
                (979.0, 1000.0),
                (964.0, 979.0),
                (944.0, 964.0),
                (920.0, 944.0),
                (899.0, 920.0),
            ]
        );
    }

    #[test]
    fn input_validation() {
        let ok = array![[0.1], [0.2], [0.3], [0.4], [0.5], [0.6]];
        assert!(TcInputs::new(vec![1000.0], vec![], ok.clone(), vec![]).is_err());
        assert!(TcInputs::new(vec![], vec![], array![[0.1], [0.2]], vec![]).is_err());
        let decreasing = array![[0.5], [0.2], [0.3], [0.4], [0.5], [0.6]];
        assert!(TcInputs::new(vec![], vec![], decreasing, vec![]).is_err());
        assert!(TcInputs::new(vec![], vec![], ok, vec![]).is_ok());
    }

    #[test]
    fn cluster_events_use_hydrographs() {
        let inputs = inputs([0.0; 6]);
        let config = TcConfig::default();
        let simulator = TcSimulator::new(&inputs, &config, 2, 2, 100).unwrap();
        let sequence = WeatherTypeSequence::from(vec![1, 1, 2]);
        let waves = vec![storm(1, 0, 2), storm(2, 2, 1)];

        let out = simulator
            .simulate(&sequence, &waves, &mut ChaCha8Rng::seed_from_u64(1))
            .unwrap();
        assert_eq!(out.waves, waves);
        assert_eq!(
            out.parameters[0],
            TcParameters { weather_type: 1, mu: 0.1, tau: 0.4, ss: 0.0 }
        );
        assert_eq!(out.parameters[1].ss, 0.0);
        assert!([0.2, 0.25].contains(&out.parameters[1].mu));
    }

    #[test]
    fn no_cyclone_keeps_waves() {
        // Every category has zero probability: always the terminal bin
        let inputs = inputs([0.0; 6]);
        let config = TcConfig::default();
        let simulator = TcSimulator::new(&inputs, &config, 2, 2, 100).unwrap();
        let waves = vec![storm(3, 0, 1)];

        let out = simulator
            .simulate(&WeatherTypeSequence::from(vec![3]), &waves, &mut ChaCha8Rng::seed_from_u64(2))
            .unwrap();
        assert_eq!(out.waves, waves);
        assert_eq!(out.parameters[0].tau, 0.5);
        assert_eq!(out.parameters[0].ss, 0.0);
        assert!([0.1, 0.2, 0.25].contains(&out.parameters[0].mu));
        assert_eq!(out.degenerate, 0);
    }

    #[test]
    fn entering_cyclone_replaces_sea_state() {
        // Category 1 (979, 1000] is certain: only the 990 hPa cyclone
        let inputs = inputs([0.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        let config = TcConfig::default();
        let simulator = TcSimulator::new(&inputs, &config, 2, 2, 100).unwrap();
        let waves = vec![storm(1, 0, 1), storm(3, 1, 2)];

        let out = simulator
            .simulate(
                &WeatherTypeSequence::from(vec![1, 3, 3]),
                &waves,
                &mut ChaCha8Rng::seed_from_u64(3),
            )
            .unwrap();
        assert_eq!(
            out.parameters[1],
            TcParameters { weather_type: 3, mu: 0.4, tau: 0.5, ss: 0.5 }
        );
        assert_eq!(
            out.waves[1].waves,
            vec![WaveState::new(4.0, 11.0, 120.0), WaveState::zero()]
        );
        // The input series is untouched
        assert_eq!(waves[1], storm(3, 1, 2));
        assert_eq!(out.waves[0], waves[0]);
    }

    #[test]
    fn empty_category_is_degenerate() {
        // Category 2 (964, 979] is certain but holds no cyclone
        let inputs = inputs([0.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
        let config = TcConfig::default();
        let simulator = TcSimulator::new(&inputs, &config, 2, 2, 100).unwrap();
        let waves = vec![storm(3, 0, 1), storm(1, 1, 1), storm(3, 2, 1)];

        let out = simulator
            .simulate(
                &WeatherTypeSequence::from(vec![3, 1, 3]),
                &waves,
                &mut ChaCha8Rng::seed_from_u64(4),
            )
            .unwrap();
        assert_eq!(out.degenerate, 2);
        assert_eq!(
            out.parameters[0],
            TcParameters { weather_type: 3, mu: 0.0, tau: 0.0, ss: 0.0 }
        );
        assert_eq!(out.waves, waves);
    }

    #[test]
    fn mismatched_storms_are_rejected() {
        let inputs = inputs([0.0; 6]);
        let config = TcConfig::default();
        let simulator = TcSimulator::new(&inputs, &config, 2, 2, 100).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let sequence = WeatherTypeSequence::from(vec![1, 2]);
        assert!(simulator.simulate(&sequence, &[storm(1, 0, 1)], &mut rng).is_err());
        assert!(simulator
            .simulate(&sequence, &[storm(1, 0, 1), storm(1, 1, 1)], &mut rng)
            .is_err());
    }

    #[test]
    fn unknown_cyclone_type_is_lookup_error() {
        let inputs = inputs([0.0; 6]);
        let config = TcConfig::default();
        let simulator = TcSimulator::new(&inputs, &config, 2, 2, 100).unwrap();
        let err = simulator
            .simulate(
                &WeatherTypeSequence::from(vec![4]),
                &[storm(4, 0, 1)],
                &mut ChaCha8Rng::seed_from_u64(6),
            )
            .unwrap_err();
        match err {
            EmulatorError::Simulation { weather_type, event, source } => {
                assert_eq!((weather_type, event), (4, 0));
                assert!(matches!(*source, EmulatorError::Lookup(_)));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn hydrograph_count_must_match_clusters() {
        let inputs = inputs([0.0; 6]);
        let config = TcConfig::default();
        assert!(TcSimulator::new(&inputs, &config, 3, 2, 100).is_err());
    }

    #[test]
    fn at_least_one_family_is_required() {
        let inputs = inputs([0.0; 6]);
        let config = TcConfig::default();
        assert!(matches!(
            TcSimulator::new(&inputs, &config, 2, 0, 100),
            Err(EmulatorError::InvalidInput(_))
        ));
    }

    /// Two cyclones in the (979, 1000] band, which is certain to be drawn.
    fn band_inputs(records: [TcRecord; 2]) -> TcInputs {
        TcInputs::new(
            vec![990.0, 985.0],
            records.to_vec(),
            array![[0.0], [1.0], [1.0], [1.0], [1.0], [1.0]],
            vec![
                vec![Hydrograph { mu: 0.1, tau: 0.4 }],
                vec![Hydrograph { mu: 0.2, tau: 0.6 }],
            ],
        )
        .unwrap()
    }

    #[test]
    fn invalid_cyclone_sea_states_are_resampled() {
        let bad = TcRecord { hs: f64::NAN, tp: -3.0, dir: 120.0, mu: 0.4, ss: 0.5 };
        let good = TcRecord { hs: 3.0, tp: 10.0, dir: 110.0, mu: 0.3, ss: 0.2 };
        let inputs = band_inputs([bad, good]);
        let config = TcConfig::default();
        let simulator = TcSimulator::new(&inputs, &config, 2, 2, 100).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        for _ in 0..20 {
            let out = simulator
                .simulate(&WeatherTypeSequence::from(vec![3]), &[storm(3, 0, 1)], &mut rng)
                .unwrap();
            assert_eq!(
                out.waves[0].waves,
                vec![WaveState::new(3.0, 10.0, 110.0), WaveState::zero()]
            );
            assert_eq!(
                out.parameters[0],
                TcParameters { weather_type: 3, mu: 0.3, tau: 0.5, ss: 0.2 }
            );
        }
    }

    #[test]
    fn only_invalid_sea_states_hit_the_resample_limit() {
        let bad = TcRecord { hs: -1.0, tp: 9.0, dir: 100.0, mu: 0.4, ss: 0.5 };
        let inputs = band_inputs([bad, TcRecord { hs: f64::NAN, ..bad }]);
        let config = TcConfig::default();
        let simulator = TcSimulator::new(&inputs, &config, 2, 2, 30).unwrap();

        let err = simulator
            .simulate(
                &WeatherTypeSequence::from(vec![3]),
                &[storm(3, 0, 1)],
                &mut ChaCha8Rng::seed_from_u64(8),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EmulatorError::ResampleLimit { weather_type: 3, event: 0, attempts: 30, chromosome: None }
        ));
    }

    #[test]
    fn invalid_hydrographs_are_resampled() {
        let inputs = TcInputs::new(
            vec![],
            vec![],
            Array2::zeros((6, 1)),
            vec![
                vec![Hydrograph { mu: f64::NAN, tau: 0.4 }, Hydrograph { mu: 0.3, tau: 0.2 }],
                vec![Hydrograph { mu: 0.2, tau: -0.6 }, Hydrograph { mu: 0.25, tau: 0.7 }],
            ],
        )
        .unwrap();
        let config = TcConfig::default();
        let simulator = TcSimulator::new(&inputs, &config, 2, 2, 100).unwrap();
        let sequence = WeatherTypeSequence::from(vec![1, 2, 1, 2]);
        let waves = vec![storm(1, 0, 1), storm(2, 1, 1), storm(1, 2, 1), storm(2, 3, 1)];

        let out = simulator
            .simulate(&sequence, &waves, &mut ChaCha8Rng::seed_from_u64(9))
            .unwrap();
        for params in &out.parameters {
            let expected = if params.weather_type == 1 { (0.3, 0.2) } else { (0.25, 0.7) };
            assert_eq!((params.mu, params.tau, params.ss), (expected.0, expected.1, 0.0));
        }
    }

    #[test]
    fn negative_hydrographs_hit_the_resample_limit() {
        let inputs = TcInputs::new(
            vec![],
            vec![],
            Array2::zeros((6, 1)),
            vec![
                vec![Hydrograph { mu: -0.1, tau: 0.4 }],
                vec![Hydrograph { mu: -0.2, tau: -0.6 }],
            ],
        )
        .unwrap();
        let config = TcConfig::default();
        let simulator = TcSimulator::new(&inputs, &config, 2, 2, 50).unwrap();

        let err = simulator
            .simulate(
                &WeatherTypeSequence::from(vec![1, 2]),
                &[storm(1, 0, 1), storm(2, 1, 1)],
                &mut ChaCha8Rng::seed_from_u64(10),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EmulatorError::ResampleLimit { weather_type: 1, event: 0, attempts: 50, .. }
        ));
    }
}
