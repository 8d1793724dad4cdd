//! Fit, persist and run the emulator.

use log::{info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use stormclim_components::components::{
    SimulatedStorm, TcInputs, TcRealization, TcSimulator, TcWavePool, WaveSimulator,
};
use stormclim_core::errors::{EmulatorError, EmulatorResult};
use stormclim_core::series::{HistoricalRecord, WeatherTypeSequence};
use stormclim_core::{EmulatorConfig, FittedParameters};

/// Outcome of a batch of realizations, one entry per input sequence.
///
/// A failing realization does not stop the others.
pub type Realizations<T> = Vec<EmulatorResult<T>>;

/// The emulator: a configuration and, once fitted, its parameters.
#[derive(Debug, Clone)]
pub struct EmulatorState {
    config: EmulatorConfig,
    fitted: Option<FittedParameters>,
}

impl EmulatorState {
    pub fn new(config: EmulatorConfig) -> EmulatorResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            fitted: None,
        })
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    pub fn fitted(&self) -> EmulatorResult<&FittedParameters> {
        self.fitted
            .as_ref()
            .ok_or_else(|| EmulatorError::Lookup("The emulator has not been fitted".to_string()))
    }

    /// Fit every parameter table to a historical record.
    ///
    /// The state is only updated when every stage succeeds.
    pub fn fit(&mut self, record: &HistoricalRecord) -> EmulatorResult<&FittedParameters> {
        info!("Fitting the emulator to {} time steps", record.clusters.len());
        let fitted = FittedParameters::fit(record, &self.config)?;
        Ok(&*self.fitted.insert(fitted))
    }

    /// Write the fitted parameters with bincode.
    pub fn write_to<W: Write>(&self, writer: W) -> EmulatorResult<()> {
        bincode::serialize_into(writer, self.fitted()?)
            .map_err(|e| EmulatorError::Persistence(e.to_string()))
    }

    /// Read fitted parameters written by [`EmulatorState::write_to`].
    ///
    /// `config` drives subsequent simulations and must name the same wave
    /// families as the stored fit.
    pub fn read_from<R: Read>(reader: R, config: EmulatorConfig) -> EmulatorResult<Self> {
        config.validate()?;
        let fitted: FittedParameters = bincode::deserialize_from(reader)
            .map_err(|e| EmulatorError::Persistence(e.to_string()))?;
        if fitted.families != config.families {
            return Err(EmulatorError::Persistence(format!(
                "Stored fit has families {:?} but the configuration has {:?}",
                fitted.families, config.families
            )));
        }
        Ok(Self {
            config,
            fitted: Some(fitted),
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> EmulatorResult<()> {
        let file = File::create(path.as_ref()).map_err(|e| {
            EmulatorError::Persistence(format!("Cannot create {}: {}", path.as_ref().display(), e))
        })?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer
            .flush()
            .map_err(|e| EmulatorError::Persistence(e.to_string()))?;
        info!("Saved fitted parameters to {}", path.as_ref().display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P, config: EmulatorConfig) -> EmulatorResult<Self> {
        let file = File::open(path.as_ref()).map_err(|e| {
            EmulatorError::Persistence(format!("Cannot open {}: {}", path.as_ref().display(), e))
        })?;
        let state = Self::read_from(BufReader::new(file), config)?;
        info!("Loaded fitted parameters from {}", path.as_ref().display());
        Ok(state)
    }

    /// Base seed of a batch: the configured one, or a fresh random seed.
    fn batch_seed(&self) -> u64 {
        self.config
            .seed
            .unwrap_or_else(|| rand::thread_rng().gen())
    }

    /// Simulate storm waves for every weather-type sequence in parallel.
    ///
    /// Realization `i` uses a generator seeded with `seed + i`, so results do
    /// not depend on scheduling.
    pub fn simulate_waves(
        &self,
        sequences: &[WeatherTypeSequence],
        tc_pool: &TcWavePool,
    ) -> EmulatorResult<Realizations<Vec<SimulatedStorm>>> {
        let simulator = WaveSimulator::new(self.fitted()?, &self.config)?;
        let seed = self.batch_seed();
        info!(
            "Simulating waves for {} realizations (seed {})",
            sequences.len(),
            seed
        );

        let results: Realizations<Vec<SimulatedStorm>> = sequences
            .par_iter()
            .enumerate()
            .map(|(i, sequence)| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(i as u64));
                simulator.simulate(sequence, tc_pool, &mut rng)
            })
            .collect();
        report_failures("Wave", &results);
        Ok(results)
    }

    /// Simulate tropical-cyclone parameters for every realization in
    /// parallel, updating the matching wave simulations.
    pub fn simulate_tcs(
        &self,
        sequences: &[WeatherTypeSequence],
        waves: &[Vec<SimulatedStorm>],
        inputs: &TcInputs,
    ) -> EmulatorResult<Realizations<TcRealization>> {
        if sequences.len() != waves.len() {
            return Err(EmulatorError::InvalidInput(format!(
                "Got {} sequences but {} wave simulations",
                sequences.len(),
                waves.len()
            )));
        }
        let fitted = self.fitted()?;
        let simulator = TcSimulator::new(
            inputs,
            &self.config.tc,
            fitted.n_clusters,
            fitted.n_families(),
            self.config.max_resample_attempts,
        )?;
        let seed = self.batch_seed();
        info!(
            "Simulating tropical cyclones for {} realizations (seed {})",
            sequences.len(),
            seed
        );

        let results: Realizations<TcRealization> = sequences
            .par_iter()
            .zip(waves.par_iter())
            .enumerate()
            .map(|(i, (sequence, storms))| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(i as u64));
                simulator.simulate(sequence, storms, &mut rng)
            })
            .collect();

        let degenerate: usize = results
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .map(|r| r.degenerate)
            .sum();
        if degenerate > 0 {
            warn!(
                "{} cyclone event(s) had no historical cyclone in their category",
                degenerate
            );
        }
        report_failures("Tropical cyclone", &results);
        Ok(results)
    }
}

fn report_failures<T>(kind: &str, results: &Realizations<T>) {
    for (i, result) in results.iter().enumerate() {
        if let Err(e) = result {
            warn!("{} realization {} failed: {}", kind, i, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfitted_state() {
        let state = EmulatorState::new(EmulatorConfig::default()).unwrap();
        assert!(!state.is_fitted());
        assert!(matches!(state.fitted(), Err(EmulatorError::Lookup(_))));
        assert!(state.write_to(Vec::new()).is_err());
        assert!(state
            .simulate_waves(&[WeatherTypeSequence::from(vec![1])], &TcWavePool::new())
            .is_err());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EmulatorConfig {
            families: vec![],
            ..Default::default()
        };
        assert!(matches!(
            EmulatorState::new(config),
            Err(EmulatorError::Config(_))
        ));
    }

    #[test]
    fn garbage_is_a_persistence_error() {
        let err = EmulatorState::read_from(&[1u8, 2, 3][..], EmulatorConfig::default()).unwrap_err();
        assert!(matches!(err, EmulatorError::Persistence(_)));
    }

    #[test]
    fn configured_seed_is_used() {
        let state = EmulatorState::new(EmulatorConfig {
            seed: Some(11),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(state.batch_seed(), 11);
    }
}
