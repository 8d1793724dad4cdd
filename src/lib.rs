//! Weather-type driven climate emulator for extreme coastal sea states
//!
//! The emulator is fitted to a historical record that has been classified
//! into weather-type clusters. Each run of a cluster label is a storm; the
//! wave families at the storm's maximum total water level are described per
//! cluster by GEV marginals, chromosome (active family) probabilities and
//! rank correlations. The fitted parameters then drive Monte Carlo
//! simulation of storms, and of tropical-cyclone hydrographs and surges, along
//! simulated daily weather-type sequences.
//!
//! # Crates
//! - `stormclim-core`: data model, statistics and fitting
//! - `stormclim-components`: the wave and tropical-cyclone simulators
//! - `stormclim`: [`EmulatorState`](emulator::EmulatorState), persistence and
//!   parallel batches of realizations

pub mod emulator;
pub mod maxima;

pub use emulator::{EmulatorState, Realizations};
pub use stormclim_components::components::{
    Hydrograph, SimulatedStorm, TcInputs, TcParameters, TcRealization, TcRecord, TcWavePool,
};
pub use stormclim_core::{EmulatorConfig, EmulatorError, EmulatorResult, FittedParameters};
