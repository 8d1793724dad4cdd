//! Monte Carlo simulators of the storm-climate emulator
//!
//! Both simulators consume a fitted parameter bundle read-only and a daily
//! weather-type sequence. Runs of identical weather types are storm events:
//! - [`WaveSimulator`](components::WaveSimulator): wave conditions of every
//!   event from the fitted chromosome probabilities, rank correlations and
//!   marginal distributions
//! - [`TcSimulator`](components::TcSimulator): hydrograph and surge
//!   parameters, replacing the waves of events where a tropical cyclone
//!   enters
//!
//! Randomness comes from a caller supplied generator so realizations can be
//! reproduced from a seed.

pub mod components;
