pub mod chromosome;
pub mod config;
pub mod correlation;
pub mod extremes;
pub mod fitted;
pub mod series;
pub mod stats;
pub mod storms;
pub mod utils;

pub mod errors;

pub use config::EmulatorConfig;
pub use errors::{EmulatorError, EmulatorResult};
pub use fitted::FittedParameters;
