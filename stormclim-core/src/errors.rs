use crate::chromosome::ChromosomeId;
use thiserror::Error;

/// Error type for fitting and simulation failures.
#[derive(Error, Debug)]
pub enum EmulatorError {
    /// A storm window or cluster has no usable samples.
    #[error("Missing data: {0}")]
    MissingData(String),
    /// GEV maximum-likelihood fit failed.
    #[error("GEV fit failed for cluster {cluster}, variable {variable}: {reason}")]
    Fitting {
        cluster: u32,
        variable: String,
        reason: String,
    },
    /// A bounded rejection-sampling loop ran out of attempts.
    #[error("Rejection sampling gave up after {attempts} attempts for weather type {weather_type} at storm event {event} (chromosome {chromosome:?})")]
    ResampleLimit {
        weather_type: u32,
        event: usize,
        attempts: usize,
        chromosome: Option<ChromosomeId>,
    },
    /// A chromosome, cluster or weather type has no fitted entry.
    #[error("Lookup failed: {0}")]
    Lookup(String),
    /// A per-event failure while simulating a realization.
    #[error("Simulation failed for weather type {weather_type} at storm event {event}: {source}")]
    Simulation {
        weather_type: u32,
        event: usize,
        #[source]
        source: Box<EmulatorError>,
    },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl EmulatorError {
    /// Attach the weather type and storm event index to a per-event failure.
    ///
    /// Errors that already carry this context are returned unchanged.
    pub fn at_event(self, weather_type: u32, event: usize) -> Self {
        match self {
            EmulatorError::ResampleLimit { .. } | EmulatorError::Simulation { .. } => self,
            other => EmulatorError::Simulation {
                weather_type,
                event,
                source: Box::new(other),
            },
        }
    }
}

/// Convenience type for `Result<T, EmulatorError>`.
pub type EmulatorResult<T> = Result<T, EmulatorError>;
