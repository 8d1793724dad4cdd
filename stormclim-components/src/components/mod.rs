mod tropical;
mod waves;

pub use tropical::{Hydrograph, TcInputs, TcParameters, TcRealization, TcRecord, TcSimulator};
pub use waves::{SimulatedStorm, TcWavePool, WaveSimulator};

use stormclim_core::chromosome::ChromosomeId;
use stormclim_core::errors::{EmulatorError, EmulatorResult};

/// Uniform index into a non-empty pool.
pub(crate) fn pick<R: rand::Rng + ?Sized>(rng: &mut R, len: usize) -> usize {
    rng.gen_range(0..len)
}

/// Whether a simulated value may be stored: finite and non-negative.
pub(crate) fn is_admissible(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

/// Repeat `draw` until `accept` holds for its result, at most `max_attempts`
/// times.
///
/// Errors raised by `draw` end the loop immediately. Exhausting the attempts
/// gives [`EmulatorError::ResampleLimit`] naming the chromosome of the last
/// rejected draw.
pub(crate) fn sample_with_limit<T, D, A, C>(
    max_attempts: usize,
    weather_type: u32,
    event: usize,
    mut draw: D,
    accept: A,
    chromosome_of: C,
) -> EmulatorResult<T>
where
    D: FnMut() -> EmulatorResult<T>,
    A: Fn(&T) -> bool,
    C: Fn(&T) -> Option<ChromosomeId>,
{
    let mut chromosome = None;
    for _ in 0..max_attempts {
        let candidate = draw()?;
        if accept(&candidate) {
            return Ok(candidate);
        }
        chromosome = chromosome_of(&candidate);
    }
    Err(EmulatorError::ResampleLimit {
        weather_type,
        event,
        attempts: max_attempts,
        chromosome,
    })
}
