//! Annual maxima of simulated total water level.

use stormclim_components::components::SimulatedStorm;
use stormclim_core::errors::{EmulatorError, EmulatorResult};

/// Mean length of a calendar year in days.
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Largest storm TWL of every year spanned by a simulation.
///
/// A storm belongs to the year in which it starts, counting years of
/// `days_per_year` days from day 0. Years without any storm are NaN.
pub fn annual_maxima(
    storms: &[SimulatedStorm],
    coefficient: f64,
    days_per_year: f64,
) -> EmulatorResult<Vec<f64>> {
    if !(days_per_year.is_finite() && days_per_year > 0.0) {
        return Err(EmulatorError::InvalidInput(format!(
            "Days per year must be positive, got {}",
            days_per_year
        )));
    }
    let year_of = |storm: &SimulatedStorm| (storm.event.start_day as f64 / days_per_year).floor() as usize;
    let n_years = storms.iter().map(|s| year_of(s) + 1).max().unwrap_or(0);

    let mut maxima = vec![f64::NAN; n_years];
    for storm in storms {
        let slot = &mut maxima[year_of(storm)];
        let twl = storm.twl(coefficient);
        if slot.is_nan() || twl > *slot {
            *slot = twl;
        }
    }
    Ok(maxima)
}
