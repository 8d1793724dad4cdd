//! Emulator configuration
//!
//! All tunables of the fitting and simulation stages live here. Every struct
//! uses `#[serde(default)]` so a configuration file only has to name the values
//! it overrides:
//!
//! ```toml
//! families = ["sea", "swell_1", "swell_2"]
//! seed = 42
//!
//! [gev]
//! gumbel_threshold = 1.92
//!
//! [tc]
//! tau = 0.5
//! ```

use crate::errors::{EmulatorError, EmulatorResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which GEV shape parameter a consumer evaluates the distribution with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeSource {
    /// The per-cluster maximum-likelihood shape.
    #[default]
    Raw,
    /// The shape after smoothing across neighbouring cluster centroids.
    Smoothed,
}

/// Settings for the GEV maximum-likelihood fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GevConfig {
    /// Interval the shape parameter is constrained to during optimisation.
    ///
    /// Default: (-0.5, 1.0)
    pub shape_bounds: (f64, f64),
    /// Maximum number of Nelder-Mead iterations.
    ///
    /// Default: 5000
    pub max_iterations: usize,
    /// Convergence tolerance on the spread of simplex objective values.
    ///
    /// Default: 1e-10
    pub tolerance: f64,
    /// Minimum negative log-likelihood improvement over a Gumbel fit for a
    /// Fréchet (positive shape) GEV to be retained.
    ///
    /// This is half the 95% quantile of a chi-squared distribution with one
    /// degree of freedom.
    ///
    /// Default: 1.92
    pub gumbel_threshold: f64,
}

impl Default for GevConfig {
    fn default() -> Self {
        Self {
            shape_bounds: (-0.5, 1.0),
            max_iterations: 5000,
            tolerance: 1e-10,
            gumbel_threshold: 1.92,
        }
    }
}

/// Settings for smoothing the GEV shape across cluster centroids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Number of nearest centroids (the cluster itself included) averaged.
    ///
    /// Default: 4
    pub n_neighbours: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self { n_neighbours: 4 }
    }
}

/// Settings for the tropical-cyclone simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcConfig {
    /// Hydrograph tau assigned to tropical-cyclone weather types.
    ///
    /// Default: 0.5
    pub tau: f64,
    /// Minimum-pressure edges (hPa, descending) separating the six
    /// tropical-cyclone categories.
    ///
    /// Default: [1000, 979, 964, 944, 920]
    pub pressure_edges: [f64; 5],
}

impl Default for TcConfig {
    fn default() -> Self {
        Self {
            tau: 0.5,
            pressure_edges: [1000.0, 979.0, 964.0, 944.0, 920.0],
        }
    }
}

/// Top level emulator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// Wave family names, in the order their columns are stored.
    ///
    /// Default: ["sea", "swell_1", "swell_2"]
    pub families: Vec<String>,
    /// Exact-match chromosome pools smaller than this use the relaxed pool.
    ///
    /// Default: 20
    pub min_chromosome_samples: usize,
    /// Uniform values at or above 1 are clipped to this before the normal
    /// inverse CDF is applied.
    ///
    /// Default: 0.999999
    pub uniform_clip: f64,
    /// Cap on rejection-sampling attempts for a single storm event.
    ///
    /// Default: 10000
    pub max_resample_attempts: usize,
    /// Shape used when normalising historical peaks for correlation.
    pub correlation_shape: ShapeSource,
    /// Shape used when inverting simulated probabilities.
    pub simulation_shape: ShapeSource,
    /// Base seed for the per-realization random generators.
    ///
    /// When unset a seed is drawn once per simulation batch.
    pub seed: Option<u64>,
    /// Coefficient of the total water level proxy `c * sqrt(Hs * L0)`.
    ///
    /// Default: 0.043
    pub twl_coefficient: f64,
    pub gev: GevConfig,
    pub smoothing: SmoothingConfig,
    pub tc: TcConfig,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            families: vec!["sea".into(), "swell_1".into(), "swell_2".into()],
            min_chromosome_samples: 20,
            uniform_clip: 0.999999,
            max_resample_attempts: 10_000,
            correlation_shape: ShapeSource::Raw,
            simulation_shape: ShapeSource::Raw,
            seed: None,
            twl_coefficient: 0.043,
            gev: GevConfig::default(),
            smoothing: SmoothingConfig::default(),
            tc: TcConfig::default(),
        }
    }
}

impl EmulatorConfig {
    /// Parse and validate a TOML configuration.
    pub fn from_toml_str(text: &str) -> EmulatorResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| EmulatorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> EmulatorResult<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            EmulatorError::Config(format!(
                "Failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn n_families(&self) -> usize {
        self.families.len()
    }

    /// Names of the GEV fit targets: `<family>_Hs`, `<family>_Tp` per family.
    pub fn gev_variables(&self) -> Vec<String> {
        self.families
            .iter()
            .flat_map(|f| [format!("{}_Hs", f), format!("{}_Tp", f)])
            .collect()
    }

    pub fn validate(&self) -> EmulatorResult<()> {
        if self.families.is_empty() || self.families.len() > crate::chromosome::MAX_FAMILIES {
            return Err(EmulatorError::Config(format!(
                "Between 1 and {} wave families are supported, got {}",
                crate::chromosome::MAX_FAMILIES,
                self.families.len()
            )));
        }
        if self.min_chromosome_samples == 0 {
            return Err(EmulatorError::Config(
                "min_chromosome_samples must be at least 1".to_string(),
            ));
        }
        if !(self.uniform_clip > 0.0 && self.uniform_clip < 1.0) {
            return Err(EmulatorError::Config(format!(
                "uniform_clip must lie in (0, 1), got {}",
                self.uniform_clip
            )));
        }
        if self.max_resample_attempts == 0 {
            return Err(EmulatorError::Config(
                "max_resample_attempts must be at least 1".to_string(),
            ));
        }
        if !(self.twl_coefficient.is_finite() && self.twl_coefficient > 0.0) {
            return Err(EmulatorError::Config(format!(
                "twl_coefficient must be positive, got {}",
                self.twl_coefficient
            )));
        }
        let (lo, hi) = self.gev.shape_bounds;
        if !(lo < 0.0 && hi > 0.0) {
            return Err(EmulatorError::Config(format!(
                "gev.shape_bounds must bracket zero, got ({}, {})",
                lo, hi
            )));
        }
        if self.gev.max_iterations == 0 || self.gev.tolerance <= 0.0 {
            return Err(EmulatorError::Config(
                "gev.max_iterations and gev.tolerance must be positive".to_string(),
            ));
        }
        if self.smoothing.n_neighbours == 0 {
            return Err(EmulatorError::Config(
                "smoothing.n_neighbours must be at least 1".to_string(),
            ));
        }
        if self.tc.tau < 0.0 {
            return Err(EmulatorError::Config(format!(
                "tc.tau must be non-negative, got {}",
                self.tc.tau
            )));
        }
        if self.tc.pressure_edges.windows(2).any(|w| w[0] <= w[1]) {
            return Err(EmulatorError::Config(
                "tc.pressure_edges must be strictly descending".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EmulatorConfig::default();
        config.validate().unwrap();
        assert_eq!(config.n_families(), 3);
        assert_eq!(config.min_chromosome_samples, 20);
        assert_eq!(config.correlation_shape, ShapeSource::Raw);
        assert_eq!(config.simulation_shape, ShapeSource::Raw);
    }

    #[test]
    fn gev_variable_names() {
        let config = EmulatorConfig::default();
        assert_eq!(
            config.gev_variables(),
            vec!["sea_Hs", "sea_Tp", "swell_1_Hs", "swell_1_Tp", "swell_2_Hs", "swell_2_Tp"]
        );
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EmulatorConfig::from_toml_str(
            r#"
            families = ["sea", "swell"]
            seed = 7
            simulation_shape = "smoothed"

            [tc]
            tau = 0.25
            "#,
        )
        .unwrap();

        assert_eq!(config.families, vec!["sea", "swell"]);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.simulation_shape, ShapeSource::Smoothed);
        assert_eq!(config.tc.tau, 0.25);
        assert_eq!(config.tc.pressure_edges, TcConfig::default().pressure_edges);
        assert_eq!(config.gev, GevConfig::default());
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(EmulatorConfig::from_toml_str("families = []").is_err());
        assert!(EmulatorConfig::from_toml_str("uniform_clip = 1.0").is_err());
        assert!(EmulatorConfig::from_toml_str("max_resample_attempts = 0").is_err());
        assert!(
            EmulatorConfig::from_toml_str("[tc]\npressure_edges = [900.0, 979.0, 964.0, 944.0, 920.0]")
                .is_err()
        );
        assert!(EmulatorConfig::from_toml_str("not valid toml =").is_err());
    }

    #[test]
    fn toml_round_trip() {
        let mut config = EmulatorConfig::default();
        config.seed = Some(11);
        let text = toml::to_string(&config).unwrap();
        let parsed = EmulatorConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
