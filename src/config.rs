use std::fs;
use std::path::Path;

use ndarray::{arr1, Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::estimator::EstimatorSettings;
use crate::Result;

/// Independent Gaussian priors on the resistance and the offset
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct Prior {
    /// Initial guess for the resistance in Ohm
    pub resistance: f64,
    /// Initial guess for the voltage offset in Volt
    pub offset: f64,
    pub resistance_variance: f64,
    pub offset_variance: f64,
}

impl Default for Prior {
    fn default() -> Self {
        Self {
            resistance: 4.0,
            offset: 0.0,
            resistance_variance: 9.0,
            offset_variance: 0.2,
        }
    }
}

/// Configuration of an estimation run
///
/// Read from a toml file of the form
///
/// ```toml
/// noise_variance = 0.0225
///
/// [prior]
/// resistance = 4.0
/// offset = 0.0
/// resistance_variance = 9.0
/// offset_variance = 0.2
/// ```
///
/// with an optional `[settings]` table overriding the [`EstimatorSettings`].
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct Config {
    /// Variance of the voltage measurement noise, the same for every reading
    pub noise_variance: f64,
    pub prior: Prior,
    #[serde(default)]
    pub settings: EstimatorSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            noise_variance: 0.0225,
            prior: Prior::default(),
            settings: EstimatorSettings::default(),
        }
    }
}

impl Config {
    /// Read a `Config` from the toml file at `path`
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or does not describe a valid configuration.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        log::debug!("read configuration from {}: {config:?}", path.display());
        Ok(config)
    }

    #[must_use]
    pub fn prior_mean(&self) -> Array1<f64> {
        arr1(&[self.prior.resistance, self.prior.offset])
    }

    /// The diagonal prior covariance, as the priors on resistance and offset are uncorrelated
    #[must_use]
    pub fn prior_covariance(&self) -> Array2<f64> {
        Array2::from_diag(&arr1(&[
            self.prior.resistance_variance,
            self.prior.offset_variance,
        ]))
    }
}
