use log::{debug, info, warn};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::math::{asymmetry, min_eigenvalue, outer_product};
use crate::measurement::{Dataset, Measurement};
use crate::EstimationError;

type EstimationResult<T> = ::std::result::Result<T, EstimationError>;

/// Number of parameters in the model: the resistance and the voltage offset
const NUM_PARAMETERS: usize = 2;

/// Numerical thresholds used to judge priors and innovations
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EstimatorSettings {
    /// Largest tolerated difference between mirrored elements of the prior covariance, and
    /// largest tolerated negative eigenvalue, relative to the largest element of the covariance
    pub symmetry_tolerance: f64,
    /// Innovation covariances at or below this value are treated as singular
    pub innovation_tolerance: f64,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            symmetry_tolerance: 1e-9,
            innovation_tolerance: 1e-12,
        }
    }
}

/// The state of the estimator after a step
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    /// The parameter vector `(resistance, offset)`
    pub estimate: Array1<f64>,
    /// The covariance of `estimate`
    pub covariance: Array2<f64>,
}

impl Snapshot {
    #[must_use]
    pub fn resistance(&self) -> f64 {
        self.estimate[0]
    }

    #[must_use]
    pub fn offset(&self) -> f64 {
        self.estimate[1]
    }

    /// The diagonal of the covariance, `(var(resistance), var(offset))`
    #[must_use]
    pub fn variances(&self) -> (f64, f64) {
        (self.covariance[[0, 0]], self.covariance[[1, 1]])
    }
}

/// Recursive least-squares estimator for the model `V = R I + b`
///
/// The estimator owns the current parameter vector, its covariance and the history of both. A
/// value only exists once a valid prior has been supplied through
/// [`RecursiveEstimator::initialize`], and every successful [`RecursiveEstimator::update`] appends
/// one [`Snapshot`] to the history. Failed updates leave the estimator untouched.
///
/// No process noise is injected between updates, so the covariance never grows and the final
/// estimate coincides with the batch least-squares solution that uses the prior as a
/// pseudo-observation.
///
/// The covariance update is the plain `(I - K H) P` form. It is neither symmetrised nor written in
/// Joseph form, so rounding can erode symmetry over very long runs.
#[derive(Clone, Debug)]
pub struct RecursiveEstimator {
    estimate: Array1<f64>,
    covariance: Array2<f64>,
    history: Vec<Snapshot>,
    settings: EstimatorSettings,
}

impl RecursiveEstimator {
    /// Start an estimation run from a prior belief, using the default settings
    ///
    /// # Errors
    /// Returns an error if the prior has the wrong shape, or if the covariance is not symmetric
    /// positive semi-definite.
    pub fn initialize(
        prior_mean: Array1<f64>,
        prior_covariance: Array2<f64>,
    ) -> EstimationResult<Self> {
        Self::initialize_with(prior_mean, prior_covariance, EstimatorSettings::default())
    }

    /// Start an estimation run from a prior belief
    ///
    /// # Errors
    /// Returns an error if the prior has the wrong shape, or if the covariance is not symmetric
    /// positive semi-definite within the tolerance in `settings`.
    pub fn initialize_with(
        prior_mean: Array1<f64>,
        prior_covariance: Array2<f64>,
        settings: EstimatorSettings,
    ) -> EstimationResult<Self> {
        if prior_mean.len() != NUM_PARAMETERS {
            return Err(EstimationError::DimensionMismatch {
                what: "prior mean",
                expected: (NUM_PARAMETERS, 1),
                found: (prior_mean.len(), 1),
            });
        }
        if prior_covariance.dim() != (NUM_PARAMETERS, NUM_PARAMETERS) {
            return Err(EstimationError::DimensionMismatch {
                what: "prior covariance",
                expected: (NUM_PARAMETERS, NUM_PARAMETERS),
                found: prior_covariance.dim(),
            });
        }
        if prior_mean.iter().chain(prior_covariance.iter()).any(|v| !v.is_finite()) {
            return Err(EstimationError::NonFinitePrior);
        }

        let scale = prior_covariance
            .iter()
            .fold(0.0, |max: f64, v| max.max(v.abs()))
            .max(f64::MIN_POSITIVE);
        let tolerance = settings.symmetry_tolerance * scale;

        let asymmetry = asymmetry(&prior_covariance);
        if asymmetry > tolerance {
            return Err(EstimationError::AsymmetricCovariance { asymmetry });
        }
        let min_eigenvalue = min_eigenvalue(&prior_covariance)?;
        if min_eigenvalue < -tolerance {
            return Err(EstimationError::IndefiniteCovariance { min_eigenvalue });
        }

        info!(
            "initialised estimator at R = {}, b = {} with variances {:?}",
            prior_mean[0],
            prior_mean[1],
            prior_covariance.diag().to_vec()
        );

        let prior = Snapshot {
            estimate: prior_mean.clone(),
            covariance: prior_covariance.clone(),
        };
        Ok(Self {
            estimate: prior_mean,
            covariance: prior_covariance,
            history: vec![prior],
            settings,
        })
    }

    /// Fold a single measurement into the estimate
    ///
    /// With `H = [current, 1]` the step computes
    ///
    /// $$
    ///     S = H P H^T + \sigma^2, \quad K = P H^T S^{-1}, \quad r = V - H x,
    /// $$
    ///
    /// then sets $x \leftarrow x + K r$ and $P \leftarrow (I - K H) P$, in that order.
    ///
    /// # Errors
    /// Returns an error, without changing the estimator, if the measurement is not finite, if
    /// `noise_variance` is not strictly positive, or if the innovation covariance overflows or is
    /// negligible.
    pub fn update(
        &mut self,
        current: f64,
        voltage: f64,
        noise_variance: f64,
    ) -> EstimationResult<&Snapshot> {
        let measurement = Measurement::new(current, voltage);
        measurement.validate()?;
        if !(noise_variance.is_finite() && noise_variance > 0.0) {
            return Err(EstimationError::NonPositiveNoise(noise_variance));
        }

        let observation = measurement.observation_row();
        let covariance_observation = self.covariance.dot(&observation);
        let innovation_covariance = observation.dot(&covariance_observation) + noise_variance;
        if !innovation_covariance.is_finite() {
            return Err(EstimationError::NonFiniteInnovation(innovation_covariance));
        }
        if innovation_covariance <= self.settings.innovation_tolerance {
            return Err(EstimationError::SingularInnovation(innovation_covariance));
        }

        let gain = covariance_observation / innovation_covariance;
        let innovation = voltage - observation.dot(&self.estimate);

        let estimate = &self.estimate + &(&gain * innovation);
        let correction =
            Array2::<f64>::eye(NUM_PARAMETERS) - outer_product(gain.view(), observation.view());
        let covariance = correction.dot(&self.covariance);

        debug!(
            "step {}: I = {current}, V = {voltage}, innovation {innovation:.6}, gain {gain}, \
             estimate {estimate}",
            self.history.len()
        );

        self.estimate = estimate;
        self.covariance = covariance;
        self.history.push(Snapshot {
            estimate: self.estimate.clone(),
            covariance: self.covariance.clone(),
        });

        Ok(self.latest())
    }

    /// Fold a [`Measurement`] into the estimate
    ///
    /// # Errors
    /// As for [`RecursiveEstimator::update`].
    pub fn update_with(
        &mut self,
        measurement: &Measurement,
        noise_variance: f64,
    ) -> EstimationResult<&Snapshot> {
        self.update(measurement.current, measurement.voltage, noise_variance)
    }

    /// Feed every measurement of `dataset` to the estimator in order
    ///
    /// # Errors
    /// Stops at the first measurement the estimator rejects and reports its index. Every
    /// measurement before it has been applied.
    pub fn process(&mut self, dataset: &Dataset, noise_variance: f64) -> EstimationResult<()> {
        for (index, measurement) in dataset.iter().enumerate() {
            if let Err(source) = self.update_with(measurement, noise_variance) {
                warn!("rejected measurement {index} ({measurement:?}): {source}");
                return Err(EstimationError::Rejected {
                    index,
                    source: Box::new(source),
                });
            }
        }
        info!(
            "processed {} measurements, R = {:.4}, b = {:.4}",
            dataset.len(),
            self.resistance(),
            self.offset()
        );
        Ok(())
    }

    /// Every state of the run, the prior first
    ///
    /// Always holds one more entry than the number of measurements processed.
    #[must_use]
    pub fn history(&self) -> &[Snapshot] {
        &self.history
    }

    #[must_use]
    pub fn latest(&self) -> &Snapshot {
        // The history is seeded with the prior on construction
        &self.history[self.history.len() - 1]
    }

    #[must_use]
    pub const fn estimate(&self) -> &Array1<f64> {
        &self.estimate
    }

    #[must_use]
    pub const fn covariance(&self) -> &Array2<f64> {
        &self.covariance
    }

    #[must_use]
    pub fn resistance(&self) -> f64 {
        self.estimate[0]
    }

    #[must_use]
    pub fn offset(&self) -> f64 {
        self.estimate[1]
    }

    /// The voltage the current estimate predicts for `current`
    #[must_use]
    pub fn predict(&self, current: f64) -> f64 {
        Measurement::new(current, 0.0).predicted_by(&self.estimate)
    }

    #[must_use]
    pub fn measurements_processed(&self) -> usize {
        self.history.len() - 1
    }

    #[must_use]
    pub const fn settings(&self) -> &EstimatorSettings {
        &self.settings
    }
}
