//! One-shot least-squares solutions, used as a reference for the recursive estimator
use ndarray::{Array1, Array2};
use ndarray_linalg::Inverse;

use crate::math::observation_matrix;
use crate::measurement::Dataset;
use crate::EstimationError;

/// The parameter vector and covariance of a one-shot least-squares solve
#[derive(Clone, Debug, PartialEq)]
pub struct BatchSolution {
    /// `(resistance, offset)`
    pub estimate: Array1<f64>,
    /// Covariance of `estimate`, in units of the noise variance for [`least_squares`]
    pub covariance: Array2<f64>,
}

impl BatchSolution {
    #[must_use]
    pub fn resistance(&self) -> f64 {
        self.estimate[0]
    }

    #[must_use]
    pub fn offset(&self) -> f64 {
        self.estimate[1]
    }
}

fn distinct_currents(dataset: &Dataset) -> usize {
    let mut currents = dataset.currents();
    currents.sort_by(f64::total_cmp);
    currents.dedup();
    currents.len()
}

/// Ordinary least squares through the normal equations
///
/// Solves $x = (A^T A)^{-1} A^T V$ where the rows of $A$ are the observation rows `[I_k, 1]`. The
/// returned covariance is $(A^T A)^{-1}$, to be scaled by the noise variance.
///
/// # Errors
/// Returns an error if the dataset holds fewer than two distinct currents, in which case the
/// slope is undetermined and $A^T A$ is singular.
pub fn least_squares(dataset: &Dataset) -> Result<BatchSolution, EstimationError> {
    let distinct = distinct_currents(dataset);
    if distinct < 2 {
        return Err(EstimationError::DimensionMismatch {
            what: "distinct currents",
            expected: (2, 1),
            found: (distinct, 1),
        });
    }

    let a = observation_matrix(&dataset.currents());
    let v = Array1::from(dataset.voltages());

    let normal = a.t().dot(&a);
    let covariance = normal.inv()?;
    let estimate = covariance.dot(&a.t().dot(&v));

    Ok(BatchSolution {
        estimate,
        covariance,
    })
}

/// Least squares with a Gaussian prior, in information form
///
/// The prior enters as a pseudo-observation, so the solution
///
/// $$
///     x = \left(P_0^{-1} + A^T A / \sigma^2\right)^{-1}
///         \left(P_0^{-1} x_0 + A^T V / \sigma^2\right)
/// $$
///
/// is exactly the state the recursive estimator reaches after consuming every measurement of
/// `dataset`, in any order.
///
/// # Errors
/// Returns an error if the prior has the wrong shape or a singular covariance, or if
/// `noise_variance` is not strictly positive.
pub fn least_squares_with_prior(
    dataset: &Dataset,
    prior_mean: &Array1<f64>,
    prior_covariance: &Array2<f64>,
    noise_variance: f64,
) -> Result<BatchSolution, EstimationError> {
    if prior_mean.len() != 2 {
        return Err(EstimationError::DimensionMismatch {
            what: "prior mean",
            expected: (2, 1),
            found: (prior_mean.len(), 1),
        });
    }
    if prior_covariance.dim() != (2, 2) {
        return Err(EstimationError::DimensionMismatch {
            what: "prior covariance",
            expected: (2, 2),
            found: prior_covariance.dim(),
        });
    }
    if !(noise_variance.is_finite() && noise_variance > 0.0) {
        return Err(EstimationError::NonPositiveNoise(noise_variance));
    }

    let a = observation_matrix(&dataset.currents());
    let v = Array1::from(dataset.voltages());

    let prior_information = prior_covariance.inv()?;
    let information = &prior_information + &(a.t().dot(&a) / noise_variance);
    let covariance = information.inv()?;
    let estimate =
        covariance.dot(&(prior_information.dot(prior_mean) + a.t().dot(&v) / noise_variance));

    Ok(BatchSolution {
        estimate,
        covariance,
    })
}

#[cfg(test)]
mod tests {
    use ndarray::{arr1, arr2, Array1};
    use ndarray_rand::rand::{Rng, SeedableRng};
    use rand_isaac::Isaac64Rng;

    use super::{least_squares, least_squares_with_prior};
    use crate::measurement::Dataset;
    use crate::{EstimationError, RecursiveEstimator, Result};

    fn reference_dataset() -> Dataset {
        Dataset::from_columns(&[0.2, 0.3, 0.4, 0.5, 0.6], &[1.23, 1.38, 2.06, 2.47, 3.17])
            .unwrap()
    }

    #[test]
    fn ordinary_least_squares_matches_tabulated_line() -> Result<()> {
        let solution = least_squares(&reference_dataset())?;

        approx::assert_relative_eq!(solution.resistance(), 4.97, max_relative = 1e-10);
        approx::assert_relative_eq!(solution.offset(), 0.074, max_relative = 1e-8);
        Ok(())
    }

    #[test]
    fn noiseless_lines_are_recovered_exactly() -> Result<()> {
        let seed = 40;
        let mut rng = Isaac64Rng::seed_from_u64(seed);
        let resistance: f64 = rng.gen_range(1.0..100.0);
        let offset: f64 = rng.gen_range(-1.0..1.0);

        let currents = (0..20).map(|_| rng.gen_range(0.0..2.0)).collect::<Vec<f64>>();
        let voltages = currents
            .iter()
            .map(|current| resistance * current + offset)
            .collect::<Vec<_>>();
        let solution = least_squares(&Dataset::from_columns(&currents, &voltages)?)?;

        approx::assert_relative_eq!(solution.resistance(), resistance, max_relative = 1e-9);
        approx::assert_abs_diff_eq!(solution.offset(), offset, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn a_single_distinct_current_is_rejected() -> Result<()> {
        let dataset = Dataset::from_columns(&[0.3, 0.3, 0.3], &[1.3, 1.4, 1.5])?;
        assert!(matches!(
            least_squares(&dataset),
            Err(EstimationError::DimensionMismatch { found: (1, 1), .. })
        ));
        Ok(())
    }

    #[test]
    fn solution_with_prior_matches_recursive_estimate() -> Result<()> {
        let dataset = reference_dataset();
        let prior_mean = arr1(&[4.0, 0.0]);
        let prior_covariance = arr2(&[[9.0, 0.0], [0.0, 0.2]]);
        let noise_variance = 0.0225;

        let batch =
            least_squares_with_prior(&dataset, &prior_mean, &prior_covariance, noise_variance)?;

        let mut estimator = RecursiveEstimator::initialize(prior_mean, prior_covariance)?;
        estimator.process(&dataset, noise_variance)?;

        for (expected, actual) in batch.estimate.iter().zip(estimator.estimate()) {
            approx::assert_relative_eq!(expected, actual, max_relative = 1e-10);
        }
        for (expected, actual) in batch.covariance.iter().zip(estimator.covariance()) {
            approx::assert_relative_eq!(expected, actual, max_relative = 1e-8);
        }
        Ok(())
    }

    #[test]
    fn an_empty_dataset_returns_the_prior() -> Result<()> {
        let prior_mean = arr1(&[4.0, 0.0]);
        let prior_covariance = arr2(&[[9.0, 0.0], [0.0, 0.2]]);

        let batch =
            least_squares_with_prior(&Dataset::default(), &prior_mean, &prior_covariance, 1.0)?;

        for (expected, actual) in prior_mean.iter().zip(&batch.estimate) {
            approx::assert_abs_diff_eq!(expected, actual, epsilon = 1e-12);
        }
        Ok(())
    }

    #[test]
    fn non_positive_noise_is_rejected() {
        let result = least_squares_with_prior(
            &reference_dataset(),
            &Array1::zeros(2),
            &arr2(&[[1.0, 0.0], [0.0, 1.0]]),
            0.0,
        );
        assert!(matches!(result, Err(EstimationError::NonPositiveNoise(_))));
    }
}
