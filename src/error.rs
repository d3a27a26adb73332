use ndarray_linalg::error::LinalgError;
use thiserror::Error;

/// Conditions under which the estimator refuses to touch its state.
///
/// Every variant is local to a single call: the caller can drop the offending measurement or
/// prior and carry on with the estimator exactly as it was before the failed call.
#[derive(Debug, Error)]
pub enum EstimationError {
    #[error("{what} has shape {found:?}, expected {expected:?}")]
    DimensionMismatch {
        what: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("prior contains non-finite values")]
    NonFinitePrior,
    #[error("covariance is not symmetric (largest asymmetry {asymmetry:e})")]
    AsymmetricCovariance { asymmetry: f64 },
    #[error("covariance is not positive semi-definite (smallest eigenvalue {min_eigenvalue:e})")]
    IndefiniteCovariance { min_eigenvalue: f64 },
    #[error("noise variance must be positive and finite, got {0}")]
    NonPositiveNoise(f64),
    #[error("singular innovation covariance ({0:e})")]
    SingularInnovation(f64),
    #[error("innovation covariance overflowed ({0})")]
    NonFiniteInnovation(f64),
    #[error("measurement ({current}, {voltage}) is not finite")]
    NonFiniteMeasurement { current: f64, voltage: f64 },
    #[error("measurement {index} rejected: {source}")]
    Rejected {
        index: usize,
        #[source]
        source: Box<EstimationError>,
    },
    #[error(transparent)]
    Linalg(#[from] LinalgError),
}
