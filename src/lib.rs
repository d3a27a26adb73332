#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// #![warn(clippy::cargo)]

extern crate blas_src;

pub mod batch;
pub mod config;
pub mod error;
pub mod estimator;
pub mod history;
pub mod math;
pub mod measurement;

pub use error::EstimationError;
pub use estimator::{EstimatorSettings, RecursiveEstimator, Snapshot};
pub use measurement::{Dataset, Measurement};

pub type Result<T> = ::std::result::Result<T, Box<dyn ::std::error::Error>>;
