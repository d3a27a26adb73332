use std::fs;
use std::path::Path;

use itertools::Itertools;
use log::debug;
use ndarray::{arr1, Array1};
use serde::Deserialize;

use crate::{EstimationError, Result};

/// A single reading of the resistor: the current driven through it and the voltage observed
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    pub current: f64,
    pub voltage: f64,
}

impl Measurement {
    #[must_use]
    pub const fn new(current: f64, voltage: f64) -> Self {
        Self { current, voltage }
    }

    /// The observation row `[I, 1]` relating `(resistance, offset)` to the predicted voltage
    #[must_use]
    pub fn observation_row(&self) -> Array1<f64> {
        arr1(&[self.current, 1.0])
    }

    /// The voltage predicted for this current by the parameter vector `estimate`
    #[must_use]
    pub fn predicted_by(&self, estimate: &Array1<f64>) -> f64 {
        self.observation_row().dot(estimate)
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), EstimationError> {
        if self.current.is_finite() && self.voltage.is_finite() {
            Ok(())
        } else {
            Err(EstimationError::NonFiniteMeasurement {
                current: self.current,
                voltage: self.voltage,
            })
        }
    }
}

/// An ordered, immutable sequence of measurements
///
/// The order is the order in which the estimator consumes the readings. Nothing in the crate
/// reorders a dataset in place, [`Dataset::permuted`] returns a fresh copy.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dataset {
    measurements: Vec<Measurement>,
}

#[derive(Deserialize)]
struct Row {
    current: f64,
    voltage: f64,
}

impl Dataset {
    /// Pair up a column of currents with a column of voltages
    ///
    /// # Errors
    /// Returns an error if the columns differ in length or contain non-finite values.
    pub fn from_columns(
        currents: &[f64],
        voltages: &[f64],
    ) -> std::result::Result<Self, EstimationError> {
        if currents.len() != voltages.len() {
            return Err(EstimationError::DimensionMismatch {
                what: "voltage column",
                expected: (currents.len(), 1),
                found: (voltages.len(), 1),
            });
        }

        currents
            .iter()
            .zip(voltages)
            .map(|(&current, &voltage)| {
                let measurement = Measurement::new(current, voltage);
                measurement.validate().map(|()| measurement)
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(|measurements| Self { measurements })
    }

    /// Create a `Dataset` from an on-disk representation
    ///
    /// The file is a headed csv with columns `current` and `voltage`.
    ///
    /// # Errors
    /// Returns an error if the file is missing, a row cannot be parsed or a value is not finite.
    pub fn from_csv_file(filepath: &Path) -> Result<Self> {
        if !filepath.exists() {
            return Err(format!("measurement file {} not found", filepath.display()).into());
        }

        let file = fs::read(filepath)?;
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(&file[..]);

        let mut measurements = vec![];
        for result in rdr.deserialize() {
            let record: Row = result?;
            let measurement = Measurement::new(record.current, record.voltage);
            measurement.validate()?;
            measurements.push(measurement);
        }
        debug!(
            "read {} measurements from {}",
            measurements.len(),
            filepath.display()
        );

        Ok(Self { measurements })
    }

    /// A copy of the dataset with measurement `order[k]` in position `k`
    ///
    /// # Errors
    /// Returns an error if `order` is not a permutation of `0..self.len()`.
    pub fn permuted(&self, order: &[usize]) -> std::result::Result<Self, EstimationError> {
        let is_permutation = order.len() == self.len()
            && order.iter().copied().sorted().eq(0..self.len());
        if !is_permutation {
            return Err(EstimationError::DimensionMismatch {
                what: "permutation",
                expected: (self.len(), 1),
                found: (order.len(), 1),
            });
        }

        Ok(Self {
            measurements: order.iter().map(|&ii| self.measurements[ii]).collect(),
        })
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Measurement> {
        self.measurements.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Measurement> {
        self.measurements.iter()
    }

    #[must_use]
    pub fn currents(&self) -> Vec<f64> {
        self.iter().map(|measurement| measurement.current).collect()
    }

    #[must_use]
    pub fn voltages(&self) -> Vec<f64> {
        self.iter().map(|measurement| measurement.voltage).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Measurement;
    type IntoIter = std::slice::Iter<'a, Measurement>;

    fn into_iter(self) -> Self::IntoIter {
        self.measurements.iter()
    }
}
