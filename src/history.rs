//! Flat, serialisable rows of an estimation history for external plotting tools
use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::estimator::Snapshot;
use crate::Result;

/// One step of the estimation history, flattened for tabular output
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HistoryRow {
    /// Zero for the prior, `k` after the `k`th measurement
    pub step: usize,
    pub resistance: f64,
    pub offset: f64,
    pub resistance_variance: f64,
    pub offset_variance: f64,
    /// The off-diagonal element `P[0][1]` of the covariance
    pub covariance: f64,
}

impl HistoryRow {
    fn from_snapshot(step: usize, snapshot: &Snapshot) -> Self {
        let (resistance_variance, offset_variance) = snapshot.variances();
        Self {
            step,
            resistance: snapshot.resistance(),
            offset: snapshot.offset(),
            resistance_variance,
            offset_variance,
            covariance: snapshot.covariance[[0, 1]],
        }
    }
}

/// Flatten a history into rows, numbering the steps from the prior
#[must_use]
pub fn rows(history: &[Snapshot]) -> Vec<HistoryRow> {
    history
        .iter()
        .enumerate()
        .map(|(step, snapshot)| HistoryRow::from_snapshot(step, snapshot))
        .collect()
}

/// Write a history as headed csv to `writer`
///
/// # Errors
/// Returns an error if a row cannot be serialised or the writer fails.
pub fn write_csv<W: Write>(history: &[Snapshot], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows(history) {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write a history as headed csv to the file at `path`, replacing any existing file
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn write_csv_file(history: &[Snapshot], path: &Path) -> Result<()> {
    let file = File::create(path)?;
    write_csv(history, file)?;
    log::info!("wrote {} history rows to {}", history.len(), path.display());
    Ok(())
}
