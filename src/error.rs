//! Error type for the stitching engine and benchmark driver.

use std::io;

use thiserror::Error;

/// Errors surfaced by the stitching engine and the benchmark driver.
///
/// Invalid plans and invalid data are recoverable at the driver level (the
/// offending plan is reported and skipped); a bad cardinality rate or a
/// failing report sink aborts the run.
#[derive(Debug, Error)]
pub enum StitchError {
    /// The plan was empty, contained an empty round, or referenced a column
    /// index that is not registered.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// No columns were registered, or the registered columns disagree on row
    /// count.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Cardinality rate outside `(0, 1]`.
    #[error("cardinality rate {0} is outside (0, 1]")]
    InvalidCardinality(f64),

    /// A round stitched more key columns than the sort specializes for.
    #[error("unsupported compare factor {0}, expected 1..={max}", max = crate::column::MAX_COMPARE_FACTOR)]
    UnsupportedWidth(usize),

    /// The report sink could not be opened or written.
    #[error("report output failed: {0}")]
    Io(#[from] io::Error),
}
