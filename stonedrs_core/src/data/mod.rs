//! Module for the sample being estimated and the active-set matrices gating sweet spot cuts
pub mod active_set;
pub mod observations;

pub use active_set::ActiveSetMatrix;
pub use observations::{Covariates, ObservationSet};

use thiserror::Error;

/// Errors associated with input data
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    /// Error when the sample holds no observations
    #[error("The sample contains no observations")]
    Empty,
    /// Error when the observations carry no inputs
    #[error("The observations carry no inputs")]
    NoInputs,
    /// Error when two inputs disagree on the number of observations
    #[error("The number of observations in {what} ({found}) is not equal to the number of outputs ({expected})")]
    LengthMismatch {
        /// Which input disagreed
        what: String,
        /// Number of outputs
        expected: usize,
        /// Number of rows found
        found: usize,
    },
    /// Error when the rows of a matrix don't all have the same length
    #[error("Row {row} of {what} has {found} entries, expected {expected}")]
    RaggedRows {
        /// Which input is ragged
        what: String,
        /// Offending row
        row: usize,
        /// Length of the first row
        expected: usize,
        /// Length of the offending row
        found: usize,
    },
    /// Error when an input contains NaN or infinite values
    #[error("{what} contains a non-finite value at observation {row}")]
    NonFinite {
        /// Which input contains the value
        what: String,
        /// Observation holding the value
        row: usize,
    },
    /// Error when a logarithmic model is given a non-positive output
    #[error("Output {row} is {value}, but the log-transformed regression needs positive outputs")]
    NonPositiveOutput {
        /// Observation holding the value
        row: usize,
        /// The offending output
        value: f64,
    },
    /// Error when an active-set matrix is not N x N
    #[error("Active-set matrix is {rows}x{cols}, expected {expected}x{expected}")]
    ActiveSetShape {
        /// Rows of the matrix
        rows: usize,
        /// Columns of the matrix
        cols: usize,
        /// Number of observations
        expected: usize,
    },
}
