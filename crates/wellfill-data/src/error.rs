//! Error types for the wellfill-data crate.

use thiserror::Error;

/// Error type for series-matrix and preprocessing operations.
#[derive(Debug, Error)]
pub enum DataError {
    /// The date index is empty.
    #[error("Date index is empty")]
    EmptyIndex,

    /// The date index is not strictly increasing.
    #[error("Date index is not strictly increasing at position {position}")]
    NonMonotonicIndex {
        /// Index of the first out-of-order entry
        position: usize,
    },

    /// A column's length does not match the date index.
    #[error("Column '{column}' has {actual} values, expected {expected}")]
    LengthMismatch {
        /// The offending column id
        column: String,
        /// The index length
        expected: usize,
        /// The column length
        actual: usize,
    },

    /// A referenced column does not exist.
    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    /// A column has no observed (non-missing) values.
    #[error("Column '{column}' has no observed values")]
    NoObservations {
        /// The offending column id
        column: String,
    },

    /// Too few predictor columns overlap the target for feature selection.
    #[error("Only {available} predictor columns overlap the target, need {required}")]
    InsufficientPredictors {
        /// Number of scoreable predictor columns
        available: usize,
        /// Minimum required
        required: usize,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for data operations.
pub type DataResult<T> = Result<T, DataError>;
