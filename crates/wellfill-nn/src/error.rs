//! Error types for the wellfill-nn crate.

use thiserror::Error;

/// Error type for layer operations.
#[derive(Debug, Error)]
pub enum NnError {
    /// Shape mismatch between expected and actual tensor shapes.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// The expected shape
        expected: Vec<usize>,
        /// The actual shape that was provided
        actual: Vec<usize>,
    },

    /// Invalid input dimension for the layer.
    #[error("Invalid input dimension: expected {expected}, got {actual}")]
    InvalidInputDimension {
        /// The expected input dimension
        expected: usize,
        /// The actual input dimension
        actual: usize,
    },

    /// Layer has not been initialized with an input.
    #[error("Layer not initialized: forward pass must be called before backward pass")]
    NotInitialized,

    /// Configuration error for the layer.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },
}

/// Result type alias for layer operations.
pub type NnResult<T> = Result<T, NnError>;
