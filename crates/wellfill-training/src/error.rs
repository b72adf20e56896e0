//! Error types for the wellfill-training crate.
//!
//! Per-entity failures (insufficient data, model training failures) are
//! caught at the entity-processing boundary by the driver and turn into a
//! skip for that entity; sink and input-validation errors are fatal for the
//! whole run.

use thiserror::Error;
use wellfill_data::DataError;
use wellfill_nn::NnError;

use crate::driver::SinkError;

/// Error type for training and driver operations.
#[derive(Debug, Error)]
pub enum TrainingError {
    /// A data-layer error (selection, scaling, matrix invariants).
    #[error(transparent)]
    Data(#[from] DataError),

    /// Too few complete-case rows to train an entity's model.
    #[error("Too few complete training rows for '{entity}': have {have}, need {need}")]
    InsufficientTrainingRows {
        /// The entity being processed
        entity: String,
        /// Complete-case rows available
        have: usize,
        /// Minimum required
        need: usize,
    },

    /// A layer-level error during model construction or passes.
    #[error(transparent)]
    Nn(#[from] NnError),

    /// Training produced a non-finite loss.
    #[error("Non-finite training loss at epoch {epoch}")]
    NonFiniteLoss {
        /// Epoch at which the loss diverged
        epoch: u32,
    },

    /// Observed and predictor matrices disagree on the date index.
    #[error("Observed and predictor matrices have different date indexes")]
    IndexMismatch,

    /// Invalid driver or model configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Round persistence failed.
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Result type alias for training operations.
pub type TrainingResult<T> = Result<T, TrainingError>;
