//! Gradient-descent optimizers for the per-well regression models.
//!
//! Each optimizer implements the [`Optimizer`] trait over flat parameter
//! slices, so a model applies one optimizer instance per parameter tensor.
//!
//! # Available Optimizers
//!
//! - [`Sgd`] - Stochastic Gradient Descent
//! - [`Adam`] - Adaptive Moment Estimation
//!
//! # Example
//!
//! ```
//! use wellfill_optimizer::{Optimizer, Sgd, OptimizerConfig};
//!
//! let config = OptimizerConfig::Sgd { learning_rate: 0.01 };
//! let mut optimizer = Sgd::new(config).unwrap();
//!
//! let mut params = vec![1.0, 2.0, 3.0];
//! let gradients = vec![0.1, 0.2, 0.3];
//!
//! optimizer.apply_gradients(&mut params, &gradients);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod adam;
mod sgd;

pub use adam::Adam;
pub use sgd::Sgd;

/// Errors that can occur when working with optimizers.
#[derive(Debug, Error)]
pub enum OptimizerError {
    /// Configuration type does not match the optimizer type.
    #[error("Config mismatch: expected {expected}, got {got}")]
    ConfigMismatch { expected: String, got: String },

    /// Invalid configuration parameter.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Configuration for different optimizer types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OptimizerConfig {
    /// Stochastic Gradient Descent configuration.
    Sgd {
        /// Learning rate for gradient updates.
        learning_rate: f32,
    },

    /// Adam configuration.
    Adam {
        /// Learning rate for gradient updates.
        learning_rate: f32,
        /// Exponential decay rate for first moment estimates.
        beta1: f32,
        /// Exponential decay rate for second moment estimates.
        beta2: f32,
        /// Small constant for numerical stability.
        epsilon: f32,
    },
}

impl OptimizerConfig {
    /// Returns the name of the optimizer type.
    pub fn name(&self) -> &'static str {
        match self {
            OptimizerConfig::Sgd { .. } => "Sgd",
            OptimizerConfig::Adam { .. } => "Adam",
        }
    }

    /// Returns the learning rate for the optimizer.
    pub fn learning_rate(&self) -> f32 {
        match self {
            OptimizerConfig::Sgd { learning_rate } => *learning_rate,
            OptimizerConfig::Adam { learning_rate, .. } => *learning_rate,
        }
    }

    /// Adam with its customary defaults and the given learning rate.
    pub fn adam_with_learning_rate(learning_rate: f32) -> Self {
        OptimizerConfig::Adam {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

/// Trait for gradient-descent optimizers.
///
/// Optimizers are responsible for updating parameter vectors based on
/// computed gradients. State (moments, step counters) is owned by the
/// optimizer instance; one instance serves one parameter tensor.
pub trait Optimizer: Sized {
    /// Creates a new optimizer from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizerError::ConfigMismatch`] if the configuration
    /// variant does not match the optimizer type.
    fn new(config: OptimizerConfig) -> Result<Self, OptimizerError>;

    /// Applies gradients to the parameters in place.
    ///
    /// # Arguments
    ///
    /// * `params` - The parameter values to update
    /// * `gradients` - The gradients, same length as `params`
    fn apply_gradients(&mut self, params: &mut [f32], gradients: &[f32]);

    /// Returns the configuration used to create this optimizer.
    fn config(&self) -> &OptimizerConfig;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_names() {
        assert_eq!(OptimizerConfig::Sgd { learning_rate: 0.1 }.name(), "Sgd");
        assert_eq!(
            OptimizerConfig::adam_with_learning_rate(0.001).name(),
            "Adam"
        );
    }

    #[test]
    fn test_config_learning_rate() {
        let config = OptimizerConfig::adam_with_learning_rate(0.001);
        assert!((config.learning_rate() - 0.001).abs() < 1e-9);
    }
}
