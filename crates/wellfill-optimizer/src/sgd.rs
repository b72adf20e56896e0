//! Stochastic Gradient Descent (SGD) optimizer.
//!
//! SGD updates parameters by subtracting the gradient scaled by the
//! learning rate.

use crate::{Optimizer, OptimizerConfig, OptimizerError};
use serde::{Deserialize, Serialize};

/// Stochastic Gradient Descent optimizer.
///
/// Updates parameters using the formula:
/// `param = param - learning_rate * gradient`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sgd {
    /// Learning rate for gradient updates.
    learning_rate: f32,
    /// Configuration used to create this optimizer.
    config: OptimizerConfig,
}

impl Sgd {
    /// Creates a new SGD optimizer with the given learning rate.
    pub fn with_learning_rate(learning_rate: f32) -> Self {
        let config = OptimizerConfig::Sgd { learning_rate };
        Self {
            learning_rate,
            config,
        }
    }
}

impl Optimizer for Sgd {
    fn new(config: OptimizerConfig) -> Result<Self, OptimizerError> {
        match config {
            OptimizerConfig::Sgd { learning_rate } => Ok(Self {
                learning_rate,
                config,
            }),
            _ => Err(OptimizerError::ConfigMismatch {
                expected: "Sgd".to_string(),
                got: config.name().to_string(),
            }),
        }
    }

    fn apply_gradients(&mut self, params: &mut [f32], gradients: &[f32]) {
        for (p, g) in params.iter_mut().zip(gradients.iter()) {
            *p -= self.learning_rate * g;
        }
    }

    fn config(&self) -> &OptimizerConfig {
        &self.config
    }
}
