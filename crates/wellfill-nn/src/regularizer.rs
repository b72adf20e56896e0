//! Regularization utilities for learnable parameters.

use serde::{Deserialize, Serialize};

use crate::tensor::Tensor;

/// Regularizer types supported for layer parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub enum Regularizer {
    /// No regularization.
    #[default]
    None,
    /// L1 regularization with coefficient.
    L1(f32),
    /// L2 regularization with coefficient.
    L2(f32),
}

impl Regularizer {
    /// Returns the regularization loss for the given parameter tensor.
    pub fn loss(&self, param: &Tensor) -> f32 {
        match *self {
            Regularizer::None => 0.0,
            Regularizer::L1(lambda) => param.abs().sum() * lambda,
            Regularizer::L2(lambda) => param.sqr().sum() * lambda,
        }
    }

    /// Returns the gradient contribution of this regularizer for the given parameter.
    pub fn grad(&self, param: &Tensor) -> Option<Tensor> {
        match *self {
            Regularizer::None => None,
            Regularizer::L1(lambda) => Some(param.map(|x| {
                if x > 0.0 {
                    lambda
                } else if x < 0.0 {
                    -lambda
                } else {
                    0.0
                }
            })),
            Regularizer::L2(lambda) => Some(param.scale(2.0 * lambda)),
        }
    }
}
