//! Activation function layers.

use crate::error::NnError;
use crate::layer::Layer;
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// Rectified Linear Unit (ReLU) activation function.
///
/// Computes `f(x) = max(0, x)` element-wise.
///
/// # Example
///
/// ```
/// use wellfill_nn::{Layer, ReLU, Tensor};
///
/// let relu = ReLU::new();
/// let input = Tensor::from_data(&[2, 2], vec![-1.0, 0.0, 1.0, 2.0]);
/// let output = relu.forward(&input).unwrap();
/// assert_eq!(output.data(), &[0.0, 0.0, 1.0, 2.0]);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReLU {
    /// Cached input for backward pass
    cached_input: Option<Tensor>,
}

impl ReLU {
    /// Creates a new ReLU activation layer.
    pub fn new() -> Self {
        Self { cached_input: None }
    }
}

impl Layer for ReLU {
    fn forward(&self, input: &Tensor) -> Result<Tensor, NnError> {
        Ok(input.map(|x| x.max(0.0)))
    }

    fn forward_train(&mut self, input: &Tensor) -> Result<Tensor, NnError> {
        self.cached_input = Some(input.clone());
        self.forward(input)
    }

    fn backward(&mut self, grad: &Tensor) -> Result<Tensor, NnError> {
        let input = self
            .cached_input
            .as_ref()
            .ok_or(NnError::NotInitialized)?;

        // ReLU gradient: 1 if x > 0, else 0
        let mask = input.map(|x| if x > 0.0 { 1.0 } else { 0.0 });
        Ok(grad.mul(&mask))
    }

    fn name(&self) -> &str {
        "ReLU"
    }
}
