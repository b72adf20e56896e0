//! Dense (fully connected) layer implementation.
//!
//! This module provides the [`Dense`] layer, which performs a linear
//! transformation `y = xW + b` where W is the weight matrix and b is the
//! bias vector.

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::NnError;
use crate::initializer::Initializer;
use crate::layer::Layer;
use crate::regularizer::Regularizer;
use crate::tensor::Tensor;

/// A dense (fully connected) layer.
///
/// Performs the transformation `y = xW + b` where:
/// - `x` is the input tensor of shape `[batch_size, in_features]`
/// - `W` is the weight matrix of shape `[in_features, out_features]`
/// - `b` is the bias vector of shape `[out_features]`
///
/// # Example
///
/// ```
/// use wellfill_nn::{Dense, Layer, Tensor};
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let mut rng = StdRng::seed_from_u64(42);
/// let layer = Dense::new(12, 50, &mut rng);
/// let input = Tensor::zeros(&[32, 12]);
/// let output = layer.forward(&input).unwrap();
/// assert_eq!(output.shape(), &[32, 50]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dense {
    /// Weight matrix of shape [in_features, out_features]
    weights: Tensor,
    /// Bias vector of shape [out_features]
    bias: Tensor,
    /// Kernel regularizer
    kernel_regularizer: Regularizer,
    /// Gradient of weights
    weights_grad: Option<Tensor>,
    /// Gradient of bias
    bias_grad: Option<Tensor>,
    /// Cached input for backward pass
    cached_input: Option<Tensor>,
    /// Input feature dimension
    in_features: usize,
    /// Output feature dimension
    out_features: usize,
}

impl Dense {
    /// Creates a new dense layer with Glorot-uniform weights and zero bias.
    ///
    /// # Arguments
    ///
    /// * `in_features` - Number of input features
    /// * `out_features` - Number of output features
    /// * `rng` - Source of initialization randomness
    pub fn new(in_features: usize, out_features: usize, rng: &mut StdRng) -> Self {
        Self::new_with_initializer(
            in_features,
            out_features,
            Initializer::GlorotUniform,
            Initializer::Zeros,
            rng,
        )
    }

    /// Creates a new dense layer with custom initializers.
    pub fn new_with_initializer(
        in_features: usize,
        out_features: usize,
        weight_init: Initializer,
        bias_init: Initializer,
        rng: &mut StdRng,
    ) -> Self {
        let weights = weight_init.initialize(&[in_features, out_features], rng);
        let bias = bias_init.initialize(&[out_features], rng);

        Self {
            weights,
            bias,
            kernel_regularizer: Regularizer::None,
            weights_grad: None,
            bias_grad: None,
            cached_input: None,
            in_features,
            out_features,
        }
    }

    /// Sets the kernel regularizer.
    pub fn with_kernel_regularizer(mut self, regularizer: Regularizer) -> Self {
        self.kernel_regularizer = regularizer;
        self
    }

    /// Returns the input feature dimension.
    pub fn in_features(&self) -> usize {
        self.in_features
    }

    /// Returns the output feature dimension.
    pub fn out_features(&self) -> usize {
        self.out_features
    }

    /// Returns a reference to the weights tensor.
    pub fn weights(&self) -> &Tensor {
        &self.weights
    }

    /// Returns a reference to the bias tensor.
    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    /// Returns the weight gradients if available.
    pub fn weights_grad(&self) -> Option<&Tensor> {
        self.weights_grad.as_ref()
    }

    /// Returns the bias gradients if available.
    pub fn bias_grad(&self) -> Option<&Tensor> {
        self.bias_grad.as_ref()
    }

    /// Restores weights and bias from a previously cloned layer.
    ///
    /// Used by early stopping to roll back to the best-seen parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot dimensions differ from this layer's
    pub fn restore(&mut self, snapshot: &Dense) -> Result<(), NnError> {
        if snapshot.in_features != self.in_features || snapshot.out_features != self.out_features {
            return Err(NnError::ShapeMismatch {
                expected: vec![self.in_features, self.out_features],
                actual: vec![snapshot.in_features, snapshot.out_features],
            });
        }
        self.weights = snapshot.weights.clone();
        self.bias = snapshot.bias.clone();
        Ok(())
    }

    /// Clears the cached input and gradients.
    pub fn clear_cache(&mut self) {
        self.cached_input = None;
        self.weights_grad = None;
        self.bias_grad = None;
    }
}

impl Layer for Dense {
    fn forward(&self, input: &Tensor) -> Result<Tensor, NnError> {
        if input.ndim() != 2 {
            return Err(NnError::ShapeMismatch {
                expected: vec![0, self.in_features],
                actual: input.shape().to_vec(),
            });
        }
        if input.shape()[1] != self.in_features {
            return Err(NnError::InvalidInputDimension {
                expected: self.in_features,
                actual: input.shape()[1],
            });
        }

        Ok(input.matmul(&self.weights).add(&self.bias))
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

        if grad.ndim() != 2 || grad.shape()[1] != self.out_features {
            return Err(NnError::ShapeMismatch {
                expected: vec![input.shape()[0], self.out_features],
                actual: grad.shape().to_vec(),
            });
        }

        // dL/dW = x^T @ dL/dy (+ regularizer gradient)
        let mut weights_grad = input.transpose().matmul(grad);
        if let Some(reg_grad) = self.kernel_regularizer.grad(&self.weights) {
            weights_grad = weights_grad.add(&reg_grad);
        }
        self.weights_grad = Some(weights_grad);

        // dL/db = sum(dL/dy, axis=0)
        self.bias_grad = Some(grad.sum_axis0());

        // dL/dx = dL/dy @ W^T
        Ok(grad.matmul(&self.weights.transpose()))
    }

    fn parameters(&self) -> Vec<&Tensor> {
        vec![&self.weights, &self.bias]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        vec![&mut self.weights, &mut self.bias]
    }

    fn regularization_loss(&self) -> f32 {
        self.kernel_regularizer.loss(&self.weights)
    }

    fn name(&self) -> &str {
        "Dense"
    }
}
