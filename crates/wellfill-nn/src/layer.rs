//! Layer trait definition for network layers.

use crate::error::NnError;
use crate::tensor::Tensor;

/// A network layer that supports forward and backward propagation.
///
/// Each layer must be able to perform a forward pass, a backward pass that
/// fills internal gradient accumulators, and expose its learnable parameters.
///
/// # Example
///
/// ```
/// use wellfill_nn::{Dense, Initializer, Layer, Tensor};
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let mut rng = StdRng::seed_from_u64(7);
/// let layer = Dense::new(8, 4, &mut rng);
/// let input = Tensor::zeros(&[16, 8]);
/// let output = layer.forward(&input).unwrap();
/// assert_eq!(output.shape(), &[16, 4]);
/// ```
pub trait Layer: Send + Sync {
    /// Performs a forward pass through the layer.
    ///
    /// # Errors
    ///
    /// Returns an [`NnError`] if the input shape is incompatible with the layer
    fn forward(&self, input: &Tensor) -> Result<Tensor, NnError>;

    /// Performs a forward pass in training mode, caching whatever the
    /// backward pass needs (inputs, dropout masks).
    fn forward_train(&mut self, input: &Tensor) -> Result<Tensor, NnError>;

    /// Performs a backward pass through the layer.
    ///
    /// Takes the gradient of the loss with respect to the layer's output and
    /// returns the gradient with respect to the layer's input, updating
    /// internal parameter-gradient accumulators along the way.
    ///
    /// # Errors
    ///
    /// Returns an [`NnError`] if no forward pass was cached or the gradient
    /// shape is incompatible
    fn backward(&mut self, grad: &Tensor) -> Result<Tensor, NnError>;

    /// Returns references to the layer's learnable parameters.
    fn parameters(&self) -> Vec<&Tensor> {
        vec![]
    }

    /// Returns mutable references to the layer's learnable parameters.
    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        vec![]
    }

    /// Returns the regularization loss contributed by this layer.
    fn regularization_loss(&self) -> f32 {
        0.0
    }

    /// Returns the name of the layer for debugging and logging purposes.
    fn name(&self) -> &str {
        "Layer"
    }
}
