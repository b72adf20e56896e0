//! Dropout layer for regularizing small fully-connected networks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::NnError;
use crate::layer::Layer;
use crate::tensor::Tensor;

/// Inverted dropout.
///
/// During training, each element is zeroed with probability `rate` and the
/// survivors are scaled by `1 / (1 - rate)` so that the expected activation
/// is unchanged; at inference the layer is the identity. Masks are drawn from
/// an owned seeded RNG so a model's training run is reproducible.
///
/// # Example
///
/// ```
/// use wellfill_nn::{Dropout, Layer, Tensor};
///
/// let dropout = Dropout::new(0.2, 42).unwrap();
/// let input = Tensor::ones(&[4, 8]);
/// // Inference-mode forward is the identity.
/// let output = dropout.forward(&input).unwrap();
/// assert_eq!(output.data(), input.data());
/// ```
#[derive(Debug, Clone)]
pub struct Dropout {
    /// Probability of zeroing an element
    rate: f32,
    /// RNG for mask sampling
    rng: StdRng,
    /// Cached mask for backward pass
    cached_mask: Option<Tensor>,
}

impl Dropout {
    /// Creates a new dropout layer.
    ///
    /// # Arguments
    ///
    /// * `rate` - Probability of zeroing each element, in `[0, 1)`
    /// * `seed` - Seed for the mask RNG
    ///
    /// # Errors
    ///
    /// Returns an error if `rate` is outside `[0, 1)`
    pub fn new(rate: f32, seed: u64) -> Result<Self, NnError> {
        if !(0.0..1.0).contains(&rate) {
            return Err(NnError::ConfigError {
                message: format!("Dropout rate must be in [0, 1), got {}", rate),
            });
        }
        Ok(Self {
            rate,
            rng: StdRng::seed_from_u64(seed),
            cached_mask: None,
        })
    }

    /// Returns the configured drop probability.
    pub fn rate(&self) -> f32 {
        self.rate
    }
}

impl Layer for Dropout {
    fn forward(&self, input: &Tensor) -> Result<Tensor, NnError> {
        Ok(input.clone())
    }

    fn forward_train(&mut self, input: &Tensor) -> Result<Tensor, NnError> {
        if self.rate == 0.0 {
            self.cached_mask = Some(Tensor::ones(input.shape()));
            return Ok(input.clone());
        }
        let keep = 1.0 - self.rate;
        let mask_data: Vec<f32> = (0..input.numel())
            .map(|_| {
                if self.rng.gen::<f32>() < self.rate {
                    0.0
                } else {
                    1.0 / keep
                }
            })
            .collect();
        let mask = Tensor::from_data(input.shape(), mask_data);
        let output = input.mul(&mask);
        self.cached_mask = Some(mask);
        Ok(output)
    }

    fn backward(&mut self, grad: &Tensor) -> Result<Tensor, NnError> {
        let mask = self.cached_mask.as_ref().ok_or(NnError::NotInitialized)?;
        Ok(grad.mul(mask))
    }

    fn name(&self) -> &str {
        "Dropout"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_rate_rejected() {
        assert!(Dropout::new(1.0, 1).is_err());
        assert!(Dropout::new(-0.1, 1).is_err());
        assert!(Dropout::new(0.0, 1).is_ok());
    }

    #[test]
    fn test_train_mask_zeros_and_scales() {
        let mut dropout = Dropout::new(0.5, 42).unwrap();
        let input = Tensor::ones(&[10, 10]);
        let output = dropout.forward_train(&input).unwrap();
        let zeros = output.data().iter().filter(|&&x| x == 0.0).count();
        let scaled = output.data().iter().filter(|&&x| (x - 2.0).abs() < 1e-6).count();
        assert_eq!(zeros + scaled, 100);
        assert!(zeros > 0 && scaled > 0);
    }

    #[test]
    fn test_backward_reuses_mask() {
        let mut dropout = Dropout::new(0.5, 7).unwrap();
        let input = Tensor::ones(&[2, 4]);
        let output = dropout.forward_train(&input).unwrap();
        let grad = Tensor::ones(&[2, 4]);
        let input_grad = dropout.backward(&grad).unwrap();
        assert_eq!(input_grad.data(), output.data());
    }

    #[test]
    fn test_inference_is_identity() {
        let dropout = Dropout::new(0.9, 3).unwrap();
        let input = Tensor::from_data(&[1, 3], vec![1.0, 2.0, 3.0]);
        let output = dropout.forward(&input).unwrap();
        assert_eq!(output.data(), input.data());
    }
}
