//! Feed-forward network building blocks for well time-series imputation.
//!
//! This crate provides the small set of layers the per-well regression
//! models are assembled from:
//!
//! - [`Tensor`]: row-major 2D math over `Vec<f32>`
//! - [`Layer`]: forward/backward/parameters trait
//! - [`Dense`]: fully connected layer with cached-input backward pass
//! - [`ReLU`]: rectified-linear activation
//! - [`Dropout`]: seeded inverted dropout
//! - [`Initializer`] / [`Regularizer`]: weight init and L1/L2 penalties
//!
//! # Example
//!
//! ```
//! use wellfill_nn::{Dense, Layer, ReLU, Regularizer, Tensor};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let hidden = Dense::new(8, 50, &mut rng).with_kernel_regularizer(Regularizer::L2(0.01));
//! let relu = ReLU::new();
//! let output = Dense::new(50, 1, &mut rng);
//!
//! let x = Tensor::zeros(&[16, 8]);
//! let h = relu.forward(&hidden.forward(&x).unwrap()).unwrap();
//! let y = output.forward(&h).unwrap();
//! assert_eq!(y.shape(), &[16, 1]);
//! ```

pub mod activation;
pub mod dense;
pub mod dropout;
pub mod error;
pub mod initializer;
pub mod layer;
pub mod regularizer;
pub mod tensor;

pub use activation::ReLU;
pub use dense::Dense;
pub use dropout::Dropout;
pub use error::{NnError, NnResult};
pub use initializer::Initializer;
pub use layer::Layer;
pub use regularizer::Regularizer;
pub use tensor::Tensor;
