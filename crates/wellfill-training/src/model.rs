//! The per-entity regression model and its training lifecycle.
//!
//! Each entity gets a freshly initialized one-hidden-layer network per
//! round: construct, train with early stopping, predict, discard. Nothing
//! about a model outlives its entity's processing.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;
use wellfill_nn::{Dense, Dropout, Layer, ReLU, Regularizer, Tensor};
use wellfill_optimizer::{Adam, Optimizer};

use crate::error::{TrainingError, TrainingResult};

/// Hyperparameters for one entity model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Hidden layer width.
    pub hidden_units: usize,
    /// Adam learning rate.
    pub learning_rate: f32,
    /// L2 penalty on the hidden kernel.
    pub l2_penalty: f32,
    /// Dropout rate after the hidden activation.
    pub dropout_rate: f32,
    /// Early-stopping patience in epochs.
    pub patience: u32,
    /// Minimum validation-loss improvement to reset patience.
    pub min_delta: f64,
    /// Hard cap on training epochs.
    pub max_epochs: u32,
    /// Mini-batch size.
    pub batch_size: usize,
    /// Fraction of complete-case rows held out for validation.
    pub validation_split: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            hidden_units: 50,
            learning_rate: 0.001,
            l2_penalty: 0.01,
            dropout_rate: 0.2,
            patience: 5,
            min_delta: 0.0,
            max_epochs: 700,
            batch_size: 32,
            validation_split: 0.25,
        }
    }
}

impl TrainConfig {
    /// Sets the validation fraction.
    pub fn with_validation_split(mut self, fraction: f64) -> Self {
        self.validation_split = fraction;
        self
    }

    /// Sets the epoch cap.
    pub fn with_max_epochs(mut self, max_epochs: u32) -> Self {
        self.max_epochs = max_epochs;
        self
    }

    /// Sets the hidden width.
    pub fn with_hidden_units(mut self, hidden_units: usize) -> Self {
        self.hidden_units = hidden_units;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid field
    pub fn validate(&self) -> TrainingResult<()> {
        if self.hidden_units == 0 {
            return Err(TrainingError::InvalidConfig(
                "hidden_units must be positive".to_string(),
            ));
        }
        if self.learning_rate <= 0.0 {
            return Err(TrainingError::InvalidConfig(
                "learning_rate must be positive".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(TrainingError::InvalidConfig(
                "batch_size must be positive".to_string(),
            ));
        }
        if self.max_epochs == 0 {
            return Err(TrainingError::InvalidConfig(
                "max_epochs must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.dropout_rate) {
            return Err(TrainingError::InvalidConfig(
                "dropout_rate must be in [0, 1)".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.validation_split) || self.validation_split == 0.0 {
            return Err(TrainingError::InvalidConfig(
                "validation_split must be in (0, 1)".to_string(),
            ));
        }
        Ok(())
    }
}

/// What the early-stopping monitor decided after an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDecision {
    /// The monitored value improved; best weights should be snapshotted.
    Improved,
    /// No improvement yet, patience remaining.
    NoImprovement,
    /// Patience exhausted; stop and restore the best weights.
    OutOfPatience,
}

/// Patience-based early stopping on a monitored loss (lower is better).
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    /// Epochs to wait for improvement before stopping.
    patience: u32,
    /// Minimum change to qualify as an improvement.
    min_delta: f64,
    /// Best value seen so far.
    best_value: Option<f64>,
    /// Epoch at which the best value was seen.
    best_epoch: u32,
    /// Epochs since the last improvement.
    epochs_without_improvement: u32,
}

impl EarlyStopping {
    /// Creates a monitor with the given patience and minimum delta.
    pub fn new(patience: u32, min_delta: f64) -> Self {
        Self {
            patience,
            min_delta,
            best_value: None,
            best_epoch: 0,
            epochs_without_improvement: 0,
        }
    }

    /// Records the monitored value for an epoch.
    pub fn observe(&mut self, epoch: u32, value: f64) -> StopDecision {
        let improved = match self.best_value {
            None => true,
            Some(best) => value < best - self.min_delta,
        };
        if improved {
            self.best_value = Some(value);
            self.best_epoch = epoch;
            self.epochs_without_improvement = 0;
            return StopDecision::Improved;
        }
        self.epochs_without_improvement += 1;
        if self.epochs_without_improvement >= self.patience {
            StopDecision::OutOfPatience
        } else {
            StopDecision::NoImprovement
        }
    }

    /// Epoch of the best monitored value.
    pub fn best_epoch(&self) -> u32 {
        self.best_epoch
    }

    /// Best monitored value so far.
    pub fn best_value(&self) -> Option<f64> {
        self.best_value
    }
}

/// One epoch's losses, retained for the training history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EpochRecord {
    /// Epoch number, starting at zero.
    pub epoch: u32,
    /// Training mean squared error (scaled units).
    pub train_loss: f64,
    /// Validation mean squared error (scaled units).
    pub val_loss: f64,
}

/// Result of one training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainReport {
    /// Epochs actually run.
    pub epochs: u32,
    /// Epoch whose weights were restored.
    pub best_epoch: u32,
    /// Whether early stopping cut training short.
    pub stopped_early: bool,
    /// Per-epoch loss curve.
    pub history: Vec<EpochRecord>,
}

/// A one-hidden-layer feed-forward regressor.
///
/// `Dense(in, hidden) -> ReLU -> Dropout -> Dense(hidden, 1)`, trained with
/// Adam on mean squared error. All randomness (weight init, dropout masks,
/// batch shuffles) flows from the seed given at construction.
pub struct RegressionNet {
    hidden: Dense,
    activation: ReLU,
    dropout: Dropout,
    output: Dense,
    optimizers: Vec<Adam>,
    config: TrainConfig,
    rng: StdRng,
}

impl RegressionNet {
    /// Builds a freshly initialized network.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid
    pub fn new(input_dim: usize, config: &TrainConfig, seed: u64) -> TrainingResult<Self> {
        config.validate()?;
        if input_dim == 0 {
            return Err(TrainingError::InvalidConfig(
                "input_dim must be positive".to_string(),
            ));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let hidden = Dense::new(input_dim, config.hidden_units, &mut rng)
            .with_kernel_regularizer(Regularizer::L2(config.l2_penalty));
        let dropout = Dropout::new(config.dropout_rate, rng.gen())?;
        let output = Dense::new(config.hidden_units, 1, &mut rng);
        let optimizers = (0..4)
            .map(|_| Adam::with_learning_rate(config.learning_rate))
            .collect();

        Ok(Self {
            hidden,
            activation: ReLU::new(),
            dropout,
            output,
            optimizers,
            config: config.clone(),
            rng,
        })
    }

    /// Inference-mode forward pass (no dropout).
    fn forward(&self, x: &Tensor) -> TrainingResult<Tensor> {
        let h = self.hidden.forward(x)?;
        let a = self.activation.forward(&h)?;
        Ok(self.output.forward(&a)?)
    }

    /// One mini-batch gradient step; returns the batch loss.
    fn train_step(&mut self, x: &Tensor, y: &Tensor) -> TrainingResult<f64> {
        let batch = x.shape()[0] as f32;

        let h = self.hidden.forward_train(x)?;
        let a = self.activation.forward_train(&h)?;
        let d = self.dropout.forward_train(&a)?;
        let pred = self.output.forward_train(&d)?;

        let diff = pred.sub(y);
        let mse = f64::from(diff.sqr().sum()) / f64::from(batch);
        let loss = mse
            + f64::from(self.hidden.regularization_loss() + self.output.regularization_loss());

        let grad = diff.scale(2.0 / batch);
        let grad = self.output.backward(&grad)?;
        let grad = self.dropout.backward(&grad)?;
        let grad = self.activation.backward(&grad)?;
        self.hidden.backward(&grad)?;

        self.apply_updates();
        Ok(loss)
    }

    /// Applies accumulated gradients through the per-parameter optimizers.
    fn apply_updates(&mut self) {
        let hidden_grads = (
            self.hidden.weights_grad().cloned(),
            self.hidden.bias_grad().cloned(),
        );
        let output_grads = (
            self.output.weights_grad().cloned(),
            self.output.bias_grad().cloned(),
        );

        if let (Some(wg), Some(bg)) = hidden_grads {
            if let [w, b] = self.hidden.parameters_mut().as_mut_slice() {
                self.optimizers[0].apply_gradients(w.data_mut(), wg.data());
                self.optimizers[1].apply_gradients(b.data_mut(), bg.data());
            }
        }
        if let (Some(wg), Some(bg)) = output_grads {
            if let [w, b] = self.output.parameters_mut().as_mut_slice() {
                self.optimizers[2].apply_gradients(w.data_mut(), wg.data());
                self.optimizers[3].apply_gradients(b.data_mut(), bg.data());
            }
        }
    }

    /// Trains until the validation loss stops improving or the epoch cap.
    ///
    /// On return the network holds the best-seen weights, not the last.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::NonFiniteLoss`] if training diverges
    pub fn train(
        &mut self,
        x_train: &Tensor,
        y_train: &Tensor,
        x_val: &Tensor,
        y_val: &Tensor,
    ) -> TrainingResult<TrainReport> {
        let n = x_train.shape()[0];
        let mut early = EarlyStopping::new(self.config.patience, self.config.min_delta);
        let mut best: Option<(Dense, Dense)> = None;
        let mut history = Vec::new();
        let mut stopped_early = false;
        let mut epochs = 0;
        let mut order: Vec<usize> = (0..n).collect();

        for epoch in 0..self.config.max_epochs {
            epochs = epoch + 1;
            order.shuffle(&mut self.rng);
            for chunk in order.chunks(self.config.batch_size) {
                let xb = gather_rows(x_train, chunk);
                let yb = gather_rows(y_train, chunk);
                let loss = self.train_step(&xb, &yb)?;
                if !loss.is_finite() {
                    return Err(TrainingError::NonFiniteLoss { epoch });
                }
            }

            let train_loss = mean_squared_error(&self.forward(x_train)?, y_train);
            let val_loss = mean_squared_error(&self.forward(x_val)?, y_val);
            if !val_loss.is_finite() {
                return Err(TrainingError::NonFiniteLoss { epoch });
            }
            history.push(EpochRecord {
                epoch,
                train_loss,
                val_loss,
            });

            match early.observe(epoch, val_loss) {
                StopDecision::Improved => {
                    best = Some((self.hidden.clone(), self.output.clone()));
                }
                StopDecision::NoImprovement => {}
                StopDecision::OutOfPatience => {
                    debug!(
                        epoch,
                        best_epoch = early.best_epoch(),
                        "early stopping: validation loss stopped improving"
                    );
                    stopped_early = true;
                    break;
                }
            }
        }

        if let Some((hidden, output)) = best {
            self.hidden.restore(&hidden)?;
            self.output.restore(&output)?;
        }

        Ok(TrainReport {
            epochs,
            best_epoch: early.best_epoch(),
            stopped_early,
            history,
        })
    }

    /// Predicts on a feature matrix, one value per row.
    pub fn predict(&self, x: &Tensor) -> TrainingResult<Vec<f32>> {
        Ok(self.forward(x)?.data().to_vec())
    }
}

/// Reproducible shuffled train/validation split of `n` row positions.
///
/// The validation side gets `round(n * fraction)` rows, clamped so both
/// sides keep at least one row.
///
/// # Panics
///
/// Panics if `n < 2`; callers gate on their minimum-row requirement first.
pub fn train_val_split(n: usize, fraction: f64, rng: &mut StdRng) -> (Vec<usize>, Vec<usize>) {
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);
    let val_count = (((n as f64) * fraction).round() as usize).clamp(1, n - 1);
    let (val, train) = order.split_at(val_count);
    (train.to_vec(), val.to_vec())
}

/// Mean squared error between two equally shaped tensors.
fn mean_squared_error(pred: &Tensor, truth: &Tensor) -> f64 {
    let n = truth.numel() as f64;
    f64::from(pred.sub(truth).sqr().sum()) / n
}

/// Copies the given rows of a 2D tensor into a new tensor.
fn gather_rows(x: &Tensor, rows: &[usize]) -> Tensor {
    let width = x.shape()[1];
    let mut data = Vec::with_capacity(rows.len() * width);
    for &r in rows {
        data.extend_from_slice(&x.data()[r * width..(r + 1) * width]);
    }
    Tensor::from_data(&[rows.len(), width], data)
}
