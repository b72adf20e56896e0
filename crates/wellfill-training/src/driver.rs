//! The outer refinement loop.
//!
//! Each round re-runs the full per-entity pipeline over every entity, using
//! the previous round's imputed matrix as this round's predictor source.
//! Entity failures are isolated: the entity is skipped for the round and its
//! observed series passes through unchanged. Round artifacts go to a
//! [`RoundSink`] before the next round starts.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use wellfill_data::{
    FeatureAssembler, FeatureSelector, FeatureTable, GapConfig, GapSplitter, MinMaxScaler,
    SeriesMatrix, StandardScaler, TestHoldout,
};
use wellfill_nn::Tensor;

use crate::error::{TrainingError, TrainingResult};
use crate::imputation::ImputationAssembler;
use crate::metrics::{r2_score, EntityMetrics, ErrorStats, SummaryTable};
use crate::model::{train_val_split, RegressionNet, TrainConfig, TrainReport};

/// Configuration for a whole imputation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Dataset label, passed through to output naming and logs only.
    pub aquifer: String,
    /// Number of refinement rounds.
    pub rounds: usize,
    /// Base seed; every entity-and-round derives its own stream from it.
    pub seed: u64,
    /// Whether to carve a synthetic test holdout per entity.
    pub use_test_holdout: bool,
    /// Minimum complete-case rows required to train an entity.
    pub min_training_rows: usize,
    /// Holdout-window construction parameters.
    pub gap: GapConfig,
    /// Model hyperparameters.
    pub train: TrainConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            aquifer: String::new(),
            rounds: 2,
            seed: 42,
            use_test_holdout: true,
            min_training_rows: 8,
            gap: GapConfig::default(),
            train: TrainConfig::default(),
        }
    }
}

impl DriverConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid field
    pub fn validate(&self) -> TrainingResult<()> {
        if self.rounds == 0 {
            return Err(TrainingError::InvalidConfig(
                "rounds must be positive".to_string(),
            ));
        }
        if self.min_training_rows < 2 {
            return Err(TrainingError::InvalidConfig(
                "min_training_rows must be at least 2".to_string(),
            ));
        }
        self.train.validate()
    }
}

/// Errors raised by round persistence.
#[derive(Debug, Error)]
pub enum SinkError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Artifact serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A custom sink error.
    #[error("Sink error: {0}")]
    Custom(String),
}

/// Receives each round's terminal artifacts.
///
/// The core never touches the filesystem; the CLI supplies a
/// directory-backed sink and tests use [`MemorySink`].
pub trait RoundSink {
    /// Persists one round's summary table and imputed matrix.
    ///
    /// # Errors
    ///
    /// A sink error aborts the whole run
    fn persist_round(
        &mut self,
        round: usize,
        summary: &SummaryTable,
        imputed: &SeriesMatrix,
    ) -> Result<(), SinkError>;
}

/// In-memory sink retaining every round's artifacts.
#[derive(Debug, Default)]
pub struct MemorySink {
    /// `(summary, imputed)` per round, in round order.
    pub rounds: Vec<(SummaryTable, SeriesMatrix)>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoundSink for MemorySink {
    fn persist_round(
        &mut self,
        _round: usize,
        summary: &SummaryTable,
        imputed: &SeriesMatrix,
    ) -> Result<(), SinkError> {
        self.rounds.push((summary.clone(), imputed.clone()));
        Ok(())
    }
}

/// Immutable per-round inputs shared by every entity's processing.
#[derive(Debug, Clone, Copy)]
pub struct RoundContext<'a> {
    /// Zero-based round number.
    pub round: usize,
    /// The raw observed matrix (gaps intact).
    pub observed: &'a SeriesMatrix,
    /// This round's predictor source (pretrained matrix or previous output).
    pub predictors: &'a SeriesMatrix,
    /// The run configuration.
    pub config: &'a DriverConfig,
}

/// What one entity's processing produced.
#[derive(Debug, Clone)]
pub struct EntityOutcome {
    /// The entity's summary row.
    pub metrics: EntityMetrics,
    /// Inverse-scaled predictions, one slot per index date (`None` where the
    /// feature row was incomplete).
    pub predictions: Vec<Option<f64>>,
    /// The training run's report.
    pub report: TrainReport,
}

/// Derives the seed for one entity in one round.
///
/// FNV-1a over the entity id, mixed with the base seed and a round
/// constant, so entities are reproducible independently of processing
/// order.
fn entity_seed(base: u64, round: usize, entity: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in entity.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash ^ base ^ (round as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
}

/// Runs the full pipeline for a single entity.
///
/// Splits a holdout, selects and standardizes predictors, assembles
/// features, trains a fresh model, and merges predictions back into the
/// observed series. Every metric and filled value is in original units.
///
/// # Errors
///
/// Any error is entity-scoped; the driver logs it and skips the entity
pub fn process_entity(ctx: &RoundContext<'_>, entity: &str) -> TrainingResult<EntityOutcome> {
    let index = ctx.observed.index();
    let observed = ctx.observed.require_column(entity)?;
    let mut rng = StdRng::seed_from_u64(entity_seed(ctx.config.seed, ctx.round, entity));

    // Target scaling is fit on the entity's own observed values only.
    let scaler = MinMaxScaler::fit(entity, observed)?;
    let scaled = scaler.transform_series(observed);

    // Synthetic test holdout; failure to place one degrades, not aborts.
    let (target_series, holdout) = if ctx.config.use_test_holdout {
        match GapSplitter::new(ctx.config.gap.clone()).split(index, &scaled, &mut rng) {
            Some((blanked, holdout)) => (blanked, Some(holdout)),
            None => {
                warn!(
                    entity,
                    round = ctx.round,
                    "no valid holdout window; test metrics will be absent"
                );
                (scaled.clone(), None)
            }
        }
    } else {
        (scaled.clone(), None)
    };

    // Association scores use the raw target; scaling is monotone and the
    // F-statistic is scale-free, but raw keeps selection independent of the
    // holdout blanking.
    let selected_ids =
        FeatureSelector::new().select(ctx.predictors, entity, observed, &mut rng)?;

    let mut selected = Vec::with_capacity(selected_ids.len());
    for id in &selected_ids {
        let column = ctx.predictors.require_column(id)?;
        let standardizer = StandardScaler::fit(id, column)?;
        selected.push((id.clone(), standardizer.transform_series(column)));
    }
    let table = FeatureAssembler::new().assemble(index, selected)?;

    let training_rows = table.training_rows(&target_series);
    if training_rows.len() < ctx.config.min_training_rows {
        return Err(TrainingError::InsufficientTrainingRows {
            entity: entity.to_string(),
            have: training_rows.len(),
            need: ctx.config.min_training_rows,
        });
    }

    let x_all = feature_tensor(&table, &training_rows);
    let y_all = target_tensor(&target_series, &training_rows);
    let (train_idx, val_idx) =
        train_val_split(training_rows.len(), ctx.config.train.validation_split, &mut rng);
    let x_train = select_rows(&x_all, &train_idx);
    let y_train = select_rows(&y_all, &train_idx);
    let x_val = select_rows(&x_all, &val_idx);
    let y_val = select_rows(&y_all, &val_idx);

    let mut net = RegressionNet::new(table.width(), &ctx.config.train, rng.gen())?;
    let report = net.train(&x_train, &y_train, &x_val, &y_val)?;

    // Full-index predictions wherever the feature row is complete,
    // inverse-scaled to original units.
    let complete_rows = table.complete_rows();
    let scaled_predictions = net.predict(&feature_tensor(&table, &complete_rows))?;
    let mut predictions: Vec<Option<f64>> = vec![None; index.len()];
    for (&pos, pred) in complete_rows.iter().zip(scaled_predictions.iter()) {
        predictions[pos] = Some(scaler.inverse(f64::from(*pred)));
    }

    let train_stats = split_stats(&net, &scaler, &x_train, &y_train)?;
    let val_stats = split_stats(&net, &scaler, &x_val, &y_val)?;

    // Goodness of fit over every complete-case row, in original units.
    let truth: Vec<f64> = training_rows
        .iter()
        .filter_map(|&pos| observed[pos])
        .collect();
    let fitted: Vec<f64> = training_rows
        .iter()
        .filter_map(|&pos| predictions[pos])
        .collect();
    let r2 = r2_score(&truth, &fitted);

    let mut metrics = EntityMetrics::new(
        entity,
        train_stats,
        train_idx.len(),
        val_stats,
        val_idx.len(),
    )
    .with_r2(r2);

    if let Some(holdout) = &holdout {
        match evaluate_holdout(index, holdout, &scaler, &predictions) {
            Some((stats, points, test_r2)) => {
                metrics = metrics.with_test(stats, points, test_r2);
            }
            None => {
                warn!(
                    entity,
                    round = ctx.round,
                    "holdout has no complete-case overlap; test metrics absent"
                );
            }
        }
    }

    Ok(EntityOutcome {
        metrics,
        predictions,
        report,
    })
}

/// Error statistics of one split, inverse-scaled to original units.
fn split_stats(
    net: &RegressionNet,
    scaler: &MinMaxScaler,
    x: &Tensor,
    y: &Tensor,
) -> TrainingResult<ErrorStats> {
    let predictions: Vec<f64> = net
        .predict(x)?
        .into_iter()
        .map(|p| scaler.inverse(f64::from(p)))
        .collect();
    let truth: Vec<f64> = y
        .data()
        .iter()
        .map(|t| scaler.inverse(f64::from(*t)))
        .collect();
    ErrorStats::from_pairs(&truth, &predictions).ok_or_else(|| {
        TrainingError::InvalidConfig("empty evaluation split".to_string())
    })
}

/// Scores predictions against the holdout's hidden truth.
///
/// Returns `None` when no holdout date has a complete feature row.
fn evaluate_holdout(
    index: &[chrono::NaiveDate],
    holdout: &TestHoldout,
    scaler: &MinMaxScaler,
    predictions: &[Option<f64>],
) -> Option<(ErrorStats, usize, Option<f64>)> {
    let mut truth = Vec::with_capacity(holdout.len());
    let mut predicted = Vec::with_capacity(holdout.len());
    for (date, value) in holdout.dates.iter().zip(holdout.values.iter()) {
        if let Ok(pos) = index.binary_search(date) {
            if let Some(pred) = predictions[pos] {
                truth.push(scaler.inverse(*value));
                predicted.push(pred);
            }
        }
    }
    let stats = ErrorStats::from_pairs(&truth, &predicted)?;
    Some((stats, truth.len(), r2_score(&truth, &predicted)))
}

/// Copies complete feature rows into a `[rows, width]` tensor.
///
/// Callers pass only rows reported complete by the table, so every
/// `complete_row` call yields a value.
fn feature_tensor(table: &FeatureTable, rows: &[usize]) -> Tensor {
    let mut data = Vec::with_capacity(rows.len() * table.width());
    for &row in rows {
        if let Some(values) = table.complete_row(row) {
            data.extend(values.into_iter().map(|v| v as f32));
        }
    }
    Tensor::from_data(&[rows.len(), table.width()], data)
}

/// Copies present target values into a `[rows, 1]` tensor.
fn target_tensor(series: &[Option<f64>], rows: &[usize]) -> Tensor {
    let data: Vec<f32> = rows
        .iter()
        .filter_map(|&row| series[row].map(|v| v as f32))
        .collect();
    Tensor::from_data(&[rows.len(), 1], data)
}

/// Copies the given row positions of a 2D tensor into a new tensor.
fn select_rows(x: &Tensor, rows: &[usize]) -> Tensor {
    let width = x.shape()[1];
    let mut data = Vec::with_capacity(rows.len() * width);
    for &row in rows {
        data.extend_from_slice(&x.data()[row * width..(row + 1) * width]);
    }
    Tensor::from_data(&[rows.len(), width], data)
}

/// Drives the outer refinement loop.
///
/// Round 0 consumes an externally supplied pretrained predictor matrix;
/// round k > 0 consumes round k-1's imputed output. The imputed matrix is
/// threaded between rounds as a value, never shared mutable state.
pub struct IterationDriver<S: RoundSink> {
    config: DriverConfig,
    sink: S,
}

impl<S: RoundSink> IterationDriver<S> {
    /// Creates a driver.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid
    pub fn new(config: DriverConfig, sink: S) -> TrainingResult<Self> {
        config.validate()?;
        Ok(Self { config, sink })
    }

    /// Returns the sink, consuming the driver.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Runs the configured number of rounds and returns the final imputed
    /// matrix.
    ///
    /// # Errors
    ///
    /// Input-validation and sink errors are fatal; per-entity errors are
    /// logged and skipped
    pub fn run(
        &mut self,
        observed: &SeriesMatrix,
        pretrained: &SeriesMatrix,
    ) -> TrainingResult<SeriesMatrix> {
        observed.validate()?;
        pretrained.validate()?;
        if observed.index() != pretrained.index() {
            return Err(TrainingError::IndexMismatch);
        }

        let mut predictors = pretrained.clone();
        for round in 0..self.config.rounds {
            info!(
                round,
                aquifer = %self.config.aquifer,
                entities = observed.num_columns(),
                "starting imputation round"
            );

            let mut summary = SummaryTable::new();
            let mut assembler = ImputationAssembler::new(observed.index())?;

            for entity in observed.column_ids() {
                let ctx = RoundContext {
                    round,
                    observed,
                    predictors: &predictors,
                    config: &self.config,
                };
                match process_entity(&ctx, entity) {
                    Ok(outcome) => {
                        let imputed_points = assembler.insert_filled(
                            entity,
                            observed.require_column(entity)?,
                            &outcome.predictions,
                        )?;
                        info!(
                            entity,
                            round,
                            imputed_points,
                            epochs = outcome.report.epochs,
                            "entity processed"
                        );
                        summary.push(outcome.metrics);
                    }
                    Err(err) => {
                        warn!(entity, round, error = %err, "skipping entity for this round");
                        assembler.insert_unchanged(entity, observed.require_column(entity)?)?;
                    }
                }
            }

            let imputed = assembler.into_matrix();
            self.sink.persist_round(round, &summary, &imputed)?;
            info!(
                round,
                processed = summary.len(),
                skipped = observed.num_columns() - summary.len(),
                "round complete"
            );
            predictors = imputed;
        }

        Ok(predictors)
    }
}
