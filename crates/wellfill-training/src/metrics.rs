//! Per-entity error statistics and the round summary table.
//!
//! Every successfully processed entity appends one immutable row to the
//! round's summary. All error statistics are computed in original
//! measurement units; test fields stay `None` when the entity had no
//! evaluable holdout.

use serde::{Deserialize, Serialize};

/// Squared/absolute error statistics over one split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorStats {
    /// Mean squared error.
    pub mse: f64,
    /// Root mean squared error.
    pub rmse: f64,
    /// Mean absolute error.
    pub mae: f64,
}

impl ErrorStats {
    /// Computes the statistics from paired truth/prediction values.
    ///
    /// Returns `None` when the slices are empty or of different lengths.
    pub fn from_pairs(truth: &[f64], predictions: &[f64]) -> Option<Self> {
        if truth.is_empty() || truth.len() != predictions.len() {
            return None;
        }
        let n = truth.len() as f64;
        let mut sq = 0.0;
        let mut abs = 0.0;
        for (t, p) in truth.iter().zip(predictions.iter()) {
            let diff = t - p;
            sq += diff * diff;
            abs += diff.abs();
        }
        let mse = sq / n;
        Some(Self {
            mse,
            rmse: mse.sqrt(),
            mae: abs / n,
        })
    }
}

/// Coefficient of determination of `predictions` against `truth`.
///
/// Returns `None` when fewer than two points are available or the truth has
/// zero variance (the score is undefined there).
pub fn r2_score(truth: &[f64], predictions: &[f64]) -> Option<f64> {
    if truth.len() < 2 || truth.len() != predictions.len() {
        return None;
    }
    let n = truth.len() as f64;
    let mean = truth.iter().sum::<f64>() / n;
    let ss_tot: f64 = truth.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return None;
    }
    let ss_res: f64 = truth
        .iter()
        .zip(predictions.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    Some(1.0 - ss_res / ss_tot)
}

/// One summary row: an entity's split metrics for one round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMetrics {
    /// The entity this row describes.
    pub entity: String,
    /// Training-split error statistics.
    pub train: ErrorStats,
    /// Training-split point count.
    pub train_points: usize,
    /// Validation-split error statistics.
    pub validation: ErrorStats,
    /// Validation-split point count.
    pub validation_points: usize,
    /// Test-holdout error statistics, when a holdout was evaluable.
    pub test: Option<ErrorStats>,
    /// Test-holdout point count (zero when no holdout was evaluable).
    pub test_points: usize,
    /// Test-holdout coefficient of determination.
    pub test_r2: Option<f64>,
    /// Coefficient of determination over all complete-case rows.
    pub r2: Option<f64>,
}

impl EntityMetrics {
    /// Creates a row from the train/validation results.
    pub fn new(
        entity: impl Into<String>,
        train: ErrorStats,
        train_points: usize,
        validation: ErrorStats,
        validation_points: usize,
    ) -> Self {
        Self {
            entity: entity.into(),
            train,
            train_points,
            validation,
            validation_points,
            test: None,
            test_points: 0,
            test_r2: None,
            r2: None,
        }
    }

    /// Attaches test-holdout results.
    pub fn with_test(mut self, stats: ErrorStats, points: usize, r2: Option<f64>) -> Self {
        self.test = Some(stats);
        self.test_points = points;
        self.test_r2 = r2;
        self
    }

    /// Attaches the full-series coefficient of determination.
    pub fn with_r2(mut self, r2: Option<f64>) -> Self {
        self.r2 = r2;
        self
    }
}

/// Append-only per-round summary of entity metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryTable {
    rows: Vec<EntityMetrics>,
}

impl SummaryTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one entity's row.
    pub fn push(&mut self, row: EntityMetrics) {
        self.rows.push(row);
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if no entity succeeded yet.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the rows in processing order.
    pub fn rows(&self) -> &[EntityMetrics] {
        &self.rows
    }

    /// Looks up an entity's row.
    pub fn get(&self, entity: &str) -> Option<&EntityMetrics> {
        self.rows.iter().find(|row| row.entity == entity)
    }
}
