//! Predictor selection and feature-matrix assembly.
//!
//! For each target well, a random-width subset of the most correlated
//! neighbor wells is selected by univariate F-statistic, standardized, and
//! joined with calendar-month indicator columns into one aligned feature
//! table.

use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

use crate::error::{DataError, DataResult};
use crate::series::SeriesMatrix;

/// Calendar month indicator column names, in calendar order.
pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Minimum selected predictor count.
const MIN_FEATURES: usize = 3;
/// Maximum selected predictor count.
const MAX_FEATURES: usize = 10;
/// Minimum pairwise-complete rows for a predictor to be scoreable.
const MIN_OVERLAP: usize = 3;

/// Picks a bounded-size random-width subset of the predictors most
/// associated with the target.
///
/// The subset width is drawn uniformly from `3..=min(10, candidates)` per
/// entity per round, which spreads regularization diversity across the
/// ensemble of per-well models.
#[derive(Debug, Clone, Default)]
pub struct FeatureSelector;

impl FeatureSelector {
    /// Creates a selector.
    pub fn new() -> Self {
        Self
    }

    /// Selects predictor column ids for `target_id`.
    ///
    /// Candidates are every column of `predictors` except the target's own
    /// (its own column would leak the answer). Each candidate is scored by
    /// the F-statistic of a univariate linear fit against the target over
    /// pairwise-complete rows; the top `k` by score are returned.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InsufficientPredictors`] if fewer than three
    /// candidates share enough observed rows with the target
    pub fn select(
        &self,
        predictors: &SeriesMatrix,
        target_id: &str,
        target: &[Option<f64>],
        rng: &mut StdRng,
    ) -> DataResult<Vec<String>> {
        let mut scored: Vec<(String, f64)> = Vec::new();
        for (id, column) in predictors.iter_columns() {
            if id == target_id {
                continue;
            }
            if let Some(score) = f_statistic(column, target) {
                scored.push((id.to_string(), score));
            }
        }

        if scored.len() < MIN_FEATURES {
            return Err(DataError::InsufficientPredictors {
                available: scored.len(),
                required: MIN_FEATURES,
            });
        }

        let k = rng.gen_range(MIN_FEATURES..=MAX_FEATURES.min(scored.len()));
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        debug!(target = target_id, k, "selected predictor columns");
        Ok(scored.into_iter().map(|(id, _)| id).collect())
    }
}

/// F-statistic of a univariate linear regression of `target` on `column`
/// over pairwise-complete rows, or `None` if too few rows overlap.
fn f_statistic(column: &[Option<f64>], target: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = column
        .iter()
        .zip(target.iter())
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    let n = pairs.len();
    if n < MIN_OVERLAP {
        return None;
    }

    let nf = n as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / nf;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / nf;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
        var_y += (y - mean_y).powi(2);
    }
    if var_x == 0.0 || var_y == 0.0 {
        // A constant column carries no association information.
        return Some(0.0);
    }
    let r2 = (cov * cov) / (var_x * var_y);
    let denom = 1.0 - r2;
    if denom <= f64::EPSILON {
        return Some(f64::INFINITY);
    }
    Some(r2 / denom * (nf - 2.0))
}

/// One assembled feature table: selected standardized predictors plus the
/// twelve month indicator columns, aligned on the shared date index.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    index: Vec<NaiveDate>,
    names: Vec<String>,
    columns: Vec<Vec<Option<f64>>>,
}

impl FeatureTable {
    /// Returns the date index.
    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    /// Returns the feature column names (predictors then months).
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of feature columns.
    pub fn width(&self) -> usize {
        self.names.len()
    }

    /// Number of date rows.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns row `i` if every feature is present there.
    pub fn complete_row(&self, i: usize) -> Option<Vec<f64>> {
        self.columns.iter().map(|c| c[i]).collect()
    }

    /// Positions of rows where every feature is present.
    ///
    /// Prediction is requested on exactly these rows, independent of target
    /// missingness.
    pub fn complete_rows(&self) -> Vec<usize> {
        (0..self.len())
            .filter(|&i| self.columns.iter().all(|c| c[i].is_some()))
            .collect()
    }

    /// Positions of rows usable for training: the target is present and
    /// every feature is present.
    pub fn training_rows(&self, target: &[Option<f64>]) -> Vec<usize> {
        (0..self.len())
            .filter(|&i| target[i].is_some() && self.columns.iter().all(|c| c[i].is_some()))
            .collect()
    }
}

/// Joins selected predictor columns with month indicators.
#[derive(Debug, Clone, Default)]
pub struct FeatureAssembler;

impl FeatureAssembler {
    /// Creates an assembler.
    pub fn new() -> Self {
        Self
    }

    /// Builds the feature table for one entity.
    ///
    /// `selected` pairs each chosen predictor id with its standardized
    /// column over `index`. Month indicators are always complete, so a row
    /// is complete exactly when all selected predictors are observed there.
    ///
    /// # Errors
    ///
    /// Returns an error if a selected column's length differs from the index
    pub fn assemble(
        &self,
        index: &[NaiveDate],
        selected: Vec<(String, Vec<Option<f64>>)>,
    ) -> DataResult<FeatureTable> {
        let mut names = Vec::with_capacity(selected.len() + MONTH_NAMES.len());
        let mut columns = Vec::with_capacity(selected.len() + MONTH_NAMES.len());

        for (id, values) in selected {
            if values.len() != index.len() {
                return Err(DataError::LengthMismatch {
                    column: id,
                    expected: index.len(),
                    actual: values.len(),
                });
            }
            names.push(id);
            columns.push(values);
        }

        for (month, name) in MONTH_NAMES.iter().enumerate() {
            let indicator: Vec<Option<f64>> = index
                .iter()
                .map(|date| Some(if date.month0() as usize == month { 1.0 } else { 0.0 }))
                .collect();
            names.push((*name).to_string());
            columns.push(indicator);
        }

        Ok(FeatureTable {
            index: index.to_vec(),
            names,
            columns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn daily_index(n: u32) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
        (0..n)
            .map(|i| start + chrono::Days::new(u64::from(i)))
            .collect()
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn matrix_with_predictors(n: usize, count: usize) -> SeriesMatrix {
        let mut matrix = SeriesMatrix::new(daily_index(n as u32)).unwrap();
        for p in 0..count {
            let column: Vec<Option<f64>> = (0..n)
                .map(|i| Some((i as f64) * (p as f64 + 1.0) + p as f64))
                .collect();
            matrix.insert_column(format!("well-{}", p), column).unwrap();
        }
        matrix
    }

    #[test]
    fn test_select_bounds_and_self_exclusion() {
        let matrix = matrix_with_predictors(50, 15);
        let target: Vec<Option<f64>> = (0..50).map(|i| Some(i as f64)).collect();
        let selector = FeatureSelector::new();

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let selected = selector
                .select(&matrix, "well-0", &target, &mut rng)
                .unwrap();
            assert!(selected.len() >= 3 && selected.len() <= 10);
            assert!(!selected.iter().any(|id| id == "well-0"));
        }
    }

    #[test]
    fn test_select_prefers_correlated_columns() {
        let n = 60;
        let mut matrix = SeriesMatrix::new(daily_index(n)).unwrap();
        // Three strongly correlated with the target, the rest constant noise.
        for p in 0..3 {
            let column: Vec<Option<f64>> =
                (0..n).map(|i| Some(f64::from(i) * 2.0 + f64::from(p))).collect();
            matrix.insert_column(format!("good-{}", p), column).unwrap();
        }
        for p in 0..5 {
            let column: Vec<Option<f64>> = (0..n)
                .map(|i| Some(if i % 2 == 0 { 1.0 } else { -1.0 } * f64::from(p + 1)))
                .collect();
            matrix.insert_column(format!("noise-{}", p), column).unwrap();
        }
        let target: Vec<Option<f64>> = (0..n).map(|i| Some(f64::from(i))).collect();

        let mut rng = rng();
        let selected = FeatureSelector::new()
            .select(&matrix, "other", &target, &mut rng)
            .unwrap();
        for good in ["good-0", "good-1", "good-2"] {
            assert!(selected.iter().any(|id| id == good), "{} missing", good);
        }
    }

    #[test]
    fn test_select_fails_without_overlap() {
        let n = 30;
        let mut matrix = SeriesMatrix::new(daily_index(n)).unwrap();
        matrix
            .insert_column("a", (0..n).map(|i| Some(f64::from(i))).collect())
            .unwrap();
        matrix
            .insert_column("b", (0..n).map(|i| Some(f64::from(i))).collect())
            .unwrap();
        // Only two candidates besides the target.
        let target: Vec<Option<f64>> = (0..n).map(|i| Some(f64::from(i))).collect();
        let result = FeatureSelector::new().select(&matrix, "c", &target, &mut rng());
        assert!(matches!(
            result,
            Err(DataError::InsufficientPredictors {
                available: 2,
                required: 3
            })
        ));
    }

    #[test]
    fn test_select_ignores_disjoint_columns() {
        let n = 40;
        let mut matrix = SeriesMatrix::new(daily_index(n as u32)).unwrap();
        for p in 0..3 {
            matrix
                .insert_column(
                    format!("full-{}", p),
                    (0..n).map(|i| Some(i as f64 + f64::from(p))).collect(),
                )
                .unwrap();
        }
        // Observed only where the target is missing.
        let disjoint: Vec<Option<f64>> = (0..n)
            .map(|i| if i < 10 { Some(1.0) } else { None })
            .collect();
        matrix.insert_column("disjoint", disjoint).unwrap();

        let target: Vec<Option<f64>> = (0..n)
            .map(|i| if i >= 10 { Some(i as f64) } else { None })
            .collect();

        let selected = FeatureSelector::new()
            .select(&matrix, "t", &target, &mut rng())
            .unwrap();
        assert!(!selected.iter().any(|id| id == "disjoint"));
    }

    #[test]
    fn test_assemble_adds_twelve_month_columns() {
        let index = daily_index(400);
        let selected = vec![(
            "p1".to_string(),
            (0..400).map(|i| Some(f64::from(i))).collect(),
        )];
        let table = FeatureAssembler::new().assemble(&index, selected).unwrap();
        assert_eq!(table.width(), 13);
        assert_eq!(table.names()[0], "p1");
        assert_eq!(table.names()[1], "January");
        assert_eq!(table.names()[12], "December");

        // Every January date sets only the January indicator.
        let row = table.complete_row(0).unwrap();
        assert_eq!(row[1], 1.0);
        assert_eq!(row[2..13].iter().sum::<f64>(), 0.0);
    }

    #[test]
    fn test_training_and_prediction_row_filters() {
        let index = daily_index(5);
        let predictor: Vec<Option<f64>> =
            vec![Some(1.0), None, Some(3.0), Some(4.0), Some(5.0)];
        let table = FeatureAssembler::new()
            .assemble(&index, vec![("p1".to_string(), predictor)])
            .unwrap();

        let target = vec![Some(0.1), Some(0.2), None, Some(0.4), None];

        // Complete feature rows ignore the target.
        assert_eq!(table.complete_rows(), vec![0, 2, 3, 4]);
        // Training additionally requires the target.
        assert_eq!(table.training_rows(&target), vec![0, 3]);
    }
}
