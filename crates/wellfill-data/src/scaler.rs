//! Per-entity value scaling.
//!
//! Two scalers are fit from scratch for every entity in every round: a
//! bounded-range scaler on the target series and a zero-mean/unit-variance
//! scaler on each selected predictor column. Both skip missing values when
//! fitting and invert exactly, so metrics and imputed values can be reported
//! in original measurement units.

use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};

/// Maps observed values into `[0, 1]` (observed min to 0, max to 1).
///
/// A zero-range series scales by 1.0, so transform degenerates to a shift.
///
/// # Example
///
/// ```
/// use wellfill_data::MinMaxScaler;
///
/// let values = vec![Some(10.0), None, Some(30.0)];
/// let scaler = MinMaxScaler::fit("w", &values).unwrap();
/// assert_eq!(scaler.transform(10.0), 0.0);
/// assert_eq!(scaler.transform(30.0), 1.0);
/// assert_eq!(scaler.inverse(0.5), 20.0);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MinMaxScaler {
    /// Smallest observed value
    data_min: f64,
    /// Largest observed value
    data_max: f64,
}

impl MinMaxScaler {
    /// Fits the scaler on a column's observed values.
    ///
    /// # Errors
    ///
    /// Returns an error if the column has no observed values
    pub fn fit(column: &str, values: &[Option<f64>]) -> DataResult<Self> {
        let mut observed = values.iter().flatten();
        let first = observed.next().ok_or_else(|| DataError::NoObservations {
            column: column.to_string(),
        })?;
        let (mut data_min, mut data_max) = (*first, *first);
        for v in observed {
            data_min = data_min.min(*v);
            data_max = data_max.max(*v);
        }
        Ok(Self { data_min, data_max })
    }

    fn range(&self) -> f64 {
        let range = self.data_max - self.data_min;
        if range == 0.0 {
            1.0
        } else {
            range
        }
    }

    /// Scales a value into the unit range.
    pub fn transform(&self, value: f64) -> f64 {
        (value - self.data_min) / self.range()
    }

    /// Scales a whole column, passing missing values through.
    pub fn transform_series(&self, values: &[Option<f64>]) -> Vec<Option<f64>> {
        values.iter().map(|v| v.map(|x| self.transform(x))).collect()
    }

    /// Maps a scaled value back to original units.
    pub fn inverse(&self, value: f64) -> f64 {
        value * self.range() + self.data_min
    }
}

/// Standardizes one predictor column to zero mean and unit variance.
///
/// A zero-variance column divides by 1.0 instead, so transform degenerates
/// to a shift.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Mean of observed values
    mean: f64,
    /// Population standard deviation of observed values
    std: f64,
}

impl StandardScaler {
    /// Fits the scaler on a column's observed values.
    ///
    /// # Errors
    ///
    /// Returns an error if the column has no observed values
    pub fn fit(column: &str, values: &[Option<f64>]) -> DataResult<Self> {
        let observed: Vec<f64> = values.iter().flatten().copied().collect();
        if observed.is_empty() {
            return Err(DataError::NoObservations {
                column: column.to_string(),
            });
        }
        let n = observed.len() as f64;
        let mean = observed.iter().sum::<f64>() / n;
        let var = observed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        Ok(Self {
            mean,
            std: if std == 0.0 { 1.0 } else { std },
        })
    }

    /// Standardizes a value.
    pub fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.std
    }

    /// Standardizes a whole column, passing missing values through.
    pub fn transform_series(&self, values: &[Option<f64>]) -> Vec<Option<f64>> {
        values.iter().map(|v| v.map(|x| self.transform(x))).collect()
    }

    /// Maps a standardized value back to original units.
    pub fn inverse(&self, value: f64) -> f64 {
        value * self.std + self.mean
    }
}
