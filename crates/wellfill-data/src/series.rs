//! Date-indexed series matrices.
//!
//! A [`SeriesMatrix`] holds one column per entity (well) over a single
//! shared date index. The index is strictly increasing and every column has
//! exactly one slot per date; missing observations are `None`.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};

/// A set of entity series sharing one ordered date index.
///
/// Column order is insertion order, so iterating entities is deterministic
/// across runs.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use wellfill_data::SeriesMatrix;
///
/// let index: Vec<NaiveDate> = (1..=3)
///     .map(|d| NaiveDate::from_ymd_opt(2020, 1, d).unwrap())
///     .collect();
/// let mut matrix = SeriesMatrix::new(index).unwrap();
/// matrix.insert_column("well-1", vec![Some(1.0), None, Some(3.0)]).unwrap();
/// assert_eq!(matrix.observed_count("well-1").unwrap(), 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesMatrix {
    /// The shared date index, strictly increasing
    index: Vec<NaiveDate>,
    /// One value column per entity, each `index.len()` long
    columns: IndexMap<String, Vec<Option<f64>>>,
}

impl SeriesMatrix {
    /// Creates an empty matrix over the given date index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is empty or not strictly increasing
    pub fn new(index: Vec<NaiveDate>) -> DataResult<Self> {
        if index.is_empty() {
            return Err(DataError::EmptyIndex);
        }
        for (i, pair) in index.windows(2).enumerate() {
            if pair[0] >= pair[1] {
                return Err(DataError::NonMonotonicIndex { position: i + 1 });
            }
        }
        Ok(Self {
            index,
            columns: IndexMap::new(),
        })
    }

    /// Validates the matrix invariants.
    ///
    /// Deserialized matrices bypass [`SeriesMatrix::new`]; loaders call this
    /// before handing the matrix to the pipeline.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant
    pub fn validate(&self) -> DataResult<()> {
        if self.index.is_empty() {
            return Err(DataError::EmptyIndex);
        }
        for (i, pair) in self.index.windows(2).enumerate() {
            if pair[0] >= pair[1] {
                return Err(DataError::NonMonotonicIndex { position: i + 1 });
            }
        }
        for (id, values) in &self.columns {
            if values.len() != self.index.len() {
                return Err(DataError::LengthMismatch {
                    column: id.clone(),
                    expected: self.index.len(),
                    actual: values.len(),
                });
            }
        }
        Ok(())
    }

    /// Inserts (or replaces) a column.
    ///
    /// # Errors
    ///
    /// Returns an error if the column length does not match the index
    pub fn insert_column(
        &mut self,
        id: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> DataResult<()> {
        let id = id.into();
        if values.len() != self.index.len() {
            return Err(DataError::LengthMismatch {
                column: id,
                expected: self.index.len(),
                actual: values.len(),
            });
        }
        self.columns.insert(id, values);
        Ok(())
    }

    /// Returns the shared date index.
    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    /// Returns the number of dates in the index.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns the number of entity columns.
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Returns a column by entity id.
    pub fn column(&self, id: &str) -> Option<&[Option<f64>]> {
        self.columns.get(id).map(|v| v.as_slice())
    }

    /// Returns a column by entity id, or an error if it does not exist.
    pub fn require_column(&self, id: &str) -> DataResult<&[Option<f64>]> {
        self.column(id)
            .ok_or_else(|| DataError::ColumnNotFound(id.to_string()))
    }

    /// Returns the entity ids in column order.
    pub fn column_ids(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }

    /// Iterates `(entity id, column)` pairs in column order.
    pub fn iter_columns(&self) -> impl Iterator<Item = (&str, &[Option<f64>])> {
        self.columns.iter().map(|(id, v)| (id.as_str(), v.as_slice()))
    }

    /// Returns the number of observed (non-missing) values in a column.
    ///
    /// # Errors
    ///
    /// Returns an error if the column does not exist
    pub fn observed_count(&self, id: &str) -> DataResult<usize> {
        Ok(self
            .require_column(id)?
            .iter()
            .filter(|v| v.is_some())
            .count())
    }

    /// Returns the number of missing values in a column.
    ///
    /// # Errors
    ///
    /// Returns an error if the column does not exist
    pub fn missing_count(&self, id: &str) -> DataResult<usize> {
        Ok(self.len() - self.observed_count(id)?)
    }

    /// Forward-fills every column, carrying each observation into at most
    /// `limit` following missing slots.
    pub fn forward_fill(&mut self, limit: usize) {
        for values in self.columns.values_mut() {
            forward_fill_column(values, limit);
        }
    }
}

/// Forward-fills a single column in place, carrying each observed value into
/// at most `limit` consecutive missing slots after it.
pub fn forward_fill_column(values: &mut [Option<f64>], limit: usize) {
    let mut last: Option<f64> = None;
    let mut carried = 0usize;
    for slot in values.iter_mut() {
        match slot {
            Some(v) => {
                last = Some(*v);
                carried = 0;
            }
            None => {
                if let Some(v) = last {
                    if carried < limit {
                        *slot = Some(v);
                        carried += 1;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn index(n: u32) -> Vec<NaiveDate> {
        (0..n)
            .map(|i| date(2020, 1, 1) + chrono::Days::new(u64::from(i)))
            .collect()
    }

    #[test]
    fn test_new_rejects_bad_index() {
        assert!(matches!(
            SeriesMatrix::new(vec![]),
            Err(DataError::EmptyIndex)
        ));

        let out_of_order = vec![date(2020, 1, 2), date(2020, 1, 1)];
        assert!(matches!(
            SeriesMatrix::new(out_of_order),
            Err(DataError::NonMonotonicIndex { position: 1 })
        ));
    }

    #[test]
    fn test_insert_column_length_check() {
        let mut matrix = SeriesMatrix::new(index(3)).unwrap();
        assert!(matrix.insert_column("w", vec![Some(1.0)]).is_err());
        assert!(matrix
            .insert_column("w", vec![Some(1.0), None, Some(2.0)])
            .is_ok());
        assert_eq!(matrix.num_columns(), 1);
        assert_eq!(matrix.observed_count("w").unwrap(), 2);
        assert_eq!(matrix.missing_count("w").unwrap(), 1);
    }

    #[test]
    fn test_column_order_is_insertion_order() {
        let mut matrix = SeriesMatrix::new(index(2)).unwrap();
        matrix.insert_column("zeta", vec![None, None]).unwrap();
        matrix.insert_column("alpha", vec![None, None]).unwrap();
        assert_eq!(matrix.column_ids(), vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_forward_fill_respects_limit() {
        let mut values = vec![Some(1.0), None, None, None, Some(5.0), None];
        forward_fill_column(&mut values, 2);
        assert_eq!(
            values,
            vec![Some(1.0), Some(1.0), Some(1.0), None, Some(5.0), Some(5.0)]
        );
    }

    #[test]
    fn test_forward_fill_leading_missing_untouched() {
        let mut values = vec![None, None, Some(2.0), None];
        forward_fill_column(&mut values, 5);
        assert_eq!(values, vec![None, None, Some(2.0), Some(2.0)]);
    }

    #[test]
    fn test_serde_round_trip() {
        let mut matrix = SeriesMatrix::new(index(2)).unwrap();
        matrix
            .insert_column("w1", vec![Some(1.5), None])
            .unwrap();

        let json = serde_json::to_string(&matrix).unwrap();
        let back: SeriesMatrix = serde_json::from_str(&json).unwrap();
        back.validate().unwrap();
        assert_eq!(back.column("w1").unwrap(), matrix.column("w1").unwrap());
        assert_eq!(back.index(), matrix.index());
    }

    #[test]
    fn test_validate_catches_bad_deserialized_lengths() {
        let json = r#"{
            "index": ["2020-01-01", "2020-01-02"],
            "columns": { "w1": [1.0] }
        }"#;
        let matrix: SeriesMatrix = serde_json::from_str(json).unwrap();
        assert!(matches!(
            matrix.validate(),
            Err(DataError::LengthMismatch { .. })
        ));
    }
}
