//! Merging model predictions into observed series.
//!
//! Imputation never overwrites an observation: a filled column keeps every
//! observed value and substitutes the entity's (inverse-scaled) prediction
//! only where the original was missing.

use chrono::NaiveDate;
use wellfill_data::{DataResult, SeriesMatrix};

use crate::error::{TrainingError, TrainingResult};

/// Accumulates one round's filled columns into a fresh matrix on the shared
/// date index.
#[derive(Debug, Clone)]
pub struct ImputationAssembler {
    matrix: SeriesMatrix,
}

impl ImputationAssembler {
    /// Creates an assembler over the round's date index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index violates the matrix invariants
    pub fn new(index: &[NaiveDate]) -> DataResult<Self> {
        Ok(Self {
            matrix: SeriesMatrix::new(index.to_vec())?,
        })
    }

    /// Merges an entity's predictions into its observed series and stores
    /// the filled column. Returns the number of imputed slots.
    ///
    /// # Errors
    ///
    /// Returns an error if the column lengths disagree with the index
    pub fn insert_filled(
        &mut self,
        entity: &str,
        observed: &[Option<f64>],
        predictions: &[Option<f64>],
    ) -> TrainingResult<usize> {
        if observed.len() != predictions.len() {
            return Err(TrainingError::IndexMismatch);
        }
        let mut imputed = 0;
        let filled: Vec<Option<f64>> = observed
            .iter()
            .zip(predictions.iter())
            .map(|(obs, pred)| match obs {
                Some(v) => Some(*v),
                None => {
                    if pred.is_some() {
                        imputed += 1;
                    }
                    *pred
                }
            })
            .collect();
        self.matrix.insert_column(entity, filled)?;
        Ok(imputed)
    }

    /// Stores an entity's observed series unchanged.
    ///
    /// Used for entities that failed processing this round: their pre-round
    /// missingness is preserved exactly.
    ///
    /// # Errors
    ///
    /// Returns an error if the column length disagrees with the index
    pub fn insert_unchanged(&mut self, entity: &str, observed: &[Option<f64>]) -> TrainingResult<()> {
        self.matrix.insert_column(entity, observed.to_vec())?;
        Ok(())
    }

    /// Finishes the round and hands back the imputed matrix.
    pub fn into_matrix(self) -> SeriesMatrix {
        self.matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(n: u32) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        (0..n)
            .map(|i| start + chrono::Days::new(u64::from(i)))
            .collect()
    }

    #[test]
    fn test_fill_never_overwrites_observed() {
        let mut assembler = ImputationAssembler::new(&index(4)).unwrap();
        let observed = vec![Some(1.0), None, Some(3.0), None];
        let predictions = vec![Some(9.0), Some(2.0), Some(9.0), Some(4.0)];

        let imputed = assembler
            .insert_filled("w", &observed, &predictions)
            .unwrap();
        assert_eq!(imputed, 2);

        let matrix = assembler.into_matrix();
        assert_eq!(
            matrix.column("w").unwrap(),
            &[Some(1.0), Some(2.0), Some(3.0), Some(4.0)]
        );
    }

    #[test]
    fn test_fill_leaves_unpredicted_slots_missing() {
        let mut assembler = ImputationAssembler::new(&index(3)).unwrap();
        let observed = vec![Some(1.0), None, None];
        let predictions = vec![None, Some(2.0), None];

        let imputed = assembler
            .insert_filled("w", &observed, &predictions)
            .unwrap();
        assert_eq!(imputed, 1);

        let matrix = assembler.into_matrix();
        assert_eq!(
            matrix.column("w").unwrap(),
            &[Some(1.0), Some(2.0), None]
        );
    }

    #[test]
    fn test_insert_unchanged_preserves_missingness() {
        let mut assembler = ImputationAssembler::new(&index(3)).unwrap();
        let observed = vec![None, Some(2.0), None];
        assembler.insert_unchanged("w", &observed).unwrap();

        let matrix = assembler.into_matrix();
        assert_eq!(matrix.column("w").unwrap(), observed.as_slice());
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let mut assembler = ImputationAssembler::new(&index(3)).unwrap();
        let observed = vec![Some(1.0), None];
        let predictions = vec![Some(1.0), Some(2.0), Some(3.0)];
        assert!(assembler
            .insert_filled("w", &observed, &predictions)
            .is_err());
    }
}
