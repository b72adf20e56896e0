//! Date-indexed series matrices and preprocessing for well imputation.
//!
//! This crate carries the tabular side of the pipeline:
//!
//! - [`SeriesMatrix`]: entity columns over one shared, strictly increasing
//!   date index
//! - [`MinMaxScaler`] / [`StandardScaler`]: per-entity scaling with exact
//!   inversion
//! - [`GapSplitter`]: synthetic test-holdout windows for scoring against
//!   known-but-hidden truth
//! - [`FeatureSelector`] / [`FeatureAssembler`]: random-width F-statistic
//!   predictor selection and month-indicator feature tables

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod features;
pub mod gap;
pub mod scaler;
pub mod series;

pub use error::{DataError, DataResult};
pub use features::{FeatureAssembler, FeatureSelector, FeatureTable, MONTH_NAMES};
pub use gap::{GapConfig, GapSplitter, TestHoldout};
pub use scaler::{MinMaxScaler, StandardScaler};
pub use series::{forward_fill_column, SeriesMatrix};
