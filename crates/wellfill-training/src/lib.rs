//! Per-well model lifecycle and the iterative imputation driver.
//!
//! This crate ties the data layer and the network layers together:
//!
//! - [`RegressionNet`]: a scoped per-entity model (construct, train with
//!   [`EarlyStopping`], predict, discard)
//! - [`EntityMetrics`] / [`SummaryTable`]: one immutable summary row per
//!   successfully processed entity per round
//! - [`ImputationAssembler`]: merges predictions into observed series
//!   without ever overwriting an observation
//! - [`IterationDriver`]: the outer refinement loop, feeding each round's
//!   imputed output into the next round's predictor matrix and handing
//!   round artifacts to a [`RoundSink`]
//!
//! # Example
//!
//! ```no_run
//! use wellfill_data::SeriesMatrix;
//! use wellfill_training::{DriverConfig, IterationDriver, MemorySink};
//!
//! # fn load() -> (SeriesMatrix, SeriesMatrix) { unimplemented!() }
//! let (observed, pretrained) = load();
//! let mut driver = IterationDriver::new(DriverConfig::default(), MemorySink::new()).unwrap();
//! let imputed = driver.run(&observed, &pretrained).unwrap();
//! assert_eq!(imputed.num_columns(), observed.num_columns());
//! ```

pub mod driver;
pub mod error;
pub mod imputation;
pub mod metrics;
pub mod model;

pub use driver::{
    process_entity, DriverConfig, EntityOutcome, IterationDriver, MemorySink, RoundContext,
    RoundSink, SinkError,
};
pub use error::{TrainingError, TrainingResult};
pub use imputation::ImputationAssembler;
pub use metrics::{r2_score, EntityMetrics, ErrorStats, SummaryTable};
pub use model::{
    train_val_split, EarlyStopping, EpochRecord, RegressionNet, StopDecision, TrainConfig,
    TrainReport,
};
