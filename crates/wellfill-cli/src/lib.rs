//! Wellfill CLI Library
//!
//! Command-line interface for the iterative well water-level imputation
//! pipeline: load the observed and pretrained JSON matrices, run the
//! configured number of refinement rounds, and persist each round's
//! summary metrics and imputed matrix.
//!
//! # Example
//!
//! ```bash
//! # Two refinement rounds over an aquifer's wells
//! wellfill impute \
//!     --observed data/observed.json \
//!     --pretrained data/pretrained.json \
//!     --out-dir out/ \
//!     --aquifer "Escalante-Beryl, UT" \
//!     --rounds 2
//! ```

pub mod commands;

use clap::{Parser, Subcommand};

pub use commands::ImputeCommand;

/// Wellfill - iterative imputation of well water-level series
///
/// Fills gaps in correlated date-indexed well records by training one
/// feed-forward regression model per well per round, feeding each round's
/// imputed output into the next round's predictor matrix.
#[derive(Parser, Debug)]
#[command(name = "wellfill")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the iterative imputation pipeline
    Impute(ImputeCommand),
}
