//! Impute Command Implementation
//!
//! Loads the observed and pretrained matrices, runs the iterative
//! refinement loop, and writes each round's artifacts into the output
//! directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use wellfill_data::{GapConfig, SeriesMatrix};
use wellfill_training::{
    DriverConfig, IterationDriver, RoundSink, SinkError, SummaryTable, TrainConfig,
};

/// Run the iterative imputation pipeline
///
/// Reads two JSON `SeriesMatrix` artifacts (the raw observations and the
/// round-0 predictor matrix), runs the configured number of refinement
/// rounds, and writes `metrics_round_<k>.json` and `imputed_round_<k>.json`
/// per round.
///
/// # Example
///
/// ```bash
/// wellfill impute \
///     --observed data/observed.json \
///     --pretrained data/pretrained.json \
///     --out-dir out/ \
///     --rounds 2
/// ```
#[derive(Args, Debug, Clone)]
pub struct ImputeCommand {
    /// Path to the observed matrix (JSON, gaps intact)
    #[arg(long)]
    pub observed: PathBuf,

    /// Path to the round-0 predictor matrix (JSON, pre-filled)
    #[arg(long)]
    pub pretrained: PathBuf,

    /// Directory for per-round artifacts
    #[arg(long, short = 'o', default_value = "./imputed")]
    pub out_dir: PathBuf,

    /// Aquifer label, used for logging and output naming only
    #[arg(long, default_value = "")]
    pub aquifer: String,

    /// Number of refinement rounds
    #[arg(long, default_value = "2")]
    pub rounds: usize,

    /// Base random seed
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Disable the synthetic test holdout
    #[arg(long)]
    pub no_test_set: bool,

    /// Forward-fill observed gaps up to N consecutive slots before imputing
    #[arg(long)]
    pub ffill_limit: Option<usize>,

    /// Validation fraction (default 0.25, or 0.30 with --no-test-set)
    #[arg(long)]
    pub validation_split: Option<f64>,

    /// Minimum observed points that must survive holdout blanking
    #[arg(long, default_value = "1")]
    pub min_points: usize,

    /// Holdout windows may not start before this year
    #[arg(long, default_value = "2000")]
    pub cut_left: i32,

    /// Holdout window length in years
    #[arg(long, default_value = "5")]
    pub gap_years: u32,

    /// Candidate window draws before giving up
    #[arg(long, default_value = "15")]
    pub max_tries: u32,

    /// Maximum number of separate holdout windows
    #[arg(long, default_value = "1")]
    pub max_gaps: usize,

    /// Hidden layer width
    #[arg(long, default_value = "50")]
    pub hidden: usize,

    /// Adam learning rate
    #[arg(long, default_value = "0.001")]
    pub learning_rate: f32,

    /// L2 penalty on the hidden kernel
    #[arg(long, default_value = "0.01")]
    pub l2: f32,

    /// Dropout rate after the hidden activation
    #[arg(long, default_value = "0.2")]
    pub dropout: f32,

    /// Early-stopping patience in epochs
    #[arg(long, default_value = "5")]
    pub patience: u32,

    /// Hard cap on training epochs
    #[arg(long, default_value = "700")]
    pub max_epochs: u32,
}

impl ImputeCommand {
    /// Executes the command.
    pub fn run(&self) -> Result<()> {
        let mut observed = load_matrix(&self.observed)?;
        let pretrained = load_matrix(&self.pretrained)?;

        if let Some(limit) = self.ffill_limit {
            observed.forward_fill(limit);
        }

        info!(
            aquifer = %self.aquifer,
            entities = observed.num_columns(),
            dates = observed.len(),
            rounds = self.rounds,
            "starting imputation run"
        );

        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("failed to create {}", self.out_dir.display()))?;

        let config = self.driver_config();
        let sink = DirectorySink::new(self.out_dir.clone(), self.aquifer.clone());
        let mut driver = IterationDriver::new(config, sink)?;
        let imputed = driver.run(&observed, &pretrained)?;

        info!(
            entities = imputed.num_columns(),
            out_dir = %self.out_dir.display(),
            "imputation run finished"
        );
        Ok(())
    }

    fn driver_config(&self) -> DriverConfig {
        let validation_split = self
            .validation_split
            .unwrap_or(if self.no_test_set { 0.30 } else { 0.25 });
        DriverConfig {
            aquifer: self.aquifer.clone(),
            rounds: self.rounds,
            seed: self.seed,
            use_test_holdout: !self.no_test_set,
            gap: GapConfig {
                min_points: self.min_points,
                cut_left_year: self.cut_left,
                gap_years: self.gap_years,
                max_tries: self.max_tries,
                max_gaps: self.max_gaps,
                randomize: true,
            },
            train: TrainConfig {
                hidden_units: self.hidden,
                learning_rate: self.learning_rate,
                l2_penalty: self.l2,
                dropout_rate: self.dropout,
                patience: self.patience,
                max_epochs: self.max_epochs,
                validation_split,
                ..TrainConfig::default()
            },
            ..DriverConfig::default()
        }
    }
}

fn load_matrix(path: &Path) -> Result<SeriesMatrix> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let matrix: SeriesMatrix = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    matrix
        .validate()
        .with_context(|| format!("invalid series matrix in {}", path.display()))?;
    Ok(matrix)
}

/// Writes each round's artifacts as JSON files into a directory.
///
/// A non-empty aquifer label is prefixed (sanitized) onto every file name.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    label: String,
}

impl DirectorySink {
    /// Creates a sink writing into `dir`.
    pub fn new(dir: PathBuf, label: impl Into<String>) -> Self {
        let label: String = label
            .into()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        Self { dir, label }
    }

    fn artifact_path(&self, stem: &str, round: usize) -> PathBuf {
        let name = if self.label.is_empty() {
            format!("{}_round_{}.json", stem, round)
        } else {
            format!("{}_{}_round_{}.json", self.label, stem, round)
        };
        self.dir.join(name)
    }
}

impl RoundSink for DirectorySink {
    fn persist_round(
        &mut self,
        round: usize,
        summary: &SummaryTable,
        imputed: &SeriesMatrix,
    ) -> Result<(), SinkError> {
        let metrics_path = self.artifact_path("metrics", round);
        fs::write(&metrics_path, serde_json::to_string_pretty(summary)?)?;

        let imputed_path = self.artifact_path("imputed", round);
        fs::write(&imputed_path, serde_json::to_string_pretty(imputed)?)?;

        info!(
            round,
            metrics = %metrics_path.display(),
            imputed = %imputed_path.display(),
            "persisted round artifacts"
        );
        Ok(())
    }
}
