//! Wellfill CLI - iterative imputation of well water-level series.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wellfill_cli::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("wellfill=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Impute(cmd) => cmd.run()?,
    }

    info!("wellfill completed successfully");
    Ok(())
}
