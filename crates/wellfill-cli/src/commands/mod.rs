//! CLI command implementations.

mod impute;

pub use impute::ImputeCommand;
