//! Command-line interface for sweep_forge.
//!
//! Provides the `sweep` command for fitting a whole grid and `train` for a
//! single configuration.

mod commands;

pub use commands::{parse_cli, run, run_with_cli};
