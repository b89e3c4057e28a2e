//! Output module for reporting on ETL runs
//!
//! This module handles:
//! - Loading statistics for the latest run from storage
//! - Printing them for the `--stats` command

pub mod stats;

pub use stats::{load_statistics, print_statistics, RunStatistics};
