//! ETL pipeline
//!
//! Runs one extraction against the registry, loads what it returned into the
//! staging table and refreshes the display view. Every run is recorded in the
//! `runs` table together with its outcome.

mod coordinator;

pub use coordinator::{run_pipeline, Coordinator, PipelineReport};
