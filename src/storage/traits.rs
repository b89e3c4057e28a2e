//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{FailedLocation, RunRecord, RunSummary};
use crate::transform::StagingRow;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the pipeline.
/// Writes are attempted once; failures are returned to the caller.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new ETL run in the `running` state
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    /// * `endpoint` - Registry endpoint the run extracts from
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str, endpoint: &str) -> StorageResult<i64>;

    /// Records the final state and counters of a run
    fn finish_run(&mut self, run_id: i64, summary: &RunSummary) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    // ===== Staging =====

    /// Inserts a location, or updates every non-key column if it exists
    fn upsert_location(&mut self, row: &StagingRow) -> StorageResult<()>;

    /// Gets a staged location as column → text value
    fn get_staged_location(
        &self,
        agency_cd: &str,
        site_no: &str,
    ) -> StorageResult<Option<HashMap<String, Option<String>>>>;

    /// Counts all staged locations
    fn count_staged_locations(&self) -> StorageResult<u64>;

    // ===== Display View =====

    /// Rebuilds the display view from the staging table
    ///
    /// # Returns
    ///
    /// The number of rows in the refreshed view
    fn refresh_registry_view(&mut self) -> StorageResult<u64>;

    /// Counts locations in the display view
    fn count_displayed_locations(&self) -> StorageResult<u64>;

    // ===== Failed Locations =====

    /// Records a location that could not be transformed or loaded
    fn record_failed_location(
        &mut self,
        run_id: i64,
        failure: &FailedLocation,
    ) -> StorageResult<()>;

    /// Gets the failed locations of a run, in recording order
    fn get_failed_locations(&self, run_id: i64) -> StorageResult<Vec<FailedLocation>>;
}
