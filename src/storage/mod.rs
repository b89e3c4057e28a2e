//! Storage module for persisting ETL data
//!
//! This module handles all database operations for the pipeline, including:
//! - SQLite database initialization and schema management
//! - Upserting staged monitoring locations
//! - Rebuilding the display view
//! - Run and failed-location tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

/// Represents an ETL run
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub endpoint: String,
    pub status: RunStatus,
    pub records_fetched: u64,
    pub records_loaded: u64,
    pub records_failed: u64,
    pub abort_reason: Option<String>,
}

/// Final counters of a run, written when it finishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub status: RunStatus,
    pub records_fetched: u64,
    pub records_loaded: u64,
    pub records_failed: u64,
    pub abort_reason: Option<String>,
}

/// A location that was fetched but never reached the staging table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedLocation {
    pub agency_cd: Option<String>,
    pub site_no: Option<String>,
    pub error: String,
}

/// Status of an ETL run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    /// Every fetched location was loaded
    Completed,
    /// Finished, but pages were skipped or locations failed
    Partial,
    /// Extraction gave up; nothing was loaded
    Aborted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "partial" => Some(Self::Partial),
            "aborted" => Some(Self::Aborted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
