//! Well Registry ETL: monitoring locations from the well registry API
//!
//! This crate pages through the registry's monitoring-locations listing,
//! surviving flaky networks and malformed pages, then transforms every
//! location into a staging row and upserts it into SQLite.

pub mod config;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod storage;
pub mod transform;

use thiserror::Error;

/// Main error type for ETL operations
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction error: {0}")]
    Extract(#[from] extract::ExtractError),

    #[error("Transform error: {0}")]
    Transform(#[from] transform::TransformError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for ETL operations
pub type Result<T> = std::result::Result<T, EtlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use extract::{extract_monitoring_locations, RunOutcome};
pub use pipeline::{run_pipeline, PipelineReport};
