//! Configuration module for the well registry ETL
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! The registry endpoint and database path may be overridden from the
//! environment (`REGISTRY_ML_ENDPOINT`, `DATABASE_PATH`).
//!
//! # Example
//!
//! ```no_run
//! use well_registry_etl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Fetching {} records per page", config.fetch.page_size);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, DatabaseConfig, FetchConfig, RegistryConfig};

// Re-export parser functions
pub use parser::{
    apply_env_overrides, compute_config_hash, load_config, load_config_with_hash,
    DATABASE_PATH_VAR, ENDPOINT_VAR,
};
pub use validation::validate;
