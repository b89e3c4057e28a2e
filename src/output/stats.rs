//! Statistics generation from the ETL database
//!
//! This module provides functionality for extracting and displaying
//! run statistics from the storage layer.

use crate::storage::{FailedLocation, RunRecord, Storage};
use crate::EtlError;

/// ETL statistics summary
#[derive(Debug, Clone)]
pub struct RunStatistics {
    /// Most recent run, if any
    pub latest_run: Option<RunRecord>,

    /// Number of locations in the staging table
    pub staged_locations: u64,

    /// Number of locations in the display view
    pub displayed_locations: u64,

    /// Locations the latest run could not load
    pub failed_locations: Vec<FailedLocation>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(RunStatistics)` - Successfully loaded statistics
/// * `Err(EtlError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<RunStatistics, EtlError> {
    let latest_run = storage.get_latest_run()?;

    let failed_locations = match &latest_run {
        Some(run) => storage.get_failed_locations(run.id)?,
        None => Vec::new(),
    };

    Ok(RunStatistics {
        latest_run,
        staged_locations: storage.count_staged_locations()?,
        displayed_locations: storage.count_displayed_locations()?,
        failed_locations,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &RunStatistics) {
    println!("=== Well Registry ETL Statistics ===\n");

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run:");
            println!("  ID: {}", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Endpoint: {}", run.endpoint);
            println!("  Started: {}", run.started_at);
            println!(
                "  Finished: {}",
                run.finished_at.as_deref().unwrap_or("(still running)")
            );
            println!("  Config hash: {}", run.config_hash);
            println!("  Records fetched: {}", run.records_fetched);
            println!("  Records loaded: {}", run.records_loaded);
            println!("  Records failed: {}", run.records_failed);
            if let Some(reason) = &run.abort_reason {
                println!("  Abort reason: {}", reason);
            }
        }
        None => println!("No runs recorded yet."),
    }
    println!();

    println!("Tables:");
    println!("  Staged locations: {}", stats.staged_locations);
    println!("  Displayed locations: {}", stats.displayed_locations);
    println!();

    if !stats.failed_locations.is_empty() {
        println!("Failed Locations ({}):", stats.failed_locations.len());
        for failure in &stats.failed_locations {
            println!(
                "  - ({}, {}): {}",
                failure.agency_cd.as_deref().unwrap_or("?"),
                failure.site_no.as_deref().unwrap_or("?"),
                failure.error
            );
        }
        println!();
    }

    let load_rate = match &stats.latest_run {
        Some(run) if run.records_fetched > 0 => {
            (run.records_loaded as f64 / run.records_fetched as f64) * 100.0
        }
        _ => 0.0,
    };
    println!("Load Rate: {:.1}%", load_rate);
}
