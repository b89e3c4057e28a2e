//! Pipeline coordinator - one extract, transform and load run
//!
//! This module ties the stages together:
//! - Recording the run in storage
//! - Extracting every monitoring location from the registry
//! - Transforming and upserting each location, collecting failures
//! - Refreshing the display view
//! - Recording how the run ended

use crate::config::Config;
use crate::extract::{Extractor, RunOutcome};
use crate::storage::{FailedLocation, RunStatus, RunSummary, SqliteStorage, Storage};
use crate::transform::{location_key, transform_location};
use crate::EtlError;
use serde_json::Value;
use std::path::Path;

/// Summary of a finished pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub run_id: i64,
    pub status: RunStatus,
    pub records_fetched: u64,
    pub records_loaded: u64,
    pub displayed: u64,
    pub skipped_pages: Vec<String>,
    pub failed_locations: Vec<FailedLocation>,
    pub abort_reason: Option<String>,
}

impl PipelineReport {
    pub fn is_aborted(&self) -> bool {
        self.status == RunStatus::Aborted
    }
}

/// Main pipeline coordinator structure
pub struct Coordinator {
    config: Config,
    config_hash: String,
    storage: SqliteStorage,
}

impl Coordinator {
    /// Creates a new coordinator, opening the configured database
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `config_hash` - Hash of the configuration file, stored with the run
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(EtlError)` - Failed to open storage
    pub fn new(config: Config, config_hash: String) -> Result<Self, EtlError> {
        let storage = SqliteStorage::new(Path::new(&config.database.path))?;
        Ok(Self::with_storage(config, config_hash, storage))
    }

    /// Creates a coordinator around already-open storage
    pub fn with_storage(config: Config, config_hash: String, storage: SqliteStorage) -> Self {
        Self {
            config,
            config_hash,
            storage,
        }
    }

    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Runs the pipeline once
    ///
    /// An aborted extraction is a normal outcome and is reported, not
    /// returned as an error. Errors mean the run could not be carried out
    /// (storage failure, broken retry loop) and leave the run marked `failed`
    /// where possible.
    pub async fn run(&mut self) -> Result<PipelineReport, EtlError> {
        let endpoint = self.config.registry.endpoint.clone();
        let run_id = self.storage.create_run(&self.config_hash, &endpoint)?;
        tracing::info!("Starting run {} against {}", run_id, endpoint);

        let outcome = match self.extract().await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.mark_failed(run_id, &e);
                return Err(e);
            }
        };

        let reason = outcome.reason();
        let finished = match outcome {
            RunOutcome::Completed {
                records,
                skipped_pages,
            } => self.load(run_id, records, skipped_pages),
            RunOutcome::AbortedOnParseTolerance {
                discarded,
                last_failure,
                ..
            } => self.finish_aborted(run_id, reason, discarded, last_failure.to_string()),
            RunOutcome::AbortedOnFetchFailure { discarded, failure } => {
                self.finish_aborted(run_id, reason, discarded, failure.to_string())
            }
        };

        finished.map_err(|e| {
            self.mark_failed(run_id, &e);
            e
        })
    }

    /// The extractor and its connections are dropped before loading starts
    async fn extract(&self) -> Result<RunOutcome, EtlError> {
        let extractor = Extractor::new(&self.config.registry, &self.config.fetch)?;
        let outcome = extractor.extract_all(&self.config.registry.endpoint).await?;
        Ok(outcome)
    }

    fn load(
        &mut self,
        run_id: i64,
        records: Vec<Value>,
        skipped_pages: Vec<String>,
    ) -> Result<PipelineReport, EtlError> {
        let records_fetched = records.len() as u64;
        let mut records_loaded = 0u64;
        let mut failed_locations = Vec::new();

        for record in &records {
            match self.load_location(record) {
                Ok(()) => records_loaded += 1,
                Err(failure) => {
                    tracing::debug!(
                        "Location {:?}/{:?} failed: {}",
                        failure.agency_cd,
                        failure.site_no,
                        failure.error
                    );
                    failed_locations.push(failure);
                }
            }
        }

        for failure in &failed_locations {
            self.storage.record_failed_location(run_id, failure)?;
        }

        let displayed = self.storage.refresh_registry_view()?;

        if !failed_locations.is_empty() {
            let listing: Vec<String> = failed_locations
                .iter()
                .map(|f| {
                    format!(
                        "\t({}, {}): {}",
                        f.agency_cd.as_deref().unwrap_or("?"),
                        f.site_no.as_deref().unwrap_or("?"),
                        f.error
                    )
                })
                .collect();
            tracing::warn!(
                "The following agency locations failed to insert/update:\n{}",
                listing.join("\n")
            );
        }

        let status = if failed_locations.is_empty() && skipped_pages.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::Partial
        };

        let summary = RunSummary {
            status,
            records_fetched,
            records_loaded,
            records_failed: failed_locations.len() as u64,
            abort_reason: None,
        };
        self.storage.finish_run(run_id, &summary)?;

        tracing::info!(
            "Run {} {}: {} fetched, {} loaded, {} failed, {} displayed, {} pages skipped",
            run_id,
            status.to_db_string(),
            records_fetched,
            records_loaded,
            failed_locations.len(),
            displayed,
            skipped_pages.len()
        );

        Ok(PipelineReport {
            run_id,
            status,
            records_fetched,
            records_loaded,
            displayed,
            skipped_pages,
            failed_locations,
            abort_reason: None,
        })
    }

    /// Transforms and upserts one record; storage writes are not retried
    fn load_location(&mut self, record: &Value) -> Result<(), FailedLocation> {
        let row = transform_location(record).map_err(|e| {
            let (agency_cd, site_no) = location_key(record);
            FailedLocation {
                agency_cd,
                site_no,
                error: e.to_string(),
            }
        })?;

        self.storage
            .upsert_location(&row)
            .map_err(|e| FailedLocation {
                agency_cd: Some(row.agency_cd()),
                site_no: Some(row.site_no()),
                error: e.to_string(),
            })
    }

    fn finish_aborted(
        &mut self,
        run_id: i64,
        reason: &'static str,
        discarded: usize,
        detail: String,
    ) -> Result<PipelineReport, EtlError> {
        let abort_reason = format!("{}: {}", reason, detail);
        let displayed = self.storage.count_displayed_locations()?;

        self.storage.finish_run(
            run_id,
            &RunSummary {
                status: RunStatus::Aborted,
                records_fetched: discarded as u64,
                records_loaded: 0,
                records_failed: 0,
                abort_reason: Some(abort_reason.clone()),
            },
        )?;

        tracing::error!(
            "Run {} aborted, nothing loaded ({} records discarded): {}",
            run_id,
            discarded,
            abort_reason
        );

        Ok(PipelineReport {
            run_id,
            status: RunStatus::Aborted,
            records_fetched: discarded as u64,
            records_loaded: 0,
            displayed,
            skipped_pages: Vec::new(),
            failed_locations: Vec::new(),
            abort_reason: Some(abort_reason),
        })
    }

    fn mark_failed(&mut self, run_id: i64, error: &EtlError) {
        let summary = RunSummary {
            status: RunStatus::Failed,
            records_fetched: 0,
            records_loaded: 0,
            records_failed: 0,
            abort_reason: Some(error.to_string()),
        };
        if let Err(e) = self.storage.finish_run(run_id, &summary) {
            tracing::warn!("Failed to mark run {} as failed: {}", run_id, e);
        }
    }
}

/// Convenience function to run the pipeline once
///
/// # Example
///
/// ```no_run
/// use well_registry_etl::config::load_config_with_hash;
/// use well_registry_etl::pipeline::run_pipeline;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("config.toml"))?;
/// let report = run_pipeline(config, hash).await?;
/// println!("Loaded {} locations", report.records_loaded);
/// # Ok(())
/// # }
/// ```
pub async fn run_pipeline(config: Config, config_hash: String) -> Result<PipelineReport, EtlError> {
    let mut coordinator = Coordinator::new(config, config_hash)?;
    coordinator.run().await
}
