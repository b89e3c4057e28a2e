//! Extraction from the well registry API
//!
//! This module pulls every monitoring location out of the registry's paged
//! listing:
//! - `paginator`: offset arithmetic on page URLs
//! - `fetcher`: one GET, one decode, one classified outcome
//! - `retrier`: per-page budgets for network, status and parse failures
//! - `run`: the whole walk, with its run-wide parse tolerance

mod fetcher;
mod paginator;
mod retrier;
mod run;

pub use fetcher::{
    build_http_client, try_fetch, FetchFailure, ParseFailure, RegistryPage, FIRST_FAILING_STATUS,
};
pub use paginator::{next_page_url, normalize_page_url, OFFSET_PARAM, PAGE_SIZE_PARAM};
pub use retrier::{fetch_page, Exhaustion, PageError, RetryBudget};
pub use run::{extract_monitoring_locations, Extractor, RunOutcome};

use thiserror::Error;

/// Errors that end an extraction without an outcome
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Retry loop contract violated: {0}")]
    ContractViolation(&'static str),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
