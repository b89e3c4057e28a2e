//! Per-page retry policy
//!
//! [`fetch_page`] wraps [`try_fetch`] with three independent budgets, one per
//! failure class, and a fixed backoff between attempts. The budget is a plain
//! `Copy` value threaded through the loop and dropped when the call returns, so
//! nothing leaks from one page into the next.
//!
//! # Retry Logic
//!
//! | Condition | Action |
//! |-----------|--------|
//! | Success | Return the page immediately |
//! | Network failure | Retry until `network_retries` attempts failed |
//! | Status ≥ 204 | Retry until `status_retries` attempts failed |
//! | Unparseable body | Retry until `parse_retries` attempts failed |
//! | Parse budget spent | [`PageError::Parse`], even if another budget is also spent |
//! | Network/status budget spent | [`PageError::Fetch`] |

use crate::config::FetchConfig;
use crate::extract::fetcher::{try_fetch, FetchFailure, ParseFailure, RegistryPage};
use reqwest::Client;
use thiserror::Error;

/// Budget total that marks the very first attempt; anything above it is a retry
const FIRST_ATTEMPT_TOTAL: u32 = 3;

/// Terminal result of a page fetch that never succeeded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    /// The parse budget ran out; carries the most recent parse diagnostics
    #[error("parse retries exhausted: {0}")]
    Parse(ParseFailure),

    /// The network or status budget ran out; carries the most recent failure
    #[error("fetch retries exhausted: {0}")]
    Fetch(FetchFailure),

    /// The retry loop ended in a state it should never reach
    #[error("retry loop contract violated: {0}")]
    ContractViolation(&'static str),
}

/// Which budget ran out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhaustion {
    Parse,
    Network,
    Status,
}

/// Attempt counters for a single page fetch
///
/// Every counter starts at 1 (the first attempt) and grows by one per failure
/// of its class. A class is exhausted once its counter exceeds its ceiling, so
/// a ceiling of `n` allows exactly `n` failed attempts of that class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    pub network: u32,
    pub status: u32,
    pub parse: u32,
}

impl RetryBudget {
    pub fn new() -> Self {
        Self {
            network: 1,
            status: 1,
            parse: 1,
        }
    }

    /// Returns the budget after charging `failure` to its class
    #[must_use]
    pub fn record(self, failure: &FetchFailure) -> Self {
        match failure {
            FetchFailure::Network { .. } => Self {
                network: self.network + 1,
                ..self
            },
            FetchFailure::Status { .. } => Self {
                status: self.status + 1,
                ..self
            },
            FetchFailure::Parse(_) => Self {
                parse: self.parse + 1,
                ..self
            },
        }
    }

    /// Sum of all three counters
    pub fn total(&self) -> u32 {
        self.network + self.status + self.parse
    }

    /// True once at least one attempt has failed
    pub fn should_back_off(&self) -> bool {
        self.total() > FIRST_ATTEMPT_TOTAL
    }

    /// Reports the exhausted budget, parse first
    pub fn exhaustion(&self, config: &FetchConfig) -> Option<Exhaustion> {
        if self.parse > config.parse_retries {
            Some(Exhaustion::Parse)
        } else if self.network > config.network_retries {
            Some(Exhaustion::Network)
        } else if self.status > config.status_retries {
            Some(Exhaustion::Status)
        } else {
            None
        }
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self::new()
    }
}

/// Fetches one page, retrying each failure class within its own budget
///
/// # Arguments
///
/// * `client` - The HTTP client shared by the run
/// * `url` - Fully paginated page URL
/// * `config` - Ceilings and backoff delay
///
/// # Returns
///
/// * `Ok(RegistryPage)` - The first successful attempt
/// * `Err(PageError)` - A budget ran out (or the loop broke its own contract)
pub async fn fetch_page(
    client: &Client,
    url: &str,
    config: &FetchConfig,
) -> Result<RegistryPage, PageError> {
    let mut budget = RetryBudget::new();
    let mut last_parse: Option<ParseFailure> = None;
    let mut last_failure: Option<FetchFailure> = None;

    let exhausted = loop {
        let failure = match try_fetch(client, url).await {
            Ok(page) => return Ok(page),
            Err(failure) => failure,
        };

        budget = budget.record(&failure);
        tracing::warn!(
            "Fetch attempt failed ({}); network {}/{}, status {}/{}, parse {}/{}",
            failure,
            budget.network - 1,
            config.network_retries,
            budget.status - 1,
            config.status_retries,
            budget.parse - 1,
            config.parse_retries
        );

        if let FetchFailure::Parse(parse) = &failure {
            last_parse = Some(parse.clone());
        }
        last_failure = Some(failure);

        if let Some(exhausted) = budget.exhaustion(config) {
            break exhausted;
        }

        if budget.should_back_off() {
            tracing::debug!("Backing off {:?} before retrying {}", config.backoff(), url);
            tokio::time::sleep(config.backoff()).await;
        }
    };

    match exhausted {
        Exhaustion::Parse => {
            let failure = last_parse.ok_or(PageError::ContractViolation(
                "parse budget exhausted without a recorded parse failure",
            ))?;
            tracing::error!(
                "Giving up on {} after {} unparseable responses: {}",
                url,
                budget.parse - 1,
                failure
            );
            Err(PageError::Parse(failure))
        }
        Exhaustion::Network | Exhaustion::Status => {
            let failure = last_failure.ok_or(PageError::ContractViolation(
                "fetch budget exhausted without a recorded failure",
            ))?;
            tracing::error!("Giving up on {} ({:?} budget spent): {}", url, exhausted, failure);
            Err(PageError::Fetch(failure))
        }
    }
}
