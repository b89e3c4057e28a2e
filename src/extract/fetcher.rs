//! Single-attempt registry fetcher
//!
//! This module performs exactly one GET and one decode per call and classifies
//! the outcome:
//! - transport errors (refused, timeout, DNS, truncated body) → [`FetchFailure::Network`]
//! - any status of 204 or above → [`FetchFailure::Status`]
//! - a body that is not a registry page → [`FetchFailure::Parse`]
//!
//! Retrying is the caller's business; nothing here keeps state between calls.

use crate::config::{FetchConfig, RegistryConfig};
use reqwest::{redirect::Policy, Client};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Lowest status code treated as a failure
///
/// Stricter than the usual 4xx/5xx rule: the registry always returns a body,
/// so 204 and everything after it counts against the status budget.
pub const FIRST_FAILING_STATUS: u16 = 204;

/// One decoded page of the monitoring-locations listing
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegistryPage {
    /// Raw monitoring-location records, in registry order
    pub results: Vec<Value>,

    /// URL of the following page; absent, null or empty on the last page
    #[serde(default)]
    pub next: Option<String>,

    /// Total number of records the registry reports
    #[serde(default)]
    pub count: Option<u64>,
}

impl RegistryPage {
    /// Returns true if the registry signalled another page
    pub fn has_next(&self) -> bool {
        self.next.as_deref().is_some_and(|next| !next.trim().is_empty())
    }
}

/// Response body that could not be decoded as a registry page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unparseable response from {url} at line {line}, column {column}: {message}")]
pub struct ParseFailure {
    pub url: String,
    pub message: String,
    /// Raw response text, kept for diagnostics
    pub body: String,
    pub line: usize,
    pub column: usize,
}

/// Outcome class of a failed fetch attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    /// No usable response (connection refused, timeout, DNS, body read error)
    #[error("network failure for {url}: {message}")]
    Network { url: String, message: String },

    /// The registry answered with a status code of 204 or greater
    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error(transparent)]
    Parse(#[from] ParseFailure),
}

impl FetchFailure {
    /// The URL the failed attempt was made against
    pub fn url(&self) -> &str {
        match self {
            Self::Network { url, .. } | Self::Status { url, .. } => url,
            Self::Parse(failure) => &failure.url,
        }
    }
}

/// Builds the HTTP client used for a whole extraction run
///
/// Redirects are not followed so 3xx answers surface as status failures.
///
/// # Example
///
/// ```no_run
/// use well_registry_etl::config::{FetchConfig, RegistryConfig};
/// use well_registry_etl::extract::build_http_client;
///
/// let registry = RegistryConfig {
///     endpoint: "https://registry.example.gov/registry/monitoring-locations/".to_string(),
///     user_agent: "well-registry-etl/0.1.0".to_string(),
/// };
///
/// let client = build_http_client(&registry, &FetchConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    registry: &RegistryConfig,
    fetch: &FetchConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(registry.user_agent.as_str())
        .timeout(fetch.request_timeout())
        .connect_timeout(fetch.request_timeout())
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches and decodes one page, without retrying
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - Fully paginated page URL
///
/// # Returns
///
/// The decoded page, or the class of failure the attempt ran into
pub async fn try_fetch(client: &Client, url: &str) -> Result<RegistryPage, FetchFailure> {
    let response = client.get(url).send().await.map_err(|e| FetchFailure::Network {
        url: url.to_string(),
        message: describe_transport_error(&e),
    })?;

    let status = response.status().as_u16();
    if status >= FIRST_FAILING_STATUS {
        return Err(FetchFailure::Status {
            url: url.to_string(),
            status,
        });
    }

    let body = response.text().await.map_err(|e| FetchFailure::Network {
        url: url.to_string(),
        message: format!("failed to read body: {}", e),
    })?;

    serde_json::from_str::<RegistryPage>(&body).map_err(|e| {
        FetchFailure::Parse(ParseFailure {
            url: url.to_string(),
            message: e.to_string(),
            line: e.line(),
            column: e.column(),
            body,
        })
    })
}

fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    }
}
