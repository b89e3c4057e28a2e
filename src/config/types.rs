use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the well registry ETL
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub registry: RegistryConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    pub database: DatabaseConfig,
}

/// Registry API connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Monitoring-locations endpoint, without pagination parameters
    pub endpoint: String,

    /// User agent sent with every registry request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

/// Pagination, retry and backoff policy for the fetch engine
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Records requested per page (`limit` parameter)
    #[serde(rename = "page-size")]
    pub page_size: u32,

    /// Attempts allowed per page for transport failures
    #[serde(rename = "network-retries")]
    pub network_retries: u32,

    /// Attempts allowed per page for HTTP status failures
    #[serde(rename = "status-retries")]
    pub status_retries: u32,

    /// Attempts allowed per page for unparseable bodies
    #[serde(rename = "parse-retries")]
    pub parse_retries: u32,

    /// Pages that may exhaust their parse budget before the run aborts
    #[serde(rename = "parse-tolerance")]
    pub parse_tolerance: u32,

    /// Delay before each retry (milliseconds)
    #[serde(rename = "backoff-ms")]
    pub backoff_ms: u64,

    /// Upper bound on a single request (milliseconds)
    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,

    /// Emit a progress line every this many page fetches
    #[serde(rename = "progress-interval")]
    pub progress_interval: u64,
}

impl FetchConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: 8,
            network_retries: 2,
            status_retries: 2,
            parse_retries: 2,
            parse_tolerance: 2,
            backoff_ms: 10_000,
            request_timeout_ms: 10_000,
            progress_interval: 128,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: String,
}

fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
