//! Extraction run - walks every page of the registry listing
//!
//! The run owns the HTTP client for its whole lifetime and keeps the run-wide
//! parse-failure count, which is separate from the per-page budgets kept by
//! [`fetch_page`]. Policy per page outcome:
//! - success: append records, stop when the registry reports no next page
//!   or the records seen reach the registry's reported count
//! - parse budget spent: skip the page and move on, until the run-wide
//!   tolerance is reached, then abort
//! - network/status budget spent: abort immediately

use crate::config::{FetchConfig, RegistryConfig};
use crate::extract::fetcher::{build_http_client, FetchFailure, ParseFailure};
use crate::extract::paginator::{next_page_url, normalize_page_url};
use crate::extract::retrier::{fetch_page, PageError};
use crate::extract::ExtractError;
use reqwest::Client;
use serde_json::Value;

/// Final state of an extraction run
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Pagination reached the last page
    Completed {
        /// Records in page-then-in-page order
        records: Vec<Value>,
        /// Pages skipped after exhausting their parse budget
        skipped_pages: Vec<String>,
    },

    /// Too many pages could not be parsed; the records are not trustworthy
    AbortedOnParseTolerance {
        discarded: usize,
        parse_failures: u32,
        last_failure: ParseFailure,
    },

    /// The registry or the network stopped cooperating
    AbortedOnFetchFailure {
        discarded: usize,
        failure: FetchFailure,
    },
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Records delivered by the run; empty unless it completed
    pub fn records(&self) -> &[Value] {
        match self {
            Self::Completed { records, .. } => records,
            _ => &[],
        }
    }

    pub fn into_records(self) -> Vec<Value> {
        match self {
            Self::Completed { records, .. } => records,
            _ => Vec::new(),
        }
    }

    /// Short machine-readable reason code
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Completed { skipped_pages, .. } if skipped_pages.is_empty() => "completed",
            Self::Completed { .. } => "completed_with_skipped_pages",
            Self::AbortedOnParseTolerance { .. } => "aborted_on_parse_tolerance",
            Self::AbortedOnFetchFailure { .. } => "aborted_on_fetch_failure",
        }
    }
}

/// Mutable state of one run, dropped when the run ends
#[derive(Debug, Default)]
struct RunState {
    records: Vec<Value>,
    parse_failures: u32,
    fetches: u64,
    skipped_pages: Vec<String>,
}

impl RunState {
    /// Records seen so far, counting a full page for every skipped one
    fn accounted_records(&self, page_size: u32) -> u64 {
        let skipped = self.skipped_pages.len() as u64 * u64::from(page_size);
        (self.records.len() as u64).saturating_add(skipped)
    }

    fn complete(self) -> RunOutcome {
        RunOutcome::Completed {
            records: self.records,
            skipped_pages: self.skipped_pages,
        }
    }
}

/// Drives pagination across the whole registry listing
pub struct Extractor {
    client: Client,
    config: FetchConfig,
}

impl Extractor {
    /// Creates an extractor with its own pooled HTTP client
    pub fn new(registry: &RegistryConfig, config: &FetchConfig) -> Result<Self, ExtractError> {
        let client = build_http_client(registry, config)?;
        Ok(Self::with_client(client, config.clone()))
    }

    /// Creates an extractor around an existing client
    pub fn with_client(client: Client, config: FetchConfig) -> Self {
        Self { client, config }
    }

    /// Fetches every page reachable from `start_url`
    ///
    /// Recoverable conditions are reported through [`RunOutcome`]; only a
    /// broken retry loop is returned as an error.
    pub async fn extract_all(&self, start_url: &str) -> Result<RunOutcome, ExtractError> {
        let page_size = self.config.page_size;
        let mut state = RunState::default();
        let mut url = normalize_page_url(start_url, page_size);

        tracing::info!("Starting extraction at {}", url);

        loop {
            state.fetches += 1;
            if state.fetches % self.config.progress_interval.max(1) == 0 {
                tracing::info!(
                    "Still fetching: {} pages requested, {} records so far, at {}",
                    state.fetches,
                    state.records.len(),
                    url
                );
            } else {
                tracing::debug!("Retrieving monitoring locations: {}", url);
            }

            match fetch_page(&self.client, &url, &self.config).await {
                Ok(page) => {
                    let received = page.results.len();
                    let more = page.has_next();
                    state.records.extend(page.results);

                    let reported = page.count;
                    let count_reached = reported
                        .is_some_and(|count| state.accounted_records(page_size) >= count);

                    if !more || received == 0 || count_reached {
                        if more && received == 0 {
                            tracing::warn!("Page {} was empty but named a next page; stopping", url);
                        } else if more {
                            tracing::warn!(
                                "Registry count of {} reached at {} but a next page was named; stopping",
                                reported.unwrap_or_default(),
                                url
                            );
                        }
                        tracing::info!(
                            "Finished retrieving {} monitoring locations ({} reported by the registry)",
                            state.records.len(),
                            reported
                                .map(|count| count.to_string())
                                .unwrap_or_else(|| "none".to_string())
                        );
                        return Ok(state.complete());
                    }
                }
                Err(PageError::Parse(failure)) => {
                    state.parse_failures += 1;
                    if state.parse_failures >= self.config.parse_tolerance {
                        tracing::error!(
                            "Aborting extraction: {} pages unparseable (tolerance {}), discarding {} records",
                            state.parse_failures,
                            self.config.parse_tolerance,
                            state.records.len()
                        );
                        return Ok(RunOutcome::AbortedOnParseTolerance {
                            discarded: state.records.len(),
                            parse_failures: state.parse_failures,
                            last_failure: failure,
                        });
                    }

                    tracing::warn!(
                        "Skipping unparseable page {} ({} of {} tolerated)",
                        url,
                        state.parse_failures,
                        self.config.parse_tolerance
                    );
                    state.skipped_pages.push(url.clone());
                }
                Err(PageError::Fetch(failure)) => {
                    tracing::error!(
                        "Aborting extraction after fetch failure, discarding {} records: {}",
                        state.records.len(),
                        failure
                    );
                    return Ok(RunOutcome::AbortedOnFetchFailure {
                        discarded: state.records.len(),
                        failure,
                    });
                }
                Err(PageError::ContractViolation(reason)) => {
                    return Err(ExtractError::ContractViolation(reason));
                }
            }

            let next = next_page_url(&url, page_size);
            if next == url {
                tracing::warn!("Offset cannot advance past {}; stopping", url);
                return Ok(state.complete());
            }
            url = next;
        }
    }
}

/// Runs one extraction against `endpoint` with a freshly built client
///
/// The client and its pooled connections are released when this returns,
/// whatever the outcome.
pub async fn extract_monitoring_locations(
    registry: &RegistryConfig,
    config: &FetchConfig,
) -> Result<RunOutcome, ExtractError> {
    let extractor = Extractor::new(registry, config)?;
    extractor.extract_all(&registry.endpoint).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ML_PATH: &str = "/registry/monitoring-locations/";

    fn fast_config() -> FetchConfig {
        FetchConfig {
            backoff_ms: 0,
            request_timeout_ms: 2_000,
            ..FetchConfig::default()
        }
    }

    fn registry_for(server: &MockServer) -> RegistryConfig {
        RegistryConfig {
            endpoint: format!("{}{}", server.uri(), ML_PATH),
            user_agent: "TestEtl/1.0".to_string(),
        }
    }

    fn page_at(server: &MockServer, offset: u32) -> String {
        format!("{}{}?limit=8&offset={}", server.uri(), ML_PATH, offset)
    }

    async fn mount_page(
        server: &MockServer,
        offset: u32,
        template: ResponseTemplate,
        expected_calls: u64,
    ) {
        Mock::given(method("GET"))
            .and(path(ML_PATH))
            .and(query_param("offset", offset.to_string()))
            .respond_with(template)
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    fn records_page(site: &str, next: Option<String>) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "count": 3,
            "next": next,
            "results": [{"site_no": site}]
        }))
    }

    fn bad_json() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_string("{\"good\"= json\"}")
    }

    #[tokio::test]
    async fn test_three_pages_complete_in_order() {
        let server = MockServer::start().await;
        mount_page(&server, 0, records_page("a", Some(page_at(&server, 8))), 1).await;
        mount_page(&server, 8, records_page("b", Some(page_at(&server, 16))), 1).await;
        mount_page(&server, 16, records_page("c", None), 1).await;

        let outcome = extract_monitoring_locations(&registry_for(&server), &fast_config())
            .await
            .unwrap();

        assert!(outcome.is_completed());
        assert_eq!(outcome.reason(), "completed");
        assert_eq!(
            outcome.records(),
            &[
                json!({"site_no": "a"}),
                json!({"site_no": "b"}),
                json!({"site_no": "c"})
            ]
        );
    }

    #[tokio::test]
    async fn test_base_endpoint_is_never_requested_bare() {
        let server = MockServer::start().await;
        mount_page(&server, 0, records_page("a", None), 1).await;
        Mock::given(method("GET"))
            .and(path(ML_PATH))
            .respond_with(ResponseTemplate::new(500))
            .with_priority(10)
            .expect(0)
            .mount(&server)
            .await;

        let outcome = extract_monitoring_locations(&registry_for(&server), &fast_config())
            .await
            .unwrap();
        assert_eq!(outcome.records().len(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_middle_page_is_skipped() {
        let server = MockServer::start().await;
        mount_page(&server, 0, records_page("a", Some(page_at(&server, 8))), 1).await;
        mount_page(&server, 8, bad_json(), 2).await;
        mount_page(&server, 16, records_page("c", None), 1).await;

        let outcome = extract_monitoring_locations(&registry_for(&server), &fast_config())
            .await
            .unwrap();

        match outcome {
            RunOutcome::Completed {
                records,
                skipped_pages,
            } => {
                assert_eq!(records, vec![json!({"site_no": "a"}), json!({"site_no": "c"})]);
                assert_eq!(skipped_pages, vec![page_at(&server, 8)]);
            }
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_parse_tolerance_aborts_and_discards() {
        let server = MockServer::start().await;
        mount_page(&server, 0, records_page("a", Some(page_at(&server, 8))), 1).await;
        mount_page(&server, 8, bad_json(), 2).await;
        mount_page(&server, 16, bad_json(), 2).await;
        mount_page(&server, 24, records_page("d", None), 0).await;

        let outcome = extract_monitoring_locations(&registry_for(&server), &fast_config())
            .await
            .unwrap();

        match &outcome {
            RunOutcome::AbortedOnParseTolerance {
                discarded,
                parse_failures,
                last_failure,
            } => {
                assert_eq!(*discarded, 1);
                assert_eq!(*parse_failures, 2);
                assert_eq!(last_failure.url, page_at(&server, 16));
            }
            other => panic!("expected parse abort, got {:?}", other),
        }
        assert!(outcome.records().is_empty());
    }

    #[tokio::test]
    async fn test_tolerance_of_one_aborts_on_first_bad_page() {
        let server = MockServer::start().await;
        mount_page(&server, 0, records_page("a", Some(page_at(&server, 8))), 1).await;
        mount_page(&server, 8, bad_json(), 2).await;
        mount_page(&server, 16, records_page("c", None), 0).await;

        let config = FetchConfig {
            parse_tolerance: 1,
            ..fast_config()
        };
        let outcome = extract_monitoring_locations(&registry_for(&server), &config)
            .await
            .unwrap();

        assert_eq!(outcome.reason(), "aborted_on_parse_tolerance");
        assert!(outcome.into_records().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_204_aborts_without_touching_parse_tolerance() {
        let server = MockServer::start().await;
        mount_page(&server, 0, records_page("a", Some(page_at(&server, 8))), 1).await;
        mount_page(&server, 8, ResponseTemplate::new(204), 2).await;
        mount_page(&server, 16, records_page("c", None), 0).await;

        let config = FetchConfig {
            parse_tolerance: 1,
            ..fast_config()
        };
        let outcome = extract_monitoring_locations(&registry_for(&server), &config)
            .await
            .unwrap();

        match outcome {
            RunOutcome::AbortedOnFetchFailure { discarded, failure } => {
                assert_eq!(discarded, 1);
                assert!(matches!(failure, FetchFailure::Status { status: 204, .. }));
            }
            other => panic!("expected fetch abort, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_page_with_next_stops_the_run() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            0,
            ResponseTemplate::new(200).set_body_json(json!({
                "count": 0,
                "next": page_at(&server, 8),
                "results": []
            })),
            1,
        )
        .await;
        mount_page(&server, 8, records_page("b", None), 0).await;

        let outcome = extract_monitoring_locations(&registry_for(&server), &fast_config())
            .await
            .unwrap();

        assert!(outcome.is_completed());
        assert!(outcome.records().is_empty());
    }

    #[tokio::test]
    async fn test_empty_next_string_is_last_page() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            0,
            ResponseTemplate::new(200).set_body_json(json!({
                "next": "",
                "results": [{"site_no": "a"}]
            })),
            1,
        )
        .await;

        let outcome = extract_monitoring_locations(&registry_for(&server), &fast_config())
            .await
            .unwrap();
        assert_eq!(outcome.records().len(), 1);
    }

    fn endless_page(count: Option<u64>) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "count": count,
            "next": "https://fake.usgs.gov/registry/monitoring-locations/?limit=8&offset=999",
            "results": [{"site_no": "a"}]
        }))
    }

    #[tokio::test]
    async fn test_saturated_offset_stops_instead_of_refetching() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ML_PATH))
            .respond_with(endless_page(None))
            .expect(1)
            .mount(&server)
            .await;

        let registry = RegistryConfig {
            endpoint: format!("{}{}?limit=8&offset={}", server.uri(), ML_PATH, u64::MAX),
            ..registry_for(&server)
        };
        let outcome = extract_monitoring_locations(&registry, &fast_config())
            .await
            .unwrap();

        assert!(outcome.is_completed());
        assert_eq!(outcome.records().len(), 1);
    }

    #[tokio::test]
    async fn test_reported_count_bounds_the_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ML_PATH))
            .respond_with(endless_page(Some(2)))
            .expect(2)
            .mount(&server)
            .await;

        let outcome = extract_monitoring_locations(&registry_for(&server), &fast_config())
            .await
            .unwrap();

        assert!(outcome.is_completed());
        assert_eq!(outcome.records().len(), 2);
    }

    #[tokio::test]
    async fn test_skipped_pages_count_towards_reported_total() {
        let server = MockServer::start().await;
        mount_page(&server, 0, bad_json(), 2).await;
        mount_page(&server, 8, endless_page(Some(9)), 1).await;
        mount_page(&server, 16, records_page("c", None), 0).await;

        let outcome = extract_monitoring_locations(&registry_for(&server), &fast_config())
            .await
            .unwrap();

        match outcome {
            RunOutcome::Completed {
                records,
                skipped_pages,
            } => {
                assert_eq!(records.len(), 1);
                assert_eq!(skipped_pages, vec![page_at(&server, 0)]);
            }
            other => panic!("expected completion, got {:?}", other),
        }
    }
}
