//! Integration tests for the ETL pipeline
//!
//! These tests use wiremock to stand in for the well registry and a
//! temporary SQLite file for the staging database.

use serde_json::{json, Value};
use std::io::Write;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};
use well_registry_etl::config::{
    load_config_with_hash, Config, DatabaseConfig, FetchConfig, RegistryConfig,
};
use well_registry_etl::output::load_statistics;
use well_registry_etl::pipeline::{run_pipeline, Coordinator};
use well_registry_etl::storage::{RunStatus, SqliteStorage, Storage};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ML_PATH: &str = "/registry/monitoring-locations/";

/// Creates a test configuration pointing at the mock registry
fn create_test_config(server: &MockServer, db_path: &Path) -> Config {
    Config {
        registry: RegistryConfig {
            endpoint: format!("{}{}", server.uri(), ML_PATH),
            user_agent: "TestEtl/1.0".to_string(),
        },
        fetch: FetchConfig {
            page_size: 2,
            backoff_ms: 0, // no waiting between retries in tests
            request_timeout_ms: 2_000,
            ..FetchConfig::default()
        },
        database: DatabaseConfig {
            path: db_path.to_string_lossy().into_owned(),
        },
    }
}

fn location(agency: &str, site: &str, displayed: bool) -> Value {
    json!({
        "agency": {"agency_cd": agency, "agency_nm": "Agency", "agency_med": agency},
        "site_no": site,
        "site_name": format!("Well {}", site),
        "dec_lat_va": "43.0731",
        "dec_long_va": "-89.4012",
        "horizontal_datum": "NAD83",
        "alt_va": "860",
        "altitude_datum": "NAVD88",
        "nat_aqfr": null,
        "local_aquifer_name": " Cambrian-Ordovician ",
        "qw_sn_flag": false,
        "qw_baseline_flag": false,
        "qw_well_chars": "",
        "qw_well_purpose": "",
        "wl_sn_flag": true,
        "wl_baseline_flag": false,
        "wl_well_chars": "Known changes",
        "wl_well_purpose": "Other",
        "display_flag": displayed,
        "well_depth": 120,
        "link": "",
        "insert_date": "2021-03-01T12:00:00Z",
        "update_date": null,
        "insert_user": "tester",
        "update_user": null,
        "wl_well_type": "Surveillance",
        "qw_well_type": null,
        "state": {"state_cd": "55"},
        "county": {"county_cd": "025"},
        "country": {"country_cd": "US"},
        "well_depth_units": {"unit_id": 1},
        "altitude_units": {"unit_id": 1},
        "site_type": "WELL",
        "horz_method": "GPS",
        "horz_acy": "1",
        "alt_method": "DEM",
        "alt_acy": "10"
    })
}

async fn mount_page(server: &MockServer, offset: u32, results: Vec<Value>, last: bool) {
    let next = if last {
        Value::Null
    } else {
        json!(format!("{}{}?limit=2&offset={}", server.uri(), ML_PATH, offset + 2))
    };

    Mock::given(method("GET"))
        .and(path(ML_PATH))
        .and(query_param("limit", "2"))
        .and(query_param("offset", offset.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 4,
            "next": next,
            "results": results
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_run_loads_all_pages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("etl.db");

    mount_page(
        &server,
        0,
        vec![location("USGS", "1001", true), location("USGS", "1002", false)],
        false,
    )
    .await;
    mount_page(
        &server,
        2,
        vec![location("WIDNR", "2001", true), location("WIDNR", "2002", true)],
        true,
    )
    .await;

    let report = run_pipeline(create_test_config(&server, &db_path), "hash".to_string())
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.records_fetched, 4);
    assert_eq!(report.records_loaded, 4);
    assert_eq!(report.displayed, 3);

    // reopen from disk
    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_staged_locations().unwrap(), 4);
    assert_eq!(storage.count_displayed_locations().unwrap(), 3);

    let row = storage.get_staged_location("WIDNR", "2001").unwrap().unwrap();
    assert_eq!(row["local_aquifer_name"].as_deref(), Some("Cambrian-Ordovician"));
    assert_eq!(row["wl_well_chars"].as_deref(), Some("3"));
    assert_eq!(row["wl_well_purpose"].as_deref(), Some("2"));
    assert_eq!(row["wl_well_type"].as_deref(), Some("1"));
    assert_eq!(row["county_cd"].as_deref(), Some("025"));
    assert_eq!(row["nat_aquifer_cd"], None);

    let stats = load_statistics(&storage).unwrap();
    assert_eq!(stats.latest_run.unwrap().records_loaded, 4);
}

#[tokio::test]
async fn test_second_run_updates_instead_of_duplicating() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("etl.db");

    Mock::given(method("GET"))
        .and(path(ML_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "next": null,
            "results": [location("USGS", "1001", true)]
        })))
        .expect(2)
        .mount(&server)
        .await;

    for _ in 0..2 {
        let report = run_pipeline(create_test_config(&server, &db_path), "hash".to_string())
            .await
            .unwrap();
        assert_eq!(report.records_loaded, 1);
    }

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_staged_locations().unwrap(), 1);
    assert_eq!(storage.get_latest_run().unwrap().unwrap().id, 2);
}

#[tokio::test]
async fn test_record_without_site_is_recorded_as_failed() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("etl.db");

    let mut broken = location("USGS", "1003", true);
    broken.as_object_mut().unwrap().remove("site_no");
    mount_page(&server, 0, vec![location("USGS", "1001", true), broken], true).await;

    let mut coordinator =
        Coordinator::new(create_test_config(&server, &db_path), "hash".to_string()).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.status, RunStatus::Partial);
    assert_eq!(report.records_loaded, 1);
    assert_eq!(report.failed_locations.len(), 1);

    let failed = coordinator
        .storage()
        .get_failed_locations(report.run_id)
        .unwrap();
    assert_eq!(failed[0].agency_cd.as_deref(), Some("USGS"));
    assert_eq!(failed[0].site_no, None);
    assert!(failed[0].error.contains("site_no"));
}

#[tokio::test]
async fn test_unreachable_registry_aborts_without_loading() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("etl.db");

    let config = Config {
        registry: RegistryConfig {
            endpoint: format!("http://127.0.0.1:{}{}", port, ML_PATH),
            user_agent: "TestEtl/1.0".to_string(),
        },
        fetch: FetchConfig {
            backoff_ms: 0,
            request_timeout_ms: 2_000,
            ..FetchConfig::default()
        },
        database: DatabaseConfig {
            path: db_path.to_string_lossy().into_owned(),
        },
    };

    let report = run_pipeline(config, "hash".to_string()).await.unwrap();

    assert!(report.is_aborted());
    let storage = SqliteStorage::new(&db_path).unwrap();
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Aborted);
    assert!(run
        .abort_reason
        .unwrap()
        .starts_with("aborted_on_fetch_failure"));
    assert_eq!(storage.count_staged_locations().unwrap(), 0);
}

#[tokio::test]
async fn test_config_file_drives_the_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("from_file.db");

    Mock::given(method("GET"))
        .and(path(ML_PATH))
        .and(query_param("limit", "5"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "next": "",
            "results": [location("USGS", "1001", true)]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[registry]
endpoint = "{}{}"

[fetch]
page-size = 5
backoff-ms = 0

[database]
path = "{}"
"#,
        server.uri(),
        ML_PATH,
        db_path.display()
    )
    .unwrap();

    let (config, hash) = load_config_with_hash(file.path()).unwrap();
    let report = run_pipeline(config, hash.clone()).await.unwrap();

    assert_eq!(report.records_loaded, 1);
    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.get_run(report.run_id).unwrap().config_hash, hash);
}
