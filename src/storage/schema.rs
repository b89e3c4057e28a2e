//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the ETL database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track ETL runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    endpoint TEXT NOT NULL,
    status TEXT NOT NULL,
    records_fetched INTEGER NOT NULL DEFAULT 0,
    records_loaded INTEGER NOT NULL DEFAULT 0,
    records_failed INTEGER NOT NULL DEFAULT 0,
    abort_reason TEXT
);

-- Staged monitoring locations, one row per agency and site
CREATE TABLE IF NOT EXISTS well_registry_stg (
    agency_cd TEXT NOT NULL,
    agency_nm TEXT,
    agency_med TEXT,
    site_no TEXT NOT NULL,
    site_name TEXT,
    dec_lat_va NUMERIC,
    dec_long_va NUMERIC,
    horz_datum TEXT,
    alt_va NUMERIC,
    alt_datum_cd TEXT,
    nat_aquifer_cd TEXT,
    nat_aqfr_desc TEXT,
    local_aquifer_name TEXT,
    aqfr_char TEXT,
    qw_sn_flag TEXT,
    qw_baseline_flag TEXT,
    qw_well_chars INTEGER,
    qw_well_purpose INTEGER,
    qw_sys_name TEXT,
    wl_sn_flag TEXT,
    wl_baseline_flag TEXT,
    wl_well_chars INTEGER,
    wl_well_purpose INTEGER,
    wl_sys_name TEXT,
    data_provider TEXT,
    display_flag TEXT,
    wl_data_provider TEXT,
    qw_data_provider TEXT,
    lith_data_provider TEXT,
    const_data_provider TEXT,
    well_depth NUMERIC,
    link TEXT,
    insert_date TEXT,
    update_date TEXT,
    wl_well_purpose_notes TEXT,
    qw_well_purpose_notes TEXT,
    insert_user_id TEXT,
    update_user_id TEXT,
    wl_well_type INTEGER,
    qw_well_type INTEGER,
    local_aquifer_cd TEXT,
    review_flag TEXT,
    state_cd TEXT,
    county_cd TEXT,
    country_cd TEXT,
    well_depth_units INTEGER,
    alt_units INTEGER,
    site_type TEXT,
    horz_method TEXT,
    horz_acy TEXT,
    alt_method TEXT,
    alt_acy TEXT,
    PRIMARY KEY (agency_cd, site_no)
);

-- Displayed locations, rebuilt from staging after every load
CREATE TABLE IF NOT EXISTS well_registry_mv AS
    SELECT * FROM well_registry_stg WHERE 0;

-- Locations that could not be transformed or loaded
CREATE TABLE IF NOT EXISTS failed_locations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    agency_cd TEXT,
    site_no TEXT,
    error TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_failed_locations_run ON failed_locations(run_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
