//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{FailedLocation, RunRecord, RunStatus, RunSummary};
use crate::transform::{FieldValue, StagingRow, KEY_COLUMNS, STAGING_COLUMNS};
use crate::EtlError;
use chrono::Utc;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, ToSql};
use std::collections::HashMap;
use std::path::Path;

/// Timestamp layout written to the staging table
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, endpoint, status, \
     records_fetched, records_loaded, records_failed, abort_reason";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
    upsert_sql: String,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// Missing parent directories are created.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(EtlError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, EtlError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self::from_connection(conn))
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, EtlError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            upsert_sql: build_upsert_sql(),
        }
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Builds the staging upsert from the column list
///
/// Only column names are spliced in; every value is a bound parameter.
fn build_upsert_sql() -> String {
    let columns = STAGING_COLUMNS.join(", ");
    let placeholders = (1..=STAGING_COLUMNS.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let updates = STAGING_COLUMNS
        .iter()
        .filter(|column| !KEY_COLUMNS.contains(column))
        .map(|column| format!("{0} = excluded.{0}", column))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO well_registry_stg ({}) VALUES ({}) \
         ON CONFLICT({}) DO UPDATE SET {}",
        columns,
        placeholders,
        KEY_COLUMNS.join(", "),
        updates
    )
}

/// Text is trimmed on the way in
impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            FieldValue::Null => ToSqlOutput::Owned(Value::Null),
            FieldValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.trim().as_bytes())),
            FieldValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            FieldValue::Real(r) => ToSqlOutput::Owned(Value::Real(*r)),
            FieldValue::Flag(true) => ToSqlOutput::Borrowed(ValueRef::Text(b"1")),
            FieldValue::Flag(false) => ToSqlOutput::Borrowed(ValueRef::Text(b"0")),
            FieldValue::Timestamp(ts) => {
                ToSqlOutput::Owned(Value::Text(ts.format(TIMESTAMP_FORMAT).to_string()))
            }
        })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        endpoint: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Failed),
        records_fetched: row.get::<_, i64>(6)? as u64,
        records_loaded: row.get::<_, i64>(7)? as u64,
        records_failed: row.get::<_, i64>(8)? as u64,
        abort_reason: row.get(9)?,
    })
}

fn value_to_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(r) => Some(r.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str, endpoint: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, endpoint, status) VALUES (?1, ?2, ?3, ?4)",
            params![now, config_hash, endpoint, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(&mut self, run_id: i64, summary: &RunSummary) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET finished_at = ?1, status = ?2, records_fetched = ?3,
                records_loaded = ?4, records_failed = ?5, abort_reason = ?6
             WHERE id = ?7",
            params![
                now,
                summary.status.to_db_string(),
                summary.records_fetched as i64,
                summary.records_loaded as i64,
                summary.records_failed as i64,
                summary.abort_reason,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        let run = self.conn.query_row(&sql, [], run_from_row).optional()?;
        Ok(run)
    }

    // ===== Staging =====

    fn upsert_location(&mut self, row: &StagingRow) -> StorageResult<()> {
        let mut stmt = self.conn.prepare_cached(&self.upsert_sql)?;
        stmt.execute(params_from_iter(row.values().iter()))?;
        Ok(())
    }

    fn get_staged_location(
        &self,
        agency_cd: &str,
        site_no: &str,
    ) -> StorageResult<Option<HashMap<String, Option<String>>>> {
        let sql = format!(
            "SELECT {} FROM well_registry_stg WHERE agency_cd = ?1 AND site_no = ?2",
            STAGING_COLUMNS.join(", ")
        );

        let location = self
            .conn
            .query_row(&sql, params![agency_cd, site_no], |row| {
                let mut values = HashMap::with_capacity(STAGING_COLUMNS.len());
                for (index, column) in STAGING_COLUMNS.iter().enumerate() {
                    values.insert(column.to_string(), value_to_text(row.get_ref(index)?));
                }
                Ok(values)
            })
            .optional()?;

        Ok(location)
    }

    fn count_staged_locations(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM well_registry_stg")
    }

    // ===== Display View =====

    fn refresh_registry_view(&mut self) -> StorageResult<u64> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM well_registry_mv", [])?;
        let inserted = tx.execute(
            "INSERT INTO well_registry_mv SELECT * FROM well_registry_stg WHERE display_flag = '1'",
            [],
        )?;
        tx.commit()?;
        Ok(inserted as u64)
    }

    fn count_displayed_locations(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM well_registry_mv")
    }

    // ===== Failed Locations =====

    fn record_failed_location(
        &mut self,
        run_id: i64,
        failure: &FailedLocation,
    ) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO failed_locations (run_id, agency_cd, site_no, error) VALUES (?1, ?2, ?3, ?4)",
            params![run_id, failure.agency_cd, failure.site_no, failure.error],
        )?;
        Ok(())
    }

    fn get_failed_locations(&self, run_id: i64) -> StorageResult<Vec<FailedLocation>> {
        let mut stmt = self.conn.prepare(
            "SELECT agency_cd, site_no, error FROM failed_locations WHERE run_id = ?1 ORDER BY id",
        )?;

        let failures = stmt
            .query_map(params![run_id], |row| {
                Ok(FailedLocation {
                    agency_cd: row.get(0)?,
                    site_no: row.get(1)?,
                    error: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(failures)
    }
}
