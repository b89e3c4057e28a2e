//! Transform of registry records into staging rows
//!
//! Each raw monitoring-location record becomes one [`StagingRow`] holding the
//! columns of the `well_registry_stg` table, in table order. Nested objects
//! (agency, aquifer, state, county, country, units) are flattened, flags are
//! normalized to `1`/`0`, and free-text classifications go through the code
//! tables.

mod codes;

use chrono::{DateTime, Utc};
use codes::{lookup_code, CodeTable, QW_WELL_CHARS, WELL_PURPOSES, WELL_TYPES, WL_WELL_CHARS};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Columns of the staging table, in insert order
pub const STAGING_COLUMNS: [&str; 52] = [
    "agency_cd",
    "agency_nm",
    "agency_med",
    "site_no",
    "site_name",
    "dec_lat_va",
    "dec_long_va",
    "horz_datum",
    "alt_va",
    "alt_datum_cd",
    "nat_aquifer_cd",
    "nat_aqfr_desc",
    "local_aquifer_name",
    "aqfr_char",
    "qw_sn_flag",
    "qw_baseline_flag",
    "qw_well_chars",
    "qw_well_purpose",
    "qw_sys_name",
    "wl_sn_flag",
    "wl_baseline_flag",
    "wl_well_chars",
    "wl_well_purpose",
    "wl_sys_name",
    "data_provider",
    "display_flag",
    "wl_data_provider",
    "qw_data_provider",
    "lith_data_provider",
    "const_data_provider",
    "well_depth",
    "link",
    "insert_date",
    "update_date",
    "wl_well_purpose_notes",
    "qw_well_purpose_notes",
    "insert_user_id",
    "update_user_id",
    "wl_well_type",
    "qw_well_type",
    "local_aquifer_cd",
    "review_flag",
    "state_cd",
    "county_cd",
    "country_cd",
    "well_depth_units",
    "alt_units",
    "site_type",
    "horz_method",
    "horz_acy",
    "alt_method",
    "alt_acy",
];

/// Columns that identify a location
pub const KEY_COLUMNS: [&str; 2] = ["agency_cd", "site_no"];

/// Errors that keep a record out of the staging table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid timestamp in {field}: '{value}' ({reason})")]
    InvalidTimestamp {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// A single staging column value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
    /// Stored as `'1'` or `'0'`
    Flag(bool),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    /// Copies a JSON scalar as-is; structured values are kept as JSON text
    fn from_json(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Null,
            Some(Value::String(s)) => Self::Text(s.clone()),
            Some(Value::Bool(b)) => Self::Flag(*b),
            Some(Value::Number(n)) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => n.as_f64().map(Self::Real).unwrap_or(Self::Null),
            },
            Some(other) => Self::Text(other.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Text(s) => write!(f, "{}", s),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Real(r) => write!(f, "{}", r),
            Self::Flag(b) => write!(f, "{}", if *b { "1" } else { "0" }),
            Self::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
        }
    }
}

/// One transformed monitoring location
#[derive(Debug, Clone, PartialEq)]
pub struct StagingRow {
    values: Vec<FieldValue>,
}

impl StagingRow {
    /// Value of `column`, if it is a staging column
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        STAGING_COLUMNS
            .iter()
            .position(|name| *name == column)
            .and_then(|index| self.values.get(index))
    }

    /// Column/value pairs in table order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        STAGING_COLUMNS.iter().copied().zip(self.values.iter())
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn agency_cd(&self) -> String {
        self.get("agency_cd").map(ToString::to_string).unwrap_or_default()
    }

    pub fn site_no(&self) -> String {
        self.get("site_no").map(ToString::to_string).unwrap_or_default()
    }

    /// True if the location belongs in the display view
    pub fn is_displayed(&self) -> bool {
        matches!(self.get("display_flag"), Some(FieldValue::Flag(true)))
    }
}

/// Best-effort `(agency_cd, site_no)` of a raw record, for failure reports
pub fn location_key(record: &Value) -> (Option<String>, Option<String>) {
    let text = |value: Option<&Value>| match value {
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    (
        text(record.get("agency").and_then(|a| a.get("agency_cd"))),
        text(record.get("site_no")),
    )
}

/// Maps one registry record onto the staging columns
///
/// # Arguments
///
/// * `record` - Raw monitoring-location JSON object
///
/// # Returns
///
/// * `Ok(StagingRow)` - All 52 columns, in table order
/// * `Err(TransformError)` - A key is missing or a timestamp is malformed
pub fn transform_location(record: &Value) -> Result<StagingRow, TransformError> {
    let agency = record.get("agency");
    let agency_cd = required(agency.and_then(|a| a.get("agency_cd")), "agency.agency_cd")?;
    let site_no = required(record.get("site_no"), "site_no")?;

    let field = |name: &str| FieldValue::from_json(record.get(name));
    let nested = |parent: &str, name: &str| {
        FieldValue::from_json(record.get(parent).and_then(|p| p.get(name)))
    };
    let flag = |name: &str| FieldValue::Flag(is_truthy(record.get(name)));
    let code = |table: CodeTable, name: &str| {
        record
            .get(name)
            .and_then(Value::as_str)
            .and_then(|label| lookup_code(table, label))
            .map(FieldValue::Integer)
            .unwrap_or(FieldValue::Null)
    };

    let values = vec![
        agency_cd,
        nested("agency", "agency_nm"),
        nested("agency", "agency_med"),
        site_no,
        field("site_name"),
        field("dec_lat_va"),
        field("dec_long_va"),
        field("horizontal_datum"),
        field("alt_va"),
        field("altitude_datum"),
        nested("nat_aqfr", "nat_aqfr_cd"),
        nested("nat_aqfr", "nat_aqfr_desc"),
        field("local_aquifer_name"),
        FieldValue::Null,
        flag("qw_sn_flag"),
        flag("qw_baseline_flag"),
        code(QW_WELL_CHARS, "qw_well_chars"),
        code(WELL_PURPOSES, "qw_well_purpose"),
        FieldValue::Null,
        flag("wl_sn_flag"),
        flag("wl_baseline_flag"),
        code(WL_WELL_CHARS, "wl_well_chars"),
        code(WELL_PURPOSES, "wl_well_purpose"),
        FieldValue::Null,
        FieldValue::Null,
        flag("display_flag"),
        FieldValue::Null,
        FieldValue::Null,
        FieldValue::Null,
        FieldValue::Null,
        field("well_depth"),
        field("link"),
        timestamp(record, "insert_date")?,
        timestamp(record, "update_date")?,
        field("wl_well_purpose_notes"),
        field("qw_well_purpose_notes"),
        field("insert_user"),
        field("update_user"),
        code(WELL_TYPES, "wl_well_type"),
        code(WELL_TYPES, "qw_well_type"),
        FieldValue::Null,
        FieldValue::Null,
        nested("state", "state_cd"),
        nested("county", "county_cd"),
        nested("country", "country_cd"),
        nested("well_depth_units", "unit_id"),
        nested("altitude_units", "unit_id"),
        field("site_type"),
        field("horz_method"),
        field("horz_acy"),
        field("alt_method"),
        field("alt_acy"),
    ];

    Ok(StagingRow { values })
}

fn required(value: Option<&Value>, name: &'static str) -> Result<FieldValue, TransformError> {
    match FieldValue::from_json(value) {
        FieldValue::Text(s) if !s.trim().is_empty() => Ok(FieldValue::Text(s)),
        FieldValue::Integer(i) => Ok(FieldValue::Text(i.to_string())),
        _ => Err(TransformError::MissingField(name)),
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}

fn timestamp(record: &Value, name: &'static str) -> Result<FieldValue, TransformError> {
    match record.get(name) {
        None | Some(Value::Null) => Ok(FieldValue::Null),
        Some(Value::String(raw)) => DateTime::parse_from_rfc3339(raw.trim())
            .map(|ts| FieldValue::Timestamp(ts.with_timezone(&Utc)))
            .map_err(|e| TransformError::InvalidTimestamp {
                field: name,
                value: raw.clone(),
                reason: e.to_string(),
            }),
        Some(other) => Err(TransformError::InvalidTimestamp {
            field: name,
            value: other.to_string(),
            reason: "not a string".to_string(),
        }),
    }
}
