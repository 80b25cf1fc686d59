//! Enhanced access records and CSV table I/O
//!
//! The enhanced log is the hand-off point between preparation and analysis:
//! one row per access with its semester, week of semester and equipment
//! category already assigned.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::{Error, Result};

/// Column names shared by the preparation and analysis tools
pub mod columns {
    pub const TIMESTAMP: &str = "Timestamp";
    pub const ACCESS_TYPE: &str = "Access Type";
    pub const SEMESTER: &str = "Semester";
    pub const SEMESTER_WEEK: &str = "Semester_Week";
    pub const EQUIPMENT_CATEGORY: &str = "Equipment_Category";
    pub const FIRST_NAME: &str = "First Name";
    pub const LAST_NAME: &str = "Last Name";
    pub const UNIQUE_ID: &str = "Unique ID";
}

/// Output format for timestamps written by MKSA; fractional seconds are
/// written only when present
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Parse an access-log timestamp
///
/// Accepts ISO 8601 (with or without `T`, optional fractional seconds or UTC
/// offset), US month/day/year with 24-hour or AM/PM clock, and bare dates
/// (taken as midnight). Offsets are dropped: the local wall-clock time is kept.
///
/// # Examples
///
/// ```
/// use mksa_common::records::parse_timestamp;
///
/// let a = parse_timestamp("2023-09-01 14:30:00").unwrap();
/// let b = parse_timestamp("09/01/2023 2:30 PM").unwrap();
/// assert_eq!(a, b);
/// ```
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();

    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.naive_local());
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            if let Some(ts) = date.and_hms_opt(0, 0, 0) {
                return Ok(ts);
            }
        }
    }

    Err(Error::Parse(format!("Unrecognised timestamp: '{}'", value)))
}

/// Format a timestamp the way MKSA writes it
pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| Error::Parse(format!("Invalid date '{}': {}", value, e)))
}

/// One row of the enhanced dataset
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnhancedRecord {
    #[serde(rename = "Timestamp", deserialize_with = "deserialize_timestamp")]
    pub timestamp: NaiveDateTime,

    #[serde(rename = "Access Type", default)]
    pub access_type: String,

    #[serde(rename = "Semester")]
    pub semester: String,

    #[serde(rename = "Semester_Week", deserialize_with = "deserialize_week")]
    pub semester_week: u32,

    /// Empty when the dataset was enhanced without categories
    #[serde(rename = "Equipment_Category", default)]
    pub equipment_category: String,
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

/// Week numbers may have been written as floats ("3.0") by other tools
fn deserialize_week<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_week(&raw).map_err(serde::de::Error::custom)
}

fn parse_week(raw: &str) -> Result<u32> {
    let raw = raw.trim();
    if let Ok(week) = raw.parse::<u32>() {
        return Ok(week);
    }
    match raw.parse::<f64>() {
        Ok(week) if week >= 0.0 && week.fract() == 0.0 && week <= f64::from(u32::MAX) => Ok(week as u32),
        _ => Err(Error::Parse(format!("Invalid semester week: '{}'", raw))),
    }
}

/// Header row of a CSV file
pub fn read_headers(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path)?;
    Ok(reader.headers()?.iter().map(str::to_string).collect())
}

/// Fail with `InvalidInput` when any of `required` is missing from the file
pub fn require_columns(path: &Path, required: &[&str]) -> Result<()> {
    let headers = read_headers(path)?;
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == col))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "{}: missing column(s) {}",
            path.display(),
            missing
                .iter()
                .map(|c| format!("'{}'", c))
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }
}

/// Load the enhanced dataset
///
/// Requires `Timestamp`, `Semester` and `Semester_Week`; other columns are
/// optional and unknown columns are ignored.
pub fn load_enhanced_records(path: &Path) -> Result<Vec<EnhancedRecord>> {
    require_columns(
        path,
        &[columns::TIMESTAMP, columns::SEMESTER, columns::SEMESTER_WEEK],
    )?;

    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize::<EnhancedRecord>() {
        records.push(row?);
    }

    let semesters: BTreeSet<&str> = records.iter().map(|r| r.semester.as_str()).collect();
    info!("Loaded {} records from {}", records.len(), path.display());
    info!("Semester range: {} semesters", semesters.len());
    if let (Some(min), Some(max)) = (
        records.iter().map(|r| r.semester_week).min(),
        records.iter().map(|r| r.semester_week).max(),
    ) {
        info!("Week range: {} to {}", min, max);
    }

    Ok(records)
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Serialize rows to a CSV file with a header row, creating parent directories
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    ensure_parent_dir(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a table with dynamic columns (pivot tables)
pub fn write_table(path: &Path, headers: &[String], rows: &[Vec<String>]) -> Result<()> {
    ensure_parent_dir(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, s).unwrap()
    }

    #[test]
    fn test_parse_iso_forms() {
        let expected = ts(2023, 9, 1, 14, 30, 5);
        assert_eq!(parse_timestamp("2023-09-01 14:30:05").unwrap(), expected);
        assert_eq!(parse_timestamp("2023-09-01T14:30:05").unwrap(), expected);
        assert_eq!(parse_timestamp(" 2023-09-01 14:30:05.250 ").unwrap().date(), expected.date());
        assert_eq!(parse_timestamp("2023-09-01T14:30:05-07:00").unwrap(), expected);
    }

    #[test]
    fn test_format_keeps_fractional_seconds() {
        let whole = ts(2023, 9, 1, 14, 30, 5);
        assert_eq!(format_timestamp(&whole), "2023-09-01 14:30:05");
        let fraction = parse_timestamp("2023-09-01 14:30:05.250").unwrap();
        assert_eq!(format_timestamp(&fraction), "2023-09-01 14:30:05.250");
        assert_eq!(parse_timestamp(&format_timestamp(&fraction)).unwrap(), fraction);
    }

    #[test]
    fn test_parse_us_forms() {
        assert_eq!(parse_timestamp("9/1/2023 14:30").unwrap(), ts(2023, 9, 1, 14, 30, 0));
        assert_eq!(parse_timestamp("09/01/2023 02:30:00 PM").unwrap(), ts(2023, 9, 1, 14, 30, 0));
        assert_eq!(parse_timestamp("09/01/2023 12:15 AM").unwrap(), ts(2023, 9, 1, 0, 15, 0));
    }

    #[test]
    fn test_parse_date_only_is_midnight() {
        assert_eq!(parse_timestamp("2023-09-01").unwrap(), ts(2023, 9, 1, 0, 0, 0));
        assert_eq!(parse_timestamp("09/01/2023").unwrap(), ts(2023, 9, 1, 0, 0, 0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_timestamp("yesterday"), Err(Error::Parse(_))));
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn test_parse_week_accepts_float_text() {
        assert_eq!(parse_week("3").unwrap(), 3);
        assert_eq!(parse_week("3.0").unwrap(), 3);
        assert!(parse_week("3.5").is_err());
        assert!(parse_week("-1").is_err());
    }

    #[test]
    fn test_load_enhanced_records_ignores_extra_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("enhanced.csv");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "Timestamp,Access Type,Unique ID,Semester,Semester_Week,Equipment_Category").unwrap();
        writeln!(file, "2023-09-01 10:00:00,Jacobs Wood Shop,abc,Fall 2023,3,Wood Shop").unwrap();
        writeln!(file, "2023-09-02 11:00:00,Jacobs Type A,def,Fall 2023,3.0,Basic 3D Printing").unwrap();
        drop(file);

        let records = load_enhanced_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].access_type, "Jacobs Wood Shop");
        assert_eq!(records[1].semester_week, 3);
        assert_eq!(records[1].equipment_category, "Basic 3D Printing");
    }

    #[test]
    fn test_load_enhanced_records_without_category_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("enhanced.csv");
        fs::write(&path, "Timestamp,Semester,Semester_Week\n2023-09-01 10:00:00,Fall 2023,3\n").unwrap();

        let records = load_enhanced_records(&path).unwrap();
        assert_eq!(records[0].equipment_category, "");
        assert_eq!(records[0].access_type, "");
    }

    #[test]
    fn test_missing_required_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("enhanced.csv");
        fs::write(&path, "Timestamp,Semester\n2023-09-01 10:00:00,Fall 2023\n").unwrap();

        let err = load_enhanced_records(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(ref msg) if msg.contains("'Semester_Week'")));
    }

    #[test]
    fn test_write_table_creates_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("pivot.csv");
        write_table(
            &path,
            &["Semester_Week".to_string(), "Fall 2023".to_string()],
            &[vec!["1".to_string(), "12".to_string()]],
        )
        .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "Semester_Week,Fall 2023\n1,12\n");
    }
}
