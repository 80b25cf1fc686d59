//! Access log table and cleaning steps
//!
//! The preparation steps work on a generic table: the header row, the raw
//! string rows, and the parsed `Timestamp` of every row. Columns the tools do
//! not know about are carried through untouched.

use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use mksa_common::config::ExclusionWindow;
use mksa_common::records::{self, columns};

use crate::{PrepError, Result};

/// Access log held in memory
#[derive(Debug, Clone, PartialEq)]
pub struct LogTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    timestamps: Vec<NaiveDateTime>,
}

impl LogTable {
    /// Load a log CSV; the file must have a `Timestamp` column
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let table = Self::from_reader(file, &path.display().to_string())?;
        debug!("Loaded {} rows from {}", table.len(), path.display());
        Ok(table)
    }

    /// Parse CSV data; `source` names the input in error messages
    ///
    /// Timestamps are rewritten in the canonical `YYYY-MM-DD HH:MM:SS[.fff]`
    /// form so that equal instants written differently compare equal. Sub-second
    /// precision is kept. Row numbers in
    /// errors count the header as row 1.
    pub fn from_reader<R: Read>(reader: R, source: &str) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let ts_col = headers
            .iter()
            .position(|h| h == columns::TIMESTAMP)
            .ok_or_else(|| PrepError::MissingColumn {
                column: columns::TIMESTAMP.to_string(),
                file: source.to_string(),
            })?;

        let mut rows = Vec::new();
        let mut timestamps = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(headers.len(), String::new());

            let timestamp =
                records::parse_timestamp(&row[ts_col]).map_err(|e| PrepError::BadRow {
                    row: index + 2,
                    message: e.to_string(),
                })?;
            row[ts_col] = records::format_timestamp(&timestamp);

            rows.push(row);
            timestamps.push(timestamp);
        }

        Ok(Self {
            headers,
            rows,
            timestamps,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Values of one column, in row order
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let col = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[col].as_str()).collect())
    }

    /// Replace a column's values, or append it as the last column
    ///
    /// `values` must hold one entry per row.
    pub fn set_column(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(mksa_common::Error::InvalidInput(format!(
                "column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            ))
            .into());
        }
        match self.column_index(name) {
            Some(col) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[col] = value;
                }
            }
            None => {
                self.headers.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// Keep the rows for which `keep(index)` is true; returns the number removed
    pub fn retain_rows<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(usize) -> bool,
    {
        let before = self.rows.len();
        let mask: Vec<bool> = (0..before).map(&mut keep).collect();

        let mut flags = mask.iter();
        self.rows.retain(|_| flags.next().copied().unwrap_or(false));
        let mut flags = mask.iter();
        self.timestamps.retain(|_| flags.next().copied().unwrap_or(false));

        before - self.rows.len()
    }

    /// Write the table as CSV, creating parent directories
    pub fn write(&self, path: &Path) -> Result<()> {
        records::write_table(path, &self.headers, &self.rows)?;
        Ok(())
    }
}

/// Drop rows identical to an earlier row; returns the number removed
pub fn drop_duplicates(table: &mut LogTable) -> usize {
    let mut seen: HashSet<Vec<String>> = HashSet::with_capacity(table.len());
    let keep: Vec<bool> = table.rows().iter().map(|row| seen.insert(row.clone())).collect();
    let removed = table.retain_rows(|i| keep[i]);
    info!("Removed {} duplicate rows", removed);
    removed
}

/// Drop rows dated inside any exclusion window; returns the number removed
pub fn remove_excluded(table: &mut LogTable, windows: &[ExclusionWindow]) -> usize {
    let timestamps = table.timestamps().to_vec();
    let removed = table.retain_rows(|i| !windows.iter().any(|w| w.contains(timestamps[i])));
    for window in windows {
        info!(
            "Exclusion window {} to {} ({})",
            window.start,
            window.end,
            if window.reason.is_empty() {
                "no reason given"
            } else {
                window.reason.as_str()
            }
        );
    }
    info!("Removed {} rows inside exclusion windows", removed);
    removed
}

/// Load a log, drop duplicates and excluded dates
pub fn clean_log(path: &Path, windows: &[ExclusionWindow]) -> Result<LogTable> {
    let mut table = LogTable::from_path(path)?;
    let loaded = table.len();
    drop_duplicates(&mut table);
    remove_excluded(&mut table, windows);
    info!("Cleaned {}: {} of {} rows kept", path.display(), table.len(), loaded);
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const LOG: &str = "\
Timestamp,Access Type,Unique ID
2020-03-10 09:00:00,Jacobs Wood Shop,a
2020-03-10 09:00,Jacobs Wood Shop,a
2020-03-14 12:00:00,Jacobs Metal Shop,b
2021-08-25 23:59:59,Jacobs Metal Shop,c
2021-08-26 00:00:00,Jacobs Metal Shop,c
";

    fn table() -> LogTable {
        LogTable::from_reader(LOG.as_bytes(), "test").unwrap()
    }

    fn covid() -> Vec<ExclusionWindow> {
        vec![ExclusionWindow {
            start: NaiveDate::from_ymd_opt(2020, 3, 14).unwrap(),
            end: NaiveDate::from_ymd_opt(2021, 8, 25).unwrap(),
            reason: String::new(),
        }]
    }

    #[test]
    fn test_timestamps_are_canonicalized() {
        let t = table();
        assert_eq!(t.len(), 5);
        assert_eq!(t.rows()[1][0], "2020-03-10 09:00:00");
    }

    #[test]
    fn test_drop_duplicates_keeps_first() {
        let mut t = table();
        assert_eq!(drop_duplicates(&mut t), 1);
        assert_eq!(t.len(), 4);
        assert_eq!(t.timestamps().len(), 4);
        assert_eq!(t.rows()[1][2], "b");
    }

    #[test]
    fn test_drop_duplicates_respects_fractional_seconds() {
        let log = "\
Timestamp,Access Type,Unique ID
2023-09-01 14:30:05,Jacobs Wood Shop,a
2023-09-01 14:30:05.250,Jacobs Wood Shop,a
2023-09-01T14:30:05.25,Jacobs Wood Shop,a
";
        let mut t = LogTable::from_reader(log.as_bytes(), "test").unwrap();
        assert_eq!(t.rows()[1][0], "2023-09-01 14:30:05.250");
        assert_eq!(drop_duplicates(&mut t), 1);
        assert_eq!(
            t.column("Timestamp").unwrap(),
            vec!["2023-09-01 14:30:05", "2023-09-01 14:30:05.250"]
        );
    }

    #[test]
    fn test_exclusion_window_is_closed() {
        let mut t = table();
        assert_eq!(remove_excluded(&mut t, &covid()), 1);
        let ids = t.column("Unique ID").unwrap();
        assert_eq!(ids, vec!["a", "a", "c", "c"]);
        assert_eq!(t.rows()[2][0], "2021-08-25 23:59:59");
    }

    #[test]
    fn test_exclusion_window_ends_at_midnight() {
        let log = "\
Timestamp,Access Type,Unique ID
2020-03-14 00:00:00,Jacobs Wood Shop,a
2021-08-25 00:00:00,Jacobs Wood Shop,b
2021-08-25 14:00:00,Jacobs Wood Shop,c
";
        let mut t = LogTable::from_reader(log.as_bytes(), "test").unwrap();
        assert_eq!(remove_excluded(&mut t, &covid()), 2);
        assert_eq!(t.column("Unique ID").unwrap(), vec!["c"]);
    }

    #[test]
    fn test_missing_timestamp_column() {
        let err = LogTable::from_reader("Date,Who\n2020-01-01,a\n".as_bytes(), "log.csv")
            .unwrap_err();
        assert!(matches!(err, PrepError::MissingColumn { ref column, .. } if column == "Timestamp"));
    }

    #[test]
    fn test_bad_timestamp_reports_row() {
        let err = LogTable::from_reader(
            "Timestamp,Who\n2020-01-01 10:00:00,a\nyesterday,b\n".as_bytes(),
            "log.csv",
        )
        .unwrap_err();
        assert!(matches!(err, PrepError::BadRow { row: 3, .. }));
    }

    #[test]
    fn test_set_column_appends_then_replaces() {
        let mut t = table();
        t.set_column("Semester", vec!["x".to_string(); 5]).unwrap();
        assert_eq!(t.headers().last().map(String::as_str), Some("Semester"));
        t.set_column("Semester", vec!["y".to_string(); 5]).unwrap();
        assert_eq!(t.headers().len(), 4);
        assert!(t.column("Semester").unwrap().iter().all(|v| *v == "y"));
        assert!(t.set_column("Other", vec![]).is_err());
    }
}
