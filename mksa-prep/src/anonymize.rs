//! Name anonymization
//!
//! Replaces the `First Name` and `Last Name` columns of the raw access log
//! with a `Unique ID`: the lowercase hex SHA-256 digest of `"{first} {last}"`.
//! The same person always gets the same ID, so per-user analysis still works
//! on the anonymized log.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

use mksa_common::records::columns;

use crate::{PrepError, Result};

/// Hashed identifier for a person
///
/// # Examples
///
/// ```
/// use mksa_prep::anonymize::unique_id;
///
/// let id = unique_id("Ada", "Lovelace");
/// assert_eq!(id.len(), 64);
/// assert_eq!(id, unique_id("Ada", "Lovelace"));
/// ```
pub fn unique_id(first: &str, last: &str) -> String {
    let digest = Sha256::digest(format!("{} {}", first, last).as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Stream a raw log from `reader` to `writer`, replacing names with IDs
///
/// Returns the number of data rows written.
pub fn anonymize_csv<R: Read, W: Write>(reader: R, writer: W, source: &str) -> Result<usize> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader.headers()?.clone();

    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| PrepError::MissingColumn {
                column: name.to_string(),
                file: source.to_string(),
            })
    };
    let first_col = find(columns::FIRST_NAME)?;
    let last_col = find(columns::LAST_NAME)?;
    let is_name = |i: usize| i == first_col || i == last_col;

    let mut writer = csv::Writer::from_writer(writer);
    let mut out_headers: Vec<&str> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| !is_name(*i))
        .map(|(_, h)| h)
        .collect();
    out_headers.push(columns::UNIQUE_ID);
    writer.write_record(&out_headers)?;

    let mut count = 0;
    for record in reader.records() {
        let record = record?;
        let first = record.get(first_col).unwrap_or_default();
        let last = record.get(last_col).unwrap_or_default();
        let id = unique_id(first, last);

        let mut out: Vec<&str> = record
            .iter()
            .enumerate()
            .filter(|(i, _)| !is_name(*i))
            .map(|(_, v)| v)
            .collect();
        out.push(&id);
        writer.write_record(&out)?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

/// Anonymize a raw log file into `output` (parent directories are created)
pub fn anonymize_file(input: &Path, output: &Path) -> Result<usize> {
    let reader = File::open(input)?;
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let writer = File::create(output)?;
    let count = anonymize_csv(reader, writer, &input.display().to_string())?;
    info!(
        "Anonymized {} rows: {} -> {}",
        count,
        input.display(),
        output.display()
    );
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_id_is_sha256_hex() {
        // sha256("a b")
        assert_eq!(
            unique_id("a", "b"),
            "c8687a08aa5d6ed2044328fa6a697ab8e96dc34291e8c2034ae8c38e6fcc6d65"
        );
        assert_ne!(unique_id("Ada", "Lovelace"), unique_id("Ada", "Byron"));
    }

    #[test]
    fn test_names_replaced_and_columns_kept_in_order() {
        let raw = "\
Timestamp,First Name,Access Type,Last Name
2023-09-01 10:00:00,Ada,Jacobs Wood Shop,Lovelace
2023-09-01 11:00:00,Ada,Jacobs Metal Shop,Lovelace
";
        let mut out = Vec::new();
        let count = anonymize_csv(raw.as_bytes(), &mut out, "raw").unwrap();
        assert_eq!(count, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Timestamp,Access Type,Unique ID");
        let id = unique_id("Ada", "Lovelace");
        assert_eq!(lines[1], format!("2023-09-01 10:00:00,Jacobs Wood Shop,{}", id));
        assert!(lines[2].ends_with(&id));
        assert!(!text.contains("Lovelace"));
    }

    #[test]
    fn test_missing_name_column() {
        let raw = "Timestamp,First Name\n2023-09-01 10:00:00,Ada\n";
        let err = anonymize_csv(raw.as_bytes(), Vec::new(), "raw").unwrap_err();
        assert!(matches!(err, PrepError::MissingColumn { ref column, .. } if column == "Last Name"));
    }
}
