//! Output tables with dynamic columns
//!
//! Equipment tables are keyed by a column whose name depends on the
//! [`EquipmentField`](mksa_common::EquipmentField), and pivots have one column
//! per week or semester, so outputs are built as string tables rather than
//! serialized structs.

use std::path::Path;
use tracing::info;

use mksa_common::records::write_table;

/// Header row plus string cells
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Write as CSV, creating parent directories
    pub fn write(&self, path: &Path) -> crate::Result<()> {
        write_table(path, &self.headers, &self.rows)?;
        info!("Saved {} rows to {}", self.rows.len(), path.display());
        Ok(())
    }
}

/// Cell text for an optional value (empty when absent)
pub fn opt_cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
