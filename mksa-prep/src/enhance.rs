//! Dataset enhancement: term, week of term and equipment category per row

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::info;

use mksa_common::records::columns;
use mksa_common::{EquipmentCatalog, TermCalendar};

use crate::clean::LogTable;
use crate::{PrepError, Result};

/// What enhancement did to the table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnhanceSummary {
    pub rows_in: usize,
    /// Access types rewritten to their current name
    pub renamed: usize,
    /// Rows outside every term (summer sessions, closed terms)
    pub unassigned: usize,
    pub rows_out: usize,
    pub access_types: usize,
    /// Rows per equipment category
    pub categories: BTreeMap<String, usize>,
}

impl fmt::Display for EnhanceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Equipment Categorization Summary:")?;
        writeln!(f, "Total equipment types: {}", self.access_types)?;
        writeln!(f, "Total categories: {}", self.categories.len())?;
        writeln!(f)?;
        writeln!(f, "Category counts:")?;
        let mut counts: Vec<(&String, &usize)> = self.categories.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (category, count) in counts {
            writeln!(f, "  {:<24} {}", category, count)?;
        }
        Ok(())
    }
}

fn access_type_column(table: &LogTable) -> Result<usize> {
    table
        .column_index(columns::ACCESS_TYPE)
        .ok_or_else(|| PrepError::MissingColumn {
            column: columns::ACCESS_TYPE.to_string(),
            file: "access log".to_string(),
        })
}

/// Rewrite legacy access type names; returns the number of rows changed
pub fn normalize_equipment(table: &mut LogTable, catalog: &EquipmentCatalog) -> Result<usize> {
    let col = access_type_column(table)?;
    let mut renamed = 0;
    let values: Vec<String> = table
        .rows()
        .iter()
        .map(|row| {
            let current = catalog.normalize(&row[col]);
            if current != row[col] {
                renamed += 1;
            }
            current.to_string()
        })
        .collect();
    table.set_column(columns::ACCESS_TYPE, values)?;
    info!("Normalized {} equipment names", renamed);
    Ok(renamed)
}

/// Add `Semester` and `Semester_Week`, dropping rows outside every term
///
/// Returns the number of rows removed.
pub fn add_semester_info(table: &mut LogTable, calendar: &TermCalendar) -> Result<usize> {
    let assignments: Vec<Option<(String, u32)>> = table
        .timestamps()
        .iter()
        .map(|ts| calendar.assign(*ts).map(|a| (a.term.to_string(), a.week)))
        .collect();

    let removed = table.retain_rows(|i| assignments[i].is_some());
    let (semesters, weeks): (Vec<String>, Vec<String>) = assignments
        .into_iter()
        .flatten()
        .map(|(term, week)| (term, week.to_string()))
        .unzip();

    table.set_column(columns::SEMESTER, semesters)?;
    table.set_column(columns::SEMESTER_WEEK, weeks)?;
    info!(
        "Removed {} rows outside the term calendar (summer sessions, closed terms)",
        removed
    );
    Ok(removed)
}

/// Add `Equipment_Category`; returns rows per category
pub fn add_equipment_category(
    table: &mut LogTable,
    catalog: &EquipmentCatalog,
) -> Result<BTreeMap<String, usize>> {
    let col = access_type_column(table)?;
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let values: Vec<String> = table
        .rows()
        .iter()
        .map(|row| {
            let category = catalog.categorize(&row[col]).to_string();
            *counts.entry(category.clone()).or_insert(0) += 1;
            category
        })
        .collect();
    table.set_column(columns::EQUIPMENT_CATEGORY, values)?;
    Ok(counts)
}

/// Normalize names, assign terms and weeks, categorize equipment
pub fn enhance_table(
    table: &mut LogTable,
    calendar: &TermCalendar,
    catalog: &EquipmentCatalog,
) -> Result<EnhanceSummary> {
    let rows_in = table.len();
    let renamed = normalize_equipment(table, catalog)?;
    let unassigned = add_semester_info(table, calendar)?;
    let categories = add_equipment_category(table, catalog)?;

    let access_types = table
        .column(columns::ACCESS_TYPE)
        .map(|values| values.into_iter().collect::<BTreeSet<_>>().len())
        .unwrap_or(0);

    let summary = EnhanceSummary {
        rows_in,
        renamed,
        unassigned,
        rows_out: table.len(),
        access_types,
        categories,
    };
    info!(
        rows_in = summary.rows_in,
        rows_out = summary.rows_out,
        "Enhanced dataset: {} equipment types in {} categories",
        summary.access_types,
        summary.categories.len()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use mksa_common::Term;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn calendar() -> TermCalendar {
        TermCalendar::new(vec![
            // Wednesday start: week 1 begins Monday 2023-08-14
            Term::new("Fall 2023", d(2023, 8, 16), d(2023, 12, 15)),
            Term::new("Spring 2024", d(2024, 1, 9), d(2024, 5, 10)),
        ])
        .unwrap()
    }

    const LOG: &str = "\
Timestamp,Access Type,Unique ID
2023-08-16 10:00:00,Jacobs DiWire Room 220C,a
2023-08-21 09:00:00,Jacobs Wood Shop,b
2023-12-15 00:00:00,Jacobs Metal Shop,c
2023-12-16 10:00:00,Jacobs Metal Shop,c
2024-06-01 10:00:00,Jacobs Wood Shop,d
2024-01-09 08:00:00,Jacobs MakerPass Access,e
";

    fn table() -> LogTable {
        LogTable::from_reader(LOG.as_bytes(), "test").unwrap()
    }

    #[test]
    fn test_semester_info_and_unassigned_rows() {
        let mut t = table();
        let removed = add_semester_info(&mut t, &calendar()).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(
            t.column("Semester").unwrap(),
            vec!["Fall 2023", "Fall 2023", "Fall 2023", "Spring 2024"]
        );
        assert_eq!(t.column("Semester_Week").unwrap(), vec!["1", "2", "18", "1"]);
    }

    #[test]
    fn test_enhance_table() {
        let mut t = table();
        let summary = enhance_table(&mut t, &calendar(), &EquipmentCatalog::default()).unwrap();
        assert_eq!(summary.rows_in, 6);
        assert_eq!(summary.renamed, 1);
        assert_eq!(summary.unassigned, 2);
        assert_eq!(summary.rows_out, 4);
        assert_eq!(summary.access_types, 4);
        assert_eq!(summary.categories.get("Basic Prototyping"), Some(&1));
        assert_eq!(summary.categories.get("Entry"), Some(&1));

        assert_eq!(
            t.headers(),
            &["Timestamp", "Access Type", "Unique ID", "Semester", "Semester_Week", "Equipment_Category"]
        );
        assert_eq!(t.rows()[0][1], "Jacobs DiWire");
        assert_eq!(t.rows()[0][5], "Basic Prototyping");
    }

    #[test]
    fn test_summary_report_orders_by_count() {
        let mut t = table();
        let summary = enhance_table(&mut t, &calendar(), &EquipmentCatalog::default()).unwrap();
        let text = summary.to_string();
        assert!(text.starts_with("Equipment Categorization Summary:"));
        assert!(text.contains("Total categories: 4"));
    }

    #[test]
    fn test_missing_access_type() {
        let mut t = LogTable::from_reader("Timestamp\n2023-08-16 10:00:00\n".as_bytes(), "t").unwrap();
        assert!(normalize_equipment(&mut t, &EquipmentCatalog::default()).is_err());
    }
}
