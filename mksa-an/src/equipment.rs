//! Equipment popularity analysis
//!
//! The same aggregation runs for each [`EquipmentField`]: individual tools
//! (`Access Type`) and their categories (`Equipment_Category`). Facility
//! entry swipes are excluded first, since they count visits rather than
//! equipment use.
//!
//! Per field the analysis produces:
//! - counts per (item, semester, week) with the share of that week's total
//! - per (item, week) statistics across semesters
//! - week-over-week percent changes per (item, semester)
//! - rankings within each (semester, week), rank consistency per item and the
//!   top item of every week
//! - peak and low week per item

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use mksa_common::records::{columns, read_headers};
use mksa_common::stats::{self, argmax_first, argmin_first, percent_change_between, rank_min_desc};
use mksa_common::{EnhancedRecord, EquipmentCatalog, EquipmentField, SemesterKey};

use crate::table::{opt_cell, Table};
use crate::usage::LOW_WEEK_COVERAGE;
use crate::{AnalysisError, Result};

/// Number of entries listed in the report sections
const REPORT_TOP: usize = 5;
const REPORT_CONSISTENT: usize = 3;

/// Uses of one item in one week of one semester
#[derive(Debug, Clone, PartialEq)]
pub struct ItemWeekCount {
    pub item: String,
    pub semester: String,
    pub week: u32,
    pub count: u64,
    /// Equipment uses in that semester week, all items
    pub total: u64,
    /// `count / total × 100`
    pub percentage: f64,
    /// 1 = most used in that semester week; ties share the lowest rank
    pub rank: u32,
}

/// One item in one week of semester, compared across semesters
#[derive(Debug, Clone, PartialEq)]
pub struct ItemWeekStats {
    pub item: String,
    pub week: u32,
    pub avg_usage: f64,
    /// 0 when only one semester has this item in this week
    pub std_usage: f64,
    pub min_usage: u64,
    pub max_usage: u64,
    pub num_semesters: usize,
}

/// Week-over-week changes of one item in one semester
#[derive(Debug, Clone, PartialEq)]
pub struct ItemPctChanges {
    pub item: String,
    pub semester: String,
    /// Week → percent change from the previous week (weeks ≥ 2)
    pub changes: BTreeMap<u32, Option<f64>>,
}

/// How stable an item's rank is across semester weeks
#[derive(Debug, Clone, PartialEq)]
pub struct RankConsistency {
    pub item: String,
    pub mean: f64,
    /// `None` when the item was ranked in a single semester week
    pub std: Option<f64>,
    pub min: u32,
    pub max: u32,
}

/// Top item of every (semester, week)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopPivot {
    /// Weeks in ascending order (columns)
    pub weeks: Vec<u32>,
    /// Semester (chronological) → top item per week, aligned with `weeks`
    pub rows: Vec<(String, Vec<Option<String>>)>,
}

/// Semesters whose top item differs from the previous week
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopItemChange {
    pub from_week: u32,
    pub to_week: u32,
    pub semesters_changed: usize,
    pub share: f64,
}

impl TopPivot {
    /// Changes of top item between consecutive weeks
    ///
    /// A semester missing both weeks is not a change; a semester missing one
    /// of them is. Counting with NaN inequality would instead treat a
    /// semester with neither week as changed, so these counts and shares can
    /// be lower than such a count on sparse pivots.
    pub fn changes(&self) -> Vec<TopItemChange> {
        let semesters = self.rows.len();
        let mut out = Vec::new();
        for (i, pair) in self.weeks.windows(2).enumerate() {
            if pair[1] != pair[0] + 1 {
                continue;
            }
            let changed = self
                .rows
                .iter()
                .filter(|(_, tops)| tops[i] != tops[i + 1])
                .count();
            if changed > 0 {
                out.push(TopItemChange {
                    from_week: pair[0],
                    to_week: pair[1],
                    semesters_changed: changed,
                    share: changed as f64 / semesters as f64,
                });
            }
        }
        out
    }
}

/// Full analysis for one field
#[derive(Debug, Clone, PartialEq)]
pub struct EquipmentAnalysis {
    pub field: EquipmentField,
    /// Ordered by item, semester (chronological), week
    pub counts: Vec<ItemWeekCount>,
    /// Ordered by item, week
    pub stats: Vec<ItemWeekStats>,
    pub pct_changes: Vec<ItemPctChanges>,
    /// Ordered by mean rank
    pub consistency: Vec<RankConsistency>,
    pub top_pivot: TopPivot,
    pub peak_weeks: Vec<ItemWeekStats>,
    pub low_weeks: Vec<ItemWeekStats>,
}

impl EquipmentAnalysis {
    /// Rows ranked first in their semester week (ties included)
    pub fn top_items(&self) -> impl Iterator<Item = &ItemWeekCount> {
        self.counts.iter().filter(|c| c.rank == 1)
    }

    /// Items in ascending name order
    pub fn items(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self.stats.iter().map(|s| s.item.as_str()).collect();
        set.into_iter().collect()
    }

    /// Mean of each item's weekly average, most used first
    pub fn overall_popularity(&self) -> Vec<(String, f64)> {
        let mut by_item: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for s in &self.stats {
            by_item.entry(&s.item).or_default().push(s.avg_usage);
        }
        let mut out: Vec<(String, f64)> = by_item
            .into_iter()
            .filter_map(|(item, avgs)| Some((item.to_string(), stats::mean(&avgs)?)))
            .collect();
        out.sort_by(|a, b| b.1.total_cmp(&a.1));
        out
    }
}

/// Check the enhanced log has the columns equipment analysis groups by
pub fn require_equipment_columns(path: &Path) -> Result<()> {
    let headers = read_headers(path)?;
    for column in [columns::ACCESS_TYPE, columns::EQUIPMENT_CATEGORY] {
        if !headers.iter().any(|h| h == column) {
            return Err(AnalysisError::MissingColumn(column.to_string()));
        }
    }
    Ok(())
}

/// Records left after removing excluded access types and categories
pub fn filter_equipment_records<'a>(
    records: &'a [EnhancedRecord],
    catalog: &EquipmentCatalog,
) -> Vec<&'a EnhancedRecord> {
    let kept: Vec<&EnhancedRecord> = records
        .iter()
        .filter(|r| !catalog.is_excluded(&r.access_type, &r.equipment_category))
        .collect();

    let mut types: HashMap<&str, usize> = HashMap::new();
    let mut categories: BTreeMap<&str, usize> = BTreeMap::new();
    for r in &kept {
        *types.entry(&r.access_type).or_insert(0) += 1;
        *categories.entry(&r.equipment_category).or_insert(0) += 1;
    }
    let mut top_types: Vec<(&str, usize)> = types.iter().map(|(k, v)| (*k, *v)).collect();
    top_types.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    top_types.truncate(REPORT_TOP);

    info!(
        "Equipment records: {} of {} after exclusions",
        kept.len(),
        records.len()
    );
    info!("Equipment types in dataset: {}", types.len());
    info!("Equipment categories in dataset: {}", categories.len());
    info!("Top {} equipment types: {:?}", REPORT_TOP, top_types);
    info!("Equipment categories: {:?}", categories);
    kept
}

/// Counts, shares and ranks per (item, semester, week)
pub fn item_week_counts(records: &[&EnhancedRecord], field: EquipmentField) -> Vec<ItemWeekCount> {
    let mut counts: BTreeMap<(String, SemesterKey, u32), u64> = BTreeMap::new();
    let mut totals: HashMap<(&str, u32), u64> = HashMap::new();
    for r in records {
        *counts
            .entry((
                field.value(r).to_string(),
                SemesterKey::new(&r.semester),
                r.semester_week,
            ))
            .or_insert(0) += 1;
        *totals.entry((&r.semester, r.semester_week)).or_insert(0) += 1;
    }

    let mut rows: Vec<ItemWeekCount> = counts
        .into_iter()
        .map(|((item, key, week), count)| {
            let total = totals.get(&(key.name.as_str(), week)).copied().unwrap_or(count);
            ItemWeekCount {
                item,
                semester: key.name,
                week,
                count,
                total,
                percentage: count as f64 / total as f64 * 100.0,
                rank: 0,
            }
        })
        .collect();

    // Rank within each (semester, week)
    let mut groups: HashMap<(String, u32), Vec<usize>> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        groups
            .entry((row.semester.clone(), row.week))
            .or_default()
            .push(i);
    }
    for indices in groups.values() {
        let values: Vec<f64> = indices.iter().map(|&i| rows[i].count as f64).collect();
        for (&i, rank) in indices.iter().zip(rank_min_desc(&values)) {
            rows[i].rank = rank;
        }
    }
    rows
}

/// Statistics per (item, week) across semesters
pub fn item_week_stats(counts: &[ItemWeekCount]) -> Vec<ItemWeekStats> {
    let mut groups: BTreeMap<(&str, u32), Vec<u64>> = BTreeMap::new();
    for c in counts {
        groups.entry((&c.item, c.week)).or_default().push(c.count);
    }
    groups
        .into_iter()
        .filter_map(|((item, week), values)| {
            let as_f64: Vec<f64> = values.iter().map(|&v| v as f64).collect();
            let summary = stats::summarize(&as_f64)?;
            Some(ItemWeekStats {
                item: item.to_string(),
                week,
                avg_usage: summary.mean,
                std_usage: summary.std.unwrap_or(0.0),
                min_usage: values.iter().copied().min().unwrap_or(0),
                max_usage: values.iter().copied().max().unwrap_or(0),
                num_semesters: summary.count,
            })
        })
        .collect()
}

/// Weeks that appear anywhere in the counts, ascending
fn all_weeks(counts: &[ItemWeekCount]) -> Vec<u32> {
    counts
        .iter()
        .map(|c| c.week)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Week-over-week percent change per (item, semester)
///
/// A change is listed for every week `w ≥ 2` whose predecessor `w − 1`
/// appears in the data for any item; it is `None` when the item has no uses
/// in either week of that semester.
pub fn item_pct_changes(counts: &[ItemWeekCount]) -> Vec<ItemPctChanges> {
    let weeks = all_weeks(counts);
    let change_weeks: Vec<u32> = weeks
        .iter()
        .copied()
        .filter(|&w| w > 1 && weeks.binary_search(&(w - 1)).is_ok())
        .collect();

    let mut series: BTreeMap<(&str, SemesterKey), HashMap<u32, u64>> = BTreeMap::new();
    for c in counts {
        series
            .entry((&c.item, SemesterKey::new(&c.semester)))
            .or_default()
            .insert(c.week, c.count);
    }

    series
        .into_iter()
        .map(|((item, key), by_week)| {
            let changes = change_weeks
                .iter()
                .map(|&w| {
                    let change = match (by_week.get(&(w - 1)), by_week.get(&w)) {
                        (Some(&prev), Some(&cur)) => {
                            percent_change_between(prev as f64, cur as f64)
                        }
                        _ => None,
                    };
                    (w, change)
                })
                .collect();
            ItemPctChanges {
                item: item.to_string(),
                semester: key.name,
                changes,
            }
        })
        .collect()
}

/// Rank statistics per item, lowest mean rank first
pub fn rank_consistency(counts: &[ItemWeekCount]) -> Vec<RankConsistency> {
    let mut ranks: BTreeMap<&str, Vec<u32>> = BTreeMap::new();
    for c in counts {
        ranks.entry(&c.item).or_default().push(c.rank);
    }
    let mut out: Vec<RankConsistency> = ranks
        .into_iter()
        .filter_map(|(item, ranks)| {
            let as_f64: Vec<f64> = ranks.iter().map(|&r| f64::from(r)).collect();
            let summary = stats::summarize(&as_f64)?;
            Some(RankConsistency {
                item: item.to_string(),
                mean: summary.mean,
                std: summary.std,
                min: ranks.iter().copied().min().unwrap_or(0),
                max: ranks.iter().copied().max().unwrap_or(0),
            })
        })
        .collect();
    out.sort_by(|a, b| a.mean.total_cmp(&b.mean));
    out
}

/// Top item of each semester week; ties go to the alphabetically first item
pub fn top_pivot(counts: &[ItemWeekCount]) -> TopPivot {
    let weeks = all_weeks(counts);
    let mut tops: BTreeMap<SemesterKey, BTreeMap<u32, &str>> = BTreeMap::new();
    for c in counts.iter().filter(|c| c.rank == 1) {
        let entry = tops
            .entry(SemesterKey::new(&c.semester))
            .or_default()
            .entry(c.week)
            .or_insert(c.item.as_str());
        if c.item.as_str() < *entry {
            *entry = c.item.as_str();
        }
    }

    let rows = tops
        .into_iter()
        .map(|(key, by_week)| {
            let cells = weeks
                .iter()
                .map(|w| by_week.get(w).map(|item| item.to_string()))
                .collect();
            (key.name, cells)
        })
        .collect();
    TopPivot { weeks, rows }
}

/// Peak and low week for every item
///
/// The peak is the week with the highest average use. The low week is the
/// lowest-average week among weeks present in at least 75% of the item's
/// best-covered week.
pub fn identify_peak_usage(stats: &[ItemWeekStats]) -> (Vec<ItemWeekStats>, Vec<ItemWeekStats>) {
    let mut by_item: BTreeMap<&str, Vec<&ItemWeekStats>> = BTreeMap::new();
    for s in stats {
        by_item.entry(&s.item).or_default().push(s);
    }

    let mut peaks = Vec::new();
    let mut lows = Vec::new();
    for (item, rows) in &by_item {
        if let Some(i) = argmax_first(rows.iter().map(|s| s.avg_usage)) {
            peaks.push(rows[i].clone());
        }

        let max_coverage = rows.iter().map(|s| s.num_semesters).max().unwrap_or(0);
        if max_coverage == 0 {
            continue;
        }
        let threshold = LOW_WEEK_COVERAGE * max_coverage as f64;
        let common: Vec<&ItemWeekStats> = rows
            .iter()
            .copied()
            .filter(|s| s.num_semesters as f64 >= threshold)
            .collect();
        match argmin_first(common.iter().map(|s| s.avg_usage)) {
            Some(i) => lows.push(common[i].clone()),
            None => info!("No weeks with sufficient data for {} (75% threshold)", item),
        }
    }

    info!(
        "Found peak usage weeks for {} out of {} items",
        peaks.len(),
        by_item.len()
    );
    info!(
        "Found low usage weeks for {} out of {} items",
        lows.len(),
        by_item.len()
    );
    (peaks, lows)
}

/// Run the analysis for one field on already filtered records
pub fn analyze_field(records: &[&EnhancedRecord], field: EquipmentField) -> Result<EquipmentAnalysis> {
    if records.is_empty() {
        return Err(AnalysisError::EmptyData(format!(
            "no equipment records for {}",
            field
        )));
    }
    let counts = item_week_counts(records, field);
    let stats = item_week_stats(&counts);
    let pct_changes = item_pct_changes(&counts);
    let consistency = rank_consistency(&counts);
    let top_pivot = top_pivot(&counts);
    let (peak_weeks, low_weeks) = identify_peak_usage(&stats);
    if peak_weeks.is_empty() || low_weeks.is_empty() {
        warn!("Unable to identify peak or low usage weeks for {}", field);
    }

    Ok(EquipmentAnalysis {
        field,
        counts,
        stats,
        pct_changes,
        consistency,
        top_pivot,
        peak_weeks,
        low_weeks,
    })
}

/// Exclude entry records, then analyze every field
pub fn analyze_equipment(
    records: &[EnhancedRecord],
    catalog: &EquipmentCatalog,
) -> Result<Vec<EquipmentAnalysis>> {
    let kept = filter_equipment_records(records, catalog);
    EquipmentField::ALL
        .iter()
        .map(|&field| {
            info!("Analyzing {}", field.display_name());
            analyze_field(&kept, field)
        })
        .collect()
}

impl fmt::Display for EquipmentAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = self.field.column();

        writeln!(f, "===== {} USAGE SUMMARY STATISTICS =====", field.to_uppercase())?;

        writeln!(f, "\n--- Overall {} Popularity ---", field)?;
        for (i, (item, avg)) in self.overall_popularity().iter().take(REPORT_TOP).enumerate() {
            writeln!(f, "{}. {}: {:.2} average uses", i + 1, item, avg)?;
        }

        writeln!(f, "\n--- Peak Usage Weeks by {} ---", field)?;
        let mut peaks: Vec<&ItemWeekStats> = self.peak_weeks.iter().collect();
        peaks.sort_by(|a, b| b.avg_usage.total_cmp(&a.avg_usage));
        for s in peaks.iter().take(REPORT_TOP) {
            writeln!(f, "{}: Week {} with {:.2} average uses", s.item, s.week, s.avg_usage)?;
        }

        writeln!(f, "\n--- Lowest Usage Weeks by {} ---", field)?;
        let mut lows: Vec<&ItemWeekStats> = self.low_weeks.iter().collect();
        lows.sort_by(|a, b| a.avg_usage.total_cmp(&b.avg_usage));
        for s in lows.iter().take(REPORT_TOP) {
            writeln!(f, "{}: Week {} with {:.2} average uses", s.item, s.week, s.avg_usage)?;
        }

        writeln!(f, "\n--- {} Ranking Consistency ---", field)?;
        writeln!(
            f,
            "Most consistently popular {} (lowest rank = highest usage):",
            field
        )?;
        for c in self.consistency.iter().take(REPORT_CONSISTENT) {
            writeln!(
                f,
                "{}: Avg Rank {:.2} (min: {}, max: {})",
                c.item, c.mean, c.min, c.max
            )?;
        }

        writeln!(f, "\n--- Weekly Changes in Top {} ---", field)?;
        for change in self.top_pivot.changes() {
            writeln!(
                f,
                "Week {} to Week {}: {} semesters changed top {} ({:.1}%)",
                change.from_week,
                change.to_week,
                change.semesters_changed,
                field,
                change.share * 100.0
            )?;
        }
        Ok(())
    }
}

/// Console summary for one field
pub fn equipment_report(analysis: &EquipmentAnalysis) -> String {
    analysis.to_string()
}

fn stats_table(field: &str, rows: &[ItemWeekStats]) -> Table {
    let mut table = Table::new([
        field,
        columns::SEMESTER_WEEK,
        "avg_usage",
        "std_usage",
        "min_usage",
        "max_usage",
        "num_semesters",
    ]);
    for s in rows {
        table.push(vec![
            s.item.clone(),
            s.week.to_string(),
            s.avg_usage.to_string(),
            s.std_usage.to_string(),
            s.min_usage.to_string(),
            s.max_usage.to_string(),
            s.num_semesters.to_string(),
        ]);
    }
    table
}

/// Output tables keyed by file name (`{suffix}_counts.csv`, ...)
pub fn output_tables(analysis: &EquipmentAnalysis) -> Vec<(String, Table)> {
    let field = analysis.field.column();
    let suffix = analysis.field.file_suffix();

    let mut counts = Table::new([field, columns::SEMESTER, columns::SEMESTER_WEEK, "Count"]);
    let mut percentages = Table::new([
        field,
        columns::SEMESTER,
        columns::SEMESTER_WEEK,
        "Count",
        "Total",
        "Percentage",
    ]);
    let mut rankings = percentages.clone();
    rankings.headers.push("Rank".to_string());
    for c in &analysis.counts {
        let base = vec![
            c.item.clone(),
            c.semester.clone(),
            c.week.to_string(),
            c.count.to_string(),
        ];
        counts.push(base.clone());
        let mut pct = base;
        pct.push(c.total.to_string());
        pct.push(c.percentage.to_string());
        percentages.push(pct.clone());
        pct.push(c.rank.to_string());
        rankings.push(pct);
    }

    let change_weeks: Vec<u32> = analysis
        .pct_changes
        .first()
        .map(|p| p.changes.keys().copied().collect())
        .unwrap_or_default();
    let mut pct_changes = Table::new(
        [field.to_string(), columns::SEMESTER.to_string()]
            .into_iter()
            .chain(change_weeks.iter().map(|w| format!("pct_change_{}", w))),
    );
    for p in &analysis.pct_changes {
        let mut row = vec![p.item.clone(), p.semester.clone()];
        row.extend(p.changes.values().map(|c| opt_cell(*c)));
        pct_changes.push(row);
    }

    let mut consistency = Table::new([field, "mean", "std", "min", "max"]);
    for c in &analysis.consistency {
        consistency.push(vec![
            c.item.clone(),
            c.mean.to_string(),
            opt_cell(c.std),
            c.min.to_string(),
            c.max.to_string(),
        ]);
    }

    let pivot = &analysis.top_pivot;
    let mut top = Table::new(
        std::iter::once(columns::SEMESTER.to_string())
            .chain(pivot.weeks.iter().map(|w| w.to_string())),
    );
    for (semester, cells) in &pivot.rows {
        let mut row = vec![semester.clone()];
        row.extend(cells.iter().map(|c| c.clone().unwrap_or_default()));
        top.push(row);
    }

    vec![
        (format!("{}_counts.csv", suffix), counts),
        (format!("{}_percentages.csv", suffix), percentages),
        (format!("{}_stats.csv", suffix), stats_table(field, &analysis.stats)),
        (format!("{}_rankings.csv", suffix), rankings),
        (format!("{}_peak_weeks.csv", suffix), stats_table(field, &analysis.peak_weeks)),
        (format!("{}_low_weeks.csv", suffix), stats_table(field, &analysis.low_weeks)),
        (format!("{}_pct_changes.csv", suffix), pct_changes),
        (format!("{}_consistency.csv", suffix), consistency),
        (format!("{}_top_pivot.csv", suffix), top),
    ]
}

/// Write every output table into `output_dir`
pub fn save_equipment_outputs(
    analysis: &EquipmentAnalysis,
    output_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for (name, table) in output_tables(analysis) {
        let path = output_dir.join(name);
        table.write(&path)?;
        written.push(path);
    }
    info!(
        "Saved {} {} tables to {}",
        written.len(),
        analysis.field,
        output_dir.display()
    );
    Ok(written)
}
