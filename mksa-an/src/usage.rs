//! Weekly usage analysis
//!
//! Counts visits per (semester, week of semester), then compares the same
//! week across semesters: mean, spread, coverage and the change of the mean
//! from the previous week.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

use mksa_common::stats::{self, argmax_first, argmin_first, percent_change};
use mksa_common::{EnhancedRecord, SemesterKey};

use crate::table::{opt_cell, Table};
use crate::{AnalysisError, Result};

/// Weeks must be present in at least this share of the best-covered week's
/// semesters to be reported as the low week
pub const LOW_WEEK_COVERAGE: f64 = 0.75;

/// Visits in one week of one semester
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyCount {
    #[serde(rename = "Semester")]
    pub semester: String,
    #[serde(rename = "Semester_Week")]
    pub week: u32,
    #[serde(rename = "Count")]
    pub count: u64,
}

/// One week of semester compared across semesters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyStats {
    #[serde(rename = "Semester_Week")]
    pub week: u32,
    pub avg_usage: f64,
    /// Sample standard deviation; 0 when only one semester has the week
    pub std_usage: f64,
    pub min_usage: u64,
    pub max_usage: u64,
    pub num_semesters: usize,
    /// Change of `avg_usage` from the previous listed week, in percent
    pub percent_change: Option<f64>,
}

/// A week and its average visits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeekUsage {
    pub week: u32,
    pub avg_usage: f64,
}

/// Highest-average week and lowest-average well-covered week
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakWeeks {
    pub highest: WeekUsage,
    pub lowest: WeekUsage,
}

/// Result of the weekly usage analysis
#[derive(Debug, Clone, PartialEq)]
pub struct UsageAnalysis {
    /// Ordered chronologically by semester, then by week
    pub counts: Vec<WeeklyCount>,
    /// Ordered by week
    pub stats: Vec<WeeklyStats>,
    pub peaks: PeakWeeks,
}

/// Count records per (semester, week)
pub fn weekly_counts(records: &[EnhancedRecord]) -> Vec<WeeklyCount> {
    let mut counts: BTreeMap<(SemesterKey, u32), u64> = BTreeMap::new();
    for record in records {
        *counts
            .entry((SemesterKey::new(&record.semester), record.semester_week))
            .or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|((key, week), count)| WeeklyCount {
            semester: key.name,
            week,
            count,
        })
        .collect()
}

/// Aggregate weekly counts across semesters, one row per week
pub fn weekly_stats(counts: &[WeeklyCount]) -> Vec<WeeklyStats> {
    let mut by_week: BTreeMap<u32, Vec<u64>> = BTreeMap::new();
    for c in counts {
        by_week.entry(c.week).or_default().push(c.count);
    }

    let mut rows: Vec<WeeklyStats> = by_week
        .into_iter()
        .filter_map(|(week, values)| {
            let as_f64: Vec<f64> = values.iter().map(|&v| v as f64).collect();
            let summary = stats::summarize(&as_f64)?;
            Some(WeeklyStats {
                week,
                avg_usage: summary.mean,
                std_usage: summary.std.unwrap_or(0.0),
                min_usage: values.iter().copied().min().unwrap_or(0),
                max_usage: values.iter().copied().max().unwrap_or(0),
                num_semesters: summary.count,
                percent_change: None,
            })
        })
        .collect();

    let avgs: Vec<f64> = rows.iter().map(|r| r.avg_usage).collect();
    for (row, change) in rows.iter_mut().zip(percent_change(&avgs)) {
        row.percent_change = change;
    }
    rows
}

/// Highest and lowest average weeks
///
/// The lowest week is chosen among weeks seen in at least
/// [`LOW_WEEK_COVERAGE`] of the maximum number of semesters, so late weeks
/// that only a few long terms reach do not win by default. Ties go to the
/// earliest week. `None` for empty input.
pub fn identify_peak_weeks(stats: &[WeeklyStats]) -> Option<PeakWeeks> {
    let highest = &stats[argmax_first(stats.iter().map(|s| s.avg_usage))?];

    let max_coverage = stats.iter().map(|s| s.num_semesters).max()?;
    let threshold = LOW_WEEK_COVERAGE * max_coverage as f64;
    let common: Vec<&WeeklyStats> = stats
        .iter()
        .filter(|s| s.num_semesters as f64 >= threshold)
        .collect();
    let lowest = common[argmin_first(common.iter().map(|s| s.avg_usage))?];

    Some(PeakWeeks {
        highest: WeekUsage {
            week: highest.week,
            avg_usage: highest.avg_usage,
        },
        lowest: WeekUsage {
            week: lowest.week,
            avg_usage: lowest.avg_usage,
        },
    })
}

/// Run the weekly usage analysis
pub fn analyze_usage(records: &[EnhancedRecord]) -> Result<UsageAnalysis> {
    let counts = weekly_counts(records);
    let stats = weekly_stats(&counts);
    let peaks = identify_peak_weeks(&stats)
        .ok_or_else(|| AnalysisError::EmptyData("no weekly usage records".to_string()))?;
    info!(
        "Weekly usage: {} semester-weeks across {} weeks",
        counts.len(),
        stats.len()
    );
    Ok(UsageAnalysis {
        counts,
        stats,
        peaks,
    })
}

impl fmt::Display for UsageAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let avgs: Vec<f64> = self.stats.iter().map(|s| s.avg_usage).collect();

        writeln!(f, "===== MAKERSPACE USAGE SUMMARY STATISTICS =====")?;
        writeln!(f, "Number of weeks analyzed: {}", self.stats.len())?;
        writeln!(
            f,
            "Average weekly usage across all weeks: {:.2}",
            stats::mean(&avgs).unwrap_or(0.0)
        )?;
        writeln!(
            f,
            "Standard deviation across all weeks: {:.2}",
            stats::sample_std(&avgs).unwrap_or(0.0)
        )?;

        writeln!(f, "\n--- Peak Weeks ---")?;
        writeln!(
            f,
            "Highest usage: Week {} with average of {:.2} entries",
            self.peaks.highest.week, self.peaks.highest.avg_usage
        )?;
        writeln!(
            f,
            "Lowest usage: Week {} with average of {:.2} entries",
            self.peaks.lowest.week, self.peaks.lowest.avg_usage
        )?;

        let mut changes: Vec<(u32, f64)> = self
            .stats
            .iter()
            .filter_map(|s| s.percent_change.map(|c| (s.week, c)))
            .collect();

        writeln!(f, "\n--- Weekly Trends ---")?;
        writeln!(f, "Weeks with highest percent increase:")?;
        changes.sort_by(|a, b| b.1.total_cmp(&a.1));
        for (week, change) in changes.iter().take(3) {
            writeln!(f, "  Week {}: {:.2}% increase from previous week", week, change)?;
        }

        writeln!(f, "\nWeeks with highest percent decrease:")?;
        changes.sort_by(|a, b| a.1.total_cmp(&b.1));
        for (week, change) in changes.iter().take(3) {
            writeln!(f, "  Week {}: {:.2}% decrease from previous week", week, change)?;
        }
        Ok(())
    }
}

/// Console summary of the weekly usage analysis
pub fn usage_report(analysis: &UsageAnalysis) -> String {
    analysis.to_string()
}

/// Weeks × semesters table of counts (empty cell where a semester lacks a week)
pub fn pivot_table(counts: &[WeeklyCount]) -> Table {
    let mut semesters: Vec<SemesterKey> = Vec::new();
    let mut cells: BTreeMap<u32, BTreeMap<&str, u64>> = BTreeMap::new();
    for c in counts {
        let key = SemesterKey::new(&c.semester);
        if !semesters.contains(&key) {
            semesters.push(key);
        }
        cells.entry(c.week).or_default().insert(&c.semester, c.count);
    }
    semesters.sort();

    let mut table = Table::new(
        std::iter::once("Semester_Week".to_string()).chain(semesters.iter().map(|s| s.name.clone())),
    );
    for (week, row) in &cells {
        let mut line = vec![week.to_string()];
        line.extend(
            semesters
                .iter()
                .map(|s| opt_cell(row.get(s.name.as_str()))),
        );
        table.push(line);
    }
    table
}

/// Save `weekly_stats.csv`, `weekly_counts.csv` and `pivot_table.csv`
pub fn save_usage_outputs(analysis: &UsageAnalysis, output_dir: &Path) -> Result<Vec<PathBuf>> {
    let stats_path = output_dir.join("weekly_stats.csv");
    mksa_common::records::write_csv(&stats_path, &analysis.stats)?;
    info!("Saved weekly statistics to {}", stats_path.display());

    let counts_path = output_dir.join("weekly_counts.csv");
    mksa_common::records::write_csv(&counts_path, &analysis.counts)?;
    info!("Saved weekly counts by semester to {}", counts_path.display());

    let pivot_path = output_dir.join("pivot_table.csv");
    pivot_table(&analysis.counts).write(&pivot_path)?;

    Ok(vec![stats_path, counts_path, pivot_path])
}
