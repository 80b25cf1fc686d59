//! Equipment popularity and ranking charts
//!
//! Drawn once per [`EquipmentField`](mksa_common::EquipmentField), with file
//! names prefixed by the field's suffix (`access_type_...`,
//! `equipment_category_...`). Charts with many items are split into numbered
//! groups so labels stay readable.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use mksa_an::equipment::ItemWeekCount;
use mksa_an::EquipmentAnalysis;
use mksa_common::stats::mean;
use mksa_common::SemesterKey;

use crate::charts::{
    bar_chart, box_plot, chunk_groups, grouped_bar_chart, heatmap, line_chart, Bar, BarStyle,
    ChartText, Grid, HeatmapStyle, Series,
};
use crate::Result;

const SEMESTER_GROUP: (usize, usize) = (10, 10);
const WEEKLY_GROUP: (usize, usize) = (8, 8);
const CONSISTENCY_GROUP: (usize, usize) = (15, 15);
const RANK_GROUP: (usize, usize) = (20, 20);
const TREND_GROUP: (usize, usize) = (15, 10);

const WEEK_DESC: &str = "Week of Semester";
const SHARE_DESC: &str = "Percentage of Total Usage";
const AVG_RANK_DESC: &str = "Average Rank (1 = Most Popular)";

/// Per item, the mean of `value` for each key
fn mean_by<K: Ord>(
    counts: &[ItemWeekCount],
    key: impl Fn(&ItemWeekCount) -> K,
    value: impl Fn(&ItemWeekCount) -> f64,
) -> BTreeMap<String, BTreeMap<K, f64>> {
    let mut grouped: BTreeMap<&str, BTreeMap<K, Vec<f64>>> = BTreeMap::new();
    for c in counts {
        grouped
            .entry(c.item.as_str())
            .or_default()
            .entry(key(c))
            .or_default()
            .push(value(c));
    }
    grouped
        .into_iter()
        .map(|(item, by_key)| {
            let means = by_key
                .into_iter()
                .filter_map(|(k, values)| Some((k, mean(&values)?)))
                .collect();
            (item.to_string(), means)
        })
        .collect()
}

/// Mean share of weekly usage per item and semester
pub fn semester_shares(counts: &[ItemWeekCount]) -> BTreeMap<String, BTreeMap<SemesterKey, f64>> {
    mean_by(counts, |c| SemesterKey::new(&c.semester), |c| c.percentage)
}

/// Mean share of weekly usage per item and week
pub fn weekly_shares(counts: &[ItemWeekCount]) -> BTreeMap<String, BTreeMap<u32, f64>> {
    mean_by(counts, |c| c.week, |c| c.percentage)
}

/// Mean rank per item and week
pub fn weekly_mean_ranks(counts: &[ItemWeekCount]) -> BTreeMap<String, BTreeMap<u32, f64>> {
    mean_by(counts, |c| c.week, |c| c.rank as f64)
}

/// Mean rank per item and semester
pub fn semester_mean_ranks(counts: &[ItemWeekCount]) -> BTreeMap<String, BTreeMap<SemesterKey, f64>> {
    mean_by(counts, |c| SemesterKey::new(&c.semester), |c| c.rank as f64)
}

/// Union of inner keys, ascending
fn axis_keys<K: Ord + Clone>(by_item: &BTreeMap<String, BTreeMap<K, f64>>) -> Vec<K> {
    let keys: BTreeSet<K> = by_item.values().flat_map(|m| m.keys().cloned()).collect();
    keys.into_iter().collect()
}

/// One series per item, points indexed into `keys`
fn item_series<K: Ord>(
    items: &[&str],
    by_item: &BTreeMap<String, BTreeMap<K, f64>>,
    keys: &[K],
) -> Vec<Series> {
    items
        .iter()
        .map(|item| Series {
            label: item.to_string(),
            points: by_item
                .get(*item)
                .map(|m| {
                    m.iter()
                        .filter_map(|(k, &v)| Some((keys.binary_search(k).ok()?, v)))
                        .collect()
                })
                .unwrap_or_default(),
        })
        .collect()
}

/// Chart title for a whole set or one numbered group
fn group_title(subject: &str, group: Option<usize>) -> String {
    match group {
        Some(n) => format!("{} (Group {})", subject, n),
        None => format!("All {}", subject),
    }
}

fn chart_path(dir: &Path, prefix: &str, kind: &str, group: Option<usize>) -> PathBuf {
    match group {
        Some(n) => dir.join(format!("{}_{}_group{}.svg", prefix, kind, n)),
        None => dir.join(format!("{}_{}.svg", prefix, kind)),
    }
}

/// Bar chart of each item's mean weekly usage, most popular first
pub fn plot_overall_popularity(analysis: &EquipmentAnalysis, output_dir: &Path) -> Result<PathBuf> {
    let display = analysis.field.display_name();
    let bars: Vec<Bar> = analysis
        .overall_popularity()
        .into_iter()
        .map(|(item, avg)| Bar::new(item, avg))
        .collect();
    let path = chart_path(output_dir, analysis.field.file_suffix(), "overall_popularity", None);
    let text = ChartText::new(format!("Overall {} Popularity", display), display, "Average Usage");
    bar_chart(&path, &text, &bars, BarStyle::popularity())?;
    Ok(path)
}

/// Grouped bars of each item's share per semester
pub fn plot_semester_popularity(analysis: &EquipmentAnalysis, output_dir: &Path) -> Result<Vec<PathBuf>> {
    let display = analysis.field.display_name();
    let shares = semester_shares(&analysis.counts);
    let semesters = axis_keys(&shares);
    let labels: Vec<String> = semesters.iter().map(|k| k.name.clone()).collect();
    let items = analysis.items();

    let mut written = Vec::new();
    for (group, chunk) in chunk_groups(&items, SEMESTER_GROUP.0, SEMESTER_GROUP.1) {
        let path = chart_path(output_dir, analysis.field.file_suffix(), "semester_popularity", group);
        let text = ChartText::new(
            group_title(&format!("{} Popularity by Semester", display), group),
            "Semester",
            SHARE_DESC,
        );
        grouped_bar_chart(&path, &text, &labels, &item_series(chunk, &shares, &semesters))?;
        written.push(path);
    }
    Ok(written)
}

/// Lines of each item's mean share per week
pub fn plot_weekly_popularity(analysis: &EquipmentAnalysis, output_dir: &Path) -> Result<Vec<PathBuf>> {
    let display = analysis.field.display_name();
    let shares = weekly_shares(&analysis.counts);
    let weeks = axis_keys(&shares);
    let labels: Vec<String> = weeks.iter().map(u32::to_string).collect();
    let items = analysis.items();

    let mut written = Vec::new();
    for (group, chunk) in chunk_groups(&items, WEEKLY_GROUP.0, WEEKLY_GROUP.1) {
        let path = chart_path(output_dir, analysis.field.file_suffix(), "weekly_popularity", group);
        let subject = match group {
            Some(_) => format!("{} Popularity by Week", display),
            None => format!("{} Popularity by Week of Semester", display),
        };
        let text = ChartText::new(group_title(&subject, group), WEEK_DESC, SHARE_DESC);
        line_chart(&path, &text, &labels, &item_series(chunk, &shares, &weeks), false)?;
        written.push(path);
    }
    Ok(written)
}

/// Mean rank bars with std error bars and min/max whiskers, best first
pub fn plot_ranking_consistency(analysis: &EquipmentAnalysis, output_dir: &Path) -> Result<Vec<PathBuf>> {
    let display = analysis.field.display_name();
    let bars: Vec<Bar> = analysis
        .consistency
        .iter()
        .map(|c| Bar {
            label: c.item.clone(),
            value: c.mean,
            error: c.std,
            whisker: Some((c.min as f64, c.max as f64)),
        })
        .collect();

    let mut written = Vec::new();
    for (group, chunk) in chunk_groups(&bars, CONSISTENCY_GROUP.0, CONSISTENCY_GROUP.1) {
        let path = chart_path(output_dir, analysis.field.file_suffix(), "ranking_consistency", group);
        let text = ChartText::new(
            group_title(&format!("{} Ranking Consistency", display), group),
            display,
            AVG_RANK_DESC,
        );
        bar_chart(&path, &text, chunk, BarStyle::ranking())?;
        written.push(path);
    }
    Ok(written)
}

/// Item × week heatmap of mean rank, annotated
pub fn plot_rank_heatmap(analysis: &EquipmentAnalysis, output_dir: &Path) -> Result<Vec<PathBuf>> {
    let display = analysis.field.display_name();
    let ranks = weekly_mean_ranks(&analysis.counts);
    let weeks = axis_keys(&ranks);
    let items = analysis.items();
    let style = HeatmapStyle {
        colorbar_label: AVG_RANK_DESC.to_string(),
        annotate: Some(1),
        reversed: true,
    };

    let mut written = Vec::new();
    for (group, chunk) in chunk_groups(&items, RANK_GROUP.0, RANK_GROUP.1) {
        let mut grid = Grid::new(
            chunk.iter().map(|s| s.to_string()).collect(),
            weeks.iter().map(u32::to_string).collect(),
        );
        for (row, item) in chunk.iter().enumerate() {
            for (&week, &rank) in ranks.get(*item).into_iter().flatten() {
                if let Ok(col) = weeks.binary_search(&week) {
                    grid.set(row, col, rank);
                }
            }
        }
        let path = chart_path(output_dir, analysis.field.file_suffix(), "rank_heatmap", group);
        let text = ChartText::new(
            group_title(&format!("{} Ranking Changes by Week", display), group),
            WEEK_DESC,
            display,
        );
        heatmap(&path, &text, &grid, &style)?;
        written.push(path);
    }
    Ok(written)
}

/// Box plot of every weekly rank each item received
pub fn plot_rank_distribution(analysis: &EquipmentAnalysis, output_dir: &Path) -> Result<Vec<PathBuf>> {
    let display = analysis.field.display_name();
    let mut ranks: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for c in &analysis.counts {
        ranks.entry(c.item.as_str()).or_default().push(c.rank as f64);
    }
    let boxes: Vec<(String, Vec<f64>)> = ranks
        .into_iter()
        .map(|(item, values)| (item.to_string(), values))
        .collect();

    let mut written = Vec::new();
    for (group, chunk) in chunk_groups(&boxes, RANK_GROUP.0, RANK_GROUP.1) {
        let path = chart_path(output_dir, analysis.field.file_suffix(), "rank_distribution", group);
        let text = ChartText::new(
            group_title(&format!("{} Ranking Distribution", display), group),
            display,
            "Rank (1 = Most Popular)",
        );
        box_plot(&path, &text, chunk)?;
        written.push(path);
    }
    Ok(written)
}

/// Lines of each item's mean rank per semester, rank 1 at the top
pub fn plot_semester_trend(analysis: &EquipmentAnalysis, output_dir: &Path) -> Result<Vec<PathBuf>> {
    let display = analysis.field.display_name();
    let ranks = semester_mean_ranks(&analysis.counts);
    let semesters = axis_keys(&ranks);
    let labels: Vec<String> = semesters.iter().map(|k| k.name.clone()).collect();
    let items = analysis.items();

    let mut written = Vec::new();
    for (group, chunk) in chunk_groups(&items, TREND_GROUP.0, TREND_GROUP.1) {
        let path = chart_path(output_dir, analysis.field.file_suffix(), "semester_trend", group);
        let text = ChartText::new(
            group_title(&format!("{} Ranking Changes Over Semesters", display), group),
            "Semester",
            AVG_RANK_DESC,
        );
        line_chart(&path, &text, &labels, &item_series(chunk, &ranks, &semesters), true)?;
        written.push(path);
    }
    Ok(written)
}

/// Every equipment chart for one field
pub fn render_equipment_charts(analysis: &EquipmentAnalysis, output_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)?;
    let mut written = vec![plot_overall_popularity(analysis, output_dir)?];
    written.extend(plot_semester_popularity(analysis, output_dir)?);
    written.extend(plot_weekly_popularity(analysis, output_dir)?);
    info!("{} popularity charts saved to {}", analysis.field.display_name(), output_dir.display());

    written.extend(plot_ranking_consistency(analysis, output_dir)?);
    written.extend(plot_rank_heatmap(analysis, output_dir)?);
    written.extend(plot_rank_distribution(analysis, output_dir)?);
    written.extend(plot_semester_trend(analysis, output_dir)?);
    info!("{} ranking charts saved to {}", analysis.field.display_name(), output_dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iwc(item: &str, semester: &str, week: u32, count: u64, percentage: f64, rank: u32) -> ItemWeekCount {
        ItemWeekCount {
            item: item.to_string(),
            semester: semester.to_string(),
            week,
            count,
            total: 0,
            percentage,
            rank,
        }
    }

    #[test]
    fn test_semester_shares_are_chronological() {
        let counts = vec![
            iwc("Laser", "Fall 2023", 1, 2, 40.0, 1),
            iwc("Laser", "Spring 2023", 1, 1, 20.0, 2),
            iwc("Laser", "Spring 2023", 2, 3, 60.0, 1),
        ];
        let shares = semester_shares(&counts);
        let semesters: Vec<&str> = shares["Laser"].keys().map(|k| k.name.as_str()).collect();
        assert_eq!(semesters, vec!["Spring 2023", "Fall 2023"]);
        assert_eq!(shares["Laser"][&SemesterKey::new("Spring 2023")], 40.0);
    }

    #[test]
    fn test_item_series_indexes_axis() {
        let counts = vec![
            iwc("Laser", "Spring 2023", 1, 1, 10.0, 2),
            iwc("Laser", "Spring 2023", 3, 1, 10.0, 1),
            iwc("Wood", "Spring 2023", 2, 4, 90.0, 1),
        ];
        let ranks = weekly_mean_ranks(&counts);
        let weeks = axis_keys(&ranks);
        assert_eq!(weeks, vec![1, 2, 3]);
        let series = item_series(&["Laser", "Wood", "Absent"], &ranks, &weeks);
        assert_eq!(series[0].points, vec![(0, 2.0), (2, 1.0)]);
        assert_eq!(series[1].points, vec![(1, 1.0)]);
        assert!(series[2].points.is_empty());
    }

    #[test]
    fn test_chart_names() {
        let dir = Path::new("img");
        assert_eq!(
            chart_path(dir, "access_type", "rank_heatmap", Some(2)),
            dir.join("access_type_rank_heatmap_group2.svg")
        );
        assert_eq!(
            chart_path(dir, "equipment_category", "semester_trend", None),
            dir.join("equipment_category_semester_trend.svg")
        );
        assert_eq!(group_title("Equipment Type Ranking Consistency", Some(1)), "Equipment Type Ranking Consistency (Group 1)");
        assert_eq!(group_title("Equipment Type Ranking Consistency", None), "All Equipment Type Ranking Consistency");
    }
}
