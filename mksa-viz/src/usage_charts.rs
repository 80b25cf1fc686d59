//! Weekly usage charts
//!
//! Line charts and heatmaps of visits per semester week. Semesters are split
//! into Fall and everything else (Spring), matching how the academic year is
//! reported.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use mksa_an::usage::WeeklyCount;
use mksa_an::UsageAnalysis;
use mksa_common::semester::semester_year;
use mksa_common::stats::mean;
use mksa_common::Season;

use crate::charts::{heatmap, line_chart, ChartText, Grid, HeatmapStyle, Series};
use crate::{Result, VizError};

const WEEK_DESC: &str = "Week of Semester";
const SEASONS: [Season; 2] = [Season::Spring, Season::Fall];

/// Counts of semesters in one season, in their original order
pub fn season_counts(counts: &[WeeklyCount], season: Season) -> Vec<&WeeklyCount> {
    counts
        .iter()
        .filter(|c| Season::fall_or_spring(&c.semester) == season)
        .collect()
}

/// Weeks present, ascending, as axis labels and an index lookup
fn week_axis<'a>(counts: impl IntoIterator<Item = &'a WeeklyCount>) -> (Vec<u32>, Vec<String>) {
    let weeks: BTreeSet<u32> = counts.into_iter().map(|c| c.week).collect();
    let labels = weeks.iter().map(u32::to_string).collect();
    (weeks.into_iter().collect(), labels)
}

fn week_index(weeks: &[u32], week: u32) -> Option<usize> {
    weeks.binary_search(&week).ok()
}

/// Semester order of first appearance (counts are chronological)
fn semesters_in_order<'a>(counts: &[&'a WeeklyCount]) -> Vec<&'a str> {
    let mut seen = BTreeSet::new();
    counts
        .iter()
        .map(|c| c.semester.as_str())
        .filter(|s| seen.insert(*s))
        .collect()
}

/// Mean count per week for each season
pub fn season_averages(counts: &[WeeklyCount]) -> BTreeMap<Season, BTreeMap<u32, f64>> {
    let mut grouped: BTreeMap<Season, BTreeMap<u32, Vec<f64>>> = BTreeMap::new();
    for c in counts {
        grouped
            .entry(Season::fall_or_spring(&c.semester))
            .or_default()
            .entry(c.week)
            .or_default()
            .push(c.count as f64);
    }
    average_nested(grouped)
}

/// Mean count per week for each calendar year, pooling that year's semesters
pub fn year_averages(counts: &[WeeklyCount]) -> BTreeMap<i32, BTreeMap<u32, f64>> {
    let mut grouped: BTreeMap<i32, BTreeMap<u32, Vec<f64>>> = BTreeMap::new();
    for c in counts {
        let Some(year) = semester_year(&c.semester) else {
            debug!("No year in semester name '{}'", c.semester);
            continue;
        };
        grouped
            .entry(year)
            .or_default()
            .entry(c.week)
            .or_default()
            .push(c.count as f64);
    }
    average_nested(grouped)
}

fn average_nested<K: Ord>(grouped: BTreeMap<K, BTreeMap<u32, Vec<f64>>>) -> BTreeMap<K, BTreeMap<u32, f64>> {
    grouped
        .into_iter()
        .map(|(key, weeks)| {
            let avgs = weeks
                .into_iter()
                .filter_map(|(week, values)| Some((week, mean(&values)?)))
                .collect();
            (key, avgs)
        })
        .collect()
}

/// Semester × week grid of counts
pub fn semester_week_grid(counts: &[&WeeklyCount]) -> Grid {
    let semesters = semesters_in_order(counts);
    let (weeks, week_labels) = week_axis(counts.iter().copied());
    let mut grid = Grid::new(semesters.iter().map(|s| s.to_string()).collect(), week_labels);
    for c in counts {
        if let (Some(row), Some(col)) = (
            semesters.iter().position(|s| *s == c.semester),
            week_index(&weeks, c.week),
        ) {
            grid.set(row, col, c.count as f64);
        }
    }
    grid
}

/// Key × week grid of averages
fn average_grid<K: ToString>(averages: &BTreeMap<K, BTreeMap<u32, f64>>) -> Grid {
    let weeks: BTreeSet<u32> = averages.values().flat_map(|w| w.keys().copied()).collect();
    let weeks: Vec<u32> = weeks.into_iter().collect();
    let mut grid = Grid::new(
        averages.keys().map(ToString::to_string).collect(),
        weeks.iter().map(u32::to_string).collect(),
    );
    for (row, by_week) in averages.values().enumerate() {
        for (&week, &avg) in by_week {
            if let Some(col) = week_index(&weeks, week) {
                grid.set(row, col, avg);
            }
        }
    }
    grid
}

/// Per-semester lines for each season, then season averages
pub fn plot_weekly_averages(counts: &[WeeklyCount], output_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)?;
    let mut written = Vec::new();

    for season in SEASONS {
        let rows = season_counts(counts, season);
        if rows.is_empty() {
            warn!("No {} semesters to plot", season.as_str());
            continue;
        }
        let (weeks, labels) = week_axis(rows.iter().copied());
        let series: Vec<Series> = semesters_in_order(&rows)
            .into_iter()
            .map(|semester| Series {
                label: semester.to_string(),
                points: rows
                    .iter()
                    .filter(|c| c.semester == semester)
                    .filter_map(|c| Some((week_index(&weeks, c.week)?, c.count as f64)))
                    .collect(),
            })
            .collect();
        let path = output_dir.join(format!(
            "{}_weekly_usage.svg",
            season.as_str().to_lowercase()
        ));
        let text = ChartText::new(
            format!("Average Weekly Usage - {} Semesters", season.as_str()),
            WEEK_DESC,
            "Number of Makerspace Visits",
        );
        line_chart(&path, &text, &labels, &series, false)?;
        written.push(path);
    }

    let averages = season_averages(counts);
    if averages.is_empty() {
        return Err(VizError::NoData("weekly counts".to_string()));
    }
    let weeks: Vec<u32> = averages
        .values()
        .flat_map(|w| w.keys().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let labels: Vec<String> = weeks.iter().map(u32::to_string).collect();
    let series: Vec<Series> = averages
        .iter()
        .map(|(season, by_week)| Series {
            label: season.as_str().to_string(),
            points: by_week
                .iter()
                .filter_map(|(&week, &avg)| Some((week_index(&weeks, week)?, avg)))
                .collect(),
        })
        .collect();
    let path = output_dir.join("combined_weekly_usage.svg");
    let text = ChartText::new(
        "Average Weekly Usage - Fall vs Spring Semesters",
        WEEK_DESC,
        "Average Number of Makerspace Visits",
    );
    line_chart(&path, &text, &labels, &series, false)?;
    written.push(path);

    info!("Line charts saved to {}", output_dir.display());
    Ok(written)
}

/// Semester heatmaps per season, the annotated season average and year over year
pub fn create_usage_heatmaps(counts: &[WeeklyCount], output_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)?;
    let mut written = Vec::new();

    for season in SEASONS {
        let rows = season_counts(counts, season);
        if rows.is_empty() {
            warn!("No {} semesters for heatmap", season.as_str());
            continue;
        }
        let path = output_dir.join(format!("{}_heatmap.svg", season.as_str().to_lowercase()));
        let text = ChartText::new(
            format!("Usage Intensity by Week - {} Semesters", season.as_str()),
            WEEK_DESC,
            "Semester",
        );
        let style = HeatmapStyle {
            colorbar_label: "Number of Visits".to_string(),
            annotate: None,
            reversed: false,
        };
        heatmap(&path, &text, &semester_week_grid(&rows), &style)?;
        written.push(path);
    }

    let seasons: BTreeMap<&str, BTreeMap<u32, f64>> = season_averages(counts)
        .into_iter()
        .map(|(season, weeks)| (season.as_str(), weeks))
        .collect();
    let path = output_dir.join("season_heatmap.svg");
    let text = ChartText::new(
        "Average Usage Intensity by Week - Fall vs Spring",
        WEEK_DESC,
        "Season",
    );
    let style = HeatmapStyle {
        colorbar_label: "Average Number of Visits".to_string(),
        annotate: Some(1),
        reversed: false,
    };
    heatmap(&path, &text, &average_grid(&seasons), &style)?;
    written.push(path);

    let years = year_averages(counts);
    if years.is_empty() {
        warn!("No semester names carry a year; skipping yearly heatmap");
    } else {
        let path = output_dir.join("yearly_heatmap.svg");
        let text = ChartText::new("Usage Intensity by Week - Year over Year", WEEK_DESC, "Year");
        let style = HeatmapStyle {
            colorbar_label: "Average Number of Visits".to_string(),
            annotate: None,
            reversed: false,
        };
        heatmap(&path, &text, &average_grid(&years), &style)?;
        written.push(path);
    }

    info!("Heatmaps saved to {}", output_dir.display());
    Ok(written)
}

/// All usage charts for one analysis
pub fn render_usage_charts(analysis: &UsageAnalysis, output_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = plot_weekly_averages(&analysis.counts, output_dir)?;
    written.extend(create_usage_heatmaps(&analysis.counts, output_dir)?);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wc(semester: &str, week: u32, count: u64) -> WeeklyCount {
        WeeklyCount {
            semester: semester.to_string(),
            week,
            count,
        }
    }

    fn sample() -> Vec<WeeklyCount> {
        vec![
            wc("Spring 2023", 1, 10),
            wc("Spring 2023", 2, 20),
            wc("Fall 2023", 1, 30),
            wc("Fall 2023", 3, 50),
            wc("Spring 2024", 1, 14),
        ]
    }

    #[test]
    fn test_season_averages() {
        let averages = season_averages(&sample());
        assert_eq!(averages[&Season::Spring][&1], 12.0);
        assert_eq!(averages[&Season::Spring][&2], 20.0);
        assert_eq!(averages[&Season::Fall][&3], 50.0);
        assert!(!averages.contains_key(&Season::Summer));
    }

    #[test]
    fn test_summer_counts_as_spring() {
        let counts = vec![wc("Summer 2023", 1, 4)];
        assert_eq!(season_counts(&counts, Season::Spring).len(), 1);
        assert!(season_counts(&counts, Season::Fall).is_empty());
    }

    #[test]
    fn test_year_averages_pool_semesters() {
        let years = year_averages(&sample());
        // Spring 2023 week 1 (10) and Fall 2023 week 1 (30)
        assert_eq!(years[&2023][&1], 20.0);
        assert_eq!(years[&2024][&1], 14.0);

        let unnamed = year_averages(&[wc("Intersession", 1, 3)]);
        assert!(unnamed.is_empty());
    }

    #[test]
    fn test_semester_week_grid() {
        let counts = sample();
        let spring = season_counts(&counts, Season::Spring);
        let grid = semester_week_grid(&spring);
        assert_eq!(grid.rows, vec!["Spring 2023", "Spring 2024"]);
        assert_eq!(grid.columns, vec!["1", "2"]);
        assert_eq!(grid.get(0, 1), Some(20.0));
        assert_eq!(grid.get(1, 1), None);
    }

    #[test]
    fn test_render_usage_charts() {
        let dir = tempfile::TempDir::new().unwrap();
        let written = create_usage_heatmaps(&sample(), dir.path()).unwrap();
        let names: Vec<String> = written
            .iter()
            .filter_map(|p| p.file_name()?.to_str().map(String::from))
            .collect();
        assert_eq!(
            names,
            vec![
                "spring_heatmap.svg",
                "fall_heatmap.svg",
                "season_heatmap.svg",
                "yearly_heatmap.svg"
            ]
        );
        let season = fs::read_to_string(dir.path().join("season_heatmap.svg")).unwrap();
        // Annotated cells
        assert!(season.contains("12.0"));
    }

    #[test]
    fn test_missing_season_is_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        let counts = vec![wc("Fall 2022", 1, 5), wc("Fall 2022", 2, 7)];
        let written = plot_weekly_averages(&counts, dir.path()).unwrap();
        assert_eq!(written.len(), 2);
        assert!(!dir.path().join("spring_weekly_usage.svg").exists());
        assert!(dir.path().join("fall_weekly_usage.svg").exists());
        assert!(dir.path().join("combined_weekly_usage.svg").exists());
    }
}
