//! Chart primitives on the plotters SVG backend
//!
//! Categorical axes (weeks, semesters, items) are plain `f64` ranges from
//! `-0.5` to `n - 0.5` with one label per integer, so bars, heatmap cells and
//! line markers share one coordinate scheme: category `i` is centred on `i`.
//!
//! Rank charts put rank 1 at the top. Plotters has no reversed axis, so
//! inverted charts plot `-value` and label ticks with the absolute value.

use std::ops::Range;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use tracing::info;

use mksa_common::stats::quartiles;

use crate::{Result, VizError};

const FONT: &str = "sans-serif";
const TITLE_SIZE: u32 = 24;
const LABEL_SIZE: u32 = 13;
const COLORBAR_WIDTH: u32 = 110;

/// Line and marker colour for the i-th series
fn series_color(i: usize) -> RGBAColor {
    Palette99::pick(i).to_rgba()
}

const STEEL_BLUE: RGBColor = RGBColor(70, 130, 180);
const TEAL: RGBColor = RGBColor(0, 128, 128);
const MISSING: RGBColor = RGBColor(235, 235, 235);

/// Title and axis descriptions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartText {
    pub title: String,
    pub x_desc: String,
    pub y_desc: String,
}

impl ChartText {
    pub fn new(
        title: impl Into<String>,
        x_desc: impl Into<String>,
        y_desc: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            x_desc: x_desc.into(),
            y_desc: y_desc.into(),
        }
    }
}

/// Named values indexed by category
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    /// (category index, value); categories without a value are left out
    pub points: Vec<(usize, f64)>,
}

/// One bar of a bar chart
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub label: String,
    pub value: f64,
    /// Symmetric error bar (standard deviation)
    pub error: Option<f64>,
    /// Whisker from low to high
    pub whisker: Option<(f64, f64)>,
}

impl Bar {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
            error: None,
            whisker: None,
        }
    }
}

/// Row × column matrix of optional values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    /// `values[row][column]`
    pub values: Vec<Vec<Option<f64>>>,
}

impl Grid {
    /// Grid with every cell empty
    pub fn new(rows: Vec<String>, columns: Vec<String>) -> Self {
        let values = vec![vec![None; columns.len()]; rows.len()];
        Self {
            rows,
            columns,
            values,
        }
    }

    pub fn set(&mut self, row: usize, column: usize, value: f64) {
        if let Some(cell) = self.values.get_mut(row).and_then(|r| r.get_mut(column)) {
            *cell = Some(value);
        }
    }

    pub fn get(&self, row: usize, column: usize) -> Option<f64> {
        self.values.get(row)?.get(column).copied().flatten()
    }

    /// Smallest and largest filled value
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .flatten()
            .flatten()
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Heatmap colouring and labelling
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapStyle {
    pub colorbar_label: String,
    /// Write each value into its cell with this many decimals
    pub annotate: Option<usize>,
    /// Dark colours for small values (ranks)
    pub reversed: bool,
}

/// Yellow-green-blue sequential colour map, `t` in `[0, 1]`
pub fn ylgnbu(t: f64) -> RGBColor {
    const STOPS: [(u8, u8, u8); 9] = [
        (255, 255, 217),
        (237, 248, 177),
        (199, 233, 180),
        (127, 205, 187),
        (65, 182, 196),
        (29, 145, 192),
        (34, 94, 168),
        (37, 52, 148),
        (8, 29, 88),
    ];
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let pos = t * (STOPS.len() - 1) as f64;
    let i = (pos.floor() as usize).min(STOPS.len() - 2);
    let frac = pos - i as f64;
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * frac).round() as u8;
    let (a, b) = (STOPS[i], STOPS[i + 1]);
    RGBColor(lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
}

/// Split `items` into chunks of `size` once there are more than `threshold`
///
/// Chunks carry their 1-based group number; a single unsplit chunk has none.
pub fn chunk_groups<T>(items: &[T], threshold: usize, size: usize) -> Vec<(Option<usize>, &[T])> {
    if items.len() <= threshold || size == 0 {
        return vec![(None, items)];
    }
    items
        .chunks(size)
        .enumerate()
        .map(|(i, chunk)| (Some(i + 1), chunk))
        .collect()
}

/// Axis range holding `n` categories centred on `0..n`
fn category_range(n: usize) -> Range<f64> {
    -0.5..n.max(1) as f64 - 0.5
}

/// Label for a tick; ticks between categories stay blank
fn category_label(labels: &[String], v: f64) -> String {
    let idx = v.round();
    if idx < 0.0 || (v - idx).abs() > 1e-6 {
        return String::new();
    }
    labels.get(idx as usize).cloned().unwrap_or_default()
}

fn rank_label(v: &f64) -> String {
    format!("{:.1}", v.abs())
}

fn signed(value: f64, invert: bool) -> f64 {
    if invert {
        -value
    } else {
        value
    }
}

/// Value axis covering `values`, with headroom for labels
fn value_range(values: impl IntoIterator<Item = f64>, invert: bool) -> Range<f64> {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !hi.is_finite() {
        return if invert { -1.0..0.0 } else { 0.0..1.0 };
    }
    if invert {
        return -(hi + 0.5)..0.0;
    }
    let lo = lo.min(0.0);
    let hi = if hi > lo { hi * 1.1 } else { lo + 1.0 };
    lo..hi
}

fn svg_root(path: &Path, size: (u32, u32)) -> Result<DrawingArea<SVGBackend<'_>, Shift>> {
    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    Ok(root)
}

/// Space for the longest category label, rotated or not
fn label_area(labels: &[String]) -> u32 {
    let longest = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0) as u32;
    (longest * 7 + 20).clamp(40, 260)
}

/// One line with markers per series over categorical x
pub fn line_chart(
    path: &Path,
    text: &ChartText,
    categories: &[String],
    series: &[Series],
    invert_y: bool,
) -> Result<()> {
    if series.iter().all(|s| s.points.is_empty()) {
        return Err(VizError::NoData(text.title.clone()));
    }
    let values = series.iter().flat_map(|s| s.points.iter().map(|&(_, v)| v));
    let y_range = value_range(values, invert_y);

    let root = svg_root(path, (1200, 650))?;
    let mut chart = ChartBuilder::on(&root)
        .caption(&text.title, (FONT, TITLE_SIZE))
        .margin(15)
        .x_label_area_size(label_area(categories).min(120))
        .y_label_area_size(60)
        .build_cartesian_2d(category_range(categories.len()), y_range)?;

    let x_fmt = |v: &f64| category_label(categories, *v);
    let rotate = categories.iter().any(|c| c.chars().count() > 4);
    let mut mesh = chart.configure_mesh();
    mesh.x_labels(categories.len())
        .x_desc(text.x_desc.as_str())
        .y_desc(text.y_desc.as_str())
        .x_label_formatter(&x_fmt);
    if rotate {
        mesh.x_label_style((FONT, LABEL_SIZE).into_font().transform(FontTransform::Rotate90));
    }
    if invert_y {
        mesh.y_label_formatter(&rank_label);
    }
    mesh.draw()?;

    for (i, s) in series.iter().enumerate() {
        let color = series_color(i);
        let points: Vec<(f64, f64)> = s
            .points
            .iter()
            .map(|&(c, v)| (c as f64, signed(v, invert_y)))
            .collect();
        chart
            .draw_series(LineSeries::new(
                points.clone(),
                ShapeStyle::from(&color).stroke_width(2),
            ))?
            .label(s.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
        chart.draw_series(PointSeries::of_element(
            points,
            4,
            ShapeStyle::from(&color).filled(),
            &|coord, size, style| EmptyElement::at(coord) + Circle::new((0, 0), size, style),
        ))?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.85))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    info!("Saved {}", path.display());
    Ok(())
}

/// Coloured cells with a colour bar on the right
pub fn heatmap(path: &Path, text: &ChartText, grid: &Grid, style: &HeatmapStyle) -> Result<()> {
    let (lo, hi) = grid
        .value_range()
        .ok_or_else(|| VizError::NoData(text.title.clone()))?;
    let span = if hi > lo { hi - lo } else { 1.0 };
    let level = |v: f64| {
        let t = (v - lo) / span;
        if style.reversed {
            1.0 - t
        } else {
            t
        }
    };

    let rows = grid.rows.len();
    let cols = grid.columns.len();
    let height = (rows as u32 * 40 + 200).clamp(350, 1400);
    let width = 1400;

    let root = svg_root(path, (width, height))?;
    let (main, scale_area) = root.split_horizontally(width - COLORBAR_WIDTH);

    let mut chart = ChartBuilder::on(&main)
        .caption(&text.title, (FONT, TITLE_SIZE))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(label_area(&grid.rows))
        .build_cartesian_2d(category_range(cols), category_range(rows))?;

    // Row 0 is drawn at the top
    let row_y = |r: usize| (rows - 1 - r) as f64;
    let x_fmt = |v: &f64| category_label(&grid.columns, *v);
    let y_fmt = |v: &f64| {
        let idx = v.round();
        if idx < 0.0 || (v - idx).abs() > 1e-6 {
            return String::new();
        }
        rows.checked_sub(1 + idx as usize)
            .and_then(|r| grid.rows.get(r))
            .cloned()
            .unwrap_or_default()
    };
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(cols)
        .y_labels(rows)
        .x_desc(text.x_desc.as_str())
        .y_desc(text.y_desc.as_str())
        .x_label_formatter(&x_fmt)
        .y_label_formatter(&y_fmt)
        .draw()?;

    let mut cells = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            cells.push((c as f64, row_y(r), grid.get(r, c)));
        }
    }

    chart.draw_series(cells.iter().map(|&(x, y, v)| {
        let fill = match v {
            Some(v) => ylgnbu(level(v)),
            None => MISSING,
        };
        Rectangle::new([(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)], fill.filled())
    }))?;

    if let Some(decimals) = style.annotate {
        let centered = Pos::new(HPos::Center, VPos::Center);
        chart.draw_series(cells.iter().filter_map(|&(x, y, v)| {
            let v = v?;
            let ink = if level(v) > 0.6 { WHITE } else { BLACK };
            Some(Text::new(
                format!("{:.*}", decimals, v),
                (x, y),
                (FONT, LABEL_SIZE).into_font().color(&ink).pos(centered),
            ))
        }))?;
    }

    let mut scale = ChartBuilder::on(&scale_area)
        .margin_top(60)
        .margin_bottom(55)
        .margin_right(10)
        .y_label_area_size(70)
        .build_cartesian_2d(0f64..1f64, lo..lo + span)?;
    scale
        .configure_mesh()
        .disable_mesh()
        .x_labels(0)
        .y_desc(style.colorbar_label.as_str())
        .draw()?;
    const STEPS: usize = 64;
    scale.draw_series((0..STEPS).map(|i| {
        let a = lo + span * i as f64 / STEPS as f64;
        let b = lo + span * (i + 1) as f64 / STEPS as f64;
        Rectangle::new([(0.0, a), (1.0, b)], ylgnbu(level((a + b) / 2.0)).filled())
    }))?;

    root.present()?;
    info!("Saved {}", path.display());
    Ok(())
}

/// Bar appearance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarStyle {
    pub color: RGBColor,
    /// Print each value above its bar
    pub value_labels: bool,
    /// Rank axis: 1 at the top, bars hang down
    pub invert_y: bool,
}

impl BarStyle {
    pub fn popularity() -> Self {
        Self {
            color: STEEL_BLUE,
            value_labels: true,
            invert_y: false,
        }
    }

    pub fn ranking() -> Self {
        Self {
            color: TEAL,
            value_labels: false,
            invert_y: true,
        }
    }
}

/// Vertical bars with optional error bars and min/max whiskers
pub fn bar_chart(path: &Path, text: &ChartText, bars: &[Bar], style: BarStyle) -> Result<()> {
    if bars.is_empty() {
        return Err(VizError::NoData(text.title.clone()));
    }
    let labels: Vec<String> = bars.iter().map(|b| b.label.clone()).collect();
    let extents = bars.iter().flat_map(|b| {
        let err = b.error.unwrap_or(0.0);
        let (wlo, whi) = b.whisker.unwrap_or((b.value, b.value));
        [b.value + err, wlo, whi]
    });
    let y_range = value_range(extents, style.invert_y);

    let root = svg_root(path, (1400, 900))?;
    let mut chart = ChartBuilder::on(&root)
        .caption(&text.title, (FONT, TITLE_SIZE))
        .margin(15)
        .x_label_area_size(label_area(&labels))
        .y_label_area_size(60)
        .build_cartesian_2d(category_range(bars.len()), y_range)?;

    let x_fmt = |v: &f64| category_label(&labels, *v);
    let mut mesh = chart.configure_mesh();
    mesh.disable_x_mesh()
        .x_labels(bars.len())
        .x_desc(text.x_desc.as_str())
        .y_desc(text.y_desc.as_str())
        .x_label_formatter(&x_fmt)
        .x_label_style((FONT, LABEL_SIZE).into_font().transform(FontTransform::Rotate90));
    if style.invert_y {
        mesh.y_label_formatter(&rank_label);
    }
    mesh.draw()?;

    let fill = style.color.mix(if style.invert_y { 0.7 } else { 1.0 });
    chart.draw_series(bars.iter().enumerate().map(|(i, b)| {
        let x = i as f64;
        Rectangle::new(
            [(x - 0.4, 0.0), (x + 0.4, signed(b.value, style.invert_y))],
            fill.filled(),
        )
    }))?;

    let y = |v: f64| signed(v, style.invert_y);
    for (i, b) in bars.iter().enumerate() {
        let mid = i as f64;
        if let Some(err) = b.error {
            let (lo, hi) = (y(b.value - err), y(b.value + err));
            chart.draw_series([
                PathElement::new(vec![(mid, lo), (mid, hi)], &BLACK),
                PathElement::new(vec![(mid - 0.15, lo), (mid + 0.15, lo)], &BLACK),
                PathElement::new(vec![(mid - 0.15, hi), (mid + 0.15, hi)], &BLACK),
            ])?;
        }
        if let Some((wlo, whi)) = b.whisker {
            let ink = BLACK.mix(0.5);
            let (lo, hi) = (y(wlo), y(whi));
            chart.draw_series([
                PathElement::new(vec![(mid + 0.05, lo), (mid + 0.05, hi)], &ink),
                PathElement::new(vec![(mid - 0.05, lo), (mid + 0.15, lo)], &ink),
                PathElement::new(vec![(mid - 0.05, hi), (mid + 0.15, hi)], &ink),
            ])?;
        }
    }

    if style.value_labels {
        let above = Pos::new(HPos::Center, VPos::Bottom);
        chart.draw_series(bars.iter().enumerate().map(|(i, b)| {
            Text::new(
                format!("{:.1}", b.value),
                (i as f64, y(b.value)),
                TextStyle::from((FONT, 11).into_font()).pos(above),
            )
        }))?;
    }

    root.present()?;
    info!("Saved {}", path.display());
    Ok(())
}

/// Side-by-side bars, one colour per series, one cluster per category
pub fn grouped_bar_chart(
    path: &Path,
    text: &ChartText,
    categories: &[String],
    series: &[Series],
) -> Result<()> {
    if series.iter().all(|s| s.points.is_empty()) {
        return Err(VizError::NoData(text.title.clone()));
    }
    let values = series.iter().flat_map(|s| s.points.iter().map(|&(_, v)| v));
    let y_range = value_range(values, false);

    let root = svg_root(path, (1600, 1000))?;
    let mut chart = ChartBuilder::on(&root)
        .caption(&text.title, (FONT, TITLE_SIZE))
        .margin(15)
        .x_label_area_size(label_area(categories).min(140))
        .y_label_area_size(60)
        .build_cartesian_2d(category_range(categories.len()), y_range)?;

    let x_fmt = |v: &f64| category_label(categories, *v);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(categories.len())
        .x_desc(text.x_desc.as_str())
        .y_desc(text.y_desc.as_str())
        .x_label_formatter(&x_fmt)
        .x_label_style((FONT, LABEL_SIZE).into_font().transform(FontTransform::Rotate90))
        .draw()?;

    let width = 0.8 / series.len() as f64;
    for (j, s) in series.iter().enumerate() {
        let color = series_color(j);
        let offset = -0.4 + j as f64 * width;
        chart
            .draw_series(s.points.iter().map(|&(c, v)| {
                let x = c as f64 + offset;
                Rectangle::new([(x, 0.0), (x + width, v)], color.filled())
            }))?
            .label(s.label.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.85))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    info!("Saved {}", path.display());
    Ok(())
}

/// Box per category: interquartile box, median line, min/max whiskers
pub fn box_plot(path: &Path, text: &ChartText, boxes: &[(String, Vec<f64>)]) -> Result<()> {
    let summaries: Vec<(&str, [f64; 5])> = boxes
        .iter()
        .filter_map(|(label, values)| Some((label.as_str(), quartiles(values)?)))
        .collect();
    if summaries.is_empty() {
        return Err(VizError::NoData(text.title.clone()));
    }
    let labels: Vec<String> = summaries.iter().map(|(l, _)| l.to_string()).collect();
    let y_range = value_range(summaries.iter().flat_map(|(_, q)| *q), false);

    let root = svg_root(path, (1400, 900))?;
    let mut chart = ChartBuilder::on(&root)
        .caption(&text.title, (FONT, TITLE_SIZE))
        .margin(15)
        .x_label_area_size(label_area(&labels))
        .y_label_area_size(60)
        .build_cartesian_2d(category_range(labels.len()), y_range)?;

    let x_fmt = |v: &f64| category_label(&labels, *v);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(labels.len())
        .x_desc(text.x_desc.as_str())
        .y_desc(text.y_desc.as_str())
        .x_label_formatter(&x_fmt)
        .x_label_style((FONT, LABEL_SIZE).into_font().transform(FontTransform::Rotate90))
        .draw()?;

    for (i, (_, [min, q1, median, q3, max])) in summaries.iter().enumerate() {
        let mid = i as f64;
        let x = mid - 0.5;
        let color = series_color(i);
        chart.draw_series([
            Rectangle::new([(x + 0.2, *q1), (x + 0.8, *q3)], color.mix(0.6).filled()),
            Rectangle::new([(x + 0.2, *q1), (x + 0.8, *q3)], BLACK.stroke_width(1)),
        ])?;
        chart.draw_series([
            PathElement::new(vec![(x + 0.2, *median), (x + 0.8, *median)], BLACK.stroke_width(2)),
            PathElement::new(vec![(mid, *q3), (mid, *max)], &BLACK),
            PathElement::new(vec![(mid, *q1), (mid, *min)], &BLACK),
            PathElement::new(vec![(x + 0.35, *max), (x + 0.65, *max)], &BLACK),
            PathElement::new(vec![(x + 0.35, *min), (x + 0.65, *min)], &BLACK),
        ])?;
    }

    root.present()?;
    info!("Saved {}", path.display());
    Ok(())
}
