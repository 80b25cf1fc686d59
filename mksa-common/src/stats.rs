//! Summary statistics used by the usage and equipment analyses
//!
//! Conventions:
//! - Standard deviation is the sample deviation (n − 1 denominator) and is
//!   undefined (`None`) for fewer than two values
//! - Percent changes are rounded to two decimals and undefined for the first
//!   element or when the previous value is zero
//! - Ranks are descending (largest value = rank 1); ties share the lowest rank

/// Aggregate of a group of values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub mean: f64,
    /// Sample standard deviation, `None` for a single value
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// Summarize a group; `None` for an empty slice
pub fn summarize(values: &[f64]) -> Option<Summary> {
    let mean = mean(values)?;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(Summary {
        mean,
        std: sample_std(values),
        min,
        max,
        count: values.len(),
    })
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation (n − 1)
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Round half to even to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Percent change between a value and its predecessor
pub fn percent_change_between(previous: f64, current: f64) -> Option<f64> {
    if previous == 0.0 {
        None
    } else {
        Some((current - previous) / previous * 100.0)
    }
}

/// Percent change of each element from the previous one, rounded to two decimals
///
/// # Examples
///
/// ```
/// use mksa_common::stats::percent_change;
///
/// assert_eq!(percent_change(&[10.0, 15.0, 12.0]), vec![None, Some(50.0), Some(-20.0)]);
/// ```
pub fn percent_change(series: &[f64]) -> Vec<Option<f64>> {
    let mut changes = Vec::with_capacity(series.len());
    if series.is_empty() {
        return changes;
    }
    changes.push(None);
    for pair in series.windows(2) {
        changes.push(percent_change_between(pair[0], pair[1]).map(round2));
    }
    changes
}

/// Descending ranks with ties sharing the minimum rank (1, 2, 2, 4, ...)
pub fn rank_min_desc(values: &[f64]) -> Vec<u32> {
    values
        .iter()
        .map(|v| 1 + values.iter().filter(|other| *other > v).count() as u32)
        .collect()
}

/// Five-number summary `[min, q1, median, q3, max]` with linear interpolation
/// between closest ranks
pub fn quartiles(values: &[f64]) -> Option<[f64; 5]> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let at = |q: f64| {
        let pos = q * (sorted.len() - 1) as f64;
        let lower = pos.floor() as usize;
        let upper = pos.ceil() as usize;
        sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64)
    };
    Some([sorted[0], at(0.25), at(0.5), at(0.75), sorted[sorted.len() - 1]])
}

/// Index of the largest value; the first one on ties
pub fn argmax_first<I: IntoIterator<Item = f64>>(values: I) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.into_iter().enumerate() {
        if best.map_or(true, |(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}

/// Index of the smallest value; the first one on ties
pub fn argmin_first<I: IntoIterator<Item = f64>>(values: I) -> Option<usize> {
    argmax_first(values.into_iter().map(|v| -v))
}
