//! Term calendars and week-of-term assignment
//!
//! A timestamp belongs to the term whose range contains it, where the range
//! runs from midnight on the start date to midnight on the end date (both
//! included, so only 00:00 of the end date still counts). Weeks run Monday to Sunday: week 1 starts on the Monday on
//! or before the first day of the term, so week numbers line up across terms
//! whatever weekday a term starts on.
//!
//! Terms are kept in chronological order of their start date. Ranges are
//! expected not to overlap; when they do, the earliest-starting term that
//! contains the date wins and the overlap is reported at construction.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Term calendar validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TermError {
    /// End date precedes start date
    #[error("term '{name}' ends ({end}) before it starts ({start})")]
    InvertedRange {
        name: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    /// Term without a name (cannot be used as a grouping key)
    #[error("term starting {0} has an empty name")]
    EmptyName(NaiveDate),
}

/// One academic term, from 00:00 on `start` to 00:00 on `end`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    /// Semester name, e.g. "Fall 2023"
    #[serde(rename = "Semester")]
    pub name: String,
    /// First day of instruction
    #[serde(rename = "Start")]
    pub start: NaiveDate,
    /// Closing date; only its midnight is inside the term
    #[serde(rename = "End")]
    pub end: NaiveDate,
}

impl Term {
    pub fn new(name: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            name: name.into(),
            start,
            end,
        }
    }

    /// True when `timestamp` lies within `start 00:00..=end 00:00`
    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        start_of_day(self.start) <= timestamp && timestamp <= start_of_day(self.end)
    }

    /// Monday that opens week 1 (may precede the first day of the term)
    pub fn first_monday(&self) -> NaiveDate {
        monday_on_or_before(self.start)
    }

    /// Week-of-term index for a timestamp inside this term
    pub fn week_of(&self, timestamp: NaiveDateTime) -> u32 {
        semester_week(self.start, timestamp)
    }

    fn validate(&self) -> Result<(), TermError> {
        if self.name.trim().is_empty() {
            return Err(TermError::EmptyName(self.start));
        }
        if self.start > self.end {
            return Err(TermError::InvertedRange {
                name: self.name.clone(),
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }
}

/// Monday of the week containing `date` (the date itself when it is a Monday)
pub fn monday_on_or_before(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Midnight opening `date`
pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::default())
}

/// 1-based Monday-to-Sunday week index of `timestamp` relative to a term that
/// starts on `term_start`.
///
/// Only the calendar date of the timestamp matters. Dates before the first
/// Monday of the term yield 0.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use mksa_common::terms::semester_week;
///
/// // Term starts Wednesday 2023-08-16; week 1 opened Monday 2023-08-14
/// let start = NaiveDate::from_ymd_opt(2023, 8, 16).unwrap();
/// let sunday = NaiveDate::from_ymd_opt(2023, 8, 20).unwrap().and_hms_opt(23, 59, 0).unwrap();
/// let monday = NaiveDate::from_ymd_opt(2023, 8, 21).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// assert_eq!(semester_week(start, sunday), 1);
/// assert_eq!(semester_week(start, monday), 2);
/// ```
pub fn semester_week(term_start: NaiveDate, timestamp: NaiveDateTime) -> u32 {
    let days = (timestamp.date() - monday_on_or_before(term_start)).num_days();
    if days < 0 {
        return 0;
    }
    u32::try_from(days / 7 + 1).unwrap_or(u32::MAX)
}

/// Result of assigning a timestamp to the calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermAssignment<'a> {
    /// Name of the containing term
    pub term: &'a str,
    /// 1-based week of term
    pub week: u32,
}

/// Chronologically ordered list of terms
#[derive(Debug, Clone, Default)]
pub struct TermCalendar {
    terms: Vec<Term>,
}

impl TermCalendar {
    /// Build a calendar, sorting terms by start date (stable for equal starts)
    ///
    /// Every term must have a name and `start <= end`. Overlapping ranges are
    /// accepted but logged, since the earlier-starting term will shadow the
    /// later one for the shared dates.
    pub fn new(mut terms: Vec<Term>) -> Result<Self, TermError> {
        for term in &terms {
            term.validate()?;
        }
        terms.sort_by_key(|t| t.start);

        // Track the earlier term reaching furthest so non-adjacent overlaps are caught too
        let mut furthest: Option<&Term> = None;
        for term in &terms {
            if let Some(prev) = furthest {
                if term.start <= prev.end {
                    warn!(
                        earlier = %prev.name,
                        later = %term.name,
                        "Term ranges overlap ({} to {}); dates in the overlap go to '{}'",
                        term.start,
                        prev.end.min(term.end),
                        prev.name
                    );
                }
            }
            if furthest.map_or(true, |prev| term.end > prev.end) {
                furthest = Some(term);
            }
        }

        debug!("Term calendar built with {} terms", terms.len());
        Ok(Self { terms })
    }

    /// Terms in chronological order
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Look up a term by name
    pub fn find(&self, name: &str) -> Option<&Term> {
        self.terms.iter().find(|t| t.name == name)
    }

    /// Assign a timestamp to its term and week
    ///
    /// Returns `None` for timestamps outside every term (summer sessions,
    /// terms left out of the calendar).
    pub fn assign(&self, timestamp: NaiveDateTime) -> Option<TermAssignment<'_>> {
        let date = timestamp.date();
        self.terms
            .iter()
            .take_while(|t| t.start <= date)
            .find(|t| t.contains(timestamp))
            .map(|t| TermAssignment {
                term: &t.name,
                week: t.week_of(timestamp),
            })
    }
}

/// Load a term calendar cached as `Semester,Start,End` CSV
pub fn load_terms_csv(path: &Path) -> crate::Result<TermCalendar> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut terms = Vec::new();
    for row in reader.deserialize::<Term>() {
        terms.push(row?);
    }
    debug!("Loaded {} terms from {}", terms.len(), path.display());
    Ok(TermCalendar::new(terms)?)
}

/// Save terms as `Semester,Start,End` CSV (parent directories are created)
pub fn save_terms_csv(path: &Path, terms: &[Term]) -> crate::Result<()> {
    crate::records::write_csv(path, terms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn at(y: i32, m: u32, day: u32, h: u32, min: u32) -> NaiveDateTime {
        d(y, m, day).and_hms_opt(h, min, 0).unwrap()
    }

    fn sample_calendar() -> TermCalendar {
        TermCalendar::new(vec![
            Term::new("Spring 2024", d(2024, 1, 9), d(2024, 5, 10)),
            Term::new("Fall 2023", d(2023, 8, 16), d(2023, 12, 15)),
        ])
        .unwrap()
    }

    #[test]
    fn test_monday_on_or_before() {
        // 2024-01-08 is a Monday
        assert_eq!(monday_on_or_before(d(2024, 1, 8)), d(2024, 1, 8));
        assert_eq!(monday_on_or_before(d(2024, 1, 9)), d(2024, 1, 8));
        assert_eq!(monday_on_or_before(d(2024, 1, 14)), d(2024, 1, 8));
        assert_eq!(monday_on_or_before(d(2024, 1, 15)), d(2024, 1, 15));
    }

    #[test]
    fn test_first_day_is_week_one() {
        let start = d(2023, 8, 16); // Wednesday
        assert_eq!(semester_week(start, at(2023, 8, 16, 0, 0)), 1);
        assert_eq!(semester_week(start, at(2023, 8, 16, 23, 59)), 1);
    }

    #[test]
    fn test_week_boundary_is_monday() {
        let start = d(2023, 8, 16); // Wednesday
        assert_eq!(semester_week(start, at(2023, 8, 20, 23, 59)), 1); // Sunday
        assert_eq!(semester_week(start, at(2023, 8, 21, 0, 0)), 2); // Monday
        assert_eq!(semester_week(start, at(2023, 8, 27, 12, 0)), 2);
        assert_eq!(semester_week(start, at(2023, 8, 28, 8, 0)), 3);
    }

    #[test]
    fn test_sunday_start_has_one_day_first_week() {
        let start = d(2023, 1, 8); // Sunday
        assert_eq!(semester_week(start, at(2023, 1, 8, 10, 0)), 1);
        assert_eq!(semester_week(start, at(2023, 1, 9, 10, 0)), 2);
    }

    #[test]
    fn test_monday_start_has_full_first_week() {
        let start = d(2024, 1, 8); // Monday
        assert_eq!(semester_week(start, at(2024, 1, 14, 23, 0)), 1);
        assert_eq!(semester_week(start, at(2024, 1, 15, 0, 0)), 2);
    }

    #[test]
    fn test_same_weekday_alignment_across_terms() {
        // Both Mondays fall in week 2 even though the terms start on different weekdays
        assert_eq!(semester_week(d(2023, 8, 16), at(2023, 8, 21, 9, 0)), 2);
        assert_eq!(semester_week(d(2024, 1, 9), at(2024, 1, 15, 9, 0)), 2);
    }

    #[test]
    fn test_date_before_first_monday_is_week_zero() {
        assert_eq!(semester_week(d(2023, 8, 16), at(2023, 8, 13, 9, 0)), 0);
    }

    #[test]
    fn test_assign_inside_term() {
        let calendar = sample_calendar();
        let assignment = calendar.assign(at(2023, 9, 1, 14, 30)).unwrap();
        assert_eq!(assignment.term, "Fall 2023");
        // Monday 2023-08-14 opens week 1; 2023-09-01 is 18 days later
        assert_eq!(assignment.week, 3);
    }

    #[test]
    fn test_assign_end_date_midnight_only() {
        let calendar = sample_calendar();
        let assignment = calendar.assign(at(2023, 12, 15, 0, 0)).unwrap();
        assert_eq!(assignment.term, "Fall 2023");
        assert_eq!(assignment.week, 18);
        assert!(calendar.assign(at(2023, 12, 15, 0, 1)).is_none());
        assert!(calendar.assign(at(2023, 12, 15, 14, 0)).is_none());
        assert!(calendar.assign(at(2023, 12, 16, 0, 0)).is_none());
    }

    #[test]
    fn test_assign_start_date_midnight() {
        let calendar = sample_calendar();
        let assignment = calendar.assign(at(2024, 1, 9, 0, 0)).unwrap();
        assert_eq!(assignment.term, "Spring 2024");
        assert_eq!(assignment.week, 1);
        assert!(calendar.assign(at(2024, 1, 8, 23, 59)).is_none());
    }

    #[test]
    fn test_assign_gap_between_terms() {
        let calendar = sample_calendar();
        // Summer
        assert!(calendar.assign(at(2024, 7, 1, 12, 0)).is_none());
        // Winter break
        assert!(calendar.assign(at(2023, 12, 25, 12, 0)).is_none());
        // Before any term
        assert!(calendar.assign(at(2020, 1, 1, 12, 0)).is_none());
    }

    #[test]
    fn test_calendar_sorted_chronologically() {
        let calendar = sample_calendar();
        let names: Vec<&str> = calendar.terms().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Fall 2023", "Spring 2024"]);
    }

    #[test]
    fn test_overlap_first_match_wins() {
        let calendar = TermCalendar::new(vec![
            Term::new("Late", d(2023, 3, 1), d(2023, 6, 1)),
            Term::new("Early", d(2023, 1, 10), d(2023, 3, 15)),
        ])
        .unwrap();

        let assignment = calendar.assign(at(2023, 3, 10, 12, 0)).unwrap();
        assert_eq!(assignment.term, "Early");
        // Week is relative to the winning term's start
        assert_eq!(assignment.week, semester_week(d(2023, 1, 10), at(2023, 3, 10, 12, 0)));

        let assignment = calendar.assign(at(2023, 3, 20, 12, 0)).unwrap();
        assert_eq!(assignment.term, "Late");
    }

    #[test]
    fn test_overlap_with_non_adjacent_term() {
        let calendar = TermCalendar::new(vec![
            Term::new("Long", d(2023, 1, 1), d(2023, 12, 31)),
            Term::new("Short A", d(2023, 2, 1), d(2023, 2, 28)),
            Term::new("Short B", d(2023, 9, 1), d(2023, 9, 30)),
        ])
        .unwrap();
        assert_eq!(calendar.assign(at(2023, 9, 15, 0, 0)).unwrap().term, "Long");
    }

    #[test]
    fn test_equal_starts_keep_input_order() {
        let calendar = TermCalendar::new(vec![
            Term::new("First", d(2023, 1, 10), d(2023, 5, 1)),
            Term::new("Second", d(2023, 1, 10), d(2023, 5, 1)),
        ])
        .unwrap();
        assert_eq!(calendar.assign(at(2023, 2, 1, 0, 0)).unwrap().term, "First");
    }

    #[test]
    fn test_single_day_term() {
        let calendar = TermCalendar::new(vec![Term::new("Day", d(2023, 5, 3), d(2023, 5, 3))]).unwrap();
        let assignment = calendar.assign(at(2023, 5, 3, 0, 0)).unwrap();
        assert_eq!(assignment.week, 1);
        assert!(calendar.assign(at(2023, 5, 3, 18, 0)).is_none());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let result = TermCalendar::new(vec![Term::new("Bad", d(2023, 5, 1), d(2023, 1, 1))]);
        assert!(matches!(result, Err(TermError::InvertedRange { .. })));
    }

    #[test]
    fn test_empty_name_rejected() {
        let result = TermCalendar::new(vec![Term::new("  ", d(2023, 1, 1), d(2023, 5, 1))]);
        assert_eq!(result.unwrap_err(), TermError::EmptyName(d(2023, 1, 1)));
    }

    #[test]
    fn test_empty_calendar_assigns_nothing() {
        let calendar = TermCalendar::default();
        assert!(calendar.is_empty());
        assert!(calendar.assign(at(2023, 1, 1, 0, 0)).is_none());
    }

    #[test]
    fn test_terms_csv_cache() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cache").join("terms.csv");
        let calendar = sample_calendar();

        save_terms_csv(&path, calendar.terms()).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("Semester,Start,End"));
        assert!(contents.contains("Fall 2023,2023-08-16,2023-12-15"));

        let loaded = load_terms_csv(&path).unwrap();
        assert_eq!(loaded.terms(), calendar.terms());
    }
}
