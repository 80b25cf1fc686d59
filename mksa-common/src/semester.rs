//! Semester name helpers
//!
//! Semester names come from the term calendar ("Spring 2019", "Fall 2023").
//! The season and year are recovered from the name so tables and charts can
//! list semesters chronologically instead of alphabetically.

use std::cmp::Ordering;

/// Season of an academic term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Season {
    Spring,
    Summer,
    Fall,
    /// Name without a recognised season keyword
    Other,
}

impl Season {
    /// Classify a semester name by its season keyword
    pub fn from_name(name: &str) -> Self {
        if name.contains("Fall") {
            Season::Fall
        } else if name.contains("Summer") {
            Season::Summer
        } else if name.contains("Spring") {
            Season::Spring
        } else {
            Season::Other
        }
    }

    /// Two-season split used by the seasonal charts: Fall vs everything else
    pub fn fall_or_spring(name: &str) -> Self {
        if name.contains("Fall") {
            Season::Fall
        } else {
            Season::Spring
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
            Season::Other => "Other",
        }
    }
}

/// First run of exactly four ASCII digits in the name
pub fn semester_year(name: &str) -> Option<i32> {
    let bytes = name.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let run_start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i - run_start == 4 {
                return name[run_start..i].parse().ok();
            }
        } else {
            i += 1;
        }
    }
    None
}

/// Sort key ordering semesters by year, then season, then name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemesterKey {
    pub year: Option<i32>,
    pub season: Season,
    pub name: String,
}

impl SemesterKey {
    pub fn new(name: &str) -> Self {
        Self {
            year: semester_year(name),
            season: Season::from_name(name),
            name: name.to_string(),
        }
    }
}

impl Ord for SemesterKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Names without a year sort after dated ones
        let year_order = match (self.year, other.year) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        year_order
            .then(self.season.cmp(&other.season))
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for SemesterKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare two semester names chronologically
pub fn compare_semesters(a: &str, b: &str) -> Ordering {
    SemesterKey::new(a).cmp(&SemesterKey::new(b))
}

/// Sort semester names chronologically in place
pub fn sort_semesters<S: AsRef<str>>(names: &mut [S]) {
    names.sort_by(|a, b| compare_semesters(a.as_ref(), b.as_ref()));
}
