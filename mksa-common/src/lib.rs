//! # MKSA Common Library
//!
//! Shared code for all MKSA tools including:
//! - Term calendars and week-of-term assignment
//! - Semester naming (season, year, chronological ordering)
//! - Equipment normalization and categorization
//! - Enhanced-record CSV loading and table output
//! - Summary statistics, percent changes and rankings
//! - Configuration loading and logging setup

pub mod config;
pub mod equipment;
pub mod error;
pub mod logging;
pub mod records;
pub mod semester;
pub mod stats;
pub mod terms;

pub use equipment::{EquipmentCatalog, EquipmentField};
pub use error::{Error, Result};
pub use records::EnhancedRecord;
pub use semester::{Season, SemesterKey};
pub use terms::{Term, TermAssignment, TermCalendar};
