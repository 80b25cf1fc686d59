//! MKSA usage analysis
//!
//! Aggregates the enhanced access log by semester and week of semester:
//! - [`usage`]: overall weekly visits, peak and low weeks, week-over-week change
//! - [`equipment`]: the same per equipment type and category, plus rankings

pub mod equipment;
pub mod error;
pub mod table;
pub mod usage;

pub use equipment::{analyze_equipment, EquipmentAnalysis};
pub use error::{AnalysisError, Result};
pub use usage::{analyze_usage, UsageAnalysis};
