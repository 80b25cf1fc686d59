//! MKSA chart rendering
//!
//! SVG charts of the analysis results, drawn with plotters:
//! - [`usage_charts`]: weekly visit lines and heatmaps by season and year
//! - [`equipment_charts`]: popularity bars and lines, ranking consistency,
//!   rank heatmaps, box plots and semester trends per equipment field
//! - [`charts`]: the chart primitives both build on

pub mod charts;
pub mod equipment_charts;
pub mod error;
pub mod usage_charts;

pub use equipment_charts::render_equipment_charts;
pub use error::{Result, VizError};
pub use usage_charts::render_usage_charts;
