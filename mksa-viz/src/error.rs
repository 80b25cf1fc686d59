//! Error types for mksa-viz

use plotters::drawing::DrawingAreaErrorKind;
use thiserror::Error;

/// Result type for chart rendering
pub type Result<T> = std::result::Result<T, VizError>;

/// Chart rendering error type
#[derive(Debug, Error)]
pub enum VizError {
    /// Shared error (I/O, CSV, parsing)
    #[error(transparent)]
    Common(#[from] mksa_common::Error),

    /// Analysis feeding the chart failed
    #[error(transparent)]
    Analysis(#[from] mksa_an::AnalysisError),

    /// Plotters backend or layout failure
    #[error("Render error: {0}")]
    Render(String),

    /// Output directory could not be created
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Chart would have no values
    #[error("Nothing to plot: {0}")]
    NoData(String),
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for VizError {
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        VizError::Render(err.to_string())
    }
}
