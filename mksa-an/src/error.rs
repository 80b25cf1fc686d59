//! Error types for mksa-an

use thiserror::Error;

/// Result type for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Analysis error type
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Shared error (I/O, CSV, parsing)
    #[error(transparent)]
    Common(#[from] mksa_common::Error),

    /// Dataset lacks a column the analysis groups by
    #[error("'{0}' column not found in the dataset")]
    MissingColumn(String),

    /// Nothing left to analyze (empty file, everything excluded)
    #[error("No data to analyze: {0}")]
    EmptyData(String),
}
