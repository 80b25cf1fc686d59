//! Error types for mksa-prep

use thiserror::Error;

use crate::terms_api::TermsApiError;

/// Result type for preparation steps
pub type Result<T> = std::result::Result<T, PrepError>;

/// Preparation error type
#[derive(Debug, Error)]
pub enum PrepError {
    /// Shared error (I/O, CSV, parsing, term calendar)
    #[error(transparent)]
    Common(#[from] mksa_common::Error),

    /// Term calendar could not be fetched
    #[error("Terms API error: {0}")]
    TermsApi(#[from] TermsApiError),

    /// Input file is missing a column the step depends on
    #[error("Missing column '{column}' in {file}")]
    MissingColumn { column: String, file: String },

    /// A timestamp cell could not be parsed
    #[error("Row {row}: {message}")]
    BadRow { row: usize, message: String },

    /// No term data available (no cache file and nothing fetched)
    #[error("No term calendar available: {0}")]
    NoTerms(String),
}

impl From<csv::Error> for PrepError {
    fn from(err: csv::Error) -> Self {
        PrepError::Common(err.into())
    }
}

impl From<std::io::Error> for PrepError {
    fn from(err: std::io::Error) -> Self {
        PrepError::Common(err.into())
    }
}
