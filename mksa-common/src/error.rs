//! Common error types for MKSA

use thiserror::Error;

use crate::terms::TermError;

/// Common result type for MKSA operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across MKSA tools
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading or writing error (wraps csv::Error)
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input data (missing column, malformed value)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Value could not be parsed (timestamps, dates, numbers)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Term calendar error
    #[error("Term calendar error: {0}")]
    Term(#[from] TermError),
}
