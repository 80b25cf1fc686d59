//! MKSA data preparation
//!
//! Turns a raw makerspace access log into the enhanced dataset consumed by
//! `mksa-an` and `mksa-viz`:
//! - [`anonymize`]: names replaced by hashed IDs
//! - [`clean`]: duplicates and exclusion windows removed
//! - [`terms_api`]: term calendar fetched from the campus API
//! - [`enhance`]: semester, week of semester and equipment category added

pub mod anonymize;
pub mod clean;
pub mod enhance;
pub mod error;
pub mod pipeline;
pub mod terms_api;

pub use clean::LogTable;
pub use enhance::EnhanceSummary;
pub use error::{PrepError, Result};
pub use pipeline::ApiCredentials;
pub use terms_api::{TermsApiError, TermsClient};
