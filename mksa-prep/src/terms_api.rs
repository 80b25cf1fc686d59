//! Campus term calendar API client
//!
//! Fetches one term per request from `{base_url}/{term_id}?career-code=...`,
//! authenticated with `app_id` / `app_key` headers. The term name, first
//! session start date and fully-graded deadline become a [`Term`].
//!
//! Fetching is best effort: a term that fails is logged and skipped.

use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use mksa_common::config::TermsApiConfig;
use mksa_common::Term;

const USER_AGENT: &str = concat!("mksa-prep/", env!("CARGO_PKG_VERSION"));

/// Terms API errors
#[derive(Debug, Error)]
pub enum TermsApiError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

#[derive(Debug, Deserialize)]
struct TermsEnvelope {
    #[serde(default)]
    response: TermsBody,
}

#[derive(Debug, Default, Deserialize)]
struct TermsBody {
    #[serde(default)]
    terms: Vec<ApiTerm>,
}

#[derive(Debug, Deserialize)]
struct ApiTerm {
    name: Option<String>,
    #[serde(default)]
    sessions: Vec<ApiSession>,
    #[serde(rename = "fullyGradedDeadline")]
    fully_graded_deadline: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiSession {
    #[serde(rename = "beginDate")]
    begin_date: Option<String>,
}

fn parse_api_date(field: &str, value: &str) -> Result<NaiveDate, TermsApiError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| TermsApiError::DateParse(format!("{} '{}': {}", field, value, e)))
}

/// Extract the term from a terms API response body
pub fn parse_term_response(body: &str) -> Result<Term, TermsApiError> {
    let envelope: TermsEnvelope =
        serde_json::from_str(body).map_err(|e| TermsApiError::ParseError(e.to_string()))?;

    let term = envelope
        .response
        .terms
        .into_iter()
        .next()
        .ok_or_else(|| TermsApiError::MissingField("response.terms".to_string()))?;

    let name = term
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| TermsApiError::MissingField("name".to_string()))?;

    let begin = term
        .sessions
        .into_iter()
        .next()
        .ok_or_else(|| TermsApiError::MissingField("sessions".to_string()))?
        .begin_date
        .ok_or_else(|| TermsApiError::MissingField("sessions[0].beginDate".to_string()))?;

    let end = term
        .fully_graded_deadline
        .ok_or_else(|| TermsApiError::MissingField("fullyGradedDeadline".to_string()))?;

    Ok(Term::new(
        name.trim(),
        parse_api_date("beginDate", &begin)?,
        parse_api_date("fullyGradedDeadline", &end)?,
    ))
}

/// Terms API client
pub struct TermsClient {
    http_client: reqwest::Client,
    base_url: String,
    career_code: String,
    app_id: String,
    app_key: String,
}

impl TermsClient {
    pub fn new(
        config: &TermsApiConfig,
        app_id: String,
        app_key: String,
    ) -> Result<Self, TermsApiError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TermsApiError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            career_code: config.career_code.clone(),
            app_id,
            app_key,
        })
    }

    /// Fetch a single term
    pub async fn fetch_term(&self, term_id: u32) -> Result<Term, TermsApiError> {
        let url = format!("{}/{}", self.base_url, term_id);
        tracing::debug!(term_id, url = %url, "Querying terms API");

        let response = self
            .http_client
            .get(&url)
            .query(&[("career-code", self.career_code.as_str())])
            .header("app_id", &self.app_id)
            .header("app_key", &self.app_key)
            .send()
            .await
            .map_err(|e| TermsApiError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TermsApiError::ApiError(status.as_u16(), error_text));
        }

        let body = response
            .text()
            .await
            .map_err(|e| TermsApiError::NetworkError(e.to_string()))?;
        parse_term_response(&body)
    }

    /// Fetch several terms, skipping the ones that fail
    pub async fn fetch_terms(&self, term_ids: &[u32]) -> Vec<Term> {
        let mut terms = Vec::with_capacity(term_ids.len());
        for &term_id in term_ids {
            match self.fetch_term(term_id).await {
                Ok(term) => {
                    tracing::info!(
                        term_id,
                        "Fetched {}: {} to {}",
                        term.name,
                        term.start,
                        term.end
                    );
                    terms.push(term);
                }
                Err(e) => {
                    tracing::warn!(term_id, "Skipping term: {}", e);
                }
            }
        }
        tracing::info!("Fetched {} of {} terms", terms.len(), term_ids.len());
        terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FALL_2023: &str = r#"{
        "apiResponse": {},
        "response": {
            "terms": [{
                "id": "2238",
                "name": "2023 Fall",
                "sessions": [{"beginDate": "2023-08-16", "endDate": "2023-12-15"}],
                "fullyGradedDeadline": "2024-01-03"
            }]
        }
    }"#;

    #[test]
    fn test_parse_term_response() {
        let term = parse_term_response(FALL_2023).unwrap();
        assert_eq!(term.name, "2023 Fall");
        assert_eq!(term.start, NaiveDate::from_ymd_opt(2023, 8, 16).unwrap());
        assert_eq!(term.end, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
    }

    #[test]
    fn test_missing_terms() {
        let err = parse_term_response(r#"{"response": {"terms": []}}"#).unwrap_err();
        assert!(matches!(err, TermsApiError::MissingField(ref f) if f == "response.terms"));

        let err = parse_term_response(r#"{}"#).unwrap_err();
        assert!(matches!(err, TermsApiError::MissingField(_)));
    }

    #[test]
    fn test_missing_sessions_and_deadline() {
        let err = parse_term_response(
            r#"{"response": {"terms": [{"name": "2023 Fall", "fullyGradedDeadline": "2024-01-03"}]}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, TermsApiError::MissingField(ref f) if f == "sessions"));

        let err = parse_term_response(
            r#"{"response": {"terms": [{"name": "2023 Fall", "sessions": [{"beginDate": "2023-08-16"}]}]}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, TermsApiError::MissingField(ref f) if f == "fullyGradedDeadline"));
    }

    #[test]
    fn test_bad_date() {
        let err = parse_term_response(
            r#"{"response": {"terms": [{"name": "2023 Fall",
                "sessions": [{"beginDate": "08/16/2023"}],
                "fullyGradedDeadline": "2024-01-03"}]}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, TermsApiError::DateParse(_)));
    }

    #[test]
    fn test_not_json() {
        assert!(matches!(
            parse_term_response("<html>"),
            Err(TermsApiError::ParseError(_))
        ));
    }
}
