//! Preparation pipeline: anonymize → clean → term calendar → enhance

use std::path::Path;
use tracing::{info, warn};

use mksa_common::config::{resolve_credential, TermsApiConfig, TomlConfig};
use mksa_common::terms::{load_terms_csv, save_terms_csv};
use mksa_common::{Term, TermCalendar};

use crate::anonymize::anonymize_file;
use crate::clean::clean_log;
use crate::enhance::{enhance_table, EnhanceSummary};
use crate::terms_api::TermsClient;
use crate::{PrepError, Result};

/// Environment variables checked for the API application ID
pub const APP_ID_ENV_VARS: &[&str] = &["MKSA_APP_ID", "APP_ID"];

/// Environment variables checked for the API application key
pub const APP_KEY_ENV_VARS: &[&str] = &["MKSA_APP_KEY", "API_KEY"];

/// Terms API credentials as resolved from CLI, environment and config
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiCredentials {
    pub app_id: Option<String>,
    pub app_key: Option<String>,
}

impl ApiCredentials {
    /// CLI value, then environment, then `[terms_api]` config
    pub fn resolve(cli_id: Option<&str>, cli_key: Option<&str>, api: &TermsApiConfig) -> Self {
        Self {
            app_id: resolve_credential(cli_id, APP_ID_ENV_VARS, api.app_id.as_deref()),
            app_key: resolve_credential(cli_key, APP_KEY_ENV_VARS, api.app_key.as_deref()),
        }
    }

    fn require(&self) -> Result<(String, String)> {
        match (&self.app_id, &self.app_key) {
            (Some(id), Some(key)) => Ok((id.clone(), key.clone())),
            _ => Err(PrepError::NoTerms(format!(
                "API credentials missing (set {} and {}, or [terms_api] app_id/app_key)",
                APP_ID_ENV_VARS[0], APP_KEY_ENV_VARS[0]
            ))),
        }
    }
}

/// Fetch terms from the API and cache them as CSV
pub async fn fetch_and_save_terms(
    api: &TermsApiConfig,
    credentials: &ApiCredentials,
    term_ids: &[u32],
    output: &Path,
) -> Result<Vec<Term>> {
    let (app_id, app_key) = credentials.require()?;
    let client = TermsClient::new(api, app_id, app_key)?;
    let terms = client.fetch_terms(term_ids).await;
    if terms.is_empty() {
        return Err(PrepError::NoTerms(format!(
            "none of the {} requested terms could be fetched",
            term_ids.len()
        )));
    }
    save_terms_csv(output, &terms)?;
    info!("Saved {} terms to {}", terms.len(), output.display());
    Ok(terms)
}

/// Term calendar from the cache file, fetching it first when missing
pub async fn load_or_fetch_terms(
    config: &TomlConfig,
    credentials: &ApiCredentials,
    refresh: bool,
) -> Result<TermCalendar> {
    let path = &config.paths.terms_file;
    if path.exists() && !refresh {
        let calendar = load_terms_csv(path)?;
        info!("Loaded {} terms from {}", calendar.len(), path.display());
        return Ok(calendar);
    }

    if !refresh {
        info!("No term cache at {}, fetching from API", path.display());
    }
    let terms = fetch_and_save_terms(
        &config.terms_api,
        credentials,
        &config.terms_api.term_ids,
        path,
    )
    .await?;
    Ok(TermCalendar::new(terms).map_err(mksa_common::Error::from)?)
}

/// Clean an anonymized log, enhance it and write the result
pub fn enhance_file(
    input: &Path,
    output: &Path,
    calendar: &TermCalendar,
    config: &TomlConfig,
) -> Result<EnhanceSummary> {
    if calendar.is_empty() {
        return Err(PrepError::NoTerms("term calendar is empty".to_string()));
    }
    let mut table = clean_log(input, &config.exclusions)?;
    let summary = enhance_table(&mut table, calendar, &config.equipment)?;
    table.write(output)?;
    info!("Enhanced data saved to {}", output.display());
    Ok(summary)
}

/// Full preparation run using the configured paths
///
/// The raw log is anonymized when present; otherwise an existing anonymized
/// log is used as is.
pub async fn run_pipeline(
    config: &TomlConfig,
    credentials: &ApiCredentials,
    refresh_terms: bool,
) -> Result<EnhanceSummary> {
    let paths = &config.paths;
    if paths.raw_log.exists() {
        anonymize_file(&paths.raw_log, &paths.anonymized_log)?;
    } else if paths.anonymized_log.exists() {
        warn!(
            "Raw log {} not found, using existing {}",
            paths.raw_log.display(),
            paths.anonymized_log.display()
        );
    } else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!(
                "neither {} nor {} exists",
                paths.raw_log.display(),
                paths.anonymized_log.display()
            ),
        )
        .into());
    }

    let calendar = load_or_fetch_terms(config, credentials, refresh_terms).await?;
    enhance_file(&paths.anonymized_log, &paths.enhanced_log, &calendar, config)
}
