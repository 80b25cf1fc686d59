//! Configuration loading and config file resolution
//!
//! All settings live in one optional TOML file. Every section and key has a
//! compiled default, so the tools run without any configuration.
//!
//! Config file resolution order:
//! 1. Command-line argument (`--config`)
//! 2. `MKSA_CONFIG` environment variable
//! 3. `./mksa.toml` in the working directory
//! 4. `<user config dir>/mksa/config.toml`
//! 5. Compiled defaults (no file)
//!
//! A missing file is not an error (warning + defaults). A file that exists
//! but does not parse is.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::equipment::EquipmentCatalog;
use crate::terms::start_of_day;
use crate::{Error, Result};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "MKSA_CONFIG";

/// Config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "mksa.toml";

/// Root configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    /// Date windows removed from the data before analysis
    #[serde(default = "default_exclusions")]
    pub exclusions: Vec<ExclusionWindow>,

    #[serde(default)]
    pub terms_api: TermsApiConfig,

    #[serde(default)]
    pub equipment: EquipmentCatalog,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            exclusions: default_exclusions(),
            terms_api: TermsApiConfig::default(),
            equipment: EquipmentCatalog::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Input and output locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Raw access log with personal names
    pub raw_log: PathBuf,
    /// Access log with names replaced by hashed IDs
    pub anonymized_log: PathBuf,
    /// Log with semester, week and category columns
    pub enhanced_log: PathBuf,
    /// Cached term calendar (Semester,Start,End)
    pub terms_file: PathBuf,
    /// Directory for analysis CSV files
    pub analysis_dir: PathBuf,
    /// Directory for charts
    pub image_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_log: PathBuf::from("data/log.csv"),
            anonymized_log: PathBuf::from("data/anonymized_log.csv"),
            enhanced_log: PathBuf::from("data/enhanced_log.csv"),
            terms_file: PathBuf::from("data/terms.csv"),
            analysis_dir: PathBuf::from("analysis"),
            image_dir: PathBuf::from("img"),
        }
    }
}

/// Closed range removed from the access log, from 00:00 on `start` to
/// 00:00 on `end`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default)]
    pub reason: String,
}

impl ExclusionWindow {
    /// True when `timestamp` lies within `start 00:00..=end 00:00`
    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        start_of_day(self.start) <= timestamp && timestamp <= start_of_day(self.end)
    }
}

fn default_exclusions() -> Vec<ExclusionWindow> {
    match (
        NaiveDate::from_ymd_opt(2020, 3, 14),
        NaiveDate::from_ymd_opt(2021, 8, 25),
    ) {
        (Some(start), Some(end)) => vec![ExclusionWindow {
            start,
            end,
            reason: "COVID-19 campus closure".to_string(),
        }],
        _ => Vec::new(),
    }
}

/// Campus term calendar API settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TermsApiConfig {
    pub base_url: String,
    /// Academic career used to select the term record ("ugrd")
    pub career_code: String,
    /// Term IDs to fetch (summers and closed terms left out)
    pub term_ids: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for TermsApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://gateway.api.berkeley.edu/uat/sis/v2/terms".to_string(),
            career_code: "ugrd".to_string(),
            // Spring 2016 to Spring 2024
            term_ids: vec![
                2162, 2168, 2172, 2178, 2182, 2188, 2192, 2198, 2218, 2222, 2228, 2232, 2238, 2242,
            ],
            app_id: None,
            app_key: None,
            timeout_secs: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}

/// Pick the config file to use, if any
///
/// Explicit locations (CLI argument, environment variable) are returned even
/// when the file does not exist so the caller can warn about them; implicit
/// locations are only returned when present.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Working directory
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }

    // Priority 4: User config directory
    user_config_path().filter(|p| p.exists())
}

/// `<user config dir>/mksa/config.toml`
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mksa").join("config.toml"))
}

/// Resolve and load configuration, falling back to compiled defaults
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg) {
        Some(path) if path.exists() => {
            let config = TomlConfig::load(&path)?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        Some(path) => {
            warn!(
                "Config file {} not found, using compiled defaults",
                path.display()
            );
            Ok(TomlConfig::default())
        }
        None => {
            debug!("No config file found, using compiled defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Resolve a credential: CLI value, then the first set environment variable,
/// then the config file value
pub fn resolve_credential(
    cli_value: Option<&str>,
    env_vars: &[&str],
    toml_value: Option<&str>,
) -> Option<String> {
    if let Some(value) = cli_value.filter(|v| !v.is_empty()) {
        return Some(value.to_string());
    }
    for var in env_vars {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    toml_value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Write a config file atomically (temp file + rename)
///
/// The file may hold API credentials, so on Unix it is created with 0600
/// permissions.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    fs::write(&tmp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config.paths, PathsConfig::default());
        assert_eq!(config.exclusions.len(), 1);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.terms_api.term_ids.len(), 14);
        assert_eq!(config.equipment, EquipmentCatalog::default());
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            [paths]
            analysis_dir = "out/analysis"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.paths.analysis_dir, PathBuf::from("out/analysis"));
        assert_eq!(config.paths.image_dir, PathBuf::from("img"));
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_exclusions_can_be_disabled_or_replaced() {
        let config: TomlConfig = toml::from_str("exclusions = []").unwrap();
        assert!(config.exclusions.is_empty());

        let config: TomlConfig = toml::from_str(
            r#"
            [[exclusions]]
            start = "2019-12-20"
            end = "2020-01-05"
            reason = "Winter closure"
            "#,
        )
        .unwrap();
        let window = &config.exclusions[0];
        let at = |y, m, d, h| NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap();
        assert!(window.contains(at(2019, 12, 20, 0)));
        assert!(window.contains(at(2020, 1, 5, 0)));
        assert!(!window.contains(at(2020, 1, 5, 14)));
        assert!(!window.contains(at(2019, 12, 19, 23)));
    }

    #[test]
    fn test_default_exclusion_ends_at_midnight() {
        let config = TomlConfig::default();
        let covid = &config.exclusions[0];
        let at = |y, m, d, h| NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap();
        assert!(covid.contains(at(2020, 3, 14, 0)));
        assert!(covid.contains(at(2021, 8, 25, 0)));
        assert!(!covid.contains(at(2021, 8, 25, 10)));
        assert!(!covid.contains(at(2020, 3, 13, 23)));
    }

    #[test]
    fn test_equipment_section() {
        let config: TomlConfig = toml::from_str(
            r#"
            [equipment]
            excluded_access_types = []

            [[equipment.categories]]
            category = "Textiles"
            members = ["Sewing Machine"]
            "#,
        )
        .unwrap();
        assert!(config.equipment.excluded_access_types.is_empty());
        assert_eq!(config.equipment.excluded_categories, vec!["Entry".to_string()]);
        assert_eq!(config.equipment.categorize("Sewing Machine 2"), "Textiles");
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[paths\nraw_log = ").unwrap();
        assert!(matches!(TomlConfig::load(&path), Err(Error::Config(_))));
    }
}
