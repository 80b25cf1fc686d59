//! Tracing subscriber setup shared by all MKSA binaries
//!
//! Filter priority: `RUST_LOG`, then the command-line level, then the
//! `[logging] level` config value.

use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::{Error, Result};

/// Build the filter for a configured level
pub fn env_filter(level_override: Option<&str>, config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(level_override.unwrap_or(config.level.as_str()))
    })
}

/// Install the global tracing subscriber
///
/// Logs go to stderr, or are appended to `config.file` when set, keeping
/// stdout free for the printed summaries.
pub fn init_tracing(level_override: Option<&str>, config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(level_override, config);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    installed.map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_env_filter_uses_override() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig::default();
        let filter = env_filter(Some("debug"), &config);
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    #[serial]
    fn test_env_filter_uses_config_level() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "warn".to_string(),
            file: None,
        };
        assert_eq!(env_filter(None, &config).to_string(), "warn");
    }
}
