//! mksa-prep - Access log preparation
//!
//! Anonymizes the raw log, fetches the term calendar and writes the enhanced
//! dataset used by the analysis and chart tools.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use mksa_common::config::{load_config, write_toml_config, TomlConfig, LOCAL_CONFIG_FILE};
use mksa_common::logging::init_tracing;
use mksa_common::terms::load_terms_csv;
use mksa_prep::anonymize::anonymize_file;
use mksa_prep::pipeline::{enhance_file, fetch_and_save_terms, run_pipeline};
use mksa_prep::ApiCredentials;

/// Command-line arguments for mksa-prep
#[derive(Parser, Debug)]
#[command(name = "mksa-prep")]
#[command(about = "Prepare makerspace access logs for analysis")]
#[command(version)]
struct Args {
    /// Config file (default: MKSA_CONFIG, ./mksa.toml, user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, env = "MKSA_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replace names in the raw log with hashed IDs
    Anonymize {
        /// Raw log (default: [paths] raw_log)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Anonymized log (default: [paths] anonymized_log)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fetch the term calendar from the terms API and save it as CSV
    FetchTerms {
        /// Term IDs to fetch (default: [terms_api] term_ids)
        #[arg(long = "term-id")]
        term_ids: Vec<u32>,
        /// Term calendar CSV (default: [paths] terms_file)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        credentials: CredentialArgs,
    },

    /// Clean the anonymized log and add semester, week and category columns
    Enhance {
        /// Anonymized log (default: [paths] anonymized_log)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Term calendar CSV (default: [paths] terms_file)
        #[arg(short, long)]
        terms: Option<PathBuf>,
        /// Enhanced log (default: [paths] enhanced_log)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Anonymize, clean, load or fetch terms, and enhance
    Run {
        /// Fetch the term calendar even when the cache file exists
        #[arg(long)]
        refresh_terms: bool,
        #[command(flatten)]
        credentials: CredentialArgs,
    },

    /// Write a config file holding the compiled defaults
    InitConfig {
        #[arg(short, long, default_value = LOCAL_CONFIG_FILE)]
        output: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(clap::Args, Debug)]
struct CredentialArgs {
    /// Terms API application ID
    #[arg(long)]
    app_id: Option<String>,
    /// Terms API application key
    #[arg(long)]
    app_key: Option<String>,
}

impl CredentialArgs {
    fn resolve(&self, config: &TomlConfig) -> ApiCredentials {
        ApiCredentials::resolve(
            self.app_id.as_deref(),
            self.app_key.as_deref(),
            &config.terms_api,
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logging config comes from the file, so read it before the subscriber exists
    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(args.log_level.as_deref(), &config.logging)
        .context("Failed to initialize logging")?;

    info!(
        "Starting MKSA prep (mksa-prep) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let paths = &config.paths;
    match args.command {
        Command::Anonymize { input, output } => {
            let input = input.unwrap_or_else(|| paths.raw_log.clone());
            let output = output.unwrap_or_else(|| paths.anonymized_log.clone());
            let count = anonymize_file(&input, &output)
                .with_context(|| format!("Failed to anonymize {}", input.display()))?;
            println!("Anonymized {} rows to '{}'", count, output.display());
        }

        Command::FetchTerms {
            term_ids,
            output,
            credentials,
        } => {
            let term_ids = if term_ids.is_empty() {
                config.terms_api.term_ids.clone()
            } else {
                term_ids
            };
            let output = output.unwrap_or_else(|| paths.terms_file.clone());
            let terms = fetch_and_save_terms(
                &config.terms_api,
                &credentials.resolve(&config),
                &term_ids,
                &output,
            )
            .await
            .context("Failed to fetch term calendar")?;
            for term in &terms {
                println!("{:<16} {} to {}", term.name, term.start, term.end);
            }
        }

        Command::Enhance {
            input,
            terms,
            output,
        } => {
            let input = input.unwrap_or_else(|| paths.anonymized_log.clone());
            let terms = terms.unwrap_or_else(|| paths.terms_file.clone());
            let output = output.unwrap_or_else(|| paths.enhanced_log.clone());
            let calendar = load_terms_csv(&terms)
                .with_context(|| format!("Failed to load terms from {}", terms.display()))?;
            let summary = enhance_file(&input, &output, &calendar, &config)
                .with_context(|| format!("Failed to enhance {}", input.display()))?;
            println!("{}", summary);
        }

        Command::Run {
            refresh_terms,
            credentials,
        } => {
            let summary = run_pipeline(&config, &credentials.resolve(&config), refresh_terms)
                .await
                .context("Preparation failed")?;
            println!("{}", summary);
        }

        Command::InitConfig { output, force } => {
            if output.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    output.display()
                );
            }
            write_toml_config(&TomlConfig::default(), &output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Wrote default configuration to '{}'", output.display());
        }
    }

    Ok(())
}
