//! mksa-an - Usage and equipment analysis
//!
//! Reads the enhanced access log, prints the summary reports and writes the
//! analysis tables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use mksa_an::equipment::{equipment_report, require_equipment_columns, save_equipment_outputs};
use mksa_an::usage::{save_usage_outputs, usage_report};
use mksa_an::{analyze_equipment, analyze_usage};
use mksa_common::config::{load_config, TomlConfig};
use mksa_common::logging::init_tracing;
use mksa_common::records::load_enhanced_records;

/// Command-line arguments for mksa-an
#[derive(Parser, Debug)]
#[command(name = "mksa-an")]
#[command(about = "Analyze makerspace usage by week of semester")]
#[command(version)]
struct Args {
    /// Config file (default: MKSA_CONFIG, ./mksa.toml, user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, env = "MKSA_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enhanced log (default: [paths] enhanced_log)
    #[arg(short, long, global = true, env = "MKSA_ENHANCED_LOG")]
    input: Option<PathBuf>,

    /// Directory for the CSV outputs (default: [paths] analysis_dir)
    #[arg(short, long, global = true, env = "MKSA_ANALYSIS_DIR")]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Weekly visits across semesters
    Usage,
    /// Equipment type and category popularity
    Equipment,
    /// Both analyses (default)
    All,
}

fn run_usage(input: &Path, output_dir: &Path) -> Result<()> {
    let records = load_enhanced_records(input)
        .with_context(|| format!("Failed to load {}", input.display()))?;
    let analysis = analyze_usage(&records).context("Usage analysis failed")?;
    println!("{}", usage_report(&analysis));
    save_usage_outputs(&analysis, output_dir).context("Failed to save usage outputs")?;
    Ok(())
}

fn run_equipment(input: &Path, output_dir: &Path, config: &TomlConfig) -> Result<()> {
    require_equipment_columns(input)
        .with_context(|| format!("{} cannot be used for equipment analysis", input.display()))?;
    let records = load_enhanced_records(input)
        .with_context(|| format!("Failed to load {}", input.display()))?;
    let analyses =
        analyze_equipment(&records, &config.equipment).context("Equipment analysis failed")?;
    for analysis in &analyses {
        println!("{}", equipment_report(analysis));
        save_equipment_outputs(analysis, output_dir)
            .with_context(|| format!("Failed to save {} outputs", analysis.field))?;
    }
    info!("Equipment analysis complete");
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(args.log_level.as_deref(), &config.logging)
        .context("Failed to initialize logging")?;

    info!(
        "Starting MKSA analysis (mksa-an) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let input = args
        .input
        .unwrap_or_else(|| config.paths.enhanced_log.clone());
    let output_dir = args
        .output_dir
        .unwrap_or_else(|| config.paths.analysis_dir.clone());
    info!("Input: {}", input.display());
    info!("Output directory: {}", output_dir.display());

    match args.command.unwrap_or(Command::All) {
        Command::Usage => run_usage(&input, &output_dir)?,
        Command::Equipment => run_equipment(&input, &output_dir, &config)?,
        Command::All => {
            run_usage(&input, &output_dir)?;
            run_equipment(&input, &output_dir, &config)?;
        }
    }

    Ok(())
}
