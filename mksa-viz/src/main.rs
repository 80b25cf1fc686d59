//! mksa-viz - Usage and equipment charts
//!
//! Runs the analyses on the enhanced access log and writes SVG charts.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use mksa_an::equipment::require_equipment_columns;
use mksa_an::{analyze_equipment, analyze_usage};
use mksa_common::config::{load_config, TomlConfig};
use mksa_common::logging::init_tracing;
use mksa_common::records::load_enhanced_records;
use mksa_common::EnhancedRecord;
use mksa_viz::{render_equipment_charts, render_usage_charts};

/// Command-line arguments for mksa-viz
#[derive(Parser, Debug)]
#[command(name = "mksa-viz")]
#[command(about = "Chart makerspace usage and equipment popularity as SVG")]
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

    /// Directory for the charts (default: [paths] image_dir)
    #[arg(short, long, global = true, env = "MKSA_IMAGE_DIR")]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Weekly usage lines and heatmaps
    Usage,
    /// Equipment popularity and ranking charts
    Equipment,
    /// Both chart sets (default)
    All,
}

fn run_usage(records: &[EnhancedRecord], output_dir: &Path) -> Result<()> {
    let analysis = analyze_usage(records).context("Usage analysis failed")?;
    let written = render_usage_charts(&analysis, output_dir).context("Failed to draw usage charts")?;
    info!("{} usage charts written", written.len());
    Ok(())
}

fn run_equipment(
    input: &Path,
    records: &[EnhancedRecord],
    output_dir: &Path,
    config: &TomlConfig,
) -> Result<()> {
    require_equipment_columns(input)
        .with_context(|| format!("{} cannot be used for equipment charts", input.display()))?;
    let analyses =
        analyze_equipment(records, &config.equipment).context("Equipment analysis failed")?;
    for analysis in &analyses {
        let written = render_equipment_charts(analysis, output_dir)
            .with_context(|| format!("Failed to draw {} charts", analysis.field.display_name()))?;
        info!("{} {} charts written", written.len(), analysis.field.display_name());
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(args.log_level.as_deref(), &config.logging)
        .context("Failed to initialize logging")?;

    info!(
        "Starting MKSA charts (mksa-viz) v{} [{}] built {} ({})",
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
        .unwrap_or_else(|| config.paths.image_dir.clone());
    info!("Input: {}", input.display());
    info!("Output directory: {}", output_dir.display());

    let records = load_enhanced_records(&input)
        .with_context(|| format!("Failed to load {}", input.display()))?;

    match args.command.unwrap_or(Command::All) {
        Command::Usage => run_usage(&records, &output_dir)?,
        Command::Equipment => run_equipment(&input, &records, &output_dir, &config)?,
        Command::All => {
            run_usage(&records, &output_dir)?;
            run_equipment(&input, &records, &output_dir, &config)?;
        }
    }

    info!("All charts saved to {}", output_dir.display());
    Ok(())
}
