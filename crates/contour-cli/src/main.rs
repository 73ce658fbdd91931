//! Contour CLI
//!
//! Computes contour lines and filled bands for a grid stored as JSON.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use contour_cli::{run_filled, run_lines, synth, ConfigArgs, GridFile, SynthField};
use contour_engine::{ContourError, GeneratorConfig};

#[derive(Parser, Debug)]
#[command(name = "contour")]
#[command(about = "Contour lines and filled bands on structured quad grids", long_about = None)]
struct Cli {
    /// Log level
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true, env = "CONTOUR_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Contour lines at one or more levels
    Lines {
        /// Grid JSON file
        grid: PathBuf,

        /// Comma-separated levels
        #[arg(short, long, value_delimiter = ',', required = true, allow_hyphen_values = true)]
        levels: Vec<f64>,

        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Filled bands between consecutive levels, or one band from --lower/--upper
    Filled {
        /// Grid JSON file
        grid: PathBuf,

        /// Comma-separated increasing levels
        #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
        levels: Vec<f64>,

        /// Lower bound of a single band (omit for unbounded)
        #[arg(long, allow_hyphen_values = true, conflicts_with = "levels")]
        lower: Option<f64>,

        /// Upper bound of a single band (omit for unbounded)
        #[arg(long, allow_hyphen_values = true, conflicts_with = "levels")]
        upper: Option<f64>,

        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Write a synthetic grid file
    Synth {
        /// Field shape
        #[arg(value_enum)]
        field: SynthField,

        /// Nodes along x
        #[arg(long, default_value = "64")]
        nx: usize,

        /// Nodes along y
        #[arg(long, default_value = "64")]
        ny: usize,

        /// Output grid file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    let result = run(cli.command);
    if let Err(err) = &result {
        if let Some(contour) = err.downcast_ref::<ContourError>() {
            tracing::error!(kind = contour.kind(), "{}", contour);
        }
    }
    result
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Lines {
            grid,
            levels,
            output,
            config,
        } => {
            let config = config.resolve(GeneratorConfig::from_env())?;
            let reports = run_lines(GridFile::load(&grid)?, config, &levels)?;
            for report in &reports {
                info!(
                    level = report.level,
                    lines = report.line_count,
                    points = report.point_count,
                    "Contour lines"
                );
            }
            write_json(&reports, output.as_ref())
        }

        Commands::Filled {
            grid,
            levels,
            lower,
            upper,
            output,
            config,
        } => {
            let config = config.resolve(GeneratorConfig::from_env())?;
            let reports = run_filled(GridFile::load(&grid)?, config, &levels, lower, upper)?;
            for report in &reports {
                info!(
                    lower = ?report.lower,
                    upper = ?report.upper,
                    polygons = report.polygon_count,
                    rings = report.ring_count,
                    "Filled contours"
                );
            }
            write_json(&reports, output.as_ref())
        }

        Commands::Synth {
            field,
            nx,
            ny,
            output,
        } => {
            let grid = synth(field, nx, ny)?;
            grid.save(&output)?;
            info!(?field, nx, ny, path = %output.display(), "Wrote synthetic grid");
            Ok(())
        }
    }
}

fn write_json<T: Serialize>(value: &T, path: Option<&PathBuf>) -> Result<()> {
    match path {
        Some(path) => {
            let json = serde_json::to_string(value)?;
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Wrote output");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            serde_json::to_writer(&mut stdout, value)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}
