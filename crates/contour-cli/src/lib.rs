//! Command-line front end for `contour-engine`.
//!
//! Grid files are JSON:
//!
//! ```json
//! { "nx": 3, "ny": 2, "z": [0.0, 1.0, null, 0.5, 0.2, 0.1] }
//! ```
//!
//! `x`, `y` (flat, `nx * ny` each) and `mask` (`true` = masked) are optional.
//! `null` in `z` is read as NaN and therefore masks the node.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use contour_engine::{
    Algorithm, ChunkSpec, ContourGenerator, ContourGrid, EncodedFill, EncodedLines, FillLayout,
    GeneratorConfig, LineLayout, ZInterp,
};
use test_utils::{create_gaussian_hills, create_peak_grid, create_ramp_grid, create_wave_grid, Hill};

/// Grid file contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridFile {
    pub nx: usize,
    pub ny: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<Vec<f64>>,
    pub z: Vec<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<Vec<bool>>,
}

impl GridFile {
    /// Wrap raw values; NaN is written as `null`.
    pub fn from_values(nx: usize, ny: usize, z: Vec<f64>) -> Self {
        Self {
            nx,
            ny,
            x: None,
            y: None,
            z: z.into_iter().map(|v| (!v.is_nan()).then_some(v)).collect(),
            mask: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read grid file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse grid file {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Validate shapes and build the engine grid.
    pub fn into_grid(self) -> Result<ContourGrid> {
        let z: Vec<f64> = self.z.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect();
        let grid = match (self.x, self.y) {
            (Some(x), Some(y)) => ContourGrid::new(self.nx, self.ny, x, y, z, self.mask),
            (None, None) => ContourGrid::from_z(self.nx, self.ny, z, self.mask),
            _ => bail!("grid file must give both x and y, or neither"),
        };
        Ok(grid?)
    }
}

/// Generator options. Unset options keep the value from the environment
/// (`CONTOUR_*`) or the algorithm default.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// JSON file with a full generator configuration
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,

    /// serial, threaded, legacy-v1 or legacy-v2
    #[arg(short, long)]
    pub algorithm: Option<Algorithm>,

    /// Line output layout
    #[arg(long)]
    pub line_layout: Option<LineLayout>,

    /// Filled output layout
    #[arg(long)]
    pub fill_layout: Option<FillLayout>,

    /// Treat quads with one masked corner as triangles
    #[arg(long)]
    pub corner_mask: bool,

    /// Split every quad into four triangles
    #[arg(long)]
    pub quad_as_tri: bool,

    /// linear or log
    #[arg(long)]
    pub z_interp: Option<ZInterp>,

    /// Quads per chunk, "n" or "nx,ny"
    #[arg(long, conflicts_with = "chunk_count")]
    pub chunk_size: Option<String>,

    /// Chunks per axis, "n" or "nx,ny"
    #[arg(long)]
    pub chunk_count: Option<String>,

    /// Worker threads for the threaded algorithm (0 = all cores)
    #[arg(short, long)]
    pub threads: Option<usize>,
}

impl ConfigArgs {
    /// Layer the options over `base`.
    pub fn resolve(&self, base: GeneratorConfig) -> Result<GeneratorConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Failed to parse config {}", path.display()))?
            }
            None => base,
        };

        if let Some(algorithm) = self.algorithm {
            if algorithm != config.algorithm {
                // Switching algorithm resets layouts to that algorithm's defaults.
                config.line_layout = algorithm.default_line_layout();
                config.fill_layout = algorithm.default_fill_layout();
            }
            config.algorithm = algorithm;
        }
        if let Some(layout) = self.line_layout {
            config.line_layout = layout;
        }
        if let Some(layout) = self.fill_layout {
            config.fill_layout = layout;
        }
        config.corner_mask |= self.corner_mask;
        config.quad_as_tri |= self.quad_as_tri;
        if let Some(interp) = self.z_interp {
            config.z_interp = interp;
        }
        if let Some(size) = &self.chunk_size {
            config.chunking = ChunkSpec::parse_size(size)
                .with_context(|| format!("Invalid chunk size: {size}"))?;
        }
        if let Some(count) = &self.chunk_count {
            config.chunking = ChunkSpec::parse_count(count)
                .with_context(|| format!("Invalid chunk count: {count}"))?;
        }
        if let Some(threads) = self.threads {
            config.thread_count = threads;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Lines at one level.
#[derive(Debug, Clone, Serialize)]
pub struct LinesReport {
    pub level: f64,
    pub line_count: usize,
    pub point_count: usize,
    pub output: EncodedLines,
}

/// One filled band.
#[derive(Debug, Clone, Serialize)]
pub struct FilledReport {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub polygon_count: usize,
    pub ring_count: usize,
    pub output: EncodedFill,
}

fn build_generator(grid: GridFile, config: GeneratorConfig) -> Result<ContourGenerator> {
    let (nx, ny) = (grid.nx, grid.ny);
    let generator = ContourGenerator::new(grid.into_grid()?, config)
        .context("Failed to create contour generator")?;
    info!(
        nx,
        ny,
        algorithm = %generator.algorithm(),
        chunks = ?generator.chunk_count(),
        threads = generator.thread_count(),
        "Loaded grid"
    );
    Ok(generator)
}

/// Contour lines at each level.
pub fn run_lines(grid: GridFile, config: GeneratorConfig, levels: &[f64]) -> Result<Vec<LinesReport>> {
    if levels.is_empty() {
        bail!("at least one level is required");
    }
    let generator = build_generator(grid, config)?;
    let outputs = generator.multi_lines(levels)?;

    let reports: Vec<_> = levels
        .iter()
        .zip(outputs)
        .map(|(&level, output)| LinesReport {
            level,
            line_count: output.line_count(),
            point_count: output.point_count(),
            output,
        })
        .collect();
    debug!(levels = reports.len(), "Lines complete");
    Ok(reports)
}

/// Filled bands between consecutive `levels`, or the single band
/// `[lower, upper)` when `levels` is empty.
pub fn run_filled(
    grid: GridFile,
    config: GeneratorConfig,
    levels: &[f64],
    lower: Option<f64>,
    upper: Option<f64>,
) -> Result<Vec<FilledReport>> {
    let generator = build_generator(grid, config)?;

    let bands: Vec<(Option<f64>, Option<f64>)> = if levels.is_empty() {
        if lower.is_none() && upper.is_none() {
            bail!("give --levels or at least one of --lower/--upper");
        }
        vec![(lower, upper)]
    } else {
        levels.windows(2).map(|w| (Some(w[0]), Some(w[1]))).collect()
    };
    let outputs = if levels.is_empty() {
        vec![generator.filled(lower, upper)?]
    } else {
        generator.multi_filled(levels)?
    };

    let reports: Vec<_> = bands
        .into_iter()
        .zip(outputs)
        .map(|((lower, upper), output)| FilledReport {
            lower,
            upper,
            polygon_count: output.polygon_count(),
            ring_count: output.ring_count(),
            output,
        })
        .collect();
    debug!(bands = reports.len(), "Filled complete");
    Ok(reports)
}

/// Synthetic fields for `synth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SynthField {
    /// Linear in the row index, 0 to 1
    Ramp,
    /// Single radial peak of height 1
    Peak,
    /// sin(x) * cos(y)
    Wave,
    /// Two hills and a basin
    Hills,
}

/// Build a synthetic grid in index coordinates.
pub fn synth(field: SynthField, nx: usize, ny: usize) -> Result<GridFile> {
    if nx < 2 || ny < 2 {
        bail!("synthetic grids need nx >= 2 and ny >= 2, got {nx}x{ny}");
    }
    let z = match field {
        SynthField::Ramp => create_ramp_grid(nx, ny),
        SynthField::Peak => create_peak_grid(nx, ny, 1.0),
        SynthField::Wave => create_wave_grid(nx, ny, 2.0),
        SynthField::Hills => {
            let (w, h) = (nx as f64, ny as f64);
            let hills = [
                Hill {
                    cx: 0.25 * w,
                    cy: 0.3 * h,
                    amplitude: 1.0,
                    sigma: 0.12 * w.min(h),
                },
                Hill {
                    cx: 0.7 * w,
                    cy: 0.6 * h,
                    amplitude: 0.7,
                    sigma: 0.15 * w.min(h),
                },
                Hill {
                    cx: 0.75 * w,
                    cy: 0.2 * h,
                    amplitude: -0.5,
                    sigma: 0.1 * w.min(h),
                },
            ];
            create_gaussian_hills(nx, ny, &hills)
        }
    };
    Ok(GridFile::from_values(nx, ny, z))
}
