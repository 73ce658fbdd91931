//! Contour generator: strategy selection, validation and query entry points.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::chunk::ChunkLayout;
use crate::classify::CellClassifier;
use crate::config::{Algorithm, ChunkSpec, GeneratorConfig};
use crate::encode::{encode_fill, encode_lines, EncodedFill, EncodedLines};
use crate::error::{ContourError, Result};
use crate::fill::{band_pieces, rings_from_pieces, Band, Boundary};
use crate::grid::{ContourGrid, GridModel};
use crate::scheduler::{merge_lines, merge_ring_pieces, Merged, Scheduler};
use crate::trace::{line_pieces, trace};

/// Algorithm-specific behaviour behind a generator.
pub trait ContourStrategy: Send + Sync + fmt::Debug {
    fn algorithm(&self) -> Algorithm;

    /// Reject configurations the algorithm cannot run.
    fn validate(&self, config: &GeneratorConfig) -> Result<()> {
        config.validate()
    }

    /// Chunk decomposition actually used.
    fn chunk_spec(&self, config: &GeneratorConfig) -> ChunkSpec {
        config.chunking
    }

    fn scheduler(&self, config: &GeneratorConfig) -> Result<Scheduler>;
}

/// Chunked tracing on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialStrategy;

impl ContourStrategy for SerialStrategy {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Serial
    }

    fn scheduler(&self, _config: &GeneratorConfig) -> Result<Scheduler> {
        Ok(Scheduler::serial())
    }
}

/// Chunked tracing on a worker pool owned by the generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadedStrategy;

impl ContourStrategy for ThreadedStrategy {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Threaded
    }

    fn scheduler(&self, config: &GeneratorConfig) -> Result<Scheduler> {
        Scheduler::pool(config.resolved_thread_count())
    }
}

/// Single-threaded, unchunked reference algorithms.
#[derive(Debug, Clone, Copy)]
pub struct LegacyStrategy {
    algorithm: Algorithm,
}

impl LegacyStrategy {
    pub fn new(algorithm: Algorithm) -> Result<Self> {
        if !algorithm.is_legacy() {
            return Err(ContourError::unsupported(algorithm, "not a legacy algorithm"));
        }
        Ok(Self { algorithm })
    }
}

impl ContourStrategy for LegacyStrategy {
    fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    fn chunk_spec(&self, _config: &GeneratorConfig) -> ChunkSpec {
        ChunkSpec::Whole
    }

    fn scheduler(&self, _config: &GeneratorConfig) -> Result<Scheduler> {
        Ok(Scheduler::serial())
    }
}

/// Strategy for an algorithm.
pub fn strategy_for(algorithm: Algorithm) -> Result<Box<dyn ContourStrategy>> {
    Ok(match algorithm {
        Algorithm::Serial => Box::new(SerialStrategy),
        Algorithm::Threaded => Box::new(ThreadedStrategy),
        Algorithm::LegacyV1 | Algorithm::LegacyV2 => Box::new(LegacyStrategy::new(algorithm)?),
    })
}

/// Holds the in-flight flag for the duration of a query.
struct QueryGuard<'a>(&'a AtomicBool);

impl<'a> QueryGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| ContourError::QueryInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for QueryGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Contour generator over one grid.
///
/// The grid, mask and worker pool are built once; each query is a pure
/// function of them and the requested level(s). At most one query runs at a
/// time; a concurrent query fails with [`ContourError::QueryInProgress`].
#[derive(Debug)]
pub struct ContourGenerator {
    model: GridModel,
    config: GeneratorConfig,
    chunks: ChunkLayout,
    strategy: Box<dyn ContourStrategy>,
    scheduler: Scheduler,
    busy: AtomicBool,
}

impl ContourGenerator {
    pub fn new(grid: ContourGrid, config: GeneratorConfig) -> Result<Self> {
        let strategy = strategy_for(config.algorithm)?;
        strategy.validate(&config)?;

        let model = GridModel::new(grid, config.corner_mask, config.quad_as_tri, config.z_interp)?;
        let chunks = ChunkLayout::new(
            model.grid().nx_quads(),
            model.grid().ny_quads(),
            strategy.chunk_spec(&config),
        )?;
        let scheduler = strategy.scheduler(&config)?;

        tracing::debug!(
            algorithm = %strategy.algorithm(),
            nx = model.grid().nx(),
            ny = model.grid().ny(),
            active_quads = model.mask().active_count(),
            chunks = chunks.len(),
            threads = scheduler.thread_count(),
            "Created contour generator"
        );

        Ok(Self {
            model,
            config,
            chunks,
            strategy,
            scheduler,
            busy: AtomicBool::new(false),
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.strategy.algorithm()
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn grid(&self) -> &ContourGrid {
        self.model.grid()
    }

    /// Chunks along each axis (x, y).
    pub fn chunk_count(&self) -> (usize, usize) {
        self.chunks.chunk_count()
    }

    /// Nominal quads per chunk (x, y).
    pub fn chunk_size(&self) -> (usize, usize) {
        self.chunks.chunk_size()
    }

    pub fn thread_count(&self) -> usize {
        self.scheduler.thread_count()
    }

    /// Contour lines at `level`.
    pub fn lines(&self, level: f64) -> Result<EncodedLines> {
        let _guard = QueryGuard::acquire(&self.busy)?;
        self.lines_unguarded(level)
    }

    fn lines_unguarded(&self, level: f64) -> Result<EncodedLines> {
        let value = self.model.transform_level(level)?;
        let classifier = CellClassifier::new(&self.model);
        let chunks = self.chunks.chunks();

        let per_chunk = self.scheduler.run(&chunks, |chunk| {
            let mut pieces = Vec::new();
            line_pieces(&classifier, chunk, value, &mut pieces);
            Ok(trace(&pieces))
        })?;

        let layout = self.config.line_layout;
        let merged = merge_lines(per_chunk, layout.is_chunked());
        let encoded = encode_lines(layout, merged);

        tracing::debug!(
            level,
            chunks = chunks.len(),
            lines = encoded.line_count(),
            points = encoded.point_count(),
            "Generated contour lines"
        );
        Ok(encoded)
    }

    /// Filled band `lower <= z < upper`. `None` or an infinite bound leaves
    /// that side unbounded.
    pub fn filled(&self, lower: Option<f64>, upper: Option<f64>) -> Result<EncodedFill> {
        let _guard = QueryGuard::acquire(&self.busy)?;
        self.filled_unguarded(lower, upper)
    }

    fn filled_unguarded(&self, lower: Option<f64>, upper: Option<f64>) -> Result<EncodedFill> {
        let band = self.band(lower, upper)?;
        let classifier = CellClassifier::new(&self.model);
        let chunks = self.chunks.chunks();
        let layout = self.config.fill_layout;
        let boundary = Boundary::new(&self.chunks, layout.is_chunked());

        let merged = if layout.is_chunked() {
            let arenas = self.scheduler.run(&chunks, |chunk| {
                let mut pieces = Vec::new();
                band_pieces(&classifier, &boundary, chunk, band, &mut pieces);
                rings_from_pieces(pieces, chunk.index)
            })?;
            Merged::PerChunk(arenas)
        } else {
            let pieces = self.scheduler.run(&chunks, |chunk| {
                let mut pieces = Vec::new();
                band_pieces(&classifier, &boundary, chunk, band, &mut pieces);
                Ok(pieces)
            })?;
            merge_ring_pieces(pieces)?
        };
        let encoded = encode_fill(layout, merged);

        tracing::debug!(
            lower = ?lower,
            upper = ?upper,
            chunks = chunks.len(),
            polygons = encoded.polygon_count(),
            rings = encoded.ring_count(),
            "Generated filled contours"
        );
        Ok(encoded)
    }

    fn band(&self, lower: Option<f64>, upper: Option<f64>) -> Result<Band> {
        let lower = match lower {
            Some(l) if l == f64::INFINITY => {
                return Err(ContourError::invalid_level("lower bound is +inf"));
            }
            Some(l) if l == f64::NEG_INFINITY => None,
            other => other,
        };
        let upper = match upper {
            Some(u) if u == f64::NEG_INFINITY => {
                return Err(ContourError::invalid_level("upper bound is -inf"));
            }
            Some(u) if u == f64::INFINITY => None,
            other => other,
        };
        let lower_value = lower.map(|l| self.model.transform_level(l)).transpose()?;
        let upper_value = upper.map(|u| self.model.transform_level(u)).transpose()?;
        if let (Some(l), Some(u)) = (lower_value, upper_value) {
            if l >= u {
                return Err(ContourError::invalid_level(format!(
                    "lower level {} must be less than upper level {}",
                    lower.unwrap_or(l),
                    upper.unwrap_or(u)
                )));
            }
        }
        Ok(Band::new(lower_value, upper_value))
    }

    /// Contour lines at each level. Every level is checked before any is
    /// traced.
    pub fn multi_lines(&self, levels: &[f64]) -> Result<Vec<EncodedLines>> {
        let _guard = QueryGuard::acquire(&self.busy)?;
        for &level in levels {
            self.model.transform_level(level)?;
        }
        levels.iter().map(|&l| self.lines_unguarded(l)).collect()
    }

    /// Filled bands between consecutive levels, which must be strictly
    /// increasing. Every band is checked before any is traced.
    pub fn multi_filled(&self, levels: &[f64]) -> Result<Vec<EncodedFill>> {
        if levels.len() < 2 {
            return Err(ContourError::invalid_level(format!(
                "filled contours need at least 2 levels, got {}",
                levels.len()
            )));
        }
        let _guard = QueryGuard::acquire(&self.busy)?;
        for w in levels.windows(2) {
            self.band(Some(w[0]), Some(w[1]))?;
        }
        levels
            .windows(2)
            .map(|w| self.filled_unguarded(Some(w[0]), Some(w[1])))
            .collect()
    }
}
