//! Configuration for contour generators.

use crate::error::{ContourError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Contouring algorithm, selected once per generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    /// Chunked tracing on the calling thread.
    #[default]
    Serial,
    /// Chunked tracing on a worker pool owned by the generator.
    Threaded,
    /// Reference algorithm kept for output compatibility (mpl2005).
    LegacyV1,
    /// Reference algorithm kept for output compatibility (mpl2014).
    LegacyV2,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::Threaded => "threaded",
            Self::LegacyV1 => "legacy-v1",
            Self::LegacyV2 => "legacy-v2",
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::LegacyV1 | Self::LegacyV2)
    }

    pub fn supports_corner_mask(&self) -> bool {
        !self.is_legacy()
    }

    pub fn supports_quad_as_tri(&self) -> bool {
        !self.is_legacy()
    }

    pub fn supports_threads(&self) -> bool {
        matches!(self, Self::Threaded)
    }

    pub fn supports_chunking(&self) -> bool {
        !self.is_legacy()
    }

    pub fn supports_z_interp(&self) -> bool {
        !self.is_legacy()
    }

    pub fn supports_line_layout(&self, layout: LineLayout) -> bool {
        !self.is_legacy() || layout == LineLayout::SeparateWithCodes
    }

    pub fn supports_fill_layout(&self, layout: FillLayout) -> bool {
        !self.is_legacy() || layout == FillLayout::SeparateWithCodes
    }

    pub fn default_line_layout(&self) -> LineLayout {
        if self.is_legacy() {
            LineLayout::SeparateWithCodes
        } else {
            LineLayout::Separate
        }
    }

    pub fn default_fill_layout(&self) -> FillLayout {
        if self.is_legacy() {
            FillLayout::SeparateWithCodes
        } else {
            FillLayout::Separate
        }
    }
}

impl FromStr for Algorithm {
    type Err = ContourError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "serial" => Ok(Self::Serial),
            "threaded" => Ok(Self::Threaded),
            "legacy-v1" | "legacy_v1" | "mpl2005" => Ok(Self::LegacyV1),
            "legacy-v2" | "legacy_v2" | "mpl2014" => Ok(Self::LegacyV2),
            other => Err(ContourError::unsupported(
                other,
                "unknown algorithm name",
            )),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output layout for line queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineLayout {
    /// One point array per line.
    #[default]
    Separate,
    /// One point array and one path code array per line.
    SeparateWithCodes,
    /// Per chunk: combined points plus line start offsets.
    ChunkCombined,
    /// Per chunk: combined points plus path codes.
    ChunkCombinedWithCodes,
}

impl LineLayout {
    /// Chunked layouts report geometry per chunk and are never stitched.
    pub fn is_chunked(&self) -> bool {
        matches!(self, Self::ChunkCombined | Self::ChunkCombinedWithCodes)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Separate => "separate",
            Self::SeparateWithCodes => "separate-with-codes",
            Self::ChunkCombined => "chunk-combined",
            Self::ChunkCombinedWithCodes => "chunk-combined-with-codes",
        }
    }
}

impl FromStr for LineLayout {
    type Err = ContourError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "separate" => Ok(Self::Separate),
            "separate-with-codes" | "separate-code" => Ok(Self::SeparateWithCodes),
            "chunk-combined" | "chunk-combined-offset" => Ok(Self::ChunkCombined),
            "chunk-combined-with-codes" | "chunk-combined-code" => {
                Ok(Self::ChunkCombinedWithCodes)
            }
            other => Err(ContourError::unsupported(other, "unknown line layout")),
        }
    }
}

impl fmt::Display for LineLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output layout for filled queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FillLayout {
    /// Per polygon: points, ring offsets and ring kinds.
    #[default]
    Separate,
    /// Per polygon: points, path codes and ring kinds.
    SeparateWithCodes,
    /// Per chunk: points, ring offsets, outer offsets and ring kinds.
    ChunkCombined,
    /// Per chunk: points, path codes, outer offsets and ring kinds.
    ChunkCombinedWithCodes,
}

impl FillLayout {
    pub fn is_chunked(&self) -> bool {
        matches!(self, Self::ChunkCombined | Self::ChunkCombinedWithCodes)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Separate => "separate",
            Self::SeparateWithCodes => "separate-with-codes",
            Self::ChunkCombined => "chunk-combined",
            Self::ChunkCombinedWithCodes => "chunk-combined-with-codes",
        }
    }
}

impl FromStr for FillLayout {
    type Err = ContourError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "separate" | "outer-offset" => Ok(Self::Separate),
            "separate-with-codes" | "outer-code" => Ok(Self::SeparateWithCodes),
            "chunk-combined" | "chunk-combined-offset" => Ok(Self::ChunkCombined),
            "chunk-combined-with-codes" | "chunk-combined-code" => {
                Ok(Self::ChunkCombinedWithCodes)
            }
            other => Err(ContourError::unsupported(other, "unknown fill layout")),
        }
    }
}

impl fmt::Display for FillLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How values are interpolated along facet edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ZInterp {
    #[default]
    Linear,
    /// Interpolate in `ln(z)`; needs strictly positive values and levels.
    Log,
}

impl FromStr for ZInterp {
    type Err = ContourError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "log" => Ok(Self::Log),
            other => Err(ContourError::unsupported(other, "unknown z interpolation")),
        }
    }
}

/// How the quad lattice is split into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkSpec {
    /// A single chunk covering the whole grid.
    #[default]
    Whole,
    /// Quads per chunk along each axis.
    Size { nx: usize, ny: usize },
    /// Number of chunks along each axis.
    Count { nx: usize, ny: usize },
    /// Total number of chunks, factorised into the squarest tiles.
    TotalCount(usize),
}

impl ChunkSpec {
    /// Parse `"n"` or `"nx,ny"`.
    fn parse_pair(s: &str) -> Option<(usize, usize)> {
        let mut parts = s.split(',').map(|p| p.trim().parse::<usize>());
        match (parts.next(), parts.next(), parts.next()) {
            (Some(Ok(n)), None, None) => Some((n, n)),
            (Some(Ok(nx)), Some(Ok(ny)), None) => Some((nx, ny)),
            _ => None,
        }
    }

    /// Parse a chunk size such as `"32"` or `"64,16"`.
    pub fn parse_size(s: &str) -> Option<Self> {
        Self::parse_pair(s).map(|(nx, ny)| Self::Size { nx, ny })
    }

    /// Parse a chunk count such as `"4"` or `"4,2"`.
    pub fn parse_count(s: &str) -> Option<Self> {
        Self::parse_pair(s).map(|(nx, ny)| Self::Count { nx, ny })
    }

    fn has_zero(&self) -> bool {
        match *self {
            Self::Whole => false,
            Self::Size { nx, ny } | Self::Count { nx, ny } => nx == 0 || ny == 0,
            Self::TotalCount(n) => n == 0,
        }
    }
}

/// Configuration for a contour generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Algorithm used for every query.
    pub algorithm: Algorithm,

    /// Output layout of `lines` queries.
    pub line_layout: LineLayout,

    /// Output layout of `filled` queries.
    pub fill_layout: FillLayout,

    /// Process quads with exactly one invalid corner as triangles.
    pub corner_mask: bool,

    /// Split every valid quad into four triangles around its centre.
    pub quad_as_tri: bool,

    /// Interpolation along facet edges.
    pub z_interp: ZInterp,

    /// Chunk decomposition.
    pub chunking: ChunkSpec,

    /// Worker threads for the threaded algorithm (0 = hardware parallelism).
    pub thread_count: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self::for_algorithm(Algorithm::Serial)
    }
}

impl GeneratorConfig {
    /// Default configuration for an algorithm, with its preferred layouts.
    pub fn for_algorithm(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            line_layout: algorithm.default_line_layout(),
            fill_layout: algorithm.default_fill_layout(),
            corner_mask: false,
            quad_as_tri: false,
            z_interp: ZInterp::Linear,
            chunking: ChunkSpec::Whole,
            thread_count: 0,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = match std::env::var("CONTOUR_ALGORITHM") {
            Ok(val) => match val.parse() {
                Ok(algorithm) => Self::for_algorithm(algorithm),
                Err(_) => {
                    tracing::warn!(value = %val, "ignoring invalid CONTOUR_ALGORITHM");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        };

        if let Ok(val) = std::env::var("CONTOUR_LINE_LAYOUT") {
            match val.parse() {
                Ok(layout) => config.line_layout = layout,
                Err(_) => tracing::warn!(value = %val, "ignoring invalid CONTOUR_LINE_LAYOUT"),
            }
        }

        if let Ok(val) = std::env::var("CONTOUR_FILL_LAYOUT") {
            match val.parse() {
                Ok(layout) => config.fill_layout = layout,
                Err(_) => tracing::warn!(value = %val, "ignoring invalid CONTOUR_FILL_LAYOUT"),
            }
        }

        if let Ok(val) = std::env::var("CONTOUR_CORNER_MASK") {
            config.corner_mask = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("CONTOUR_QUAD_AS_TRI") {
            config.quad_as_tri = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("CONTOUR_Z_INTERP") {
            match val.parse() {
                Ok(interp) => config.z_interp = interp,
                Err(_) => tracing::warn!(value = %val, "ignoring invalid CONTOUR_Z_INTERP"),
            }
        }

        if let Ok(val) = std::env::var("CONTOUR_CHUNK_SIZE") {
            match ChunkSpec::parse_size(&val) {
                Some(spec) => config.chunking = spec,
                None => tracing::warn!(value = %val, "ignoring invalid CONTOUR_CHUNK_SIZE"),
            }
        } else if let Ok(val) = std::env::var("CONTOUR_CHUNK_COUNT") {
            match ChunkSpec::parse_count(&val) {
                Some(spec) => config.chunking = spec,
                None => tracing::warn!(value = %val, "ignoring invalid CONTOUR_CHUNK_COUNT"),
            }
        }

        if let Ok(val) = std::env::var("CONTOUR_THREADS") {
            if let Ok(threads) = val.parse() {
                config.thread_count = threads;
            }
        }

        config
    }

    /// Validate the configuration against the selected algorithm.
    pub fn validate(&self) -> Result<()> {
        let algorithm = self.algorithm;
        let reject = |msg: &str| Err(ContourError::unsupported(algorithm, msg));

        if self.corner_mask && self.quad_as_tri {
            return reject("corner_mask and quad_as_tri are mutually exclusive");
        }
        if self.corner_mask && !algorithm.supports_corner_mask() {
            return reject("corner_mask is not supported");
        }
        if self.quad_as_tri && !algorithm.supports_quad_as_tri() {
            return reject("quad_as_tri is not supported");
        }
        if self.z_interp != ZInterp::Linear && !algorithm.supports_z_interp() {
            return reject("only linear z interpolation is supported");
        }
        if self.chunking.has_zero() {
            return reject("chunk sizes and counts must be > 0");
        }
        if self.chunking != ChunkSpec::Whole && !algorithm.supports_chunking() {
            return reject("chunking is not supported");
        }
        if self.thread_count > 1 && !algorithm.supports_threads() {
            return reject("thread_count > 1 requires the threaded algorithm");
        }
        if !algorithm.supports_line_layout(self.line_layout) {
            return reject(&format!("line layout {} is not supported", self.line_layout));
        }
        if !algorithm.supports_fill_layout(self.fill_layout) {
            return reject(&format!("fill layout {} is not supported", self.fill_layout));
        }

        Ok(())
    }

    /// Worker count the threaded algorithm will use.
    pub fn resolved_thread_count(&self) -> usize {
        if !self.algorithm.supports_threads() {
            return 1;
        }
        if self.thread_count > 0 {
            self.thread_count
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}
