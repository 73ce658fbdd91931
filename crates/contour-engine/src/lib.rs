//! Contour Lines and Filled Bands on Structured Quad Grids
//!
//! This crate extracts isolines and isobands from a scalar field sampled on a
//! structured quadrilateral grid. It supports:
//!
//! - **Masking**: NaN and explicitly masked nodes, with optional corner
//!   triangles for quads missing a single corner
//! - **Chunking**: rectangular tiles traced independently, optionally on a
//!   worker pool, then stitched into chunk-independent output
//! - **Output layouts**: separate arrays or per-chunk combined arrays, with
//!   offsets or path codes
//!
//! # Architecture
//!
//! ```text
//! ContourGenerator::lines(level) / filled(lower, upper)
//!      │
//!      ├─► Validate level(s) against the grid model
//!      │
//!      ├─► Scheduler: one task per chunk (serial or rayon pool)
//!      │         │
//!      │         ├─► CellClassifier: facet codes, marching-squares table
//!      │         │
//!      │         ├─► Pieces: contour segments [+ band boundary edges]
//!      │         │
//!      │         └─► (lines, chunked fill) Tracer: link pieces by vertex key
//!      │
//!      ├─► Merge: stitch line fragments across chunks, canonical order
//!      │         │
//!      │         └─► (filled) trace all pieces, rings: outer/hole, nest holes
//!      │
//!      └─► Encoder: requested layout
//! ```
//!
//! # Example
//!
//! ```
//! use contour_engine::{ContourGenerator, ContourGrid, GeneratorConfig};
//!
//! let grid = ContourGrid::from_z(2, 2, vec![0.0, 0.0, 1.0, 1.0], None)?;
//! let generator = ContourGenerator::new(grid, GeneratorConfig::default())?;
//!
//! let lines = generator.lines(0.5)?;
//! assert_eq!(lines.line_count(), 1);
//!
//! let bands = generator.filled(Some(0.25), Some(0.75))?;
//! assert_eq!(bands.polygon_count(), 1);
//! # Ok::<(), contour_engine::ContourError>(())
//! ```

pub mod chunk;
pub mod classify;
pub mod config;
pub mod encode;
pub mod error;
pub mod fill;
pub mod generator;
pub mod grid;
pub mod scheduler;
pub mod trace;
pub mod types;

// Re-export commonly used types at crate root
pub use chunk::{Chunk, ChunkLayout};
pub use config::{Algorithm, ChunkSpec, FillLayout, GeneratorConfig, LineLayout, ZInterp};
pub use encode::{
    CodedFill, CodedLines, CodedPolygon, EncodedFill, EncodedLines, OffsetFill, OffsetLines,
    Polygon,
};
pub use error::{ContourError, Result};
pub use generator::{
    strategy_for, ContourGenerator, ContourStrategy, LegacyStrategy, SerialStrategy,
    ThreadedStrategy,
};
pub use grid::ContourGrid;
pub use types::{BoundingBox, PathCode, Point, RingKind};
