//! Error types for contour generation.

use thiserror::Error;

/// Errors that can occur while building a generator or running a query.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContourError {
    /// Coordinate, value or mask arrays disagree on the grid shape.
    #[error("shape mismatch for {array}: expected {expected} elements, got {actual}")]
    ShapeMismatch {
        array: String,
        expected: usize,
        actual: usize,
    },

    /// The grid has fewer than two nodes along an axis.
    #[error("degenerate grid {nx}x{ny}: at least 2x2 nodes are required")]
    DegenerateGrid { nx: usize, ny: usize },

    /// A requested level or band is unusable.
    #[error("invalid level: {0}")]
    InvalidLevel(String),

    /// The selected algorithm does not accept this configuration.
    #[error("unsupported configuration for {algorithm}: {message}")]
    UnsupportedConfig { algorithm: String, message: String },

    /// Grid values the selected interpolation cannot handle.
    #[error("invalid z values: {0}")]
    InvalidValues(String),

    /// Another query is already running on the same generator.
    #[error("a query is already in progress on this generator")]
    QueryInProgress,

    /// The worker pool could not be created.
    #[error("worker pool error: {0}")]
    ThreadPool(String),

    /// Tracing failed inside a chunk.
    #[error("chunk {chunk} failed: {message}")]
    ChunkFailed { chunk: usize, message: String },
}

impl ContourError {
    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(array: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            array: array.into(),
            expected,
            actual,
        }
    }

    /// Create an InvalidLevel error.
    pub fn invalid_level(msg: impl Into<String>) -> Self {
        Self::InvalidLevel(msg.into())
    }

    /// Create an UnsupportedConfig error.
    pub fn unsupported(algorithm: impl std::fmt::Display, msg: impl Into<String>) -> Self {
        Self::UnsupportedConfig {
            algorithm: algorithm.to_string(),
            message: msg.into(),
        }
    }

    /// Create a ChunkFailed error.
    pub fn chunk_failed(chunk: usize, msg: impl Into<String>) -> Self {
        Self::ChunkFailed {
            chunk,
            message: msg.into(),
        }
    }

    /// Stable identifier for the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ShapeMismatch { .. } => "ShapeMismatch",
            Self::DegenerateGrid { .. } => "DegenerateGrid",
            Self::InvalidLevel(_) => "InvalidLevel",
            Self::UnsupportedConfig { .. } => "UnsupportedConfig",
            Self::InvalidValues(_) => "InvalidValues",
            Self::QueryInProgress => "QueryInProgress",
            Self::ThreadPool(_) => "ThreadPool",
            Self::ChunkFailed { .. } => "ChunkFailed",
        }
    }

    /// Whether the error was raised by input validation (before any chunk ran).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ShapeMismatch { .. }
                | Self::DegenerateGrid { .. }
                | Self::InvalidLevel(_)
                | Self::UnsupportedConfig { .. }
                | Self::InvalidValues(_)
        )
    }
}

impl From<rayon::ThreadPoolBuildError> for ContourError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Self::ThreadPool(err.to_string())
    }
}

/// Result type for contour operations.
pub type Result<T> = std::result::Result<T, ContourError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ContourError::shape_mismatch("z", 4, 3).kind(),
            "ShapeMismatch"
        );
        assert_eq!(
            ContourError::DegenerateGrid { nx: 1, ny: 5 }.kind(),
            "DegenerateGrid"
        );
        assert_eq!(ContourError::QueryInProgress.kind(), "QueryInProgress");
    }

    #[test]
    fn test_validation_classification() {
        assert!(ContourError::invalid_level("nan").is_validation());
        assert!(ContourError::unsupported("serial", "threads").is_validation());
        assert!(!ContourError::chunk_failed(3, "open ring").is_validation());
        assert!(!ContourError::QueryInProgress.is_validation());
    }

    #[test]
    fn test_error_messages() {
        let err = ContourError::shape_mismatch("mask", 9, 8);
        assert_eq!(
            err.to_string(),
            "shape mismatch for mask: expected 9 elements, got 8"
        );

        let err = ContourError::unsupported("mpl2005", "corner_mask is not supported");
        assert_eq!(
            err.to_string(),
            "unsupported configuration for mpl2005: corner_mask is not supported"
        );
    }
}
