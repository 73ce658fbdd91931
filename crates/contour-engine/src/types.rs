//! Core value types shared by the tracing pipeline and the encoder.

use serde::{Deserialize, Serialize};

/// A point in grid coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A position in index space: node (i, j) sits at (i, j), a quad centre at
/// (i + 0.5, j + 0.5). Orientation and nesting are decided here because the
/// lattice is always right-handed, whatever the geometric coordinates do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatticePoint {
    pub i: f64,
    pub j: f64,
}

impl LatticePoint {
    pub fn new(i: f64, j: f64) -> Self {
        Self { i, j }
    }
}

/// Axis-aligned bounds of the valid input coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// An inverted box that any `include` call will replace.
    pub fn empty() -> Self {
        Self::new(
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        )
    }

    /// Grow the box to include a point.
    pub fn include(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Check if a point is contained (boundary inclusive).
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.min_x
            && point.x <= self.max_x
            && point.y >= self.min_y
            && point.y <= self.max_y
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }
}

/// Path codes in the spirit of standard 2-D path encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PathCode {
    MoveTo = 1,
    LineTo = 2,
    ClosePoly = 79,
}

impl PathCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Role of a ring within a filled polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RingKind {
    Outer,
    Hole,
}

/// Which threshold of a query a crossing belongs to. Line queries only use
/// `Lower`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bound {
    Lower,
    Upper,
}
