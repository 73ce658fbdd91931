//! Common test fixtures for contouring tests.
//!
//! Small hand-checkable grids with known contours, plus larger fields used by
//! the chunking and threading tests.

use crate::generators::{create_gaussian_hills, create_peak_grid, Hill};

/// Raw grid data: index-space coordinates unless `x`/`y` are set.
#[derive(Debug, Clone, PartialEq)]
pub struct GridFixture {
    pub nx: usize,
    pub ny: usize,
    pub x: Option<Vec<f64>>,
    pub y: Option<Vec<f64>>,
    pub z: Vec<f64>,
    /// `true` marks a masked node.
    pub mask: Option<Vec<bool>>,
}

impl GridFixture {
    pub fn new(nx: usize, ny: usize, z: Vec<f64>) -> Self {
        Self {
            nx,
            ny,
            x: None,
            y: None,
            z,
            mask: None,
        }
    }

    pub fn with_mask(mut self, mask: Vec<bool>) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn with_coords(mut self, x: Vec<f64>, y: Vec<f64>) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    /// Index-space x coordinates (`x = i`) when none are set.
    pub fn x_or_index(&self) -> Vec<f64> {
        self.x
            .clone()
            .unwrap_or_else(|| (0..self.nx * self.ny).map(|idx| (idx % self.nx) as f64).collect())
    }

    /// Index-space y coordinates (`y = j`) when none are set.
    pub fn y_or_index(&self) -> Vec<f64> {
        self.y
            .clone()
            .unwrap_or_else(|| (0..self.nx * self.ny).map(|idx| (idx / self.nx) as f64).collect())
    }
}

/// 2x2 grid, bottom row 0 and top row 1. Level 0.5 gives one open line from
/// `(0, 0.5)` to `(1, 0.5)`.
pub fn single_quad_ramp() -> GridFixture {
    GridFixture::new(2, 2, vec![0.0, 0.0, 1.0, 1.0])
}

/// 3x3 grid of zeros with 2 at the centre. Level 1 gives one closed line
/// through the midpoints of the four centre edges.
pub fn central_peak() -> GridFixture {
    let mut z = vec![0.0; 9];
    z[4] = 2.0;
    GridFixture::new(3, 3, z)
}

/// [`central_peak`] with node `(0, 0)` masked.
pub fn central_peak_corner_masked() -> GridFixture {
    let mut mask = vec![false; 9];
    mask[0] = true;
    central_peak().with_mask(mask)
}

/// 2x2 saddle: nodes (0, 0) and (1, 1) high, the other two low.
pub fn saddle() -> GridFixture {
    GridFixture::new(2, 2, vec![1.0, 0.0, 0.0, 1.0])
}

/// 3x3 integer field whose nodes sit exactly on levels 1 and 2. With
/// quad-as-triangles, the band `[1, 2)` collapses onto the top and right
/// edges of the upper-right quad.
pub fn integer_ties() -> GridFixture {
    GridFixture::new(3, 3, vec![3.0, 3.0, 2.0, 3.0, 0.0, 1.0, 0.0, 1.0, 1.0])
}

/// Two separated peaks and a basin on a 41x31 grid.
pub fn hills_and_basin() -> GridFixture {
    let hills = [
        Hill {
            cx: 10.0,
            cy: 10.0,
            amplitude: 3.0,
            sigma: 4.0,
        },
        Hill {
            cx: 28.0,
            cy: 18.0,
            amplitude: 2.0,
            sigma: 5.0,
        },
        Hill {
            cx: 30.0,
            cy: 6.0,
            amplitude: -1.5,
            sigma: 3.0,
        },
    ];
    GridFixture::new(41, 31, create_gaussian_hills(41, 31, &hills))
}

/// A radial peak of height 10 on a 21x21 grid with a 3x3 block of nodes
/// masked around `(15, 10)`. The band `[2, 8)` is one polygon with two holes.
pub fn peak_with_masked_disc() -> GridFixture {
    let (nx, ny) = (21, 21);
    let mask = crate::generators::create_disc_mask(nx, ny, 15.0, 10.0, 1.5);
    GridFixture::new(nx, ny, create_peak_grid(nx, ny, 10.0)).with_mask(mask)
}

/// Common level sets.
pub mod levels {
    /// Levels spanning [`super::hills_and_basin`].
    pub const HILLS: [f64; 6] = [-1.0, -0.5, 0.5, 1.0, 1.5, 2.5];

    /// Levels spanning a unit-height field.
    pub const UNIT: [f64; 5] = [0.1, 0.3, 0.5, 0.7, 0.9];
}
