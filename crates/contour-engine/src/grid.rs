//! Grid model: node coordinates, values and the derived per-quad mask.
//!
//! Nodes are stored row-major, node `(i, j)` at `j * nx + i`. Quad `(i, j)`
//! has corners `(i, j), (i+1, j), (i+1, j+1), (i, j+1)`, counter-clockwise in
//! index space, numbered 0 to 3.

use crate::config::ZInterp;
use crate::error::{ContourError, Result};
use crate::types::{BoundingBox, LatticePoint, Point};

/// Validated input grid.
#[derive(Debug, Clone)]
pub struct ContourGrid {
    nx: usize,
    ny: usize,
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
    valid: Vec<bool>,
    bounds: BoundingBox,
}

impl ContourGrid {
    /// Build a grid from flat row-major arrays of `nx * ny` elements.
    ///
    /// `mask` marks invalid nodes with `true`. Nodes with NaN `z` or non-finite
    /// coordinates are invalid as well.
    pub fn new(
        nx: usize,
        ny: usize,
        x: Vec<f64>,
        y: Vec<f64>,
        z: Vec<f64>,
        mask: Option<Vec<bool>>,
    ) -> Result<Self> {
        if nx < 2 || ny < 2 {
            return Err(ContourError::DegenerateGrid { nx, ny });
        }
        let n = nx
            .checked_mul(ny)
            .ok_or(ContourError::DegenerateGrid { nx, ny })?;

        for (name, len) in [("x", x.len()), ("y", y.len()), ("z", z.len())] {
            if len != n {
                return Err(ContourError::shape_mismatch(name, n, len));
            }
        }
        if let Some(mask) = &mask {
            if mask.len() != n {
                return Err(ContourError::shape_mismatch("mask", n, mask.len()));
            }
        }

        let mut valid = Vec::with_capacity(n);
        let mut bounds = BoundingBox::empty();
        for idx in 0..n {
            let finite_xy = x[idx].is_finite() && y[idx].is_finite();
            if finite_xy {
                bounds.include(x[idx], y[idx]);
            }
            let masked = mask.as_ref().map_or(false, |m| m[idx]);
            valid.push(finite_xy && !z[idx].is_nan() && !masked);
        }

        Ok(Self {
            nx,
            ny,
            x,
            y,
            z,
            valid,
            bounds,
        })
    }

    /// Build a grid whose coordinates are the node indices (x = i, y = j).
    pub fn from_z(nx: usize, ny: usize, z: Vec<f64>, mask: Option<Vec<bool>>) -> Result<Self> {
        let n = nx.saturating_mul(ny);
        let x = (0..n).map(|idx| (idx % nx.max(1)) as f64).collect();
        let y = (0..n).map(|idx| (idx / nx.max(1)) as f64).collect();
        Self::new(nx, ny, x, y, z, mask)
    }

    /// Build a grid from 1-D axes: `x_axis` has `nx` entries, `y_axis` has `ny`.
    pub fn from_axes(
        x_axis: &[f64],
        y_axis: &[f64],
        z: Vec<f64>,
        mask: Option<Vec<bool>>,
    ) -> Result<Self> {
        let (nx, ny) = (x_axis.len(), y_axis.len());
        let mut x = Vec::with_capacity(nx * ny);
        let mut y = Vec::with_capacity(nx * ny);
        for &yv in y_axis {
            for &xv in x_axis {
                x.push(xv);
                y.push(yv);
            }
        }
        Self::new(nx, ny, x, y, z, mask)
    }

    /// Build a grid from `ny` rows of `nx` values each. Ragged rows are a
    /// shape mismatch.
    pub fn from_rows(
        x: &[Vec<f64>],
        y: &[Vec<f64>],
        z: &[Vec<f64>],
        mask: Option<&[Vec<bool>]>,
    ) -> Result<Self> {
        let ny = z.len();
        let nx = z.first().map_or(0, |row| row.len());
        if nx < 2 || ny < 2 {
            return Err(ContourError::DegenerateGrid { nx, ny });
        }

        fn flatten<T: Copy>(name: &str, rows: &[Vec<T>], nx: usize, ny: usize) -> Result<Vec<T>> {
            if rows.len() != ny {
                return Err(ContourError::shape_mismatch(
                    format!("{name} rows"),
                    ny,
                    rows.len(),
                ));
            }
            let mut flat = Vec::with_capacity(nx * ny);
            for (j, row) in rows.iter().enumerate() {
                if row.len() != nx {
                    return Err(ContourError::shape_mismatch(
                        format!("{name} row {j}"),
                        nx,
                        row.len(),
                    ));
                }
                flat.extend_from_slice(row);
            }
            Ok(flat)
        }

        let xf = flatten("x", x, nx, ny)?;
        let yf = flatten("y", y, nx, ny)?;
        let zf = flatten("z", z, nx, ny)?;
        let mf = mask.map(|m| flatten("mask", m, nx, ny)).transpose()?;
        Self::new(nx, ny, xf, yf, zf, mf)
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.z.len()
    }

    pub fn is_empty(&self) -> bool {
        self.z.is_empty()
    }

    /// Quads along x.
    pub fn nx_quads(&self) -> usize {
        self.nx - 1
    }

    /// Quads along y.
    pub fn ny_quads(&self) -> usize {
        self.ny - 1
    }

    pub fn quad_count(&self) -> usize {
        self.nx_quads() * self.ny_quads()
    }

    pub fn node_index(&self, i: usize, j: usize) -> usize {
        j * self.nx + i
    }

    pub fn node_ij(&self, node: usize) -> (usize, usize) {
        (node % self.nx, node / self.nx)
    }

    pub fn quad_index(&self, i: usize, j: usize) -> usize {
        j * self.nx_quads() + i
    }

    pub fn quad_ij(&self, quad: usize) -> (usize, usize) {
        (quad % self.nx_quads(), quad / self.nx_quads())
    }

    /// Corner node indices of a quad, counter-clockwise from `(i, j)`.
    pub fn quad_corners(&self, quad: usize) -> [usize; 4] {
        let (i, j) = self.quad_ij(quad);
        let c0 = self.node_index(i, j);
        [c0, c0 + 1, c0 + self.nx + 1, c0 + self.nx]
    }

    pub fn x(&self, node: usize) -> f64 {
        self.x[node]
    }

    pub fn y(&self, node: usize) -> f64 {
        self.y[node]
    }

    pub fn z(&self, node: usize) -> f64 {
        self.z[node]
    }

    pub fn is_valid(&self, node: usize) -> bool {
        self.valid[node]
    }

    /// Bounds of all nodes with finite coordinates.
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// Range of valid z values, `None` when every node is invalid.
    pub fn z_range(&self) -> Option<(f64, f64)> {
        let mut range: Option<(f64, f64)> = None;
        for (idx, &z) in self.z.iter().enumerate() {
            if self.valid[idx] {
                range = Some(match range {
                    Some((lo, hi)) => (lo.min(z), hi.max(z)),
                    None => (z, z),
                });
            }
        }
        range
    }
}

/// How a quad takes part in tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuadKind {
    /// At least one corner is invalid and the quad is skipped.
    Invalid,
    /// All four corners are valid.
    Full,
    /// Exactly one corner (0-3) is invalid; the other three form a triangle.
    Corner(u8),
}

/// Per-quad validity derived once from the node mask.
#[derive(Debug, Clone)]
pub struct QuadMask {
    kinds: Vec<QuadKind>,
}

impl QuadMask {
    pub fn build(grid: &ContourGrid, corner_mask: bool) -> Self {
        let kinds = (0..grid.quad_count())
            .map(|quad| {
                let corners = grid.quad_corners(quad);
                let mut invalid = corners
                    .iter()
                    .enumerate()
                    .filter(|(_, node)| !grid.is_valid(**node))
                    .map(|(k, _)| k as u8);
                match (invalid.next(), invalid.next()) {
                    (None, _) => QuadKind::Full,
                    (Some(k), None) if corner_mask => QuadKind::Corner(k),
                    _ => QuadKind::Invalid,
                }
            })
            .collect();
        Self { kinds }
    }

    pub fn kind(&self, quad: usize) -> QuadKind {
        self.kinds[quad]
    }

    /// Number of quads that produce at least one facet.
    pub fn active_count(&self) -> usize {
        self.kinds
            .iter()
            .filter(|k| **k != QuadKind::Invalid)
            .count()
    }

    /// Whether the quad's facets include the grid edge between two of its
    /// corner nodes.
    pub fn covers_edge(&self, quad: usize, corners: &[usize; 4], a: usize, b: usize) -> bool {
        match self.kinds[quad] {
            QuadKind::Invalid => false,
            QuadKind::Full => true,
            QuadKind::Corner(k) => {
                let missing = corners[k as usize];
                missing != a && missing != b
            }
        }
    }
}

/// A facet vertex: a grid node or the synthetic centre of a quad.
///
/// The derived order (all nodes before all centres) is the canonical
/// endpoint order used for interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Vertex {
    Node(usize),
    Center(usize),
}

/// Immutable model shared read-only by all chunk workers of a query.
#[derive(Debug)]
pub struct GridModel {
    grid: ContourGrid,
    values: Vec<f64>,
    mask: QuadMask,
    quad_as_tri: bool,
    z_interp: ZInterp,
}

impl GridModel {
    pub fn new(
        grid: ContourGrid,
        corner_mask: bool,
        quad_as_tri: bool,
        z_interp: ZInterp,
    ) -> Result<Self> {
        let values = match z_interp {
            ZInterp::Linear => grid.z.clone(),
            ZInterp::Log => {
                let mut values = Vec::with_capacity(grid.len());
                for (idx, &z) in grid.z.iter().enumerate() {
                    if grid.valid[idx] && z <= 0.0 {
                        return Err(ContourError::InvalidValues(format!(
                            "log interpolation needs positive z, node {idx} has {z}"
                        )));
                    }
                    values.push(if grid.valid[idx] { z.ln() } else { f64::NAN });
                }
                values
            }
        };
        let mask = QuadMask::build(&grid, corner_mask);

        Ok(Self {
            grid,
            values,
            mask,
            quad_as_tri,
            z_interp,
        })
    }

    pub fn grid(&self) -> &ContourGrid {
        &self.grid
    }

    pub fn mask(&self) -> &QuadMask {
        &self.mask
    }

    pub fn quad_as_tri(&self) -> bool {
        self.quad_as_tri
    }

    /// Map a user level into the interpolation space.
    pub fn transform_level(&self, level: f64) -> Result<f64> {
        if level.is_nan() {
            return Err(ContourError::invalid_level("level is NaN"));
        }
        match self.z_interp {
            ZInterp::Linear => Ok(level),
            ZInterp::Log => {
                if level <= 0.0 {
                    return Err(ContourError::invalid_level(format!(
                        "log interpolation needs positive levels, got {level}"
                    )));
                }
                Ok(level.ln())
            }
        }
    }

    /// Value of a vertex in interpolation space.
    pub fn value(&self, vertex: Vertex) -> f64 {
        match vertex {
            Vertex::Node(node) => self.values[node],
            Vertex::Center(quad) => {
                let c = self.grid.quad_corners(quad);
                0.25 * (self.values[c[0]] + self.values[c[1]] + self.values[c[2]] + self.values[c[3]])
            }
        }
    }

    pub fn position(&self, vertex: Vertex) -> Point {
        match vertex {
            Vertex::Node(node) => Point::new(self.grid.x[node], self.grid.y[node]),
            Vertex::Center(quad) => {
                let c = self.grid.quad_corners(quad);
                let x = &self.grid.x;
                let y = &self.grid.y;
                Point::new(
                    0.25 * (x[c[0]] + x[c[1]] + x[c[2]] + x[c[3]]),
                    0.25 * (y[c[0]] + y[c[1]] + y[c[2]] + y[c[3]]),
                )
            }
        }
    }

    pub fn lattice(&self, vertex: Vertex) -> LatticePoint {
        match vertex {
            Vertex::Node(node) => {
                let (i, j) = self.grid.node_ij(node);
                LatticePoint::new(i as f64, j as f64)
            }
            Vertex::Center(quad) => {
                let (i, j) = self.grid.quad_ij(quad);
                LatticePoint::new(i as f64 + 0.5, j as f64 + 0.5)
            }
        }
    }

    /// Crossing of `level` on the edge between two vertices.
    ///
    /// The endpoints are put in canonical order first, so every facet and
    /// chunk sharing the edge computes bit-identical results.
    pub fn interpolate(&self, a: Vertex, b: Vertex, level: f64) -> (Point, LatticePoint) {
        let (a, b, t) = self.edge_fraction(a, b, level);
        let (pa, pb) = (self.position(a), self.position(b));
        let (la, lb) = (self.lattice(a), self.lattice(b));
        (
            Point::new(lerp_clamped(pa.x, pb.x, t), lerp_clamped(pa.y, pb.y, t)),
            LatticePoint::new(la.i + t * (lb.i - la.i), la.j + t * (lb.j - la.j)),
        )
    }

    /// The edge vertex a crossing of `level` lands on exactly, if any.
    pub fn crossing_vertex(&self, a: Vertex, b: Vertex, level: f64) -> Option<Vertex> {
        let (a, b, t) = self.edge_fraction(a, b, level);
        if t == 0.0 {
            Some(a)
        } else if t == 1.0 {
            Some(b)
        } else {
            None
        }
    }

    /// Canonically ordered edge endpoints and the clamped fraction of the way
    /// from the first to the second at which `level` is reached.
    fn edge_fraction(&self, a: Vertex, b: Vertex, level: f64) -> (Vertex, Vertex, f64) {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        let (za, zb) = (self.value(a), self.value(b));
        let mut t = (level - za) / (zb - za);
        if !t.is_finite() {
            t = 0.5;
        }
        (a, b, t.clamp(0.0, 1.0))
    }
}

#[inline]
fn lerp_clamped(a: f64, b: f64, t: f64) -> f64 {
    let v = a + t * (b - a);
    v.clamp(a.min(b), a.max(b))
}
