//! Cell classification (marching squares).
//!
//! A cell is processed as one or more convex facets: the quad itself, the
//! triangle left by a corner-masked quad, or the four triangles of a quad
//! split around its centre. Facet vertices are listed counter-clockwise in
//! index space and facet edge `k` runs from vertex `k` to vertex `k + 1`.
//!
//! Bit `k` of a facet code is set when vertex `k` has `z >= level`. Every
//! segment is directed from the edge where the walk leaves the above region
//! to the edge where it re-enters it, which keeps the above side on the left.

use crate::grid::{GridModel, QuadKind, Vertex};

/// Identity of a facet edge, shared by the facets (and chunks) on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdgeKey {
    /// Grid edge from node `n` to node `n + 1`.
    Horizontal(usize),
    /// Grid edge from node `n` to node `n + nx`.
    Vertical(usize),
    /// Quad diagonal between corners 0 and 2.
    Diagonal(usize),
    /// Quad diagonal between corners 1 and 3.
    AntiDiagonal(usize),
    /// Edge from a quad centre to one of its corners.
    Spoke(usize, u8),
}

/// Pseudo corner index used for the quad centre.
const CENTER: u8 = 4;

/// A convex polygon a cell is traced as.
#[derive(Debug, Clone, Copy)]
pub struct Facet {
    pub quad: usize,
    /// Position of the facet within its quad (0 unless quad-as-triangles).
    pub index: u8,
    vertices: [Vertex; 4],
    edges: [EdgeKey; 4],
    len: u8,
}

impl Facet {
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_triangle(&self) -> bool {
        self.len == 3
    }

    /// Endpoints of edge `k`, in facet order.
    pub fn edge(&self, k: usize) -> (Vertex, Vertex) {
        let n = self.len as usize;
        (self.vertices[k % n], self.vertices[(k + 1) % n])
    }

    pub fn edge_key(&self, k: usize) -> EdgeKey {
        self.edges[k % self.len as usize]
    }

    /// Identifier unique across the grid.
    pub fn id(&self) -> u64 {
        self.quad as u64 * 4 + self.index as u64
    }
}

// Directed (from_edge, to_edge) pairs per 4-bit quad code. Saddles 0101 and
// 1010 list the joined topology; `quad_segments` swaps in the split one.
const QUAD_SEGMENTS: [&[(u8, u8)]; 16] = [
    &[],
    &[(0, 3)],
    &[(1, 0)],
    &[(1, 3)],
    &[(2, 1)],
    &[(0, 1), (2, 3)],
    &[(2, 0)],
    &[(2, 3)],
    &[(3, 2)],
    &[(0, 2)],
    &[(1, 2), (3, 0)],
    &[(1, 2)],
    &[(3, 1)],
    &[(0, 1)],
    &[(3, 0)],
    &[],
];

const SADDLE_0101_SPLIT: &[(u8, u8)] = &[(0, 3), (2, 1)];
const SADDLE_1010_SPLIT: &[(u8, u8)] = &[(1, 0), (3, 2)];

const TRIANGLE_SEGMENTS: [&[(u8, u8)]; 8] = [
    &[],
    &[(0, 2)],
    &[(1, 0)],
    &[(1, 2)],
    &[(2, 1)],
    &[(0, 1)],
    &[(2, 0)],
    &[],
];

/// Corner code of a facet: bit `k` set when `values[k] >= level`.
///
/// Ties count as above, a fixed rule that keeps classification independent of
/// scan order.
pub fn corner_code(values: &[f64], level: f64) -> u8 {
    values
        .iter()
        .enumerate()
        .fold(0u8, |code, (k, &v)| if v >= level { code | (1 << k) } else { code })
}

/// Whether a quad code is one of the two ambiguous saddles.
pub fn is_saddle(code: u8) -> bool {
    code == 0b0101 || code == 0b1010
}

/// Saddle resolution: the above-level corners are joined through the cell
/// when the mean of the four corners is at or above the level.
pub fn saddle_joined(values: [f64; 4], level: f64) -> bool {
    0.25 * (values[0] + values[1] + values[2] + values[3]) >= level
}

/// Segments of a quad for a code, with the saddle topology chosen by `joined`.
pub fn quad_segments(code: u8, joined: bool) -> &'static [(u8, u8)] {
    match (code & 0xF, joined) {
        (0b0101, false) => SADDLE_0101_SPLIT,
        (0b1010, false) => SADDLE_1010_SPLIT,
        (code, _) => QUAD_SEGMENTS[code as usize],
    }
}

/// Segments of a triangle for a 3-bit code. Triangles have no saddles.
pub fn triangle_segments(code: u8) -> &'static [(u8, u8)] {
    TRIANGLE_SEGMENTS[(code & 0x7) as usize]
}

/// Classifies the facets of a grid against a level.
#[derive(Debug, Clone, Copy)]
pub struct CellClassifier<'a> {
    model: &'a GridModel,
}

impl<'a> CellClassifier<'a> {
    pub fn new(model: &'a GridModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &'a GridModel {
        self.model
    }

    /// Append the facets of a quad to `out`. Invalid quads add nothing.
    pub fn facets(&self, quad: usize, out: &mut Vec<Facet>) {
        let grid = self.model.grid();
        let corners = grid.quad_corners(quad);
        let vertex = |k: u8| {
            if k == CENTER {
                Vertex::Center(quad)
            } else {
                Vertex::Node(corners[k as usize])
            }
        };
        let make = |index: u8, ks: &[u8]| {
            let mut facet = Facet {
                quad,
                index,
                vertices: [Vertex::Center(quad); 4],
                edges: [EdgeKey::Spoke(quad, 0); 4],
                len: ks.len() as u8,
            };
            for (slot, &k) in ks.iter().enumerate() {
                let next = ks[(slot + 1) % ks.len()];
                facet.vertices[slot] = vertex(k);
                facet.edges[slot] = self.quad_edge_key(quad, &corners, k, next);
            }
            facet
        };

        match self.model.mask().kind(quad) {
            QuadKind::Invalid => {}
            QuadKind::Full if self.model.quad_as_tri() => {
                for k in 0..4u8 {
                    out.push(make(k, &[k, (k + 1) % 4, CENTER]));
                }
            }
            QuadKind::Full => out.push(make(0, &[0, 1, 2, 3])),
            QuadKind::Corner(missing) => {
                let ks = [(missing + 1) % 4, (missing + 2) % 4, (missing + 3) % 4];
                out.push(make(0, &ks));
            }
        }
    }

    fn quad_edge_key(&self, quad: usize, corners: &[usize; 4], a: u8, b: u8) -> EdgeKey {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        match (lo, hi) {
            (0, 1) => EdgeKey::Horizontal(corners[0]),
            (2, 3) => EdgeKey::Horizontal(corners[3]),
            (1, 2) => EdgeKey::Vertical(corners[1]),
            (0, 3) => EdgeKey::Vertical(corners[0]),
            (0, 2) => EdgeKey::Diagonal(quad),
            (1, 3) => EdgeKey::AntiDiagonal(quad),
            (k, _) => EdgeKey::Spoke(quad, k),
        }
    }

    /// Facet vertex values in interpolation space.
    pub fn values(&self, facet: &Facet) -> [f64; 4] {
        let mut values = [f64::NAN; 4];
        for (slot, &v) in facet.vertices().iter().enumerate() {
            values[slot] = self.model.value(v);
        }
        values
    }

    pub fn code(&self, facet: &Facet, level: f64) -> u8 {
        corner_code(&self.values(facet)[..facet.len()], level)
    }

    /// Directed segments of a facet at a level as (from_edge, to_edge) pairs.
    pub fn segments(&self, facet: &Facet, level: f64) -> &'static [(u8, u8)] {
        let values = self.values(facet);
        let code = corner_code(&values[..facet.len()], level);
        if facet.is_triangle() {
            triangle_segments(code)
        } else {
            quad_segments(code, !is_saddle(code) || saddle_joined(values, level))
        }
    }
}
