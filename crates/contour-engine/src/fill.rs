//! Filled bands: ring pieces, ring classification and hole nesting.
//!
//! The band `[lower, upper)` is kept on the left of every piece, so traced
//! rings run counter-clockwise around filled area and clockwise around holes
//! in index space. Pieces come from three sources:
//!
//! - contour segments at `lower`, in line direction
//! - contour segments at `upper`, reversed
//! - the within-band part of facet edges on the domain boundary
//!
//! Edges shared by two facets of the same region are never emitted. Where a
//! level passes exactly through facet vertices, a band can still collapse onto
//! an edge; the two opposite pieces along it are cancelled before tracing.

use std::collections::HashMap;

use crate::chunk::{Chunk, ChunkLayout};
use crate::classify::{CellClassifier, EdgeKey, Facet};
use crate::error::{ContourError, Result};
use crate::grid::{GridModel, Vertex};
use crate::trace::{canonicalize, trace, Endpoint, Piece, PieceSink, TracedLine, VertexKey};
use crate::types::{Bound, LatticePoint, Point, RingKind};

/// Offset of a nesting test point from a hole edge, relative to the edge
/// length.
const INTERIOR_OFFSET: f64 = 1e-6;

/// A band in interpolation space; `None` bounds are unbounded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Below,
    Within,
    Above,
}

impl Band {
    pub fn new(lower: Option<f64>, upper: Option<f64>) -> Self {
        Self { lower, upper }
    }

    fn classify(&self, value: f64) -> Class {
        if self.lower.is_some_and(|l| value < l) {
            Class::Below
        } else if self.upper.is_some_and(|u| value >= u) {
            Class::Above
        } else {
            Class::Within
        }
    }
}

/// Which facet edges close rings.
#[derive(Debug, Clone, Copy)]
pub struct Boundary<'a> {
    layout: &'a ChunkLayout,
    /// Close rings along chunk edges (chunked output layouts).
    close_at_chunk: bool,
}

impl<'a> Boundary<'a> {
    pub fn new(layout: &'a ChunkLayout, close_at_chunk: bool) -> Self {
        Self {
            layout,
            close_at_chunk,
        }
    }

    /// Whether edge `k` of a facet has no facet of the same chunk region on
    /// its other side.
    fn is_boundary(&self, model: &GridModel, chunk: &Chunk, facet: &Facet, k: usize) -> bool {
        let grid = model.grid();
        let (qi, qj) = grid.quad_ij(facet.quad);
        let neighbour = match facet.edge_key(k) {
            EdgeKey::Diagonal(_) | EdgeKey::AntiDiagonal(_) => return true,
            EdgeKey::Spoke(..) => return false,
            EdgeKey::Horizontal(node) => {
                let (i, j) = grid.node_ij(node);
                if qj == j {
                    j.checked_sub(1).map(|nj| (i, nj))
                } else {
                    (j < grid.ny_quads()).then_some((i, j))
                }
            }
            EdgeKey::Vertical(node) => {
                let (i, j) = grid.node_ij(node);
                if qi == i {
                    i.checked_sub(1).map(|ni| (ni, j))
                } else {
                    (i < grid.nx_quads()).then_some((i, j))
                }
            }
        };
        let Some((ni, nj)) = neighbour else {
            return true;
        };

        if self.close_at_chunk && self.layout.chunk_of_quad(ni, nj) != chunk.index {
            return true;
        }

        let (a, b) = match facet.edge(k) {
            (Vertex::Node(a), Vertex::Node(b)) => (a, b),
            _ => return false,
        };
        let nquad = grid.quad_index(ni, nj);
        !model
            .mask()
            .covers_edge(nquad, &grid.quad_corners(nquad), a, b)
    }
}

/// Ring pieces of every facet in a chunk, in scan order.
pub fn band_pieces(
    classifier: &CellClassifier<'_>,
    boundary: &Boundary<'_>,
    chunk: &Chunk,
    band: Band,
    out: &mut Vec<Piece>,
) {
    let model = classifier.model();
    let grid = model.grid();
    let mut facets = Vec::with_capacity(4);

    for (i, j) in chunk.quads() {
        let quad = grid.quad_index(i, j);
        facets.clear();
        classifier.facets(quad, &mut facets);

        let mut sink = PieceSink::new(out, quad);
        for facet in &facets {
            if let Some(lower) = band.lower {
                for &(from, to) in classifier.segments(facet, lower) {
                    sink.push(
                        facet,
                        Endpoint::crossing(model, facet, from as usize, lower, Bound::Lower),
                        Endpoint::crossing(model, facet, to as usize, lower, Bound::Lower),
                    );
                }
            }
            if let Some(upper) = band.upper {
                for &(from, to) in classifier.segments(facet, upper) {
                    sink.push(
                        facet,
                        Endpoint::crossing(model, facet, to as usize, upper, Bound::Upper),
                        Endpoint::crossing(model, facet, from as usize, upper, Bound::Upper),
                    );
                }
            }
            for k in 0..facet.len() {
                if boundary.is_boundary(model, chunk, facet, k) {
                    edge_piece(model, facet, k, band, &mut sink);
                }
            }
        }
    }
}

/// Within-band part of a boundary edge, traversed in facet order.
fn edge_piece(model: &GridModel, facet: &Facet, k: usize, band: Band, sink: &mut PieceSink<'_>) {
    let (a, b) = facet.edge(k);
    let (Vertex::Node(na), Vertex::Node(nb)) = (a, b) else {
        return;
    };
    let node = |n| Endpoint::node(model, n);
    let lower = |level: Option<f64>| {
        level.map(|l| Endpoint::crossing(model, facet, k, l, Bound::Lower))
    };
    let upper = |level: Option<f64>| {
        level.map(|u| Endpoint::crossing(model, facet, k, u, Bound::Upper))
    };

    let piece = match (band.classify(model.value(a)), band.classify(model.value(b))) {
        (Class::Within, Class::Within) => Some((node(na), node(nb))),
        (Class::Within, Class::Below) => lower(band.lower).map(|x| (node(na), x)),
        (Class::Within, Class::Above) => upper(band.upper).map(|x| (node(na), x)),
        (Class::Below, Class::Within) => lower(band.lower).map(|x| (x, node(nb))),
        (Class::Above, Class::Within) => upper(band.upper).map(|x| (x, node(nb))),
        (Class::Below, Class::Above) => lower(band.lower).zip(upper(band.upper)),
        (Class::Above, Class::Below) => upper(band.upper).zip(lower(band.lower)),
        (Class::Below, Class::Below) | (Class::Above, Class::Above) => None,
    };
    if let Some((from, to)) = piece {
        sink.push(facet, from, to);
    }
}

/// A closed ring of a filled band.
#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    pub points: Vec<Point>,
    pub lattice: Vec<LatticePoint>,
    pub kind: RingKind,
    /// Index of the enclosing outer ring for holes.
    pub parent: Option<usize>,
    /// Sequence of the ring's first piece.
    pub seq: u64,
    /// Signed index-space area.
    pub area: f64,
}

/// Rings of a band in encoding order: each outer ring followed by its holes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RingArena {
    rings: Vec<Ring>,
    /// Start of each polygon (outer ring index) in `rings`.
    outers: Vec<usize>,
}

impl RingArena {
    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    pub fn len(&self) -> usize {
        self.rings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    pub fn polygon_count(&self) -> usize {
        self.outers.len()
    }

    /// Rings of each polygon, outer first.
    pub fn polygons(&self) -> impl Iterator<Item = &[Ring]> + '_ {
        self.outers.iter().enumerate().map(|(p, &start)| {
            let end = self.outers.get(p + 1).copied().unwrap_or(self.rings.len());
            &self.rings[start..end]
        })
    }

    pub fn point_count(&self) -> usize {
        self.rings.iter().map(|r| r.points.len()).sum()
    }
}

/// Remove pairs of pieces that join the same two vertices in opposite
/// directions. Each piece cancels at most one earlier unmatched piece.
pub fn cancel_reversed(pieces: &mut Vec<Piece>) {
    let mut unmatched: HashMap<(VertexKey, VertexKey), Vec<usize>> = HashMap::new();
    let mut cancelled = vec![false; pieces.len()];
    for (idx, piece) in pieces.iter().enumerate() {
        let (from, to) = (piece.from.key, piece.to.key);
        match unmatched.get_mut(&(to, from)).and_then(|open| open.pop()) {
            Some(other) => {
                cancelled[other] = true;
                cancelled[idx] = true;
            }
            None => unmatched.entry((from, to)).or_default().push(idx),
        }
    }

    let mut idx = 0;
    pieces.retain(|_| {
        let keep = !cancelled[idx];
        idx += 1;
        keep
    });
}

/// Trace band pieces into rings and assemble them. Pieces are put in scan
/// order first, so the result does not depend on how they were collected.
pub fn rings_from_pieces(mut pieces: Vec<Piece>, chunk: usize) -> Result<RingArena> {
    pieces.sort_unstable_by_key(|p| p.seq);
    cancel_reversed(&mut pieces);
    let mut lines = trace(&pieces);
    canonicalize(&mut lines);
    assemble_rings(lines, chunk)
}

/// Classify traced rings as outer or hole and nest each hole under the
/// smallest outer ring containing it.
///
/// Lines must already be closed and in canonical order. `chunk` is only used
/// for error reporting.
pub fn assemble_rings(lines: Vec<TracedLine>, chunk: usize) -> Result<RingArena> {
    let mut outers = Vec::new();
    let mut holes = Vec::new();

    for line in lines {
        if !line.closed {
            return Err(ContourError::chunk_failed(
                chunk,
                format!("ring starting at piece {} is not closed", line.first_seq()),
            ));
        }
        let area = line.signed_area();
        if is_degenerate(&line.lattice, area) {
            tracing::warn!(
                chunk,
                seq = line.first_seq(),
                points = line.points.len(),
                "dropping degenerate ring"
            );
            continue;
        }
        let ring = Ring {
            seq: line.first_seq(),
            points: line.points,
            lattice: line.lattice,
            kind: if area > 0.0 {
                RingKind::Outer
            } else {
                RingKind::Hole
            },
            parent: None,
            area,
        };
        if area > 0.0 {
            outers.push(ring);
        } else {
            holes.push(ring);
        }
    }

    let bounds: Vec<_> = outers.iter().map(|r| lattice_bounds(&r.lattice)).collect();
    let mut children: Vec<Vec<Ring>> = vec![Vec::new(); outers.len()];
    for hole in holes {
        let parent = interior_points(&hole.lattice).find_map(|p| {
            outers
                .iter()
                .enumerate()
                .filter(|(idx, _)| bounds[*idx].contains(p))
                .filter(|(_, outer)| point_in_ring(p, &outer.lattice))
                .min_by(|(_, a), (_, b)| a.area.total_cmp(&b.area))
                .map(|(idx, _)| idx)
        });
        match parent {
            Some(idx) => children[idx].push(hole),
            None => {
                return Err(ContourError::chunk_failed(
                    chunk,
                    format!("hole starting at piece {} has no enclosing ring", hole.seq),
                ))
            }
        }
    }

    let mut arena = RingArena::default();
    for (outer, holes) in outers.into_iter().zip(children) {
        let parent = arena.rings.len();
        arena.outers.push(parent);
        arena.rings.push(outer);
        for mut hole in holes {
            hole.parent = Some(parent);
            arena.rings.push(hole);
        }
    }
    Ok(arena)
}

#[derive(Debug, Clone, Copy)]
struct LatticeBounds {
    min_i: f64,
    min_j: f64,
    max_i: f64,
    max_j: f64,
}

impl LatticeBounds {
    fn contains(&self, p: LatticePoint) -> bool {
        p.i >= self.min_i && p.i <= self.max_i && p.j >= self.min_j && p.j <= self.max_j
    }
}

fn lattice_bounds(points: &[LatticePoint]) -> LatticeBounds {
    points.iter().fold(
        LatticeBounds {
            min_i: f64::INFINITY,
            min_j: f64::INFINITY,
            max_i: f64::NEG_INFINITY,
            max_j: f64::NEG_INFINITY,
        },
        |b, p| LatticeBounds {
            min_i: b.min_i.min(p.i),
            min_j: b.min_j.min(p.j),
            max_i: b.max_i.max(p.i),
            max_j: b.max_j.max(p.j),
        },
    )
}

/// A ring encloses nothing when its area is exactly zero or it visits fewer
/// than three distinct points.
fn is_degenerate(points: &[LatticePoint], area: f64) -> bool {
    if area == 0.0 {
        return true;
    }
    let Some(&first) = points.first() else {
        return true;
    };
    let Some(&second) = points.iter().find(|&&p| p != first) else {
        return true;
    };
    !points.iter().any(|&p| p != first && p != second)
}

/// Points just beside the edges of a hole, on the band side, longest edge
/// first. Holes run clockwise, so the band lies to the left of each edge.
fn interior_points(hole: &[LatticePoint]) -> impl Iterator<Item = LatticePoint> + '_ {
    let mut edges: Vec<(f64, usize)> = hole
        .windows(2)
        .enumerate()
        .map(|(k, w)| {
            let (di, dj) = (w[1].i - w[0].i, w[1].j - w[0].j);
            (di * di + dj * dj, k)
        })
        .filter(|(len, _)| *len > 0.0)
        .collect();
    edges.sort_by(|a, b| b.0.total_cmp(&a.0));

    edges.into_iter().map(move |(_, k)| {
        let (a, b) = (hole[k], hole[k + 1]);
        let (di, dj) = (b.i - a.i, b.j - a.j);
        LatticePoint::new(
            0.5 * (a.i + b.i) - INTERIOR_OFFSET * dj,
            0.5 * (a.j + b.j) + INTERIOR_OFFSET * di,
        )
    })
}

/// Even-odd ray casting against a closed ring.
fn point_in_ring(p: LatticePoint, ring: &[LatticePoint]) -> bool {
    let mut inside = false;
    for w in ring.windows(2) {
        let (a, b) = (w[0], w[1]);
        if (a.j > p.j) != (b.j > p.j) {
            let i_cross = a.i + (p.j - a.j) / (b.j - a.j) * (b.i - a.i);
            if p.i < i_cross {
                inside = !inside;
            }
        }
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChunkSpec, ZInterp};
    use crate::grid::ContourGrid;

    fn model(nx: usize, ny: usize, z: Vec<f64>, mask: Option<Vec<bool>>) -> GridModel {
        let grid = ContourGrid::from_z(nx, ny, z, mask).unwrap();
        GridModel::new(grid, false, false, ZInterp::Linear).unwrap()
    }

    fn try_fill(model: &GridModel, spec: ChunkSpec, band: Band) -> Result<RingArena> {
        let grid = model.grid();
        let layout = ChunkLayout::new(grid.nx_quads(), grid.ny_quads(), spec).unwrap();
        let classifier = CellClassifier::new(model);
        let boundary = Boundary::new(&layout, false);
        let mut pieces = Vec::new();
        for chunk in layout.chunks() {
            band_pieces(&classifier, &boundary, &chunk, band, &mut pieces);
        }
        rings_from_pieces(pieces, 0)
    }

    fn fill(model: &GridModel, spec: ChunkSpec, band: Band) -> RingArena {
        try_fill(model, spec, band).unwrap()
    }

    fn peak() -> Vec<f64> {
        let mut z = vec![0.0; 9];
        z[4] = 2.0;
        z
    }

    #[test]
    fn test_band_classes() {
        let band = Band::new(Some(1.0), Some(2.0));
        assert_eq!(band.classify(0.5), Class::Below);
        assert_eq!(band.classify(1.0), Class::Within);
        assert_eq!(band.classify(2.0), Class::Above);

        let open = Band::new(None, None);
        assert_eq!(open.classify(-1e300), Class::Within);
    }

    #[test]
    fn test_whole_domain_band() {
        let model = model(3, 3, peak(), None);
        let arena = fill(&model, ChunkSpec::Whole, Band::new(None, None));
        assert_eq!(arena.len(), 1);
        let ring = &arena.rings()[0];
        assert_eq!(ring.kind, RingKind::Outer);
        assert_eq!(ring.points.len(), 9);
        assert_eq!(ring.points.first(), ring.points.last());
        assert!((ring.area - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_peak_band_above() {
        let model = model(3, 3, peak(), None);
        let arena = fill(&model, ChunkSpec::Whole, Band::new(Some(1.0), None));
        assert_eq!(arena.polygon_count(), 1);
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.rings()[0].points.len(), 5);
        assert!((arena.rings()[0].area - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_peak_band_below_has_hole() {
        let model = model(3, 3, peak(), None);
        let arena = fill(&model, ChunkSpec::Whole, Band::new(None, Some(1.0)));
        assert_eq!(arena.polygon_count(), 1);
        assert_eq!(arena.len(), 2);

        let rings = arena.rings();
        assert_eq!(rings[0].kind, RingKind::Outer);
        assert_eq!(rings[0].points.len(), 9);
        assert_eq!(rings[1].kind, RingKind::Hole);
        assert_eq!(rings[1].parent, Some(0));
        assert_eq!(rings[1].points.len(), 5);
        assert!((rings[0].area + rings[1].area - 3.5).abs() < 1e-12);
    }

    #[test]
    fn test_band_between_levels() {
        let model = model(3, 3, peak(), None);
        let arena = fill(&model, ChunkSpec::Whole, Band::new(Some(0.5), Some(1.5)));
        assert_eq!(arena.polygon_count(), 1);
        assert_eq!(arena.len(), 2);
        let area: f64 = arena.rings().iter().map(|r| r.area).sum();
        assert!(area > 0.0);
    }

    #[test]
    fn test_chunked_fill_matches_whole() {
        let mut z = vec![0.0; 25];
        z[12] = 3.0;
        z[6] = 1.5;
        let model = model(5, 5, z, None);
        let band = Band::new(Some(0.5), Some(2.0));
        let whole = fill(&model, ChunkSpec::Whole, band);
        let chunked = fill(&model, ChunkSpec::Size { nx: 2, ny: 2 }, band);
        assert_eq!(whole, chunked);
    }

    #[test]
    fn test_close_at_chunk_rings() {
        let model = model(3, 3, vec![1.0; 9], None);
        let grid = model.grid();
        let layout =
            ChunkLayout::new(grid.nx_quads(), grid.ny_quads(), ChunkSpec::Size { nx: 1, ny: 2 })
                .unwrap();
        let classifier = CellClassifier::new(&model);
        let boundary = Boundary::new(&layout, true);
        for chunk in layout.chunks() {
            let mut pieces = Vec::new();
            band_pieces(&classifier, &boundary, &chunk, Band::new(None, None), &mut pieces);
            let mut lines = trace(&pieces);
            canonicalize(&mut lines);
            let arena = assemble_rings(lines, chunk.index).unwrap();
            assert_eq!(arena.len(), 1);
            assert!((arena.rings()[0].area - 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_masked_node_makes_hole_in_band() {
        let mut mask = vec![false; 25];
        mask[12] = true;
        let model = model(5, 5, vec![1.0; 25], Some(mask));
        let arena = fill(&model, ChunkSpec::Whole, Band::new(None, None));
        assert_eq!(arena.polygon_count(), 1);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.rings()[1].kind, RingKind::Hole);
        // 16 quads minus the 4 around the masked node.
        let area: f64 = arena.rings().iter().map(|r| r.area).sum();
        assert!((area - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_unclosed_ring_is_an_error() {
        let model = model(2, 2, vec![0.0, 0.0, 1.0, 1.0], None);
        let classifier = CellClassifier::new(&model);
        let layout = ChunkLayout::new(1, 1, ChunkSpec::Whole).unwrap();
        let mut pieces = Vec::new();
        crate::trace::line_pieces(&classifier, &layout.chunk(0), 0.5, &mut pieces);
        let err = assemble_rings(trace(&pieces), 3).unwrap_err();
        assert_eq!(err.kind(), "ChunkFailed");
    }

    #[test]
    fn test_point_in_ring() {
        let square = [
            LatticePoint::new(0.0, 0.0),
            LatticePoint::new(2.0, 0.0),
            LatticePoint::new(2.0, 2.0),
            LatticePoint::new(0.0, 2.0),
            LatticePoint::new(0.0, 0.0),
        ];
        assert!(point_in_ring(LatticePoint::new(1.0, 1.0), &square));
        assert!(!point_in_ring(LatticePoint::new(3.0, 1.0), &square));

        // The same square traversed as a hole; band side is outside it.
        let hole: Vec<_> = square.iter().rev().copied().collect();
        let first = interior_points(&hole).next().unwrap();
        assert!(first.i < 0.0 && first.i > -1e-3);
        assert_eq!(first.j, 1.0);
        assert!(interior_points(&hole).all(|p| !point_in_ring(p, &square)));
    }

    #[test]
    fn test_degenerate_rings() {
        let a = LatticePoint::new(0.0, 0.0);
        let b = LatticePoint::new(1.0, 0.0);
        let c = LatticePoint::new(0.0, 1e-9);
        assert!(is_degenerate(&[a, b, a], 0.0));
        assert!(is_degenerate(&[a, b, a, b, a], 1e-30));
        assert!(!is_degenerate(&[a, b, c, a], 5e-10));
    }

    #[test]
    fn test_cancel_reversed_pairs() {
        let model = model(3, 3, peak(), None);
        let classifier = CellClassifier::new(&model);
        let mut facets = Vec::new();
        classifier.facets(0, &mut facets);

        let mut pieces = Vec::new();
        let mut sink = PieceSink::new(&mut pieces, 0);
        let node = |n| Endpoint::node(&model, n);
        sink.push(&facets[0], node(0), node(1));
        sink.push(&facets[0], node(1), node(4));
        sink.push(&facets[0], node(1), node(0));
        sink.push(&facets[0], node(4), node(0));

        cancel_reversed(&mut pieces);
        let keys: Vec<_> = pieces.iter().map(|p| (p.from.key, p.to.key)).collect();
        assert_eq!(
            keys,
            vec![
                (VertexKey::Node(1), VertexKey::Node(4)),
                (VertexKey::Node(4), VertexKey::Node(0)),
            ]
        );
    }

    #[test]
    fn test_small_ring_below_peak_is_kept() {
        let model = model(3, 3, peak(), None);
        let level = 2.0 - 1e-6;
        let arena = fill(&model, ChunkSpec::Whole, Band::new(Some(level), None));
        assert_eq!(arena.polygon_count(), 1);
        let area = arena.rings()[0].area;
        assert!(area > 0.0 && area < 1e-12, "area {}", area);
    }

    #[test]
    fn test_ties_at_band_levels_with_triangles() {
        let z = vec![3.0, 3.0, 2.0, 3.0, 0.0, 1.0, 0.0, 1.0, 1.0];
        let grid = ContourGrid::from_z(3, 3, z, None).unwrap();
        let model = GridModel::new(grid, false, true, ZInterp::Linear).unwrap();

        let bands = [
            Band::new(None, Some(1.0)),
            Band::new(Some(1.0), Some(2.0)),
            Band::new(Some(2.0), None),
        ];
        let mut total = 0.0;
        for band in bands {
            let arena = try_fill(&model, ChunkSpec::Whole, band).unwrap();
            assert!(arena.polygon_count() >= 1, "{:?}", band);
            total += arena.rings().iter().map(|r| r.area).sum::<f64>();
        }
        assert!((total - 4.0).abs() < 1e-12, "total area {}", total);
    }
}
