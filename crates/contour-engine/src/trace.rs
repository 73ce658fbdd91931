//! Tracer: links directed pieces into lines.
//!
//! Pieces are joined by vertex identity, never by comparing coordinates. A
//! crossing key names the facet edge and the bound it was computed for, so
//! both facets sharing an edge (and both chunks sharing a boundary) refer to
//! the same vertex. A crossing that lands exactly on a facet vertex takes
//! that vertex's key instead, so coincident points always share a key.
//!
//! Every crossing has exactly one incoming and one outgoing piece. Vertices
//! can carry more, where rings touch at a mask corner or a level passes
//! through a vertex.

use std::collections::{HashMap, HashSet};

use crate::chunk::Chunk;
use crate::classify::{CellClassifier, EdgeKey, Facet};
use crate::grid::{GridModel, Vertex};
use crate::types::{Bound, LatticePoint, Point};

/// Identity of a line vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VertexKey {
    Node(usize),
    Center(usize),
    Crossing { edge: EdgeKey, bound: Bound },
}

/// A piece endpoint with both its geometric and index-space position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Endpoint {
    pub key: VertexKey,
    pub point: Point,
    pub lattice: LatticePoint,
}

impl Endpoint {
    pub fn node(model: &GridModel, node: usize) -> Self {
        Self::vertex(model, Vertex::Node(node))
    }

    pub fn vertex(model: &GridModel, vertex: Vertex) -> Self {
        let key = match vertex {
            Vertex::Node(node) => VertexKey::Node(node),
            Vertex::Center(quad) => VertexKey::Center(quad),
        };
        Self {
            key,
            point: model.position(vertex),
            lattice: model.lattice(vertex),
        }
    }

    /// Crossing of `level` on edge `k` of a facet.
    pub fn crossing(model: &GridModel, facet: &Facet, k: usize, level: f64, bound: Bound) -> Self {
        let (a, b) = facet.edge(k);
        if let Some(vertex) = model.crossing_vertex(a, b, level) {
            return Self::vertex(model, vertex);
        }
        let (point, lattice) = model.interpolate(a, b, level);
        Self {
            key: VertexKey::Crossing {
                edge: facet.edge_key(k),
                bound,
            },
            point,
            lattice,
        }
    }
}

/// A directed straight segment between two vertex keys.
#[derive(Debug, Clone, Copy)]
pub struct Piece {
    pub from: Endpoint,
    pub to: Endpoint,
    /// Facet the piece was generated in.
    pub facet: u64,
    /// Position in scan order, `quad * PIECE_SLOTS + slot`.
    pub seq: u64,
}

/// Upper bound on the pieces a single quad can generate.
pub const PIECE_SLOTS: u64 = 32;

/// Collects the pieces of one quad, numbering them in generation order.
#[derive(Debug)]
pub struct PieceSink<'a> {
    pieces: &'a mut Vec<Piece>,
    base: u64,
    slot: u64,
}

impl<'a> PieceSink<'a> {
    pub fn new(pieces: &'a mut Vec<Piece>, quad: usize) -> Self {
        Self {
            pieces,
            base: quad as u64 * PIECE_SLOTS,
            slot: 0,
        }
    }

    /// Add a piece. Pieces that start and end on the same vertex are skipped.
    pub fn push(&mut self, facet: &Facet, from: Endpoint, to: Endpoint) {
        if from.key == to.key {
            return;
        }
        debug_assert!(self.slot < PIECE_SLOTS);
        self.pieces.push(Piece {
            from,
            to,
            facet: facet.id(),
            seq: self.base + self.slot,
        });
        self.slot += 1;
    }
}

/// Contour segments of every facet in a chunk at a single level, in scan
/// order.
pub fn line_pieces(classifier: &CellClassifier<'_>, chunk: &Chunk, level: f64, out: &mut Vec<Piece>) {
    let model = classifier.model();
    let grid = model.grid();
    let mut facets = Vec::with_capacity(4);

    for (i, j) in chunk.quads() {
        let quad = grid.quad_index(i, j);
        facets.clear();
        classifier.facets(quad, &mut facets);

        let mut sink = PieceSink::new(out, quad);
        for facet in &facets {
            for &(from, to) in classifier.segments(facet, level) {
                let from = Endpoint::crossing(model, facet, from as usize, level, Bound::Lower);
                let to = Endpoint::crossing(model, facet, to as usize, level, Bound::Lower);
                sink.push(facet, from, to);
            }
        }
    }
}

/// A traced polyline.
#[derive(Debug, Clone, PartialEq)]
pub struct TracedLine {
    /// Geometric points; one more than the number of pieces.
    pub points: Vec<Point>,
    /// Index-space points, parallel to `points`.
    pub lattice: Vec<LatticePoint>,
    /// Scan-order sequence of each piece.
    pub seqs: Vec<u64>,
    pub start: VertexKey,
    pub end: VertexKey,
    /// Whether the line returns to its start; the last point then equals the
    /// first exactly.
    pub closed: bool,
}

impl TracedLine {
    fn from_pieces(pieces: &[Piece], chain: &[usize]) -> Self {
        let first = &pieces[chain[0]];
        let mut points = Vec::with_capacity(chain.len() + 1);
        let mut lattice = Vec::with_capacity(chain.len() + 1);
        points.push(first.from.point);
        lattice.push(first.from.lattice);

        let mut seqs = Vec::with_capacity(chain.len());
        for &idx in chain {
            let piece = &pieces[idx];
            points.push(piece.to.point);
            lattice.push(piece.to.lattice);
            seqs.push(piece.seq);
        }

        let start = first.from.key;
        let end = pieces[chain[chain.len() - 1]].to.key;
        Self {
            points,
            lattice,
            seqs,
            start,
            end,
            closed: start == end,
        }
    }

    /// Append a line that starts where this one ends.
    fn extend(&mut self, next: &TracedLine) {
        debug_assert_eq!(self.end, next.start);
        self.points.extend_from_slice(&next.points[1..]);
        self.lattice.extend_from_slice(&next.lattice[1..]);
        self.seqs.extend_from_slice(&next.seqs);
        self.end = next.end;
        self.closed = self.start == self.end;
    }

    /// Sequence of the first piece, used to order lines.
    pub fn first_seq(&self) -> u64 {
        self.seqs.first().copied().unwrap_or(u64::MAX)
    }

    pub fn piece_count(&self) -> usize {
        self.seqs.len()
    }

    /// Rotate a closed line so it starts with its lowest-sequence piece. The
    /// start vertex key of the rotated line is not tracked.
    pub fn rotate_to_min_seq(&mut self) {
        if !self.closed || self.seqs.len() < 2 {
            return;
        }
        let Some(k) = self
            .seqs
            .iter()
            .enumerate()
            .min_by_key(|(_, seq)| **seq)
            .map(|(k, _)| k)
        else {
            return;
        };
        if k == 0 {
            return;
        }

        let n = self.seqs.len();
        self.seqs.rotate_left(k);
        self.points.truncate(n);
        self.points.rotate_left(k);
        self.points.push(self.points[0]);
        self.lattice.truncate(n);
        self.lattice.rotate_left(k);
        self.lattice.push(self.lattice[0]);
    }

    /// Signed area in index space (shoelace); positive for counter-clockwise.
    pub fn signed_area(&self) -> f64 {
        let pts = &self.lattice;
        if pts.len() < 3 {
            return 0.0;
        }
        let mut twice = 0.0;
        for w in pts.windows(2) {
            twice += w[0].i * w[1].j - w[1].i * w[0].j;
        }
        let (first, last) = (pts[0], pts[pts.len() - 1]);
        twice += last.i * first.j - first.i * last.j;
        0.5 * twice
    }
}

/// Something with a start and end vertex that can be chained.
trait Link {
    fn from_key(&self) -> VertexKey;
    fn to_key(&self) -> VertexKey;
    /// Facet affinity used to break ties at shared nodes.
    fn facet(&self) -> Option<u64> {
        None
    }
}

impl Link for Piece {
    fn from_key(&self) -> VertexKey {
        self.from.key
    }

    fn to_key(&self) -> VertexKey {
        self.to.key
    }

    fn facet(&self) -> Option<u64> {
        Some(self.facet)
    }
}

impl Link for TracedLine {
    fn from_key(&self) -> VertexKey {
        self.start
    }

    fn to_key(&self) -> VertexKey {
        self.end
    }
}

/// Partition `items` into chains. Items are assumed to be in scan order.
fn chains<T: Link>(items: &[T]) -> Vec<Vec<usize>> {
    let mut outgoing: HashMap<VertexKey, Vec<usize>> = HashMap::with_capacity(items.len());
    let mut incoming: HashSet<VertexKey> = HashSet::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        outgoing.entry(item.from_key()).or_default().push(idx);
        incoming.insert(item.to_key());
    }

    let mut used = vec![false; items.len()];
    let mut result = Vec::new();

    let follow = |first: usize, used: &mut Vec<bool>| {
        let start = items[first].from_key();
        let mut chain = vec![first];
        used[first] = true;
        let mut current = first;

        loop {
            let key = items[current].to_key();
            if key == start {
                break;
            }
            let Some(candidates) = outgoing.get(&key) else {
                break;
            };
            let facet = items[current].facet();
            let next = {
                let mut free = candidates.iter().copied().filter(|&idx| !used[idx]);
                match facet {
                    Some(_) => {
                        let mut lowest = None;
                        let mut same = None;
                        for idx in free {
                            lowest.get_or_insert(idx);
                            if items[idx].facet() == facet {
                                same = Some(idx);
                                break;
                            }
                        }
                        same.or(lowest)
                    }
                    None => free.next(),
                }
            };
            let Some(next) = next else {
                break;
            };
            used[next] = true;
            chain.push(next);
            current = next;
        }
        chain
    };

    // Open lines first, from starts nothing leads into.
    for idx in 0..items.len() {
        if !used[idx] && !incoming.contains(&items[idx].from_key()) {
            result.push(follow(idx, &mut used));
        }
    }
    // Whatever remains lies on loops.
    for idx in 0..items.len() {
        if !used[idx] {
            result.push(follow(idx, &mut used));
        }
    }

    result
}

/// Trace pieces into lines, in the order they are found.
pub fn trace(pieces: &[Piece]) -> Vec<TracedLine> {
    chains(pieces)
        .iter()
        .map(|chain| TracedLine::from_pieces(pieces, chain))
        .collect()
}

/// Join open fragments from neighbouring chunks end to start. Closed lines
/// pass through unchanged.
pub fn stitch(fragments: Vec<TracedLine>) -> Vec<TracedLine> {
    let (mut lines, mut open): (Vec<_>, Vec<_>) = fragments.into_iter().partition(|l| l.closed);
    if open.is_empty() {
        return lines;
    }
    open.sort_by_key(|l| l.first_seq());

    for chain in chains(&open) {
        let mut iter = chain.into_iter();
        let Some(first) = iter.next() else {
            continue;
        };
        let mut line = open[first].clone();
        for idx in iter {
            line.extend(&open[idx]);
        }
        lines.push(line);
    }
    lines
}

/// Put lines in canonical order: closed lines start at their lowest piece and
/// all lines are sorted by their first piece.
pub fn canonicalize(lines: &mut [TracedLine]) {
    for line in lines.iter_mut() {
        line.rotate_to_min_seq();
    }
    lines.sort_by_key(|l| l.first_seq());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkLayout;
    use crate::config::{ChunkSpec, ZInterp};
    use crate::grid::ContourGrid;

    fn model(nx: usize, ny: usize, z: Vec<f64>, mask: Option<Vec<bool>>, corner: bool, tri: bool) -> GridModel {
        let grid = ContourGrid::from_z(nx, ny, z, mask).unwrap();
        GridModel::new(grid, corner, tri, ZInterp::Linear).unwrap()
    }

    fn peak() -> Vec<f64> {
        let mut z = vec![0.0; 9];
        z[4] = 2.0;
        z
    }

    fn trace_all(model: &GridModel, spec: ChunkSpec, level: f64) -> Vec<TracedLine> {
        let grid = model.grid();
        let layout = ChunkLayout::new(grid.nx_quads(), grid.ny_quads(), spec).unwrap();
        let classifier = CellClassifier::new(model);
        let mut fragments = Vec::new();
        for chunk in layout.chunks() {
            let mut pieces = Vec::new();
            line_pieces(&classifier, &chunk, level, &mut pieces);
            fragments.extend(trace(&pieces));
        }
        let mut lines = stitch(fragments);
        canonicalize(&mut lines);
        lines
    }

    #[test]
    fn test_single_open_line() {
        let model = model(2, 2, vec![0.0, 0.0, 1.0, 1.0], None, false, false);
        let lines = trace_all(&model, ChunkSpec::Whole, 0.5);
        assert_eq!(lines.len(), 1);
        assert!(!lines[0].closed);
        assert_eq!(
            lines[0].points,
            vec![Point::new(0.0, 0.5), Point::new(1.0, 0.5)]
        );
    }

    #[test]
    fn test_peak_is_closed_and_counter_clockwise() {
        let model = model(3, 3, peak(), None, false, false);
        let lines = trace_all(&model, ChunkSpec::Whole, 1.0);
        assert_eq!(lines.len(), 1);

        let line = &lines[0];
        assert!(line.closed);
        assert_eq!(line.points.len(), 5);
        assert_eq!(line.points.first(), line.points.last());
        assert_eq!(line.points[0], Point::new(0.5, 1.0));
        assert_eq!(line.points[1], Point::new(1.0, 0.5));
        assert!(line.signed_area() > 0.0);
    }

    #[test]
    fn test_chunked_trace_stitches_to_same_line() {
        let model = model(3, 3, peak(), None, false, false);
        let whole = trace_all(&model, ChunkSpec::Whole, 1.0);
        let chunked = trace_all(&model, ChunkSpec::Size { nx: 1, ny: 1 }, 1.0);
        assert_eq!(whole, chunked);
    }

    #[test]
    fn test_quad_as_tri_peak() {
        let model = model(3, 3, peak(), None, false, true);
        let lines = trace_all(&model, ChunkSpec::Whole, 1.0);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].closed);
        assert_eq!(lines[0].points.len(), 9);
    }

    #[test]
    fn test_corner_mask_closes_line() {
        let mut mask = vec![false; 9];
        mask[0] = true;

        let plain = model(3, 3, peak(), Some(mask.clone()), false, false);
        let lines = trace_all(&plain, ChunkSpec::Whole, 1.0);
        assert_eq!(lines.len(), 1);
        assert!(!lines[0].closed);
        assert_eq!(
            lines[0].points,
            vec![
                Point::new(1.0, 0.5),
                Point::new(1.5, 1.0),
                Point::new(1.0, 1.5),
                Point::new(0.5, 1.0),
            ]
        );

        let corner = model(3, 3, peak(), Some(mask), true, false);
        let lines = trace_all(&corner, ChunkSpec::Whole, 1.0);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].closed);
        assert_eq!(lines[0].points.len(), 5);
    }

    #[test]
    fn test_rotate_keeps_closure() {
        let model = model(3, 3, peak(), None, false, false);
        let classifier = CellClassifier::new(&model);
        let layout = ChunkLayout::new(2, 2, ChunkSpec::Whole).unwrap();
        let mut pieces = Vec::new();
        line_pieces(&classifier, &layout.chunk(0), 1.0, &mut pieces);

        // Start tracing from the last piece by reversing scan order.
        pieces.reverse();
        let mut lines = trace(&pieces);
        assert_eq!(lines.len(), 1);
        assert_ne!(lines[0].first_seq(), 0);

        canonicalize(&mut lines);
        assert_eq!(lines[0].first_seq(), 0);
        assert_eq!(lines[0].points.first(), lines[0].points.last());
        assert_eq!(lines[0].points.len(), 5);
    }

    #[test]
    fn test_level_through_nodes_joins_at_nodes() {
        let z = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0];
        for tri in [false, true] {
            let model = model(3, 3, z.clone(), None, false, tri);
            let lines = trace_all(&model, ChunkSpec::Whole, 1.0);
            assert_eq!(lines.len(), 1, "quad_as_tri={}", tri);

            let line = &lines[0];
            assert_eq!(
                line.points,
                vec![Point::new(0.0, 1.0), Point::new(1.0, 1.0), Point::new(2.0, 1.0)]
            );
            assert_eq!(line.start, VertexKey::Node(3));
            assert_eq!(line.end, VertexKey::Node(5));
        }
    }

    #[test]
    fn test_coincident_endpoints_are_skipped() {
        let model = model(2, 2, vec![0.0, 1.0, 0.0, 0.0], None, false, false);
        let classifier = CellClassifier::new(&model);
        let facet = {
            let mut facets = Vec::new();
            classifier.facets(0, &mut facets);
            facets[0]
        };
        let mut pieces = Vec::new();
        let mut sink = PieceSink::new(&mut pieces, 0);
        let node = Endpoint::node(&model, 1);
        let tied = Endpoint::crossing(&model, &facet, 0, 1.0, Bound::Lower);
        assert_eq!(tied.key, VertexKey::Node(1));
        sink.push(&facet, node, tied);
        assert!(pieces.is_empty());
    }

    #[test]
    fn test_flat_field_has_no_lines() {
        let model = model(3, 3, vec![1.0; 9], None, false, false);
        assert!(trace_all(&model, ChunkSpec::Whole, 1.0).is_empty());
        assert!(trace_all(&model, ChunkSpec::Whole, 2.0).is_empty());
    }
}
