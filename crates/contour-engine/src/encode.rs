//! Encoder: turns merged geometry into the caller's output layout.
//!
//! Encoding copies points as-is; it never reorders or simplifies geometry.

use serde::Serialize;

use crate::config::{FillLayout, LineLayout};
use crate::fill::{Ring, RingArena};
use crate::scheduler::Merged;
use crate::trace::TracedLine;
use crate::types::{PathCode, Point, RingKind};

/// Combined points of one chunk with line start offsets (`offsets[0] == 0`,
/// last offset == number of points).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffsetLines {
    pub points: Vec<Point>,
    pub offsets: Vec<usize>,
}

/// Combined points of one chunk with a path code per point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodedLines {
    pub points: Vec<Point>,
    pub codes: Vec<u8>,
}

/// Result of a line query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "layout", rename_all = "kebab-case")]
pub enum EncodedLines {
    Separate {
        lines: Vec<Vec<Point>>,
    },
    SeparateWithCodes {
        lines: Vec<Vec<Point>>,
        codes: Vec<Vec<u8>>,
    },
    /// One entry per chunk, `None` for chunks without lines.
    ChunkCombined {
        chunks: Vec<Option<OffsetLines>>,
    },
    ChunkCombinedWithCodes {
        chunks: Vec<Option<CodedLines>>,
    },
}

impl EncodedLines {
    pub fn layout(&self) -> LineLayout {
        match self {
            Self::Separate { .. } => LineLayout::Separate,
            Self::SeparateWithCodes { .. } => LineLayout::SeparateWithCodes,
            Self::ChunkCombined { .. } => LineLayout::ChunkCombined,
            Self::ChunkCombinedWithCodes { .. } => LineLayout::ChunkCombinedWithCodes,
        }
    }

    /// Every line as its own point array, whatever the layout.
    pub fn paths(&self) -> Vec<Vec<Point>> {
        match self {
            Self::Separate { lines } | Self::SeparateWithCodes { lines, .. } => lines.clone(),
            Self::ChunkCombined { chunks } => chunks
                .iter()
                .flatten()
                .flat_map(|c| c.offsets.windows(2).map(|w| c.points[w[0]..w[1]].to_vec()))
                .collect(),
            Self::ChunkCombinedWithCodes { chunks } => chunks
                .iter()
                .flatten()
                .flat_map(|c| split_at_move_to(&c.points, &c.codes))
                .collect(),
        }
    }

    pub fn line_count(&self) -> usize {
        match self {
            Self::Separate { lines } | Self::SeparateWithCodes { lines, .. } => lines.len(),
            Self::ChunkCombined { chunks } => chunks
                .iter()
                .flatten()
                .map(|c| c.offsets.len().saturating_sub(1))
                .sum(),
            Self::ChunkCombinedWithCodes { chunks } => chunks
                .iter()
                .flatten()
                .map(|c| c.codes.iter().filter(|&&k| k == PathCode::MoveTo.as_u8()).count())
                .sum(),
        }
    }

    pub fn point_count(&self) -> usize {
        match self {
            Self::Separate { lines } | Self::SeparateWithCodes { lines, .. } => {
                lines.iter().map(Vec::len).sum()
            }
            Self::ChunkCombined { chunks } => chunks.iter().flatten().map(|c| c.points.len()).sum(),
            Self::ChunkCombinedWithCodes { chunks } => {
                chunks.iter().flatten().map(|c| c.points.len()).sum()
            }
        }
    }
}

/// One polygon: an outer ring followed by its holes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Polygon {
    pub points: Vec<Point>,
    /// Ring start offsets into `points`, plus the total.
    pub offsets: Vec<usize>,
    pub kinds: Vec<RingKind>,
}

/// One polygon with a path code per point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodedPolygon {
    pub points: Vec<Point>,
    pub codes: Vec<u8>,
    pub kinds: Vec<RingKind>,
}

/// All polygons of one chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffsetFill {
    pub points: Vec<Point>,
    /// Ring start offsets into `points`, plus the total.
    pub offsets: Vec<usize>,
    /// Polygon start offsets into `offsets`, plus the ring count.
    pub outer_offsets: Vec<usize>,
    pub kinds: Vec<RingKind>,
}

/// All polygons of one chunk with path codes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodedFill {
    pub points: Vec<Point>,
    pub codes: Vec<u8>,
    /// Polygon start offsets into `points`, plus the total.
    pub outer_offsets: Vec<usize>,
    pub kinds: Vec<RingKind>,
}

/// Result of a filled query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "layout", rename_all = "kebab-case")]
pub enum EncodedFill {
    Separate { polygons: Vec<Polygon> },
    SeparateWithCodes { polygons: Vec<CodedPolygon> },
    ChunkCombined { chunks: Vec<Option<OffsetFill>> },
    ChunkCombinedWithCodes { chunks: Vec<Option<CodedFill>> },
}

impl EncodedFill {
    pub fn layout(&self) -> FillLayout {
        match self {
            Self::Separate { .. } => FillLayout::Separate,
            Self::SeparateWithCodes { .. } => FillLayout::SeparateWithCodes,
            Self::ChunkCombined { .. } => FillLayout::ChunkCombined,
            Self::ChunkCombinedWithCodes { .. } => FillLayout::ChunkCombinedWithCodes,
        }
    }

    /// Every ring with its kind, in encoding order.
    pub fn rings(&self) -> Vec<(RingKind, Vec<Point>)> {
        match self {
            Self::Separate { polygons } => polygons
                .iter()
                .flat_map(|p| {
                    p.offsets
                        .windows(2)
                        .zip(&p.kinds)
                        .map(|(w, &kind)| (kind, p.points[w[0]..w[1]].to_vec()))
                })
                .collect(),
            Self::SeparateWithCodes { polygons } => polygons
                .iter()
                .flat_map(|p| {
                    p.kinds
                        .iter()
                        .copied()
                        .zip(split_at_move_to(&p.points, &p.codes))
                })
                .collect(),
            Self::ChunkCombined { chunks } => chunks
                .iter()
                .flatten()
                .flat_map(|c| {
                    c.offsets
                        .windows(2)
                        .zip(&c.kinds)
                        .map(|(w, &kind)| (kind, c.points[w[0]..w[1]].to_vec()))
                })
                .collect(),
            Self::ChunkCombinedWithCodes { chunks } => chunks
                .iter()
                .flatten()
                .flat_map(|c| {
                    c.kinds
                        .iter()
                        .copied()
                        .zip(split_at_move_to(&c.points, &c.codes))
                })
                .collect(),
        }
    }

    pub fn polygon_count(&self) -> usize {
        match self {
            Self::Separate { polygons } => polygons.len(),
            Self::SeparateWithCodes { polygons } => polygons.len(),
            Self::ChunkCombined { chunks } => chunks
                .iter()
                .flatten()
                .map(|c| c.outer_offsets.len().saturating_sub(1))
                .sum(),
            Self::ChunkCombinedWithCodes { chunks } => chunks
                .iter()
                .flatten()
                .map(|c| c.outer_offsets.len().saturating_sub(1))
                .sum(),
        }
    }

    pub fn ring_count(&self) -> usize {
        match self {
            Self::Separate { polygons } => polygons.iter().map(|p| p.kinds.len()).sum(),
            Self::SeparateWithCodes { polygons } => polygons.iter().map(|p| p.kinds.len()).sum(),
            Self::ChunkCombined { chunks } => chunks.iter().flatten().map(|c| c.kinds.len()).sum(),
            Self::ChunkCombinedWithCodes { chunks } => {
                chunks.iter().flatten().map(|c| c.kinds.len()).sum()
            }
        }
    }
}

fn split_at_move_to(points: &[Point], codes: &[u8]) -> Vec<Vec<Point>> {
    let mut out: Vec<Vec<Point>> = Vec::new();
    for (p, &code) in points.iter().zip(codes) {
        if code == PathCode::MoveTo.as_u8() || out.is_empty() {
            out.push(Vec::new());
        }
        if let Some(last) = out.last_mut() {
            last.push(*p);
        }
    }
    out
}

/// Codes for a polyline of `len` points.
fn path_codes(len: usize, closed: bool, codes: &mut Vec<u8>) {
    for k in 0..len {
        let code = if k == 0 {
            PathCode::MoveTo
        } else if closed && k + 1 == len {
            PathCode::ClosePoly
        } else {
            PathCode::LineTo
        };
        codes.push(code.as_u8());
    }
}

/// Encode merged lines in `layout`.
pub fn encode_lines(layout: LineLayout, merged: Merged<Vec<TracedLine>>) -> EncodedLines {
    let per_chunk = match merged {
        Merged::Combined(lines) => {
            return match layout {
                LineLayout::SeparateWithCodes => {
                    let codes = lines
                        .iter()
                        .map(|l| {
                            let mut codes = Vec::with_capacity(l.points.len());
                            path_codes(l.points.len(), l.closed, &mut codes);
                            codes
                        })
                        .collect();
                    EncodedLines::SeparateWithCodes {
                        lines: lines.into_iter().map(|l| l.points).collect(),
                        codes,
                    }
                }
                // Combined results only come from separate layouts; a chunked
                // layout over them is a single chunk.
                LineLayout::ChunkCombined | LineLayout::ChunkCombinedWithCodes => {
                    encode_lines(layout, Merged::PerChunk(vec![lines]))
                }
                LineLayout::Separate => EncodedLines::Separate {
                    lines: lines.into_iter().map(|l| l.points).collect(),
                },
            };
        }
        Merged::PerChunk(chunks) => chunks,
    };

    match layout {
        LineLayout::ChunkCombinedWithCodes => EncodedLines::ChunkCombinedWithCodes {
            chunks: per_chunk
                .into_iter()
                .map(|lines| {
                    (!lines.is_empty()).then(|| {
                        let mut points = Vec::new();
                        let mut codes = Vec::new();
                        for line in lines {
                            path_codes(line.points.len(), line.closed, &mut codes);
                            points.extend(line.points);
                        }
                        CodedLines { points, codes }
                    })
                })
                .collect(),
        },
        LineLayout::ChunkCombined => EncodedLines::ChunkCombined {
            chunks: per_chunk
                .into_iter()
                .map(|lines| {
                    (!lines.is_empty()).then(|| {
                        let mut points = Vec::new();
                        let mut offsets = vec![0];
                        for line in lines {
                            points.extend(line.points);
                            offsets.push(points.len());
                        }
                        OffsetLines { points, offsets }
                    })
                })
                .collect(),
        },
        LineLayout::Separate | LineLayout::SeparateWithCodes => {
            let lines = per_chunk.into_iter().flatten().collect();
            encode_lines(layout, Merged::Combined(lines))
        }
    }
}

fn polygon(rings: &[Ring]) -> Polygon {
    let mut points = Vec::new();
    let mut offsets = vec![0];
    let mut kinds = Vec::with_capacity(rings.len());
    for ring in rings {
        points.extend_from_slice(&ring.points);
        offsets.push(points.len());
        kinds.push(ring.kind);
    }
    Polygon {
        points,
        offsets,
        kinds,
    }
}

fn coded_polygon(rings: &[Ring]) -> CodedPolygon {
    let mut points = Vec::new();
    let mut codes = Vec::new();
    let mut kinds = Vec::with_capacity(rings.len());
    for ring in rings {
        path_codes(ring.points.len(), true, &mut codes);
        points.extend_from_slice(&ring.points);
        kinds.push(ring.kind);
    }
    CodedPolygon {
        points,
        codes,
        kinds,
    }
}

/// Encode merged rings in `layout`.
pub fn encode_fill(layout: FillLayout, merged: Merged<RingArena>) -> EncodedFill {
    let arenas = match merged {
        Merged::Combined(arena) => vec![arena],
        Merged::PerChunk(arenas) => arenas,
    };

    match layout {
        FillLayout::Separate => EncodedFill::Separate {
            polygons: arenas.iter().flat_map(|a| a.polygons().map(polygon)).collect(),
        },
        FillLayout::SeparateWithCodes => EncodedFill::SeparateWithCodes {
            polygons: arenas
                .iter()
                .flat_map(|a| a.polygons().map(coded_polygon))
                .collect(),
        },
        FillLayout::ChunkCombined => EncodedFill::ChunkCombined {
            chunks: arenas
                .iter()
                .map(|arena| {
                    (!arena.is_empty()).then(|| {
                        let mut fill = OffsetFill {
                            points: Vec::with_capacity(arena.point_count()),
                            offsets: vec![0],
                            outer_offsets: vec![0],
                            kinds: Vec::with_capacity(arena.len()),
                        };
                        for rings in arena.polygons() {
                            for ring in rings {
                                fill.points.extend_from_slice(&ring.points);
                                fill.offsets.push(fill.points.len());
                                fill.kinds.push(ring.kind);
                            }
                            fill.outer_offsets.push(fill.kinds.len());
                        }
                        fill
                    })
                })
                .collect(),
        },
        FillLayout::ChunkCombinedWithCodes => EncodedFill::ChunkCombinedWithCodes {
            chunks: arenas
                .iter()
                .map(|arena| {
                    (!arena.is_empty()).then(|| {
                        let mut fill = CodedFill {
                            points: Vec::with_capacity(arena.point_count()),
                            codes: Vec::with_capacity(arena.point_count()),
                            outer_offsets: vec![0],
                            kinds: Vec::with_capacity(arena.len()),
                        };
                        for rings in arena.polygons() {
                            for ring in rings {
                                path_codes(ring.points.len(), true, &mut fill.codes);
                                fill.points.extend_from_slice(&ring.points);
                                fill.kinds.push(ring.kind);
                            }
                            fill.outer_offsets.push(fill.points.len());
                        }
                        fill
                    })
                })
                .collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::VertexKey;
    use crate::types::LatticePoint;

    fn line(points: &[(f64, f64)], closed: bool) -> TracedLine {
        TracedLine {
            points: points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
            lattice: points.iter().map(|&(i, j)| LatticePoint::new(i, j)).collect(),
            seqs: (0..points.len() as u64 - 1).collect(),
            start: VertexKey::Node(0),
            end: VertexKey::Node(if closed { 0 } else { 1 }),
            closed,
        }
    }

    fn square() -> TracedLine {
        line(
            &[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)],
            true,
        )
    }

    #[test]
    fn test_line_codes() {
        let merged = Merged::Combined(vec![line(&[(0.0, 0.0), (1.0, 1.0)], false), square()]);
        let encoded = encode_lines(LineLayout::SeparateWithCodes, merged);
        match &encoded {
            EncodedLines::SeparateWithCodes { lines, codes } => {
                assert_eq!(lines.len(), 2);
                assert_eq!(codes[0], vec![1, 2]);
                assert_eq!(codes[1], vec![1, 2, 2, 2, 79]);
            }
            other => panic!("unexpected layout {:?}", other.layout()),
        }
        assert_eq!(encoded.line_count(), 2);
        assert_eq!(encoded.point_count(), 7);
    }

    #[test]
    fn test_chunk_combined_lines() {
        let merged = Merged::PerChunk(vec![
            vec![line(&[(0.0, 0.0), (1.0, 1.0)], false), square()],
            vec![],
        ]);
        let encoded = encode_lines(LineLayout::ChunkCombined, merged.clone());
        match &encoded {
            EncodedLines::ChunkCombined { chunks } => {
                assert_eq!(chunks.len(), 2);
                assert!(chunks[1].is_none());
                let first = chunks[0].as_ref().unwrap();
                assert_eq!(first.offsets, vec![0, 2, 7]);
            }
            other => panic!("unexpected layout {:?}", other.layout()),
        }
        assert_eq!(encoded.line_count(), 2);

        let coded = encode_lines(LineLayout::ChunkCombinedWithCodes, merged);
        assert_eq!(coded.paths(), encoded.paths());
        assert_eq!(coded.line_count(), 2);
    }

    #[test]
    fn test_separate_flattens_chunks() {
        let merged = Merged::PerChunk(vec![vec![square()], vec![square()]]);
        let encoded = encode_lines(LineLayout::Separate, merged);
        assert_eq!(encoded.line_count(), 2);
    }

    fn arena_with_hole() -> RingArena {
        let outer = line(
            &[(0.0, 0.0), (3.0, 0.0), (3.0, 3.0), (0.0, 3.0), (0.0, 0.0)],
            true,
        );
        let hole = line(
            &[(1.0, 1.0), (1.0, 2.0), (2.0, 2.0), (2.0, 1.0), (1.0, 1.0)],
            true,
        );
        crate::fill::assemble_rings(vec![outer, hole, square()], 0).unwrap()
    }

    #[test]
    fn test_fill_layouts() {
        let arena = arena_with_hole();
        assert_eq!(arena.polygon_count(), 2);

        let separate = encode_fill(FillLayout::Separate, Merged::Combined(arena.clone()));
        match &separate {
            EncodedFill::Separate { polygons } => {
                assert_eq!(polygons.len(), 2);
                assert_eq!(polygons[0].offsets, vec![0, 5, 10]);
                assert_eq!(polygons[0].kinds, vec![RingKind::Outer, RingKind::Hole]);
                assert_eq!(polygons[1].kinds, vec![RingKind::Outer]);
            }
            other => panic!("unexpected layout {:?}", other.layout()),
        }

        let coded = encode_fill(FillLayout::SeparateWithCodes, Merged::Combined(arena.clone()));
        match &coded {
            EncodedFill::SeparateWithCodes { polygons } => {
                assert_eq!(polygons[0].codes[4], 79);
                assert_eq!(polygons[0].codes[5], 1);
            }
            other => panic!("unexpected layout {:?}", other.layout()),
        }

        let combined = encode_fill(
            FillLayout::ChunkCombined,
            Merged::PerChunk(vec![arena.clone(), RingArena::default()]),
        );
        match &combined {
            EncodedFill::ChunkCombined { chunks } => {
                let c = chunks[0].as_ref().unwrap();
                assert_eq!(c.offsets, vec![0, 5, 10, 15]);
                assert_eq!(c.outer_offsets, vec![0, 2, 3]);
                assert!(chunks[1].is_none());
            }
            other => panic!("unexpected layout {:?}", other.layout()),
        }

        let combined_codes = encode_fill(
            FillLayout::ChunkCombinedWithCodes,
            Merged::PerChunk(vec![arena]),
        );
        match &combined_codes {
            EncodedFill::ChunkCombinedWithCodes { chunks } => {
                let c = chunks[0].as_ref().unwrap();
                assert_eq!(c.outer_offsets, vec![0, 10, 15]);
            }
            other => panic!("unexpected layout {:?}", other.layout()),
        }

        for encoded in [&separate, &coded, &combined, &combined_codes] {
            assert_eq!(encoded.polygon_count(), 2);
            assert_eq!(encoded.ring_count(), 3);
            assert_eq!(encoded.ring_count(), encoded.rings().len());
            assert_eq!(encoded.rings(), separate.rings());
        }
    }

    #[test]
    fn test_serialize_tagged() {
        let encoded = encode_lines(LineLayout::Separate, Merged::Combined(vec![square()]));
        let json = serde_json::to_value(&encoded).unwrap();
        assert_eq!(json["layout"], "separate");
        assert_eq!(json["lines"][0][1]["x"], 1.0);
    }
}
