//! Chunker: rectangular tiles of quads.
//!
//! Tiles are the unit of parallel work and of the chunked output layouts.
//! Adjacent tiles share a line of grid nodes, never a quad.

use crate::config::ChunkSpec;
use crate::error::{ContourError, Result};

/// A rectangular range of quads, `[i_start, i_end) x [j_start, j_end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub i_start: usize,
    pub i_end: usize,
    pub j_start: usize,
    pub j_end: usize,
}

impl Chunk {
    pub fn contains_quad(&self, i: usize, j: usize) -> bool {
        i >= self.i_start && i < self.i_end && j >= self.j_start && j < self.j_end
    }

    pub fn quad_count(&self) -> usize {
        (self.i_end - self.i_start) * (self.j_end - self.j_start)
    }

    /// Quad coordinates in row-major scan order.
    pub fn quads(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (self.j_start..self.j_end).flat_map(move |j| (self.i_start..self.i_end).map(move |i| (i, j)))
    }
}

/// Decomposition of the quad lattice into tiles, indexed row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkLayout {
    nx_quads: usize,
    ny_quads: usize,
    size_x: usize,
    size_y: usize,
    count_x: usize,
    count_y: usize,
}

impl ChunkLayout {
    pub fn new(nx_quads: usize, ny_quads: usize, spec: ChunkSpec) -> Result<Self> {
        if nx_quads == 0 || ny_quads == 0 {
            return Err(ContourError::DegenerateGrid {
                nx: nx_quads + 1,
                ny: ny_quads + 1,
            });
        }

        let (size_x, size_y) = match spec {
            ChunkSpec::Whole => (nx_quads, ny_quads),
            ChunkSpec::Size { nx, ny } => {
                if nx == 0 || ny == 0 {
                    return Err(ContourError::unsupported("chunking", "chunk size must be > 0"));
                }
                (nx.min(nx_quads), ny.min(ny_quads))
            }
            ChunkSpec::Count { nx, ny } => {
                if nx == 0 || ny == 0 {
                    return Err(ContourError::unsupported("chunking", "chunk count must be > 0"));
                }
                (
                    nx_quads.div_ceil(nx.min(nx_quads)),
                    ny_quads.div_ceil(ny.min(ny_quads)),
                )
            }
            ChunkSpec::TotalCount(total) => {
                if total == 0 {
                    return Err(ContourError::unsupported("chunking", "chunk count must be > 0"));
                }
                let (cx, cy) = squarest_factors(total, nx_quads, ny_quads);
                (
                    nx_quads.div_ceil(cx.min(nx_quads)),
                    ny_quads.div_ceil(cy.min(ny_quads)),
                )
            }
        };

        Ok(Self {
            nx_quads,
            ny_quads,
            size_x,
            size_y,
            count_x: nx_quads.div_ceil(size_x),
            count_y: ny_quads.div_ceil(size_y),
        })
    }

    /// Total number of chunks.
    pub fn len(&self) -> usize {
        self.count_x * self.count_y
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nominal quads per chunk (x, y); trailing chunks may be smaller.
    pub fn chunk_size(&self) -> (usize, usize) {
        (self.size_x, self.size_y)
    }

    /// Chunks along each axis (x, y).
    pub fn chunk_count(&self) -> (usize, usize) {
        (self.count_x, self.count_y)
    }

    pub fn chunk(&self, index: usize) -> Chunk {
        let (ci, cj) = (index % self.count_x, index / self.count_x);
        let i_start = ci * self.size_x;
        let j_start = cj * self.size_y;
        Chunk {
            index,
            i_start,
            i_end: (i_start + self.size_x).min(self.nx_quads),
            j_start,
            j_end: (j_start + self.size_y).min(self.ny_quads),
        }
    }

    pub fn chunks(&self) -> Vec<Chunk> {
        (0..self.len()).map(|index| self.chunk(index)).collect()
    }

    /// Index of the chunk holding quad (i, j).
    pub fn chunk_of_quad(&self, i: usize, j: usize) -> usize {
        (j / self.size_y) * self.count_x + i / self.size_x
    }
}

/// Factor `total` into (x, y) chunk counts giving the squarest tiles, preferring
/// factorisations that fit within the quad counts. More chunks than quads are
/// never useful, so `total` is capped at the quad count first.
fn squarest_factors(total: usize, nx_quads: usize, ny_quads: usize) -> (usize, usize) {
    let total = total.min(nx_quads.saturating_mul(ny_quads)).max(1);

    let mut divisors = Vec::new();
    let mut d = 1;
    while d <= total / d {
        if total % d == 0 {
            divisors.push(d);
            if d != total / d {
                divisors.push(total / d);
            }
        }
        d += 1;
    }
    divisors.sort_unstable();

    let mut best = (total, 1);
    let mut best_score = (true, f64::INFINITY);
    for cx in divisors {
        let cy = total / cx;
        let overflow = cx > nx_quads || cy > ny_quads;
        let aspect = ((nx_quads as f64 / cx as f64) / (ny_quads as f64 / cy as f64))
            .ln()
            .abs();
        let score = (overflow, aspect);
        if score.0 < best_score.0 || (score.0 == best_score.0 && score.1 < best_score.1) {
            best = (cx, cy);
            best_score = score;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_partition(layout: &ChunkLayout, nx_quads: usize, ny_quads: usize) {
        let mut seen = vec![0u32; nx_quads * ny_quads];
        for chunk in layout.chunks() {
            assert!(chunk.quad_count() > 0);
            for (i, j) in chunk.quads() {
                seen[j * nx_quads + i] += 1;
                assert_eq!(layout.chunk_of_quad(i, j), chunk.index);
            }
        }
        assert!(seen.iter().all(|&n| n == 1), "chunks must partition the quads");
    }

    #[test]
    fn test_whole_grid_is_one_chunk() {
        let layout = ChunkLayout::new(9, 4, ChunkSpec::Whole).unwrap();
        assert_eq!(layout.len(), 1);
        assert_eq!(layout.chunk_size(), (9, 4));
        assert_partition(&layout, 9, 4);
    }

    #[test]
    fn test_chunk_size_partition() {
        let layout = ChunkLayout::new(10, 7, ChunkSpec::Size { nx: 3, ny: 2 }).unwrap();
        assert_eq!(layout.chunk_count(), (4, 4));
        let last = layout.chunk(layout.len() - 1);
        assert_eq!((last.i_start, last.i_end), (9, 10));
        assert_eq!((last.j_start, last.j_end), (6, 7));
        assert_partition(&layout, 10, 7);
    }

    #[test]
    fn test_chunk_count_partition() {
        let layout = ChunkLayout::new(10, 10, ChunkSpec::Count { nx: 2, ny: 2 }).unwrap();
        assert_eq!(layout.len(), 4);
        assert_eq!(layout.chunk_size(), (5, 5));
        assert_partition(&layout, 10, 10);

        // More chunks than quads is clamped.
        let layout = ChunkLayout::new(3, 2, ChunkSpec::Count { nx: 8, ny: 8 }).unwrap();
        assert_eq!(layout.chunk_count(), (3, 2));
        assert_partition(&layout, 3, 2);
    }

    #[test]
    fn test_total_chunk_count() {
        let layout = ChunkLayout::new(40, 10, ChunkSpec::TotalCount(4)).unwrap();
        assert_eq!(layout.chunk_count(), (4, 1));
        assert_partition(&layout, 40, 10);

        let layout = ChunkLayout::new(20, 20, ChunkSpec::TotalCount(4)).unwrap();
        assert_eq!(layout.chunk_count(), (2, 2));
    }

    #[test]
    fn test_huge_total_count_is_capped() {
        let layout = ChunkLayout::new(40, 10, ChunkSpec::TotalCount(usize::MAX)).unwrap();
        assert_eq!(layout.chunk_count(), (40, 10));
        assert_eq!(layout.chunk_size(), (1, 1));
        assert_partition(&layout, 40, 10);

        assert_eq!(squarest_factors(1 << 40, 2048, 1024), (2048, 1024));
        assert_eq!(squarest_factors(12, 40, 10), (6, 2));
    }

    #[test]
    fn test_zero_sizes_rejected() {
        assert!(ChunkLayout::new(4, 4, ChunkSpec::Size { nx: 0, ny: 1 }).is_err());
        assert!(ChunkLayout::new(4, 4, ChunkSpec::Count { nx: 1, ny: 0 }).is_err());
        assert!(ChunkLayout::new(4, 4, ChunkSpec::TotalCount(0)).is_err());
    }

    #[test]
    fn test_scan_order_is_row_major() {
        let chunk = Chunk {
            index: 0,
            i_start: 1,
            i_end: 3,
            j_start: 2,
            j_end: 4,
        };
        let quads: Vec<_> = chunk.quads().collect();
        assert_eq!(quads, vec![(1, 2), (2, 2), (1, 3), (2, 3)]);
    }
}
