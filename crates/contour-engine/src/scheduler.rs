//! Chunk dispatch and the single-threaded merge.

use rayon::prelude::*;

use crate::chunk::Chunk;
use crate::error::Result;
use crate::fill::{rings_from_pieces, RingArena};
use crate::trace::{canonicalize, stitch, Piece, TracedLine};

/// Runs per-chunk work either on the calling thread or on a worker pool.
#[derive(Debug)]
pub enum Scheduler {
    Serial,
    Pool {
        pool: rayon::ThreadPool,
        threads: usize,
    },
}

impl Scheduler {
    pub fn serial() -> Self {
        Self::Serial
    }

    /// Build a pool of `threads` workers named `contour-worker-{id}`. The pool
    /// lives as long as the scheduler.
    pub fn pool(threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|id| format!("contour-worker-{}", id))
            .build()?;
        Ok(Self::Pool { pool, threads })
    }

    pub fn thread_count(&self) -> usize {
        match self {
            Self::Serial => 1,
            Self::Pool { threads, .. } => *threads,
        }
    }

    /// Run `work` on every chunk and return results in chunk order.
    ///
    /// The first failing chunk aborts the run; partial results are dropped.
    pub fn run<T, F>(&self, chunks: &[Chunk], work: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&Chunk) -> Result<T> + Sync,
    {
        let traced = |chunk: &Chunk| {
            let result = work(chunk);
            tracing::trace!(
                chunk = chunk.index,
                quads = chunk.quad_count(),
                ok = result.is_ok(),
                "chunk traced"
            );
            result
        };

        match self {
            Self::Serial => chunks.iter().map(traced).collect(),
            Self::Pool { pool, .. } => pool.install(|| chunks.par_iter().map(traced).collect()),
        }
    }
}

/// Merged query result: one value for the whole grid, or one per chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum Merged<T> {
    Combined(T),
    PerChunk(Vec<T>),
}

/// Merge traced line fragments. Chunked layouts keep chunk boundaries;
/// otherwise fragments are stitched across chunks.
pub fn merge_lines(per_chunk: Vec<Vec<TracedLine>>, chunked: bool) -> Merged<Vec<TracedLine>> {
    if chunked {
        let chunks = per_chunk
            .into_iter()
            .map(|mut lines| {
                canonicalize(&mut lines);
                lines
            })
            .collect();
        return Merged::PerChunk(chunks);
    }

    let mut lines = stitch(per_chunk.into_iter().flatten().collect());
    canonicalize(&mut lines);
    Merged::Combined(lines)
}

/// Trace the band pieces of every chunk as one set and assemble the rings.
///
/// Rings are traced after the merge rather than stitched, so pieces that
/// cancel across a chunk boundary are removed like any others.
pub fn merge_ring_pieces(per_chunk: Vec<Vec<Piece>>) -> Result<Merged<RingArena>> {
    let pieces = per_chunk.into_iter().flatten().collect();
    Ok(Merged::Combined(rings_from_pieces(pieces, 0)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkLayout;
    use crate::config::ChunkSpec;
    use crate::error::ContourError;

    fn chunks() -> Vec<Chunk> {
        ChunkLayout::new(8, 8, ChunkSpec::Size { nx: 2, ny: 2 })
            .unwrap()
            .chunks()
    }

    #[test]
    fn test_serial_keeps_order() {
        let scheduler = Scheduler::serial();
        let out = scheduler.run(&chunks(), |c| Ok(c.index)).unwrap();
        assert_eq!(out, (0..16).collect::<Vec<_>>());
        assert_eq!(scheduler.thread_count(), 1);
    }

    #[test]
    fn test_pool_keeps_order() {
        let scheduler = Scheduler::pool(4).unwrap();
        assert_eq!(scheduler.thread_count(), 4);
        let out = scheduler
            .run(&chunks(), |c| {
                let name = std::thread::current().name().map(str::to_string);
                assert!(name.is_some_and(|n| n.starts_with("contour-worker-")));
                Ok(c.index * 10)
            })
            .unwrap();
        assert_eq!(out, (0..16).map(|i| i * 10).collect::<Vec<_>>());
    }

    #[test]
    fn test_error_aborts_run() {
        for scheduler in [Scheduler::serial(), Scheduler::pool(2).unwrap()] {
            let err = scheduler
                .run(&chunks(), |c| {
                    if c.index == 5 {
                        Err(ContourError::chunk_failed(5, "boom"))
                    } else {
                        Ok(c.index)
                    }
                })
                .unwrap_err();
            assert_eq!(err, ContourError::chunk_failed(5, "boom"));
        }
    }

    #[test]
    fn test_merge_empty() {
        assert_eq!(merge_lines(vec![vec![], vec![]], false), Merged::Combined(vec![]));
        assert_eq!(
            merge_lines(vec![vec![], vec![]], true),
            Merged::PerChunk(vec![vec![], vec![]])
        );
        assert_eq!(
            merge_ring_pieces(vec![vec![], vec![]]).unwrap(),
            Merged::Combined(RingArena::default())
        );
    }
}
