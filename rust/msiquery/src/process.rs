//! Block-parallel map over an index range.
//!
//! `[0, n)` is cut into at most `threads` contiguous blocks of `ceil(n / threads)`
//! items (the last one possibly shorter) and every block runs as one task on a
//! rayon pool sized for the call. The call returns only after every block has
//! finished. Block results come back in block order, so callers scatter
//! per-item values into shared destinations after the barrier instead of
//! writing to them from inside a block.

use rayon::prelude::*;
use tracing::debug;

use crate::errors::{
    ConfigError,
    DataProcessingError,
    MsiQueryError,
    Result,
};

/// Half-open item range handled by one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub id: usize,
    pub start: usize,
    pub end: usize,
}

impl Block {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

/// Partitions `[0, n)` into contiguous, non-overlapping blocks.
///
/// ```
/// use msiquery::process::partition;
///
/// let blocks = partition(10, 4);
/// let bounds: Vec<_> = blocks.iter().map(|b| (b.start, b.end)).collect();
/// assert_eq!(bounds, vec![(0, 3), (3, 6), (6, 9), (9, 10)]);
/// assert!(partition(0, 4).is_empty());
/// ```
pub fn partition(n: usize, threads: usize) -> Vec<Block> {
    if n == 0 {
        return Vec::new();
    }
    let threads = threads.max(1);
    let block_size = n.div_ceil(threads);
    (0..n)
        .step_by(block_size)
        .enumerate()
        .map(|(id, start)| Block {
            id,
            start,
            end: (start + block_size).min(n),
        })
        .collect()
}

/// Runs `task(block_id, start, end)` for every block and waits for all of them.
///
/// A failing block does not stop its siblings; all failures are reported once,
/// as [`DataProcessingError::BlockFailures`], after every block has returned.
pub fn map_blocks<R, F>(n: usize, threads: usize, task: F) -> Result<Vec<R>>
where
    R: Send,
    F: Fn(usize, usize, usize) -> std::result::Result<R, DataProcessingError> + Sync,
{
    if threads == 0 {
        return Err(ConfigError::InvalidThreadCount(threads).into());
    }
    let blocks = partition(n, threads);
    if blocks.is_empty() {
        return Ok(Vec::new());
    }
    debug!("Mapping {} items over {} blocks", n, blocks.len());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| MsiQueryError::custom(format!("Unable to build thread pool: {}", e)))?;

    let results: Vec<std::result::Result<R, DataProcessingError>> = pool.install(|| {
        blocks
            .par_iter()
            .map(|b| task(b.id, b.start, b.end))
            .collect()
    });

    let mut out = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for (block_id, res) in results.into_iter().enumerate() {
        match res {
            Ok(x) => out.push(x),
            Err(e) => failures.push((block_id, e)),
        }
    }
    if failures.is_empty() {
        Ok(out)
    } else {
        Err(DataProcessingError::BlockFailures(failures).into())
    }
}
