//! Partitioning of output rows across worker threads.
//!
//! Rows are split into contiguous, nearly equal ranges assigned once up
//! front; there is no work stealing or re-balancing, so a run is
//! reproducible for any thread count. With one thread the filtering runs
//! inline in the calling thread.

use crate::worker::{filter_rows, FilterContext, WorkerStats};
use std::ops::Range;

/// Contiguous row ranges for `n_threads` workers; the last range absorbs
/// the remainder so no row is dropped.
pub fn partition_rows(n_rows: usize, n_threads: usize) -> Vec<Range<usize>> {
    let n_threads = n_threads.clamp(1, n_rows.max(1));
    let base = n_rows / n_threads;
    (0..n_threads)
        .map(|i| {
            let start = i * base;
            let stop = if i == n_threads - 1 {
                n_rows
            } else {
                (i + 1) * base
            };
            start..stop
        })
        .collect()
}

/// Run the filter over all output rows, merging per-worker diagnostics
/// after the join.
pub(crate) fn run(
    ctx: &FilterContext,
    out: &mut [f32],
    n_columns: usize,
    n_threads: usize,
) -> WorkerStats {
    let n_rows = out.len() / n_columns;
    let ranges = partition_rows(n_rows, n_threads);

    if ranges.len() == 1 {
        return filter_rows(ctx, 0..n_rows, out);
    }

    let mut merged = WorkerStats::default();
    std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(ranges.len());
        let mut rest = out;
        for range in ranges {
            let slice = std::mem::take(&mut rest);
            let (chunk, tail) = slice.split_at_mut(range.len() * n_columns);
            rest = tail;
            handles.push(scope.spawn(move || filter_rows(ctx, range, chunk)));
        }
        for handle in handles {
            match handle.join() {
                Ok(stats) => merged.merge(stats),
                Err(payload) => std::panic::resume_unwind(payload),
            }
        }
    });
    merged
}
