//! Work batching: partitioning an index range into per-worker folds
//!
//! A fold is a contiguous sub-range of trajectory indices assigned to one
//! worker. The partition is a pure function of `(n, workers)`; it is computed
//! once at dispatch time and discarded after the workers consume it.

use std::ops::Range;

/// Partition `0..n` into at most `workers` contiguous, non-overlapping folds.
///
/// Every fold except possibly the last has length `ceil(n / workers)`; the
/// last fold takes the remainder and may be shorter, but is never empty.
/// When `ceil(n / workers)` does not divide the range evenly the partition
/// may produce fewer than `workers` folds rather than padding with empty
/// ones. Concatenating the folds in order reproduces `0..n` exactly, with no
/// gaps or overlaps.
///
/// # Panics
///
/// Panics when `workers == 0` or `workers > n`. Callers must guard the
/// worker count (the dispatcher clamps it to `n`) rather than silently
/// accepting oversubscribed partitions.
///
/// # Example
///
/// ```rust
/// use traj_rs::ensemble::partition;
///
/// let folds = partition(10, 4);
/// assert_eq!(folds, vec![0..3, 3..6, 6..9, 9..10]);
/// ```
pub fn partition(n: usize, workers: usize) -> Vec<Range<usize>> {
    assert!(workers >= 1, "partition requires at least one worker");
    assert!(
        workers <= n,
        "partition of {} indices across {} workers would produce empty folds",
        n,
        workers
    );

    let chunk = n.div_ceil(workers);
    (0..n)
        .step_by(chunk)
        .map(|start| start..(start + chunk).min(n))
        .collect()
}
