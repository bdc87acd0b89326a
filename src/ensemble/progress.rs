//! Run-completion progress reporting
//!
//! The reporter is constructed with a fixed total and can be advanced
//! concurrently from any execution context. Rendering goes through
//! `indicatif`, which coalesces and throttles redraws internally, so workers
//! never need to know whether they are "the" rendering thread: shared-pool
//! workers hit the atomic counter directly, while the streaming strategies
//! route every advancement through the single aggregator that owns the
//! reporter.
//!
//! `finish()` unconditionally pins the reported value to the total, so a
//! successful run never under-reports even if increments were still pending
//! when the last trajectory landed. A failed run leaves the reporter
//! non-finalized, which is visible to the caller.

use std::sync::atomic::{AtomicUsize, Ordering};

use indicatif::{ProgressBar, ProgressStyle};

/// Thread-safe completion counter with a rendered progress bar.
pub struct ProgressReporter {
    bar: ProgressBar,
    count: AtomicUsize,
    total: usize,
}

impl ProgressReporter {
    /// Create a reporter for `total` trajectories. When `visible` is false
    /// the bar is a hidden no-op but the counter still works, which keeps
    /// the engine code free of display conditionals.
    pub fn new(total: usize, visible: bool) -> Self {
        let bar = if visible {
            let bar = ProgressBar::new(total as u64);
            bar.set_style(
                ProgressStyle::with_template(
                    "{bar:40.cyan/blue} {pos}/{len} trajectories ({elapsed})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        } else {
            ProgressBar::hidden()
        };

        Self {
            bar,
            count: AtomicUsize::new(0),
            total,
        }
    }

    /// Record one completed trajectory. Callable concurrently.
    pub fn advance(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.bar.inc(1);
    }

    /// Finalize the reporter to its total, regardless of how many
    /// increments have been applied so far.
    pub fn finish(&self) {
        self.count.store(self.total, Ordering::SeqCst);
        self.bar.set_position(self.total as u64);
        self.bar.finish();
    }

    /// Completions recorded so far.
    pub fn completed(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// The fixed total this reporter was constructed with.
    pub fn total(&self) -> usize {
        self.total
    }

    /// True once `finish()` has pinned the reporter to its total.
    pub fn is_finalized(&self) -> bool {
        self.bar.is_finished() && self.completed() == self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_advance_counts() {
        let reporter = ProgressReporter::new(3, false);
        assert_eq!(reporter.completed(), 0);
        reporter.advance();
        reporter.advance();
        assert_eq!(reporter.completed(), 2);
        assert!(!reporter.is_finalized());
    }

    #[test]
    fn test_concurrent_advances_then_finish() {
        let reporter = ProgressReporter::new(80, false);

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..10 {
                        reporter.advance();
                    }
                });
            }
        });

        assert_eq!(reporter.completed(), 80);
        reporter.finish();
        assert!(reporter.is_finalized());
    }

    #[test]
    fn test_finish_pins_to_total_even_when_short() {
        // Increments lost in a coalescing path must not leave the reporter
        // under-reporting after finalization.
        let reporter = ProgressReporter::new(10, false);
        reporter.advance();
        reporter.finish();
        assert_eq!(reporter.completed(), 10);
        assert!(reporter.is_finalized());
    }

    #[test]
    fn test_hidden_and_visible_behave_identically() {
        let hidden = ProgressReporter::new(2, false);
        let visible = ProgressReporter::new(2, true);
        hidden.advance();
        visible.advance();
        hidden.finish();
        visible.finish();
        assert!(hidden.is_finalized());
        assert!(visible.is_finalized());
    }
}
