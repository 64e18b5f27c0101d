//! Eligible/processed counters for one run.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Tracks how many eligible files a run has discovered and how many it has finished.
///
/// The total grows while traversal lists new directories, so the percentage
/// can dip when a deep directory adds files after shallower ones completed.
/// Only the run that owns the accumulator writes to it.
#[derive(Debug, Default)]
pub struct ProgressAccumulator {
    total_eligible: AtomicUsize,
    processed: AtomicUsize,
}

impl ProgressAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds newly discovered eligible files to the total.
    pub fn discover(&self, count: usize) {
        self.total_eligible.fetch_add(count, Ordering::SeqCst);
    }

    /// Fixes the total up front, used when the tree is prescanned.
    pub fn set_total(&self, total: usize) {
        self.total_eligible.store(total, Ordering::SeqCst);
    }

    /// Marks one file finished, whatever its outcome. Returns the new processed count.
    pub fn complete_one(&self) -> usize {
        self.processed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn total_eligible(&self) -> usize {
        self.total_eligible.load(Ordering::SeqCst)
    }

    /// `floor(100 * processed / total)`, with an empty run reported as 0%.
    pub fn percent_complete(&self) -> u8 {
        percent(self.processed(), self.total_eligible())
    }

    pub fn is_complete(&self) -> bool {
        self.processed() == self.total_eligible()
    }
}

pub(crate) fn percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let value = (processed as u128 * 100) / total as u128;
    value.min(100) as u8
}
