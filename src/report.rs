//! Reconciliation statistics.
//!
//! [`summarize`] is a pure function of a [`Classification`]. It counts distinct
//! equivalence keys rather than duplicate records, so a name that matched as a
//! 2 × 3 cross product still counts once.

use std::fmt;

use bytesize::ByteSize;
use serde::Serialize;

use crate::duplicates::Classification;
use crate::scanner::TreeSide;

/// Aggregate statistics derived from a classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationReport {
    /// Classified files in tree A
    pub count_a: usize,
    /// Classified files in tree B
    pub count_b: usize,
    /// Distinct equivalence keys shared by both trees
    pub duplicate_count: usize,
    /// Files with no counterpart in the other tree
    pub unique_count: usize,
    /// `duplicate_count / (count_a + count_b)` as a percentage
    pub deduplication_rate: f64,
    /// Number of duplicate records (cross-product pairs in name mode)
    pub pair_count: usize,
    /// Non-representative copies of content duplicates
    pub shadowed_count: usize,
    /// Total bytes of the classified files in both trees
    pub total_bytes: u64,
}

impl ReconciliationReport {
    /// Whether any key is shared by both trees.
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        self.duplicate_count > 0
    }

    /// Total size as a human-readable string.
    #[must_use]
    pub fn total_size_display(&self) -> String {
        ByteSize::b(self.total_bytes).to_string()
    }
}

impl fmt::Display for ReconciliationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tree A:             {} files", self.count_a)?;
        writeln!(f, "Tree B:             {} files", self.count_b)?;
        writeln!(
            f,
            "Duplicates:         {} ({} pairs)",
            self.duplicate_count, self.pair_count
        )?;
        if self.shadowed_count > 0 {
            writeln!(f, "Extra copies:       {}", self.shadowed_count)?;
        }
        writeln!(f, "Unique:             {}", self.unique_count)?;
        writeln!(f, "Total size:         {}", self.total_size_display())?;
        write!(f, "Deduplication rate: {:.1}%", self.deduplication_rate)
    }
}

/// Derive statistics from a classification.
#[must_use]
pub fn summarize(classification: &Classification) -> ReconciliationReport {
    let entries_a = classification.entries_of(TreeSide::A);
    let entries_b = classification.entries_of(TreeSide::B);
    let count_a = entries_a.len();
    let count_b = entries_b.len();
    let duplicate_count = classification.duplicate_key_count();
    let total_bytes = entries_a
        .iter()
        .chain(entries_b.iter())
        .map(|e| e.size)
        .sum();

    ReconciliationReport {
        count_a,
        count_b,
        duplicate_count,
        unique_count: classification.unique_a.len() + classification.unique_b.len(),
        deduplication_rate: deduplication_rate(duplicate_count, count_a + count_b),
        pair_count: classification.duplicates.len(),
        shadowed_count: classification.shadowed.len(),
        total_bytes,
    }
}

/// Percentage of distinct duplicate keys over all files; 0 for no files.
#[must_use]
pub fn deduplication_rate(duplicate_count: usize, total_files: usize) -> f64 {
    if total_files == 0 {
        0.0
    } else {
        duplicate_count as f64 / total_files as f64 * 100.0
    }
}
