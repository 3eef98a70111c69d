//! Import statistics tracking.
//!
//! Counts terminal outcomes per worker; the pool merges them into the run total.

use crate::import::outcome::ImportOutcome;
use std::fmt;

/// Outcome counts for a run (or for one worker's share of it).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStats {
    /// Files moved to the archive with a matching new row
    pub imported: usize,
    /// Candidates whose file was not at its expected path
    pub skipped_missing: usize,
    pub archive_errors: usize,
    /// Inserts that failed and were rolled back
    pub insert_errors: usize,
    pub unexpected_errors: usize,
}

impl ImportStats {
    pub fn record(&mut self, outcome: &ImportOutcome) {
        match outcome {
            ImportOutcome::Imported => self.imported += 1,
            ImportOutcome::SkippedMissingFile => self.skipped_missing += 1,
            ImportOutcome::ArchiveError(_) => self.archive_errors += 1,
            ImportOutcome::InsertError(_) => self.insert_errors += 1,
            ImportOutcome::UnexpectedError(_) => self.unexpected_errors += 1,
        }
    }

    /// Merge another ImportStats into this one by summing all counts.
    pub fn merge(&mut self, other: ImportStats) {
        self.imported += other.imported;
        self.skipped_missing += other.skipped_missing;
        self.archive_errors += other.archive_errors;
        self.insert_errors += other.insert_errors;
        self.unexpected_errors += other.unexpected_errors;
    }

    pub fn failed(&self) -> usize {
        self.archive_errors + self.insert_errors + self.unexpected_errors
    }

    pub fn total(&self) -> usize {
        self.imported + self.skipped_missing + self.failed()
    }
}

impl fmt::Display for ImportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} imported, {} not found, {} failed",
            self.imported,
            self.skipped_missing,
            self.failed()
        )
    }
}
