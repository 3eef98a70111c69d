//! Terminal outcome of a single candidate.

use std::fmt;

/// What happened to one candidate during a run.
///
/// Outcomes are never persisted; each one produces exactly one journal line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported,
    SkippedMissingFile,
    ArchiveError(String),
    InsertError(String),
    UnexpectedError(String),
}

impl ImportOutcome {
    /// Journal line for a candidate at `relative_path`.
    pub fn log_line<'a>(&'a self, relative_path: &'a str) -> LogLine<'a> {
        LogLine {
            relative_path,
            outcome: self,
        }
    }
}

/// Borrowed formatter for one journal line.
pub struct LogLine<'a> {
    relative_path: &'a str,
    outcome: &'a ImportOutcome,
}

impl fmt::Display for LogLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.relative_path;
        match self.outcome {
            ImportOutcome::Imported => write!(f, "{} imported.", path),
            ImportOutcome::SkippedMissingFile => write!(f, "{} not found.", path),
            ImportOutcome::ArchiveError(reason) => {
                write!(f, "{} error archiving {}.", path, reason)
            }
            ImportOutcome::InsertError(reason) => {
                write!(f, "{} error inserting into database: {}", path, reason)
            }
            ImportOutcome::UnexpectedError(reason) => write!(f, "{} error {}.", path, reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATH: &str = "pub1/dcp/xml/dcp5_7.xml";

    #[test]
    fn log_lines_match_journal_format() {
        let cases = [
            (ImportOutcome::Imported, "pub1/dcp/xml/dcp5_7.xml imported."),
            (
                ImportOutcome::SkippedMissingFile,
                "pub1/dcp/xml/dcp5_7.xml not found.",
            ),
            (
                ImportOutcome::ArchiveError("permission denied".into()),
                "pub1/dcp/xml/dcp5_7.xml error archiving permission denied.",
            ),
            (
                ImportOutcome::InsertError("expected 1 affected row, got 0".into()),
                "pub1/dcp/xml/dcp5_7.xml error inserting into database: expected 1 affected row, got 0",
            ),
            (
                ImportOutcome::UnexpectedError("stream did not contain valid UTF-8".into()),
                "pub1/dcp/xml/dcp5_7.xml error stream did not contain valid UTF-8.",
            ),
        ];

        for (outcome, expected) in cases {
            assert_eq!(outcome.log_line(PATH).to_string(), expected);
        }
    }
}
