use crate::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a whole run.
///
/// Failures of individual candidates are not errors; they are reported as
/// [`ImportOutcome`](crate::import::ImportOutcome) values and journaled.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("DCP path \"{}\" could not be found", .0.display())]
    MissingRootPath(PathBuf),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("candidate query failed: {0}")]
    CandidateQuery(sqlx::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
