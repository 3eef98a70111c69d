//! Dynamic component presentation import.
//!
//! Moves presentation files from disk into the presentations table, one row
//! per file, in a way that is safe to run repeatedly:
//!
//! 1. **Discovery** (`source`) - anti-join of metadata rows against
//!    presentation rows, streamed off a cursor
//! 2. **Fan-out** (`pool`) - a fixed number of workers pull candidates from
//!    a bounded channel
//! 3. **Import** (`worker`) - read, archive into `backup/`, insert, and move
//!    the file back if the insert fails
//! 4. **Journal** (`journal`) - one flushed line per candidate outcome
//!
//! # Consistency
//!
//! A failed insert always restores the file to its original path, so the
//! candidate reappears on the next run. The only unrecovered window is a
//! process crash between the archive move and the insert, which leaves the
//! file in `backup/` without a row.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! let journal = Arc::new(Journal::open(&config.log_path).await?);
//! let stats = run_import(&pool, &config, journal).await?;
//! println!("{}", stats);
//! ```

pub mod candidate;
pub mod journal;
pub mod outcome;
pub mod pool;
pub mod source;
pub mod stats;
pub mod store;
pub mod worker;

pub use candidate::CandidateInfo;
pub use journal::Journal;
pub use outcome::ImportOutcome;
pub use pool::WorkerPool;
pub use source::{CandidateSource, PgCandidateSource};
pub use stats::ImportStats;
pub use store::{PgPresentationStore, PresentationStore};
pub use worker::ImportWorker;

use crate::config::ImportConfig;
use crate::error::ImportError;
use sqlx::PgPool;
use std::sync::Arc;

/// Run one import pass against `pool` using `config`.
pub async fn run_import(
    pool: &PgPool,
    config: &ImportConfig,
    journal: Arc<Journal>,
) -> Result<ImportStats, ImportError> {
    if !config.root_exists() {
        return Err(ImportError::MissingRootPath(config.root_path.clone()));
    }

    let source = PgCandidateSource::new(pool.clone(), &config.tables);
    let store = PgPresentationStore::new(pool.clone(), &config.tables);
    let worker = ImportWorker::new(config.root_path.clone(), store, journal);
    let workers = WorkerPool::new(worker, config.concurrency);

    log::info!(
        "importing from {} with {} workers",
        config.root_path.display(),
        workers.concurrency()
    );

    workers.run(&source).await
}
