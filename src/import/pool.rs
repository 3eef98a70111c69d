//! Bounded fan-out of candidates to import workers.
//!
//! The candidate stream is drained by the calling task into a bounded
//! channel; a fixed set of worker tasks pull from it. Each candidate runs in
//! its own task so a panic costs only that candidate.

use crate::error::ImportError;
use crate::import::candidate::CandidateInfo;
use crate::import::outcome::ImportOutcome;
use crate::import::source::CandidateSource;
use crate::import::stats::ImportStats;
use crate::import::store::PresentationStore;
use crate::import::worker::ImportWorker;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

/// Default number of concurrent workers.
pub const DEFAULT_CONCURRENCY: usize = 8;

type SharedReceiver = Arc<Mutex<mpsc::Receiver<CandidateInfo>>>;

pub struct WorkerPool<S> {
    worker: Arc<ImportWorker<S>>,
    concurrency: usize,
}

impl<S: PresentationStore> WorkerPool<S> {
    pub fn new(worker: ImportWorker<S>, concurrency: usize) -> Self {
        Self {
            worker: Arc::new(worker),
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Import every candidate `source` yields.
    pub async fn run<C>(&self, source: &C) -> Result<ImportStats, ImportError>
    where
        C: CandidateSource + ?Sized,
    {
        self.run_stream(source.candidates()).await
    }

    /// Drive `candidates` through the workers and wait for all of them.
    ///
    /// Per-candidate failures are counted, never returned. A stream error
    /// stops dispatch; candidates already handed out still finish before the
    /// error is returned.
    pub async fn run_stream<St>(&self, candidates: St) -> Result<ImportStats, ImportError>
    where
        St: Stream<Item = Result<CandidateInfo, sqlx::Error>>,
    {
        let (tx, rx) = mpsc::channel(self.concurrency);
        let rx: SharedReceiver = Arc::new(Mutex::new(rx));

        let mut workers = JoinSet::new();
        for id in 0..self.concurrency {
            workers.spawn(worker_loop(id, self.worker.clone(), rx.clone()));
        }

        let dispatched = dispatch(candidates, tx).await;

        let mut stats = ImportStats::default();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(worker_stats) => stats.merge(worker_stats),
                Err(e) => log::error!("import worker task failed: {}", e),
            }
        }

        match dispatched {
            Ok(count) => {
                log::info!("dispatched {} candidates: {}", count, stats);
                Ok(stats)
            }
            Err(e) => {
                log::error!("candidate stream failed after {}: {}", stats, e);
                Err(ImportError::CandidateQuery(e))
            }
        }
    }
}

async fn dispatch<St>(
    candidates: St,
    tx: mpsc::Sender<CandidateInfo>,
) -> Result<usize, sqlx::Error>
where
    St: Stream<Item = Result<CandidateInfo, sqlx::Error>>,
{
    let mut candidates = std::pin::pin!(candidates);
    let mut count = 0;

    while let Some(candidate) = candidates.next().await {
        let candidate = candidate?;
        if tx.send(candidate).await.is_err() {
            log::warn!("all import workers exited, stopping dispatch");
            break;
        }
        count += 1;
    }

    Ok(count)
}

async fn worker_loop<S: PresentationStore>(
    id: usize,
    worker: Arc<ImportWorker<S>>,
    rx: SharedReceiver,
) -> ImportStats {
    let mut stats = ImportStats::default();

    loop {
        let next = rx.lock().await.recv().await;
        let Some(candidate) = next else {
            break;
        };

        let task_worker = worker.clone();
        let task_candidate = candidate.clone();
        let task = tokio::spawn(async move { task_worker.process(&task_candidate).await });

        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) => ImportOutcome::UnexpectedError(format!("import task failed: {}", e)),
        };

        worker.record(&candidate, &outcome).await;
        stats.record(&outcome);
    }

    log::debug!("import worker {} finished: {}", id, stats);
    stats
}
