//! Per-candidate import sequence.
//!
//! For each candidate, strictly in order:
//! 1. Skip if no file exists at its path
//! 2. Read the file as UTF-8
//! 3. Move it into the `backup/` tree
//! 4. Insert the presentation row
//! 5. On insert failure, move the file back
//!
//! Every step reports through an [`ImportOutcome`]; nothing here returns an
//! error to the caller.

use crate::import::candidate::CandidateInfo;
use crate::import::journal::Journal;
use crate::import::outcome::ImportOutcome;
use crate::import::store::PresentationStore;
use futures::FutureExt;
use std::any::Any;
use std::io;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const UTF8_BOM: char = '\u{feff}';

pub struct ImportWorker<S> {
    root: PathBuf,
    store: S,
    journal: Arc<Journal>,
}

impl<S: PresentationStore> ImportWorker<S> {
    pub fn new(root: impl Into<PathBuf>, store: S, journal: Arc<Journal>) -> Self {
        Self {
            root: root.into(),
            store,
            journal,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Process one candidate and journal its outcome.
    pub async fn handle(&self, candidate: &CandidateInfo) -> ImportOutcome {
        let outcome = self.process(candidate).await;
        self.record(candidate, &outcome).await;
        outcome
    }

    /// Append the journal line for `outcome`.
    ///
    /// A journal write failure is reported but does not change the outcome.
    pub async fn record(&self, candidate: &CandidateInfo, outcome: &ImportOutcome) {
        let relative_path = candidate.relative_path();
        let line = outcome.log_line(&relative_path).to_string();
        if let Err(e) = self.journal.append(&line).await {
            log::error!(
                "failed to write journal {}: {} (line: {})",
                self.journal.path().display(),
                e,
                line
            );
        }
    }

    /// Run the import sequence for one candidate without journaling.
    pub async fn process(&self, candidate: &CandidateInfo) -> ImportOutcome {
        let file_path = candidate.file_path(&self.root);

        match is_regular_file(&file_path).await {
            Ok(true) => {}
            Ok(false) => return ImportOutcome::SkippedMissingFile,
            Err(e) => return ImportOutcome::UnexpectedError(e.to_string()),
        }

        let content = match tokio::fs::read_to_string(&file_path).await {
            Ok(content) => strip_bom(content),
            Err(e) => return ImportOutcome::UnexpectedError(e.to_string()),
        };

        let backup_path = candidate.backup_path(&self.root);
        if let Err(e) = archive(&file_path, &backup_path).await {
            return ImportOutcome::ArchiveError(e.to_string());
        }

        // A panicking insert still has to go through the restore below.
        let insert = AssertUnwindSafe(self.store.insert_presentation(candidate, &content))
            .catch_unwind()
            .await;

        let failure = match insert {
            Ok(Ok(1)) => return ImportOutcome::Imported,
            Ok(Ok(rows)) => format!("expected 1 affected row, got {}", rows),
            Ok(Err(e)) => e.to_string(),
            Err(payload) => format!("insert panicked: {}", panic_message(payload.as_ref())),
        };

        // The anti-join keys on rows, not files: the file has to be back at
        // its original path for a later run to pick the candidate up again.
        match tokio::fs::rename(&backup_path, &file_path).await {
            Ok(()) => ImportOutcome::InsertError(failure),
            Err(e) => {
                log::error!(
                    "{} stranded in backup after failed insert: {}",
                    backup_path.display(),
                    e
                );
                ImportOutcome::UnexpectedError(format!(
                    "inserting into database: {}; restoring from backup: {}",
                    failure, e
                ))
            }
        }
    }
}

async fn is_regular_file(path: &Path) -> io::Result<bool> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => Ok(metadata.is_file()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Move `from` to `to`, refusing to replace anything already at `to`.
async fn archive(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if tokio::fs::try_exists(to).await? {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("destination {} exists", to.display()),
        ));
    }
    tokio::fs::rename(from, to).await
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn strip_bom(content: String) -> String {
    match content.strip_prefix(UTF8_BOM) {
        Some(rest) => rest.to_string(),
        None => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FailureMode, MemoryCatalog};
    use tempfile::TempDir;

    struct Harness {
        dir: TempDir,
        worker: ImportWorker<Arc<MemoryCatalog>>,
        catalog: Arc<MemoryCatalog>,
    }

    impl Harness {
        async fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let journal = Journal::open(dir.path().join("import.log")).await.unwrap();
            let root = dir.path().join("root");
            std::fs::create_dir_all(&root).unwrap();
            let catalog = Arc::new(MemoryCatalog::new());
            let worker = ImportWorker::new(root, catalog.clone(), Arc::new(journal));
            Self {
                dir,
                worker,
                catalog,
            }
        }

        fn write_source(&self, candidate: &CandidateInfo, content: &[u8]) -> PathBuf {
            let path = candidate.file_path(self.worker.root());
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, content).unwrap();
            path
        }

        fn journal(&self) -> String {
            std::fs::read_to_string(self.dir.path().join("import.log")).unwrap()
        }
    }

    fn xml_candidate() -> CandidateInfo {
        CandidateInfo::new(1, 7, 5, "XML Document")
    }

    #[tokio::test]
    async fn imports_and_archives_file() {
        let h = Harness::new().await;
        let candidate = xml_candidate();
        let source = h.write_source(&candidate, b"<a/>");

        let outcome = h.worker.handle(&candidate).await;

        assert_eq!(outcome, ImportOutcome::Imported);
        assert!(!source.exists());
        let backup = candidate.backup_path(h.worker.root());
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "<a/>");
        assert_eq!(h.catalog.presentations(), vec![(1, 7, 5, "<a/>".to_string())]);
        assert_eq!(h.journal(), "pub1/dcp/xml/dcp5_7.xml imported.\n");
    }

    #[tokio::test]
    async fn missing_file_is_skipped_without_side_effects() {
        let h = Harness::new().await;
        let candidate = xml_candidate();

        let outcome = h.worker.handle(&candidate).await;

        assert_eq!(outcome, ImportOutcome::SkippedMissingFile);
        assert!(h.catalog.presentations().is_empty());
        assert!(!h.worker.root().join("backup").exists());
        assert_eq!(h.journal(), "pub1/dcp/xml/dcp5_7.xml not found.\n");
    }

    #[tokio::test]
    async fn directory_at_file_path_counts_as_missing() {
        let h = Harness::new().await;
        let candidate = xml_candidate();
        std::fs::create_dir_all(candidate.file_path(h.worker.root())).unwrap();

        assert_eq!(
            h.worker.process(&candidate).await,
            ImportOutcome::SkippedMissingFile
        );
    }

    #[tokio::test]
    async fn failed_insert_restores_file() {
        let h = Harness::new().await;
        let candidate = xml_candidate();
        let source = h.write_source(&candidate, b"<a/>");
        h.catalog.fail_insert(&candidate, FailureMode::Error);

        let outcome = h.worker.handle(&candidate).await;

        assert!(matches!(outcome, ImportOutcome::InsertError(_)));
        assert_eq!(std::fs::read_to_string(&source).unwrap(), "<a/>");
        assert!(!candidate.backup_path(h.worker.root()).exists());
        assert!(h.catalog.presentations().is_empty());
        assert!(
            h.journal()
                .starts_with("pub1/dcp/xml/dcp5_7.xml error inserting into database: ")
        );
    }

    #[tokio::test]
    async fn zero_affected_rows_is_an_insert_error() {
        let h = Harness::new().await;
        let candidate = xml_candidate();
        let source = h.write_source(&candidate, b"<a/>");
        h.catalog.fail_insert(&candidate, FailureMode::NoRows);

        let outcome = h.worker.process(&candidate).await;

        assert_eq!(
            outcome,
            ImportOutcome::InsertError("expected 1 affected row, got 0".to_string())
        );
        assert!(source.exists());
        assert!(!candidate.backup_path(h.worker.root()).exists());
    }

    #[tokio::test]
    async fn blocked_backup_tree_is_an_archive_error() {
        let h = Harness::new().await;
        let candidate = xml_candidate();
        let source = h.write_source(&candidate, b"<a/>");
        // A plain file where the backup directory should be.
        std::fs::write(h.worker.root().join("backup"), b"").unwrap();

        let outcome = h.worker.handle(&candidate).await;

        assert!(matches!(outcome, ImportOutcome::ArchiveError(_)));
        assert_eq!(std::fs::read_to_string(&source).unwrap(), "<a/>");
        assert!(h.catalog.presentations().is_empty());
        assert!(
            h.journal()
                .starts_with("pub1/dcp/xml/dcp5_7.xml error archiving ")
        );
    }

    #[tokio::test]
    async fn existing_archive_is_never_replaced() {
        let h = Harness::new().await;
        let candidate = xml_candidate();
        let source = h.write_source(&candidate, b"new");
        let backup = candidate.backup_path(h.worker.root());
        std::fs::create_dir_all(backup.parent().unwrap()).unwrap();
        std::fs::write(&backup, "OLD ARCHIVE").unwrap();
        h.catalog.fail_insert(&candidate, FailureMode::Error);

        let outcome = h.worker.handle(&candidate).await;

        assert!(
            matches!(&outcome, ImportOutcome::ArchiveError(reason) if reason.contains("exists")),
            "unexpected outcome {outcome:?}"
        );
        assert_eq!(std::fs::read_to_string(&source).unwrap(), "new");
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "OLD ARCHIVE");
        assert!(h.catalog.presentations().is_empty());
        assert!(
            h.journal()
                .starts_with("pub1/dcp/xml/dcp5_7.xml error archiving destination ")
        );
    }

    #[tokio::test]
    async fn panicking_insert_restores_file() {
        let h = Harness::new().await;
        let candidate = xml_candidate();
        let source = h.write_source(&candidate, b"<a/>");
        h.catalog.fail_insert(&candidate, FailureMode::Panic);

        let outcome = h.worker.process(&candidate).await;

        assert_eq!(
            outcome,
            ImportOutcome::InsertError("insert panicked: injected insert panic".to_string())
        );
        assert_eq!(std::fs::read_to_string(&source).unwrap(), "<a/>");
        assert!(!candidate.backup_path(h.worker.root()).exists());
        assert!(h.catalog.presentations().is_empty());
    }

    #[tokio::test]
    async fn invalid_utf8_is_unexpected_and_left_in_place() {
        let h = Harness::new().await;
        let candidate = xml_candidate();
        let source = h.write_source(&candidate, &[0xff, 0xfe, 0x00]);

        let outcome = h.worker.process(&candidate).await;

        assert!(matches!(outcome, ImportOutcome::UnexpectedError(_)));
        assert!(source.exists());
        assert!(h.catalog.presentations().is_empty());
    }

    #[tokio::test]
    async fn byte_order_mark_is_dropped() {
        let h = Harness::new().await;
        let candidate = CandidateInfo::new(2, 9, 4, "Plain Text");
        h.write_source(&candidate, "\u{feff}hello".as_bytes());

        assert_eq!(h.worker.process(&candidate).await, ImportOutcome::Imported);
        assert_eq!(h.catalog.presentations(), vec![(2, 9, 4, "hello".to_string())]);
    }

    #[tokio::test]
    async fn html_candidates_use_empty_extension_directory() {
        let h = Harness::new().await;
        let candidate = CandidateInfo::new(3, 11, 2, "HTML");
        let source = h.write_source(&candidate, b"<p>hi</p>");
        assert!(source.ends_with("pub3/dcp/dcp2_11."));

        assert_eq!(h.worker.handle(&candidate).await, ImportOutcome::Imported);
        assert!(
            h.worker
                .root()
                .join("backup/pub3/dcp/dcp2_11.")
                .exists()
        );
        assert_eq!(h.journal(), "pub3/dcp//dcp2_11. imported.\n");
    }
}
