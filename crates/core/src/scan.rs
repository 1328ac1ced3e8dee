//! Batch processing: walk a folder, resolve every book file and store the result.
//!
//! A failure on one file is recorded in the report and never stops the batch.
//! With more than one worker, resolution runs on scoped threads while the
//! calling thread stays the only writer to the store.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use serde::Serialize;
use walkdir::WalkDir;

use crate::book::BookInfo;
use crate::classify::FileClassifier;
use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::progress::{emit_progress, FileStatus, ProgressHandler};
use crate::resolve::Resolver;
use crate::store::BookStore;

pub const MAX_WORKERS: usize = 16;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Files resolved concurrently; 1 is sequential. Clamped to `1..=MAX_WORKERS`.
    pub workers: usize,
    pub follow_links: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            follow_links: false,
        }
    }
}

impl ScanOptions {
    pub fn from_config(cfg: &ScanConfig) -> Self {
        Self {
            workers: cfg.workers,
            follow_links: cfg.follow_links,
        }
    }

    fn worker_count(&self) -> usize {
        self.workers.clamp(1, MAX_WORKERS)
    }
}

/// Cooperative cancellation, checked before each file is started.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FileOutcome {
    Inserted { path: PathBuf, title: String, author: String },
    Duplicate { path: PathBuf, title: String, author: String },
    Failed { path: PathBuf, reason: String },
}

impl FileOutcome {
    pub fn path(&self) -> &Path {
        match self {
            FileOutcome::Inserted { path, .. }
            | FileOutcome::Duplicate { path, .. }
            | FileOutcome::Failed { path, .. } => path,
        }
    }

    fn status(&self) -> FileStatus {
        match self {
            FileOutcome::Inserted { .. } => FileStatus::Inserted,
            FileOutcome::Duplicate { .. } => FileStatus::Duplicate,
            FileOutcome::Failed { .. } => FileStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// Accepted files the batch attempted.
    pub attempted: u64,
    pub inserted: u64,
    pub duplicates: u64,
    pub failed: u64,
    pub cancelled: bool,
    pub outcomes: Vec<FileOutcome>,
}

impl ScanReport {
    fn record(&mut self, outcome: FileOutcome) {
        self.attempted += 1;
        match &outcome {
            FileOutcome::Inserted { .. } => self.inserted += 1,
            FileOutcome::Duplicate { .. } => self.duplicates += 1,
            FileOutcome::Failed { .. } => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }
}

/// Check that `root` is an existing directory.
pub fn validate_root(root: &Path) -> Result<(), ScanError> {
    let invalid = |reason: &str| ScanError::InvalidRoot {
        path: root.display().to_string(),
        reason: reason.to_string(),
    };
    if !root.exists() {
        return Err(invalid("does not exist"));
    }
    if !root.is_dir() {
        return Err(invalid("not a directory"));
    }
    Ok(())
}

/// Every accepted book file under `root`, in file-name order.
pub fn collect_candidates(root: &Path, classifier: &FileClassifier, follow_links: bool) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(follow_links)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| classifier.is_book_file(path))
        .collect()
}

/// Resolve and store every book file under `root`.
///
/// Only an invalid root aborts the run. The store is borrowed; the caller
/// opened it and closes it.
pub fn process_folder(
    root: &Path,
    classifier: &FileClassifier,
    resolver: &Resolver,
    store: &BookStore,
    options: &ScanOptions,
    cancel: &CancelToken,
    progress: Option<&dyn ProgressHandler>,
) -> Result<ScanReport, ScanError> {
    validate_root(root)?;

    let candidates = collect_candidates(root, classifier, options.follow_links);
    let total = candidates.len() as u64;
    let workers = options.worker_count().min(candidates.len().max(1));
    tracing::info!(root = %root.display(), files = total, workers, "Scanning folder");

    let mut report = ScanReport::default();
    let mut finish = |path: PathBuf, resolved: Result<BookInfo, String>| {
        let outcome = store_result(store, path, resolved);
        report.record(outcome);
        if let Some(last) = report.outcomes.last() {
            emit_progress(progress, report.attempted, total, last.path(), last.status());
        }
    };

    if workers == 1 {
        for path in candidates.iter() {
            if cancel.is_cancelled() {
                break;
            }
            let resolved = resolve_guarded(resolver, path);
            finish(path.clone(), resolved);
        }
    } else {
        let next = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel::<(PathBuf, Result<BookInfo, String>)>();
        thread::scope(|s| {
            for _ in 0..workers {
                let tx = tx.clone();
                let (next, candidates) = (&next, &candidates);
                s.spawn(move || loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let Some(path) = candidates.get(next.fetch_add(1, Ordering::SeqCst)) else {
                        break;
                    };
                    let resolved = resolve_guarded(resolver, path);
                    if tx.send((path.clone(), resolved)).is_err() {
                        break;
                    }
                });
            }
            drop(tx);

            for (path, resolved) in rx {
                finish(path, resolved);
            }
        });
    }

    report.cancelled = cancel.is_cancelled() && report.attempted < total;
    if report.cancelled {
        tracing::warn!(attempted = report.attempted, total, "Scan cancelled");
    }
    tracing::info!(
        attempted = report.attempted,
        inserted = report.inserted,
        duplicates = report.duplicates,
        failed = report.failed,
        "Scan finished"
    );
    Ok(report)
}

fn resolve_guarded(resolver: &Resolver, path: &Path) -> Result<BookInfo, String> {
    catch_unwind(AssertUnwindSafe(|| resolver.resolve(path))).map_err(|panic| {
        panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "resolver panicked".to_string())
    })
}

fn store_result(store: &BookStore, path: PathBuf, resolved: Result<BookInfo, String>) -> FileOutcome {
    let info = match resolved {
        Ok(info) => info,
        Err(reason) => {
            tracing::error!(path = %path.display(), "Could not resolve: {}", reason);
            return FileOutcome::Failed { path, reason };
        }
    };
    let title = info.title.unwrap_or_default();
    let author = info.author.unwrap_or_default();

    match store.insert(&title, &author) {
        Ok(true) => {
            tracing::info!(path = %path.display(), %title, %author, "Stored");
            FileOutcome::Inserted { path, title, author }
        }
        Ok(false) => {
            tracing::info!(path = %path.display(), %title, %author, "Already in store");
            FileOutcome::Duplicate { path, title, author }
        }
        Err(e) => {
            tracing::error!(path = %path.display(), %title, %author, "Could not store: {}", e);
            FileOutcome::Failed {
                path,
                reason: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::BookRecord;
    use crate::fixtures;
    use crate::progress::ProgressEvent;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    fn library() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fixtures::write_pdf(&dir.path().join("book1.pdf"), Some("Foo"), Some("Bar"));
        fixtures::write_epub(&dir.path().join("Baz - Qux.epub"), None, &[]);
        std::fs::write(dir.path().join("notes.txt"), "not a book").unwrap();
        dir
    }

    fn scan(root: &Path, store: &BookStore, options: ScanOptions) -> ScanReport {
        process_folder(
            root,
            &FileClassifier::new(),
            &Resolver::new(),
            store,
            &options,
            &CancelToken::new(),
            None,
        )
        .unwrap()
    }

    fn pairs(store: &BookStore) -> Vec<(String, String)> {
        let mut pairs: Vec<_> = store
            .get_all()
            .unwrap()
            .into_iter()
            .map(|BookRecord { title, author, .. }| (title, author))
            .collect();
        pairs.sort();
        pairs
    }

    fn pair(title: &str, author: &str) -> (String, String) {
        (title.to_string(), author.to_string())
    }

    #[test]
    fn end_to_end_offline() {
        let dir = library();
        let store = BookStore::open_in_memory().unwrap();

        let report = scan(dir.path(), &store, ScanOptions::default());
        assert_eq!(report.attempted, 2);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(pairs(&store), vec![pair("Baz", "Qux"), pair("Foo", "Bar")]);
    }

    #[test]
    fn second_run_inserts_nothing() {
        let dir = library();
        let store = BookStore::open_in_memory().unwrap();

        scan(dir.path(), &store, ScanOptions::default());
        let before = store.get_all().unwrap();
        let again = scan(dir.path(), &store, ScanOptions::default());

        assert_eq!(again.attempted, 2);
        assert_eq!(again.inserted, 0);
        assert_eq!(again.duplicates, 2);
        assert_eq!(store.get_all().unwrap(), before);
    }

    #[test]
    fn walks_subfolders_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("b/nested")).unwrap();
        fixtures::write_epub(&dir.path().join("b/nested/Emma (Jane Austen).epub"), None, &[]);
        fixtures::write_pdf(&dir.path().join("a.pdf"), Some("Hyperion"), Some("Dan Simmons"));

        let store = BookStore::open_in_memory().unwrap();
        let report = scan(dir.path(), &store, ScanOptions::default());
        let titles: Vec<_> = store.get_all().unwrap().into_iter().map(|r| r.title).collect();
        assert_eq!(report.attempted, 2);
        assert_eq!(titles, vec!["Hyperion", "Emma"]);
    }

    #[test]
    fn parallel_matches_sequential() {
        let dir = library();
        for i in 0..12 {
            fixtures::write_pdf(&dir.path().join(format!("extra{i}.pdf")), Some(format!("Title {i}").as_str()), None);
        }

        let sequential = BookStore::open_in_memory().unwrap();
        scan(dir.path(), &sequential, ScanOptions::default());

        let parallel = BookStore::open_in_memory().unwrap();
        let report = scan(dir.path(), &parallel, ScanOptions { workers: 4, follow_links: false });

        assert_eq!(report.attempted, 14);
        assert_eq!(pairs(&parallel), pairs(&sequential));
    }

    #[test]
    fn cancelled_before_start_attempts_nothing() {
        let dir = library();
        let store = BookStore::open_in_memory().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();

        let report = process_folder(
            dir.path(),
            &FileClassifier::new(),
            &Resolver::new(),
            &store,
            &ScanOptions::default(),
            &cancel,
            None,
        )
        .unwrap();
        assert_eq!(report.attempted, 0);
        assert!(report.cancelled);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn invalid_root_is_rejected_before_processing() {
        let dir = tempfile::tempdir().unwrap();
        let store = BookStore::open_in_memory().unwrap();
        let missing = dir.path().join("nope");
        let file = dir.path().join("file.pdf");
        std::fs::write(&file, b"%PDF-").unwrap();

        for root in [&missing, &file] {
            let result = process_folder(
                root,
                &FileClassifier::new(),
                &Resolver::new(),
                &store,
                &ScanOptions::default(),
                &CancelToken::new(),
                None,
            );
            assert!(matches!(result, Err(ScanError::InvalidRoot { .. })));
        }
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<ProgressEvent>>);

    impl ProgressHandler for Collect {
        fn on_progress(&self, event: ProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn reports_progress_per_file() {
        let dir = library();
        let store = BookStore::open_in_memory().unwrap();
        store.insert("Foo", "Bar").unwrap();
        let progress = Collect::default();

        process_folder(
            dir.path(),
            &FileClassifier::new(),
            &Resolver::new(),
            &store,
            &ScanOptions::default(),
            &CancelToken::new(),
            Some(&progress),
        )
        .unwrap();

        let events = progress.0.lock().unwrap();
        let seen: Vec<_> = events.iter().map(|e| (e.current, e.total, e.status)).collect();
        assert_eq!(seen, vec![(1, 2, FileStatus::Inserted), (2, 2, FileStatus::Duplicate)]);
    }
}
