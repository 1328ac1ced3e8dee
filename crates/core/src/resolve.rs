//! Metadata resolution: an ordered fallback chain that always ends with a
//! usable title and author.
//!
//! Stages run in trust order (embedded, remote, filename). A stage only fills
//! fields that earlier stages left empty, and stages after the point where both
//! fields are known are skipped. Finalization always runs last and substitutes
//! the file stem and the unknown-author sentinel for whatever is still missing.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::book::BookInfo;
use crate::config::{AppConfig, DEFAULT_UNKNOWN_AUTHOR};
use crate::error::ConfigError;
use crate::filename;
use crate::lookup::LookupChain;
use crate::readers;
use crate::security::ReadLimits;

/// Title used when a file has no usable stem at all (e.g. `.pdf`).
pub const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Embedded,
    Remote,
    Filename,
    Finalize,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Source::Embedded => "embedded",
            Source::Remote => "remote",
            Source::Filename => "filename",
            Source::Finalize => "finalize",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StageOutcome {
    /// Title and author both found.
    Complete,
    /// Only one of the two found.
    Partial,
    Miss,
    /// The source was unavailable.
    Failed(String),
    /// Not needed; earlier stages already produced both fields.
    Skipped,
}

impl StageOutcome {
    fn of(info: &BookInfo) -> Self {
        if info.is_complete() {
            StageOutcome::Complete
        } else if info.is_empty() {
            StageOutcome::Miss
        } else {
            StageOutcome::Partial
        }
    }
}

impl std::fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageOutcome::Complete => f.write_str("complete"),
            StageOutcome::Partial => f.write_str("partial"),
            StageOutcome::Miss => f.write_str("miss"),
            StageOutcome::Failed(reason) => write!(f, "failed: {reason}"),
            StageOutcome::Skipped => f.write_str("skipped"),
        }
    }
}

/// One stage outcome for one file.
#[derive(Debug, Clone)]
pub struct StageEvent {
    pub path: PathBuf,
    pub source: Source,
    pub outcome: StageOutcome,
    pub duration: Duration,
}

/// Receives every stage event. Implement this to collect statistics or to
/// forward outcomes somewhere other than the log.
pub trait StageObserver: Send + Sync {
    fn on_stage(&self, event: &StageEvent);
}

/// Logs stage events with structured fields.
pub struct TracingObserver;

impl StageObserver for TracingObserver {
    fn on_stage(&self, event: &StageEvent) {
        let elapsed_ms = event.duration.as_millis() as u64;
        match &event.outcome {
            StageOutcome::Failed(reason) => tracing::warn!(
                path = %event.path.display(),
                source = %event.source,
                elapsed_ms,
                "Stage failed: {}",
                reason
            ),
            outcome => tracing::debug!(
                path = %event.path.display(),
                source = %event.source,
                outcome = %outcome,
                elapsed_ms,
                "Stage finished"
            ),
        }
    }
}

pub struct Resolver {
    stages: Vec<Source>,
    lookup: Option<LookupChain>,
    unknown_author: String,
    limits: ReadLimits,
    observer: Arc<dyn StageObserver>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    /// Offline resolver: embedded metadata, then filename heuristics.
    pub fn new() -> Self {
        Self {
            stages: vec![Source::Embedded, Source::Filename],
            lookup: None,
            unknown_author: DEFAULT_UNKNOWN_AUTHOR.to_string(),
            limits: ReadLimits::default(),
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self, ConfigError> {
        let chain = LookupChain::from_config(&cfg.lookup)?;
        Ok(Self::new()
            .with_lookup(chain)
            .with_unknown_author(&cfg.resolver.unknown_author))
    }

    /// Enable the remote stage. An empty chain leaves the resolver offline.
    pub fn with_lookup(mut self, chain: LookupChain) -> Self {
        self.stages.retain(|s| *s != Source::Remote);
        if !chain.is_empty() {
            let at = self.stages.iter().position(|s| *s == Source::Embedded).map_or(0, |i| i + 1);
            self.stages.insert(at, Source::Remote);
            self.lookup = Some(chain);
        } else {
            self.lookup = None;
        }
        self
    }

    pub fn with_unknown_author(mut self, sentinel: &str) -> Self {
        if !sentinel.trim().is_empty() {
            self.unknown_author = sentinel.trim().to_string();
        }
        self
    }

    pub fn with_limits(mut self, limits: ReadLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn StageObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The stages run before finalization, in order.
    pub fn stages(&self) -> &[Source] {
        &self.stages
    }

    pub fn unknown_author(&self) -> &str {
        &self.unknown_author
    }

    /// Resolve title and author for one file. Never fails; both fields of the
    /// returned value are non-empty.
    pub fn resolve(&self, path: &Path) -> BookInfo {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = filename::strip_extension(&name);

        let mut info = BookInfo::empty();
        for &source in &self.stages {
            if info.is_complete() {
                self.emit(path, source, StageOutcome::Skipped, Duration::ZERO);
                continue;
            }

            let start = Instant::now();
            let result = catch_unwind(AssertUnwindSafe(|| self.run_stage(source, path, &name, &stem, &info)))
                .unwrap_or_else(|_| Err(format!("{source} stage panicked")));

            match result {
                Ok(found) => {
                    self.emit(path, source, StageOutcome::of(&found), start.elapsed());
                    info.fill_from(found);
                }
                Err(reason) => self.emit(path, source, StageOutcome::Failed(reason), start.elapsed()),
            }
        }

        let start = Instant::now();
        let outcome = if info.is_complete() {
            StageOutcome::Skipped
        } else {
            StageOutcome::Complete
        };
        let info = finalize(info, &stem, &self.unknown_author);
        self.emit(path, Source::Finalize, outcome, start.elapsed());
        info
    }

    fn run_stage(
        &self,
        source: Source,
        path: &Path,
        name: &str,
        stem: &str,
        so_far: &BookInfo,
    ) -> Result<BookInfo, String> {
        match source {
            Source::Embedded => readers::read_embedded_with(path, &self.limits).map_err(|e| e.to_string()),
            Source::Remote => match &self.lookup {
                Some(chain) => {
                    let query = so_far.title.as_deref().unwrap_or(stem);
                    chain.try_resolve(query).map_err(|e| e.to_string())
                }
                None => Ok(BookInfo::empty()),
            },
            Source::Filename => Ok(filename::parse_filename(name)),
            Source::Finalize => Ok(BookInfo::empty()),
        }
    }

    fn emit(&self, path: &Path, source: Source, outcome: StageOutcome, duration: Duration) {
        self.observer.on_stage(&StageEvent {
            path: path.to_path_buf(),
            source,
            outcome,
            duration,
        });
    }
}

/// Fill whatever is still missing: the stem becomes the title and the sentinel
/// becomes the author. Both fields of the result are non-empty.
pub fn finalize(mut info: BookInfo, stem: &str, unknown_author: &str) -> BookInfo {
    if !info.has_title() {
        let stem = stem.trim();
        info.title = Some(if stem.is_empty() { UNTITLED } else { stem }.to_string());
    }
    if !info.has_author() {
        let sentinel = unknown_author.trim();
        info.author = Some(if sentinel.is_empty() { DEFAULT_UNKNOWN_AUTHOR } else { sentinel }.to_string());
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LookupError;
    use crate::fixtures;
    use crate::lookup::tests::Canned;
    use crate::lookup::MetadataProvider;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(Source, StageOutcome)>>);

    impl StageObserver for Recorder {
        fn on_stage(&self, event: &StageEvent) {
            self.0.lock().unwrap().push((event.source, event.outcome.clone()));
        }
    }

    /// Answers every query with a fixed author and remembers what was asked.
    struct QueryLog(Arc<Mutex<Vec<String>>>);

    impl MetadataProvider for QueryLog {
        fn name(&self) -> &str {
            "log"
        }

        fn search(&self, query: &str) -> Result<BookInfo, LookupError> {
            self.0.lock().unwrap().push(query.to_string());
            Ok(BookInfo::new(Some(format!("{query} (remote)")), Some("Remote Author".into())))
        }
    }

    struct Exploding;

    impl MetadataProvider for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }

        fn search(&self, _query: &str) -> Result<BookInfo, LookupError> {
            panic!("malformed response")
        }
    }

    fn pair(info: &BookInfo) -> (&str, &str) {
        (info.title.as_deref().unwrap_or(""), info.author.as_deref().unwrap_or(""))
    }

    #[test]
    fn stage_list_follows_lookup() {
        assert_eq!(Resolver::new().stages(), &[Source::Embedded, Source::Filename]);

        let online = Resolver::new().with_lookup(LookupChain::new(vec![Box::new(Canned::miss("m"))]));
        assert_eq!(online.stages(), &[Source::Embedded, Source::Remote, Source::Filename]);

        let offline = online.with_lookup(LookupChain::default());
        assert_eq!(offline.stages(), &[Source::Embedded, Source::Filename]);
    }

    #[test]
    fn embedded_metadata_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Dune - Frank Herbert.pdf");
        fixtures::write_pdf(&path, Some("Foo"), Some("Bar"));

        let remote = Canned::hit("remote", "Remote Title", "Remote Author");
        let calls = remote.calls.clone();
        let recorder = Arc::new(Recorder::default());
        let resolver = Resolver::new()
            .with_lookup(LookupChain::new(vec![Box::new(remote)]))
            .with_observer(recorder.clone());

        let info = resolver.resolve(&path);
        assert_eq!(pair(&info), ("Foo", "Bar"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![
                (Source::Embedded, StageOutcome::Complete),
                (Source::Remote, StageOutcome::Skipped),
                (Source::Filename, StageOutcome::Skipped),
                (Source::Finalize, StageOutcome::Skipped),
            ]
        );
    }

    #[test]
    fn remote_query_uses_embedded_title_and_keeps_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan0001.pdf");
        fixtures::write_pdf(&path, Some("Dune"), None);

        let queries = Arc::new(Mutex::new(Vec::new()));
        let resolver = Resolver::new().with_lookup(LookupChain::new(vec![Box::new(QueryLog(queries.clone()))]));

        let info = resolver.resolve(&path);
        assert_eq!(pair(&info), ("Dune", "Remote Author"));
        assert_eq!(*queries.lock().unwrap(), vec!["Dune".to_string()]);
    }

    #[test]
    fn remote_query_falls_back_to_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hyperion.epub");
        fixtures::write_epub(&path, None, &[]);

        let queries = Arc::new(Mutex::new(Vec::new()));
        let resolver = Resolver::new().with_lookup(LookupChain::new(vec![Box::new(QueryLog(queries.clone()))]));

        let info = resolver.resolve(&path);
        assert_eq!(pair(&info), ("hyperion (remote)", "Remote Author"));
        assert_eq!(*queries.lock().unwrap(), vec!["hyperion".to_string()]);
    }

    #[test]
    fn unreachable_lookup_falls_through_to_filename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Baz - Qux.epub");
        fixtures::write_epub(&path, None, &[]);

        let recorder = Arc::new(Recorder::default());
        let resolver = Resolver::new()
            .with_lookup(LookupChain::new(vec![Box::new(Canned::broken("down"))]))
            .with_observer(recorder.clone());

        assert_eq!(pair(&resolver.resolve(&path)), ("Baz", "Qux"));
        let events = recorder.0.lock().unwrap();
        assert_eq!(events[0], (Source::Embedded, StageOutcome::Miss));
        assert!(matches!(events[1], (Source::Remote, StageOutcome::Failed(_))));
        assert_eq!(events[2], (Source::Filename, StageOutcome::Complete));
    }

    #[test]
    fn panicking_provider_fails_only_its_stage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Baz - Qux.epub");
        fixtures::write_epub(&path, None, &[]);

        let recorder = Arc::new(Recorder::default());
        let resolver = Resolver::new()
            .with_lookup(LookupChain::new(vec![Box::new(Exploding)]))
            .with_observer(recorder.clone());

        assert_eq!(pair(&resolver.resolve(&path)), ("Baz", "Qux"));
        let events = recorder.0.lock().unwrap();
        assert_eq!(events[1], (Source::Remote, StageOutcome::Failed("remote stage panicked".into())));
        assert_eq!(events[2], (Source::Filename, StageOutcome::Complete));
        assert_eq!(events[3], (Source::Finalize, StageOutcome::Skipped));
    }

    #[test]
    fn read_limits_apply_to_the_embedded_stage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Emma - Jane Austen.epub");
        fixtures::write_epub(&path, Some("Persuasion"), &["Anne Elliot"]);

        let strict = ReadLimits {
            max_file_count: 2,
            ..ReadLimits::default()
        };
        let recorder = Arc::new(Recorder::default());
        let resolver = Resolver::new().with_limits(strict).with_observer(recorder.clone());

        assert_eq!(pair(&resolver.resolve(&path)), ("Emma", "Jane Austen"));
        let events = recorder.0.lock().unwrap();
        assert!(matches!(events[0], (Source::Embedded, StageOutcome::Failed(_))));

        assert_eq!(pair(&Resolver::new().resolve(&path)), ("Persuasion", "Anne Elliot"));
    }

    #[test]
    fn unreadable_file_is_finalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.epub");
        std::fs::write(&path, b"garbage").unwrap();

        let resolver = Resolver::new().with_unknown_author("Anonymous");
        assert_eq!(pair(&resolver.resolve(&path)), ("corrupt", "Anonymous"));
    }

    #[test]
    fn finalize_keeps_existing_values() {
        let info = finalize(BookInfo::new(Some("Emma".into()), None), "file", "Unknown Author");
        assert_eq!(pair(&info), ("Emma", "Unknown Author"));

        let info = finalize(BookInfo::empty(), "  ", "");
        assert_eq!(pair(&info), (UNTITLED, DEFAULT_UNKNOWN_AUTHOR));
    }

    proptest! {
        #[test]
        fn finalize_always_yields_both_fields(
            title in proptest::option::of(".*"),
            author in proptest::option::of(".*"),
            stem in ".*",
            sentinel in ".*",
        ) {
            let info = finalize(BookInfo { title, author }, &stem, &sentinel);
            prop_assert!(info.is_complete());
        }
    }
}
