//! The three-phase library scan.
//!
//! Cleanup reconciles the catalog against files that disappeared, indexing
//! folds every file on disk into the catalog, and enrichment asks the
//! metadata sources about records still open to automation. The phases run
//! strictly in order; events stream out as they happen.

pub mod cleanup;
pub mod enrich;
pub mod index;

use async_stream::stream;
use exn::ResultExt;
use futures::{Stream, StreamExt};
use shelfmark_catalog::BookRepository;
use shelfmark_config::MissingFilePolicy;
use shelfmark_extract::TextRecognizer;
use shelfmark_resolve::Resolver;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{ErrorKind, Result};
use crate::locks::RecordLocks;
use crate::progress::{Phase, ScanProgress};
use crate::walk::walk_library;

pub use cleanup::CleanupSummary;
pub use enrich::EnrichSummary;
pub use index::{FileOutcome, IndexSummary};

/// Progress notifications yielded by [`Scanner::scan`].
#[derive(Debug)]
pub enum ScanEvent {
    /// Discovery finished; this many recognized files are on disk.
    Started { discovered: u64 },
    CleanupComplete(CleanupSummary),
    /// One file was reconciled with the catalog.
    Indexed { path: PathBuf, outcome: FileOutcome },
    IndexingComplete(IndexSummary),
    /// One record received metadata from the sources.
    Enriched { id: i64, title: Option<String> },
    Complete(ScanSummary),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub cleanup: CleanupSummary,
    pub indexing: IndexSummary,
    pub enrichment: EnrichSummary,
}

#[derive(Clone)]
pub struct Scanner {
    books: BookRepository,
    resolver: Arc<Resolver>,
    policy: MissingFilePolicy,
    concurrency: usize,
    recognizer: Option<Arc<dyn TextRecognizer>>,
    progress: Arc<ScanProgress>,
    locks: RecordLocks,
}

impl Scanner {
    pub fn new(
        books: BookRepository,
        resolver: Arc<Resolver>,
        policy: MissingFilePolicy,
        concurrency: usize,
    ) -> Self {
        Self {
            books,
            resolver,
            policy,
            concurrency: concurrency.max(1),
            recognizer: None,
            progress: Arc::new(ScanProgress::default()),
            locks: RecordLocks::new(),
        }
    }

    /// Attach an OCR backend for image-only PDFs.
    pub fn with_recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    /// Live counters another task may poll while a scan runs.
    pub fn progress(&self) -> Arc<ScanProgress> {
        Arc::clone(&self.progress)
    }

    /// Run a full scan of `root`, yielding events as each phase advances.
    /// Fatal errors (inaccessible root, unreachable catalog) end the stream;
    /// per-file and per-source trouble degrades and the scan carries on.
    pub fn scan(&self, root: PathBuf) -> impl Stream<Item = Result<ScanEvent>> + '_ {
        stream! {
            self.progress.reset();
            self.progress.set_phase(Phase::Cleanup);
            let walk_root = root.clone();
            let walked = tokio::task::spawn_blocking(move || walk_library(&walk_root))
                .await
                .or_raise(|| ErrorKind::Task)
                .and_then(|r| r.or_raise(|| ErrorKind::RootInaccessible(root)));
            let walked = match walked {
                Ok(walked) => walked,
                Err(error) => {
                    yield Err(error);
                    return;
                }
            };
            self.progress.set_discovered(walked.len() as u64);
            yield Ok(ScanEvent::Started { discovered: walked.len() as u64 });

            let mut hashes = HashMap::new();
            let cleanup = match cleanup::run(&self.books, &walked, self.policy, &mut hashes).await {
                Ok(summary) => summary,
                Err(error) => {
                    yield Err(error);
                    return;
                }
            };
            yield Ok(ScanEvent::CleanupComplete(cleanup));

            self.progress.set_phase(Phase::Indexing);
            let mut indexing = IndexSummary::default();
            for file in &walked {
                match index::index_one(&self.books, file, &mut hashes, self.recognizer.clone()).await {
                    Ok(outcome) => {
                        indexing.tally(&outcome);
                        self.progress.bump_indexed();
                        yield Ok(ScanEvent::Indexed { path: file.path.clone(), outcome });
                    }
                    Err(error) => {
                        yield Err(error);
                        return;
                    }
                }
            }
            yield Ok(ScanEvent::IndexingComplete(indexing));

            self.progress.set_phase(Phase::Enriching);
            let pending = match self.books.pending_enrichment().await.or_raise(|| ErrorKind::Datastore) {
                Ok(pending) => pending,
                Err(error) => {
                    yield Err(error);
                    return;
                }
            };
            self.progress.set_enrich_total(pending.len() as u64);
            let mut enrichment = EnrichSummary::default();
            let mut results = futures::stream::iter(pending.into_iter().map(|record| {
                let id = record.id;
                async move { (id, enrich::enrich_one(&self.books, &self.resolver, &self.locks, id).await) }
            }))
            .buffer_unordered(self.concurrency);
            while let Some((id, result)) = results.next().await {
                match result {
                    Ok(outcome) => {
                        enrichment.tally(&outcome);
                        self.progress.bump_enriched();
                        if let enrich::EnrichOutcome::Applied { title, .. } = outcome {
                            yield Ok(ScanEvent::Enriched { id, title });
                        }
                    }
                    Err(error) => {
                        yield Err(error);
                        return;
                    }
                }
            }

            self.progress.set_phase(Phase::Done);
            yield Ok(ScanEvent::Complete(ScanSummary { cleanup, indexing, enrichment }));
        }
    }

    /// Run just the enrichment phase over every eligible record.
    pub async fn enrich_pending(&self) -> Result<EnrichSummary> {
        let pending = self.books.pending_enrichment().await.or_raise(|| ErrorKind::Datastore)?;
        self.progress.reset();
        self.progress.set_phase(Phase::Enriching);
        self.progress.set_enrich_total(pending.len() as u64);
        let mut summary = EnrichSummary::default();
        let mut results = futures::stream::iter(
            pending
                .into_iter()
                .map(|record| enrich::enrich_one(&self.books, &self.resolver, &self.locks, record.id)),
        )
        .buffer_unordered(self.concurrency);
        while let Some(result) = results.next().await {
            summary.tally(&result?);
            self.progress.bump_enriched();
        }
        self.progress.set_phase(Phase::Done);
        Ok(summary)
    }

    /// Re-identify one record from a user-supplied key: an ISBN if the key
    /// parses as one, otherwise a title search. Reaches protected records
    /// (the user asked), but the result lands on `auto_matched` pending
    /// confirmation. Returns `None` when no source recognized the key.
    pub async fn relookup(
        &self,
        id: i64,
        key: &str,
    ) -> Result<Option<shelfmark_catalog::BookRecord>> {
        let lock = self.locks.for_record(id).await;
        let _guard = lock.lock().await;
        let (isbn13, title) = match shelfmark_extract::Isbn::parse(key) {
            Ok(isbn) => (Some(isbn.as_str().to_string()), None),
            Err(_) => (None, Some(key.to_string())),
        };
        let candidates = self.resolver.metadata(isbn13.as_deref(), title.as_deref()).await;
        let Some(candidate) = Resolver::merge(candidates) else {
            return Ok(None);
        };
        let confidence = Resolver::confidence_for(&candidate);
        self.books
            .apply_relookup(id, &candidate, confidence)
            .await
            .or_raise(|| ErrorKind::Datastore)?;
        Ok(Some(self.books.get(id).await.or_raise(|| ErrorKind::Datastore)?))
    }

    /// Run just the classification cascade over records missing a call
    /// number. Unlike enrichment this reaches confirmed records too; filling
    /// an empty shelf mark never overwrites anything.
    pub async fn classify_missing(&self) -> Result<u64> {
        let missing = self.books.missing_classification().await.or_raise(|| ErrorKind::Datastore)?;
        let mut filled = 0;
        let mut results = futures::stream::iter(
            missing
                .into_iter()
                .map(|record| enrich::classify_one(&self.books, &self.resolver, &self.locks, record.id)),
        )
        .buffer_unordered(self.concurrency);
        while let Some(result) = results.next().await {
            if result? {
                filled += 1;
            }
        }
        Ok(filled)
    }
}
