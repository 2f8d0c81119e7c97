//! Phase three: ask the outside world who these books are.
//!
//! Each eligible record is enriched under its own lock, re-reading its state
//! after acquisition so a record the user confirmed mid-scan is left alone.
//! Records without an ISBN fall back to a title guess cleaned out of the
//! filename. Classification fill-in rides along: any record that comes out
//! of enrichment without a call number gets one more chance through the
//! classification cascade.

use exn::ResultExt;
use regex::Regex;
use shelfmark_catalog::{BookRecord, BookRepository};
use shelfmark_resolve::Resolver;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::{ErrorKind, Result};
use crate::locks::RecordLocks;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    /// Records that received metadata from at least one source.
    pub enriched: u64,
    /// Records that additionally gained a call number.
    pub classified: u64,
    /// Records no source could identify.
    pub unresolved: u64,
    /// Records that became protected between listing and locking.
    pub skipped: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EnrichOutcome {
    Applied { title: Option<String>, classified: bool },
    Unresolved,
    Skipped,
}

impl EnrichSummary {
    pub(crate) fn tally(&mut self, outcome: &EnrichOutcome) {
        match outcome {
            EnrichOutcome::Applied { classified, .. } => {
                self.enriched += 1;
                if *classified {
                    self.classified += 1;
                }
            }
            EnrichOutcome::Unresolved => self.unresolved += 1,
            EnrichOutcome::Skipped => self.skipped += 1,
        }
    }
}

pub(crate) async fn enrich_one(
    books: &BookRepository,
    resolver: &Resolver,
    locks: &RecordLocks,
    id: i64,
) -> Result<EnrichOutcome> {
    let lock = locks.for_record(id).await;
    let _guard = lock.lock().await;
    // Re-read under the lock; the record may have been confirmed, skipped or
    // deleted since the pending list was taken.
    let Some(record) = books.try_get(id).await.or_raise(|| ErrorKind::Datastore)? else {
        return Ok(EnrichOutcome::Skipped);
    };
    if record.manual_override || !record.match_status.can_auto_update() {
        return Ok(EnrichOutcome::Skipped);
    }

    let title_guess = title_guess(&record);
    let candidates = resolver.metadata(record.isbn13.as_deref(), title_guess.as_deref()).await;
    let merged = Resolver::merge(candidates);

    let applied = match merged {
        Some(candidate) => {
            let confidence = Resolver::confidence_for(&candidate);
            let applied = books
                .apply_auto_metadata(id, &candidate, confidence)
                .await
                .or_raise(|| ErrorKind::Datastore)?;
            if !applied {
                return Ok(EnrichOutcome::Skipped);
            }
            true
        }
        None => false,
    };

    // Classification fill-in, still under the lock.
    let record = books.get(id).await.or_raise(|| ErrorKind::Datastore)?;
    let mut classified = false;
    if record.call_number.is_none()
        && (record.openlibrary_id.is_some() || record.isbn13.is_some())
        && let Some(call) =
            resolver.classification(record.openlibrary_id.as_deref(), record.isbn13.as_deref()).await
    {
        classified =
            books.fill_call_number(id, &call).await.or_raise(|| ErrorKind::Datastore)?;
    }

    if applied {
        tracing::info!(id, title = record.title.as_deref(), classified, "record enriched");
        Ok(EnrichOutcome::Applied { title: record.title, classified })
    } else {
        tracing::debug!(id, "no source recognized this book");
        Ok(EnrichOutcome::Unresolved)
    }
}

/// Fill a call number on one record that lacks it, under its lock. Used by
/// the standalone classification pass, which also covers confirmed records.
pub(crate) async fn classify_one(
    books: &BookRepository,
    resolver: &Resolver,
    locks: &RecordLocks,
    id: i64,
) -> Result<bool> {
    let lock = locks.for_record(id).await;
    let _guard = lock.lock().await;
    let Some(record) = books.try_get(id).await.or_raise(|| ErrorKind::Datastore)? else {
        return Ok(false);
    };
    if record.call_number.is_some() {
        return Ok(false);
    }
    let Some(call) =
        resolver.classification(record.openlibrary_id.as_deref(), record.isbn13.as_deref()).await
    else {
        return Ok(false);
    };
    books.fill_call_number(id, &call).await.or_raise(|| ErrorKind::Datastore)
}

static FILENAME_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    // Bracketed tags, ISBN-sized digit runs, and site rips like "z-lib".
    Regex::new(r"(?i)\[[^\]]*\]|\([^)]*\)|\b97[89][\- ]?[0-9\- ]{10,14}\b|\b[0-9]{9,13}[0-9Xx]\b|z-?lib(?:rary)?(?:\.[a-z]+)?").unwrap()
});

fn title_guess(record: &BookRecord) -> Option<String> {
    if let Some(title) = &record.title {
        return Some(title.clone());
    }
    record.path.as_deref().and_then(title_from_filename)
}

/// Turn "The_Art.of.Unix-Programming [2003] 9780131429017.epub" into
/// something a title search can work with. Returns `None` when nothing
/// word-like survives the cleaning.
pub(crate) fn title_from_filename(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let cleaned = FILENAME_NOISE.replace_all(stem, " ");
    let cleaned = cleaned.replace(['_', '.'], " ");
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    let guess = words.join(" ");
    if guess.len() < 3 || !guess.chars().any(|c| c.is_alphabetic()) {
        return None;
    }
    Some(guess)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;

    #[rstest]
    #[case("The_Art.of.Unix-Programming [2003] 9780131429017.epub", Some("The Art of Unix-Programming"))]
    #[case("Dune (Frank Herbert) (z-lib.org).mobi", Some("Dune"))]
    #[case("9783161484100.pdf", None)]
    #[case("a.epub", None)]
    fn test_title_from_filename(#[case] name: &str, #[case] expected: Option<&str>) {
        let path = PathBuf::from(format!("library/{name}"));
        assert_eq!(title_from_filename(&path).as_deref(), expected);
    }

    #[test]
    fn test_summary_tally() {
        let mut summary = EnrichSummary::default();
        summary.tally(&EnrichOutcome::Applied { title: None, classified: true });
        summary.tally(&EnrichOutcome::Applied { title: None, classified: false });
        summary.tally(&EnrichOutcome::Unresolved);
        assert_eq!(summary.enriched, 2);
        assert_eq!(summary.classified, 1);
        assert_eq!(summary.unresolved, 1);
    }
}
