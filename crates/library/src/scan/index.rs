//! Phase two: fold every file on disk into the catalog.
//!
//! Identity is decided in this order: exact path match with unchanged size
//! and mtime needs no I/O at all; a changed file is re-fingerprinted; an
//! unknown path is fingerprinted and looked up by hash so moves the cleanup
//! phase didn't catch (same content, different size never happens, but a
//! copy-then-delete race can) still reattach instead of duplicating.

use exn::ResultExt;
use shelfmark_catalog::{BookRepository, NewBook};
use shelfmark_extract::{Extraction, TextRecognizer};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{ErrorKind, Result};
use crate::hash::{fingerprint_bytes, fingerprint_file};
use crate::walk::WalkedFile;

/// What indexing decided about one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// A brand-new record was created.
    Added(i64),
    /// The file is a known book at a new path.
    Moved(i64),
    /// Same path, changed bytes or file facts; the record was refreshed.
    Refreshed(i64),
    /// Already catalogued, size and mtime agree; nothing read.
    Unchanged(i64),
    /// The file couldn't be read and was left for the next scan.
    Unreadable,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub added: u64,
    pub moved: u64,
    pub refreshed: u64,
    pub unchanged: u64,
    pub unreadable: u64,
}

impl IndexSummary {
    pub(crate) fn tally(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Added(_) => self.added += 1,
            FileOutcome::Moved(_) => self.moved += 1,
            FileOutcome::Refreshed(_) => self.refreshed += 1,
            FileOutcome::Unchanged(_) => self.unchanged += 1,
            FileOutcome::Unreadable => self.unreadable += 1,
        }
    }
}

pub(crate) async fn index_one(
    books: &BookRepository,
    file: &WalkedFile,
    hashes: &mut HashMap<PathBuf, String>,
    recognizer: Option<Arc<dyn TextRecognizer>>,
) -> Result<FileOutcome> {
    if let Some(record) = books.get_by_path(&file.path).await.or_raise(|| ErrorKind::Datastore)? {
        if record.file_size == Some(file.size) && record.file_mtime == Some(file.mtime) {
            return Ok(FileOutcome::Unchanged(record.id));
        }
        let hash = match hash_for(file, hashes).await? {
            Some(hash) => hash,
            None => return Ok(FileOutcome::Unreadable),
        };
        if record.content_hash.as_deref() == Some(hash.as_str()) {
            // Touched but not changed; keep the file facts current.
            books
                .update_path(record.id, &file.path, file.size, file.mtime)
                .await
                .or_raise(|| ErrorKind::Datastore)?;
            return Ok(FileOutcome::Refreshed(record.id));
        }
        // The bytes changed under a known path. Identity and match state
        // stay; file facts move, and re-extraction may fill slots that are
        // still empty: a call number on any record, an ISBN only on records
        // still open to automation.
        books
            .refresh_file(record.id, file.size, file.mtime, &hash)
            .await
            .or_raise(|| ErrorKind::Datastore)?;
        let wants_call = record.call_number.is_none();
        let wants_isbn = record.isbn13.is_none()
            && !record.manual_override
            && record.match_status.can_auto_update();
        if (wants_call || wants_isbn)
            && let Some(harvest) = read_and_extract(file, Some(hash), recognizer).await?
        {
            if wants_call && let Some(call) = harvest.extraction.call_number {
                books.fill_call_number(record.id, &call).await.or_raise(|| ErrorKind::Datastore)?;
            }
            if wants_isbn && let Some(isbn) = harvest.extraction.isbn {
                books.fill_identifier(record.id, &isbn).await.or_raise(|| ErrorKind::Datastore)?;
            }
        }
        return Ok(FileOutcome::Refreshed(record.id));
    }

    let hash = match hash_for(file, hashes).await? {
        Some(hash) => hash,
        None => return Ok(FileOutcome::Unreadable),
    };
    if let Some(record) = books.get_by_hash(&hash).await.or_raise(|| ErrorKind::Datastore)? {
        books
            .update_path(record.id, &file.path, file.size, file.mtime)
            .await
            .or_raise(|| ErrorKind::Datastore)?;
        return Ok(FileOutcome::Moved(record.id));
    }

    let Some(harvest) = read_and_extract(file, Some(hash), recognizer).await? else {
        return Ok(FileOutcome::Unreadable);
    };
    let new = NewBook::from_extraction(
        file.path.clone(),
        file.format,
        file.size,
        file.mtime,
        harvest.hash,
        harvest.extraction,
    );
    let record = books.insert(&new).await.or_raise(|| ErrorKind::Datastore)?;
    tracing::info!(
        id = record.id,
        path = %file.path.display(),
        isbn = record.isbn13.as_deref(),
        "catalogued new file",
    );
    Ok(FileOutcome::Added(record.id))
}

struct Harvest {
    hash: String,
    extraction: Extraction,
}

/// Fingerprint a file, reusing a hash already computed this scan. Unreadable
/// files degrade to `None` with a warning; the next scan retries them.
async fn hash_for(file: &WalkedFile, hashes: &mut HashMap<PathBuf, String>) -> Result<Option<String>> {
    if let Some(hash) = hashes.get(&file.path) {
        return Ok(Some(hash.clone()));
    }
    let path = file.path.clone();
    match tokio::task::spawn_blocking(move || fingerprint_file(&path)).await.or_raise(|| ErrorKind::Task)? {
        Ok(hash) => {
            hashes.insert(file.path.clone(), hash.clone());
            Ok(Some(hash))
        }
        Err(error) => {
            tracing::warn!(path = %file.path.display(), %error, "skipping unreadable file");
            Ok(None)
        }
    }
}

/// Read a file once and run identifier extraction on it, off the async
/// runtime. Extraction itself never fails; reading can.
async fn read_and_extract(
    file: &WalkedFile,
    known_hash: Option<String>,
    recognizer: Option<Arc<dyn TextRecognizer>>,
) -> Result<Option<Harvest>> {
    let path = file.path.clone();
    let format = file.format;
    let outcome = tokio::task::spawn_blocking(move || -> std::io::Result<Harvest> {
        let bytes = std::fs::read(&path)?;
        let hash = known_hash.unwrap_or_else(|| fingerprint_bytes(&bytes));
        let extraction = shelfmark_extract::extract(&bytes, format, recognizer.as_deref());
        Ok(Harvest { hash, extraction })
    })
    .await
    .or_raise(|| ErrorKind::Task)?;
    match outcome {
        Ok(harvest) => Ok(Some(harvest)),
        Err(error) => {
            tracing::warn!(path = %file.path.display(), %error, "skipping unreadable file");
            Ok(None)
        }
    }
}
