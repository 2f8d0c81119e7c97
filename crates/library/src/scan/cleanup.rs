//! Phase one: reconcile the catalog with files that are no longer there.
//!
//! A record whose path vanished gets one chance to turn out to be a move:
//! any uncatalogued file of the same size is hashed and compared against
//! the record's content hash. Only when no move is found does the
//! missing-file policy apply. Hashes computed here are kept for the
//! indexing phase so no file is fingerprinted twice.

use exn::ResultExt;
use shelfmark_catalog::{BookRecord, BookRepository, MatchStatus};
use shelfmark_config::MissingFilePolicy;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, Result};
use crate::hash::fingerprint_file;
use crate::walk::WalkedFile;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    /// Records whose file turned up at a new path.
    pub moved: u64,
    /// Records deleted along with their vanished file.
    pub deleted: u64,
    /// Records that kept their metadata but lost their file.
    pub detached: u64,
    /// Detached records additionally flagged for review.
    pub flagged: u64,
}

pub(crate) async fn run(
    books: &BookRepository,
    walked: &[WalkedFile],
    policy: MissingFilePolicy,
    hashes: &mut HashMap<PathBuf, String>,
) -> Result<CleanupSummary> {
    let on_disk: HashSet<&Path> = walked.iter().map(|f| f.path.as_path()).collect();
    let records = books.file_backed().await.or_raise(|| ErrorKind::Datastore)?;

    let mut summary = CleanupSummary::default();
    for record in records {
        let Some(path) = &record.path else { continue };
        if on_disk.contains(path.as_path()) {
            continue;
        }
        if find_move(books, &record, walked, hashes).await? {
            summary.moved += 1;
            continue;
        }
        apply_policy(books, &record, policy, &mut summary).await?;
    }
    Ok(summary)
}

/// Look for the record's content at a new path. Candidates are uncatalogued
/// files of the exact same size; the hash settles it. Returns `true` and
/// repoints the record when a match is found.
async fn find_move(
    books: &BookRepository,
    record: &BookRecord,
    walked: &[WalkedFile],
    hashes: &mut HashMap<PathBuf, String>,
) -> Result<bool> {
    let (Some(content_hash), Some(file_size)) = (&record.content_hash, record.file_size) else {
        return Ok(false);
    };
    for file in walked.iter().filter(|f| f.size == file_size) {
        if books.get_by_path(&file.path).await.or_raise(|| ErrorKind::Datastore)?.is_some() {
            continue;
        }
        let hash = match hashes.get(&file.path) {
            Some(hash) => hash.clone(),
            None => {
                let path = file.path.clone();
                let computed = tokio::task::spawn_blocking(move || fingerprint_file(&path))
                    .await
                    .or_raise(|| ErrorKind::Task)?;
                let hash = match computed {
                    Ok(hash) => hash,
                    Err(error) => {
                        tracing::warn!(path = %file.path.display(), %error, "unreadable move candidate");
                        continue;
                    }
                };
                hashes.insert(file.path.clone(), hash.clone());
                hash
            }
        };
        if hash == *content_hash {
            tracing::info!(
                id = record.id,
                from = %record.path.as_deref().unwrap_or_else(|| Path::new("?")).display(),
                to = %file.path.display(),
                "file moved",
            );
            books
                .update_path(record.id, &file.path, file.size, file.mtime)
                .await
                .or_raise(|| ErrorKind::Datastore)?;
            return Ok(true);
        }
    }
    Ok(false)
}

/// The file is genuinely gone. Records nobody has touched are deleted;
/// human-touched records follow the configured policy.
async fn apply_policy(
    books: &BookRepository,
    record: &BookRecord,
    policy: MissingFilePolicy,
    summary: &mut CleanupSummary,
) -> Result<()> {
    let protected = record.match_status.is_protected() || record.manual_override;
    if !protected || policy == MissingFilePolicy::Delete {
        tracing::info!(id = record.id, "deleting record for missing file");
        books.delete(record.id).await.or_raise(|| ErrorKind::Datastore)?;
        summary.deleted += 1;
        return Ok(());
    }
    books.detach_file(record.id).await.or_raise(|| ErrorKind::Datastore)?;
    summary.detached += 1;
    if policy == MissingFilePolicy::Flag {
        books
            .set_status(record.id, MatchStatus::NeedsReview)
            .await
            .or_raise(|| ErrorKind::Datastore)?;
        summary.flagged += 1;
        tracing::info!(id = record.id, "missing file flagged for review");
    }
    Ok(())
}
