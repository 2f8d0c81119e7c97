//! Repository for book records.
//!
//! All mutation paths enforce the match state machine at the SQL level: the
//! guarded statements simply match zero rows when a record is protected, and
//! callers learn about it from the returned `bool`. Holding the per-record
//! lock during read-modify-write sequences is the caller's job.

use exn::{OptionExt, ResultExt};
use shelfmark_extract::{CallNumber, Isbn};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::path::Path;
use time::UtcDateTime;

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{BookEdit, BookRecord, BookRow, MatchCandidate, NewBook, path_to_string};
use crate::status::{Confidence, MatchStatus};

/// Sort orders for book listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Newest first.
    #[default]
    Added,
    Title,
    Author,
    Year,
    Rating,
    ReadDate,
    /// Call-number shelf order; unclassified records sink to the end.
    Shelf,
}

/// Listing filter. Every field is optional; an empty filter lists everything.
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    pub status: Option<MatchStatus>,
    pub min_rating: Option<u8>,
    pub read: Option<bool>,
    /// Call-number prefix, e.g. `QA` or `QA76` for a shelf range.
    pub call_prefix: Option<String>,
    /// Substring match across title, author, identifiers, subjects, call
    /// number and file path.
    pub search: Option<String>,
    pub sort: SortOrder,
}

#[derive(Debug, Clone)]
pub struct BookRepository {
    pool: SqlitePool,
}

impl From<&Database> for BookRepository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}

fn now() -> i64 {
    UtcDateTime::now().unix_timestamp()
}

impl BookRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Insert a freshly discovered file as a new record and return it.
    pub async fn insert(&self, new: &NewBook) -> Result<BookRecord> {
        let ts = now();
        let call = new.call_number.as_ref();
        let id: i64 = sqlx::query_scalar(include_str!("../../queries/insert_book.sql"))
            .bind(path_to_string(&new.path)?)
            .bind(new.format.as_str())
            .bind(i64::try_from(new.file_size).or_raise(|| ErrorKind::InvalidData("file size"))?)
            .bind(new.file_mtime)
            .bind(&new.content_hash)
            .bind(new.isbn.as_ref().and_then(|i| i.ten()))
            .bind(new.isbn.as_ref().map(|i| i.as_str()))
            .bind(call.map(|c| c.raw.as_str()))
            .bind(call.map(|c| c.class.as_str()))
            .bind(call.map(|c| c.sort_key()))
            .bind(ts)
            .bind(ts)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        self.get(id).await
    }

    /// Create a record for a physical book with no backing file.
    pub async fn create_physical(&self, title: &str, author: Option<&str>) -> Result<BookRecord> {
        let ts = now();
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO books (title, author, physical, match_status, confidence, manual_override, created_at, updated_at)
            VALUES (?, ?, 1, 'confirmed', 'manual', 1, ?, ?)
            RETURNING id
            "#,
        )
        .bind(title)
        .bind(author)
        .bind(ts)
        .bind(ts)
        .fetch_one(&self.pool)
        .await
        .or_raise(|| ErrorKind::Database)?;
        self.get(id).await
    }

    // =========================================================================
    // Get/Fetch
    // =========================================================================

    pub async fn get(&self, id: i64) -> Result<BookRecord> {
        self.try_get(id).await?.ok_or_raise(|| ErrorKind::BookNotFound(id))
    }

    pub async fn try_get(&self, id: i64) -> Result<Option<BookRecord>> {
        let row: Option<BookRow> = sqlx::query_as(include_str!("../../queries/get_book.sql"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(TryInto::try_into).transpose()
    }

    pub async fn get_by_path(&self, path: impl AsRef<Path>) -> Result<Option<BookRecord>> {
        let row: Option<BookRow> = sqlx::query_as(include_str!("../../queries/get_book_by_path.sql"))
            .bind(path_to_string(path.as_ref())?)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(TryInto::try_into).transpose()
    }

    /// Find a record by content hash, for move detection. Hashes are unique
    /// among file-backed records, so at most one row matches.
    pub async fn get_by_hash(&self, content_hash: &str) -> Result<Option<BookRecord>> {
        let row: Option<BookRow> = sqlx::query_as(include_str!("../../queries/get_book_by_hash.sql"))
            .bind(content_hash)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(TryInto::try_into).transpose()
    }

    /// All records that claim a backing file. The cleanup phase walks these.
    pub async fn file_backed(&self) -> Result<Vec<BookRecord>> {
        let rows: Vec<BookRow> = sqlx::query_as("SELECT * FROM books WHERE path IS NOT NULL ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Records awaiting enrichment: identifiable (by ISBN or at least a
    /// filename) and still open to automation.
    pub async fn pending_enrichment(&self) -> Result<Vec<BookRecord>> {
        let rows: Vec<BookRow> = sqlx::query_as(include_str!("../../queries/pending_enrichment.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Records eligible for call-number fill-in, confirmed ones included.
    pub async fn missing_classification(&self) -> Result<Vec<BookRecord>> {
        let rows: Vec<BookRow> = sqlx::query_as(include_str!("../../queries/missing_classification.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    // =========================================================================
    // Listing
    // =========================================================================

    pub async fn list(&self, filter: &BookFilter) -> Result<Vec<BookRecord>> {
        let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new("SELECT * FROM books WHERE 1 = 1");
        if let Some(status) = filter.status {
            query.push(" AND match_status = ").push_bind(status.as_str());
        }
        if let Some(rating) = filter.min_rating {
            query.push(" AND rating >= ").push_bind(i64::from(rating));
        }
        if let Some(read) = filter.read {
            query.push(if read { " AND read_on IS NOT NULL" } else { " AND read_on IS NULL" });
        }
        if let Some(prefix) = &filter.call_prefix {
            query.push(" AND call_number LIKE ").push_bind(format!("{prefix}%"));
        }
        if let Some(term) = &filter.search {
            let like = format!("%{term}%");
            query.push(" AND (");
            let mut first = true;
            for column in ["title", "author", "isbn13", "isbn10", "subjects", "call_number", "path"] {
                if !first {
                    query.push(" OR ");
                }
                query.push(column).push(" LIKE ").push_bind(like.clone());
                first = false;
            }
            query.push(")");
        }
        query.push(match filter.sort {
            SortOrder::Added => " ORDER BY created_at DESC, id DESC",
            SortOrder::Title => " ORDER BY title COLLATE NOCASE",
            SortOrder::Author => " ORDER BY author COLLATE NOCASE, title COLLATE NOCASE",
            SortOrder::Year => " ORDER BY publish_year",
            SortOrder::Rating => " ORDER BY rating DESC",
            SortOrder::ReadDate => " ORDER BY read_on DESC",
            SortOrder::Shelf => " ORDER BY call_sort IS NULL, call_sort",
        });
        let rows: Vec<BookRow> =
            query.build_query_as().fetch_all(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Count of records per match status.
    pub async fn stats(&self) -> Result<Vec<(String, u64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(include_str!("../../queries/stats_by_status.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(rows.into_iter().map(|(status, count)| (status, count as u64)).collect())
    }

    // =========================================================================
    // Automated mutation (state-machine guarded)
    // =========================================================================

    /// Record that a file moved. File facts update; metadata and match state
    /// are untouched, so moved books are never re-enriched.
    pub async fn update_path(
        &self,
        id: i64,
        new_path: impl AsRef<Path>,
        file_size: u64,
        file_mtime: i64,
    ) -> Result<bool> {
        let result = sqlx::query(include_str!("../../queries/update_book_path.sql"))
            .bind(path_to_string(new_path.as_ref())?)
            .bind(i64::try_from(file_size).or_raise(|| ErrorKind::InvalidData("file size"))?)
            .bind(file_mtime)
            .bind(now())
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Apply a cascade result. Returns `false` when the record is protected
    /// (confirmed, skipped, under review, or manually overridden) - that is
    /// the state machine saying no, not an error.
    pub async fn apply_auto_metadata(
        &self,
        id: i64,
        candidate: &MatchCandidate,
        confidence: Confidence,
    ) -> Result<bool> {
        let subjects = serde_json::to_string(&candidate.subjects).or_raise(|| ErrorKind::InvalidData("subjects"))?;
        let result = sqlx::query(include_str!("../../queries/apply_auto_metadata.sql"))
            .bind(&candidate.isbn10)
            .bind(&candidate.isbn13)
            .bind(&candidate.openlibrary_id)
            .bind(&candidate.googlebooks_id)
            .bind(&candidate.title)
            .bind(&candidate.subtitle)
            .bind(&candidate.author)
            .bind(&candidate.publisher)
            .bind(candidate.publish_year)
            .bind(&subjects)
            .bind(&subjects)
            .bind(&candidate.description)
            .bind(&candidate.cover_url)
            .bind(&candidate.language)
            .bind(candidate.page_count)
            .bind(confidence.as_str())
            .bind(now())
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Refresh file facts after the bytes at a path changed in place. The
    /// record keeps its identity and match state; only the file column facts
    /// move.
    pub async fn refresh_file(
        &self,
        id: i64,
        file_size: u64,
        file_mtime: i64,
        content_hash: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE books SET file_size = ?, file_mtime = ?, content_hash = ?, updated_at = ? WHERE id = ?",
        )
        .bind(i64::try_from(file_size).or_raise(|| ErrorKind::InvalidData("file size"))?)
        .bind(file_mtime)
        .bind(content_hash)
        .bind(now())
        .bind(id)
        .execute(&self.pool)
        .await
        .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Store a call number on a record that has none. Lands on confirmed
    /// records too (fill-in is additive), but never replaces one.
    pub async fn fill_call_number(&self, id: i64, call: &CallNumber) -> Result<bool> {
        let result = sqlx::query(include_str!("../../queries/fill_call_number.sql"))
            .bind(&call.raw)
            .bind(&call.class)
            .bind(call.sort_key())
            .bind(now())
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Store a re-extracted ISBN on a record that has none. Unlike call
    /// numbers this stays inside automation's lane: records a human has
    /// touched never take one.
    pub async fn fill_identifier(&self, id: i64, isbn: &Isbn) -> Result<bool> {
        let result = sqlx::query(include_str!("../../queries/fill_identifier.sql"))
            .bind(isbn.as_str())
            .bind(isbn.ten())
            .bind(now())
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Forget a record's backing file, keeping the metadata. Used when a
    /// protected record's file vanishes under the `retain`/`flag` policies.
    pub async fn detach_file(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE books SET path = NULL, format = NULL, file_size = NULL, file_mtime = NULL, \
             content_hash = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(now())
        .bind(id)
        .execute(&self.pool)
        .await
        .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Manual mutation
    // =========================================================================

    /// Apply a candidate the user picked. Unlike the automated path this
    /// lands on any record and confirms it.
    pub async fn confirm_candidate(&self, id: i64, candidate: &MatchCandidate) -> Result<bool> {
        let subjects = serde_json::to_string(&candidate.subjects).or_raise(|| ErrorKind::InvalidData("subjects"))?;
        let result = sqlx::query(
            r#"
            UPDATE books
            SET isbn10         = COALESCE(?, isbn10),
                isbn13         = COALESCE(?, isbn13),
                openlibrary_id = COALESCE(?, openlibrary_id),
                googlebooks_id = COALESCE(?, googlebooks_id),
                title          = COALESCE(?, title),
                subtitle       = COALESCE(?, subtitle),
                author         = COALESCE(?, author),
                publisher      = COALESCE(?, publisher),
                publish_year   = COALESCE(?, publish_year),
                subjects       = CASE WHEN ? = '[]' THEN subjects ELSE ? END,
                description    = COALESCE(?, description),
                cover_url      = COALESCE(?, cover_url),
                language       = COALESCE(?, language),
                page_count     = COALESCE(?, page_count),
                match_status   = 'confirmed',
                confidence     = 'manual',
                manual_override = 1,
                updated_at     = ?
            WHERE id = ?
            "#,
        )
        .bind(&candidate.isbn10)
        .bind(&candidate.isbn13)
        .bind(&candidate.openlibrary_id)
        .bind(&candidate.googlebooks_id)
        .bind(&candidate.title)
        .bind(&candidate.subtitle)
        .bind(&candidate.author)
        .bind(&candidate.publisher)
        .bind(candidate.publish_year)
        .bind(&subjects)
        .bind(&subjects)
        .bind(&candidate.description)
        .bind(&candidate.cover_url)
        .bind(&candidate.language)
        .bind(candidate.page_count)
        .bind(now())
        .bind(id)
        .execute(&self.pool)
        .await
        .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Apply the result of a user-requested re-lookup. Because the user
    /// asked, this reaches protected records too, but the result lands on
    /// `auto_matched` pending confirmation, and the manual-override flag is
    /// cleared so the next enrichment pass may refine it.
    pub async fn apply_relookup(
        &self,
        id: i64,
        candidate: &MatchCandidate,
        confidence: Confidence,
    ) -> Result<bool> {
        let subjects = serde_json::to_string(&candidate.subjects).or_raise(|| ErrorKind::InvalidData("subjects"))?;
        let result = sqlx::query(
            r#"
            UPDATE books
            SET isbn10         = COALESCE(?, isbn10),
                isbn13         = COALESCE(?, isbn13),
                openlibrary_id = COALESCE(?, openlibrary_id),
                googlebooks_id = COALESCE(?, googlebooks_id),
                title          = COALESCE(?, title),
                subtitle       = COALESCE(?, subtitle),
                author         = COALESCE(?, author),
                publisher      = COALESCE(?, publisher),
                publish_year   = COALESCE(?, publish_year),
                subjects       = CASE WHEN ? = '[]' THEN subjects ELSE ? END,
                description    = COALESCE(?, description),
                cover_url      = COALESCE(?, cover_url),
                language       = COALESCE(?, language),
                page_count     = COALESCE(?, page_count),
                match_status   = 'auto_matched',
                confidence     = ?,
                manual_override = 0,
                updated_at     = ?
            WHERE id = ?
            "#,
        )
        .bind(&candidate.isbn10)
        .bind(&candidate.isbn13)
        .bind(&candidate.openlibrary_id)
        .bind(&candidate.googlebooks_id)
        .bind(&candidate.title)
        .bind(&candidate.subtitle)
        .bind(&candidate.author)
        .bind(&candidate.publisher)
        .bind(candidate.publish_year)
        .bind(&subjects)
        .bind(&subjects)
        .bind(&candidate.description)
        .bind(&candidate.cover_url)
        .bind(&candidate.language)
        .bind(candidate.page_count)
        .bind(confidence.as_str())
        .bind(now())
        .bind(id)
        .execute(&self.pool)
        .await
        .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Save hand-entered fields. Only the provided fields change; the record
    /// is confirmed and protected from automation afterwards.
    pub async fn save_edit(&self, id: i64, edit: &BookEdit) -> Result<bool> {
        let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "UPDATE books SET match_status = 'confirmed', confidence = 'manual', manual_override = 1",
        );
        macro_rules! set_field {
            ($column:literal, $value:expr) => {
                if let Some(value) = &$value {
                    query.push(concat!(", ", $column, " = ")).push_bind(value.clone());
                }
            };
        }
        set_field!("title", edit.title);
        set_field!("subtitle", edit.subtitle);
        set_field!("author", edit.author);
        set_field!("publisher", edit.publisher);
        set_field!("publish_year", edit.publish_year);
        set_field!("description", edit.description);
        set_field!("language", edit.language);
        set_field!("notes", edit.notes);
        set_field!("isbn13", edit.isbn13);
        if let Some(call) = &edit.call_number {
            query.push(", call_number = ").push_bind(call.raw.clone());
            query.push(", call_class = ").push_bind(call.class.clone());
            query.push(", call_sort = ").push_bind(call.sort_key());
        }
        query.push(", updated_at = ").push_bind(now());
        query.push(" WHERE id = ").push_bind(id);
        let result = query.build().execute(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Set a record's match status directly (manual review decisions).
    pub async fn set_status(&self, id: i64, status: MatchStatus) -> Result<bool> {
        let result = sqlx::query(include_str!("../../queries/set_status.sql"))
            .bind(status.as_str())
            .bind(now())
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_rating(&self, id: i64, rating: Option<u8>) -> Result<bool> {
        let result = sqlx::query("UPDATE books SET rating = ?, updated_at = ? WHERE id = ?")
            .bind(rating.map(i64::from))
            .bind(now())
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_read(&self, id: i64, read_on: Option<UtcDateTime>) -> Result<bool> {
        let result = sqlx::query("UPDATE books SET read_on = ?, updated_at = ? WHERE id = ?")
            .bind(read_on.map(|dt| dt.unix_timestamp()))
            .bind(now())
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Fold `secondary` into `primary` and delete it. The primary's present
    /// fields win; blanks fill from the secondary. If either side was
    /// confirmed, the merged record is confirmed. A file-less primary adopts
    /// the secondary's file.
    pub async fn merge(&self, primary_id: i64, secondary_id: i64) -> Result<BookRecord> {
        if primary_id == secondary_id {
            exn::bail!(ErrorKind::Constraint);
        }
        let primary = self.get(primary_id).await?;
        let secondary = self.get(secondary_id).await?;

        let confirmed = primary.match_status == MatchStatus::Confirmed
            || secondary.match_status == MatchStatus::Confirmed;
        let adopt_file = primary.path.is_none() && secondary.path.is_some();

        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        // Free the unique path/hash before the primary can adopt them.
        sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(secondary_id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;

        let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE books SET updated_at = ");
        query.push_bind(now());
        macro_rules! fill_field {
            ($column:literal, $primary:expr, $secondary:expr) => {
                if $primary.is_none() {
                    if let Some(value) = &$secondary {
                        query.push(concat!(", ", $column, " = ")).push_bind(value.clone());
                    }
                }
            };
        }
        fill_field!("isbn10", primary.isbn10, secondary.isbn10);
        fill_field!("isbn13", primary.isbn13, secondary.isbn13);
        fill_field!("openlibrary_id", primary.openlibrary_id, secondary.openlibrary_id);
        fill_field!("googlebooks_id", primary.googlebooks_id, secondary.googlebooks_id);
        fill_field!("title", primary.title, secondary.title);
        fill_field!("subtitle", primary.subtitle, secondary.subtitle);
        fill_field!("author", primary.author, secondary.author);
        fill_field!("publisher", primary.publisher, secondary.publisher);
        fill_field!("publish_year", primary.publish_year, secondary.publish_year);
        fill_field!("description", primary.description, secondary.description);
        fill_field!("cover_url", primary.cover_url, secondary.cover_url);
        fill_field!("language", primary.language, secondary.language);
        fill_field!("page_count", primary.page_count, secondary.page_count);
        fill_field!("call_number", primary.call_number, secondary.call_number);
        fill_field!("call_class", primary.call_class, secondary.call_class);
        fill_field!("call_sort", primary.call_sort, secondary.call_sort);
        fill_field!("rating", primary.rating.map(i64::from), secondary.rating.map(i64::from));
        fill_field!(
            "read_on",
            primary.read_on.map(|dt| dt.unix_timestamp()),
            secondary.read_on.map(|dt| dt.unix_timestamp())
        );
        fill_field!("notes", primary.notes, secondary.notes);
        if primary.subjects.is_empty() && !secondary.subjects.is_empty() {
            let subjects =
                serde_json::to_string(&secondary.subjects).or_raise(|| ErrorKind::InvalidData("subjects"))?;
            query.push(", subjects = ").push_bind(subjects);
        }
        if adopt_file {
            fill_field!("path", primary.path.as_ref().map(|p| path_to_string(p)).transpose()?,
                secondary.path.as_ref().map(|p| path_to_string(p)).transpose()?);
            fill_field!("format", primary.format, secondary.format);
            fill_field!(
                "file_size",
                primary.file_size.map(|s| s as i64),
                secondary.file_size.map(|s| s as i64)
            );
            fill_field!("file_mtime", primary.file_mtime, secondary.file_mtime);
            fill_field!("content_hash", primary.content_hash, secondary.content_hash);
            query.push(", physical = 0");
        }
        if confirmed {
            query.push(", match_status = 'confirmed', confidence = 'manual', manual_override = 1");
        }
        query.push(" WHERE id = ").push_bind(primary_id);
        query.build().execute(&mut *tx).await.or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        tracing::info!(primary_id, secondary_id, "records merged");
        self.get(primary_id).await
    }

    /// Delete a record outright.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfmark_extract::{Format, Isbn};
    use std::path::PathBuf;

    async fn repo() -> BookRepository {
        let db = Database::connect_in_memory().await.unwrap();
        BookRepository::from(&db)
    }

    fn sample_file(path: &str, hash: &str) -> NewBook {
        NewBook {
            path: PathBuf::from(path),
            format: Format::Epub,
            file_size: 2048,
            file_mtime: 1_700_000_000,
            content_hash: hash.to_string(),
            isbn: Some(Isbn::parse("9783161484100").unwrap()),
            call_number: None,
        }
    }

    fn sample_candidate(title: &str) -> MatchCandidate {
        MatchCandidate {
            source: "openlibrary".to_string(),
            identifier_match: true,
            title: Some(title.to_string()),
            author: Some("Jane Smith".to_string()),
            subjects: vec!["Testing".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_and_fetch_by_path_and_hash() {
        let repo = repo().await;
        let record = repo.insert(&sample_file("lib/a.epub", "hash-a")).await.unwrap();
        assert_eq!(record.match_status, MatchStatus::Unmatched);
        assert_eq!(record.isbn13.as_deref(), Some("9783161484100"));
        assert!(repo.get_by_path("lib/a.epub").await.unwrap().is_some());
        assert_eq!(repo.get_by_hash("hash-a").await.unwrap().unwrap().id, record.id);
        assert!(repo.get_by_hash("hash-zzz").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_auto_metadata_promotes_unmatched() {
        let repo = repo().await;
        let record = repo.insert(&sample_file("lib/a.epub", "hash-a")).await.unwrap();
        let applied =
            repo.apply_auto_metadata(record.id, &sample_candidate("Found Title"), Confidence::High).await.unwrap();
        assert!(applied);
        let record = repo.get(record.id).await.unwrap();
        assert_eq!(record.match_status, MatchStatus::AutoMatched);
        assert_eq!(record.title.as_deref(), Some("Found Title"));
        assert_eq!(record.confidence, Confidence::High);
    }

    #[tokio::test]
    async fn test_auto_metadata_bounces_off_confirmed() {
        let repo = repo().await;
        let record = repo.insert(&sample_file("lib/a.epub", "hash-a")).await.unwrap();
        repo.save_edit(record.id, &BookEdit { title: Some("My Title".to_string()), ..Default::default() })
            .await
            .unwrap();
        let applied =
            repo.apply_auto_metadata(record.id, &sample_candidate("Robot Title"), Confidence::High).await.unwrap();
        assert!(!applied, "guarded update must not touch confirmed records");
        let record = repo.get(record.id).await.unwrap();
        assert_eq!(record.title.as_deref(), Some("My Title"));
        assert_eq!(record.match_status, MatchStatus::Confirmed);
        assert!(record.manual_override);
    }

    #[tokio::test]
    async fn test_relookup_reaches_confirmed_but_does_not_confirm() {
        let repo = repo().await;
        let record = repo.insert(&sample_file("lib/a.epub", "hash-a")).await.unwrap();
        repo.save_edit(record.id, &BookEdit { title: Some("Wrong Book".to_string()), ..Default::default() })
            .await
            .unwrap();
        let applied = repo
            .apply_relookup(record.id, &sample_candidate("Right Book"), Confidence::High)
            .await
            .unwrap();
        assert!(applied);
        let record = repo.get(record.id).await.unwrap();
        assert_eq!(record.title.as_deref(), Some("Right Book"));
        assert_eq!(record.match_status, MatchStatus::AutoMatched);
        assert!(!record.manual_override, "relookup reopens the record to automation");
    }

    #[tokio::test]
    async fn test_fill_call_number_is_additive_only() {
        let repo = repo().await;
        let record = repo.insert(&sample_file("lib/a.epub", "hash-a")).await.unwrap();
        repo.save_edit(record.id, &BookEdit { title: Some("Mine".to_string()), ..Default::default() })
            .await
            .unwrap();
        // Fill-in is allowed even on the now-confirmed record...
        let call = CallNumber::parse("QA76.73.R87 2019").unwrap();
        assert!(repo.fill_call_number(record.id, &call).await.unwrap());
        // ...but never replaces an existing call number.
        let other = CallNumber::parse("PS3545.I5365").unwrap();
        assert!(!repo.fill_call_number(record.id, &other).await.unwrap());
        let record = repo.get(record.id).await.unwrap();
        assert_eq!(record.call_number.as_deref(), Some("QA76.73.R87 2019"));
        assert_eq!(record.call_class.as_deref(), Some("QA"));
    }

    #[tokio::test]
    async fn test_fill_identifier_respects_the_state_machine() {
        let repo = repo().await;
        let mut new = sample_file("lib/a.epub", "hash-a");
        new.isbn = None;
        let record = repo.insert(&new).await.unwrap();
        let isbn = Isbn::parse("9780306406157").unwrap();
        assert!(repo.fill_identifier(record.id, &isbn).await.unwrap());
        let record = repo.get(record.id).await.unwrap();
        assert_eq!(record.isbn13.as_deref(), Some("9780306406157"));
        // A later find never replaces the first.
        let other = Isbn::parse("9783161484100").unwrap();
        assert!(!repo.fill_identifier(record.id, &other).await.unwrap());
        // Human-touched records never take one at all.
        let mut bare = sample_file("lib/b.epub", "hash-b");
        bare.isbn = None;
        let touched = repo.insert(&bare).await.unwrap();
        repo.save_edit(touched.id, &BookEdit { title: Some("Mine".to_string()), ..Default::default() })
            .await
            .unwrap();
        assert!(!repo.fill_identifier(touched.id, &isbn).await.unwrap());
        assert!(repo.get(touched.id).await.unwrap().isbn13.is_none());
    }

    #[tokio::test]
    async fn test_update_path_preserves_match_state() {
        let repo = repo().await;
        let record = repo.insert(&sample_file("lib/a.epub", "hash-a")).await.unwrap();
        repo.apply_auto_metadata(record.id, &sample_candidate("Found"), Confidence::High).await.unwrap();
        assert!(repo.update_path(record.id, "lib/moved/a.epub", 2048, 1_700_000_500).await.unwrap());
        let record = repo.get(record.id).await.unwrap();
        assert_eq!(record.path.as_deref(), Some(Path::new("lib/moved/a.epub")));
        assert_eq!(record.match_status, MatchStatus::AutoMatched);
        assert_eq!(record.title.as_deref(), Some("Found"));
    }

    #[tokio::test]
    async fn test_pending_enrichment_respects_state_machine() {
        let repo = repo().await;
        let a = repo.insert(&sample_file("lib/a.epub", "hash-a")).await.unwrap();
        let b = repo.insert(&sample_file("lib/b.epub", "hash-b")).await.unwrap();
        repo.set_status(b.id, MatchStatus::Skip).await.unwrap();
        let pending = repo.pending_enrichment().await.unwrap();
        assert_eq!(pending.iter().map(|r| r.id).collect::<Vec<_>>(), vec![a.id]);
    }

    #[tokio::test]
    async fn test_merge_fills_blanks_and_deletes_secondary() {
        let repo = repo().await;
        let physical = repo.create_physical("Shelf Copy", Some("Jane Smith")).await.unwrap();
        let file = repo.insert(&sample_file("lib/a.epub", "hash-a")).await.unwrap();
        repo.apply_auto_metadata(file.id, &sample_candidate("Shelf Copy"), Confidence::High).await.unwrap();

        let merged = repo.merge(physical.id, file.id).await.unwrap();
        assert_eq!(merged.title.as_deref(), Some("Shelf Copy"));
        assert_eq!(merged.path.as_deref(), Some(Path::new("lib/a.epub")));
        assert!(!merged.physical);
        // Physical record was confirmed, so the merged one stays confirmed.
        assert_eq!(merged.match_status, MatchStatus::Confirmed);
        assert!(repo.try_get(file.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_merge_into_self_is_rejected() {
        let repo = repo().await;
        let record = repo.insert(&sample_file("lib/a.epub", "hash-a")).await.unwrap();
        assert!(repo.merge(record.id, record.id).await.is_err());
    }

    #[tokio::test]
    async fn test_list_filters_and_shelf_order() {
        let repo = repo().await;
        let a = repo.insert(&sample_file("lib/a.epub", "hash-a")).await.unwrap();
        let b = repo.insert(&sample_file("lib/b.epub", "hash-b")).await.unwrap();
        let c = repo.insert(&sample_file("lib/c.epub", "hash-c")).await.unwrap();
        repo.fill_call_number(b.id, &CallNumber::parse("TK5105.875").unwrap()).await.unwrap();
        repo.fill_call_number(c.id, &CallNumber::parse("QA76.73.R87").unwrap()).await.unwrap();

        let shelved = repo
            .list(&BookFilter { sort: SortOrder::Shelf, ..Default::default() })
            .await
            .unwrap();
        // QA before TK; the unclassified record sinks to the end.
        assert_eq!(shelved.iter().map(|r| r.id).collect::<Vec<_>>(), vec![c.id, b.id, a.id]);

        let qa_only = repo
            .list(&BookFilter { call_prefix: Some("QA".to_string()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(qa_only.len(), 1);
        assert_eq!(qa_only[0].id, c.id);
    }

    #[tokio::test]
    async fn test_detach_file_keeps_metadata() {
        let repo = repo().await;
        let record = repo.insert(&sample_file("lib/a.epub", "hash-a")).await.unwrap();
        repo.save_edit(record.id, &BookEdit { title: Some("Keeper".to_string()), ..Default::default() })
            .await
            .unwrap();
        assert!(repo.detach_file(record.id).await.unwrap());
        let record = repo.get(record.id).await.unwrap();
        assert!(record.path.is_none());
        assert!(record.content_hash.is_none());
        assert_eq!(record.title.as_deref(), Some("Keeper"));
    }
}
