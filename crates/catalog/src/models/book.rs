use exn::{OptionExt, ResultExt};
use shelfmark_extract::{CallNumber, Extraction, Format, Isbn};
use std::path::PathBuf;
use time::UtcDateTime;

use crate::error::{Error, ErrorKind};
use crate::status::{Confidence, MatchStatus};

/// A catalogued book.
///
/// File-backed records carry `path`, `format` and `content_hash`; physical
/// shelf copies carry none of those. Identity and match state always live
/// here, in the catalog, never in the files.
#[derive(Debug, Clone, PartialEq)]
pub struct BookRecord {
    pub id: i64,
    pub path: Option<PathBuf>,
    pub format: Option<String>,
    pub file_size: Option<u64>,
    pub file_mtime: Option<i64>,
    pub content_hash: Option<String>,
    pub isbn10: Option<String>,
    pub isbn13: Option<String>,
    pub openlibrary_id: Option<String>,
    pub googlebooks_id: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub publish_year: Option<i64>,
    pub subjects: Vec<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub language: Option<String>,
    pub page_count: Option<i64>,
    pub call_number: Option<String>,
    pub call_class: Option<String>,
    pub call_sort: Option<String>,
    pub match_status: MatchStatus,
    pub confidence: Confidence,
    pub manual_override: bool,
    pub physical: bool,
    pub read_on: Option<UtcDateTime>,
    pub rating: Option<u8>,
    pub notes: Option<String>,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}

/// A file discovered on disk, ready to become a record.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub path: PathBuf,
    pub format: Format,
    pub file_size: u64,
    pub file_mtime: i64,
    pub content_hash: String,
    pub isbn: Option<Isbn>,
    pub call_number: Option<CallNumber>,
}

impl NewBook {
    pub fn from_extraction(
        path: PathBuf,
        format: Format,
        file_size: u64,
        file_mtime: i64,
        content_hash: String,
        extraction: Extraction,
    ) -> Self {
        Self {
            path,
            format,
            file_size,
            file_mtime,
            content_hash,
            isbn: extraction.isbn,
            call_number: extraction.call_number,
        }
    }
}

/// One possible identification for a record, as produced by the resolution
/// cascade. Candidates are ephemeral: they are returned to the caller and
/// applied explicitly, never stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchCandidate {
    /// Which source produced this candidate (`openlibrary`, `googlebooks`).
    pub source: String,
    /// Whether the source matched on an exact identifier rather than a
    /// title search. Identifier matches outrank title matches.
    pub identifier_match: bool,
    pub isbn10: Option<String>,
    pub isbn13: Option<String>,
    pub openlibrary_id: Option<String>,
    pub googlebooks_id: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub publish_year: Option<i64>,
    pub subjects: Vec<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub language: Option<String>,
    pub page_count: Option<i64>,
}

impl MatchCandidate {
    /// Fill this candidate's missing fields from another. Existing values
    /// always win; `other` only contributes what's absent.
    pub fn fill_from(&mut self, other: &Self) {
        fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if slot.is_none() {
                slot.clone_from(value);
            }
        }
        fill(&mut self.isbn10, &other.isbn10);
        fill(&mut self.isbn13, &other.isbn13);
        fill(&mut self.openlibrary_id, &other.openlibrary_id);
        fill(&mut self.googlebooks_id, &other.googlebooks_id);
        fill(&mut self.title, &other.title);
        fill(&mut self.subtitle, &other.subtitle);
        fill(&mut self.author, &other.author);
        fill(&mut self.publisher, &other.publisher);
        fill(&mut self.publish_year, &other.publish_year);
        fill(&mut self.description, &other.description);
        fill(&mut self.cover_url, &other.cover_url);
        fill(&mut self.language, &other.language);
        fill(&mut self.page_count, &other.page_count);
        if self.subjects.is_empty() {
            self.subjects.clone_from(&other.subjects);
        }
    }
}

/// Fields a human may change on a record. `None` leaves the stored value
/// untouched; applying an edit always confirms the record.
#[derive(Debug, Clone, Default)]
pub struct BookEdit {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub publish_year: Option<i64>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub notes: Option<String>,
    pub isbn13: Option<String>,
    pub call_number: Option<CallNumber>,
}

/// Raw row shape for `books`. Kept separate from [`BookRecord`] so SQL types
/// stay at the boundary.
#[derive(sqlx::FromRow)]
pub(crate) struct BookRow {
    pub(crate) id: i64,
    pub(crate) path: Option<String>,
    pub(crate) format: Option<String>,
    pub(crate) file_size: Option<i64>,
    pub(crate) file_mtime: Option<i64>,
    pub(crate) content_hash: Option<String>,
    pub(crate) isbn10: Option<String>,
    pub(crate) isbn13: Option<String>,
    pub(crate) openlibrary_id: Option<String>,
    pub(crate) googlebooks_id: Option<String>,
    pub(crate) title: Option<String>,
    pub(crate) subtitle: Option<String>,
    pub(crate) author: Option<String>,
    pub(crate) publisher: Option<String>,
    pub(crate) publish_year: Option<i64>,
    pub(crate) subjects: String,
    pub(crate) description: Option<String>,
    pub(crate) cover_url: Option<String>,
    pub(crate) language: Option<String>,
    pub(crate) page_count: Option<i64>,
    pub(crate) call_number: Option<String>,
    pub(crate) call_class: Option<String>,
    pub(crate) call_sort: Option<String>,
    pub(crate) match_status: String,
    pub(crate) confidence: String,
    pub(crate) manual_override: i64,
    pub(crate) physical: i64,
    pub(crate) read_on: Option<i64>,
    pub(crate) rating: Option<i64>,
    pub(crate) notes: Option<String>,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
}

impl TryFrom<BookRow> for BookRecord {
    type Error = Error;
    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            path: row.path.map(PathBuf::from),
            format: row.format,
            file_size: row
                .file_size
                .map(|s| u64::try_from(s).or_raise(|| ErrorKind::InvalidData("file size")))
                .transpose()?,
            file_mtime: row.file_mtime,
            content_hash: row.content_hash,
            isbn10: row.isbn10,
            isbn13: row.isbn13,
            openlibrary_id: row.openlibrary_id,
            googlebooks_id: row.googlebooks_id,
            title: row.title,
            subtitle: row.subtitle,
            author: row.author,
            publisher: row.publisher,
            publish_year: row.publish_year,
            subjects: serde_json::from_str(&row.subjects).or_raise(|| ErrorKind::InvalidData("subjects"))?,
            description: row.description,
            cover_url: row.cover_url,
            language: row.language,
            page_count: row.page_count,
            call_number: row.call_number,
            call_class: row.call_class,
            call_sort: row.call_sort,
            match_status: row.match_status.parse()?,
            confidence: row.confidence.parse()?,
            manual_override: row.manual_override != 0,
            physical: row.physical != 0,
            read_on: row
                .read_on
                .map(|ts| UtcDateTime::from_unix_timestamp(ts).or_raise(|| ErrorKind::InvalidData("read date")))
                .transpose()?,
            rating: row
                .rating
                .map(|r| u8::try_from(r).or_raise(|| ErrorKind::InvalidData("rating")))
                .transpose()?,
            notes: row.notes,
            created_at: UtcDateTime::from_unix_timestamp(row.created_at)
                .or_raise(|| ErrorKind::InvalidData("creation date"))?,
            updated_at: UtcDateTime::from_unix_timestamp(row.updated_at)
                .or_raise(|| ErrorKind::InvalidData("update date"))?,
        })
    }
}

pub(crate) fn path_to_string(path: &std::path::Path) -> Result<String, Error> {
    Ok(path.to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_row() -> BookRow {
        BookRow {
            id: 1,
            path: Some("library/book.epub".to_string()),
            format: Some("epub".to_string()),
            file_size: Some(1024),
            file_mtime: Some(1_700_000_000),
            content_hash: Some("abc123".to_string()),
            isbn10: None,
            isbn13: Some("9783161484100".to_string()),
            openlibrary_id: None,
            googlebooks_id: None,
            title: Some("A Book".to_string()),
            subtitle: None,
            author: None,
            publisher: None,
            publish_year: None,
            subjects: r#"["Programming"]"#.to_string(),
            description: None,
            cover_url: None,
            language: None,
            page_count: None,
            call_number: None,
            call_class: None,
            call_sort: None,
            match_status: "auto_matched".to_string(),
            confidence: "high".to_string(),
            manual_override: 0,
            physical: 0,
            read_on: None,
            rating: None,
            notes: None,
            created_at: 1_700_000_000,
            updated_at: 1_700_000_000,
        }
    }

    #[test]
    fn test_row_to_record() {
        let record = BookRecord::try_from(minimal_row()).unwrap();
        assert_eq!(record.match_status, MatchStatus::AutoMatched);
        assert_eq!(record.confidence, Confidence::High);
        assert_eq!(record.subjects, vec!["Programming".to_string()]);
        assert!(!record.manual_override);
    }

    #[test]
    fn test_row_with_unknown_status_is_rejected() {
        let mut row = minimal_row();
        row.match_status = "perfect".to_string();
        assert!(BookRecord::try_from(row).is_err());
    }

    #[test]
    fn test_candidate_fill_from_keeps_existing() {
        let mut top = MatchCandidate {
            source: "openlibrary".to_string(),
            title: Some("Kept".to_string()),
            ..Default::default()
        };
        let backup = MatchCandidate {
            source: "googlebooks".to_string(),
            title: Some("Discarded".to_string()),
            description: Some("Filled in".to_string()),
            subjects: vec!["History".to_string()],
            ..Default::default()
        };
        top.fill_from(&backup);
        assert_eq!(top.title.as_deref(), Some("Kept"));
        assert_eq!(top.description.as_deref(), Some("Filled in"));
        assert_eq!(top.subjects, vec!["History".to_string()]);
    }
}
