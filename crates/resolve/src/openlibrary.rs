//! Open Library: the primary metadata source, and the second step of the
//! classification cascade (works/editions carry `lc_classifications`).

use async_trait::async_trait;
use exn::ResultExt;
use regex::Regex;
use serde_json::Value;
use shelfmark_catalog::MatchCandidate;
use std::sync::LazyLock;

use crate::client::SourceClient;
use crate::error::{ErrorKind, Result};
use crate::source::MetadataSource;
use crate::subjects::clean_subjects;

const SOURCE: &str = "openlibrary";
const DEFAULT_BASE: &str = "https://openlibrary.org";

static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{4})\b").unwrap());

#[derive(Debug, Clone)]
pub struct OpenLibrary {
    base_url: String,
}

impl Default for OpenLibrary {
    fn default() -> Self {
        Self { base_url: DEFAULT_BASE.to_string() }
    }
}

impl OpenLibrary {
    /// Pull a raw LC classification string for a stored Open Library id.
    /// Work ids are resolved through their editions; edition ids directly.
    pub async fn classification(&self, client: &SourceClient, ol_id: &str) -> Result<Option<String>> {
        let (key, url) = if ol_id.ends_with('W') {
            (format!("lcc:{ol_id}"), format!("{}/works/{ol_id}/editions.json?limit=50", self.base_url))
        } else {
            (format!("lcc:{ol_id}"), format!("{}/books/{ol_id}.json", self.base_url))
        };
        let Some(body) = client.cached_get(SOURCE, &key, &url).await? else {
            return Ok(None);
        };
        let value: Value = serde_json::from_str(&body).or_raise(|| ErrorKind::MalformedPayload(SOURCE))?;
        Ok(first_lcc(&value))
    }
}

/// Walk a works-editions listing or a single edition document for the first
/// `lc_classifications` entry.
fn first_lcc(value: &Value) -> Option<String> {
    let editions: Vec<&Value> = match value.get("entries").and_then(Value::as_array) {
        Some(entries) => entries.iter().collect(),
        None => vec![value],
    };
    editions
        .iter()
        .filter_map(|edition| edition.get("lc_classifications")?.as_array()?.first()?.as_str())
        .map(str::to_string)
        .next()
}

#[async_trait]
impl MetadataSource for OpenLibrary {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn by_isbn(&self, client: &SourceClient, isbn13: &str) -> Result<Option<MatchCandidate>> {
        let url = format!(
            "{}/api/books?bibkeys=ISBN:{isbn13}&format=json&jscmd=data",
            self.base_url
        );
        let Some(body) = client.cached_get(SOURCE, &format!("isbn:{isbn13}"), &url).await? else {
            return Ok(None);
        };
        parse_books_payload(&body, isbn13)
    }

    async fn by_title(&self, client: &SourceClient, title: &str) -> Result<Option<MatchCandidate>> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/search.json", self.base_url),
            &[("title", title), ("limit", "5")],
        )
        .or_raise(|| ErrorKind::MalformedPayload(SOURCE))?;
        let key = format!("title:{}", title.to_lowercase());
        let Some(body) = client.cached_get(SOURCE, &key, url.as_str()).await? else {
            return Ok(None);
        };
        parse_search_payload(&body)
    }
}

/// The Books API (`jscmd=data`) answers with an object keyed `"ISBN:<n>"`.
/// A book the source doesn't know yields `{}`.
pub(crate) fn parse_books_payload(body: &str, isbn13: &str) -> Result<Option<MatchCandidate>> {
    let value: Value = serde_json::from_str(body).or_raise(|| ErrorKind::MalformedPayload(SOURCE))?;
    let Some(data) = value.get(format!("ISBN:{isbn13}")) else {
        return Ok(None);
    };
    let names = |field: &str| -> Vec<String> {
        data.get(field)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };
    let authors = names("authors");
    let publishers = names("publishers");
    let identifiers = data.get("identifiers");
    let identifier = |field: &str| -> Option<String> {
        identifiers?.get(field)?.as_array()?.first()?.as_str().map(str::to_string)
    };
    Ok(Some(MatchCandidate {
        source: SOURCE.to_string(),
        identifier_match: true,
        isbn10: identifier("isbn_10"),
        isbn13: identifier("isbn_13").or_else(|| Some(isbn13.to_string())),
        openlibrary_id: identifier("openlibrary"),
        googlebooks_id: None,
        title: string_field(data, "title"),
        subtitle: string_field(data, "subtitle"),
        author: join_nonempty(&authors),
        publisher: join_nonempty(&publishers),
        publish_year: string_field(data, "publish_date").as_deref().and_then(extract_year),
        subjects: clean_subjects(names("subjects")),
        description: None,
        cover_url: data
            .get("cover")
            .and_then(|cover| cover.get("large").or_else(|| cover.get("medium")))
            .and_then(Value::as_str)
            .map(str::to_string),
        language: None,
        page_count: data.get("number_of_pages").and_then(Value::as_i64),
    }))
}

/// The search API returns ranked `docs`; the first is taken, marked as a
/// non-identifier match.
pub(crate) fn parse_search_payload(body: &str) -> Result<Option<MatchCandidate>> {
    let value: Value = serde_json::from_str(body).or_raise(|| ErrorKind::MalformedPayload(SOURCE))?;
    let Some(doc) = value.get("docs").and_then(Value::as_array).and_then(|docs| docs.first()) else {
        return Ok(None);
    };
    let authors: Vec<String> = doc
        .get("author_name")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    let isbn13 = doc
        .get("isbn")
        .and_then(Value::as_array)
        .and_then(|isbns| {
            isbns.iter().filter_map(Value::as_str).find(|candidate| candidate.len() == 13)
        })
        .map(str::to_string);
    Ok(Some(MatchCandidate {
        source: SOURCE.to_string(),
        identifier_match: false,
        isbn13,
        openlibrary_id: doc
            .get("key")
            .and_then(Value::as_str)
            .and_then(|key| key.rsplit('/').next())
            .map(str::to_string),
        title: string_field(doc, "title"),
        author: join_nonempty(&authors),
        publish_year: doc.get("first_publish_year").and_then(Value::as_i64),
        subjects: clean_subjects(
            doc.get("subject")
                .and_then(Value::as_array)
                .map(|subjects| subjects.iter().filter_map(Value::as_str).collect::<Vec<_>>())
                .unwrap_or_default(),
        ),
        ..Default::default()
    }))
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(Value::as_str).map(str::to_string)
}

fn join_nonempty(items: &[String]) -> Option<String> {
    if items.is_empty() { None } else { Some(items.join(", ")) }
}

fn extract_year(date: &str) -> Option<i64> {
    YEAR.captures(date)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOOKS_FIXTURE: &str = r#"{
        "ISBN:9783161484100": {
            "title": "Module Theory",
            "subtitle": "Endomorphism rings",
            "authors": [{"name": "Alberto Facchini"}],
            "publishers": [{"name": "Birkhauser"}],
            "publish_date": "June 1998",
            "number_of_pages": 285,
            "subjects": [{"name": "Modules (Algebra)"}, {"name": "QA247"}],
            "cover": {"medium": "https://covers.example/m.jpg"},
            "identifiers": {
                "openlibrary": ["OL123M"],
                "isbn_10": ["3161484103"],
                "isbn_13": ["9783161484100"]
            }
        }
    }"#;

    #[test]
    fn test_parse_books_payload() {
        let candidate = parse_books_payload(BOOKS_FIXTURE, "9783161484100").unwrap().unwrap();
        assert!(candidate.identifier_match);
        assert_eq!(candidate.title.as_deref(), Some("Module Theory"));
        assert_eq!(candidate.author.as_deref(), Some("Alberto Facchini"));
        assert_eq!(candidate.publish_year, Some(1998));
        assert_eq!(candidate.openlibrary_id.as_deref(), Some("OL123M"));
        assert_eq!(candidate.page_count, Some(285));
        // The call-number-like "subject" was filtered out.
        assert_eq!(candidate.subjects, vec!["Modules (Algebra)".to_string()]);
    }

    #[test]
    fn test_unknown_isbn_answers_empty_object() {
        assert!(parse_books_payload("{}", "9783161484100").unwrap().is_none());
    }

    #[test]
    fn test_parse_search_payload_marks_fuzzy_match() {
        let body = r#"{"docs": [{
            "key": "/works/OL45883W",
            "title": "Fantastic Mr Fox",
            "author_name": ["Roald Dahl"],
            "first_publish_year": 1970,
            "isbn": ["0140328726", "9780140328721"]
        }]}"#;
        let candidate = parse_search_payload(body).unwrap().unwrap();
        assert!(!candidate.identifier_match);
        assert_eq!(candidate.openlibrary_id.as_deref(), Some("OL45883W"));
        assert_eq!(candidate.isbn13.as_deref(), Some("9780140328721"));
        assert_eq!(candidate.publish_year, Some(1970));
    }

    #[test]
    fn test_garbage_payload_is_malformed() {
        assert!(parse_books_payload("not json", "123").is_err());
    }

    #[test]
    fn test_first_lcc_from_editions_listing() {
        let value: Value = serde_json::from_str(
            r#"{"entries": [
                {"title": "no classification here"},
                {"lc_classifications": ["QA76.73.R87 2019"]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(first_lcc(&value).as_deref(), Some("QA76.73.R87 2019"));
    }

    #[test]
    fn test_first_lcc_from_single_edition() {
        let value: Value = serde_json::from_str(r#"{"lc_classifications": ["PS3545.I5365"]}"#).unwrap();
        assert_eq!(first_lcc(&value).as_deref(), Some("PS3545.I5365"));
    }
}
