//! Google Books: second metadata source. Works unauthenticated on a lower
//! quota; a configured API key is simply appended when present.

use async_trait::async_trait;
use exn::ResultExt;
use serde_json::Value;
use shelfmark_catalog::MatchCandidate;

use crate::client::SourceClient;
use crate::error::{ErrorKind, Result};
use crate::source::MetadataSource;
use crate::subjects::clean_subjects;

const SOURCE: &str = "googlebooks";
const DEFAULT_BASE: &str = "https://www.googleapis.com/books/v1";

#[derive(Debug, Clone)]
pub struct GoogleBooks {
    base_url: String,
    api_key: Option<String>,
}

impl GoogleBooks {
    pub fn new(api_key: Option<String>) -> Self {
        Self { base_url: DEFAULT_BASE.to_string(), api_key }
    }

    fn volumes_url(&self, query: &str) -> Result<reqwest::Url> {
        let mut params = vec![("q", query), ("maxResults", "5")];
        if let Some(key) = &self.api_key {
            params.push(("key", key.as_str()));
        }
        reqwest::Url::parse_with_params(&format!("{}/volumes", self.base_url), &params)
            .or_raise(|| ErrorKind::MalformedPayload(SOURCE))
    }
}

#[async_trait]
impl MetadataSource for GoogleBooks {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn by_isbn(&self, client: &SourceClient, isbn13: &str) -> Result<Option<MatchCandidate>> {
        let url = self.volumes_url(&format!("isbn:{isbn13}"))?;
        let Some(body) = client.cached_get(SOURCE, &format!("isbn:{isbn13}"), url.as_str()).await? else {
            return Ok(None);
        };
        parse_volumes_payload(&body, true)
    }

    async fn by_title(&self, client: &SourceClient, title: &str) -> Result<Option<MatchCandidate>> {
        let url = self.volumes_url(&format!("intitle:{title}"))?;
        let key = format!("title:{}", title.to_lowercase());
        let Some(body) = client.cached_get(SOURCE, &key, url.as_str()).await? else {
            return Ok(None);
        };
        parse_volumes_payload(&body, false)
    }
}

/// A volumes query answers `{"totalItems": 0}` when nothing matches.
pub(crate) fn parse_volumes_payload(body: &str, identifier_match: bool) -> Result<Option<MatchCandidate>> {
    let value: Value = serde_json::from_str(body).or_raise(|| ErrorKind::MalformedPayload(SOURCE))?;
    let Some(item) = value.get("items").and_then(Value::as_array).and_then(|items| items.first()) else {
        return Ok(None);
    };
    let Some(info) = item.get("volumeInfo") else {
        exn::bail!(ErrorKind::MalformedPayload(SOURCE));
    };
    let authors: Vec<String> = info
        .get("authors")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    let industry_id = |kind: &str| -> Option<String> {
        info.get("industryIdentifiers")?
            .as_array()?
            .iter()
            .find(|entry| entry.get("type").and_then(Value::as_str) == Some(kind))?
            .get("identifier")?
            .as_str()
            .map(str::to_string)
    };
    Ok(Some(MatchCandidate {
        source: SOURCE.to_string(),
        identifier_match,
        isbn10: industry_id("ISBN_10"),
        isbn13: industry_id("ISBN_13"),
        openlibrary_id: None,
        googlebooks_id: item.get("id").and_then(Value::as_str).map(str::to_string),
        title: string_field(info, "title"),
        subtitle: string_field(info, "subtitle"),
        author: if authors.is_empty() { None } else { Some(authors.join(", ")) },
        publisher: string_field(info, "publisher"),
        publish_year: info
            .get("publishedDate")
            .and_then(Value::as_str)
            .and_then(|date| date.get(..4)?.parse().ok()),
        subjects: clean_subjects(
            info.get("categories")
                .and_then(Value::as_array)
                .map(|cats| cats.iter().filter_map(Value::as_str).collect::<Vec<_>>())
                .unwrap_or_default(),
        ),
        description: string_field(info, "description"),
        cover_url: info
            .get("imageLinks")
            .and_then(|links| links.get("thumbnail"))
            .and_then(Value::as_str)
            .map(str::to_string),
        language: string_field(info, "language"),
        page_count: info.get("pageCount").and_then(Value::as_i64),
    }))
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOLUMES_FIXTURE: &str = r#"{
        "totalItems": 1,
        "items": [{
            "id": "zyTCAlFPjgYC",
            "volumeInfo": {
                "title": "The Google Story",
                "authors": ["David A. Vise", "Mark Malseed"],
                "publisher": "Random House",
                "publishedDate": "2005-11-15",
                "description": "An account.",
                "pageCount": 207,
                "categories": ["Business & Economics"],
                "language": "en",
                "imageLinks": {"thumbnail": "https://books.example/t.jpg"},
                "industryIdentifiers": [
                    {"type": "ISBN_10", "identifier": "055380457X"},
                    {"type": "ISBN_13", "identifier": "9780553804577"}
                ]
            }
        }]
    }"#;

    #[test]
    fn test_parse_volumes_payload() {
        let candidate = parse_volumes_payload(VOLUMES_FIXTURE, true).unwrap().unwrap();
        assert_eq!(candidate.googlebooks_id.as_deref(), Some("zyTCAlFPjgYC"));
        assert_eq!(candidate.isbn13.as_deref(), Some("9780553804577"));
        assert_eq!(candidate.author.as_deref(), Some("David A. Vise, Mark Malseed"));
        assert_eq!(candidate.publish_year, Some(2005));
        assert_eq!(candidate.language.as_deref(), Some("en"));
    }

    #[test]
    fn test_no_items_means_no_candidate() {
        assert!(parse_volumes_payload(r#"{"totalItems": 0}"#, true).unwrap().is_none());
    }

    #[test]
    fn test_key_is_appended_when_configured() {
        let gb = GoogleBooks::new(Some("sekrit".to_string()));
        let url = gb.volumes_url("isbn:123").unwrap();
        assert!(url.as_str().contains("key=sekrit"));
        let gb = GoogleBooks::new(None);
        assert!(!gb.volumes_url("isbn:123").unwrap().as_str().contains("key="));
    }
}
