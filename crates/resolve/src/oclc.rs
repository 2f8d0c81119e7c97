//! OCLC Classify: last resort of the classification cascade.
//!
//! The Classify service aggregates holdings and reports the most popular LC
//! call number across libraries as attributes on an `<lcc>` element:
//! `nsfa` (normalized, no cutter) and `sfa` (full form).

use exn::ResultExt;
use regex::Regex;
use std::sync::LazyLock;

use crate::client::SourceClient;
use crate::error::{ErrorKind, Result};

const SOURCE: &str = "oclc";
const DEFAULT_BASE: &str = "http://classify.oclc.org/classify2/Classify";

static MOST_POPULAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<lcc>.*?<mostPopular[^>]*\b(?:nsfa|sfa)="([^"]+)""#).unwrap()
});

#[derive(Debug, Clone)]
pub struct OclcClassify {
    base_url: String,
}

impl Default for OclcClassify {
    fn default() -> Self {
        Self { base_url: DEFAULT_BASE.to_string() }
    }
}

impl OclcClassify {
    /// Fetch the most popular LC call number for an ISBN across holdings.
    pub async fn classification(&self, client: &SourceClient, isbn13: &str) -> Result<Option<String>> {
        let url = reqwest::Url::parse_with_params(
            &self.base_url,
            &[("isbn", isbn13), ("summary", "true")],
        )
        .or_raise(|| ErrorKind::MalformedPayload(SOURCE))?;
        let Some(body) = client.cached_get(SOURCE, &format!("isbn:{isbn13}"), url.as_str()).await? else {
            return Ok(None);
        };
        Ok(parse_classify_response(&body))
    }
}

pub(crate) fn parse_classify_response(body: &str) -> Option<String> {
    MOST_POPULAR.captures(body).map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_most_popular_lcc() {
        let body = r#"<classify>
            <recommendations>
              <lcc>
                <mostPopular holdings="230" nsfa="QA76.73" sfa="QA76.73 .K58 2019"/>
              </lcc>
              <ddc><mostPopular holdings="230" nsfa="005.13" sfa="005.13/3"/></ddc>
            </recommendations>
        </classify>"#;
        assert_eq!(parse_classify_response(body).as_deref(), Some("QA76.73"));
    }

    #[test]
    fn test_no_lcc_recommendation() {
        let body = r#"<classify><recommendations><ddc>
            <mostPopular nsfa="005.13"/>
        </ddc></recommendations></classify>"#;
        assert!(parse_classify_response(body).is_none());
    }
}
