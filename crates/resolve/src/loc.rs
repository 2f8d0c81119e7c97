//! Library of Congress SRU lookup: third step of the classification cascade.
//!
//! The SRU endpoint answers MARCXML; the call number lives in datafield 050,
//! subfield `a` (class + number) with an optional subfield `b` (cutter).
//! A full XML parser would be overkill for plucking one field out.

use exn::ResultExt;
use regex::Regex;
use std::sync::LazyLock;

use crate::client::SourceClient;
use crate::error::{ErrorKind, Result};

const SOURCE: &str = "loc";
const DEFAULT_BASE: &str = "http://lx2.loc.gov:210/LCDB";

static TAG_050: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<(?:[A-Za-z0-9]+:)?datafield[^>]*tag="050"[^>]*>(.*?)</(?:[A-Za-z0-9]+:)?datafield>"#)
        .unwrap()
});
static SUBFIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<(?:[A-Za-z0-9]+:)?subfield[^>]*code="([ab])"[^>]*>\s*([^<]+?)\s*</"#).unwrap()
});

#[derive(Debug, Clone)]
pub struct LocSru {
    base_url: String,
}

impl Default for LocSru {
    fn default() -> Self {
        Self { base_url: DEFAULT_BASE.to_string() }
    }
}

impl LocSru {
    /// Fetch the raw LC call number for an ISBN, if LOC has catalogued it.
    pub async fn classification(&self, client: &SourceClient, isbn13: &str) -> Result<Option<String>> {
        let url = reqwest::Url::parse_with_params(
            &self.base_url,
            &[
                ("version", "1.1"),
                ("operation", "searchRetrieve"),
                ("query", &format!("bath.isbn={isbn13}")),
                ("maximumRecords", "1"),
                ("recordSchema", "marcxml"),
            ],
        )
        .or_raise(|| ErrorKind::MalformedPayload(SOURCE))?;
        let Some(body) = client.cached_get(SOURCE, &format!("isbn:{isbn13}"), url.as_str()).await? else {
            return Ok(None);
        };
        Ok(parse_marcxml_050(&body))
    }
}

/// Join 050 subfields a and b into one call-number string.
pub(crate) fn parse_marcxml_050(body: &str) -> Option<String> {
    let field = TAG_050.captures(body)?.get(1)?.as_str();
    let mut class_number = None;
    let mut cutter = None;
    for caps in SUBFIELD.captures_iter(field) {
        match &caps[1] {
            "a" if class_number.is_none() => class_number = Some(caps[2].to_string()),
            "b" if cutter.is_none() => cutter = Some(caps[2].to_string()),
            _ => {}
        }
    }
    let class_number = class_number?;
    Some(match cutter {
        Some(cutter) => format!("{class_number} {cutter}"),
        None => class_number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARCXML_FIXTURE: &str = r#"
        <zs:searchRetrieveResponse xmlns:zs="http://www.loc.gov/zing/srw/">
          <zs:records><zs:record><zs:recordData>
            <record xmlns="http://www.loc.gov/MARC21/slim">
              <datafield tag="050" ind1="0" ind2="0">
                <subfield code="a">QA76.73.R87</subfield>
                <subfield code="b">K58 2019</subfield>
              </datafield>
              <datafield tag="082" ind1="0" ind2="0">
                <subfield code="a">005.13/3</subfield>
              </datafield>
            </record>
          </zs:recordData></zs:record></zs:records>
        </zs:searchRetrieveResponse>"#;

    #[test]
    fn test_parse_050_with_cutter_subfield() {
        assert_eq!(parse_marcxml_050(MARCXML_FIXTURE).as_deref(), Some("QA76.73.R87 K58 2019"));
    }

    #[test]
    fn test_parse_050_subfield_a_only() {
        let body = r#"<datafield tag="050"><subfield code="a">PS3545.I5365</subfield></datafield>"#;
        assert_eq!(parse_marcxml_050(body).as_deref(), Some("PS3545.I5365"));
    }

    #[test]
    fn test_no_050_field_means_no_answer() {
        let body = r#"<datafield tag="082"><subfield code="a">005.13</subfield></datafield>"#;
        assert!(parse_marcxml_050(body).is_none());
    }
}
