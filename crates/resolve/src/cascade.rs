//! The resolution cascades: metadata first, classification second.
//!
//! Both share the rules that make unattended scans safe: every source is
//! asked through the cache, a failing source is a logged no-result rather
//! than an abort, and nothing here ever writes to a book record - callers
//! get candidates back and apply them under the state machine's rules.

use shelfmark_catalog::{Confidence, MatchCandidate};
use shelfmark_extract::{CallNumber, callnumber};
use tracing::instrument;

use crate::client::SourceClient;
use crate::googlebooks::GoogleBooks;
use crate::loc::LocSru;
use crate::oclc::OclcClassify;
use crate::openlibrary::OpenLibrary;
use crate::source::MetadataSource;

#[derive(Debug, Clone)]
pub struct Resolver {
    client: SourceClient,
    openlibrary: OpenLibrary,
    googlebooks: GoogleBooks,
    loc: LocSru,
    oclc: OclcClassify,
}

impl Resolver {
    pub fn new(client: SourceClient, google_api_key: Option<String>) -> Self {
        Self {
            client,
            openlibrary: OpenLibrary::default(),
            googlebooks: GoogleBooks::new(google_api_key),
            loc: LocSru::default(),
            oclc: OclcClassify::default(),
        }
    }

    fn sources(&self) -> [&dyn MetadataSource; 2] {
        // Order matters: it breaks ranking ties.
        [&self.openlibrary, &self.googlebooks]
    }

    /// Run the metadata cascade: every source by ISBN, and only if that
    /// yields nothing, every source by fallback title. Returns candidates
    /// ranked best-first; an empty vec means nobody knew the book.
    #[instrument(skip(self))]
    pub async fn metadata(&self, isbn13: Option<&str>, title_fallback: Option<&str>) -> Vec<MatchCandidate> {
        let mut candidates = Vec::new();
        if let Some(isbn13) = isbn13 {
            for source in self.sources() {
                match source.by_isbn(&self.client, isbn13).await {
                    Ok(Some(candidate)) => candidates.push(candidate),
                    Ok(None) => {}
                    Err(error) => {
                        tracing::warn!(source = source.name(), %error, "source lookup failed");
                    }
                }
            }
        }
        if candidates.is_empty()
            && let Some(title) = title_fallback
        {
            for source in self.sources() {
                match source.by_title(&self.client, title).await {
                    Ok(Some(candidate)) => candidates.push(candidate),
                    Ok(None) => {}
                    Err(error) => {
                        tracing::warn!(source = source.name(), %error, "title search failed");
                    }
                }
            }
        }
        rank(&mut candidates);
        candidates
    }

    /// Collapse ranked candidates into one: the top candidate wins every
    /// field it has, and its gaps fill from the rest in rank order.
    pub fn merge(mut candidates: Vec<MatchCandidate>) -> Option<MatchCandidate> {
        rank(&mut candidates);
        let mut iter = candidates.into_iter();
        let mut merged = iter.next()?;
        for candidate in iter {
            merged.fill_from(&candidate);
        }
        Some(merged)
    }

    /// Confidence earned by a candidate: identifier hits are trustworthy,
    /// title matches need human eyes eventually.
    pub fn confidence_for(candidate: &MatchCandidate) -> Confidence {
        if candidate.identifier_match { Confidence::High } else { Confidence::Low }
    }

    /// Run the classification cascade for a record that has no call number.
    /// Step 1 (embedded file data) has already happened at extraction time;
    /// this covers steps 2-4: Open Library by stored foreign id, LOC SRU by
    /// ISBN, OCLC Classify by ISBN. First validated answer wins.
    #[instrument(skip(self))]
    pub async fn classification(
        &self,
        openlibrary_id: Option<&str>,
        isbn13: Option<&str>,
    ) -> Option<CallNumber> {
        if let Some(ol_id) = openlibrary_id {
            match self.openlibrary.classification(&self.client, ol_id).await {
                Ok(Some(raw)) => {
                    if let Some(call) = validate(&raw) {
                        return Some(call);
                    }
                    tracing::debug!(raw, "openlibrary classification failed validation");
                }
                Ok(None) => {}
                Err(error) => tracing::warn!(%error, "openlibrary classification failed"),
            }
        }
        let isbn13 = isbn13?;
        match self.loc.classification(&self.client, isbn13).await {
            Ok(Some(raw)) => {
                if let Some(call) = validate(&raw) {
                    return Some(call);
                }
                tracing::debug!(raw, "loc classification failed validation");
            }
            Ok(None) => {}
            Err(error) => tracing::warn!(%error, "loc classification failed"),
        }
        match self.oclc.classification(&self.client, isbn13).await {
            Ok(Some(raw)) => {
                if let Some(call) = validate(&raw) {
                    return Some(call);
                }
                tracing::debug!(raw, "oclc classification failed validation");
            }
            Ok(None) => {}
            Err(error) => tracing::warn!(%error, "oclc classification failed"),
        }
        None
    }
}

/// Identifier matches first; source order (already insertion order) breaks
/// ties. The sort is stable so equal keys keep cascade order.
fn rank(candidates: &mut [MatchCandidate]) {
    candidates.sort_by_key(|candidate| !candidate.identifier_match);
}

/// Sources return free-form call-number strings; only ones that parse (or
/// contain a parseable shelf mark, for multi-cutter forms) are accepted.
fn validate(raw: &str) -> Option<CallNumber> {
    CallNumber::parse(raw).ok().or_else(|| callnumber::scan_text(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(source: &str, identifier_match: bool, title: &str) -> MatchCandidate {
        MatchCandidate {
            source: source.to_string(),
            identifier_match,
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_identifier_matches_outrank_title_matches() {
        let mut candidates = vec![
            candidate("openlibrary", false, "fuzzy"),
            candidate("googlebooks", true, "exact"),
        ];
        rank(&mut candidates);
        assert_eq!(candidates[0].title.as_deref(), Some("exact"));
    }

    #[test]
    fn test_merge_top_candidate_wins_with_fill() {
        let mut top = candidate("openlibrary", true, "Real Title");
        top.author = Some("Jane Smith".to_string());
        let mut backup = candidate("googlebooks", false, "Other Title");
        backup.description = Some("The only description anyone had.".to_string());
        let merged = Resolver::merge(vec![backup, top]).unwrap();
        assert_eq!(merged.title.as_deref(), Some("Real Title"));
        assert_eq!(merged.author.as_deref(), Some("Jane Smith"));
        assert_eq!(merged.description.as_deref(), Some("The only description anyone had."));
    }

    #[test]
    fn test_merge_of_nothing_is_nothing() {
        assert!(Resolver::merge(Vec::new()).is_none());
    }

    #[test]
    fn test_validate_accepts_multi_cutter_loc_strings() {
        let call = validate("QA76.73.R87 K58 2019").unwrap();
        assert_eq!(call.class, "QA");
        assert_eq!(call.cutter.as_deref(), Some("R87"));
        assert!(validate("not a call number").is_none());
        assert!(validate("XX123.4").is_none());
    }

    #[test]
    fn test_confidence_mapping() {
        assert_eq!(Resolver::confidence_for(&candidate("x", true, "t")), Confidence::High);
        assert_eq!(Resolver::confidence_for(&candidate("x", false, "t")), Confidence::Low);
    }
}
