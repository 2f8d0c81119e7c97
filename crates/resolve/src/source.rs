//! The seam between the cascade and concrete metadata sources.

use async_trait::async_trait;
use shelfmark_catalog::MatchCandidate;

use crate::client::SourceClient;
use crate::error::Result;

/// A bibliographic metadata source.
///
/// Implementations must route all traffic through the given [`SourceClient`]
/// so the cache-first and rate-limit disciplines hold. Returning `Ok(None)`
/// means "asked, nothing there"; errors mean the source couldn't be asked.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Exact lookup by 13-digit ISBN.
    async fn by_isbn(&self, client: &SourceClient, isbn13: &str) -> Result<Option<MatchCandidate>>;

    /// Fuzzy lookup by title. Candidates from here are marked as
    /// non-identifier matches and rank below ISBN hits.
    async fn by_title(&self, client: &SourceClient, title: &str) -> Result<Option<MatchCandidate>>;
}
