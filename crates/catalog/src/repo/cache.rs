//! Source-response cache store.
//!
//! Every outbound lookup is keyed by (source, lookup key). A stored empty
//! payload means the source was asked and had nothing: that is a cache hit,
//! not a miss, so the question is never asked again within the TTL. Failed
//! fetches are never written here; they stay eligible for retry.

use exn::ResultExt;
use sqlx::SqlitePool;
use time::UtcDateTime;

use crate::Database;
use crate::error::{ErrorKind, Result};

const SECONDS_PER_DAY: i64 = 86_400;

/// What the cache knows about a (source, key) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheAnswer {
    /// Never asked, or the answer went stale.
    Miss,
    /// The source was asked within the TTL and had nothing.
    KnownEmpty,
    /// A fresh payload.
    Hit(String),
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    pool: SqlitePool,
    ttl_days: i64,
}

impl CacheStore {
    pub fn new(db: &Database, ttl_days: i64) -> Self {
        Self { pool: db.pool().clone(), ttl_days }
    }

    /// Look up a fresh entry. Staleness is decided here, at read time;
    /// expired rows are simply ignored and overwritten by the next put.
    pub async fn get(&self, source: &str, key: &str) -> Result<CacheAnswer> {
        let oldest = UtcDateTime::now().unix_timestamp() - self.ttl_days * SECONDS_PER_DAY;
        let payload: Option<String> = sqlx::query_scalar(include_str!("../../queries/cache_get.sql"))
            .bind(source)
            .bind(key)
            .bind(oldest)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(match payload {
            None => CacheAnswer::Miss,
            Some(payload) if payload.is_empty() => CacheAnswer::KnownEmpty,
            Some(payload) => CacheAnswer::Hit(payload),
        })
    }

    /// Store a response, superseding any previous entry whole. An empty
    /// `payload` records a confirmed empty result.
    pub async fn put(&self, source: &str, key: &str, payload: &str) -> Result<()> {
        sqlx::query(include_str!("../../queries/cache_put.sql"))
            .bind(source)
            .bind(key)
            .bind(payload)
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Entry counts per source.
    pub async fn stats(&self) -> Result<Vec<(String, u64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(include_str!("../../queries/cache_stats.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(rows.into_iter().map(|(source, count)| (source, count as u64)).collect())
    }

    /// Drop cached entries, either for one source or all of them.
    pub async fn clear(&self, source: Option<&str>) -> Result<u64> {
        let result = match source {
            Some(source) => {
                sqlx::query("DELETE FROM source_cache WHERE source = ?").bind(source).execute(&self.pool).await
            }
            None => sqlx::query("DELETE FROM source_cache").execute(&self.pool).await,
        }
        .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }

    /// Backdate an entry's fetch time. Test hook for exercising expiry.
    pub async fn backdate(&self, source: &str, key: &str, days: i64) -> Result<()> {
        sqlx::query("UPDATE source_cache SET fetched_at = fetched_at - ? WHERE source = ? AND key = ?")
            .bind(days * SECONDS_PER_DAY)
            .bind(source)
            .bind(key)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> CacheStore {
        let db = Database::connect_in_memory().await.unwrap();
        CacheStore::new(&db, 30)
    }

    #[tokio::test]
    async fn test_hit_miss_and_known_empty() {
        let store = store().await;
        assert_eq!(store.get("openlibrary", "isbn:123").await.unwrap(), CacheAnswer::Miss);
        store.put("openlibrary", "isbn:123", r#"{"title":"x"}"#).await.unwrap();
        assert_eq!(
            store.get("openlibrary", "isbn:123").await.unwrap(),
            CacheAnswer::Hit(r#"{"title":"x"}"#.to_string())
        );
        store.put("openlibrary", "isbn:456", "").await.unwrap();
        assert_eq!(store.get("openlibrary", "isbn:456").await.unwrap(), CacheAnswer::KnownEmpty);
    }

    #[tokio::test]
    async fn test_expired_entries_read_as_misses() {
        let store = store().await;
        store.put("loc", "isbn:123", "payload").await.unwrap();
        store.backdate("loc", "isbn:123", 31).await.unwrap();
        assert_eq!(store.get("loc", "isbn:123").await.unwrap(), CacheAnswer::Miss);
    }

    #[tokio::test]
    async fn test_put_supersedes_whole_entry() {
        let store = store().await;
        store.put("oclc", "isbn:123", "old").await.unwrap();
        store.backdate("oclc", "isbn:123", 31).await.unwrap();
        store.put("oclc", "isbn:123", "new").await.unwrap();
        assert_eq!(store.get("oclc", "isbn:123").await.unwrap(), CacheAnswer::Hit("new".to_string()));
    }

    #[tokio::test]
    async fn test_stats_and_clear() {
        let store = store().await;
        store.put("openlibrary", "a", "1").await.unwrap();
        store.put("openlibrary", "b", "2").await.unwrap();
        store.put("loc", "a", "3").await.unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats[0], ("openlibrary".to_string(), 2));
        assert_eq!(store.clear(Some("openlibrary")).await.unwrap(), 2);
        assert_eq!(store.clear(None).await.unwrap(), 1);
    }
}
