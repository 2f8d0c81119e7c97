//! Cache-first HTTP client shared by all sources.

use exn::ResultExt;
use shelfmark_catalog::{CacheAnswer, CacheStore};
use std::time::Duration;

use crate::error::{ErrorKind, Result};
use crate::limit::RateGate;

const USER_AGENT: &str = concat!("shelfmark/", env!("CARGO_PKG_VERSION"));

/// All external traffic funnels through here, which is what makes the cache
/// law enforceable: a fresh cache entry means no socket is ever opened.
#[derive(Debug, Clone)]
pub struct SourceClient {
    http: reqwest::Client,
    cache: CacheStore,
    gate: RateGate,
}

impl SourceClient {
    pub fn new(cache: CacheStore, timeout: Duration, min_interval: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .or_raise(|| ErrorKind::Http("client construction".to_string()))?;
        Ok(Self { http, cache, gate: RateGate::new(min_interval) })
    }

    /// Fetch a URL through the cache. Returns `None` for a confirmed empty
    /// result (cached 404 or cached empty payload).
    ///
    /// Success and 404 responses are cached; transport failures and server
    /// errors are returned as errors and NOT cached, so the next pass gets
    /// another attempt.
    pub async fn cached_get(&self, source: &str, key: &str, url: &str) -> Result<Option<String>> {
        match self.cache.get(source, key).await.or_raise(|| ErrorKind::Cache)? {
            CacheAnswer::Hit(payload) => {
                tracing::debug!(source, key, "cache hit");
                return Ok(Some(payload));
            }
            CacheAnswer::KnownEmpty => {
                tracing::debug!(source, key, "cache hit (known empty)");
                return Ok(None);
            }
            CacheAnswer::Miss => {}
        }

        self.gate.wait(source).await;
        tracing::debug!(source, key, url, "live fetch");
        let response =
            self.http.get(url).send().await.or_raise(|| ErrorKind::Http(format!("GET {source}")))?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            self.cache.put(source, key, "").await.or_raise(|| ErrorKind::Cache)?;
            return Ok(None);
        }
        if !status.is_success() {
            exn::bail!(ErrorKind::Http(format!("{source} answered {status}")));
        }
        let body = response.text().await.or_raise(|| ErrorKind::Http(format!("{source} body read")))?;
        self.cache.put(source, key, &body).await.or_raise(|| ErrorKind::Cache)?;
        Ok(Some(body))
    }
}
