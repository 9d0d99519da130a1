//! # Expiring Page Cache
//!
//! [`PageCache`] caches page bodies by URL in a [`KeyValueStore`]:
//!
//! - `cached:<url>` holds the body and expires after the configured TTL
//!   (10 seconds by default); the store enforces the expiry.
//! - `count:<url>` counts origin fetches. Cache hits never touch it.
//!
//! Misses are serialized per URL, so concurrent callers asking for the same
//! cold URL trigger exactly one origin fetch. A failed fetch writes nothing.

use crate::config::PageCacheConfig;
use crate::error::{CacheError, Result};
use crate::stats::CacheStats;
use crate::store::KeyValueStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

/// Source of page bodies
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the body of `url`, giving up after `timeout`
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String>;
}

/// [`PageFetcher`] backed by a reqwest client
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing client, e.g. one with custom TLS or proxy settings
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String> {
        debug!("GET {} (timeout {:?})", url, timeout);

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| fetch_error(url, timeout, e))?;

        response.text().await.map_err(|e| fetch_error(url, timeout, e))
    }
}

fn fetch_error(url: &str, timeout: Duration, e: reqwest::Error) -> CacheError {
    if e.is_timeout() {
        CacheError::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            context: format!("GET {}", url),
        }
    } else {
        CacheError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

/// URL-keyed cache of page bodies with origin fetch counting
pub struct PageCache<F> {
    store: Arc<dyn KeyValueStore>,
    fetcher: F,
    config: PageCacheConfig,

    /// One async lock per URL currently or previously being fetched
    in_flight: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,

    stats: Mutex<CacheStats>,
}

impl<F: PageFetcher> PageCache<F> {
    /// Create a page cache with the default configuration
    pub fn new(store: Arc<dyn KeyValueStore>, fetcher: F) -> Self {
        Self {
            store,
            fetcher,
            config: PageCacheConfig::default(),
            in_flight: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Create a page cache with a custom configuration
    pub fn with_config(
        store: Arc<dyn KeyValueStore>,
        fetcher: F,
        config: PageCacheConfig,
    ) -> Result<Self> {
        config.validate()?;
        info!("Initializing page cache with config: {:?}", config);

        let mut cache = Self::new(store, fetcher);
        cache.config = config;
        Ok(cache)
    }

    /// Return the body of `url`, from cache when fresh, from the origin otherwise
    pub async fn get_page(&self, url: &str) -> Result<String> {
        let cached_key = self.config.cached_key(url);

        if let Some(body) = self.cached_body(&cached_key).await? {
            debug!("Page cache hit: {}", url);
            self.record(|s| s.hits += 1);
            return Ok(body);
        }

        let gate = self.gate(url);
        let _guard = gate.lock().await;

        // Another caller may have filled the entry while we waited
        if let Some(body) = self.cached_body(&cached_key).await? {
            debug!("Page cache filled while waiting: {}", url);
            self.record(|s| s.hits += 1);
            return Ok(body);
        }

        debug!("Page cache miss: {}", url);
        self.record(|s| s.misses += 1);

        let body = match self.fetcher.fetch(url, self.config.fetch_timeout).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Fetch of {} failed: {}", url, e);
                self.record(|s| s.fetch_failures += 1);
                return Err(e);
            }
        };

        // Body first: a failed write must not count a fetch nobody can reuse
        self.store
            .set_ex(&cached_key, body.clone().into_bytes(), self.config.ttl)
            .await?;
        let count = self.store.incr(&self.config.count_key(url)).await?;

        debug!("Fetched {} (origin fetch #{})", url, count);
        Ok(body)
    }

    /// Number of origin fetches made for `url`
    pub async fn request_count(&self, url: &str) -> Result<u64> {
        match self.store.get(&self.config.count_key(url)).await? {
            Some(raw) => String::from_utf8_lossy(&raw)
                .trim()
                .parse::<u64>()
                .map_err(|e| CacheError::decode("counter", e)),
            None => Ok(0),
        }
    }

    /// Hit/miss statistics for this instance
    pub fn stats(&self) -> CacheStats {
        match self.stats.lock() {
            Ok(stats) => stats.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn config(&self) -> &PageCacheConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    async fn cached_body(&self, key: &str) -> Result<Option<String>> {
        match self.store.get(key).await? {
            Some(raw) => String::from_utf8(raw)
                .map(Some)
                .map_err(|e| CacheError::decode("text", e)),
            None => Ok(None),
        }
    }

    fn gate(&self, url: &str) -> Arc<AsyncMutex<()>> {
        let mut in_flight = match self.in_flight.lock() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };

        // Drop gates nobody else holds
        in_flight.retain(|_, gate| Arc::strong_count(gate) > 1);

        in_flight
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn record(&self, update: impl FnOnce(&mut CacheStats)) {
        let mut stats = match self.stats.lock() {
            Ok(stats) => stats,
            Err(poisoned) => poisoned.into_inner(),
        };
        update(&mut stats);
    }
}
