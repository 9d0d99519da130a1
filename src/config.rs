//! Configuration for the store backends and the page cache

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default lifetime of a cached page
pub const DEFAULT_PAGE_TTL: Duration = Duration::from_secs(10);

/// Default bound on a single origin fetch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Redis server used when `REDIS_URL` is unset
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/";

/// Configuration for the in-process [`MemoryStore`](crate::store::MemoryStore)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Enable the background sweep of expired keys
    ///
    /// Expired keys are never served either way; the sweep only reclaims memory.
    pub enable_auto_cleanup: bool,

    /// Interval between background sweeps
    pub cleanup_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            enable_auto_cleanup: true,
            // Sweep every minute
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl StoreConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.enable_auto_cleanup && self.cleanup_interval.is_zero() {
            return Err(CacheError::ConfigError(
                "cleanup_interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Connection settings for [`RedisStore`](crate::store::RedisStore)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Server URL, e.g. `redis://:password@host:6379/0`
    pub url: String,

    /// Upper bound on establishing the connection
    pub connect_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REDIS_URL.to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Load settings from the environment
    ///
    /// Reads `REDIS_URL` and `REDIS_CONNECT_TIMEOUT_SECS`; unset variables
    /// keep their defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("REDIS_URL") {
            config.url = url.trim().to_string();
        }
        if let Some(secs) = env_secs("REDIS_CONNECT_TIMEOUT_SECS")? {
            config.connect_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("redis://")
            || self.url.starts_with("rediss://")
            || self.url.starts_with("redis+unix://")
            || self.url.starts_with("unix://"))
        {
            return Err(CacheError::ConfigError(format!(
                "unsupported Redis URL scheme: '{}'",
                self.url
            )));
        }

        if self.connect_timeout.is_zero() {
            return Err(CacheError::ConfigError(
                "connect_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration for the URL-keyed [`PageCache`](crate::web::PageCache)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageCacheConfig {
    /// Lifetime of a cached page body
    pub ttl: Duration,

    /// Upper bound on a single origin fetch
    pub fetch_timeout: Duration,

    /// Key prefix of the per-URL origin fetch counters
    pub count_prefix: String,

    /// Key prefix of the cached page bodies
    pub cached_prefix: String,
}

impl Default for PageCacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_PAGE_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            count_prefix: "count:".to_string(),
            cached_prefix: "cached:".to_string(),
        }
    }
}

impl PageCacheConfig {
    /// Create a new builder for page cache configuration
    pub fn builder() -> PageCacheConfigBuilder {
        PageCacheConfigBuilder::default()
    }

    /// Load overrides from the environment
    ///
    /// Reads `PAGE_CACHE_TTL_SECS` and `PAGE_CACHE_FETCH_TIMEOUT_SECS`; unset
    /// variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();

        if let Some(secs) = env_secs("PAGE_CACHE_TTL_SECS")? {
            builder = builder.ttl(Duration::from_secs(secs));
        }
        if let Some(secs) = env_secs("PAGE_CACHE_FETCH_TIMEOUT_SECS")? {
            builder = builder.fetch_timeout(Duration::from_secs(secs));
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.ttl.is_zero() {
            return Err(CacheError::ConfigError(
                "ttl must be greater than 0".to_string(),
            ));
        }

        if self.fetch_timeout.is_zero() {
            return Err(CacheError::ConfigError(
                "fetch_timeout must be greater than 0".to_string(),
            ));
        }

        if self.count_prefix.is_empty() || self.cached_prefix.is_empty() {
            return Err(CacheError::ConfigError(
                "key prefixes must not be empty".to_string(),
            ));
        }

        if self.count_prefix == self.cached_prefix {
            return Err(CacheError::ConfigError(
                "count_prefix and cached_prefix must differ".to_string(),
            ));
        }

        Ok(())
    }

    /// Counter key for `url`
    pub fn count_key(&self, url: &str) -> String {
        format!("{}{}", self.count_prefix, url)
    }

    /// Body key for `url`
    pub fn cached_key(&self, url: &str) -> String {
        format!("{}{}", self.cached_prefix, url)
    }
}

fn env_secs(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| CacheError::ConfigError(format!("{}: {}", name, e))),
        Err(_) => Ok(None),
    }
}

/// Builder for page cache configuration
#[derive(Debug, Default)]
pub struct PageCacheConfigBuilder {
    ttl: Option<Duration>,
    fetch_timeout: Option<Duration>,
    count_prefix: Option<String>,
    cached_prefix: Option<String>,
}

impl PageCacheConfigBuilder {
    /// Set the lifetime of cached pages
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set the origin fetch timeout
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Set the counter key prefix
    pub fn count_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.count_prefix = Some(prefix.into());
        self
    }

    /// Set the cached body key prefix
    pub fn cached_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cached_prefix = Some(prefix.into());
        self
    }

    /// Build the page cache configuration
    pub fn build(self) -> PageCacheConfig {
        let defaults = PageCacheConfig::default();

        PageCacheConfig {
            ttl: self.ttl.unwrap_or(defaults.ttl),
            fetch_timeout: self.fetch_timeout.unwrap_or(defaults.fetch_timeout),
            count_prefix: self.count_prefix.unwrap_or(defaults.count_prefix),
            cached_prefix: self.cached_prefix.unwrap_or(defaults.cached_prefix),
        }
    }
}
