//! Redis backend
//!
//! Every trait method maps to one Redis command, so the atomicity of the
//! [`KeyValueStore`] contract is the server's. TTLs are sent in
//! milliseconds (`SET .. PX`, `PEXPIRE`) and enforced by the server.

use crate::config::RedisConfig;
use crate::error::{CacheError, Result};
use crate::store::{KeyValueStore, RawValue};
use ::redis::aio::ConnectionManager;
use ::redis::{ErrorKind, RedisError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

/// [`KeyValueStore`] backed by a Redis server
///
/// Clones of the underlying connection manager share one multiplexed
/// connection, which is re-established automatically after a drop.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    config: RedisConfig,
}

impl RedisStore {
    /// Connect and verify the server answers `PING`
    pub async fn connect(config: RedisConfig) -> Result<Self> {
        config.validate()?;
        info!("Connecting to Redis at {}", redacted(&config.url));

        let client = ::redis::Client::open(config.url.as_str())
            .map_err(|e| CacheError::ConfigError(e.to_string()))?;

        let conn = tokio::time::timeout(config.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| CacheError::Timeout {
                timeout_ms: millis(config.connect_timeout),
                context: format!("connect to {}", redacted(&config.url)),
            })??;

        let store = Self { conn, config };
        store.ping().await?;

        info!("Successfully connected to Redis");
        Ok(store)
    }

    /// Connect using [`RedisConfig::from_env`]
    pub async fn from_env() -> Result<Self> {
        Self::connect(RedisConfig::from_env()?).await
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<RawValue>> {
        let mut conn = self.conn.clone();
        ::redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error(key, "string", e))
    }

    async fn set(&self, key: &str, value: RawValue) -> Result<()> {
        let mut conn = self.conn.clone();
        debug!("SET {} ({} bytes)", key, value.len());
        ::redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error(key, "string", e))
    }

    async fn set_ex(&self, key: &str, value: RawValue, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return Err(CacheError::Store(format!(
                "invalid expire time for key '{}'",
                key
            )));
        }

        let mut conn = self.conn.clone();
        debug!("SET {} PX {:?} ({} bytes)", key, ttl, value.len());
        ::redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(millis(ttl).max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error(key, "string", e))
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        ::redis::cmd("INCR")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error(key, "string", e))
    }

    async fn rpush(&self, key: &str, value: RawValue) -> Result<usize> {
        let mut conn = self.conn.clone();
        ::redis::cmd("RPUSH")
            .arg(key)
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error(key, "list", e))
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<RawValue>> {
        let mut conn = self.conn.clone();
        ::redis::cmd("LRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error(key, "list", e))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        ::redis::cmd("PEXPIRE")
            .arg(key)
            .arg(millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(CacheError::from)
    }

    async fn flush_all(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        warn!("FLUSHALL on {}", redacted(&self.config.url));
        ::redis::cmd("FLUSHALL")
            .query_async(&mut conn)
            .await
            .map_err(CacheError::from)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let reply: String = ::redis::cmd("PING").query_async(&mut conn).await?;

        if reply == "PONG" {
            Ok(())
        } else {
            Err(CacheError::Store(format!("unexpected PING reply: {}", reply)))
        }
    }
}

/// Map a Redis error, recognising type and integer errors on `key`
///
/// Only strings and lists are written through [`KeyValueStore`], so a
/// `WRONGTYPE` reply means the key holds the other one of the two.
fn command_error(key: &str, expected: &'static str, e: RedisError) -> CacheError {
    if e.code() == Some("WRONGTYPE") {
        CacheError::WrongType {
            key: key.to_string(),
            expected,
            found: if expected == "list" { "string" } else { "list" },
        }
    } else if e.kind() == ErrorKind::ResponseError && e.to_string().contains("not an integer") {
        CacheError::decode("integer", e)
    } else {
        e.into()
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Hide credentials in a Redis URL before logging it
fn redacted(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &url[..scheme_end], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}
