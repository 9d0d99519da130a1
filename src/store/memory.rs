//! In-process key-value store with TTL enforcement

use crate::config::StoreConfig;
use crate::error::{CacheError, Result};
use crate::stats::CacheStats;
use crate::store::entry::{StoreEntry, StoredValue};
use crate::store::{resolve_range, KeyValueStore, RawValue};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Redis-like store held in process memory
///
/// This implementation provides:
/// - Thread-safe async access via RwLock
/// - Each trait method runs under one write guard, so it is atomic
/// - Expired keys are never served; they are dropped on access or by
///   [`MemoryStore::cleanup_expired`]
pub struct MemoryStore {
    /// Store configuration
    pub(crate) config: StoreConfig,

    /// Internal storage
    inner: Arc<RwLock<Inner>>,
}

/// Internal storage
struct Inner {
    /// Main storage: key -> entry
    entries: HashMap<String, StoreEntry>,

    /// Current statistics
    stats: CacheStats,
}

impl Inner {
    /// Drop `key` if its TTL has elapsed
    fn purge_if_expired(&mut self, key: &str) {
        if self.entries.get(key).is_some_and(StoreEntry::is_expired) {
            debug!("Store entry expired: {}", key);
            self.entries.remove(key);
            self.stats.evictions_ttl += 1;
        }
    }

    fn sync_len(&mut self) {
        self.stats.entries = self.entries.len();
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl MemoryStore {
    /// Create a new store with the given configuration
    pub fn new(config: StoreConfig) -> Self {
        info!("Initializing memory store with config: {:?}", config);

        let inner = Inner {
            entries: HashMap::new(),
            stats: CacheStats::default(),
        };

        Self {
            config,
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Create a store wrapped in an `Arc`, spawning the cleanup task when enabled
    ///
    /// Must be called from within a tokio runtime.
    pub fn shared(config: StoreConfig) -> Result<Arc<Self>> {
        config.validate()?;
        let store = Arc::new(Self::new(config));

        if store.config.enable_auto_cleanup {
            tokio::spawn(start_auto_cleanup(Arc::downgrade(&store)));
        }

        Ok(store)
    }

    /// Remaining lifetime of `key`, `None` when absent or persistent
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let inner = self.inner.read().await;
        inner
            .entries
            .get(key)
            .and_then(StoreEntry::time_until_expiration)
    }

    /// Check whether a live key exists
    pub async fn contains_key(&self, key: &str) -> bool {
        let inner = self.inner.read().await;
        inner.entries.get(key).is_some_and(|e| !e.is_expired())
    }

    /// Remove all expired entries, returning how many were dropped
    pub async fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.write().await;

        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !entry.is_expired());
        let removed = before - inner.entries.len();

        if removed > 0 {
            inner.stats.evictions_ttl += removed as u64;
            inner.sync_len();
            debug!("Cleaned up {} expired entries", removed);
        }

        removed
    }

    /// Get store statistics
    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.read().await;
        inner.stats.clone()
    }

    /// Get number of keys held, including not yet swept expired ones
    pub async fn len(&self) -> usize {
        let inner = self.inner.read().await;
        inner.entries.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        let inner = self.inner.read().await;
        inner.entries.is_empty()
    }

    /// Total payload size in bytes
    pub async fn size_bytes(&self) -> usize {
        let inner = self.inner.read().await;
        inner.entries.values().map(|e| e.value.size_bytes()).sum()
    }
}

fn wrong_type(key: &str, expected: &'static str, found: &StoredValue) -> CacheError {
    CacheError::WrongType {
        key: key.to_string(),
        expected,
        found: found.type_name(),
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<RawValue>> {
        let mut inner = self.inner.write().await;
        inner.purge_if_expired(key);

        let value = match inner.entries.get(key) {
            Some(entry) => match &entry.value {
                StoredValue::String(bytes) => Some(bytes.clone()),
                other => return Err(wrong_type(key, "string", other)),
            },
            None => None,
        };

        if value.is_some() {
            inner.stats.hits += 1;
        } else {
            inner.stats.misses += 1;
        }
        inner.sync_len();

        Ok(value)
    }

    async fn set(&self, key: &str, value: RawValue) -> Result<()> {
        let mut inner = self.inner.write().await;

        debug!("SET {} ({} bytes)", key, value.len());
        inner
            .entries
            .insert(key.to_string(), StoreEntry::new(StoredValue::String(value)));
        inner.sync_len();

        Ok(())
    }

    async fn set_ex(&self, key: &str, value: RawValue, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return Err(CacheError::Store(format!(
                "invalid expire time for key '{}'",
                key
            )));
        }

        let mut inner = self.inner.write().await;

        debug!("SETEX {} {:?} ({} bytes)", key, ttl, value.len());
        inner.entries.insert(
            key.to_string(),
            StoreEntry::with_ttl(StoredValue::String(value), ttl),
        );
        inner.sync_len();

        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let mut inner = self.inner.write().await;
        inner.purge_if_expired(key);

        let next = match inner.entries.get_mut(key) {
            Some(entry) => {
                let current = match &entry.value {
                    StoredValue::String(bytes) => std::str::from_utf8(bytes)
                        .ok()
                        .and_then(|s| s.parse::<i64>().ok())
                        .ok_or_else(|| {
                            CacheError::decode("integer", "value is not an integer")
                        })?,
                    other => return Err(wrong_type(key, "string", other)),
                };
                let next = current.checked_add(1).ok_or_else(|| {
                    CacheError::decode("integer", "increment would overflow")
                })?;
                // INCR keeps the existing TTL
                entry.update_value(StoredValue::String(next.to_string().into_bytes()));
                next
            }
            None => {
                inner.entries.insert(
                    key.to_string(),
                    StoreEntry::new(StoredValue::String(b"1".to_vec())),
                );
                1
            }
        };
        inner.sync_len();

        Ok(next)
    }

    async fn rpush(&self, key: &str, value: RawValue) -> Result<usize> {
        let mut inner = self.inner.write().await;
        inner.purge_if_expired(key);

        let len = match inner.entries.get_mut(key) {
            Some(entry) => {
                let len = match &mut entry.value {
                    StoredValue::List(items) => {
                        items.push(value);
                        items.len()
                    }
                    other => return Err(wrong_type(key, "list", other)),
                };
                entry.touch();
                len
            }
            None => {
                inner
                    .entries
                    .insert(key.to_string(), StoreEntry::new(StoredValue::List(vec![value])));
                1
            }
        };
        inner.sync_len();

        Ok(len)
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<RawValue>> {
        let mut inner = self.inner.write().await;
        inner.purge_if_expired(key);
        inner.sync_len();

        match inner.entries.get(key) {
            Some(entry) => match &entry.value {
                StoredValue::List(items) => Ok(resolve_range(items.len(), start, stop)
                    .map(|(from, to)| items[from..to].to_vec())
                    .unwrap_or_default()),
                other => Err(wrong_type(key, "list", other)),
            },
            None => Ok(Vec::new()),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut inner = self.inner.write().await;
        inner.purge_if_expired(key);

        let existed = if ttl.is_zero() {
            inner.entries.remove(key).is_some()
        } else if let Some(entry) = inner.entries.get_mut(key) {
            entry.set_ttl(ttl);
            true
        } else {
            false
        };
        inner.sync_len();

        Ok(existed)
    }

    async fn flush_all(&self) -> Result<()> {
        let mut inner = self.inner.write().await;

        let count = inner.entries.len();
        inner.entries.clear();
        inner.sync_len();

        info!("Flushed {} keys from memory store", count);
        Ok(())
    }
}

/// Background task for periodic removal of expired keys
///
/// Holds only a weak reference and exits once the store is dropped.
pub async fn start_auto_cleanup(store: std::sync::Weak<MemoryStore>) {
    let interval = match store.upgrade() {
        Some(store) => store.config.cleanup_interval,
        None => return,
    };

    info!("Starting automatic store cleanup task (interval: {:?})", interval);

    loop {
        tokio::time::sleep(interval).await;

        let Some(store) = store.upgrade() else {
            debug!("Memory store dropped, stopping cleanup task");
            return;
        };

        let removed = store.cleanup_expired().await;
        if removed > 0 {
            debug!("Auto cleanup removed {} keys", removed);
        }
    }
}
