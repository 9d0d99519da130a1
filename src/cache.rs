//! Instrumented value cache
//!
//! [`Cache`] stores scalars under freshly generated UUID keys. Its `store`
//! path is wrapped with [`instrument`], so every call is counted under
//! `Cache.store` and its arguments and returned key are appended to the
//! `Cache.store:inputs` / `Cache.store:outputs` lists.

use crate::error::Result;
use crate::recorder::{self, instrument, CallRecord, Counted, Operation, Recorded};
use crate::replay::{self, CallTrace};
use crate::store::{KeyValueStore, RawValue};
use crate::value::{decode_float, decode_integer, decode_text, Scalar};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Operation name of [`Cache::store`]
pub const STORE_OPERATION: &str = "Cache.store";

/// Writes one value under a new UUID v4 key
pub struct StoreValue;

#[async_trait]
impl Operation for StoreValue {
    type Args = (Scalar,);
    type Output = String;

    fn name(&self) -> &str {
        STORE_OPERATION
    }

    async fn invoke(&self, store: &dyn KeyValueStore, args: Self::Args) -> Result<String> {
        let (value,) = args;
        let key = Uuid::new_v4().to_string();

        debug!("Storing {} value under {}", value.kind(), key);
        store.set(&key, value.encode()).await?;

        Ok(key)
    }
}

/// Cache of scalar values with instrumented writes
pub struct Cache {
    store: Arc<dyn KeyValueStore>,
    store_op: Counted<Recorded<StoreValue>>,
}

impl Cache {
    /// Create a cache on top of `store`
    ///
    /// **This flushes the whole backing store.** Every key in every namespace
    /// is removed, including counters and histories written by earlier
    /// instances. Do not construct a `Cache` against a store whose contents
    /// must survive.
    pub async fn new(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        store.flush_all().await?;
        info!("Initialized cache (backing store flushed)");

        Ok(Self {
            store,
            store_op: instrument(StoreValue),
        })
    }

    /// Store `value` under a new key and return the key
    pub async fn store(&self, value: impl Into<Scalar>) -> Result<String> {
        self.store_op
            .invoke(self.store.as_ref(), (value.into(),))
            .await
    }

    /// Raw stored bytes, `None` for unknown keys
    pub async fn get(&self, key: &str) -> Result<Option<RawValue>> {
        self.store.get(key).await
    }

    /// Read `key` and convert it with `decoder`
    ///
    /// Absent keys yield `Ok(None)` without calling the decoder.
    pub async fn get_with<T, F>(&self, key: &str, decoder: F) -> Result<Option<T>>
    where
        F: FnOnce(RawValue) -> Result<T> + Send,
    {
        match self.store.get(key).await? {
            Some(raw) => decoder(raw).map(Some),
            None => Ok(None),
        }
    }

    /// Read `key` as UTF-8 text
    pub async fn get_str(&self, key: &str) -> Result<Option<String>> {
        self.get_with(key, decode_text).await
    }

    /// Read `key` as an integer
    pub async fn get_int(&self, key: &str) -> Result<Option<i64>> {
        self.get_with(key, decode_integer).await
    }

    /// Read `key` as a float
    pub async fn get_float(&self, key: &str) -> Result<Option<f64>> {
        self.get_with(key, decode_float).await
    }

    /// Number of times `operation` was invoked
    pub async fn calls(&self, operation: &str) -> Result<u64> {
        recorder::call_count(self.store.as_ref(), operation).await
    }

    /// Recorded history of `operation`, earliest call first
    pub async fn history(&self, operation: &str) -> Result<Vec<CallRecord>> {
        recorder::read_history(self.store.as_ref(), operation).await
    }

    /// Call trace of `operation`
    pub async fn replay(&self, operation: &str) -> Result<CallTrace> {
        replay::replay(self.store.as_ref(), operation).await
    }

    /// Handle to the backing store
    pub fn backing_store(&self) -> Arc<dyn KeyValueStore> {
        self.store.clone()
    }
}
