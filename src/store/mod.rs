//! # Key-Value Store Abstraction
//!
//! The cache layers never talk to a concrete backend. They consume the
//! [`KeyValueStore`] trait, which mirrors the handful of Redis primitives
//! they need:
//!
//! - `GET` / `SET` / `SETEX` on byte strings
//! - atomic `INCR`
//! - atomic list append (`RPUSH`) and range read (`LRANGE`)
//! - `EXPIRE` and `FLUSHALL`
//!
//! Every method is a single atomic operation on the backend. Callers must
//! not build read-modify-write sequences on top of them.
//!
//! Two backends ship with the crate: [`MemoryStore`] keeps everything in
//! process, [`RedisStore`] talks to a Redis server and so shares state (and
//! `FLUSHALL`) with every other client of that server.

pub mod entry;
pub mod memory;
pub mod redis_store;

pub use entry::{EntryMetadata, StoreEntry, StoredValue};
pub use memory::{start_auto_cleanup, MemoryStore};
pub use redis_store::RedisStore;

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Raw value stored under a key
pub type RawValue = Vec<u8>;

/// Contract for the backing key-value service
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a string value, `None` when the key is absent or expired
    async fn get(&self, key: &str) -> Result<Option<RawValue>>;

    /// Write a string value, clearing any previous expiry
    async fn set(&self, key: &str, value: RawValue) -> Result<()>;

    /// Write a string value that expires after `ttl`
    async fn set_ex(&self, key: &str, value: RawValue, ttl: Duration) -> Result<()>;

    /// Atomically increment the integer stored at `key`, starting from 0
    async fn incr(&self, key: &str) -> Result<i64>;

    /// Atomically append to the list at `key`, returning the new length
    async fn rpush(&self, key: &str, value: RawValue) -> Result<usize>;

    /// Read list elements `start..=stop`; negative indices count from the end
    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<RawValue>>;

    /// Set a TTL on an existing key, returning whether the key existed
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Remove every key in every namespace
    async fn flush_all(&self) -> Result<()>;

    /// Check that the backend is reachable
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Resolve Redis-style inclusive list bounds against a list of `len` items
///
/// Returns the half-open index range to slice, or `None` when empty.
pub(crate) fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if len == 0 || start > stop || start >= len {
        None
    } else {
        Some((start as usize, stop as usize + 1))
    }
}
