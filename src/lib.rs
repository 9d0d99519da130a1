//! # Ouroboros Cache (ouroboros-cache)
//!
//! An instrumented caching layer over a key-value store.
//!
//! ## Features
//!
//! - Scalar storage under generated UUID keys with typed retrieval
//! - Per-operation invocation counters and input/output call histories
//! - Ordered replay of any recorded operation
//! - URL-keyed page cache with origin fetch counters and expiring bodies
//! - Async-first design using tokio, backed by Redis or an in-process
//!   Redis-like store
//!
//! ## Storing and replaying
//!
//! Constructing a [`Cache`] **flushes the whole backing store**.
//!
//! ```no_run
//! use ouroboros_cache::{Cache, MemoryStore, STORE_OPERATION};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = Cache::new(Arc::new(MemoryStore::default())).await?;
//!
//!     let key = cache.store(42).await?;
//!     assert_eq!(cache.get_int(&key).await?, Some(42));
//!
//!     cache.store("foo").await?;
//!     print!("{}", cache.replay(STORE_OPERATION).await?);
//!     // Cache.store was called 2 times:
//!     // Cache.store(*[42]) -> "<uuid>"
//!     // Cache.store(*["foo"]) -> "<uuid>"
//!     Ok(())
//! }
//! ```
//!
//! ## Instrumenting your own operations
//!
//! Any [`Operation`] can be wrapped with [`instrument`], which counts calls
//! under the operation name and records each call's arguments and outcome.
//!
//! ```no_run
//! use async_trait::async_trait;
//! use ouroboros_cache::{instrument, replay, KeyValueStore, MemoryStore, Operation, Result};
//!
//! struct Greet;
//!
//! #[async_trait]
//! impl Operation for Greet {
//!     type Args = (String,);
//!     type Output = String;
//!
//!     fn name(&self) -> &str {
//!         "Greeter.greet"
//!     }
//!
//!     async fn invoke(&self, _store: &dyn KeyValueStore, args: Self::Args) -> Result<String> {
//!         Ok(format!("hello {}", args.0))
//!     }
//! }
//!
//! # async fn example() -> Result<()> {
//! let store = MemoryStore::default();
//! let greet = instrument(Greet);
//! greet.invoke(&store, ("ada".to_string(),)).await?;
//!
//! let trace = replay(&store, "Greeter.greet").await?;
//! assert_eq!(trace.calls, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Page cache
//!
//! ```no_run
//! use ouroboros_cache::{HttpFetcher, MemoryStore, PageCache};
//! use std::sync::Arc;
//!
//! # async fn example() -> ouroboros_cache::Result<()> {
//! let pages = PageCache::new(Arc::new(MemoryStore::default()), HttpFetcher::new());
//!
//! let body = pages.get_page("http://example.com").await?;
//! let again = pages.get_page("http://example.com").await?; // served from cache
//! assert_eq!(body, again);
//! assert_eq!(pages.request_count("http://example.com").await?, 1);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod recorder;
pub mod replay;
pub mod stats;
pub mod store;
pub mod value;
pub mod web;

// Re-export main types for convenience
pub use cache::{Cache, StoreValue, STORE_OPERATION};
pub use config::{PageCacheConfig, PageCacheConfigBuilder, RedisConfig, StoreConfig};
pub use error::{CacheError, Result};
pub use recorder::{
    instrument, CallRecord, Counted, HistoryKeys, Operation, Outcome, Recorded,
    HISTORY_FORMAT_VERSION,
};
pub use replay::{print_replay, replay, replay_to, CallTrace};
pub use stats::CacheStats;
pub use store::{KeyValueStore, MemoryStore, RawValue, RedisStore};
pub use value::Scalar;
pub use web::{HttpFetcher, PageCache, PageFetcher};
