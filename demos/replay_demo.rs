//! Demonstrates instrumented storage and replay
//!
//! This example shows how to:
//! - Store scalars and read them back with typed decoders
//! - Inspect the call counter and history of `Cache.store`
//! - Replay the recorded calls
//!
//! Uses the Redis server at `REDIS_URL` when that variable is set (all of its
//! keys are flushed), the in-process store otherwise.
//!
//! Usage:
//!   cargo run --example replay_demo
//!   REDIS_URL=redis://127.0.0.1:6379/15 cargo run --example replay_demo

use ouroboros_cache::{
    print_replay, Cache, KeyValueStore, MemoryStore, RedisStore, StoreConfig, STORE_OPERATION,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "ouroboros_cache=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store: Arc<dyn KeyValueStore> = if std::env::var("REDIS_URL").is_ok() {
        Arc::new(RedisStore::from_env().await?)
    } else {
        MemoryStore::shared(StoreConfig::default())?
    };
    let cache = Cache::new(store).await?;

    println!("1. Storing values...");
    for value in ["foo", "bar"] {
        let key = cache.store(value).await?;
        println!("   {} -> {}", value, key);
    }
    let number = cache.store(42).await?;
    let float = cache.store(2.75).await?;
    let bytes = cache.store(b"raw bytes".to_vec()).await?;

    println!("\n2. Reading back...");
    println!("   get_int({}) = {:?}", number, cache.get_int(&number).await?);
    println!("   get_float({}) = {:?}", float, cache.get_float(&float).await?);
    println!("   get_str({}) = {:?}", bytes, cache.get_str(&bytes).await?);
    println!("   get(missing) = {:?}", cache.get("missing").await?);

    println!("\n3. {} was called {} times", STORE_OPERATION, cache.calls(STORE_OPERATION).await?);

    println!("\n4. Replay:");
    print_replay(cache.backing_store().as_ref(), STORE_OPERATION).await?;

    Ok(())
}
