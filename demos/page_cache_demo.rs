//! Page Cache Demo Application
//!
//! Fetches a URL twice through the expiring page cache and reports how many
//! origin fetches were made.
//!
//! Usage:
//!   cargo run --example page_cache_demo -- [URL]
//!
//! Environment variables (also read from `.env`):
//!   PAGE_CACHE_TTL_SECS           - Lifetime of cached pages (default: 10)
//!   PAGE_CACHE_FETCH_TIMEOUT_SECS - Origin fetch timeout (default: 10)

use ouroboros_cache::{HttpFetcher, MemoryStore, PageCache, PageCacheConfig, StoreConfig};
use std::time::Instant;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://example.com".to_string());

    let config = PageCacheConfig::from_env()?;
    info!("=== Page Cache Demo (ttl: {:?}) ===", config.ttl);

    let store = MemoryStore::shared(StoreConfig::default())?;
    let pages = PageCache::with_config(store, HttpFetcher::new(), config)?;

    for attempt in 1..=2 {
        let start = Instant::now();
        match pages.get_page(&url).await {
            Ok(body) => info!(
                "Attempt {}: {} bytes in {}ms",
                attempt,
                body.len(),
                start.elapsed().as_millis()
            ),
            Err(e) => info!("Attempt {}: fetch failed: {}", attempt, e),
        }
    }

    info!("Origin fetches for {}: {}", url, pages.request_count(&url).await?);
    info!("{}", pages.stats());

    Ok(())
}
