//! Integration tests for the expiring page cache

use async_trait::async_trait;
use ouroboros_cache::{
    CacheError, KeyValueStore, MemoryStore, PageCache, PageCacheConfig, PageFetcher, Result,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

/// Fetcher that serves canned pages and remembers every request
#[derive(Default)]
struct ScriptedFetcher {
    pages: HashMap<String, String>,
    delay: Duration,
    requests: Mutex<Vec<(String, Duration)>>,
    fetches: AtomicUsize,
}

impl ScriptedFetcher {
    fn with_page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), timeout));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.pages.get(url).cloned().ok_or_else(|| CacheError::Fetch {
            url: url.to_string(),
            reason: "404 Not Found".to_string(),
        })
    }
}

const URL: &str = "http://slowwly.test/page";

fn backing() -> Arc<dyn KeyValueStore> {
    Arc::new(MemoryStore::default())
}

#[tokio::test]
async fn test_two_fetches_within_ttl_count_once() {
    let store = backing();
    let pages = PageCache::new(
        store.clone(),
        ScriptedFetcher::default().with_page(URL, "<p>hi</p>"),
    );

    assert_eq!(assert_ok!(pages.get_page(URL).await), "<p>hi</p>");
    assert_eq!(assert_ok!(pages.get_page(URL).await), "<p>hi</p>");

    assert_eq!(pages.request_count(URL).await.unwrap(), 1);
    assert_eq!(
        store.get(&format!("count:{}", URL)).await.unwrap(),
        Some(b"1".to_vec())
    );
    assert_eq!(
        store.get(&format!("cached:{}", URL)).await.unwrap(),
        Some(b"<p>hi</p>".to_vec())
    );
}

#[tokio::test]
async fn test_expired_entry_is_refetched() {
    let config = PageCacheConfig::builder()
        .ttl(Duration::from_millis(100))
        .build();
    let pages = PageCache::with_config(
        backing(),
        ScriptedFetcher::default().with_page(URL, "body"),
        config,
    )
    .unwrap();

    pages.get_page(URL).await.unwrap();
    pages.get_page(URL).await.unwrap();
    assert_eq!(pages.request_count(URL).await.unwrap(), 1);

    tokio::time::sleep(Duration::from_millis(150)).await;

    pages.get_page(URL).await.unwrap();
    assert_eq!(pages.request_count(URL).await.unwrap(), 2);
}

#[tokio::test]
async fn test_default_ttl_is_ten_seconds() {
    let store = Arc::new(MemoryStore::default());
    let pages = PageCache::new(store.clone(), ScriptedFetcher::default().with_page(URL, "x"));

    pages.get_page(URL).await.unwrap();

    let ttl = store.ttl(&format!("cached:{}", URL)).await.unwrap();
    assert!(ttl <= Duration::from_secs(10));
    assert!(ttl > Duration::from_secs(9));
    // The counter itself never expires
    assert!(store.ttl(&format!("count:{}", URL)).await.is_none());
}

#[tokio::test]
async fn test_fetch_timeout_is_passed_through() {
    let config = PageCacheConfig::builder()
        .fetch_timeout(Duration::from_secs(3))
        .build();
    let pages = PageCache::with_config(
        backing(),
        ScriptedFetcher::default().with_page(URL, "x"),
        config,
    )
    .unwrap();

    pages.get_page(URL).await.unwrap();

    let requests = pages.fetcher().requests.lock().unwrap().clone();
    assert_eq!(requests, vec![(URL.to_string(), Duration::from_secs(3))]);
}

#[tokio::test]
async fn test_failed_fetch_does_not_pollute() {
    let store = backing();
    let pages = PageCache::new(store.clone(), ScriptedFetcher::default());

    let err = assert_err!(pages.get_page("http://missing.test").await);
    assert!(matches!(err, CacheError::Fetch { .. }));

    assert_eq!(pages.request_count("http://missing.test").await.unwrap(), 0);
    assert!(store
        .get("cached:http://missing.test")
        .await
        .unwrap()
        .is_none());

    // A later failure is retried against the origin, not served from cache
    assert_err!(pages.get_page("http://missing.test").await);
    assert_eq!(pages.stats().fetch_failures, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_misses_fetch_once() {
    let pages = Arc::new(PageCache::new(
        backing(),
        ScriptedFetcher::default()
            .with_page(URL, "shared")
            .with_delay(Duration::from_millis(50)),
    ));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let pages = pages.clone();
            tokio::spawn(async move { pages.get_page(URL).await })
        })
        .collect();

    for result in futures::future::join_all(tasks).await {
        assert_eq!(result.unwrap().unwrap(), "shared");
    }

    assert_eq!(pages.request_count(URL).await.unwrap(), 1);
    assert_eq!(pages.fetcher().fetches(), 1);
    let stats = pages.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 15);
}

#[tokio::test]
async fn test_custom_prefixes() {
    let store = backing();
    let config = PageCacheConfig::builder()
        .count_prefix("hits:")
        .cached_prefix("page:")
        .build();
    let pages =
        PageCache::with_config(store.clone(), ScriptedFetcher::default().with_page(URL, "x"), config)
            .unwrap();

    pages.get_page(URL).await.unwrap();

    assert!(store.get(&format!("hits:{}", URL)).await.unwrap().is_some());
    assert!(store.get(&format!("page:{}", URL)).await.unwrap().is_some());
    assert!(store.get(&format!("count:{}", URL)).await.unwrap().is_none());
}

/// Store that refuses expiring writes and forwards everything else
#[derive(Default)]
struct NoExpiringWrites {
    inner: MemoryStore,
}

#[async_trait]
impl KeyValueStore for NoExpiringWrites {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.inner.set(key, value).await
    }

    async fn set_ex(&self, key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<()> {
        Err(CacheError::Store(format!("read-only replica, cannot write {}", key)))
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        self.inner.incr(key).await
    }

    async fn rpush(&self, key: &str, value: Vec<u8>) -> Result<usize> {
        self.inner.rpush(key, value).await
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<Vec<u8>>> {
        self.inner.lrange(key, start, stop).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.inner.expire(key, ttl).await
    }

    async fn flush_all(&self) -> Result<()> {
        self.inner.flush_all().await
    }
}

#[tokio::test]
async fn test_failed_body_write_is_not_counted() {
    let pages = PageCache::new(
        Arc::new(NoExpiringWrites::default()),
        ScriptedFetcher::default().with_page(URL, "x"),
    );

    let err = assert_err!(pages.get_page(URL).await);
    assert!(matches!(err, CacheError::Store(_)));

    assert_eq!(pages.fetcher().fetches(), 1);
    assert_eq!(pages.request_count(URL).await.unwrap(), 0);
}
