//! Integration tests for the instrumented cache
//!
//! These tests verify the complete cache functionality including:
//! - Key generation and typed round-trips
//! - Call counting and history alignment
//! - Replay ordering
//! - Destructive initialization
//! - Concurrent callers

use async_trait::async_trait;
use ouroboros_cache::{
    instrument, replay, replay_to, Cache, CacheError, KeyValueStore, MemoryStore, Operation,
    Outcome, Result, Scalar, STORE_OPERATION,
};
use rand::Rng;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

async fn new_cache() -> (Cache, Arc<dyn KeyValueStore>) {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::default());
    let cache = Cache::new(store.clone()).await.unwrap();
    (cache, store)
}

fn random_scalar(rng: &mut impl Rng) -> Scalar {
    match rng.gen_range(0..4) {
        0 => Scalar::Text(format!("text-{}", rng.gen::<u32>())),
        1 => Scalar::Bytes((0..rng.gen_range(0..16)).map(|_| rng.gen()).collect()),
        2 => Scalar::Integer(rng.gen()),
        _ => Scalar::Float(rng.gen_range(-1e6..1e6)),
    }
}

#[tokio::test]
async fn test_generated_keys_are_unique() {
    let (cache, _) = new_cache().await;
    let mut rng = rand::thread_rng();
    let mut keys = HashSet::new();

    for _ in 0..500 {
        let key = cache.store(random_scalar(&mut rng)).await.unwrap();
        assert!(keys.insert(key), "duplicate key generated");
    }
}

#[tokio::test]
async fn test_raw_round_trip_matches_encoding() {
    let (cache, _) = new_cache().await;
    let mut rng = rand::thread_rng();

    for _ in 0..100 {
        let value = random_scalar(&mut rng);
        let key = cache.store(value.clone()).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(value.encode()));
    }
}

#[tokio::test]
async fn test_typed_round_trip() {
    let (cache, _) = new_cache().await;

    let int_key = cache.store(42).await.unwrap();
    let str_key = cache.store("hello").await.unwrap();

    assert_eq!(cache.get_int(&int_key).await.unwrap(), Some(42));
    assert_eq!(cache.get_str(&str_key).await.unwrap(), Some("hello".to_string()));

    // Integers are stored as text, so they also read back as strings
    assert_eq!(cache.get_str(&int_key).await.unwrap(), Some("42".to_string()));
}

#[tokio::test]
async fn test_wrong_shape_is_a_decode_error() {
    let (cache, _) = new_cache().await;
    let key = cache.store(b"\xff\xfe".to_vec()).await.unwrap();

    let err = assert_err!(cache.get_str(&key).await);
    assert!(matches!(err, CacheError::Decode { .. }));
    assert_err!(cache.get_int(&key).await);
}

#[tokio::test]
async fn test_counter_equals_invocations() {
    for n in [0u64, 1, 7, 25] {
        let (cache, _) = new_cache().await;
        for i in 0..n {
            cache.store(i as i64).await.unwrap();
        }
        assert_eq!(cache.calls(STORE_OPERATION).await.unwrap(), n);
    }
}

#[tokio::test]
async fn test_history_alignment() {
    let (cache, store) = new_cache().await;

    let mut keys = Vec::new();
    for value in ["a", "b", "c", "d"] {
        keys.push(cache.store(value).await.unwrap());
    }

    let inputs = store.lrange("Cache.store:inputs", 0, -1).await.unwrap();
    let outputs = store.lrange("Cache.store:outputs", 0, -1).await.unwrap();
    assert_eq!(inputs.len(), outputs.len());

    let history = cache.history(STORE_OPERATION).await.unwrap();
    for (i, record) in history.iter().enumerate() {
        assert_eq!(record.outcome, Outcome::Returned(json!(keys[i])));
        let stored = cache.get_str(&keys[i]).await.unwrap().unwrap();
        assert_eq!(record.args, json!([stored]));
    }
}

#[tokio::test]
async fn test_replay_ordering() {
    let (cache, store) = new_cache().await;

    let k1 = cache.store("foo").await.unwrap();
    let k2 = cache.store("bar").await.unwrap();
    let k3 = cache.store(42).await.unwrap();

    let mut out = Vec::new();
    let trace = replay_to(store.as_ref(), STORE_OPERATION, &mut out)
        .await
        .unwrap();
    let printed = String::from_utf8(out).unwrap();

    assert_eq!(trace.calls, 3);
    assert_eq!(
        printed,
        format!(
            "Cache.store was called 3 times:\n\
             Cache.store(*[\"foo\"]) -> \"{}\"\n\
             Cache.store(*[\"bar\"]) -> \"{}\"\n\
             Cache.store(*[42]) -> \"{}\"\n",
            k1, k2, k3
        )
    );
}

#[tokio::test]
async fn test_replay_unknown_operation_reports_zero() {
    let (_, store) = new_cache().await;

    let trace = assert_ok!(replay(store.as_ref(), "Cache.get").await);
    assert_eq!(trace.calls, 0);
    assert!(trace.is_empty());
}

#[tokio::test]
async fn test_destructive_init() {
    let (cache, store) = new_cache().await;

    let keys: Vec<String> = vec![
        cache.store("one").await.unwrap(),
        cache.store(2).await.unwrap(),
        cache.store(3.0).await.unwrap(),
    ];

    let fresh = Cache::new(store.clone()).await.unwrap();

    for key in &keys {
        assert!(fresh.get(key).await.unwrap().is_none());
    }
    assert_eq!(fresh.calls(STORE_OPERATION).await.unwrap(), 0);
    assert!(fresh.history(STORE_OPERATION).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_stores_lose_no_updates() {
    let (cache, _) = new_cache().await;
    let cache = Arc::new(cache);

    let tasks: Vec<_> = (0..50)
        .map(|i| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.store(i as i64).await })
        })
        .collect();

    let results = futures::future::join_all(tasks).await;
    for result in results {
        assert!(result.unwrap().is_ok());
    }

    assert_eq!(cache.calls(STORE_OPERATION).await.unwrap(), 50);
    assert_eq!(cache.history(STORE_OPERATION).await.unwrap().len(), 50);
}

struct Lookup;

#[async_trait]
impl Operation for Lookup {
    type Args = (String,);
    type Output = Option<String>;

    fn name(&self) -> &str {
        "Directory.lookup"
    }

    async fn invoke(&self, store: &dyn KeyValueStore, args: Self::Args) -> Result<Option<String>> {
        let (name,) = args;
        if name.is_empty() {
            return Err(CacheError::Other("empty name".to_string()));
        }
        match store.get(&format!("user:{}", name)).await? {
            Some(raw) => Ok(Some(String::from_utf8_lossy(&raw).into_owned())),
            None => Ok(None),
        }
    }
}

#[tokio::test]
async fn test_custom_operation_shares_the_store() {
    let (_, store) = new_cache().await;
    store.set("user:ada", b"Ada Lovelace".to_vec()).await.unwrap();

    let lookup = instrument(Lookup);
    let found = lookup.invoke(store.as_ref(), ("ada".to_string(),)).await.unwrap();
    let missing = lookup.invoke(store.as_ref(), ("bob".to_string(),)).await.unwrap();
    assert_err!(lookup.invoke(store.as_ref(), (String::new(),)).await);

    assert_eq!(found, Some("Ada Lovelace".to_string()));
    assert_eq!(missing, None);

    let trace = replay(store.as_ref(), "Directory.lookup").await.unwrap();
    assert_eq!(trace.calls, 3);
    assert_eq!(
        trace.lines(),
        vec![
            "Directory.lookup(*[\"ada\"]) -> \"Ada Lovelace\"".to_string(),
            "Directory.lookup(*[\"bob\"]) -> null".to_string(),
            "Directory.lookup(*[\"\"]) -> error: Error: empty name".to_string(),
        ]
    );
}
