//! Integration tests for the cache manager's public API
//!
//! Covers expiry through an injected clock and concurrent use from many threads.

use std::sync::Arc;
use std::thread;

use boardpulse::cache::{CacheManager, ManualClock};
use chrono::Duration;
use serde_json::{json, Value};

const THREADS: usize = 32;

fn create_test_cache() -> (CacheManager, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let cache = CacheManager::with_clock(Duration::minutes(30), clock.clone());
    (cache, clock)
}

#[test]
fn test_expired_entry_disappears_from_info_after_read() {
    let (cache, clock) = create_test_cache();

    cache.set("board_data_b1", json!({ "name": "Roadmap" }));
    clock.advance(Duration::minutes(31));

    let info = cache.info();
    assert!(info["board_data_b1"].is_expired);
    assert!(info["board_data_b1"].expires_in_seconds < 0.0);

    assert!(cache.get("board_data_b1").is_none());
    assert!(cache.info().is_empty());
}

#[test]
fn test_concurrent_sets_then_gets_see_every_value() {
    let (cache, _clock) = create_test_cache();

    let writers: Vec<_> = (0..THREADS)
        .map(|i| {
            let cache = cache.clone();
            thread::spawn(move || {
                cache.set(format!("board_data_{}", i), json!({ "id": i, "cards": i * 10 }));
            })
        })
        .collect();
    for writer in writers {
        writer.join().expect("writer thread panicked");
    }

    let readers: Vec<_> = (0..THREADS)
        .map(|i| {
            let cache = cache.clone();
            thread::spawn(move || (i, cache.get(&format!("board_data_{}", i))))
        })
        .collect();
    for reader in readers {
        let (i, value) = reader.join().expect("reader thread panicked");
        assert_eq!(value, Some(json!({ "id": i, "cards": i * 10 })));
    }

    assert_eq!(cache.len(), THREADS);
}

#[test]
fn test_concurrent_mixed_operations_keep_store_consistent() {
    let (cache, _clock) = create_test_cache();

    let workers: Vec<_> = (0..THREADS)
        .map(|i| {
            let cache = cache.clone();
            thread::spawn(move || {
                let key = format!("board_data_{}", i % 4);
                for round in 0..100 {
                    cache.set(key.clone(), json!([i, round]));
                    if let Some(Value::Array(pair)) = cache.get(&key) {
                        assert_eq!(pair.len(), 2, "entries are never partially written");
                    }
                    let _ = cache.info();
                    if round % 25 == 0 {
                        cache.clear(Some(&key));
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker thread panicked");
    }

    assert!(cache.len() <= 4);
    for (key, info) in cache.info() {
        assert!(key.starts_with("board_data_"));
        assert!(!info.is_expired);
    }
}

#[test]
fn test_custom_ttl_applies_to_every_entry() {
    let clock = Arc::new(ManualClock::default());
    let cache: CacheManager<String> = CacheManager::with_clock(Duration::minutes(5), clock.clone());

    cache.set("a", "first".to_string());
    clock.advance(Duration::minutes(3));
    cache.set("b", "second".to_string());
    clock.advance(Duration::minutes(2));

    assert!(cache.get("a").is_none());
    assert_eq!(cache.get("b").as_deref(), Some("second"));
}
