//! Concurrency Tests for the Loading Cache
//!
//! Drives the cache through its public API from many threads at once to
//! exercise single-flight loads, expiry, eviction, and snapshots under
//! contention.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use memocache::LoadingCache;

/// Installs a fmt subscriber once so `RUST_LOG` can surface cache events
/// while debugging these tests.
fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memocache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

#[test]
fn parallel_readers_share_one_load_per_key() {
    init_tracing();

    let loads: Arc<Mutex<HashMap<String, usize>>> = Arc::new(Mutex::new(HashMap::new()));
    let recorder = Arc::clone(&loads);
    let cache = Arc::new(
        LoadingCache::new(10, Duration::from_millis(1000), move |key: &String| {
            *recorder.lock().unwrap().entry(key.clone()).or_insert(0) += 1;
            thread::sleep(Duration::from_millis(5));
            Ok::<_, String>(vec![1, 2])
        })
        .unwrap(),
    );

    let num_threads = 10;
    let reads_per_thread = 100;
    let barrier = Arc::new(Barrier::new(num_threads));
    let successful_reads = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            let successful_reads = Arc::clone(&successful_reads);
            thread::spawn(move || {
                barrier.wait();
                for j in 0..reads_per_thread {
                    let key = format!("key-{}", j % 5);
                    let value = cache.get(&key).unwrap();
                    assert_eq!(value, vec![1, 2]);
                    successful_reads.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // 10 threads x 100 reads all succeeded
    assert_eq!(successful_reads.load(Ordering::SeqCst), 1000);

    // Each of the 5 keys was computed exactly once despite the stampede
    let loads = loads.lock().unwrap();
    for i in 0..5 {
        let key = format!("key-{i}");
        assert_eq!(loads.get(&key), Some(&1), "{key} must load exactly once");
    }

    assert!(cache.len() <= 10);
}

#[test]
fn stampede_on_one_key_loads_once() {
    init_tracing();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let cache = Arc::new(
        LoadingCache::new(100, Duration::from_millis(5000), move |_key: &String| {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(10));
            Ok::<_, String>(vec![1, 2])
        })
        .unwrap(),
    );

    let num_threads = 10;
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..100 {
                    let value = cache.get(&"shared-key".to_string()).unwrap();
                    assert_eq!(value, vec![1, 2]);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn expiry_triggers_exactly_one_reload() {
    init_tracing();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let cache = Arc::new(
        LoadingCache::new(100, Duration::from_millis(300), move |key: &String| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(format!("value-{key}"))
        })
        .unwrap(),
    );

    cache.get(&"k".to_string()).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Let the entry lapse, then stampede the refresh
    thread::sleep(Duration::from_millis(400));

    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.get(&"k".to_string()).unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), "value-k");
    }

    // The expired window cost exactly one additional load
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn failed_load_is_not_cached_and_retries() {
    init_tracing();

    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let cache = Arc::new(
        LoadingCache::new(100, Duration::from_millis(5000), move |key: &String| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                thread::sleep(Duration::from_millis(10));
                Err("backend offline".to_string())
            } else {
                Ok(format!("value-{key}"))
            }
        })
        .unwrap(),
    );

    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.get(&"k".to_string())
            })
        })
        .collect();
    let results: Vec<Result<String, String>> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    // The caller that owned the failing attempt sees the error unchanged;
    // everyone else lands on the retried value
    let errors = results.iter().filter(|r| r.is_err()).count();
    assert_eq!(errors, 1);
    assert!(results.contains(&Err("backend offline".to_string())));
    assert_eq!(
        results.iter().filter(|r| r.is_ok()).count(),
        3,
        "waiters must recover via the retry"
    );
    for result in results.iter().flatten() {
        assert_eq!(result, "value-k");
    }

    // One failing and one succeeding attempt, nothing more
    assert_eq!(attempts.load(Ordering::SeqCst), 2);

    // The failure left no residue; later gets hit the retried value
    assert_eq!(cache.get(&"k".to_string()).unwrap(), "value-k");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn loader_panic_releases_waiters() {
    init_tracing();

    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let cache = Arc::new(
        LoadingCache::new(100, Duration::from_millis(5000), move |key: &String| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                thread::sleep(Duration::from_millis(10));
                panic!("loader gave up");
            }
            Ok::<_, String>(format!("value-{key}"))
        })
        .unwrap(),
    );

    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.get(&"k".to_string())
            })
        })
        .collect();
    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join()).collect();

    // Exactly the caller that owned the panicking attempt unwound; the
    // waiters on its flight were released rather than stranded
    assert_eq!(outcomes.iter().filter(|o| o.is_err()).count(), 1);
    assert_eq!(
        outcomes.iter().flatten().filter(|r| r.is_ok()).count(),
        3,
        "waiters must recover via their own retry"
    );
    for result in outcomes.iter().flatten() {
        assert_eq!(result.as_ref().unwrap(), "value-k");
    }

    // One panicking and one succeeding attempt, nothing more
    assert_eq!(attempts.load(Ordering::SeqCst), 2);

    // The panic left no residue; later gets hit the retried value
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(&"k".to_string()).unwrap(), "value-k");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn size_bound_holds_after_concurrent_churn() {
    init_tracing();

    let cache = Arc::new(
        LoadingCache::new(8, Duration::from_secs(300), |key: &String| {
            Ok::<_, String>(format!("value-{key}"))
        })
        .unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for j in 0..50 {
                    cache.get(&format!("key-{i}-{j}")).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // All 400 keys were distinct, so every get loaded; once the callers
    // quiesce the store is back within its bound
    assert!(cache.len() <= 8, "len {} exceeds capacity", cache.len());

    let stats = cache.stats();
    assert_eq!(stats.loads, 400);
    assert_eq!(stats.evictions, 400 - cache.len() as u64);
}

#[test]
fn snapshots_stay_consistent_under_load() {
    init_tracing();

    let cache = Arc::new(
        LoadingCache::new(64, Duration::from_secs(300), |key: &String| {
            Ok::<_, String>(format!("value-{key}"))
        })
        .unwrap(),
    );

    let writers: Vec<_> = (0..4)
        .map(|i| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for j in 0..50 {
                    cache.get(&format!("key-{i}-{j}")).unwrap();
                }
            })
        })
        .collect();

    // Snapshot while writers churn; every value observed must be complete
    // and derived from its key
    for _ in 0..50 {
        for (key, value) in cache.get_all() {
            assert_eq!(value, format!("value-{key}"));
        }
    }

    for handle in writers {
        handle.join().unwrap();
    }

    let view = cache.get_all();
    assert!(view.len() <= 64);
    for (key, value) in view {
        assert_eq!(value, format!("value-{key}"));
    }
}

#[test]
fn purge_sweeps_only_stale_entries_under_churn() {
    init_tracing();

    let cache = Arc::new(
        LoadingCache::new(64, Duration::from_millis(15), |key: &String| {
            Ok::<_, String>(format!("value-{key}"))
        })
        .unwrap(),
    );

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for j in 0..200 {
                    let key = format!("key-{}", j % 16);
                    assert_eq!(cache.get(&key).unwrap(), format!("value-{key}"));
                }
            })
        })
        .collect();

    // Sweep while the readers keep reloading the same keys
    let mut purged = 0;
    for _ in 0..50 {
        purged += cache.purge_expired();
        thread::sleep(Duration::from_millis(1));
    }

    for handle in readers {
        handle.join().unwrap();
    }

    // Every purged entry was a published load that had lapsed, so the
    // sweeps can never remove more than the loader produced
    assert!(purged <= cache.stats().loads as usize);

    // Once the last writes lapse, a final sweep drains the cache
    thread::sleep(Duration::from_millis(50));
    cache.purge_expired();
    assert!(cache.is_empty());
}
