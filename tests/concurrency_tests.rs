// ==============================================
// REGION CACHE CONCURRENCY TESTS (integration)
// ==============================================
//
// Races between callers on shared regions and keys, and between callers and
// the sweeper. These require multi-threaded execution and cannot live inline.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use region_cache::{CacheConfig, RegionCache, RegionCacheBuilder};

fn cache(sweep_interval: Duration) -> Arc<RegionCache<String>> {
    Arc::new(
        RegionCacheBuilder::new()
            .config(CacheConfig::default().with_sweep_interval(sweep_interval))
            .build()
            .unwrap(),
    )
}

// ==============================================
// Lost-insert race on add
// ==============================================

#[test]
fn concurrent_add_same_key_has_single_winner() {
    let threads = 16;

    for round in 0..50 {
        let cache = cache(Duration::from_secs(60));
        let barrier = Arc::new(Barrier::new(threads));
        let wins = Arc::new(AtomicUsize::new(0));
        let region = format!("round-{round}");

        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let cache = cache.clone();
                let barrier = barrier.clone();
                let wins = wins.clone();
                let region = region.clone();
                thread::spawn(move || {
                    barrier.wait();
                    if cache.add("k", format!("v{i}"), &region) {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(wins.load(Ordering::SeqCst), 1, "exactly one add must win");
        let stored = cache.get("k", &region).unwrap();
        let candidates: HashSet<String> = (0..threads).map(|i| format!("v{i}")).collect();
        assert!(candidates.contains(&*stored), "stored value {stored} was never written");
        assert_eq!(cache.len(), 1);
    }
}

// ==============================================
// Last writer wins on put
// ==============================================

#[test]
fn concurrent_put_leaves_one_written_value() {
    let cache = cache(Duration::from_secs(60));
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for n in 0..200 {
                    cache.put("k", format!("t{i}-{n}"), "r");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let last = cache.get("k", "r").unwrap();
    assert!(last.ends_with("-199"), "final value {last} is not a last write");
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.region_count(), 1);
}

// ==============================================
// Index and entries stay in step under churn
// ==============================================

#[test]
fn clear_and_remove_race_with_writers_keeps_index_consistent() {
    let cache = cache(Duration::from_secs(60));
    let writers = 4;
    let barrier = Arc::new(Barrier::new(writers + 2));

    let mut handles: Vec<_> = (0..writers)
        .map(|i| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for n in 0..500 {
                    let region = format!("region-{}", n % 3);
                    cache.put(&format!("w{i}-{}", n % 10), format!("{n}"), &region);
                }
            })
        })
        .collect();

    {
        let cache = cache.clone();
        let barrier = barrier.clone();
        handles.push(thread::spawn(move || {
            barrier.wait();
            for n in 0..300 {
                cache.clear_region(&format!("region-{}", n % 3));
            }
        }));
    }
    {
        let cache = cache.clone();
        let barrier = barrier.clone();
        handles.push(thread::spawn(move || {
            barrier.wait();
            for n in 0..2000 {
                cache.remove(&format!("w{}-{}", n % writers, n % 10), &format!("region-{}", n % 3));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let mut counted = 0;
    for name in cache.region_names() {
        let region = cache.get_region(&name);
        assert!(!region.is_empty(), "region {name} survived with no entries");
        counted += region.len();
    }
    assert_eq!(counted, cache.len(), "entries outside any region");
}

// ==============================================
// Readers never observe a torn region clear
// ==============================================

#[test]
fn clear_region_is_atomic_for_snapshots() {
    let cache = cache(Duration::from_secs(60));
    let barrier = Arc::new(Barrier::new(2));

    let writer = {
        let cache = cache.clone();
        let barrier = barrier.clone();
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..300 {
                for key in ["a", "b", "c", "d"] {
                    cache.put(key, key.to_string(), "r");
                }
                cache.clear_region("r");
            }
        })
    };

    let reader = {
        let cache = cache.clone();
        let barrier = barrier.clone();
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..2000 {
                let snapshot = cache.get_region("r");
                // Puts land one at a time, a clear drops all four at once.
                let keys: HashSet<&str> = snapshot.keys().map(String::as_str).collect();
                let prefix_sizes = [
                    HashSet::new(),
                    HashSet::from(["a"]),
                    HashSet::from(["a", "b"]),
                    HashSet::from(["a", "b", "c"]),
                    HashSet::from(["a", "b", "c", "d"]),
                ];
                assert!(
                    prefix_sizes.contains(&keys),
                    "observed a partially cleared region: {keys:?}"
                );
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
}

// ==============================================
// Sweeper races with writers
// ==============================================

#[test]
fn sweeper_evicts_under_concurrent_load() {
    let cache = cache(Duration::from_millis(20));
    let threads = 4;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for n in 0..200 {
                    let key = format!("t{i}-{n}");
                    cache.put(&key, "short".to_string(), "ttl");
                    cache.expire_after(&key, "ttl", Duration::from_millis(1));
                    cache.put(&key, "long".to_string(), "plain");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    thread::sleep(Duration::from_millis(300));

    assert!(cache.get_region("ttl").is_empty(), "expired entries still visible");
    assert_eq!(cache.get_region("plain").len(), threads * 200);
    let stats = cache.stats();
    assert_eq!(stats.expired_evictions, (threads * 200) as u64);
    assert_eq!(stats.sweep_faults, 0);
}

#[test]
fn manual_and_scheduled_passes_never_overlap() {
    let cache = cache(Duration::from_millis(5));
    for n in 0..2000 {
        cache.put_with_ttl(&format!("k{n}"), "v".to_string(), "r", Duration::ZERO);
    }

    let threads = 4;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                (0..20).filter_map(|_| cache.sweep_now()).map(|r| r.removed).sum::<usize>()
            })
        })
        .collect();
    let manual_removed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    thread::sleep(Duration::from_millis(100));

    // Each entry is evicted exactly once across all passes.
    let stats = cache.stats();
    assert_eq!(stats.expired_evictions, 2000);
    assert!(manual_removed <= 2000);
    assert!(cache.is_empty());
}
