//! Cache Statistics Module
//!
//! Tracks lookup and sweep counters. Counters are atomics so they can be
//! updated from any caller thread and from the sweeper without a lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

// == Cache Stats ==
/// Point-in-time view of cache counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of `get` calls that found a value
    pub hits: u64,
    /// Number of `get` calls that found nothing
    pub misses: u64,
    /// Entries removed by the sweeper because they expired
    pub expired_evictions: u64,
    /// Sweep passes that ran to completion
    pub sweep_passes: u64,
    /// Sweep passes skipped because another pass was running
    pub skipped_passes: u64,
    /// Per-pair faults raised during sweep passes
    pub sweep_faults: u64,
    /// Current number of entries
    pub total_entries: usize,
    /// Current number of regions
    pub total_regions: usize,
    /// Wall-clock time of the last completed sweep pass
    pub last_sweep_at: Option<DateTime<Utc>>,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Stats Recorder ==
/// Shared, lock-free counters behind [`CacheStats`].
#[derive(Debug, Default)]
pub struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    expired_evictions: AtomicU64,
    sweep_passes: AtomicU64,
    skipped_passes: AtomicU64,
    sweep_faults: AtomicU64,
    last_sweep_at: Mutex<Option<DateTime<Utc>>>,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self, count: u64) {
        self.expired_evictions.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_fault(&self) {
        self.sweep_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_pass(&self) {
        self.skipped_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pass(&self, finished_at: DateTime<Utc>) {
        self.sweep_passes.fetch_add(1, Ordering::Relaxed);
        *self.last_sweep_at.lock().unwrap_or_else(|e| e.into_inner()) = Some(finished_at);
    }

    /// Builds a snapshot; entry and region totals come from the store.
    pub fn snapshot(&self, total_entries: usize, total_regions: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired_evictions: self.expired_evictions.load(Ordering::Relaxed),
            sweep_passes: self.sweep_passes.load(Ordering::Relaxed),
            skipped_passes: self.skipped_passes.load(Ordering::Relaxed),
            sweep_faults: self.sweep_faults.load(Ordering::Relaxed),
            total_entries,
            total_regions,
            last_sweep_at: *self.last_sweep_at.lock().unwrap_or_else(|e| e.into_inner()),
        }
    }
}
