//! Region Cache Facade
//!
//! Public operation surface over [`RegionStore`] and [`ExpiryIndex`], with the
//! background [`Sweeper`] started at construction.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::cache::{
    CacheStats, EntryKey, ExpiryIndex, RegionSnapshot, RegionStore, StatsRecorder,
};
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::fault::{FaultReporter, TracingReporter};
use crate::tasks::{SweepReport, Sweeper, SweeperHandle};

/// Value type of the process-wide cache: any shareable object.
pub type AnyValue = dyn Any + Send + Sync;

// == Builder ==
/// Assembles a [`RegionCache`] and starts its sweeper.
///
/// # Example
/// ```no_run
/// use region_cache::{CacheConfig, RegionCache, RegionCacheBuilder};
/// use std::time::Duration;
///
/// let cache: RegionCache<String> = RegionCacheBuilder::new()
///     .config(CacheConfig::default().with_sweep_interval(Duration::from_millis(500)))
///     .build()
///     .unwrap();
/// cache.put("greeting", "hello".to_string(), "en");
/// ```
#[derive(Default)]
pub struct RegionCacheBuilder {
    config: CacheConfig,
    clock: Option<Arc<dyn Clock>>,
    reporter: Option<Arc<dyn FaultReporter>>,
    on_current_runtime: bool,
}

impl RegionCacheBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the system clock used for expiry comparisons.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the sink for faults raised during sweep passes.
    ///
    /// Without one, faults are only counted in [`CacheStats`].
    pub fn fault_reporter(mut self, reporter: Arc<dyn FaultReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Runs the sweeper as a task on the current tokio runtime instead of
    /// its own thread.
    ///
    /// The sweeper then stops with that runtime, so only opt in when the
    /// runtime outlives the cache.
    pub fn on_current_runtime(mut self, enabled: bool) -> Self {
        self.on_current_runtime = enabled;
        self
    }

    pub fn build<V: ?Sized + Send + Sync + 'static>(self) -> Result<RegionCache<V>> {
        self.config.validate()?;

        let store = Arc::new(RegionStore::new());
        let expiry = Arc::new(ExpiryIndex::new());
        let stats = Arc::new(StatsRecorder::new());
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };

        let sweeper = Arc::new(Sweeper::new(
            Arc::clone(&store),
            Arc::clone(&expiry),
            Arc::clone(&clock),
            self.reporter,
            Arc::clone(&stats),
        ));
        let interval = self.config.sweep_interval;
        let handle = if self.on_current_runtime {
            Arc::clone(&sweeper).spawn(interval)?
        } else {
            Arc::clone(&sweeper).spawn_on_thread(interval)?
        };

        debug!(?handle, "Region cache initialized");

        Ok(RegionCache {
            store,
            expiry,
            clock,
            stats,
            sweeper,
            _sweeper_handle: handle,
        })
    }
}

// == Region Cache ==
/// Region-partitioned cache with optional per-entry expiry.
///
/// All operations are fail-open: misses and conflicts are reported through
/// `Option`/`bool` results. Dropping the cache stops its sweeper.
pub struct RegionCache<V: ?Sized> {
    store: Arc<RegionStore<V>>,
    expiry: Arc<ExpiryIndex>,
    clock: Arc<dyn Clock>,
    stats: Arc<StatsRecorder>,
    sweeper: Arc<Sweeper<V>>,
    _sweeper_handle: SweeperHandle,
}

impl<V: ?Sized + Send + Sync + 'static> RegionCache<V> {
    /// Creates a cache with the given configuration and the system clock.
    pub fn new(config: CacheConfig) -> Result<Self> {
        RegionCacheBuilder::new().config(config).build()
    }

    // == Lookups ==
    /// Returns the value stored under `key` in `region`.
    pub fn get(&self, key: &str, region: &str) -> Option<Arc<V>> {
        let value = self.store.get(region, key);
        match value {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        value
    }

    pub fn exists(&self, key: &str, region: &str) -> bool {
        self.store.contains(region, key)
    }

    /// Snapshot of one region's associations; empty if the region is absent.
    pub fn get_region(&self, region: &str) -> HashMap<String, Arc<V>> {
        self.store.get_region(region)
    }

    /// Snapshots of every region whose name starts with `prefix`.
    pub fn list_regions_by_prefix(&self, prefix: &str) -> Vec<RegionSnapshot<V>> {
        self.store.list_regions_by_prefix(prefix)
    }

    // == Writes ==
    /// Inserts only if `key` is absent from `region`.
    pub fn add(&self, key: &str, value: impl Into<Arc<V>>, region: &str) -> bool {
        self.store.add_if_absent(region, key, value.into())
    }

    /// Inserts or overwrites. Returns the replaced value.
    pub fn put(&self, key: &str, value: impl Into<Arc<V>>, region: &str) -> Option<Arc<V>> {
        self.store.put(region, key, value.into())
    }

    /// Inserts or overwrites and returns the value now stored.
    pub fn add_or_update(&self, key: &str, value: impl Into<Arc<V>>, region: &str) -> Arc<V> {
        let value = value.into();
        self.store.put(region, key, Arc::clone(&value));
        value
    }

    /// Overwrites only if `key` is present in `region`.
    pub fn update(&self, key: &str, value: impl Into<Arc<V>>, region: &str) -> bool {
        self.store.update_if_present(region, key, value.into())
    }

    pub fn remove(&self, key: &str, region: &str) -> bool {
        self.store.remove(region, key)
    }

    pub fn clear_region(&self, region: &str) -> bool {
        let cleared = self.store.clear_region(region);
        if cleared {
            debug!(region, "Region cleared");
        }
        cleared
    }

    // == Expiry ==
    /// Records the instant after which (region, key) is evicted.
    ///
    /// The pair does not have to hold a value. Explicit removal does not
    /// forget the instant; see [`RegionCache::clear_expiry`].
    pub fn set_expiry(&self, key: &str, region: &str, at: Instant) {
        self.expiry.set_expiry(EntryKey::new(region, key), at);
    }

    /// Expires (region, key) `ttl` from now according to the cache clock.
    pub fn expire_after(&self, key: &str, region: &str, ttl: Duration) {
        match self.clock.now().checked_add(ttl) {
            Some(at) => self.set_expiry(key, region, at),
            // Unrepresentable instant: the entry never expires.
            None => {
                self.clear_expiry(key, region);
            }
        }
    }

    /// Inserts or overwrites and expires the entry `ttl` from now.
    pub fn put_with_ttl(
        &self,
        key: &str,
        value: impl Into<Arc<V>>,
        region: &str,
        ttl: Duration,
    ) -> Option<Arc<V>> {
        let previous = self.put(key, value, region);
        self.expire_after(key, region, ttl);
        previous
    }

    pub fn clear_expiry(&self, key: &str, region: &str) -> bool {
        self.expiry.clear_expiry(&EntryKey::new(region, key))
    }

    pub fn expires_at(&self, key: &str, region: &str) -> Option<Instant> {
        self.expiry.expires_at(&EntryKey::new(region, key))
    }

    /// Runs a sweep pass immediately. `None` if a pass is already running.
    pub fn sweep_now(&self) -> Option<SweepReport> {
        self.sweeper.run_pass()
    }

    // == Introspection ==
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.store.len(), self.store.region_count())
    }

    /// Number of entries across all regions.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn region_count(&self) -> usize {
        self.store.region_count()
    }

    pub fn region_names(&self) -> Vec<String> {
        self.store.region_names()
    }
}

impl<V: ?Sized> fmt::Debug for RegionCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionCache")
            .field("entries", &self.store.len())
            .field("regions", &self.store.region_count())
            .field("expiry_records", &self.expiry.len())
            .finish()
    }
}

// == Dynamically Typed Values ==
impl RegionCache<AnyValue> {
    /// Returns the value under (region, key) if it is a `T`.
    pub fn get_as<T: Any + Send + Sync>(&self, key: &str, region: &str) -> Option<Arc<T>> {
        self.get(key, region)?.downcast::<T>().ok()
    }

    /// Stores any shareable value, overwriting.
    pub fn put_any<T: Any + Send + Sync>(
        &self,
        key: &str,
        value: T,
        region: &str,
    ) -> Option<Arc<AnyValue>> {
        let value: Arc<AnyValue> = Arc::new(value);
        self.put(key, value, region)
    }
}

// == Process-wide Instance ==
static GLOBAL: OnceLock<RegionCache<AnyValue>> = OnceLock::new();
static GLOBAL_INIT: Mutex<()> = Mutex::new(());

/// Returns the process-wide cache, building it on first access.
///
/// Configuration comes from [`CacheConfig::from_env`]; faults are reported
/// through `tracing`. The sweeper runs on a dedicated thread for the rest of
/// the process lifetime. Prefer constructing and passing a [`RegionCache`]
/// explicitly; this exists for call sites without a composition root.
pub fn global() -> Result<&'static RegionCache<AnyValue>> {
    if let Some(cache) = GLOBAL.get() {
        return Ok(cache);
    }

    let _init = GLOBAL_INIT.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(cache) = GLOBAL.get() {
        return Ok(cache);
    }

    let config = CacheConfig::from_env();
    let cache = RegionCacheBuilder::new()
        .config(config.clone())
        .fault_reporter(Arc::new(TracingReporter))
        .build()?;
    info!(
        "Process-wide region cache started, sweep interval {} ms",
        config.sweep_interval.as_millis()
    );
    Ok(GLOBAL.get_or_init(|| cache))
}
