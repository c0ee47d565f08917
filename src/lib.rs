//! Region Cache - a region-partitioned in-memory cache
//!
//! Values live under a (region, key) pair. Regions are created on first
//! write and can be cleared or listed by name prefix as a unit. Entries can
//! carry an expiry instant; a background sweeper evicts them once it passes.
//!
//! ```no_run
//! use region_cache::{CacheConfig, RegionCache};
//! use std::time::Duration;
//!
//! let cache: RegionCache<String> = RegionCache::new(CacheConfig::default()).unwrap();
//! cache.put_with_ttl("session", "token".to_string(), "users:42", Duration::from_secs(30));
//! assert!(cache.exists("session", "users:42"));
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod fault;
pub mod tasks;

pub use cache::{global, AnyValue, CacheStats, RegionCache, RegionCacheBuilder, RegionSnapshot};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use fault::{FaultReporter, NoOpReporter, TracingReporter};
