//! Cache Module
//!
//! Region-partitioned storage, the expiry ledger and the public facade.

mod entry;
mod expiry;
mod facade;
mod key;
mod stats;
mod store;


// Re-export public types
pub use entry::StoredValue;
pub use expiry::{ExpiredRecord, ExpiryIndex};
pub use facade::{global, AnyValue, RegionCache, RegionCacheBuilder};
pub use key::EntryKey;
pub use stats::{CacheStats, StatsRecorder};
pub use store::{RegionSnapshot, RegionStore};
