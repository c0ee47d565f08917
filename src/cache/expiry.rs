//! Expiry Index Module
//!
//! Ledger of expiration instants per (region, key). The index never looks at
//! the region store: an instant may be recorded for a pair that holds no
//! value, and sweeping it later is harmless.

use std::time::Instant;

use dashmap::DashMap;

use crate::cache::EntryKey;

// == Expired Record ==
/// A pair whose expiration instant has passed, with the instant observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredRecord {
    pub key: EntryKey,
    pub expires_at: Instant,
}

// == Expiry Index ==
#[derive(Debug, Default)]
pub struct ExpiryIndex {
    deadlines: DashMap<EntryKey, Instant>,
}

impl ExpiryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records or replaces the expiration instant for a pair.
    pub fn set_expiry(&self, key: EntryKey, at: Instant) {
        self.deadlines.insert(key, at);
    }

    /// Forgets the expiration instant for a pair. Returns whether one existed.
    pub fn clear_expiry(&self, key: &EntryKey) -> bool {
        self.deadlines.remove(key).is_some()
    }

    pub fn expires_at(&self, key: &EntryKey) -> Option<Instant> {
        self.deadlines.get(key).map(|at| *at)
    }

    // == Sweep Expired ==
    /// Lists every pair whose instant is at or before `now`.
    ///
    /// Records are left in place; retiring them is the caller's job.
    pub fn sweep_expired(&self, now: Instant) -> Vec<ExpiredRecord> {
        self.deadlines
            .iter()
            .filter(|record| *record.value() <= now)
            .map(|record| ExpiredRecord {
                key: record.key().clone(),
                expires_at: *record.value(),
            })
            .collect()
    }

    /// Removes a record only if it still holds the observed instant.
    ///
    /// An expiry re-set after the record was observed survives.
    pub fn retire(&self, record: &ExpiredRecord) -> bool {
        self.deadlines
            .remove_if(&record.key, |_, at| *at == record.expires_at)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}
