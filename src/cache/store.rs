//! Region Store Module
//!
//! Concurrent storage of region-partitioned entries.
//!
//! Entries live in one flat map keyed by [`EntryKey`]. A second map indexes
//! region name to member keys and serves `clear_region` and prefix listing.
//! Every operation takes the region's index slot before touching the entry
//! map, so the two maps never disagree for an observer and no code path takes
//! the locks in the opposite order.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use serde::Serialize;

use crate::cache::{EntryKey, StoredValue};

// == Region Snapshot ==
/// Point-in-time copy of one region's associations.
///
/// Membership is copied; values remain shared references.
#[derive(Debug, Serialize)]
pub struct RegionSnapshot<V: ?Sized> {
    /// Region name
    pub name: String,
    /// Key to value associations at snapshot time
    pub entries: HashMap<String, Arc<V>>,
}

impl<V: ?Sized> Clone for RegionSnapshot<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            entries: self.entries.clone(),
        }
    }
}

// == Region Store ==
/// Two-level (region, key) to value storage built on lock-striped maps.
///
/// Emptied regions are reaped: removing the last key of a region drops the
/// region from the index.
#[derive(Debug)]
pub struct RegionStore<V: ?Sized> {
    /// Flat entry storage
    entries: DashMap<EntryKey, StoredValue<V>>,
    /// Region name to member keys
    regions: DashMap<String, HashSet<String>>,
    /// Last write sequence handed out
    seq: AtomicU64,
}

impl<V: ?Sized> RegionStore<V> {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            regions: DashMap::new(),
            seq: AtomicU64::new(0),
        }
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Sequence number of the most recent write.
    ///
    /// Every value written after this call returns carries a larger number.
    pub fn current_seq(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    // == Get ==
    /// Returns the value stored under (region, key).
    pub fn get(&self, region: &str, key: &str) -> Option<Arc<V>> {
        let _members = self.regions.get(region)?;
        self.entries
            .get(&EntryKey::new(region, key))
            .map(|stored| stored.value().value())
    }

    /// Returns true if (region, key) holds a value.
    pub fn contains(&self, region: &str, key: &str) -> bool {
        match self.regions.get(region) {
            Some(_members) => self.entries.contains_key(&EntryKey::new(region, key)),
            None => false,
        }
    }

    // == Get Region ==
    /// Returns a snapshot of one region's associations.
    ///
    /// Empty when the region does not exist; never creates it.
    pub fn get_region(&self, region: &str) -> HashMap<String, Arc<V>> {
        match self.regions.get(region) {
            Some(members) => self.collect_members(region, &members),
            None => HashMap::new(),
        }
    }

    fn collect_members(
        &self,
        region: &str,
        members: &HashSet<String>,
    ) -> HashMap<String, Arc<V>> {
        members
            .iter()
            .filter_map(|key| {
                self.entries
                    .get(&EntryKey::new(region, key.as_str()))
                    .map(|stored| (key.clone(), stored.value().value()))
            })
            .collect()
    }

    // == Put ==
    /// Inserts or overwrites unconditionally, creating the region if absent.
    ///
    /// Returns the value that was replaced.
    pub fn put(&self, region: &str, key: &str, value: Arc<V>) -> Option<Arc<V>> {
        let mut members = self.regions.entry(region.to_string()).or_default();
        let stored = StoredValue::new(value, self.next_seq());
        let previous = self.entries.insert(EntryKey::new(region, key), stored);
        members.insert(key.to_string());
        previous.map(StoredValue::into_value)
    }

    // == Add If Absent ==
    /// Inserts only when the key is not present. Returns whether it inserted.
    pub fn add_if_absent(&self, region: &str, key: &str, value: Arc<V>) -> bool {
        let mut members = self.regions.entry(region.to_string()).or_default();
        let inserted = match self.entries.entry(EntryKey::new(region, key)) {
            MapEntry::Occupied(_) => false,
            MapEntry::Vacant(slot) => {
                slot.insert(StoredValue::new(value, self.next_seq()));
                true
            }
        };
        if inserted {
            members.insert(key.to_string());
        }
        inserted
    }

    // == Update If Present ==
    /// Overwrites only when the key is present. Returns whether it updated.
    ///
    /// The replaced value is dropped after the region lock is released.
    pub fn update_if_present(&self, region: &str, key: &str, value: Arc<V>) -> bool {
        let replaced = {
            let Some(_members) = self.regions.get_mut(region) else {
                return false;
            };
            match self.entries.get_mut(&EntryKey::new(region, key)) {
                Some(mut slot) => Some(std::mem::replace(
                    &mut *slot,
                    StoredValue::new(value, self.next_seq()),
                )),
                None => None,
            }
        };
        replaced.is_some()
    }

    // == Remove ==
    /// Removes (region, key). Missing regions and keys are a no-op.
    pub fn remove(&self, region: &str, key: &str) -> bool {
        self.take(region, key).is_some()
    }

    /// Removes (region, key) and hands back the removed value.
    pub fn take(&self, region: &str, key: &str) -> Option<Arc<V>> {
        self.take_where(region, key, |_| true)
    }

    /// Removes the entry only if it was written at or before `seq`.
    ///
    /// Used by the sweeper so a value rewritten after a pass began survives
    /// that pass.
    pub fn remove_if_written_before(&self, entry: &EntryKey, seq: u64) -> Option<Arc<V>> {
        self.take_where(entry.region(), entry.key(), |stored| {
            stored.written_before(seq)
        })
    }

    fn take_where<F>(&self, region: &str, key: &str, predicate: F) -> Option<Arc<V>>
    where
        F: FnOnce(&StoredValue<V>) -> bool,
    {
        let removed = {
            let mut members = self.regions.get_mut(region)?;
            let removed = self
                .entries
                .remove_if(&EntryKey::new(region, key), |_, stored| predicate(stored))
                .map(|(_, stored)| stored.into_value());
            if removed.is_some() {
                members.remove(key);
            }
            removed
        };
        if removed.is_some() {
            self.reap_if_empty(region);
        }
        removed
    }

    fn reap_if_empty(&self, region: &str) {
        self.regions.remove_if(region, |_, members| members.is_empty());
    }

    // == Clear Region ==
    /// Drops every entry of a region. Returns whether the region existed.
    pub fn clear_region(&self, region: &str) -> bool {
        let drained: Vec<Arc<V>> = {
            let Some(mut members) = self.regions.get_mut(region) else {
                return false;
            };
            members
                .drain()
                .filter_map(|key| {
                    self.entries
                        .remove(&EntryKey::new(region, key))
                        .map(|(_, stored)| stored.into_value())
                })
                .collect()
        };
        self.reap_if_empty(region);
        drop(drained);
        true
    }

    // == List Regions By Prefix ==
    /// Snapshots every region whose name starts with `prefix`.
    pub fn list_regions_by_prefix(&self, prefix: &str) -> Vec<RegionSnapshot<V>> {
        self.regions
            .iter()
            .filter(|region| region.key().starts_with(prefix))
            .map(|region| RegionSnapshot {
                name: region.key().clone(),
                entries: self.collect_members(region.key(), region.value()),
            })
            .collect()
    }

    // == Sizes ==
    /// Number of entries across all regions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of live regions.
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn region_names(&self) -> Vec<String> {
        self.regions.iter().map(|region| region.key().clone()).collect()
    }
}

impl<V: ?Sized> Default for RegionStore<V> {
    fn default() -> Self {
        Self::new()
    }
}
