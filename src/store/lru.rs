//! LRU Tracker Module
//!
//! Least Recently Used ordering for the in-process adapter's eviction.

use std::collections::{BTreeMap, HashMap};

/// One page of a cursor walk over tracked keys.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub keys: Vec<String>,
    /// Stamp to resume from, `0` once the walk is complete
    pub next_cursor: u64,
}

// == LRU Tracker ==
/// Tracks access order for LRU eviction.
///
/// Each touch stamps the key with a fresh sequence number; the smallest
/// stamp is the least recently used key.
#[derive(Debug, Default)]
pub struct LruTracker {
    /// Sequence number -> key, oldest first
    order: BTreeMap<u64, String>,
    /// Key -> its current sequence number
    stamps: HashMap<String, u64>,
    next: u64,
}

impl LruTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as most recently used, inserting it if new.
    pub fn touch(&mut self, key: &str) {
        let stamp = self.next;
        self.next += 1;
        if let Some(old) = self.stamps.insert(key.to_string(), stamp) {
            self.order.remove(&old);
        }
        self.order.insert(stamp, key.to_string());
    }

    // == Remove ==
    pub fn remove(&mut self, key: &str) {
        if let Some(stamp) = self.stamps.remove(key) {
            self.order.remove(&stamp);
        }
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    pub fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.stamps.remove(&key);
        Some(key)
    }

    /// Up to `count` keys in access order starting at stamp `cursor`.
    ///
    /// Stamps only grow, so a key not yet returned is never skipped by a
    /// later page, although a key touched mid-iteration may come back twice.
    pub fn page_from(&self, cursor: u64, count: usize) -> Page {
        let mut iter = self.order.range(cursor..);
        let mut keys = Vec::with_capacity(count);
        let mut last = None;
        for (stamp, key) in iter.by_ref().take(count) {
            keys.push(key.clone());
            last = Some(*stamp);
        }
        let next_cursor = match (last, iter.next()) {
            (Some(stamp), Some(_)) => stamp + 1,
            _ => 0,
        };
        Page { keys, next_cursor }
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}
