//! In-process fallback store.
//!
//! Serves the operations a configured adapter does not declare. Entries expire
//! lazily on access by wall-clock comparison; `purge_expired` sweeps the rest.
//! Nothing here is shared across processes.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;

use crate::cache::entry::{CacheEntry, Clock, SystemClock};
use crate::cache::pattern::KeyPattern;

/// Members of a tag record, expiring like any other key.
#[derive(Debug, Default)]
struct MemberSet {
    members: HashSet<String>,
    expires_at: Option<u64>,
}

impl MemberSet {
    fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at.is_some_and(|expires| now_ms >= expires)
    }
}

#[derive(Debug)]
pub struct FallbackStore {
    entries: DashMap<String, CacheEntry>,
    sets: DashMap<String, MemberSet>,
    clock: Arc<dyn Clock>,
}

impl FallbackStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            sets: DashMap::new(),
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now_ms();
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
            Some(_) => {}
            None => return None,
        }
        self.entries.remove_if(key, |_, e| e.is_expired(now));
        None
    }

    /// Stores an encoded value; a TTL of zero never expires.
    pub fn set(&self, key: &str, value: String, ttl_seconds: u64) {
        let entry = CacheEntry::new(value, ttl_seconds, self.clock.now_ms());
        self.entries.insert(key.to_string(), entry);
    }

    pub fn delete(&self, keys: &[String]) -> usize {
        keys.iter()
            .map(|key| {
                let removed_entry = self.entries.remove(key.as_str()).is_some();
                let removed_set = self.sets.remove(key.as_str()).is_some();
                removed_entry || removed_set
            })
            .filter(|removed| *removed)
            .count()
    }

    pub fn exists(&self, key: &str) -> bool {
        self.get(key).is_some() || self.live_set(key)
    }

    /// Adds `amount` to an integer counter, creating it at zero.
    ///
    /// Counters are kept as plain decimal text, as Redis does. Returns `None`
    /// when the stored value is not an integer or the sum overflows.
    pub fn increment(&self, key: &str, amount: i64) -> Option<i64> {
        let now = self.clock.now_ms();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| CacheEntry::new("0".to_string(), 0, now));
        if entry.is_expired(now) {
            *entry = CacheEntry::new("0".to_string(), 0, now);
        }
        let next = entry.value.trim().parse::<i64>().ok()?.checked_add(amount)?;
        entry.value = next.to_string();
        Some(next)
    }

    /// Adds `member` to the set at `key`. A non-zero TTL resets the set's
    /// expiry; zero leaves it as it was.
    pub fn add_to_set(&self, key: &str, member: &str, ttl_seconds: u64) {
        let now = self.clock.now_ms();
        let mut set = self.sets.entry(key.to_string()).or_default();
        if set.is_expired(now) {
            *set = MemberSet::default();
        }
        set.members.insert(member.to_string());
        if ttl_seconds > 0 {
            set.expires_at = Some(now.saturating_add(ttl_seconds.saturating_mul(1000)));
        }
    }

    pub fn members(&self, key: &str) -> Vec<String> {
        if !self.live_set(key) {
            return Vec::new();
        }
        self.sets
            .get(key)
            .map(|set| set.members.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn live_set(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        match self.sets.get(key) {
            Some(set) if !set.is_expired(now) => return true,
            Some(_) => {}
            None => return false,
        }
        self.sets.remove_if(key, |_, set| set.is_expired(now));
        false
    }

    /// Live keys and set records matching `pattern`.
    pub fn keys_matching(&self, pattern: &KeyPattern) -> Vec<String> {
        let now = self.clock.now_ms();
        self.entries
            .iter()
            .filter(|e| !e.value().is_expired(now))
            .map(|e| e.key().clone())
            .chain(
                self.sets
                    .iter()
                    .filter(|s| !s.value().is_expired(now))
                    .map(|s| s.key().clone()),
            )
            .filter(|key| pattern.is_match(key))
            .collect()
    }

    /// Removes every expired entry and set record. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let before = self.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        self.sets.retain(|_, set| !set.is_expired(now));
        before.saturating_sub(self.len())
    }

    /// Values and set records held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len() + self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.sets.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.sets.clear();
    }
}

impl Default for FallbackStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::ManualClock;

    fn store() -> (Arc<ManualClock>, FallbackStore) {
        let clock = Arc::new(ManualClock::new(1_000));
        let store = FallbackStore::new(clock.clone());
        (clock, store)
    }

    #[test]
    fn test_set_get_and_expiry() {
        let (clock, store) = store();
        store.set("k", "0|1".to_string(), 1);
        assert_eq!(store.get("k").as_deref(), Some("0|1"));

        clock.advance_ms(1_100);
        assert_eq!(store.get("k"), None);
        assert!(store.is_empty(), "expired entry is dropped on read");
    }

    #[test]
    fn test_zero_ttl_persists() {
        let (clock, store) = store();
        store.set("k", "0|1".to_string(), 0);
        clock.advance_ms(10_000_000);
        assert!(store.exists("k"));
    }

    #[test]
    fn test_delete_entries_and_sets() {
        let (_, store) = store();
        store.set("a", "0|1".to_string(), 60);
        store.add_to_set("tag:t", "a", 0);

        let removed = store.delete(&["a".to_string(), "tag:t".to_string(), "missing".to_string()]);
        assert_eq!(removed, 2);
        assert!(store.members("tag:t").is_empty());
    }

    #[test]
    fn test_increment() {
        let (_, store) = store();
        assert_eq!(store.increment("c", 1), Some(1));
        assert_eq!(store.increment("c", 5), Some(6));
        assert_eq!(store.get("c").as_deref(), Some("6"));

        store.set("s", "0|\"text\"".to_string(), 60);
        assert_eq!(store.increment("s", 1), None);
    }

    #[test]
    fn test_keys_matching_and_purge() {
        let (clock, store) = store();
        store.set("posts:list:1", "0|1".to_string(), 1);
        store.set("posts:list:2", "0|2".to_string(), 60);
        store.set("users:1", "0|3".to_string(), 60);

        let pattern = KeyPattern::new("posts:list:*").unwrap();
        let mut keys = store.keys_matching(&pattern);
        keys.sort();
        assert_eq!(keys, vec!["posts:list:1", "posts:list:2"]);

        clock.advance_ms(2_000);
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.keys_matching(&pattern), vec!["posts:list:2"]);
    }

    #[test]
    fn test_set_expiry_and_sweep() {
        let (clock, store) = store();
        store.add_to_set("tag:short", "a", 1);
        store.add_to_set("tag:long", "b", 0);
        assert_eq!(store.members("tag:short"), vec!["a"]);

        clock.advance_ms(1_500);
        assert!(store.members("tag:short").is_empty());
        assert!(!store.exists("tag:short"));
        assert!(store.exists("tag:long"));

        store.add_to_set("tag:swept", "c", 1);
        clock.advance_ms(1_500);
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_sets_alone_are_not_empty() {
        let (_, store) = store();
        store.add_to_set("tag:t", "gone", 0);
        assert!(!store.is_empty());

        let pattern = KeyPattern::new("tag:*").unwrap();
        assert_eq!(store.keys_matching(&pattern), vec!["tag:t"]);
    }
}
