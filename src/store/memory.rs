//! In-process store adapter.
//!
//! A single-node keyspace with Redis-like semantics: string values and sets
//! share one namespace, TTLs expire lazily, and the least recently used key
//! is evicted once capacity is reached. Selected with the `memory://` URL.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::cache::{CacheEntry, Clock, KeyPattern, SystemClock};
use crate::error::{StoreError, StoreResult};
use crate::store::{Capabilities, LruTracker, StoreAdapter};

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

#[derive(Debug)]
enum Slot {
    Value(CacheEntry),
    Set {
        members: HashSet<String>,
        expires_at: Option<u64>,
    },
}

impl Slot {
    fn is_expired(&self, now_ms: u64) -> bool {
        match self {
            Slot::Value(entry) => entry.is_expired(now_ms),
            Slot::Set { expires_at, .. } => expires_at.is_some_and(|at| now_ms >= at),
        }
    }
}

#[derive(Debug)]
struct Keyspace {
    slots: HashMap<String, Slot>,
    lru: LruTracker,
    max_entries: usize,
    evictions: u64,
}

impl Keyspace {
    /// Live slot for `key`, dropping it first if it has expired.
    fn live(&mut self, key: &str, now: u64) -> Option<&mut Slot> {
        if self.slots.get(key).is_some_and(|slot| slot.is_expired(now)) {
            self.remove(key);
            return None;
        }
        let slot = self.slots.get_mut(key)?;
        self.lru.touch(key);
        Some(slot)
    }

    fn remove(&mut self, key: &str) -> bool {
        self.lru.remove(key);
        self.slots.remove(key).is_some()
    }

    fn insert(&mut self, key: &str, slot: Slot, now: u64) {
        if !self.slots.contains_key(key) {
            self.make_room(now);
        }
        self.slots.insert(key.to_string(), slot);
        self.lru.touch(key);
    }

    fn make_room(&mut self, now: u64) {
        if self.slots.len() < self.max_entries {
            return;
        }
        let expired: Vec<String> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        while self.slots.len() >= self.max_entries {
            match self.lru.evict_oldest() {
                Some(key) => {
                    self.slots.remove(&key);
                    self.evictions += 1;
                }
                None => break,
            }
        }
    }

    fn set_value(&mut self, key: &str, value: &str, ttl: u64, now: u64) {
        let entry = CacheEntry::new(value.to_string(), ttl, now);
        self.insert(key, Slot::Value(entry), now);
    }

    fn get_value(&mut self, key: &str, now: u64) -> StoreResult<Option<String>> {
        match self.live(key, now) {
            Some(Slot::Value(entry)) => Ok(Some(entry.value.clone())),
            Some(Slot::Set { .. }) => Err(StoreError::Backend(WRONG_TYPE.to_string())),
            None => Ok(None),
        }
    }
}

// == Memory Store ==
/// Full-capability adapter backed by process memory.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    keyspace: Arc<Mutex<Keyspace>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(max_entries: usize) -> Self {
        Self::with_clock(max_entries, Arc::new(SystemClock))
    }

    pub fn with_clock(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            keyspace: Arc::new(Mutex::new(Keyspace {
                slots: HashMap::new(),
                lru: LruTracker::new(),
                max_entries: max_entries.max(1),
                evictions: 0,
            })),
            clock,
        }
    }

    /// Number of keys held, expired ones included until they are touched.
    pub async fn len(&self) -> usize {
        self.keyspace.lock().await.slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Keys evicted to stay within capacity.
    pub async fn evictions(&self) -> u64 {
        self.keyspace.lock().await.evictions
    }
}

#[async_trait]
impl StoreAdapter for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        let mut keyspace = self.keyspace.lock().await;
        keyspace.slots.clear();
        keyspace.lru = LruTracker::new();
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = self.clock.now_ms();
        self.keyspace.lock().await.get_value(key, now)
    }

    async fn set(&self, key: &str, value: &str, ttl: u64) -> StoreResult<()> {
        let now = self.clock.now_ms();
        self.keyspace.lock().await.set_value(key, value, ttl, now);
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> StoreResult<u64> {
        let now = self.clock.now_ms();
        let mut keyspace = self.keyspace.lock().await;
        let mut removed = 0;
        for key in keys {
            if keyspace.live(key, now).is_some() && keyspace.remove(key) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let now = self.clock.now_ms();
        Ok(self.keyspace.lock().await.live(key, now).is_some())
    }

    async fn increment(&self, key: &str, amount: i64) -> StoreResult<i64> {
        let now = self.clock.now_ms();
        let mut keyspace = self.keyspace.lock().await;
        let (current, expires_at) = match keyspace.live(key, now) {
            Some(Slot::Value(entry)) => {
                let current = entry.value.trim().parse::<i64>().map_err(|_| {
                    StoreError::Backend("ERR value is not an integer or out of range".to_string())
                })?;
                (current, entry.expires_at)
            }
            Some(Slot::Set { .. }) => return Err(StoreError::Backend(WRONG_TYPE.to_string())),
            None => (0, None),
        };
        let next = current
            .checked_add(amount)
            .ok_or_else(|| StoreError::Backend("ERR increment or decrement would overflow".to_string()))?;
        // INCRBY keeps the existing expiry.
        let entry = CacheEntry {
            value: next.to_string(),
            expires_at,
        };
        keyspace.insert(key, Slot::Value(entry), now);
        Ok(next)
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> StoreResult<(u64, Vec<String>)> {
        let matcher = KeyPattern::new(pattern).map_err(|e| StoreError::Backend(e.to_string()))?;
        let now = self.clock.now_ms();
        let keyspace = self.keyspace.lock().await;

        let page = keyspace.lru.page_from(cursor, count.max(1));
        let next = page.next_cursor;
        let keys = page
            .keys
            .into_iter()
            .filter(|key| {
                keyspace
                    .slots
                    .get(key.as_str())
                    .is_some_and(|slot| !slot.is_expired(now))
            })
            .filter(|key| matcher.is_match(key))
            .collect();
        Ok((next, keys))
    }

    async fn get_many(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>> {
        let now = self.clock.now_ms();
        let mut keyspace = self.keyspace.lock().await;
        keys.iter().map(|key| keyspace.get_value(key, now)).collect()
    }

    async fn set_many(&self, items: &[(String, String)], ttl: u64) -> StoreResult<()> {
        let now = self.clock.now_ms();
        let mut keyspace = self.keyspace.lock().await;
        for (key, value) in items {
            keyspace.set_value(key, value, ttl, now);
        }
        Ok(())
    }

    async fn sadd(&self, keys: &[String], member: &str, ttl: u64) -> StoreResult<()> {
        let now = self.clock.now_ms();
        let expires_at = (ttl > 0).then(|| now.saturating_add(ttl.saturating_mul(1000)));
        let mut keyspace = self.keyspace.lock().await;
        for key in keys {
            match keyspace.live(key, now) {
                Some(Slot::Set {
                    members,
                    expires_at: current,
                }) => {
                    members.insert(member.to_string());
                    if expires_at.is_some() {
                        *current = expires_at;
                    }
                }
                Some(Slot::Value(_)) => return Err(StoreError::Backend(WRONG_TYPE.to_string())),
                None => {
                    let slot = Slot::Set {
                        members: HashSet::from([member.to_string()]),
                        expires_at,
                    };
                    keyspace.insert(key, slot, now);
                }
            }
        }
        Ok(())
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        let now = self.clock.now_ms();
        match self.keyspace.lock().await.live(key, now) {
            Some(Slot::Set { members, .. }) => Ok(members.iter().cloned().collect()),
            Some(Slot::Value(_)) => Err(StoreError::Backend(WRONG_TYPE.to_string())),
            None => Ok(Vec::new()),
        }
    }
}
