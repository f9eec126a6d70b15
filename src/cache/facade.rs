//! Cache Facade Module
//!
//! The process-wide cache service. Constructed once at startup, shared by
//! cloning, and closed at shutdown. Store faults never reach callers: reads
//! degrade to misses and writes to no-ops. Only errors from caller-supplied
//! compute functions propagate.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::cache::codec::ValueCodec;
use crate::cache::entry::{Clock, SystemClock};
use crate::cache::fallback::FallbackStore;
use crate::cache::guard::StampedeGuard;
use crate::cache::key::{CacheArg, EndpointCache};
use crate::cache::pattern::KeyPattern;
use crate::cache::stats::{CacheStats, StatsRecorder};
use crate::cache::ttl::TtlResolver;
use crate::config::Config;
use crate::error::StoreError;
use crate::store::{MemoryStore, RedisStore, StoreAdapter};

/// Prefix of the set records that track tag membership.
pub const TAG_PREFIX: &str = "tag:";

/// URL scheme selecting the in-process adapter.
pub const MEMORY_URL_SCHEME: &str = "memory://";

// == Cache Status ==
/// Readiness of the cache, as reported to health checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    /// No backing store configured; caching is intentionally off
    NotConfigured,
    /// A store was configured but the handshake failed
    Failed,
    /// Handshake succeeded; operations reach the store
    Connected,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::NotConfigured => "not_configured",
            CacheStatus::Failed => "failed",
            CacheStatus::Connected => "connected",
        }
    }
}

enum Backend {
    Disabled,
    Failed,
    Connected(Arc<dyn StoreAdapter>),
}

impl Backend {
    fn status(&self) -> CacheStatus {
        match self {
            Backend::Disabled => CacheStatus::NotConfigured,
            Backend::Failed => CacheStatus::Failed,
            Backend::Connected(_) => CacheStatus::Connected,
        }
    }
}

struct Inner {
    backend: RwLock<Backend>,
    config: Config,
    codec: ValueCodec,
    ttl: TtlResolver,
    fallback: FallbackStore,
    guards: StampedeGuard,
    stats: StatsRecorder,
}

// == Cache Builder ==
/// Assembles a [`Cache`], optionally with an explicit adapter or clock.
pub struct CacheBuilder {
    config: Config,
    adapter: Option<Arc<dyn StoreAdapter>>,
    clock: Arc<dyn Clock>,
}

impl CacheBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            adapter: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Uses `adapter` instead of the one named by the configured URL.
    pub fn adapter(mut self, adapter: Arc<dyn StoreAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Clock used for fallback store expiry.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the cache without connecting. Status is `NotConfigured`.
    pub fn build(self) -> Cache {
        let config = self.config;
        let ttl = TtlResolver::new(config.default_ttl, config.ttl_overrides.clone());
        Cache {
            inner: Arc::new(Inner {
                backend: RwLock::new(Backend::Disabled),
                codec: ValueCodec::new(config.compression_threshold),
                ttl,
                fallback: FallbackStore::new(self.clock),
                guards: StampedeGuard::new(config.max_guards),
                stats: StatsRecorder::new(),
                config,
            }),
        }
    }

    /// Builds the cache and runs the connection handshake.
    pub async fn connect(self) -> Cache {
        let adapter = self.adapter.clone();
        let cache = self.build();
        match adapter {
            Some(adapter) => cache.attach(adapter).await,
            None => cache.init().await,
        }
        cache
    }
}

// == Cache ==
/// Cheaply clonable handle to the shared cache service.
#[derive(Clone)]
pub struct Cache {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("codec", &self.inner.codec)
            .field("ttl", &self.inner.ttl)
            .finish_non_exhaustive()
    }
}

impl Cache {
    pub fn builder(config: Config) -> CacheBuilder {
        CacheBuilder::new(config)
    }

    /// A cache with no backing store. Every operation is a no-op.
    pub fn disabled() -> Self {
        CacheBuilder::new(Config::default()).build()
    }

    /// Builds and initializes a cache from configuration.
    pub async fn connect(config: Config) -> Self {
        CacheBuilder::new(config).connect().await
    }

    // == Lifecycle ==
    /// Connects to the store named by the configured URL.
    ///
    /// A missing URL leaves caching disabled. A failed connection or
    /// handshake is logged and recorded as [`CacheStatus::Failed`].
    pub async fn init(&self) {
        let Some(url) = self.inner.config.redis_url.clone() else {
            warn!("REDIS_URL not set. Caching disabled.");
            *self.inner.backend.write().await = Backend::Disabled;
            return;
        };

        if url.starts_with(MEMORY_URL_SCHEME) {
            let store = MemoryStore::with_clock(
                self.inner.config.memory_max_entries,
                self.inner.fallback.clock().clone(),
            );
            self.attach(Arc::new(store)).await;
            return;
        }

        let timeout = Duration::from_millis(self.inner.config.store_timeout_ms);
        match RedisStore::connect(&url, timeout).await {
            Ok(store) => self.attach(Arc::new(store)).await,
            Err(e) => {
                error!(error = %e, "Failed to initialize Redis cache");
                *self.inner.backend.write().await = Backend::Failed;
            }
        }
    }

    /// Handshakes with `adapter` and starts routing operations to it.
    pub async fn attach(&self, adapter: Arc<dyn StoreAdapter>) {
        let next = match adapter.ping().await {
            Ok(()) => {
                info!(store = adapter.name(), "Cache initialized successfully");
                Backend::Connected(adapter)
            }
            Err(e) => {
                error!(store = adapter.name(), error = %e, "Failed to initialize cache store");
                Backend::Failed
            }
        };
        *self.inner.backend.write().await = next;
    }

    /// Closes the store connection and disables caching.
    pub async fn close(&self) {
        let previous = std::mem::replace(&mut *self.inner.backend.write().await, Backend::Disabled);
        if let Backend::Connected(adapter) = previous {
            if let Err(e) = adapter.close().await {
                warn!(store = adapter.name(), error = %e, "Error while closing cache store");
            }
            info!(store = adapter.name(), "Cache closed");
        }
        self.inner.fallback.clear();
    }

    pub async fn status(&self) -> CacheStatus {
        self.inner.backend.read().await.status()
    }

    pub async fn is_enabled(&self) -> bool {
        self.status().await == CacheStatus::Connected
    }

    async fn adapter(&self) -> Option<Arc<dyn StoreAdapter>> {
        match &*self.inner.backend.read().await {
            Backend::Connected(adapter) => Some(Arc::clone(adapter)),
            _ => None,
        }
    }

    fn store_fault(&self, op: &'static str, target: &str, err: StoreError) {
        self.inner.stats.record_store_error();
        error!(op, key = %target, error = %err, "Cache {} error", op);
    }

    fn decode(&self, key: &str, raw: &str) -> Option<Value> {
        match self.inner.codec.try_decode(raw.as_bytes()) {
            Ok(value) => {
                self.inner.stats.record_hit();
                debug!(key = %key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                self.inner.stats.record_decode_error();
                self.inner.stats.record_miss();
                warn!(key = %key, error = %e, "Cache decode error");
                None
            }
        }
    }

    // == TTL ==
    pub fn resolve_ttl(&self, key: &str, explicit_ttl: Option<u64>) -> u64 {
        self.inner.ttl.resolve_ttl(key, explicit_ttl)
    }

    pub fn set_ttl_override(&self, prefix: impl Into<String>, seconds: u64) {
        self.inner.ttl.set_ttl_override(prefix, seconds);
    }

    pub fn ttl_overrides(&self) -> Vec<(String, u64)> {
        self.inner.ttl.overrides()
    }

    // == Get ==
    /// Returns the cached value, or `None` on miss, decode failure, store
    /// fault, or when caching is disabled.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let store = self.adapter().await?;
        let raw = if store.capabilities().key_value {
            match store.get(key).await {
                Ok(raw) => raw,
                Err(e) => {
                    self.store_fault("get", key, e);
                    return None;
                }
            }
        } else {
            self.inner.stats.record_fallback();
            self.inner.fallback.get(key)
        };

        match raw {
            Some(raw) => self.decode(key, &raw),
            None => {
                self.inner.stats.record_miss();
                debug!(key = %key, "Cache miss");
                None
            }
        }
    }

    /// Typed read. A cached value that does not deserialize into `T` is a miss.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                warn!(key = %key, error = %e, "Cached value has unexpected shape");
                None
            }
        }
    }

    // == Set ==
    /// Stores `value` under `key`. `ttl` of `None` resolves through the
    /// override table; `Some(0)` stores without expiry.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<u64>) {
        let Some(store) = self.adapter().await else {
            return;
        };
        let encoded = match self.inner.codec.encode_serializable(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!(key = %key, error = %e, "Cache encode error");
                return;
            }
        };
        let ttl = self.resolve_ttl(key, ttl);

        if store.capabilities().key_value {
            if let Err(e) = store.set(key, &encoded, ttl).await {
                self.store_fault("set", key, e);
            }
        } else {
            self.inner.stats.record_fallback();
            self.inner.fallback.set(key, encoded, ttl);
        }
    }

    // == Delete ==
    pub async fn delete(&self, key: &str) {
        self.delete_keys(&[key.to_string()]).await;
    }

    async fn delete_keys(&self, keys: &[String]) -> usize {
        let Some(store) = self.adapter().await else {
            return 0;
        };
        if keys.is_empty() {
            return 0;
        }
        if store.capabilities().key_value {
            match store.delete(keys).await {
                Ok(n) => n as usize,
                Err(e) => {
                    self.store_fault("delete", &keys.join(","), e);
                    0
                }
            }
        } else {
            self.inner.stats.record_fallback();
            self.inner.fallback.delete(keys)
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        let Some(store) = self.adapter().await else {
            return false;
        };
        if !store.capabilities().key_value {
            self.inner.stats.record_fallback();
            return self.inner.fallback.exists(key);
        }
        match store.exists(key).await {
            Ok(found) => found,
            Err(e) => {
                self.store_fault("exists", key, e);
                false
            }
        }
    }

    /// Adds `amount` to a counter and returns the new value.
    ///
    /// Returns `0` when disabled or on failure, so `0` is not a trustworthy
    /// count unless the cache is known to be connected.
    pub async fn increment(&self, key: &str, amount: i64) -> i64 {
        let Some(store) = self.adapter().await else {
            return 0;
        };
        if !store.capabilities().counters {
            self.inner.stats.record_fallback();
            return self.inner.fallback.increment(key, amount).unwrap_or_else(|| {
                warn!(key = %key, "Fallback counter holds a non-integer value");
                0
            });
        }
        match store.increment(key, amount).await {
            Ok(n) => n,
            Err(e) => {
                self.store_fault("increment", key, e);
                0
            }
        }
    }

    // == Invalidate ==
    /// Deletes every key matching a glob pattern such as `"posts:list:*"`.
    ///
    /// Walks the keyspace with cursor-based SCAN in pages of the configured
    /// batch size until the cursor returns to `0`. Returns the number of keys
    /// removed; a store fault stops the walk and is logged.
    pub async fn invalidate(&self, pattern: &str) -> usize {
        let Some(store) = self.adapter().await else {
            return 0;
        };
        let mut removed = 0;

        if store.capabilities().can_scan_delete() {
            let batch = self.inner.config.scan_batch_size.max(1);
            let mut cursor = 0;
            loop {
                let (next, keys) = match store.scan(cursor, pattern, batch).await {
                    Ok(page) => page,
                    Err(e) => {
                        self.store_fault("invalidate", pattern, e);
                        return removed;
                    }
                };
                if !keys.is_empty() {
                    match store.delete(&keys).await {
                        Ok(n) => removed += n as usize,
                        Err(e) => {
                            self.store_fault("invalidate", pattern, e);
                            return removed;
                        }
                    }
                }
                if next == 0 {
                    break;
                }
                cursor = next;
            }
        } else {
            warn!(store = store.name(), pattern, "Store cannot scan; invalidating local entries only");
        }

        if !self.inner.fallback.is_empty() {
            match KeyPattern::new(pattern) {
                Ok(matcher) => {
                    let local = self.inner.fallback.keys_matching(&matcher);
                    removed += self.inner.fallback.delete(&local);
                }
                Err(e) => warn!(pattern, error = %e, "Invalid invalidation pattern"),
            }
        }

        info!(pattern, removed, "Invalidated cache pattern");
        removed
    }

    // == Batch Operations ==
    /// Stores several values, pipelined when the store supports it.
    ///
    /// Without an explicit TTL each key resolves its own; keys sharing a TTL
    /// go out in one round trip.
    pub async fn set_many<K, T>(&self, items: impl IntoIterator<Item = (K, T)>, ttl: Option<u64>)
    where
        K: Into<String>,
        T: Serialize,
    {
        let Some(store) = self.adapter().await else {
            return;
        };

        let mut by_ttl: BTreeMap<u64, Vec<(String, String)>> = BTreeMap::new();
        for (key, value) in items {
            let key = key.into();
            match self.inner.codec.encode_serializable(&value) {
                Ok(encoded) => {
                    let ttl = self.resolve_ttl(&key, ttl);
                    by_ttl.entry(ttl).or_default().push((key, encoded));
                }
                Err(e) => error!(key = %key, error = %e, "Cache encode error"),
            }
        }

        let caps = store.capabilities();
        for (ttl, batch) in by_ttl {
            if !caps.key_value {
                self.inner.stats.record_fallback();
                for (key, encoded) in batch {
                    self.inner.fallback.set(&key, encoded, ttl);
                }
            } else if caps.pipeline {
                if let Err(e) = store.set_many(&batch, ttl).await {
                    self.store_fault("set_many", &format!("{} keys", batch.len()), e);
                }
            } else {
                for (key, encoded) in &batch {
                    if let Err(e) = store.set(key, encoded, ttl).await {
                        self.store_fault("set", key, e);
                    }
                }
            }
        }
    }

    /// Reads several keys at once. Every requested key is present in the
    /// result, mapped to `None` when absent, expired, or unreadable.
    pub async fn get_many<S: AsRef<str>>(&self, keys: &[S]) -> HashMap<String, Option<Value>> {
        let keys: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
        let mut result: HashMap<String, Option<Value>> =
            keys.iter().map(|k| (k.clone(), None)).collect();

        let Some(store) = self.adapter().await else {
            return result;
        };
        let caps = store.capabilities();

        let raw: Vec<Option<String>> = if !caps.key_value {
            self.inner.stats.record_fallback();
            keys.iter().map(|k| self.inner.fallback.get(k)).collect()
        } else if caps.pipeline {
            match store.get_many(&keys).await {
                Ok(values) => values,
                Err(e) => {
                    self.store_fault("get_many", &format!("{} keys", keys.len()), e);
                    return result;
                }
            }
        } else {
            let mut values = Vec::with_capacity(keys.len());
            for key in &keys {
                match store.get(key).await {
                    Ok(value) => values.push(value),
                    Err(e) => {
                        self.store_fault("get", key, e);
                        values.push(None);
                    }
                }
            }
            values
        };

        for (key, raw) in keys.iter().zip(raw) {
            let value = match raw {
                Some(raw) => self.decode(key, &raw),
                None => {
                    self.inner.stats.record_miss();
                    None
                }
            };
            result.insert(key.clone(), value);
        }
        result
    }

    // == Tags ==
    /// Stores a value and records `key` under each tag.
    ///
    /// An explicit non-zero TTL is also applied to the tag records, so the
    /// bookkeeping does not outlive the data.
    pub async fn set_with_tags<T, S>(&self, key: &str, value: &T, tags: &[S], ttl: Option<u64>)
    where
        T: Serialize + ?Sized,
        S: AsRef<str>,
    {
        let Some(store) = self.adapter().await else {
            return;
        };
        self.set(key, value, ttl).await;
        if tags.is_empty() {
            return;
        }

        let tag_keys: Vec<String> = tags.iter().map(|t| tag_key(t.as_ref())).collect();
        let tag_ttl = ttl.unwrap_or(0);
        if store.capabilities().can_track_tags() {
            if let Err(e) = store.sadd(&tag_keys, key, tag_ttl).await {
                self.store_fault("set_with_tags", key, e);
            }
        } else {
            self.inner.stats.record_fallback();
            for tag_key in &tag_keys {
                self.inner.fallback.add_to_set(tag_key, key, tag_ttl);
            }
        }
    }

    /// Deletes every key recorded under `tag`, then the tag record itself.
    /// Returns the number of tagged keys removed.
    pub async fn invalidate_by_tag(&self, tag: &str) -> usize {
        let Some(store) = self.adapter().await else {
            return 0;
        };
        let tag_key = tag_key(tag);
        let sets = store.capabilities().can_track_tags();

        let members = if sets {
            match store.smembers(&tag_key).await {
                Ok(members) => members,
                Err(e) => {
                    self.store_fault("invalidate_by_tag", &tag_key, e);
                    return 0;
                }
            }
        } else {
            self.inner.stats.record_fallback();
            self.inner.fallback.members(&tag_key)
        };
        if members.is_empty() {
            debug!(tag, "No keys under tag");
            return 0;
        }

        let removed = self.delete_keys(&members).await;
        if sets {
            if let Err(e) = store.delete(std::slice::from_ref(&tag_key)).await {
                self.store_fault("invalidate_by_tag", &tag_key, e);
            }
        } else {
            self.inner.fallback.delete(std::slice::from_ref(&tag_key));
        }

        info!(tag, removed, "Invalidated cache by tag");
        removed
    }

    // == Compute If Absent ==
    /// Returns the cached value for `key`, computing and storing it on a miss.
    ///
    /// Concurrent callers for the same key wait on a per-key guard and then
    /// read the winner's value instead of recomputing. The guard is held
    /// through compute and store, and released on every exit path. Errors
    /// from `compute` are returned unchanged and nothing is cached.
    pub async fn compute_if_absent<T, E, F, Fut>(&self, key: &str, ttl: Option<u64>, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.compute_with(key, ttl, &[] as &[&str], compute).await
    }

    /// [`Cache::compute_if_absent`], recording the stored key under `tags`.
    pub async fn cached_query<T, E, F, Fut, S>(
        &self,
        key: &str,
        ttl: Option<u64>,
        tags: &[S],
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        S: AsRef<str>,
    {
        self.compute_with(key, ttl, tags, compute).await
    }

    /// [`Cache::compute_if_absent`] for a synchronous computation.
    pub async fn compute_if_absent_sync<T, E, F>(&self, key: &str, ttl: Option<u64>, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, E>,
    {
        self.compute_with(key, ttl, &[] as &[&str], move || async move { compute() })
            .await
    }

    /// Caches a request handler's result under a key derived from `policy`.
    ///
    /// Framework handles and parameters are left out of the key; with
    /// `include_user` the key is namespaced by `user_id`.
    pub async fn cached<T, E, F, Fut>(
        &self,
        policy: &EndpointCache,
        user_id: Option<&str>,
        kwargs: &[(&str, CacheArg)],
        handler: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = policy.key(user_id, kwargs);
        self.compute_with(&key, policy.ttl, policy.tags.as_slice(), handler).await
    }

    async fn compute_with<T, E, F, Fut, S>(&self, key: &str, ttl: Option<u64>, tags: &[S], compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        S: AsRef<str>,
    {
        if !self.is_enabled().await {
            return compute().await;
        }
        if let Some(hit) = self.get_as::<T>(key).await {
            return Ok(hit);
        }

        let _scope = self.inner.guards.acquire(key).await;
        // A concurrent winner may have stored the value while we waited.
        if let Some(hit) = self.get_as::<T>(key).await {
            return Ok(hit);
        }

        self.inner.stats.record_computation();
        let value = compute().await?;
        if tags.is_empty() {
            self.set(key, &value, ttl).await;
        } else {
            self.set_with_tags(key, &value, tags, ttl).await;
        }
        Ok(value)
    }

    // == Maintenance ==
    /// Sweeps expired fallback entries and idle stampede guards.
    pub fn purge_expired(&self) -> usize {
        let removed = self.inner.fallback.purge_expired();
        self.inner.guards.prune_idle();
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.inner.stats.snapshot();
        stats.fallback_entries = self.inner.fallback.len();
        stats.guards = self.inner.guards.len();
        stats
    }
}

/// Key of the set record holding the members of `tag`.
pub fn tag_key(tag: &str) -> String {
    format!("{TAG_PREFIX}{tag}")
}
