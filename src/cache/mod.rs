//! Cache Module
//!
//! Fail-open caching facade over a pluggable backing store, with value
//! compression, deterministic keys, prefix-based TTLs, tag invalidation and
//! per-key stampede protection.

mod codec;
mod entry;
mod facade;
mod fallback;
mod guard;
mod key;
mod pattern;
mod stats;
mod ttl;


// Re-export public types
pub use codec::{to_canonical_json, ValueCodec, DEFAULT_COMPRESSION_THRESHOLD};
pub use entry::{current_timestamp_ms, CacheEntry, Clock, ManualClock, SystemClock};
pub use facade::{tag_key, Cache, CacheBuilder, CacheStatus, MEMORY_URL_SCHEME, TAG_PREFIX};
pub use fallback::FallbackStore;
pub use guard::{KeyGuard, StampedeGuard, DEFAULT_MAX_GUARDS};
pub use key::{build_key, list_key, user_key, CacheArg, EndpointCache, FRAMEWORK_PARAMS};
pub use pattern::KeyPattern;
pub use stats::{CacheStats, StatsRecorder};
pub use ttl::{TtlResolver, DEFAULT_TTL};
