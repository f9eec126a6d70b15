//! Configuration Module
//!
//! Handles loading cache and server configuration from environment variables.

use std::env;

use crate::cache::{DEFAULT_COMPRESSION_THRESHOLD, DEFAULT_MAX_GUARDS, DEFAULT_TTL};

/// Cache and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backing store connection URL; `None` disables caching
    pub redis_url: Option<String>,
    /// Default TTL in seconds for keys without an override
    pub default_ttl: u64,
    /// Ordered prefix -> TTL overrides, first match wins
    pub ttl_overrides: Vec<(String, u64)>,
    /// Encoded payloads at or above this many bytes are compressed
    pub compression_threshold: usize,
    /// SCAN COUNT hint per iteration during pattern invalidation
    pub scan_batch_size: usize,
    /// Per-operation timeout for the remote store in milliseconds
    pub store_timeout_ms: u64,
    /// Idle stampede guards are pruned once the table grows past this
    pub max_guards: usize,
    /// Capacity of the in-process `memory://` adapter
    pub memory_max_entries: usize,
    /// Interval in seconds between fallback store sweeps
    pub cleanup_interval: u64,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `REDIS_URL` - Backing store URL (default: unset, caching disabled)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `CACHE_TTL_OVERRIDES` - `prefix=seconds` pairs, comma separated
    /// - `CACHE_COMPRESSION_THRESHOLD` - Compression threshold in bytes (default: 1024)
    /// - `CACHE_SCAN_BATCH` - SCAN page size (default: 100)
    /// - `REDIS_TIMEOUT_MS` - Store operation timeout (default: 5000)
    /// - `CACHE_MAX_GUARDS` - Stampede guard table bound (default: 10000)
    /// - `CACHE_MEMORY_MAX_ENTRIES` - In-process adapter capacity (default: 10000)
    /// - `CLEANUP_INTERVAL` - Fallback sweep frequency in seconds (default: 30)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: env::var("REDIS_URL")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            default_ttl: parse_env("CACHE_DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            ttl_overrides: env::var("CACHE_TTL_OVERRIDES")
                .map(|v| parse_overrides(&v))
                .unwrap_or_default(),
            compression_threshold: parse_env("CACHE_COMPRESSION_THRESHOLD")
                .unwrap_or(defaults.compression_threshold),
            scan_batch_size: parse_env("CACHE_SCAN_BATCH").unwrap_or(defaults.scan_batch_size),
            store_timeout_ms: parse_env("REDIS_TIMEOUT_MS").unwrap_or(defaults.store_timeout_ms),
            max_guards: parse_env("CACHE_MAX_GUARDS").unwrap_or(defaults.max_guards),
            memory_max_entries: parse_env("CACHE_MEMORY_MAX_ENTRIES")
                .unwrap_or(defaults.memory_max_entries),
            cleanup_interval: parse_env("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            server_port: parse_env("SERVER_PORT").unwrap_or(defaults.server_port),
        }
    }

    /// Sets the backing store URL.
    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = Some(url.into());
        self
    }

    /// Appends a TTL override for keys starting with `prefix`.
    pub fn with_ttl_override(mut self, prefix: impl Into<String>, seconds: u64) -> Self {
        self.ttl_overrides.push((prefix.into(), seconds));
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: None,
            default_ttl: DEFAULT_TTL,
            ttl_overrides: Vec::new(),
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            scan_batch_size: 100,
            store_timeout_ms: 5000,
            max_guards: DEFAULT_MAX_GUARDS,
            memory_max_entries: 10_000,
            cleanup_interval: 30,
            server_port: 3000,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Parses `"comments:list=120, posts:list=60"` into ordered pairs.
///
/// Malformed pairs are skipped.
fn parse_overrides(raw: &str) -> Vec<(String, u64)> {
    raw.split(',')
        .filter_map(|pair| {
            let (prefix, seconds) = pair.trim().rsplit_once('=')?;
            let prefix = prefix.trim();
            if prefix.is_empty() {
                return None;
            }
            Some((prefix.to_string(), seconds.trim().parse().ok()?))
        })
        .collect()
}
