//! Cache key derivation.
//!
//! Keys are `"{prefix}:{digest}"` where the digest covers the canonical JSON of
//! the call arguments, so argument order never changes the key.

use std::collections::BTreeMap;
use std::fmt::Display;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::cache::codec::to_canonical_json;

/// Keyword arguments that carry framework plumbing rather than request data.
pub const FRAMEWORK_PARAMS: &[&str] = &["request", "db", "background_tasks", "current_user", "service"];

// == Cache Argument ==
/// One argument of a cached call.
///
/// `Handle` stands for a live framework object (request, session, task queue)
/// and never contributes to the key.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheArg {
    Value(Value),
    Handle,
}

impl CacheArg {
    pub fn value(v: impl Into<Value>) -> Self {
        CacheArg::Value(v.into())
    }

    fn hashable(&self) -> Option<&Value> {
        match self {
            CacheArg::Value(v) => Some(v),
            CacheArg::Handle => None,
        }
    }
}

macro_rules! impl_from_for_cache_arg {
    ($($ty:ty),*) => {
        $(impl From<$ty> for CacheArg {
            fn from(v: $ty) -> Self {
                CacheArg::Value(Value::from(v))
            }
        })*
    };
}

impl_from_for_cache_arg!(i32, i64, u32, u64, usize, f64, bool, String, &str, Value);

impl<T: Into<Value>> From<Option<T>> for CacheArg {
    fn from(v: Option<T>) -> Self {
        CacheArg::Value(v.map(Into::into).unwrap_or(Value::Null))
    }
}

// == Key Builder ==
/// Builds `"{prefix}:{hex_digest}"` from positional and keyword arguments.
///
/// Handles are dropped from both lists; keyword arguments whose name starts
/// with `_` are dropped as well.
pub fn build_key(prefix: &str, args: &[CacheArg], kwargs: &[(&str, CacheArg)]) -> String {
    let args: Vec<&Value> = args.iter().filter_map(CacheArg::hashable).collect();
    let kwargs = filtered_kwargs(kwargs, &[]);
    let canonical = json!({ "args": args, "kwargs": kwargs });
    format!("{prefix}:{}", digest(&canonical))
}

/// Key for data scoped to one subject: `"{prefix}:user:{id}[:{params}]"`.
pub fn user_key<I, K, V>(prefix: &str, user_id: impl Display, params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Display,
{
    match join_params(params) {
        Some(params) => format!("{prefix}:user:{user_id}:{params}"),
        None => format!("{prefix}:user:{user_id}"),
    }
}

/// Key for an unscoped list query: `"{prefix}:list[:{params}]"`.
pub fn list_key<I, K, V>(prefix: &str, params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Display,
{
    match join_params(params) {
        Some(params) => format!("{prefix}:list:{params}"),
        None => format!("{prefix}:list"),
    }
}

// == Endpoint Key ==
/// Key derivation for cached request handlers.
///
/// Produces `"{prefix}[:u{user}]:{digest}"`; framework parameters such as
/// `request` or `db` are excluded on top of the [`build_key`] rules.
#[derive(Debug, Clone)]
pub struct EndpointCache {
    pub prefix: String,
    pub ttl: Option<u64>,
    pub include_user: bool,
    pub tags: Vec<String>,
}

impl EndpointCache {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ttl: None,
            include_user: false,
            tags: Vec::new(),
        }
    }

    pub fn ttl(mut self, seconds: u64) -> Self {
        self.ttl = Some(seconds);
        self
    }

    /// Namespaces keys per authenticated subject.
    pub fn per_user(mut self) -> Self {
        self.include_user = true;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn key(&self, user_id: Option<&str>, kwargs: &[(&str, CacheArg)]) -> String {
        let params = filtered_kwargs(kwargs, FRAMEWORK_PARAMS);
        let hash = digest(&Value::Object(params.into_iter().collect()));
        match user_id.filter(|_| self.include_user) {
            Some(user) => format!("{}:u{}:{}", self.prefix, user, hash),
            None => format!("{}:{}", self.prefix, hash),
        }
    }
}

fn filtered_kwargs(kwargs: &[(&str, CacheArg)], excluded: &[&str]) -> BTreeMap<String, Value> {
    kwargs
        .iter()
        .filter(|(name, _)| !name.starts_with('_') && !excluded.contains(name))
        .filter_map(|(name, arg)| arg.hashable().map(|v| (name.to_string(), v.clone())))
        .collect()
}

fn digest(value: &Value) -> String {
    // A Value always serializes; fall back to Display for symmetry.
    let canonical = to_canonical_json(value).unwrap_or_else(|_| value.to_string());
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

fn join_params<I, K, V>(params: I) -> Option<String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Display,
{
    let sorted: BTreeMap<String, String> = params
        .into_iter()
        .map(|(k, v)| (k.into(), v.to_string()))
        .collect();
    if sorted.is_empty() {
        return None;
    }
    Some(
        sorted
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("_"),
    )
}
