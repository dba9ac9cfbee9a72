// ABOUTME: Cache abstraction layer for public API response caching
// ABOUTME: Pluggable backend support (in-memory, Redis) with namespaced keys and glob invalidation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

/// Backend selection
pub mod factory;
/// LRU + TTL backend for single-process deployments
pub mod memory;
/// Shared backend for multi-instance deployments
pub mod redis;

pub use factory::Cache;

use crate::config::CacheConfig;
use crate::errors::AppResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Response cache backend
///
/// # Examples
///
/// ```rust,no_run
/// use emporium_server::cache::{CacheKey, CacheNamespace, CacheProvider};
/// use emporium_server::cache::memory::InMemoryCache;
/// use emporium_server::config::CacheConfig;
/// use std::time::Duration;
/// # async fn example() -> Result<(), emporium_server::errors::AppError> {
///
/// let config = CacheConfig {
///     enable_background_cleanup: false,
///     ..Default::default()
/// };
/// let cache: InMemoryCache = InMemoryCache::new(config).await?;
///
/// let key = CacheKey::list(CacheNamespace::Posts, "limit=20&offset=0");
/// cache.set(&key, &vec!["hello-world"], Duration::from_secs(60)).await?;
///
/// let cached: Option<Vec<String>> = cache.get(&key).await?;
/// assert!(cached.is_some());
///
/// // A post changed: drop every cached post payload
/// cache.invalidate_pattern(&CacheNamespace::Posts.pattern()).await?;
/// # Ok(())
/// # }
/// ```
#[async_trait::async_trait]
pub trait CacheProvider: Send + Sync + Clone {
    /// Build the backend, connecting if it is remote
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached or is misconfigured
    async fn new(config: CacheConfig) -> AppResult<Self>
    where
        Self: Sized;

    /// Serialize `value` under `key` for `ttl`
    ///
    /// # Errors
    ///
    /// Returns an error on serialization or backend failure
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> AppResult<()>;

    /// Live value under `key`; expired entries read as `None`
    ///
    /// # Errors
    ///
    /// Returns an error on deserialization or backend failure
    async fn get<T: for<'de> Deserialize<'de>>(&self, key: &CacheKey) -> AppResult<Option<T>>;

    /// Drop one key
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure
    async fn invalidate(&self, key: &CacheKey) -> AppResult<()>;

    /// Drop every key matching a glob such as `posts:*`, returning the count
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is invalid or the backend fails
    async fn invalidate_pattern(&self, pattern: &str) -> AppResult<u64>;

    /// Whether a live entry exists under `key`
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure
    async fn exists(&self, key: &CacheKey) -> AppResult<bool>;

    /// Time left before `key` expires
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure
    async fn ttl(&self, key: &CacheKey) -> AppResult<Option<Duration>>;

    /// Round trip to the backend, used by `/ready`
    ///
    /// # Errors
    ///
    /// Returns an error if the backend does not answer
    async fn health_check(&self) -> AppResult<()>;

    /// Drop every entry this service owns
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure
    async fn clear_all(&self) -> AppResult<()>;
}

/// Top-level key space, one per cached resource family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    /// Post items and lists
    Posts,
    /// Product items and lists
    Products,
    /// Category lists
    Categories,
    /// Tag list
    Tags,
    /// Site settings
    Settings,
}

impl CacheNamespace {
    /// Key prefix of this namespace
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Posts => "posts",
            Self::Products => "products",
            Self::Categories => "categories",
            Self::Tags => "tags",
            Self::Settings => "settings",
        }
    }

    /// Wildcard pattern matching every key in this namespace
    #[must_use]
    pub fn pattern(&self) -> String {
        format!("{}:*", self.as_str())
    }
}

impl fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a key points at inside its namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheResource {
    /// A single row, addressed by id or key
    Item(String),
    /// A list response, addressed by its canonical query
    List(String),
}

/// Structured cache key: `{namespace}:item:{id}` or `{namespace}:list:{query}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Resource family
    pub namespace: CacheNamespace,
    /// Entry within the family
    pub resource: CacheResource,
}

impl CacheKey {
    /// Key for a single resource
    #[must_use]
    pub fn item(namespace: CacheNamespace, id: impl fmt::Display) -> Self {
        Self {
            namespace,
            resource: CacheResource::Item(id.to_string()),
        }
    }

    /// Key for a list response
    #[must_use]
    pub fn list(namespace: CacheNamespace, query: impl Into<String>) -> Self {
        Self {
            namespace,
            resource: CacheResource::List(query.into()),
        }
    }

    /// Configured TTL for this kind of entry
    #[must_use]
    pub const fn ttl(&self, config: &CacheConfig) -> Duration {
        match self.resource {
            CacheResource::Item(_) => Duration::from_secs(config.ttl_item_secs),
            CacheResource::List(_) => Duration::from_secs(config.ttl_list_secs),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource {
            CacheResource::Item(id) => write!(f, "{}:item:{id}", self.namespace),
            CacheResource::List(query) => write!(f, "{}:list:{query}", self.namespace),
        }
    }
}

/// Canonical form of list query parameters
///
/// Parameters are sorted by name and unset ones dropped, so `?b=1&a=2` and
/// `?a=2&b=1` share one cache entry.
#[must_use]
pub fn canonical_query(params: &[(&str, Option<String>)]) -> String {
    let mut present: Vec<(&str, &str)> = params
        .iter()
        .filter_map(|(name, value)| value.as_deref().map(|v| (*name, v)))
        .collect();
    present.sort_unstable();
    if present.is_empty() {
        return "all".to_owned();
    }
    present
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}
