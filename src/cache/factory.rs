// ABOUTME: Cache factory for environment-based backend selection
// ABOUTME: Chooses Redis when REDIS_URL is configured and the in-memory LRU cache otherwise
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

use super::{memory::InMemoryCache, redis::RedisCache, CacheKey, CacheProvider};
use crate::config::CacheConfig;
use crate::errors::AppResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone)]
enum CacheBackend {
    Memory(InMemoryCache),
    Redis(RedisCache),
}

/// Unified cache interface
///
/// Besides the raw provider operations it offers [`Cache::fetch`] and
/// [`Cache::store`], which treat the cache as an optimization: backend
/// failures are logged and reported as a miss instead of failing the request.
#[derive(Clone)]
pub struct Cache {
    backend: CacheBackend,
    config: CacheConfig,
}

impl Cache {
    /// Create new cache instance based on configuration
    ///
    /// # Errors
    ///
    /// Returns an error if cache initialization fails
    pub async fn new(config: CacheConfig) -> AppResult<Self> {
        let backend = if config.redis_url.is_some() {
            tracing::info!("Initializing Redis cache");
            CacheBackend::Redis(RedisCache::new(config.clone()).await?)
        } else {
            tracing::info!(
                "Initializing in-memory cache (max entries: {})",
                config.max_entries
            );
            CacheBackend::Memory(InMemoryCache::new(config.clone()).await?)
        };
        Ok(Self { backend, config })
    }

    /// Short backend name for health output
    #[must_use]
    pub const fn backend_name(&self) -> &'static str {
        match self.backend {
            CacheBackend::Memory(_) => "memory",
            CacheBackend::Redis(_) => "redis",
        }
    }

    /// Configured TTL for a key
    #[must_use]
    pub const fn ttl_for(&self, key: &CacheKey) -> Duration {
        key.ttl(&self.config)
    }

    /// Store value in cache with TTL
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or storage fails
    pub async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> AppResult<()> {
        match &self.backend {
            CacheBackend::Memory(cache) => cache.set(key, value, ttl).await,
            CacheBackend::Redis(cache) => cache.set(key, value, ttl).await,
        }
    }

    /// Retrieve value from cache
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails
    pub async fn get<T: for<'de> Deserialize<'de>>(&self, key: &CacheKey) -> AppResult<Option<T>> {
        match &self.backend {
            CacheBackend::Memory(cache) => cache.get(key).await,
            CacheBackend::Redis(cache) => cache.get(key).await,
        }
    }

    /// Read-through lookup that degrades to a miss on backend failure
    pub async fn fetch<T: for<'de> Deserialize<'de>>(&self, key: &CacheKey) -> Option<T> {
        match self.get(key).await {
            Ok(hit) => {
                tracing::trace!(cache.key = %key, hit = hit.is_some(), "Cache lookup");
                hit
            }
            Err(e) => {
                tracing::warn!(cache.key = %key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// Store with the configured TTL, logging instead of failing
    pub async fn store<T: Serialize + Send + Sync>(&self, key: &CacheKey, value: &T) {
        if let Err(e) = self.set(key, value, self.ttl_for(key)).await {
            tracing::warn!(cache.key = %key, error = %e, "Cache write failed");
        }
    }

    /// Remove single cache entry
    ///
    /// # Errors
    ///
    /// Returns an error if invalidation fails
    pub async fn invalidate(&self, key: &CacheKey) -> AppResult<()> {
        match &self.backend {
            CacheBackend::Memory(cache) => cache.invalidate(key).await,
            CacheBackend::Redis(cache) => cache.invalidate(key).await,
        }
    }

    /// Remove all cache entries matching a wildcard pattern
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is invalid or the backend fails
    pub async fn invalidate_pattern(&self, pattern: &str) -> AppResult<u64> {
        let removed = match &self.backend {
            CacheBackend::Memory(cache) => cache.invalidate_pattern(pattern).await?,
            CacheBackend::Redis(cache) => cache.invalidate_pattern(pattern).await?,
        };
        tracing::debug!(pattern = %pattern, removed, "Cache pattern invalidated");
        Ok(removed)
    }

    /// Check if key exists in cache
    ///
    /// # Errors
    ///
    /// Returns an error if existence check fails
    pub async fn exists(&self, key: &CacheKey) -> AppResult<bool> {
        match &self.backend {
            CacheBackend::Memory(cache) => cache.exists(key).await,
            CacheBackend::Redis(cache) => cache.exists(key).await,
        }
    }

    /// Get remaining TTL for key
    ///
    /// # Errors
    ///
    /// Returns an error if TTL check fails
    pub async fn ttl(&self, key: &CacheKey) -> AppResult<Option<Duration>> {
        match &self.backend {
            CacheBackend::Memory(cache) => cache.ttl(key).await,
            CacheBackend::Redis(cache) => cache.ttl(key).await,
        }
    }

    /// Verify cache backend is healthy
    ///
    /// # Errors
    ///
    /// Returns an error if health check fails
    pub async fn health_check(&self) -> AppResult<()> {
        match &self.backend {
            CacheBackend::Memory(cache) => cache.health_check().await,
            CacheBackend::Redis(cache) => cache.health_check().await,
        }
    }

    /// Clear all cache entries
    ///
    /// # Errors
    ///
    /// Returns an error if clear operation fails
    pub async fn clear_all(&self) -> AppResult<()> {
        match &self.backend {
            CacheBackend::Memory(cache) => cache.clear_all().await,
            CacheBackend::Redis(cache) => cache.clear_all().await,
        }
    }
}
