// ABOUTME: In-process response cache bounded by an LRU and per-entry TTLs
// ABOUTME: A sweeper task drops expired payloads until the last cache handle goes away
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

use super::{CacheKey, CacheProvider};
use crate::config::CacheConfig;
use crate::constants::cache::DEFAULT_CACHE_MAX_ENTRIES;
use crate::errors::{AppError, AppResult};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, RwLock};

type Store = Arc<RwLock<LruCache<String, Payload>>>;

/// Serialized response body and the instant it goes stale
#[derive(Debug, Clone)]
struct Payload {
    json: Vec<u8>,
    stale_at: Instant,
}

impl Payload {
    fn is_stale(&self, now: Instant) -> bool {
        now >= self.stale_at
    }
}

/// Stops the sweeper when the last clone of the cache is dropped
struct SweeperHandle {
    stop: watch::Sender<bool>,
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        // Err only means the sweeper already exited
        let _ = self.stop.send(true);
    }
}

/// LRU + TTL cache living inside the server process
///
/// Entries are JSON bytes so both backends share the same serialization
/// path. Once `max_entries` is reached the least recently read entry is
/// evicted.
#[derive(Clone)]
pub struct InMemoryCache {
    store: Store,
    _sweeper: Option<Arc<SweeperHandle>>,
}

impl InMemoryCache {
    fn with_config(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries)
            .or_else(|| NonZeroUsize::new(DEFAULT_CACHE_MAX_ENTRIES))
            .unwrap_or(NonZeroUsize::MIN);
        let store: Store = Arc::new(RwLock::new(LruCache::new(capacity)));

        let sweeper = config.enable_background_cleanup.then(|| {
            let every = Duration::from_secs(config.cleanup_interval_secs.max(1));
            Arc::new(Self::spawn_sweeper(Arc::clone(&store), every))
        });

        Self {
            store,
            _sweeper: sweeper,
        }
    }

    fn spawn_sweeper(store: Store, every: Duration) -> SweeperHandle {
        let (stop, mut stopped) = watch::channel(false);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = Instant::now();
                        let swept = Self::remove_where(&store, |_, payload| payload.is_stale(now)).await;
                        if swept > 0 {
                            tracing::debug!(swept, "Swept stale cache entries");
                        }
                    }
                    _ = stopped.changed() => break,
                }
            }
            tracing::debug!("Cache sweeper stopped");
        });
        SweeperHandle { stop }
    }

    /// Drop every entry matching `predicate`; returns how many went
    async fn remove_where(store: &Store, predicate: impl Fn(&str, &Payload) -> bool) -> usize {
        let mut guard = store.write().await;
        let doomed: Vec<String> = guard
            .iter()
            .filter(|(key, payload)| predicate(key.as_str(), payload))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            guard.pop(key);
        }
        doomed.len()
    }

    /// Bytes of a live entry, promoting it in the LRU order
    async fn live(&self, key: &CacheKey) -> Option<Vec<u8>> {
        let key = key.to_string();
        let mut guard = self.store.write().await;
        let payload = guard.get(&key)?;
        if payload.is_stale(Instant::now()) {
            guard.pop(&key);
            return None;
        }
        Some(payload.json.clone())
    }

    /// Number of entries, including stale ones not yet swept
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    /// Whether the cache holds no entries
    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl CacheProvider for InMemoryCache {
    async fn new(config: CacheConfig) -> AppResult<Self> {
        Ok(Self::with_config(&config))
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> AppResult<()> {
        let payload = Payload {
            json: serde_json::to_vec(value)?,
            stale_at: Instant::now() + ttl,
        };
        self.store.write().await.push(key.to_string(), payload);
        Ok(())
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, key: &CacheKey) -> AppResult<Option<T>> {
        match self.live(key).await {
            Some(json) => Ok(Some(serde_json::from_slice(&json)?)),
            None => Ok(None),
        }
    }

    async fn invalidate(&self, key: &CacheKey) -> AppResult<()> {
        self.store.write().await.pop(&key.to_string());
        Ok(())
    }

    async fn invalidate_pattern(&self, pattern: &str) -> AppResult<u64> {
        let matcher = glob::Pattern::new(pattern).map_err(|e| {
            AppError::invalid_input(format!("Invalid cache pattern '{pattern}': {e}"))
        })?;
        let removed = Self::remove_where(&self.store, |key, _| matcher.matches(key)).await;
        Ok(removed as u64)
    }

    async fn exists(&self, key: &CacheKey) -> AppResult<bool> {
        Ok(self.live(key).await.is_some())
    }

    async fn ttl(&self, key: &CacheKey) -> AppResult<Option<Duration>> {
        // peek leaves the LRU order alone
        Ok(self
            .store
            .read()
            .await
            .peek(&key.to_string())
            .and_then(|payload| payload.stale_at.checked_duration_since(Instant::now()))
            .filter(|left| !left.is_zero()))
    }

    async fn health_check(&self) -> AppResult<()> {
        Ok(())
    }

    async fn clear_all(&self) -> AppResult<()> {
        self.store.write().await.clear();
        Ok(())
    }
}
