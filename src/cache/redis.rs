// ABOUTME: Redis cache implementation with connection management and TTL support
// ABOUTME: Provides shared caching for multi-instance deployments with SCAN based invalidation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

use super::{CacheKey, CacheProvider};
use crate::config::CacheConfig;
use crate::constants::cache::{
    CACHE_KEY_PREFIX, REDIS_CONNECT_TIMEOUT_SECS, REDIS_RESPONSE_TIMEOUT_SECS, REDIS_SCAN_COUNT,
};
use crate::errors::{AppError, AppResult};
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

/// Initial connection attempts before startup fails
const INITIAL_CONNECTION_RETRIES: u32 = 3;
/// First reconnect delay; doubles per attempt
const INITIAL_RETRY_DELAY_MS: u64 = 250;
/// Upper bound for a reconnect delay
const MAX_RETRY_DELAY_MS: u64 = 2_000;

/// Redis cache implementation
///
/// Uses Redis `ConnectionManager` for automatic reconnection.
/// All keys are prefixed with `CACHE_KEY_PREFIX` for namespace isolation.
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    async fn connect(config: &CacheConfig) -> AppResult<Self> {
        let url = config
            .redis_url
            .as_deref()
            .ok_or_else(|| AppError::config("Redis URL is required for Redis cache backend"))?;
        let client = redis::Client::open(url)
            .map_err(|e| AppError::config(format!("Invalid Redis URL: {e}")))?;

        let manager = connect_with_retry(&client).await?;
        info!(
            connect_timeout_secs = REDIS_CONNECT_TIMEOUT_SECS,
            response_timeout_secs = REDIS_RESPONSE_TIMEOUT_SECS,
            "Redis cache connected"
        );
        Ok(Self { manager })
    }

    /// Connection handle; clones share the multiplexed connection
    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }

    fn redis_key(key: &CacheKey) -> String {
        format!("{CACHE_KEY_PREFIX}{key}")
    }

    /// Delete every key matching a prefixed Redis pattern, returning the count
    async fn delete_matching(&self, redis_pattern: &str) -> AppResult<u64> {
        let mut conn = self.conn();
        let mut deleted = 0_u64;
        let mut cursor = 0_u64;

        // SCAN walks the keyspace in batches instead of blocking like KEYS
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(redis_pattern)
                .arg("COUNT")
                .arg(REDIS_SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .map_err(|e| redis_error("SCAN", &e))?;
            if !keys.is_empty() {
                deleted += conn
                    .del::<_, u64>(&keys)
                    .await
                    .map_err(|e| redis_error("DEL", &e))?;
            }
            if next == 0 {
                return Ok(deleted);
            }
            cursor = next;
        }
    }
}

/// `PING` expecting `PONG`
///
/// Shared with the Redis job queue backend.
pub(crate) async fn ping(conn: &mut ConnectionManager) -> AppResult<()> {
    let reply: String = redis::cmd("PING")
        .query_async(conn)
        .await
        .map_err(|e| redis_error("PING", &e))?;
    if reply == "PONG" {
        Ok(())
    } else {
        Err(AppError::external_service(
            "redis",
            format!("unexpected PING reply '{reply}'"),
        ))
    }
}

/// Open a `ConnectionManager`, retrying startup failures with doubling delays
///
/// Shared with the Redis job queue backend. Once connected the manager
/// reconnects on its own.
pub(crate) async fn connect_with_retry(client: &redis::Client) -> AppResult<ConnectionManager> {
    let manager_config = ConnectionManagerConfig::new()
        .set_connection_timeout(Duration::from_secs(REDIS_CONNECT_TIMEOUT_SECS))
        .set_response_timeout(Duration::from_secs(REDIS_RESPONSE_TIMEOUT_SECS));
    let attempts = INITIAL_CONNECTION_RETRIES + 1;
    let mut delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS);

    let mut attempt = 1;
    loop {
        match ConnectionManager::new_with_config(client.clone(), manager_config.clone()).await {
            Ok(manager) => {
                if attempt > 1 {
                    info!(attempt, "Redis reachable again");
                }
                return Ok(manager);
            }
            Err(e) if attempt < attempts => {
                warn!(
                    attempt,
                    attempts,
                    retry_in = ?delay,
                    error = %e,
                    "Redis not reachable yet"
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(Duration::from_millis(MAX_RETRY_DELAY_MS));
                attempt += 1;
            }
            Err(e) => {
                return Err(AppError::external_service(
                    "redis",
                    format!("no connection after {attempts} attempts: {e}"),
                ));
            }
        }
    }
}

/// Log and convert a Redis command failure
pub(crate) fn redis_error(command: &str, e: &redis::RedisError) -> AppError {
    error!(command, error = %e, "Redis command failed");
    AppError::external_service("redis", format!("{command} failed: {e}"))
}

#[async_trait::async_trait]
impl CacheProvider for RedisCache {
    async fn new(config: CacheConfig) -> AppResult<Self>
    where
        Self: Sized,
    {
        Self::connect(&config).await
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> AppResult<()> {
        let body = serde_json::to_vec(value)?;
        // SETEX rejects a zero expiry
        self.conn()
            .set_ex::<_, _, ()>(Self::redis_key(key), body, ttl.as_secs().max(1))
            .await
            .map_err(|e| redis_error("SETEX", &e))
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, key: &CacheKey) -> AppResult<Option<T>> {
        let body: Option<Vec<u8>> = self
            .conn()
            .get(Self::redis_key(key))
            .await
            .map_err(|e| redis_error("GET", &e))?;
        Ok(body.map(|bytes| serde_json::from_slice(&bytes)).transpose()?)
    }

    async fn invalidate(&self, key: &CacheKey) -> AppResult<()> {
        self.conn()
            .del::<_, ()>(Self::redis_key(key))
            .await
            .map_err(|e| redis_error("DEL", &e))
    }

    async fn invalidate_pattern(&self, pattern: &str) -> AppResult<u64> {
        // glob and Redis MATCH share the same wildcard syntax
        self.delete_matching(&format!("{CACHE_KEY_PREFIX}{pattern}"))
            .await
    }

    async fn exists(&self, key: &CacheKey) -> AppResult<bool> {
        self.conn()
            .exists(Self::redis_key(key))
            .await
            .map_err(|e| redis_error("EXISTS", &e))
    }

    async fn ttl(&self, key: &CacheKey) -> AppResult<Option<Duration>> {
        // -2: no such key, -1: no expiry
        let secs: i64 = self
            .conn()
            .ttl(Self::redis_key(key))
            .await
            .map_err(|e| redis_error("TTL", &e))?;
        Ok(u64::try_from(secs)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs))
    }

    async fn health_check(&self) -> AppResult<()> {
        ping(&mut self.conn()).await
    }

    async fn clear_all(&self) -> AppResult<()> {
        // Only our prefix; the instance may be shared
        self.delete_matching(&format!("{CACHE_KEY_PREFIX}*"))
            .await
            .map(drop)
    }
}
