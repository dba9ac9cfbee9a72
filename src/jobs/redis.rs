// ABOUTME: Redis job queue backend shared by API servers and standalone workers
// ABOUTME: Ready jobs live in a list, retries wait in a sorted set scored by due time
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

use super::{JobEnvelope, JobQueueProvider};
use crate::cache::redis::{connect_with_retry, ping, redis_error};
use crate::config::JobConfig;
use crate::constants::jobs::{REDIS_DELAYED_KEY, REDIS_PROMOTE_BATCH, REDIS_READY_KEY};
use crate::errors::{AppError, AppResult};
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{info, warn};

/// Redis backed job queue
///
/// `push` appends to the ready list with LPUSH and `pop` takes from the other
/// end with RPOP, giving FIFO delivery. Delayed envelopes are stored in a
/// sorted set scored by their due time in epoch milliseconds and moved to the
/// ready list by whichever worker pops first once they are due.
#[derive(Clone)]
pub struct RedisJobQueue {
    manager: ConnectionManager,
}

impl RedisJobQueue {
    async fn new_with_config(config: &JobConfig) -> AppResult<Self> {
        let redis_url = config
            .redis_url
            .as_ref()
            .ok_or_else(|| AppError::config("Redis URL is required for Redis job queue"))?;

        let client = redis::Client::open(redis_url.as_str())
            .map_err(|e| AppError::config(format!("Failed to create Redis client: {e}")))?;

        let manager = connect_with_retry(&client).await?;
        info!("Connected to Redis job queue");

        Ok(Self { manager })
    }

    fn now_millis() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// Move due delayed envelopes to the ready list
    ///
    /// ZREM decides ownership: only the caller that actually removed a member
    /// pushes it, so concurrent workers never duplicate a job.
    async fn promote_due(&self, conn: &mut ConnectionManager) -> AppResult<()> {
        let due: Vec<String> = conn
            .zrangebyscore_limit(
                REDIS_DELAYED_KEY,
                "-inf",
                Self::now_millis(),
                0,
                REDIS_PROMOTE_BATCH,
            )
            .await
            .map_err(|e| redis_error("ZRANGEBYSCORE", &e))?;

        for payload in due {
            let removed: i64 = conn
                .zrem(REDIS_DELAYED_KEY, &payload)
                .await
                .map_err(|e| redis_error("ZREM", &e))?;
            if removed == 1 {
                conn.lpush::<_, _, ()>(REDIS_READY_KEY, &payload)
                    .await
                    .map_err(|e| redis_error("LPUSH", &e))?;
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl JobQueueProvider for RedisJobQueue {
    async fn new(config: JobConfig) -> AppResult<Self>
    where
        Self: Sized,
    {
        Self::new_with_config(&config).await
    }

    async fn push(&self, envelope: JobEnvelope) -> AppResult<()> {
        let payload = serde_json::to_string(&envelope)?;
        let mut conn = self.manager.clone();
        conn.lpush::<_, _, ()>(REDIS_READY_KEY, payload)
            .await
            .map_err(|e| redis_error("LPUSH", &e))
    }

    async fn schedule(&self, envelope: JobEnvelope, delay: Duration) -> AppResult<()> {
        let payload = serde_json::to_string(&envelope)?;
        let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        let due = Self::now_millis().saturating_add(delay_ms);

        let mut conn = self.manager.clone();
        conn.zadd::<_, _, _, ()>(REDIS_DELAYED_KEY, payload, due)
            .await
            .map_err(|e| redis_error("ZADD", &e))
    }

    async fn pop(&self) -> AppResult<Option<JobEnvelope>> {
        let mut conn = self.manager.clone();
        self.promote_due(&mut conn).await?;

        let payload: Option<String> = conn
            .rpop(REDIS_READY_KEY, None)
            .await
            .map_err(|e| redis_error("RPOP", &e))?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        match serde_json::from_str(&payload) {
            Ok(envelope) => Ok(Some(envelope)),
            Err(e) => {
                // A payload that cannot be decoded will never succeed; drop it
                warn!("Discarding undecodable job payload: {}", e);
                Err(AppError::from(e))
            }
        }
    }

    async fn pending(&self) -> AppResult<usize> {
        let mut conn = self.manager.clone();
        let ready: usize = conn
            .llen(REDIS_READY_KEY)
            .await
            .map_err(|e| redis_error("LLEN", &e))?;
        let delayed: usize = conn
            .zcard(REDIS_DELAYED_KEY)
            .await
            .map_err(|e| redis_error("ZCARD", &e))?;
        Ok(ready + delayed)
    }

    async fn health_check(&self) -> AppResult<()> {
        ping(&mut self.manager.clone()).await
    }
}
