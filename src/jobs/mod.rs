// ABOUTME: Background job queue for image optimization, cache invalidation and file cleanup
// ABOUTME: Defines jobs, their envelopes, the retry policy and the pluggable queue backend trait
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

//! # Background Jobs
//!
//! Handlers enqueue a [`Job`] after their write succeeded and return without
//! waiting for it. A pool of workers ([`worker::JobWorkerPool`]) pops
//! [`JobEnvelope`]s from the queue and hands them to the [`runner::JobRunner`].
//! Failed attempts are re-scheduled with exponential backoff following
//! [`RetryPolicy`]: with the defaults a job runs at most three times, the
//! retries waiting 1000 ms and 2000 ms.

/// Queue factory selecting the backend from configuration
pub mod factory;
/// In-process queue backend
pub mod memory;
/// Redis list/sorted-set queue backend
pub mod redis;
/// Executes job payloads
pub mod runner;
/// Worker pool with graceful shutdown
pub mod worker;

pub use factory::JobQueue;
pub use runner::JobRunner;
pub use worker::JobWorkerPool;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::CacheNamespace;
use crate::config::JobConfig;
use crate::constants::jobs::MAX_BACKOFF_MS;
use crate::errors::AppResult;

/// Work performed outside the request path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Job {
    /// Produce the optimized variant of an uploaded image
    OptimizeImage {
        /// Image row to optimize
        image_id: Uuid,
    },
    /// Drop every cache entry matching a wildcard pattern
    InvalidateCache {
        /// Glob pattern such as `posts:*`
        pattern: String,
    },
    /// Delete stored media files (paths relative to the upload root)
    RemoveFiles {
        /// Files to delete
        paths: Vec<String>,
    },
}

impl Job {
    /// Invalidate a whole cache namespace
    #[must_use]
    pub fn invalidate(namespace: CacheNamespace) -> Self {
        Self::InvalidateCache {
            pattern: namespace.pattern(),
        }
    }

    /// Short name used in logs and spans
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::OptimizeImage { .. } => "optimize_image",
            Self::InvalidateCache { .. } => "invalidate_cache",
            Self::RemoveFiles { .. } => "remove_files",
        }
    }
}

/// A job plus its delivery bookkeeping, serialized as JSON on the queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEnvelope {
    /// Stable id across retries
    pub id: Uuid,
    /// Payload
    pub job: Job,
    /// 1-based number of the delivery this envelope is for
    pub attempt: u32,
    /// Deliveries allowed in total
    pub max_attempts: u32,
    /// When the job was first enqueued
    pub enqueued_at: DateTime<Utc>,
    /// Error of the previous failed attempt
    pub last_error: Option<String>,
}

impl JobEnvelope {
    /// Wrap a job for its first delivery
    #[must_use]
    pub fn new(job: Job, max_attempts: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            job,
            attempt: 1,
            max_attempts: max_attempts.max(1),
            enqueued_at: Utc::now(),
            last_error: None,
        }
    }

    /// Whether a failure of this delivery is final
    #[must_use]
    pub const fn is_last_attempt(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// Envelope for the next delivery after a failure
    #[must_use]
    pub fn retry(&self, error: impl Into<String>) -> Self {
        Self {
            attempt: self.attempt + 1,
            last_error: Some(error.into()),
            ..self.clone()
        }
    }
}

/// Fixed retry policy: bounded attempts with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Deliveries allowed in total
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Cap for any single delay
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Policy from job configuration
    #[must_use]
    pub fn from_config(config: &JobConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.backoff_ms),
            max_backoff: Duration::from_millis(MAX_BACKOFF_MS.max(config.backoff_ms)),
        }
    }

    /// Delay before retry number `retry` (1-based): `initial * 2^(retry-1)`
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1_u32 << exponent)
            .min(self.max_backoff)
    }

    /// Delay before re-delivering a job whose `attempt` just failed, or `None`
    /// when attempts are exhausted
    #[must_use]
    pub fn delay_after_failure(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts).then(|| self.backoff(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&JobConfig::default())
    }
}

/// Queue backend trait for pluggable implementations
///
/// `pop` never blocks: it returns `None` when no job is due and the worker
/// decides how long to idle.
#[async_trait::async_trait]
pub trait JobQueueProvider: Send + Sync + Clone {
    /// Create new queue instance with configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached
    async fn new(config: JobConfig) -> AppResult<Self>
    where
        Self: Sized;

    /// Make an envelope available to workers immediately
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the backend fails
    async fn push(&self, envelope: JobEnvelope) -> AppResult<()>;

    /// Make an envelope available once `delay` has elapsed
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the backend fails
    async fn schedule(&self, envelope: JobEnvelope, delay: Duration) -> AppResult<()>;

    /// Take the next due envelope
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or a payload cannot be decoded
    async fn pop(&self) -> AppResult<Option<JobEnvelope>>;

    /// Jobs waiting, due or delayed
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails
    async fn pending(&self) -> AppResult<usize>;

    /// Verify the backend is reachable
    ///
    /// # Errors
    ///
    /// Returns an error if the health check fails
    async fn health_check(&self) -> AppResult<()>;
}
