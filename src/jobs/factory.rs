// ABOUTME: Job queue factory choosing the Redis or in-memory backend from configuration
// ABOUTME: Exposes enqueue for callers that need the job id and dispatch for fire-and-forget use
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

use super::{memory::InMemoryJobQueue, redis::RedisJobQueue, Job, JobEnvelope, JobQueueProvider};
use crate::config::JobConfig;
use crate::errors::AppResult;
use std::time::Duration;
use uuid::Uuid;

#[derive(Clone)]
enum QueueBackend {
    Memory(InMemoryJobQueue),
    Redis(RedisJobQueue),
}

/// Unified job queue interface
#[derive(Clone)]
pub struct JobQueue {
    backend: QueueBackend,
    max_attempts: u32,
}

impl JobQueue {
    /// Create the queue selected by configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the Redis backend is configured but unreachable
    pub async fn new(config: JobConfig) -> AppResult<Self> {
        let max_attempts = config.max_attempts.max(1);
        let backend = if config.redis_url.is_some() {
            tracing::info!("Initializing Redis job queue");
            QueueBackend::Redis(RedisJobQueue::new(config).await?)
        } else {
            tracing::info!("Initializing in-memory job queue");
            QueueBackend::Memory(InMemoryJobQueue::new(config).await?)
        };
        Ok(Self {
            backend,
            max_attempts,
        })
    }

    /// Whether jobs are shared through Redis
    #[must_use]
    pub const fn is_distributed(&self) -> bool {
        matches!(self.backend, QueueBackend::Redis(_))
    }

    /// Short backend name for health output
    #[must_use]
    pub const fn backend_name(&self) -> &'static str {
        match self.backend {
            QueueBackend::Memory(_) => "memory",
            QueueBackend::Redis(_) => "redis",
        }
    }

    /// Enqueue a job for its first attempt and return its id
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the job
    pub async fn enqueue(&self, job: Job) -> AppResult<Uuid> {
        let envelope = JobEnvelope::new(job, self.max_attempts);
        let id = envelope.id;
        tracing::debug!(job_id = %id, job_kind = envelope.job.kind(), "Enqueuing job");
        self.push(envelope).await?;
        Ok(id)
    }

    /// Enqueue a job after a write already committed
    ///
    /// The write is the source of truth, so a queue failure is logged and
    /// swallowed rather than turned into an error response.
    pub async fn dispatch(&self, job: Job) {
        let kind = job.kind();
        if let Err(e) = self.enqueue(job).await {
            tracing::warn!(job_kind = kind, error = %e, "Failed to enqueue background job");
        }
    }

    /// Put an envelope on the ready queue
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails
    pub async fn push(&self, envelope: JobEnvelope) -> AppResult<()> {
        match &self.backend {
            QueueBackend::Memory(queue) => queue.push(envelope).await,
            QueueBackend::Redis(queue) => queue.push(envelope).await,
        }
    }

    /// Put an envelope on the queue once `delay` has elapsed
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails
    pub async fn schedule(&self, envelope: JobEnvelope, delay: Duration) -> AppResult<()> {
        match &self.backend {
            QueueBackend::Memory(queue) => queue.schedule(envelope, delay).await,
            QueueBackend::Redis(queue) => queue.schedule(envelope, delay).await,
        }
    }

    /// Take the next due envelope, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails
    pub async fn pop(&self) -> AppResult<Option<JobEnvelope>> {
        match &self.backend {
            QueueBackend::Memory(queue) => queue.pop().await,
            QueueBackend::Redis(queue) => queue.pop().await,
        }
    }

    /// Number of queued jobs including delayed retries
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails
    pub async fn pending(&self) -> AppResult<usize> {
        match &self.backend {
            QueueBackend::Memory(queue) => queue.pending().await,
            QueueBackend::Redis(queue) => queue.pending().await,
        }
    }

    /// Check backend connectivity
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable
    pub async fn health_check(&self) -> AppResult<()> {
        match &self.backend {
            QueueBackend::Memory(queue) => queue.health_check().await,
            QueueBackend::Redis(queue) => queue.health_check().await,
        }
    }

    /// Envelopes currently held by the in-memory backend
    ///
    /// Always empty for Redis; used by tests to assert what handlers enqueued.
    pub async fn snapshot(&self) -> Vec<JobEnvelope> {
        match &self.backend {
            QueueBackend::Memory(queue) => queue.snapshot().await,
            QueueBackend::Redis(_) => Vec::new(),
        }
    }
}
