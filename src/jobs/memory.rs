// ABOUTME: In-process job queue with a ready deque and a delayed list for retries
// ABOUTME: Used when no Redis URL is configured; jobs are lost when the process exits
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

use super::{JobEnvelope, JobQueueProvider};
use crate::config::JobConfig;
use crate::errors::AppResult;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Default)]
struct QueueState {
    ready: VecDeque<JobEnvelope>,
    delayed: Vec<(Instant, JobEnvelope)>,
}

impl QueueState {
    /// Move every delayed envelope whose time has come to the ready queue
    fn promote_due(&mut self, now: Instant) {
        if self.delayed.is_empty() {
            return;
        }
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.delayed)
            .into_iter()
            .partition(|(at, _)| *at <= now);
        self.delayed = waiting;

        let mut due = due;
        due.sort_by_key(|(at, _)| *at);
        self.ready.extend(due.into_iter().map(|(_, envelope)| envelope));
    }
}

/// In-memory FIFO job queue
///
/// Mirrors the Redis layout: a ready queue plus delayed entries keyed by the
/// instant they become due. Delayed entries are promoted lazily on `pop`.
#[derive(Clone, Default)]
pub struct InMemoryJobQueue {
    state: Arc<Mutex<QueueState>>,
}

impl InMemoryJobQueue {
    /// All queued envelopes, ready ones first
    pub async fn snapshot(&self) -> Vec<JobEnvelope> {
        let state = self.state.lock().await;
        state
            .ready
            .iter()
            .cloned()
            .chain(state.delayed.iter().map(|(_, envelope)| envelope.clone()))
            .collect()
    }
}

#[async_trait::async_trait]
impl JobQueueProvider for InMemoryJobQueue {
    async fn new(_config: JobConfig) -> AppResult<Self> {
        Ok(Self::default())
    }

    async fn push(&self, envelope: JobEnvelope) -> AppResult<()> {
        self.state.lock().await.ready.push_back(envelope);
        Ok(())
    }

    async fn schedule(&self, envelope: JobEnvelope, delay: Duration) -> AppResult<()> {
        let due = Instant::now() + delay;
        self.state.lock().await.delayed.push((due, envelope));
        Ok(())
    }

    async fn pop(&self) -> AppResult<Option<JobEnvelope>> {
        let mut state = self.state.lock().await;
        state.promote_due(Instant::now());
        Ok(state.ready.pop_front())
    }

    async fn pending(&self) -> AppResult<usize> {
        let state = self.state.lock().await;
        Ok(state.ready.len() + state.delayed.len())
    }

    async fn health_check(&self) -> AppResult<()> {
        Ok(())
    }
}
