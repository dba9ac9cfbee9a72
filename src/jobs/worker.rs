// ABOUTME: Worker pool draining the job queue with retry scheduling and graceful shutdown
// ABOUTME: Each worker polls the queue, runs jobs inside a tracing span and reschedules failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

use super::{JobEnvelope, JobQueue, JobRunner, RetryPolicy};
use crate::errors::AppResult;
use crate::logging::AppLogger;
use crate::middleware::create_job_span;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

/// What happened to a popped envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Job completed
    Succeeded,
    /// Job failed and was rescheduled after the given delay
    Retrying(Duration),
    /// Job failed its last attempt
    Exhausted,
}

impl JobOutcome {
    const fn label(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Retrying(_) => "retry_scheduled",
            Self::Exhausted => "exhausted",
        }
    }
}

/// Pool of tokio tasks consuming the job queue
pub struct JobWorkerPool {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl JobWorkerPool {
    /// Spawn `workers` tasks polling `queue` every `poll_interval` when idle
    #[must_use]
    pub fn start(
        queue: JobQueue,
        runner: JobRunner,
        policy: RetryPolicy,
        workers: usize,
        poll_interval: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let workers = workers.max(1);
        info!(
            workers,
            backend = queue.backend_name(),
            "Starting job workers"
        );

        let handles = (0..workers)
            .map(|index| {
                let queue = queue.clone();
                let runner = runner.clone();
                let mut shutdown_rx = shutdown_rx.clone();
                tokio::spawn(async move {
                    loop {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                        let idle = match process_one(&queue, &runner, &policy).await {
                            Ok(Some(_)) => false,
                            Ok(None) => true,
                            Err(e) => {
                                warn!(worker = index, "Job queue error: {}", e);
                                true
                            }
                        };
                        if idle {
                            tokio::select! {
                                () = tokio::time::sleep(poll_interval) => {}
                                _ = shutdown_rx.changed() => {}
                            }
                        }
                    }
                    debug!(worker = index, "Job worker stopped");
                })
            })
            .collect();

        Self {
            shutdown_tx,
            handles,
        }
    }

    /// Number of running workers
    #[must_use]
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Signal shutdown and wait for in-flight jobs to finish
    pub async fn shutdown(self) {
        // Err only means every worker already exited
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!("Job worker panicked: {}", e);
            }
        }
        info!("Job workers stopped");
    }
}

/// Pop and process a single envelope
///
/// Returns `Ok(None)` when no job was due.
///
/// # Errors
///
/// Returns an error when the queue itself fails; job failures are handled
/// here and reported through the outcome
pub async fn process_one(
    queue: &JobQueue,
    runner: &JobRunner,
    policy: &RetryPolicy,
) -> AppResult<Option<JobOutcome>> {
    let Some(envelope) = queue.pop().await? else {
        return Ok(None);
    };

    let span = create_job_span(envelope.id, envelope.job.kind(), envelope.attempt);
    let outcome = execute(queue, runner, policy, envelope.clone())
        .instrument(span)
        .await?;

    AppLogger::log_job_event(
        &envelope.id.to_string(),
        envelope.job.kind(),
        envelope.attempt,
        outcome.label(),
    );
    Ok(Some(outcome))
}

async fn execute(
    queue: &JobQueue,
    runner: &JobRunner,
    policy: &RetryPolicy,
    envelope: JobEnvelope,
) -> AppResult<JobOutcome> {
    let started = Instant::now();
    let result = runner.run(&envelope.job).await;

    let span = tracing::Span::current();
    span.record("duration_ms", started.elapsed().as_millis() as u64);
    span.record("success", result.is_ok());

    let Err(error) = result else {
        return Ok(JobOutcome::Succeeded);
    };

    if envelope.is_last_attempt() {
        warn!("Job failed on final attempt: {}", error.message);
        runner.on_exhausted(&envelope, &error).await?;
        return Ok(JobOutcome::Exhausted);
    }

    let delay = policy.backoff(envelope.attempt);
    warn!(
        delay_ms = delay.as_millis() as u64,
        "Job failed, scheduling retry: {}", error.message
    );
    queue
        .schedule(envelope.retry(error.message.clone()), delay)
        .await?;
    Ok(JobOutcome::Retrying(delay))
}
