// ABOUTME: Standalone job worker binary for the Emporium backend
// ABOUTME: Drains the shared Redis job queue without serving HTTP
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

//! # Emporium Worker Binary
//!
//! Runs image optimization, cache invalidation and file cleanup jobs
//! enqueued by one or more `emporium-server --no-workers` processes. Both
//! sides must point at the same `REDIS_URL`, `DATABASE_URL` and upload dir.

use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use emporium_server::{
    config::ServerConfig, jobs::JobWorkerPool, jobs::RetryPolicy, logging,
    resources::ServerResources, server::shutdown_signal,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "emporium-worker")]
#[command(about = "Emporium - background job worker")]
pub struct Args {
    /// Override the number of concurrent workers
    #[arg(long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(workers) = args.workers {
        config.jobs.workers = workers;
    }
    config.validate()?;

    if config.jobs.redis_url.is_none() {
        bail!("emporium-worker needs REDIS_URL; the in-memory queue is private to one process");
    }

    let resources = ServerResources::initialize(config).await?;
    let jobs_config = resources.config.jobs.clone();
    info!(
        workers = jobs_config.workers,
        backend = resources.jobs.backend_name(),
        "Starting Emporium worker"
    );

    let pool = JobWorkerPool::start(
        resources.jobs.as_ref().clone(),
        resources.job_runner(),
        RetryPolicy::from_config(&jobs_config),
        jobs_config.workers,
        Duration::from_millis(jobs_config.poll_interval_ms),
    );

    shutdown_signal().await;
    pool.shutdown().await;
    info!("Worker stopped");
    Ok(())
}
