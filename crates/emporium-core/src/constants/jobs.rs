// ABOUTME: Background job queue constants
// ABOUTME: Retry policy defaults, worker counts and Redis key names
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

/// Total delivery attempts per job, including the first one
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay before the first retry; doubles on each further retry
pub const DEFAULT_BACKOFF_MS: u64 = 1_000;

/// Upper bound for a single backoff delay
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Default number of concurrent job workers
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// How long an idle worker waits before polling the queue again
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Redis list holding jobs ready to run
pub const REDIS_READY_KEY: &str = "emporium:jobs:ready";

/// Redis sorted set holding jobs waiting for their retry time (score = epoch ms)
pub const REDIS_DELAYED_KEY: &str = "emporium:jobs:delayed";

/// Maximum delayed jobs promoted per poll
pub const REDIS_PROMOTE_BATCH: isize = 100;
