// ABOUTME: Cache-related constants for TTL, capacity, and cleanup intervals
// ABOUTME: Shared by the in-memory and Redis cache backends
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

/// Default maximum cache entries for in-memory cache
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 10_000;

/// Default cleanup interval in seconds for expired entries
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300; // 5 minutes

/// List responses go stale quickly when content is published
pub const TTL_LIST_SECS: u64 = 60;

/// Single-resource responses (post, product, category)
pub const TTL_ITEM_SECS: u64 = 300; // 5 minutes

/// Redis connection timeout in seconds
pub const REDIS_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Redis operation timeout in seconds
pub const REDIS_RESPONSE_TIMEOUT_SECS: u64 = 3;

/// Number of keys fetched per Redis SCAN iteration
pub const REDIS_SCAN_COUNT: usize = 100;

/// Cache key prefix for namespacing in shared Redis instances
pub const CACHE_KEY_PREFIX: &str = "emporium:cache:";
