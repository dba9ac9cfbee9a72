// ABOUTME: Application-wide constants organized by domain
// ABOUTME: Cache TTLs, job retry defaults, validation limits and service names
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

/// Cache capacity, TTL and key prefix defaults
pub mod cache;
/// Background job queue defaults
pub mod jobs;
/// Field length and payload limits used by request validation
pub mod limits;

/// Service identifiers used in logs and token audiences
pub mod service_names {
    /// Name reported by the HTTP server and structured logs
    pub const EMPORIUM_SERVER: &str = "emporium-server";
    /// JWT audience for session tokens
    pub const SESSION_AUDIENCE: &str = "emporium-api";
}
