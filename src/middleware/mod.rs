// ABOUTME: HTTP middleware for request tracing, authentication, and cross-origin access
// ABOUTME: Provides request ID generation, span creation, caller authentication and CORS setup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

/// Session authentication from headers and cookies
pub mod auth;
/// Cross-origin resource sharing layer
pub mod cors;
/// Request ids and HTTP spans
pub mod tracing;

// Authentication middleware
pub use auth::{get_cookie_value, AuthMiddleware, AUTH_COOKIE_NAME};

// CORS configuration
pub use cors::setup_cors;

// Request tracing and context management
pub use tracing::{
    create_job_span, create_request_span, record_response, MakeRequestUuid, REQUEST_ID_HEADER,
};
