// ABOUTME: Main library entry point for the Emporium content and commerce backend
// ABOUTME: Exposes the HTTP API, persistence, caching, media handling and background jobs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

#![deny(unsafe_code)]

//! # Emporium Server
//!
//! A REST backend for a small publishing and storefront site: users write
//! posts and list products, visitors browse them, and buyers place orders.
//!
//! ## Features
//!
//! - **Content**: posts with categories, tags and draft/published states
//! - **Commerce**: products with stock, orders with an admin-driven lifecycle
//! - **Media**: image uploads optimized in the background
//! - **Sessions**: password login, JWT sessions, one-time codes
//! - **Caching**: in-memory LRU or Redis, invalidated through jobs
//!
//! ## Architecture
//!
//! - **Routes**: one axum router per resource family, merged in [`server`]
//! - **Database**: `SQLite` through sqlx, one module per table family
//! - **Jobs**: a retrying queue (in-memory or Redis) drained by worker tasks
//! - **Config**: environment variables only, read once at startup
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use emporium_server::config::ServerConfig;
//! use emporium_server::resources::ServerResources;
//! use emporium_server::server::EmporiumServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     let port = config.http_port;
//!     let resources = ServerResources::initialize(config).await?;
//!     EmporiumServer::new(Arc::new(resources)).run(port, true).await
//! }
//! ```

/// JWT sessions, password hashing and one-time codes
pub mod auth;

/// Response cache with in-memory and Redis backends
pub mod cache;

/// Environment-driven configuration
pub mod config;

/// Application constants
pub mod constants;

/// `SQLite` persistence
pub mod database;

/// Unified error handling
pub mod errors;

/// Background job queue, runner and workers
pub mod jobs;

/// Logging setup and structured event helpers
pub mod logging;

/// Uploaded file storage and image processing
pub mod media;

/// HTTP middleware
pub mod middleware;

/// Data models
pub mod models;

/// Limit/offset pagination
pub mod pagination;

/// Roles and ownership checks
pub mod permissions;

/// Shared server resources
pub mod resources;

/// HTTP route handlers
pub mod routes;

/// Server assembly and lifecycle
pub mod server;

/// Validation, extraction and parsing helpers
pub mod utils;
