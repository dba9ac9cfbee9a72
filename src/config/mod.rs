// ABOUTME: Configuration management module for centralized server settings
// ABOUTME: Exposes the environment-driven ServerConfig and its typed sub-configurations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

//! Configuration module for the Emporium server
//!
//! Configuration is environment-only. [`environment::ServerConfig::from_env`]
//! reads every variable once at startup; the result is shared read-only
//! through `ServerResources`.

/// Environment and server configuration
pub mod environment;

pub use environment::{
    AuthConfig, CacheConfig, DatabaseConfig, DatabaseUrl, Environment, HttpConfig, JobConfig,
    MediaConfig, ServerConfig,
};
