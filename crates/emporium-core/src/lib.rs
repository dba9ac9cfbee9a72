// ABOUTME: Core types and constants for the Emporium content and commerce backend
// ABOUTME: Foundation crate with error handling, models, permissions, and constants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

#![deny(unsafe_code)]

//! # Emporium Core
//!
//! Foundation crate providing shared types and constants for the Emporium
//! backend. It changes infrequently so the server crate recompiles fast.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError` and `ErrorCode`
//! - **constants**: Application-wide constants organized by domain
//! - **models**: Relational records (users, posts, products, orders, ...)
//! - **permissions**: User roles and ownership checks
//! - **pagination**: Limit/offset page parameters with clamping

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Application constants and configuration values organized by domain
pub mod constants;

/// Relational data models
pub mod models;

/// Role-based permission checks
pub mod permissions;

/// Limit/offset pagination helpers
pub mod pagination;
