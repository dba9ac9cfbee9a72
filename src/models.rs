// ABOUTME: Re-exports relational data models from emporium-core
// ABOUTME: Users, posts, products, orders, images, OTPs and settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

pub use emporium_core::models::*;
