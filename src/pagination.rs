// ABOUTME: Re-exports pagination types from emporium-core for unified type identity
// ABOUTME: Ensures PageParams and Page are the same type across all workspace crates
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

pub use emporium_core::pagination::*;
