// ABOUTME: Re-exports roles and ownership checks from emporium-core
// ABOUTME: Handlers call these before every mutating write
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

pub use emporium_core::permissions::*;
