// ABOUTME: Re-exports application constants from emporium-core
// ABOUTME: Limits, cache namespaces and job defaults share one definition
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

pub use emporium_core::constants::*;
