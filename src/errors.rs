// ABOUTME: Re-exports the unified error types from emporium-core
// ABOUTME: Keeps AppError and ErrorCode identical across the workspace crates
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

pub use emporium_core::errors::*;
