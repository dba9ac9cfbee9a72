// ABOUTME: Utility modules for common functionality across the application
// ABOUTME: Contains request validation, body extraction and identifier parsing helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

/// JSON body extraction with API error mapping
pub mod extract;
/// UUID parsing and validation utilities
pub mod uuid;
/// Field validation and sanitization
pub mod validation;
