// ABOUTME: UUID parsing and validation utilities to eliminate duplication across the codebase
// ABOUTME: Provides safe UUID parsing for path segments and body fields with API errors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Parse a UUID from a string with consistent error handling
///
/// # Errors
///
/// Returns `INVALID_INPUT` naming `field` if the string is not a valid UUID
pub fn parse_uuid(uuid_str: &str, field: &str) -> AppResult<Uuid> {
    Uuid::parse_str(uuid_str.trim()).map_err(|_| {
        AppError::invalid_input(format!("Invalid UUID format for '{field}': '{uuid_str}'"))
            .with_details(serde_json::json!({ "field": field }))
    })
}

/// Parse a resource id taken from the URL path
///
/// A malformed id can never match a row, so it is reported as a missing resource.
///
/// # Errors
///
/// Returns `RESOURCE_NOT_FOUND` naming `resource` if the segment is not a UUID
pub fn parse_path_id(raw: &str, resource: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::not_found(resource).with_resource_id(raw))
}

/// Parse an optional UUID string
///
/// # Errors
///
/// Returns an error if the string is Some but not a valid UUID
pub fn parse_optional_uuid(uuid_str: Option<&str>, field: &str) -> AppResult<Option<Uuid>> {
    uuid_str
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_uuid(s, field))
        .transpose()
}
