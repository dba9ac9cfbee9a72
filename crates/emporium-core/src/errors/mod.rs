// ABOUTME: Unified error handling with standard error codes and HTTP response mapping
// ABOUTME: Defines AppError, ErrorCode, ErrorResponse and conversions from library errors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

//! # Unified Error Handling System
//!
//! Every fallible operation in the backend returns [`AppResult`]. Handlers
//! bubble `AppError` up unchanged; the HTTP layer turns it into
//! `{"error": {"code", "message", "details"}}` with the status derived from
//! [`ErrorCode`].

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[cfg(feature = "http-response")]
mod http_response;

/// Stable machine-readable error codes
///
/// Serialized in `SCREAMING_SNAKE_CASE`; clients match on these strings.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No session token was supplied
    AuthRequired,
    /// Token or one-time code is wrong
    AuthInvalid,
    /// Session token expired
    AuthExpired,
    /// Authenticated, but not the owner or not an admin
    PermissionDenied,

    /// Generic validation failure
    InvalidInput,
    /// A required field is missing
    MissingRequiredField,
    /// Body or path segment could not be parsed
    InvalidFormat,
    /// Number outside its allowed range, or not enough stock
    ValueOutOfRange,
    /// Upload exceeds the configured limit
    PayloadTooLarge,
    /// Upload is not an accepted image type
    UnsupportedMediaType,

    /// Target row does not exist
    ResourceNotFound,
    /// Uniqueness constraint violated
    ResourceAlreadyExists,

    /// Cache or queue backend failure
    ExternalServiceError,
    /// Configuration could not be loaded
    ConfigError,

    /// Unexpected failure
    InternalError,
    /// Database operation failed
    DatabaseError,
    /// Filesystem operation failed
    StorageError,
    /// JSON encode/decode failed
    SerializationError,
}

impl ErrorCode {
    /// HTTP status for responses carrying this code
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput
            | Self::MissingRequiredField
            | Self::InvalidFormat
            | Self::ValueOutOfRange => 400,
            Self::AuthRequired | Self::AuthInvalid | Self::AuthExpired => 401,
            Self::PermissionDenied => 403,
            Self::ResourceNotFound => 404,
            Self::ResourceAlreadyExists => 409,
            Self::PayloadTooLarge => 413,
            Self::UnsupportedMediaType => 415,
            Self::ExternalServiceError => 502,
            Self::ConfigError
            | Self::InternalError
            | Self::DatabaseError
            | Self::StorageError
            | Self::SerializationError => 500,
        }
    }

    /// Generic client-facing text, used in place of the message for 5xx codes
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::AuthRequired => "Sign in to continue",
            Self::AuthInvalid => "Credentials were rejected",
            Self::AuthExpired => "Session has expired",
            Self::PermissionDenied => "Not allowed for this account",
            Self::InvalidInput => "Request failed validation",
            Self::MissingRequiredField => "Request is missing a required field",
            Self::InvalidFormat => "Request could not be parsed",
            Self::ValueOutOfRange => "Value is out of range",
            Self::PayloadTooLarge => "Upload is too large",
            Self::UnsupportedMediaType => "File type is not accepted",
            Self::ResourceNotFound => "Not found",
            Self::ResourceAlreadyExists => "Already exists",
            Self::ExternalServiceError => "A backing service failed",
            Self::ConfigError => "Server is misconfigured",
            Self::InternalError => "Internal server error",
            Self::DatabaseError => "Database operation failed",
            Self::StorageError => "Storage operation failed",
            Self::SerializationError => "Could not encode or decode data",
        }
    }

    /// 5xx codes never expose their message to clients
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.http_status() >= 500
    }
}

/// Who and what an error concerns, plus structured details for the client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Acting user, for logs only
    pub user_id: Option<Uuid>,
    /// Row the error is about, for logs only
    pub resource_id: Option<String>,
    /// Serialized as `error.details`
    pub details: serde_json::Value,
}

/// Unified error type for the application
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Log and response context
    pub context: ErrorContext,
    /// Underlying library error
    #[source]
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl AppError {
    /// Error with a code and message and no context
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Record the acting user
    #[must_use]
    pub const fn with_user_id(mut self, user_id: Uuid) -> Self {
        self.context.user_id = Some(user_id);
        self
    }

    /// Record the row the error is about
    #[must_use]
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.context.resource_id = Some(resource_id.into());
        self
    }

    /// Structured details returned to the client
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.context.details = details;
        self
    }

    #[must_use]
    fn caused_by(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// HTTP status for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

/// Result alias used across the workspace
pub type AppResult<T> = Result<T, AppError>;

/// Wire shape of an error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error payload
    pub error: ErrorBody,
}

/// Body of an [`ErrorResponse`]
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable code
    pub code: ErrorCode,
    /// Message, or the generic description for server faults
    pub message: String,
    /// Field names, limits and similar
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        let message = if error.code.is_server_error() {
            error.code.description().to_owned()
        } else {
            error.message
        };
        Self {
            error: ErrorBody {
                code: error.code,
                message,
                details: error.context.details,
            },
        }
    }
}

/// Convenience functions for creating common errors
impl AppError {
    /// Authentication required
    #[must_use]
    pub fn auth_required() -> Self {
        Self::new(ErrorCode::AuthRequired, "Authentication required")
    }

    /// Invalid authentication
    pub fn auth_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthInvalid, message)
    }

    /// Authentication expired
    #[must_use]
    pub fn auth_expired() -> Self {
        Self::new(ErrorCode::AuthExpired, "Authentication token has expired")
    }

    /// Caller does not own the resource
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, message)
    }

    /// Resource not found
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{} not found", resource.into()),
        )
    }

    /// Resource already exists
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResourceAlreadyExists, message)
    }

    /// Invalid input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Missing required field, with the field name recorded in details
    #[must_use]
    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("Field '{field}' is required"),
        )
        .with_details(serde_json::json!({ "field": field }))
    }

    /// Value outside an allowed range
    pub fn out_of_range(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValueOutOfRange, message)
    }

    /// Internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Storage (filesystem) error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, message)
    }

    /// Configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// External service error
    pub fn external_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ExternalServiceError,
            format!("{}: {}", service.into(), message.into()),
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(
            ErrorCode::SerializationError,
            format!("JSON processing failed: {error}"),
        )
        .caused_by(error)
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::storage(format!("I/O failure: {error}")).caused_by(error)
    }
}

#[cfg(feature = "database-errors")]
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::RowNotFound => Self::not_found("Record"),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::already_exists("A record with the same unique value already exists")
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                Self::not_found("Referenced record")
            }
            _ => Self::database(format!("Database operation failed: {error}")).caused_by(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_http_status() {
        assert_eq!(ErrorCode::InvalidInput.http_status(), 400);
        assert_eq!(ErrorCode::AuthRequired.http_status(), 401);
        assert_eq!(ErrorCode::PermissionDenied.http_status(), 403);
        assert_eq!(ErrorCode::ResourceNotFound.http_status(), 404);
        assert_eq!(ErrorCode::ResourceAlreadyExists.http_status(), 409);
        assert_eq!(ErrorCode::PayloadTooLarge.http_status(), 413);
        assert_eq!(ErrorCode::InternalError.http_status(), 500);
    }

    #[test]
    fn test_context_builders() {
        let error = AppError::forbidden("Not your post")
            .with_user_id(Uuid::new_v4())
            .with_resource_id("post-1");

        assert_eq!(error.code, ErrorCode::PermissionDenied);
        assert!(error.context.user_id.is_some());
        assert_eq!(error.context.resource_id.as_deref(), Some("post-1"));
        assert!(error.context.details.is_null());
    }

    #[test]
    fn test_error_response_hides_internal_message() {
        let response: ErrorResponse = AppError::database("disk I/O error at page 7").into();
        assert_eq!(response.error.code, ErrorCode::DatabaseError);
        assert_eq!(response.error.message, "Database operation failed");

        let response: ErrorResponse = AppError::not_found("Post 42").into();
        assert_eq!(response.error.message, "Post 42 not found");
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::ValueOutOfRange).unwrap();
        assert_eq!(json, "\"VALUE_OUT_OF_RANGE\"");
        let json = serde_json::to_string(&ErrorCode::ExternalServiceError).unwrap();
        assert_eq!(json, "\"EXTERNAL_SERVICE_ERROR\"");
    }

    #[test]
    fn test_missing_field_details() {
        let error = AppError::missing_field("title");
        assert_eq!(error.code, ErrorCode::MissingRequiredField);
        assert_eq!(error.context.details["field"], "title");
    }
}
