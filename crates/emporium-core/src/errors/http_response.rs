// ABOUTME: Axum IntoResponse integration for AppError
// ABOUTME: Renders errors as JSON bodies with the status derived from ErrorCode
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

use super::{AppError, ErrorResponse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // The request span already carries the request id
        if status.is_server_error() {
            tracing::error!(
                error.code = ?self.code,
                error.source = ?self.source,
                user.id = ?self.context.user_id,
                resource.id = self.context.resource_id.as_deref(),
                message = %self.message,
                "Request failed"
            );
        } else {
            tracing::debug!(error.code = ?self.code, message = %self.message, "Request rejected");
        }

        let body: ErrorResponse = self.into();
        (status, Json(body)).into_response()
    }
}
