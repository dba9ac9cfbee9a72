// ABOUTME: Authentication route handlers for registration, login, session lookup and OTP flows
// ABOUTME: Passwords are bcrypt-hashed off the async runtime and sessions are HS256 JWTs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

//! Authentication routes
//!
//! One-time passwords are never delivered by this server. Outside production
//! the issued code is echoed back as `debug_code` so clients and tests can
//! complete the flow.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::auth::{generate_otp_code, hash_otp_code, hash_password, verify_password};
use crate::constants::limits::{MAX_DISPLAY_NAME_LEN, MIN_PASSWORD_LEN, OTP_MAX_ATTEMPTS};
use crate::errors::{AppError, AppResult};
use crate::logging::AppLogger;
use crate::models::{Otp, OtpPurpose, PublicUser, User};
use crate::resources::ServerResources;
use crate::utils::extract::JsonBody;
use crate::utils::validation::{
    is_valid_password, normalize_email, optional_text, parse_choice,
};

use super::require_auth;

/// User registration request
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Login e-mail
    pub email: String,
    /// Plain password (hashed before storage)
    pub password: String,
    /// Optional display name
    pub display_name: Option<String>,
}

/// User login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Login e-mail
    pub email: String,
    /// Plain password
    pub password: String,
}

/// Session issued by register, login and OTP login
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// Authenticated user
    pub user: PublicUser,
    /// Bearer token
    pub token: String,
    /// Token expiry
    pub expires_at: DateTime<Utc>,
}

/// Request for a one-time password
#[derive(Debug, Deserialize)]
pub struct OtpRequest {
    /// Account e-mail
    pub email: String,
    /// `email_verification`, `password_reset` or `login`
    pub purpose: String,
}

/// Acknowledgement of an OTP request
#[derive(Debug, Serialize)]
pub struct OtpIssuedResponse {
    /// Human readable status
    pub message: String,
    /// Issued code, only outside production
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_code: Option<String>,
}

/// Exchange of a one-time password
#[derive(Debug, Deserialize)]
pub struct OtpVerifyRequest {
    /// Account e-mail
    pub email: String,
    /// Purpose the code was issued for
    pub purpose: String,
    /// The code
    pub code: String,
    /// Replacement password, required for `password_reset`
    pub new_password: Option<String>,
}

/// Result of a successful OTP exchange
#[derive(Debug, Serialize)]
pub struct OtpVerifiedResponse {
    /// Purpose that was fulfilled
    pub purpose: OtpPurpose,
    /// The account after the change
    pub user: PublicUser,
    /// Session token for `login`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Token expiry for `login`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Authentication routes handler
pub struct AuthRoutes;

impl AuthRoutes {
    /// Create all authentication routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/auth/register", post(Self::handle_register))
            .route("/api/auth/login", post(Self::handle_login))
            .route("/api/auth/me", get(Self::handle_me))
            .route("/api/auth/otp", post(Self::handle_request_otp))
            .route("/api/auth/otp/verify", post(Self::handle_verify_otp))
            .with_state(resources)
    }

    fn weak_password() -> AppError {
        AppError::invalid_input(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        ))
        .with_details(json!({ "field": "password" }))
    }

    fn invalid_code() -> AppError {
        AppError::invalid_input("Invalid or expired code").with_details(json!({ "field": "code" }))
    }

    fn session_response(
        resources: &ServerResources,
        user: &User,
        status: StatusCode,
    ) -> AppResult<Response> {
        let session = resources.auth_manager.generate_token(user)?;
        let body = SessionResponse {
            user: user.to_public(),
            token: session.token,
            expires_at: session.expires_at,
        };
        Ok((status, Json(body)).into_response())
    }

    /// Handle POST /api/auth/register
    async fn handle_register(
        State(resources): State<Arc<ServerResources>>,
        JsonBody(request): JsonBody<RegisterRequest>,
    ) -> Result<Response, AppError> {
        let email = normalize_email(&request.email)?;
        if !is_valid_password(&request.password) {
            return Err(Self::weak_password());
        }
        let display_name = optional_text(
            "display_name",
            request.display_name.as_deref(),
            MAX_DISPLAY_NAME_LEN,
        )?;

        let password_hash = hash_password(request.password).await?;
        let user = resources
            .database
            .create_user(&User::new(email, password_hash, display_name))
            .await?;

        AppLogger::log_auth_event(&user.id.to_string(), "register", true, Some(user.role.as_str()));
        Self::session_response(&resources, &user, StatusCode::CREATED)
    }

    /// Handle POST /api/auth/login
    async fn handle_login(
        State(resources): State<Arc<ServerResources>>,
        JsonBody(request): JsonBody<LoginRequest>,
    ) -> Result<Response, AppError> {
        let email = request.email.trim().to_lowercase();
        let user = resources.database.get_user_by_email(&email).await?;

        let Some(user) = user else {
            AppLogger::log_auth_event("unknown", "login", false, Some("unknown email"));
            return Err(AppError::auth_invalid("Invalid email or password"));
        };

        if !verify_password(request.password, user.password_hash.clone()).await? {
            AppLogger::log_auth_event(&user.id.to_string(), "login", false, Some("bad password"));
            return Err(AppError::auth_invalid("Invalid email or password"));
        }

        AppLogger::log_auth_event(&user.id.to_string(), "login", true, None);
        Self::session_response(&resources, &user, StatusCode::OK)
    }

    /// Handle GET /api/auth/me
    async fn handle_me(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let auth = require_auth(&resources, &headers)?;
        let user = resources
            .database
            .get_user(auth.user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User").with_user_id(auth.user_id))?;
        Ok((StatusCode::OK, Json(user.to_public())).into_response())
    }

    /// Handle POST /api/auth/otp
    ///
    /// Answers 202 whether or not the e-mail belongs to an account.
    async fn handle_request_otp(
        State(resources): State<Arc<ServerResources>>,
        JsonBody(request): JsonBody<OtpRequest>,
    ) -> Result<Response, AppError> {
        let email = normalize_email(&request.email)?;
        let purpose: OtpPurpose = parse_choice("purpose", &request.purpose)?;

        let mut debug_code = None;
        if let Some(user) = resources.database.get_user_by_email(&email).await? {
            let code = generate_otp_code();
            let now = Utc::now();
            let otp = Otp {
                id: Uuid::new_v4(),
                user_id: user.id,
                purpose,
                code_hash: hash_otp_code(&code),
                attempts: 0,
                expires_at: now + Duration::seconds(resources.config.auth.otp_ttl_secs),
                consumed_at: None,
                created_at: now,
            };
            resources.database.create_otp(&otp).await?;
            AppLogger::log_auth_event(&user.id.to_string(), "otp_issued", true, Some(purpose.as_str()));

            if !resources.config.environment.is_production() {
                debug_code = Some(code);
            }
        } else {
            tracing::debug!("OTP requested for unknown email");
        }

        let body = OtpIssuedResponse {
            message: "If the account exists, a code has been issued".to_owned(),
            debug_code,
        };
        Ok((StatusCode::ACCEPTED, Json(body)).into_response())
    }

    /// Handle POST /api/auth/otp/verify
    async fn handle_verify_otp(
        State(resources): State<Arc<ServerResources>>,
        JsonBody(request): JsonBody<OtpVerifyRequest>,
    ) -> Result<Response, AppError> {
        let email = normalize_email(&request.email)?;
        let purpose: OtpPurpose = parse_choice("purpose", &request.purpose)?;
        let new_password = match purpose {
            OtpPurpose::PasswordReset => {
                let password = request
                    .new_password
                    .ok_or_else(|| AppError::missing_field("new_password"))?;
                if !is_valid_password(&password) {
                    return Err(Self::weak_password()
                        .with_details(json!({ "field": "new_password" })));
                }
                Some(password)
            }
            OtpPurpose::EmailVerification | OtpPurpose::Login => None,
        };

        let user = resources
            .database
            .get_user_by_email(&email)
            .await?
            .ok_or_else(Self::invalid_code)?;
        let otp = resources
            .database
            .get_active_otp(user.id, purpose)
            .await?
            .ok_or_else(Self::invalid_code)?;
        // Every guess, right or wrong, spends an attempt before the comparison
        let attempts = resources
            .database
            .claim_otp_attempt(otp.id, OTP_MAX_ATTEMPTS)
            .await?
            .ok_or_else(Self::invalid_code)?;

        if hash_otp_code(&request.code) != otp.code_hash {
            let user_id = user.id.to_string();
            AppLogger::log_auth_event(&user_id, "otp_verify", false, Some(purpose.as_str()));
            if attempts >= OTP_MAX_ATTEMPTS {
                AppLogger::log_security_event(
                    "otp_attempts_exhausted",
                    "medium",
                    purpose.as_str(),
                    Some(&user_id),
                );
            }
            return Err(Self::invalid_code().with_details(json!({
                "field": "code",
                "attempts_remaining": (OTP_MAX_ATTEMPTS - attempts).max(0),
            })));
        }

        if !resources.database.consume_otp(otp.id).await? {
            return Err(Self::invalid_code());
        }

        let mut session = None;
        match purpose {
            OtpPurpose::EmailVerification => {
                resources.database.mark_user_verified(user.id).await?;
            }
            OtpPurpose::PasswordReset => {
                if let Some(password) = new_password {
                    let hash = hash_password(password).await?;
                    resources
                        .database
                        .update_user_password(user.id, &hash)
                        .await?;
                }
            }
            OtpPurpose::Login => {
                session = Some(resources.auth_manager.generate_token(&user)?);
            }
        }
        AppLogger::log_auth_event(&user.id.to_string(), "otp_verify", true, Some(purpose.as_str()));

        let user = resources
            .database
            .get_user(user.id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;
        let body = OtpVerifiedResponse {
            purpose,
            user: user.to_public(),
            token: session.as_ref().map(|s| s.token.clone()),
            expires_at: session.map(|s| s.expires_at),
        };
        Ok((StatusCode::OK, Json(body)).into_response())
    }
}
