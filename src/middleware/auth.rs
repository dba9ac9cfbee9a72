// ABOUTME: Session authentication for HTTP handlers
// ABOUTME: Reads JWTs from the Authorization header or the auth_token cookie and validates them
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

use http::{header, HeaderMap};

use crate::auth::{AuthManager, AuthResult};
use crate::errors::{AppError, AppResult};

/// Cookie carrying the session token for browser clients
pub const AUTH_COOKIE_NAME: &str = "auth_token";

/// Authenticates callers of the REST API
#[derive(Clone)]
pub struct AuthMiddleware {
    auth_manager: AuthManager,
}

impl AuthMiddleware {
    /// Create new auth middleware
    #[must_use]
    pub const fn new(auth_manager: AuthManager) -> Self {
        Self { auth_manager }
    }

    /// Authenticate request using headers (supports cookies and Authorization header)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Authentication credentials are missing (no cookie or header)
    /// - The Authorization header is not a Bearer token
    /// - JWT token validation fails
    #[tracing::instrument(
        skip(self, headers),
        fields(
            auth_method = tracing::field::Empty,
            user_id = tracing::field::Empty,
            success = tracing::field::Empty,
        )
    )]
    pub fn authenticate_request_with_headers(&self, headers: &HeaderMap) -> AppResult<AuthResult> {
        self.optional_authentication(headers)?
            .ok_or_else(AppError::auth_required)
    }

    /// Authenticate when credentials are present
    ///
    /// Anonymous requests yield `Ok(None)`; a present but bad token is still an error
    /// so clients notice expired sessions instead of silently losing access.
    ///
    /// # Errors
    ///
    /// Returns an error if supplied credentials are malformed, invalid or expired
    pub fn optional_authentication(&self, headers: &HeaderMap) -> AppResult<Option<AuthResult>> {
        // API clients send the Authorization header; browsers fall back to the cookie
        if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
            let auth_str = auth_header
                .to_str()
                .map_err(|_| AppError::auth_invalid("Authorization header is not valid text"))?;
            let Some(token) = auth_str.strip_prefix("Bearer ") else {
                tracing::Span::current()
                    .record("auth_method", "INVALID")
                    .record("success", false);
                tracing::warn!("Authentication failed: Authorization header is not a Bearer token");
                return Err(AppError::auth_invalid(
                    "Invalid authorization header format - must be 'Bearer <token>'",
                ));
            };
            tracing::Span::current().record("auth_method", "JWT_TOKEN");
            return self.authenticate_jwt_token(token.trim()).map(Some);
        }

        if let Some(token) = get_cookie_value(headers, AUTH_COOKIE_NAME) {
            tracing::Span::current().record("auth_method", "JWT_COOKIE");
            return self.authenticate_jwt_token(&token).map(Some);
        }

        Ok(None)
    }

    fn authenticate_jwt_token(&self, token: &str) -> AppResult<AuthResult> {
        match self.auth_manager.authenticate(token) {
            Ok(result) => {
                tracing::Span::current()
                    .record("user_id", result.user_id.to_string())
                    .record("success", true);
                tracing::debug!(user.id = %result.user_id, "JWT authentication successful");
                Ok(result)
            }
            Err(e) => {
                tracing::Span::current().record("success", false);
                tracing::warn!("JWT authentication failed: {}", e);
                Err(e)
            }
        }
    }

    /// Get reference to the auth manager
    #[must_use]
    pub const fn auth_manager(&self) -> &AuthManager {
        &self.auth_manager
    }
}

/// Extract a cookie value from the `Cookie` headers
#[must_use]
pub fn get_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_owned())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use http::HeaderValue;

    fn middleware() -> AuthMiddleware {
        AuthMiddleware::new(AuthManager::new(b"middleware-test-secret", 1))
    }

    fn token_for(middleware: &AuthMiddleware) -> (User, String) {
        let user = User::new("reader@example.com".into(), "hash".into(), None);
        let token = middleware
            .auth_manager()
            .generate_token(&user)
            .unwrap()
            .token;
        (user, token)
    }

    #[test]
    fn test_cookie_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; auth_token=abc.def.ghi; lang=en"),
        );
        assert_eq!(
            get_cookie_value(&headers, "auth_token").as_deref(),
            Some("abc.def.ghi")
        );
        assert_eq!(get_cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_bearer_header_authenticates() {
        let middleware = middleware();
        let (user, token) = token_for(&middleware);
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        let result = middleware.authenticate_request_with_headers(&headers).unwrap();
        assert_eq!(result.user_id, user.id);
    }

    #[test]
    fn test_cookie_authenticates() {
        let middleware = middleware();
        let (user, token) = token_for(&middleware);
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("auth_token={token}")).unwrap(),
        );
        let result = middleware.authenticate_request_with_headers(&headers).unwrap();
        assert_eq!(result.user_id, user.id);
    }

    #[test]
    fn test_missing_credentials() {
        let middleware = middleware();
        let headers = HeaderMap::new();
        assert!(middleware.optional_authentication(&headers).unwrap().is_none());
        let err = middleware
            .authenticate_request_with_headers(&headers)
            .unwrap_err();
        assert_eq!(err.http_status(), 401);
    }

    #[test]
    fn test_non_bearer_scheme_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert!(middleware().optional_authentication(&headers).is_err());
    }
}
