//! Authentication extractors.
//!
//! Handlers take [`RequireAuth`] or [`RequireAdmin`] to get the caller's
//! identity from a signed access token. The token is read from the
//! `Authorization` header, either as `Bearer <token>` or as the bare token.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::set_sentry_user;
use crate::models::CurrentUser;
use crate::services::token::TokenError;
use crate::state::AppState;

/// Extractor that requires a valid access token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Extractor that requires a valid access token with the ADMIN role.
pub struct RequireAdmin(pub CurrentUser);

/// Error returned when the caller is not authenticated or not allowed.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthRejection {
    /// No token on the request.
    MissingToken,
    /// Token failed verification.
    InvalidToken(TokenError),
    /// Authenticated, but not an admin.
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::MissingToken => (StatusCode::UNAUTHORIZED, "Authentication required"),
            Self::InvalidToken(TokenError::Expired) => (StatusCode::UNAUTHORIZED, "Token expired"),
            Self::InvalidToken(_) => (StatusCode::UNAUTHORIZED, "Invalid or expired token"),
            Self::Forbidden => (StatusCode::FORBIDDEN, "Admin access required"),
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

/// Pull the raw token out of an `Authorization` header value.
#[must_use]
pub fn bearer_token(header: &str) -> Option<&str> {
    let header = header.trim();
    let token = match header.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        Some(_) => return None,
        None => header,
    };
    (!token.is_empty()).then_some(token)
}

fn authenticate(parts: &Parts, state: &AppState) -> Result<CurrentUser, AuthRejection> {
    let token = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or(AuthRejection::MissingToken)?;

    let claims = state
        .tokens()
        .verify(token, chrono::Utc::now().timestamp())
        .map_err(AuthRejection::InvalidToken)?;

    let user = claims.current_user();
    set_sentry_user(&user.id, Some(&user.email));
    Ok(user)
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).map(Self)
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state)?;
        if !user.is_admin() {
            return Err(AuthRejection::Forbidden);
        }
        Ok(Self(user))
    }
}
