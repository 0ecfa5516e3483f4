//! Signup, login, logout and the current user.

use axum::{extract::State, http::StatusCode};

use crate::error::{Result, clear_sentry_user};
use crate::extract::Json;
use crate::middleware::RequireAuth;
use crate::models::User;
use crate::services::auth::{AuthResponse, AuthService, LoginInput, SignupInput};
use crate::state::AppState;

/// POST /api/auth/signup
///
/// Creates a CUSTOMER account with its profile and OPEN bag.
///
/// # Errors
///
/// 422 with every invalid field, or 422 if the email is taken.
pub async fn signup(
    State(state): State<AppState>,
    Json(input): Json<SignupInput>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let auth = AuthService::new(state.pool(), state.tokens());
    let response = auth.signup(&input).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/auth/login
///
/// # Errors
///
/// 401 for an unknown email or wrong password, 403 for inactive accounts.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> Result<Json<AuthResponse>> {
    let auth = AuthService::new(state.pool(), state.tokens());
    Ok(Json(auth.login(&input).await?))
}

/// POST /api/auth/logout
///
/// Tokens are stateless; the client discards its copy.
pub async fn logout(RequireAuth(user): RequireAuth) -> StatusCode {
    tracing::debug!(user_id = %user.id, "Logged out");
    clear_sentry_user();
    StatusCode::NO_CONTENT
}

/// GET /api/auth/me
///
/// # Errors
///
/// 401 if the account behind the token no longer exists.
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<User>> {
    let auth = AuthService::new(state.pool(), state.tokens());
    Ok(Json(auth.current(user.id).await?))
}
