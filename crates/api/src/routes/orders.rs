//! Customer order routes and the profile.

use axum::extract::State;

use crate::error::Result;
use crate::extract::{Json, Path};
use crate::middleware::RequireAuth;
use crate::models::{Order, Profile};
use crate::services::orders::OrderService;
use crate::state::AppState;

/// GET /api/orders
///
/// # Errors
///
/// 500 if the query fails.
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(OrderService::new(state.pool()).list_mine(&user).await?))
}

/// GET /api/orders/{orderNumber}
///
/// # Errors
///
/// 404 if the order does not exist or belongs to someone else.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(number): Path<String>,
) -> Result<Json<Order>> {
    Ok(Json(OrderService::new(state.pool()).get(&user, &number).await?))
}

/// POST /api/orders/{orderNumber}/cancel
///
/// # Errors
///
/// 403 for someone else's order, 409 unless the order is PROCESSING.
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(number): Path<String>,
) -> Result<Json<Order>> {
    let (order, restocked) = OrderService::new(state.pool())
        .cancel(&user, &number)
        .await?;
    state.books().invalidate(&restocked).await;
    Ok(Json(order))
}

/// GET /api/profile
///
/// # Errors
///
/// 404 if the caller has no profile.
pub async fn profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Profile>> {
    Ok(Json(OrderService::new(state.pool()).profile(&user).await?))
}
