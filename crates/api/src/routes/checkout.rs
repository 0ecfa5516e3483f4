//! Checkout route.

use axum::{extract::State, http::StatusCode};

use crate::error::{Result, add_breadcrumb};
use crate::extract::Json;
use crate::middleware::RequireAuth;
use crate::services::checkout::{CheckoutInput, CheckoutReceipt, CheckoutService};
use crate::state::AppState;

/// POST /api/checkout (legacy: POST /order/checkout)
///
/// # Errors
///
/// 404 "Cart Empty", 422 for a blank address, 409 if a book ran short.
pub async fn checkout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(input): Json<CheckoutInput>,
) -> Result<(StatusCode, Json<CheckoutReceipt>)> {
    let (receipt, touched) = CheckoutService::new(state.pool())
        .checkout(user.id, &input)
        .await?;

    state.books().invalidate(&touched).await;
    add_breadcrumb(
        "checkout",
        "Order placed",
        Some(&[("order_number", receipt.order_number.as_str())]),
    );

    Ok((StatusCode::CREATED, Json(receipt)))
}
