//! Shopping bag routes. Every route requires a token.

use axum::extract::State;
use serde::Deserialize;

use bookstore_core::BagItemId;

use crate::error::{AppError, Result};
use crate::extract::{Json, Path};
use crate::middleware::RequireAuth;
use crate::models::BagView;
use crate::services::cart::{BagDelta, CartService, EditItem};
use crate::state::AppState;

/// Overwrite request body.
#[derive(Debug, Deserialize)]
pub struct EditRequest {
    #[serde(default)]
    pub items: Vec<EditItem>,
}

/// GET /api/cart
///
/// # Errors
///
/// 500 if the bag cannot be loaded.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<BagView>> {
    Ok(Json(CartService::new(state.pool()).get(user.id).await?))
}

/// PATCH /api/cart/add (legacy: PATCH /shop/add)
///
/// # Errors
///
/// 404 for an unknown book, 400 for an inactive book or short stock.
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(delta): Json<BagDelta>,
) -> Result<Json<BagView>> {
    Ok(Json(CartService::new(state.pool()).add(user.id, delta).await?))
}

/// PATCH /api/cart/remove (legacy: PATCH /shop/remove)
///
/// # Errors
///
/// 404 for an empty bag or a book not in it, 409 when removing too many.
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(delta): Json<BagDelta>,
) -> Result<Json<BagView>> {
    Ok(Json(
        CartService::new(state.pool()).remove(user.id, delta).await?,
    ))
}

/// POST /api/cart/edit
///
/// # Errors
///
/// 422 for an empty list, otherwise as for add.
pub async fn edit(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<EditRequest>,
) -> Result<Json<BagView>> {
    if request.items.is_empty() {
        return Err(AppError::Validation(vec![
            "items: list cannot be empty".to_string(),
        ]));
    }
    Ok(Json(
        CartService::new(state.pool())
            .edit(user.id, &request.items)
            .await?,
    ))
}

/// DELETE /api/cart/items/{itemId}
///
/// # Errors
///
/// 404 if the item is not in the caller's bag.
pub async fn delete_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(item_id): Path<BagItemId>,
) -> Result<Json<BagView>> {
    Ok(Json(
        CartService::new(state.pool())
            .delete_item(user.id, item_id)
            .await?,
    ))
}

/// DELETE /api/cart
///
/// # Errors
///
/// 500 if the bag cannot be cleared.
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<BagView>> {
    Ok(Json(CartService::new(state.pool()).clear(user.id).await?))
}
