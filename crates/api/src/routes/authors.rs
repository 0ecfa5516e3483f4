//! Author routes.

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;

use bookstore_core::AuthorId;

use crate::error::Result;
use crate::extract::{Json, Path, Query};
use crate::middleware::RequireAdmin;
use crate::models::Author;
use crate::services::catalog::{CatalogService, CreateAuthorInput};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NameParams {
    #[serde(default)]
    pub name: String,
}

/// GET /api/authors
///
/// # Errors
///
/// 500 if the query fails.
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Author>>> {
    let catalog = CatalogService::new(state.pool(), state.books());
    Ok(Json(catalog.list_authors().await?))
}

/// GET /api/authors/search?name=
///
/// # Errors
///
/// 400 for a blank name.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<NameParams>,
) -> Result<Json<Vec<Author>>> {
    let catalog = CatalogService::new(state.pool(), state.books());
    Ok(Json(catalog.search_authors(&params.name).await?))
}

/// GET /api/authors/{id}
///
/// # Errors
///
/// 404 if the author does not exist.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<AuthorId>,
) -> Result<Json<Author>> {
    let catalog = CatalogService::new(state.pool(), state.books());
    Ok(Json(catalog.get_author(id).await?))
}

/// POST /api/authors
///
/// 201 when created, 200 when an author with the same name already exists.
///
/// # Errors
///
/// 422 for a blank name.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Json(input): Json<CreateAuthorInput>,
) -> Result<(StatusCode, Json<Author>)> {
    let catalog = CatalogService::new(state.pool(), state.books());
    let (author, created) = catalog.create_author(&input).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(author)))
}
