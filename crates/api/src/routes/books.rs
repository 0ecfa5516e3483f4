//! Book catalog routes. Reads are public; writes require an admin token.

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;

use bookstore_core::BookId;

use crate::error::Result;
use crate::extract::{Json, Path, Query};
use crate::middleware::RequireAdmin;
use crate::models::{Book, Page};
use crate::services::catalog::{
    BookListParams, CatalogService, CreateBookInput, IsbnCheck, UpdateBookInput,
};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct IsbnParams {
    #[serde(default)]
    pub isbn: String,
}

#[derive(Debug, Deserialize)]
pub struct StockParams {
    pub delta: i32,
}

fn catalog(state: &AppState) -> CatalogService<'_> {
    CatalogService::new(state.pool(), state.books())
}

/// GET /api/books
///
/// # Errors
///
/// 400 for a bad page, size or sort value.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<BookListParams>,
) -> Result<Json<Page<Book>>> {
    Ok(Json(catalog(&state).list(&params).await?))
}

/// GET /api/books/search?query=
///
/// # Errors
///
/// 400 for a blank query.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Book>>> {
    Ok(Json(catalog(&state).search(&params.query).await?))
}

/// GET /api/books/isbn/check?isbn=
///
/// # Errors
///
/// 500 if the lookup fails.
pub async fn check_isbn(
    State(state): State<AppState>,
    Query(params): Query<IsbnParams>,
) -> Result<Json<IsbnCheck>> {
    Ok(Json(catalog(&state).check_isbn(&params.isbn).await?))
}

/// GET /api/books/{id}
///
/// # Errors
///
/// 404 if the book does not exist.
pub async fn show(State(state): State<AppState>, Path(id): Path<BookId>) -> Result<Json<Book>> {
    Ok(Json(catalog(&state).get(id).await?))
}

/// POST /api/books
///
/// # Errors
///
/// 422 for invalid fields, 404 for an unknown author, 409 for a taken ISBN.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Json(input): Json<CreateBookInput>,
) -> Result<(StatusCode, Json<Book>)> {
    let book = catalog(&state).create_book(&input).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// PATCH /api/books/{id}
///
/// # Errors
///
/// 404 if the book does not exist.
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<BookId>,
    Json(input): Json<UpdateBookInput>,
) -> Result<Json<Book>> {
    Ok(Json(catalog(&state).update_book(id, &input).await?))
}

/// DELETE /api/books/{id}
///
/// # Errors
///
/// 404 if the book does not exist.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<BookId>,
) -> Result<StatusCode> {
    catalog(&state).delete_book(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/books/{id}/stock?delta=
///
/// # Errors
///
/// 409 if the adjustment would make stock negative.
pub async fn adjust_stock(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<BookId>,
    Query(params): Query<StockParams>,
) -> Result<Json<Book>> {
    Ok(Json(catalog(&state).adjust_stock(id, params.delta).await?))
}
