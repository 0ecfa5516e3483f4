//! Catalog domain types: books and their authors.

use chrono::{DateTime, Utc};
use serde::Serialize;

use bookstore_core::{AuthorId, BookId, BookStatus, Genre, Isbn, Price};

/// A book author.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: AuthorId,
    pub name: String,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A book in the catalog, joined with its author's name.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub description: Option<String>,
    pub author_id: AuthorId,
    pub author_name: String,
    pub price: Price,
    pub stock: i32,
    pub genre: Genre,
    pub isbn: Option<Isbn>,
    /// Path of the cover image, as supplied by the client.
    pub image_path: Option<String>,
    pub status: BookStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
