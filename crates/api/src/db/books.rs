//! Book repository.

use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use bookstore_core::{AuthorId, BookId, BookStatus, Genre, Isbn, Price};

use super::{RepositoryError, conflict_on_unique};
use crate::models::Book;

const BOOK_SELECT: &str = r"
    SELECT b.id, b.title, b.description, b.author_id, a.name AS author_name,
           b.price, b.stock, b.genre, b.isbn, b.image_path, b.status,
           b.created_at, b.updated_at
    FROM books b
    JOIN authors a ON a.id = b.author_id
";

/// Sort orders for the public listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Title,
    Author,
}

impl BookSort {
    /// Parse the `sort` query value (`price`, `-price`, `title`, `author`).
    #[must_use]
    pub fn parse(value: Option<&str>) -> Option<Self> {
        match value.map(str::trim) {
            None | Some("") => Some(Self::Newest),
            Some("price") => Some(Self::PriceAsc),
            Some("-price") => Some(Self::PriceDesc),
            Some("title") => Some(Self::Title),
            Some("author") => Some(Self::Author),
            Some(_) => None,
        }
    }

    const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "b.created_at DESC, b.id DESC",
            Self::PriceAsc => "b.price ASC, b.id",
            Self::PriceDesc => "b.price DESC, b.id",
            Self::Title => "LOWER(b.title), b.id",
            Self::Author => "LOWER(a.name), LOWER(b.title), b.id",
        }
    }
}

/// Filters for the public listing.
#[derive(Debug, Clone, Copy)]
pub struct BookListQuery {
    pub include_out_of_stock: bool,
    pub sort: BookSort,
    pub limit: i64,
    pub offset: i64,
}

/// Fields for a new book.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub description: Option<String>,
    pub author_id: AuthorId,
    pub price: Price,
    pub stock: i32,
    pub genre: Genre,
    pub isbn: Option<Isbn>,
    pub image_path: Option<String>,
    pub status: BookStatus,
}

/// Partial update; `None` leaves a column unchanged.
#[derive(Debug, Clone, Default)]
pub struct BookPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub author_id: Option<AuthorId>,
    pub price: Option<Price>,
    pub genre: Option<Genre>,
    pub isbn: Option<Isbn>,
    pub image_path: Option<String>,
    pub status: Option<BookStatus>,
}

fn map_write_error(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_foreign_key_violation()
    {
        return RepositoryError::NotFound;
    }
    conflict_on_unique(e, "book with this ISBN")
}

/// Repository for book database operations.
pub struct BookRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BookRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// One page of ACTIVE books plus the total number of matching books.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn list(&self, query: BookListQuery) -> Result<(Vec<Book>, i64), RepositoryError> {
        let books = sqlx::query_as::<_, Book>(&format!(
            r"
            {BOOK_SELECT}
            WHERE b.status = 'ACTIVE' AND ($1 OR b.stock > 0)
            ORDER BY {}
            LIMIT $2 OFFSET $3
            ",
            query.sort.order_by()
        ))
        .bind(query.include_out_of_stock)
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM books b WHERE b.status = 'ACTIVE' AND ($1 OR b.stock > 0)",
        )
        .bind(query.include_out_of_stock)
        .fetch_one(self.pool)
        .await?;

        Ok((books, total))
    }

    /// ACTIVE books whose title or author name matches `pattern` (`ILIKE`).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search(&self, pattern: &str, limit: i64) -> Result<Vec<Book>, RepositoryError> {
        let books = sqlx::query_as::<_, Book>(&format!(
            r"
            {BOOK_SELECT}
            WHERE b.status = 'ACTIVE' AND (b.title ILIKE $1 OR a.name ILIKE $1)
            ORDER BY LOWER(b.title), b.id
            LIMIT $2
            "
        ))
        .bind(pattern)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(books)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: BookId) -> Result<Option<Book>, RepositoryError> {
        let book = sqlx::query_as::<_, Book>(&format!("{BOOK_SELECT} WHERE b.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(book)
    }

    /// Whether any book already carries this ISBN.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn isbn_exists(&self, isbn: &Isbn) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1)")
            .bind(isbn)
            .fetch_one(self.pool)
            .await?;
        Ok(exists)
    }

    /// Apply a partial update. Returns `false` if the book does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the new ISBN is taken and
    /// `RepositoryError::NotFound` if the new author does not exist.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: BookId, patch: &BookPatch) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE books SET
                title       = COALESCE($2, title),
                description = COALESCE($3, description),
                author_id   = COALESCE($4, author_id),
                price       = COALESCE($5, price),
                genre       = COALESCE($6, genre),
                isbn        = COALESCE($7, isbn),
                image_path  = COALESCE($8, image_path),
                status      = COALESCE($9, status),
                updated_at  = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(patch.title.as_deref())
        .bind(patch.description.as_deref())
        .bind(patch.author_id)
        .bind(patch.price)
        .bind(patch.genre)
        .bind(patch.isbn.as_ref())
        .bind(patch.image_path.as_deref())
        .bind(patch.status)
        .execute(self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a book. Order lines keep their snapshot with the book cleared.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: BookId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Insert a book inside the caller's transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the ISBN is taken and
/// `RepositoryError::NotFound` if the author does not exist.
pub async fn insert(conn: &mut PgConnection, new: &NewBook) -> Result<BookId, RepositoryError> {
    let id: BookId = sqlx::query_scalar(
        r"
        INSERT INTO books
            (title, description, author_id, price, stock, genre, isbn, image_path, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id
        ",
    )
    .bind(&new.title)
    .bind(new.description.as_deref())
    .bind(new.author_id)
    .bind(new.price)
    .bind(new.stock)
    .bind(new.genre)
    .bind(new.isbn.as_ref())
    .bind(new.image_path.as_deref())
    .bind(new.status)
    .fetch_one(&mut *conn)
    .await
    .map_err(map_write_error)?;

    Ok(id)
}
