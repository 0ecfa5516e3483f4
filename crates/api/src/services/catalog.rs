//! Catalog service: books, authors and stock adjustments.
//!
//! Book detail lookups are cached in memory for a short time. Every write
//! that can change a book invalidates its cache entry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};

use bookstore_core::{AuthorId, BookId, BookStatus, Genre, Isbn, Price, StockReason};

use crate::db::books::{self, BookListQuery, BookPatch, BookSort, NewBook};
use crate::db::stock::{self, NewMovement};
use crate::db::{AuthorRepository, BookRepository, RepositoryError};
use crate::models::{Author, Book, Page};

/// Default page size for the public listing.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Largest page size a client may request.
pub const MAX_PAGE_SIZE: i64 = 100;

const SEARCH_LIMIT: i64 = 50;

/// Cache of book detail responses (1 minute TTL).
///
/// Invalidation bumps an epoch before dropping entries. A lookup that read a
/// book from the database re-checks the epoch after inserting it and drops
/// the entry again if a write landed in between, so a read that overlapped a
/// checkout or cancellation never leaves the old stock cached.
pub struct BookCache {
    entries: Cache<BookId, Book>,
    epoch: AtomicU64,
}

impl BookCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(1000)
                .time_to_live(Duration::from_secs(60))
                .build(),
            epoch: AtomicU64::new(0),
        }
    }

    /// Current invalidation epoch. Read it before querying the database.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub async fn get(&self, id: &BookId) -> Option<Book> {
        self.entries.get(id).await
    }

    /// Cache a book read after `epoch` was observed.
    pub async fn insert(&self, book: Book, epoch: u64) {
        let id = book.id;
        self.entries.insert(id, book).await;
        if self.epoch() != epoch {
            self.entries.invalidate(&id).await;
        }
    }

    /// Drop cached entries for books whose stock or details changed.
    pub async fn invalidate(&self, ids: &[BookId]) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        for id in ids {
            self.entries.invalidate(id).await;
        }
    }
}

impl Default for BookCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Invalid Data in Fields")]
    InvalidFields(Vec<String>),

    #[error("{0}")]
    InvalidInput(String),

    #[error("book {0} not found")]
    BookNotFound(BookId),

    #[error("author {0} not found")]
    AuthorNotFound(AuthorId),

    #[error("a book with this ISBN already exists")]
    IsbnTaken,

    #[error("Insufficient stock: {available} available, adjustment {delta}")]
    InsufficientStock { available: i32, delta: i32 },

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CatalogError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Query string of the public listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookListParams {
    pub page: Option<i64>,
    pub size: Option<i64>,
    #[serde(default)]
    pub include_out_of_stock: bool,
    pub sort: Option<String>,
}

/// Normalized page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub size: i64,
}

impl PageRequest {
    /// Page 0-based; size defaults to 20 and is capped at 100.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidInput` for a negative page or a size
    /// below 1.
    pub fn normalize(page: Option<i64>, size: Option<i64>) -> Result<Self, CatalogError> {
        let page = page.unwrap_or(0);
        if page < 0 {
            return Err(CatalogError::InvalidInput("page must not be negative".to_owned()));
        }
        let size = size.unwrap_or(DEFAULT_PAGE_SIZE);
        if size < 1 {
            return Err(CatalogError::InvalidInput("size must be at least 1".to_owned()));
        }
        Ok(Self {
            page,
            size: size.min(MAX_PAGE_SIZE),
        })
    }

    #[must_use]
    pub const fn offset(self) -> i64 {
        self.page.saturating_mul(self.size)
    }
}

/// Admin request to create a book.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookInput {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub author_id: AuthorId,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub genre: Genre,
    pub isbn: Option<String>,
    pub image_path: Option<String>,
    #[serde(default)]
    pub status: BookStatus,
}

/// Admin partial update. Stock changes go through [`CatalogService::adjust_stock`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub author_id: Option<AuthorId>,
    pub price: Option<Decimal>,
    pub genre: Option<Genre>,
    pub isbn: Option<String>,
    pub image_path: Option<String>,
    pub status: Option<BookStatus>,
}

/// Admin request to create an author.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAuthorInput {
    #[serde(default)]
    pub name: String,
    pub bio: Option<String>,
}

/// Result of an ISBN availability check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IsbnCheck {
    pub valid: bool,
    pub exists: bool,
    pub message: String,
}

/// Escape `%`, `_` and `\` and wrap the term for a substring `ILIKE`.
#[must_use]
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Validate a create request, collecting every failing field.
///
/// # Errors
///
/// Returns one message per invalid field.
pub fn validate_new_book(input: &CreateBookInput) -> Result<NewBook, Vec<String>> {
    let mut errors = Vec::new();

    let title = input.title.trim();
    if title.is_empty() {
        errors.push("title: must not be empty".to_owned());
    }
    let price = Price::unit(input.price)
        .map_err(|e| errors.push(format!("price: {e}")))
        .ok();
    if input.stock < 0 {
        errors.push("stock: must not be negative".to_owned());
    }
    let isbn = match input.isbn.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match Isbn::parse(raw) {
            Ok(isbn) => Some(isbn),
            Err(e) => {
                errors.push(format!("isbn: {e}"));
                None
            }
        },
    };

    match price {
        Some(price) if errors.is_empty() => Ok(NewBook {
            title: title.to_owned(),
            description: non_blank(input.description.as_deref()),
            author_id: input.author_id,
            price,
            stock: input.stock,
            genre: input.genre,
            isbn,
            image_path: non_blank(input.image_path.as_deref()),
            status: input.status,
        }),
        _ => Err(errors),
    }
}

/// Validate a partial update, collecting every failing field.
///
/// # Errors
///
/// Returns one message per invalid field.
pub fn validate_patch(input: &UpdateBookInput) -> Result<BookPatch, Vec<String>> {
    let mut errors = Vec::new();

    let title = input.title.as_deref().map(str::trim);
    if title == Some("") {
        errors.push("title: must not be empty".to_owned());
    }
    let price = input
        .price
        .map(Price::unit)
        .transpose()
        .map_err(|e| errors.push(format!("price: {e}")))
        .ok()
        .flatten();
    let isbn = input
        .isbn
        .as_deref()
        .map(Isbn::parse)
        .transpose()
        .map_err(|e| errors.push(format!("isbn: {e}")))
        .ok()
        .flatten();

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(BookPatch {
        title: title.map(str::to_owned),
        description: input.description.clone(),
        author_id: input.author_id,
        price,
        genre: input.genre,
        isbn,
        image_path: input.image_path.clone(),
        status: input.status,
    })
}

/// Stock after applying `delta`.
///
/// # Errors
///
/// Returns `CatalogError::InsufficientStock` if the result would be negative.
pub fn adjusted_stock(current: i32, delta: i32) -> Result<i32, CatalogError> {
    current
        .checked_add(delta)
        .filter(|s| *s >= 0)
        .ok_or(CatalogError::InsufficientStock {
            available: current,
            delta,
        })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Catalog service.
pub struct CatalogService<'a> {
    pool: &'a PgPool,
    cache: &'a BookCache,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, cache: &'a BookCache) -> Self {
        Self { pool, cache }
    }

    fn books(&self) -> BookRepository<'a> {
        BookRepository::new(self.pool)
    }

    fn authors(&self) -> AuthorRepository<'a> {
        AuthorRepository::new(self.pool)
    }

    /// One page of ACTIVE books.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidInput` for bad paging or sort values.
    pub async fn list(&self, params: &BookListParams) -> Result<Page<Book>, CatalogError> {
        let page = PageRequest::normalize(params.page, params.size)?;
        let sort = BookSort::parse(params.sort.as_deref()).ok_or_else(|| {
            CatalogError::InvalidInput(
                "sort must be one of price, -price, title, author".to_owned(),
            )
        })?;

        let (content, total) = self
            .books()
            .list(BookListQuery {
                include_out_of_stock: params.include_out_of_stock,
                sort,
                limit: page.size,
                offset: page.offset(),
            })
            .await?;

        Ok(Page::new(content, total, page.size, page.page))
    }

    /// Book detail, served from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::BookNotFound` if no such book exists.
    pub async fn get(&self, id: BookId) -> Result<Book, CatalogError> {
        if let Some(book) = self.cache.get(&id).await {
            return Ok(book);
        }
        let epoch = self.cache.epoch();
        let book = self
            .books()
            .get(id)
            .await?
            .ok_or(CatalogError::BookNotFound(id))?;
        self.cache.insert(book.clone(), epoch).await;
        Ok(book)
    }

    /// ACTIVE books whose title or author contains `query`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidInput` for a blank query.
    pub async fn search(&self, query: &str) -> Result<Vec<Book>, CatalogError> {
        let term = query.trim();
        if term.is_empty() {
            return Err(CatalogError::InvalidInput("query must not be empty".to_owned()));
        }
        Ok(self.books().search(&like_pattern(term), SEARCH_LIMIT).await?)
    }

    /// Whether an ISBN is well-formed and still free.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the lookup fails.
    pub async fn check_isbn(&self, raw: &str) -> Result<IsbnCheck, CatalogError> {
        let isbn = match Isbn::parse(raw) {
            Ok(isbn) => isbn,
            Err(e) => {
                return Ok(IsbnCheck {
                    valid: false,
                    exists: false,
                    message: e.to_string(),
                });
            }
        };

        let exists = self.books().isbn_exists(&isbn).await?;
        let message = if exists {
            format!("ISBN {} is already in use", isbn.as_str())
        } else {
            format!("ISBN {} is available", isbn.as_str())
        };
        Ok(IsbnCheck {
            valid: true,
            exists,
            message,
        })
    }

    /// Create a book. Initial stock is recorded as an ADJUSTMENT.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidFields`, `CatalogError::AuthorNotFound`
    /// or `CatalogError::IsbnTaken`.
    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create_book(&self, input: &CreateBookInput) -> Result<Book, CatalogError> {
        let new = validate_new_book(input).map_err(CatalogError::InvalidFields)?;

        let mut tx = self.pool.begin().await?;
        let id = books::insert(&mut tx, &new)
            .await
            .map_err(|e| write_error(e, Some(new.author_id)))?;
        if new.stock > 0 {
            stock::apply(
                &mut tx,
                NewMovement {
                    book_id: id,
                    order_id: None,
                    previous_stock: 0,
                    new_stock: new.stock,
                    reason: StockReason::Adjustment,
                },
            )
            .await?;
        }
        tx.commit().await?;

        info!(book_id = %id, "Book created");
        self.fetch(id).await
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::BookNotFound` if the book does not exist.
    #[instrument(skip(self, input))]
    pub async fn update_book(&self, id: BookId, input: &UpdateBookInput) -> Result<Book, CatalogError> {
        let patch = validate_patch(input).map_err(CatalogError::InvalidFields)?;

        let updated = self
            .books()
            .update(id, &patch)
            .await
            .map_err(|e| write_error(e, patch.author_id))?;
        if !updated {
            return Err(CatalogError::BookNotFound(id));
        }

        self.cache.invalidate(&[id]).await;
        self.fetch(id).await
    }

    /// Delete a book.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::BookNotFound` if the book does not exist.
    #[instrument(skip(self))]
    pub async fn delete_book(&self, id: BookId) -> Result<(), CatalogError> {
        if !self.books().delete(id).await? {
            return Err(CatalogError::BookNotFound(id));
        }
        self.cache.invalidate(&[id]).await;
        info!(book_id = %id, "Book deleted");
        Ok(())
    }

    /// Change a book's stock by `delta`, recording an ADJUSTMENT.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InsufficientStock` if stock would go negative.
    #[instrument(skip(self))]
    pub async fn adjust_stock(&self, id: BookId, delta: i32) -> Result<Book, CatalogError> {
        if delta == 0 {
            return Err(CatalogError::InvalidInput("delta must not be zero".to_owned()));
        }

        let mut tx = self.pool.begin().await?;
        let book = stock::lock_books(&mut tx, &[id])
            .await?
            .pop()
            .ok_or(CatalogError::BookNotFound(id))?;

        let new_stock = adjusted_stock(book.stock, delta)?;
        stock::apply(
            &mut tx,
            NewMovement {
                book_id: id,
                order_id: None,
                previous_stock: book.stock,
                new_stock,
                reason: StockReason::Adjustment,
            },
        )
        .await?;
        tx.commit().await?;

        self.cache.invalidate(&[id]).await;
        info!(book_id = %id, previous = book.stock, new = new_stock, "Stock adjusted");
        self.fetch(id).await
    }

    /// Create an author, or return the existing one with the same name.
    ///
    /// Returns the author and whether it was newly created.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidFields` for a blank name.
    pub async fn create_author(&self, input: &CreateAuthorInput) -> Result<(Author, bool), CatalogError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(CatalogError::InvalidFields(vec![
                "name: must not be empty".to_owned(),
            ]));
        }
        let bio = non_blank(input.bio.as_deref());
        Ok(self.authors().get_or_create(name, bio.as_deref()).await?)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn list_authors(&self) -> Result<Vec<Author>, CatalogError> {
        Ok(self.authors().list().await?)
    }

    /// Authors whose name contains `name`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidInput` for a blank name.
    pub async fn search_authors(&self, name: &str) -> Result<Vec<Author>, CatalogError> {
        let term = name.trim();
        if term.is_empty() {
            return Err(CatalogError::InvalidInput("name must not be empty".to_owned()));
        }
        Ok(self.authors().search(&like_pattern(term)).await?)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::AuthorNotFound` if no such author exists.
    pub async fn get_author(&self, id: AuthorId) -> Result<Author, CatalogError> {
        self.authors()
            .get(id)
            .await?
            .ok_or(CatalogError::AuthorNotFound(id))
    }

    async fn fetch(&self, id: BookId) -> Result<Book, CatalogError> {
        self.books()
            .get(id)
            .await?
            .ok_or(CatalogError::BookNotFound(id))
    }
}

fn write_error(e: RepositoryError, author_id: Option<AuthorId>) -> CatalogError {
    match (e, author_id) {
        (RepositoryError::NotFound, Some(author)) => CatalogError::AuthorNotFound(author),
        (RepositoryError::Conflict(_), _) => CatalogError::IsbnTaken,
        (other, _) => CatalogError::Repository(other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn create_input() -> CreateBookInput {
        CreateBookInput {
            title: "  Dune ".to_owned(),
            description: Some(" ".to_owned()),
            author_id: AuthorId::new(1),
            price: Decimal::new(49_900, 2),
            stock: 4,
            genre: Genre::Fiction,
            isbn: Some("978-0-441-17271-9".to_owned()),
            image_path: None,
            status: BookStatus::Active,
        }
    }

    fn cached_book(id: i32, stock: i32) -> Book {
        Book {
            id: BookId::new(id),
            title: "Dune".to_owned(),
            description: None,
            author_id: AuthorId::new(1),
            author_name: "Frank Herbert".to_owned(),
            price: Price::from_minor(49_900),
            stock,
            genre: Genre::Fiction,
            isbn: None,
            image_path: None,
            status: BookStatus::Active,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_cache_serves_fresh_insert() {
        let cache = BookCache::new();
        let epoch = cache.epoch();
        cache.insert(cached_book(1, 4), epoch).await;
        assert_eq!(cache.get(&BookId::new(1)).await.unwrap().stock, 4);

        cache.invalidate(&[BookId::new(1)]).await;
        assert!(cache.get(&BookId::new(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_cache_drops_read_that_overlapped_a_write() {
        let cache = BookCache::new();

        // Lookup starts and reads stock 4 from the database
        let epoch = cache.epoch();
        let stale = cached_book(1, 4);

        // Checkout commits and invalidates before the lookup caches its row
        cache.invalidate(&[BookId::new(1)]).await;
        cache.insert(stale, epoch).await;

        assert!(cache.get(&BookId::new(1)).await.is_none());

        // The next lookup caches normally
        let epoch = cache.epoch();
        cache.insert(cached_book(1, 1), epoch).await;
        assert_eq!(cache.get(&BookId::new(1)).await.unwrap().stock, 1);
    }

    #[test]
    fn test_page_request_defaults_and_caps() {
        assert_eq!(
            PageRequest::normalize(None, None).unwrap(),
            PageRequest { page: 0, size: 20 }
        );
        assert_eq!(PageRequest::normalize(Some(3), Some(500)).unwrap().size, 100);
        assert_eq!(PageRequest::normalize(Some(3), Some(10)).unwrap().offset(), 30);
        assert!(PageRequest::normalize(Some(-1), None).is_err());
        assert!(PageRequest::normalize(None, Some(0)).is_err());
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("dune"), "%dune%");
        assert_eq!(like_pattern("100%_a\\b"), "%100\\%\\_a\\\\b%");
    }

    #[test]
    fn test_validate_new_book() {
        let book = validate_new_book(&create_input()).unwrap();
        assert_eq!(book.title, "Dune");
        assert_eq!(book.description, None);
        assert_eq!(book.isbn.unwrap().as_str(), "9780441172719");
        assert_eq!(book.price, Price::from_minor(49_900));
    }

    #[test]
    fn test_validate_new_book_collects_errors() {
        let mut input = create_input();
        input.title = String::new();
        input.price = Decimal::new(-1, 0);
        input.stock = -2;
        input.isbn = Some("978-0-441-17271-0".to_owned());

        let errors = validate_new_book(&input).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors[0].starts_with("title:"));
        assert!(errors[3].starts_with("isbn:"));
    }

    #[test]
    fn test_validate_price_fits_column() {
        let mut input = create_input();
        input.price = "123456789012.00".parse().unwrap();
        let errors = validate_new_book(&input).unwrap_err();
        assert_eq!(errors, vec!["price: price cannot exceed 99999999.99".to_owned()]);

        input.price = Decimal::new(19_999, 3);
        let errors = validate_new_book(&input).unwrap_err();
        assert_eq!(
            errors,
            vec!["price: price cannot have more than 2 decimal places".to_owned()]
        );

        let errors = validate_patch(&UpdateBookInput {
            price: Some(Decimal::new(10_000_000_000, 2)),
            ..UpdateBookInput::default()
        })
        .unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_validate_patch() {
        let patch = validate_patch(&UpdateBookInput {
            price: Some(Decimal::new(1050, 2)),
            ..UpdateBookInput::default()
        })
        .unwrap();
        assert_eq!(patch.price, Some(Price::from_minor(1050)));
        assert!(patch.title.is_none());

        let errors = validate_patch(&UpdateBookInput {
            title: Some("   ".to_owned()),
            price: Some(Decimal::new(-3, 0)),
            ..UpdateBookInput::default()
        })
        .unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_adjusted_stock() {
        assert_eq!(adjusted_stock(5, 3).unwrap(), 8);
        assert_eq!(adjusted_stock(5, -5).unwrap(), 0);
        assert!(matches!(
            adjusted_stock(5, -6),
            Err(CatalogError::InsufficientStock {
                available: 5,
                delta: -6
            })
        ));
    }
}
