//! Stock ledger: row locks, stock writes and the movement audit log.

use sqlx::{PgConnection, PgPool};

use bookstore_core::{BookId, BookStatus, OrderId, Price, StockReason};

use super::RepositoryError;
use crate::models::{LowStockBook, StockMovement};

/// A book row locked for update inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LockedBook {
    pub id: BookId,
    pub title: String,
    pub price: Price,
    pub stock: i32,
    pub status: BookStatus,
}

/// A stock change to append to the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewMovement {
    pub book_id: BookId,
    pub order_id: Option<OrderId>,
    pub previous_stock: i32,
    pub new_stock: i32,
    pub reason: StockReason,
}

/// Lock the given books `FOR UPDATE`, in id order.
///
/// Locking in a fixed order keeps two transactions that touch the same books
/// from deadlocking. Missing ids are simply absent from the result.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_books(
    conn: &mut PgConnection,
    ids: &[BookId],
) -> Result<Vec<LockedBook>, RepositoryError> {
    let raw: Vec<i32> = ids.iter().map(BookId::as_i32).collect();
    let books = sqlx::query_as::<_, LockedBook>(
        r"
        SELECT id, title, price, stock, status
        FROM books
        WHERE id = ANY($1)
        ORDER BY id
        FOR UPDATE
        ",
    )
    .bind(raw)
    .fetch_all(&mut *conn)
    .await?;
    Ok(books)
}

/// Write a new stock level and record the movement.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if either statement fails.
pub async fn apply(conn: &mut PgConnection, movement: NewMovement) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE books SET stock = $2, updated_at = NOW() WHERE id = $1")
        .bind(movement.book_id)
        .bind(movement.new_stock)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r"
        INSERT INTO stock_movements
            (book_id, order_id, previous_stock, new_stock, delta, reason)
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(movement.book_id)
    .bind(movement.order_id)
    .bind(movement.previous_stock)
    .bind(movement.new_stock)
    .bind(movement.new_stock - movement.previous_stock)
    .bind(movement.reason)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Read-side queries over stock.
pub struct StockRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StockRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// ACTIVE books with stock strictly below `threshold`, lowest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn below_threshold(&self, threshold: i32) -> Result<Vec<LowStockBook>, RepositoryError> {
        let books = sqlx::query_as::<_, LowStockBook>(
            r"
            SELECT b.id, b.title, a.name AS author_name, b.stock
            FROM books b
            JOIN authors a ON a.id = b.author_id
            WHERE b.status = 'ACTIVE' AND b.stock < $1
            ORDER BY b.stock, b.id
            ",
        )
        .bind(threshold)
        .fetch_all(self.pool)
        .await?;
        Ok(books)
    }

    /// Most recent stock movements, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn history(&self, limit: i64) -> Result<Vec<StockMovement>, RepositoryError> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r"
            SELECT m.id, m.book_id, b.title AS book_title, o.order_number,
                   m.previous_stock, m.new_stock, m.delta, m.reason, m.created_at
            FROM stock_movements m
            JOIN books b ON b.id = m.book_id
            LEFT JOIN orders o ON o.id = m.order_id
            ORDER BY m.created_at DESC, m.id DESC
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(movements)
    }
}
