//! Aggregate queries for the admin dashboard.

use sqlx::PgPool;

use super::RepositoryError;
use crate::models::{DashboardStats, LowStockBook};

/// Repository for dashboard aggregates.
pub struct DashboardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DashboardRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Headline counts and revenue, in one round trip.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stats(&self) -> Result<DashboardStats, RepositoryError> {
        let stats = sqlx::query_as::<_, DashboardStats>(
            r"
            SELECT
                (SELECT COUNT(*) FROM books) AS total_books,
                (SELECT COUNT(*) FROM orders) AS total_orders,
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM books WHERE stock = 0) AS out_of_stock_books,
                (SELECT COALESCE(SUM(total), 0) FROM orders WHERE status <> 'CANCELLED') AS revenue,
                (SELECT COUNT(*) FROM orders WHERE status = 'PROCESSING') AS processing_orders,
                (SELECT COUNT(*) FROM orders WHERE status = 'COMPLETED') AS completed_orders,
                (SELECT COUNT(*) FROM orders WHERE status = 'CANCELLED') AS cancelled_orders
            ",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(stats)
    }

    /// Books with `0 < stock <= threshold`, lowest stock first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(
        &self,
        threshold: i32,
        limit: i64,
    ) -> Result<Vec<LowStockBook>, RepositoryError> {
        let books = sqlx::query_as::<_, LowStockBook>(
            r"
            SELECT b.id, b.title, a.name AS author_name, b.stock
            FROM books b
            JOIN authors a ON a.id = b.author_id
            WHERE b.stock > 0 AND b.stock <= $1
            ORDER BY b.stock, b.id
            LIMIT $2
            ",
        )
        .bind(threshold)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(books)
    }
}
