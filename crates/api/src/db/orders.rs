//! Order repository.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use bookstore_core::{BagId, BookId, OrderId, OrderStatus, PaymentMode, Price, UserId};

use super::{RepositoryError, quantity_from_row, quantity_to_row};
use crate::models::{Order, OrderItem, OrderSummary};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: String,
    user_id: UserId,
    address: String,
    payment_mode: PaymentMode,
    status: OrderStatus,
    total: Price,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    order_id: OrderId,
    book_id: Option<BookId>,
    title: String,
    unit_price: Price,
    quantity: i32,
    subtotal: Price,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            order_number: self.order_number,
            user_id: self.user_id,
            address: self.address,
            payment_mode: self.payment_mode,
            status: self.status,
            total: self.total,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const ORDER_COLUMNS: &str =
    "id, order_number, user_id, address, payment_mode, status, total, created_at, updated_at";

/// An order about to be written at checkout.
#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub order_number: &'a str,
    pub user_id: UserId,
    pub bag_id: BagId,
    pub address: &'a str,
    pub payment_mode: PaymentMode,
    pub total: Price,
    pub items: &'a [OrderItem],
}

/// The parts of an order needed to change its status, read under lock.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LockedOrder {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
}

/// Repository for order reads.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        self.with_items(rows).await
    }

    /// All orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        self.with_items(rows).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_by_number(&self, order_number: &str) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1"
        ))
        .bind(order_number)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.with_items(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// The latest orders with the customer's email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent(&self, limit: i64) -> Result<Vec<OrderSummary>, RepositoryError> {
        let orders = sqlx::query_as::<_, OrderSummary>(
            r"
            SELECT o.order_number, u.email AS user_email, o.total, o.status, o.created_at
            FROM orders o
            JOIN users u ON u.id = o.user_id
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(orders)
    }

    async fn with_items(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i32> = rows.iter().map(|r| r.id.as_i32()).collect();
        let item_rows = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT order_id, book_id, title, unit_price, quantity, subtotal
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        let mut grouped: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            grouped.entry(row.order_id).or_default().push(OrderItem {
                book_id: row.book_id,
                title: row.title,
                unit_price: row.unit_price,
                quantity: quantity_from_row(row.quantity)?,
                subtotal: row.subtotal,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let items = grouped.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect())
    }
}

/// Write an order and its lines.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a statement fails.
#[instrument(skip(conn, new), fields(order_number = %new.order_number))]
pub async fn insert(conn: &mut PgConnection, new: &NewOrder<'_>) -> Result<OrderId, RepositoryError> {
    let order_id: OrderId = sqlx::query_scalar(
        r"
        INSERT INTO orders (order_number, user_id, bag_id, address, payment_mode, total)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        ",
    )
    .bind(new.order_number)
    .bind(new.user_id)
    .bind(new.bag_id)
    .bind(new.address)
    .bind(new.payment_mode)
    .bind(new.total)
    .fetch_one(&mut *conn)
    .await?;

    for item in new.items {
        sqlx::query(
            r"
            INSERT INTO order_items (order_id, book_id, title, unit_price, quantity, subtotal)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(order_id)
        .bind(item.book_id)
        .bind(&item.title)
        .bind(item.unit_price)
        .bind(quantity_to_row(item.quantity)?)
        .bind(item.subtotal)
        .execute(&mut *conn)
        .await?;
    }

    Ok(order_id)
}

/// Lock an order by number.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_by_number(
    conn: &mut PgConnection,
    order_number: &str,
) -> Result<Option<LockedOrder>, RepositoryError> {
    let order = sqlx::query_as::<_, LockedOrder>(
        "SELECT id, user_id, status FROM orders WHERE order_number = $1 FOR UPDATE",
    )
    .bind(order_number)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(order)
}

/// Book quantities of an order, for restocking on cancellation.
///
/// Lines whose book was deleted are skipped.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn restock_quantities(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Vec<(BookId, u32)>, RepositoryError> {
    let rows: Vec<(BookId, i32)> = sqlx::query_as(
        r"
        SELECT book_id, SUM(quantity)::INT4
        FROM order_items
        WHERE order_id = $1 AND book_id IS NOT NULL
        GROUP BY book_id
        ORDER BY book_id
        ",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|(book, qty)| Ok((book, quantity_from_row(qty)?)))
        .collect()
}

/// # Errors
///
/// Returns `RepositoryError::Database` if the statement fails.
pub async fn set_status(
    conn: &mut PgConnection,
    order_id: OrderId,
    status: OrderStatus,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(order_id)
        .bind(status)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
