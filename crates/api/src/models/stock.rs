//! Stock audit and dashboard types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use bookstore_core::{BookId, StockMovementId, StockReason};

/// One recorded change to a book's stock.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: StockMovementId,
    pub book_id: BookId,
    pub book_title: String,
    pub order_number: Option<String>,
    pub previous_stock: i32,
    pub new_stock: i32,
    pub delta: i32,
    pub reason: StockReason,
    pub created_at: DateTime<Utc>,
}

/// A book that is running out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LowStockBook {
    pub id: BookId,
    pub title: String,
    pub author_name: String,
    pub stock: i32,
}

/// Headline numbers for the admin dashboard.
#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_books: i64,
    pub total_orders: i64,
    pub total_users: i64,
    pub out_of_stock_books: i64,
    /// Sum of totals over orders that were not cancelled.
    pub revenue: Decimal,
    pub processing_orders: i64,
    pub completed_orders: i64,
    pub cancelled_orders: i64,
}
