//! Order types.
//!
//! Orders are snapshots: titles and prices are copied from the bag at
//! checkout and never follow later catalog changes.

use chrono::{DateTime, Utc};
use serde::Serialize;

use bookstore_core::{BookId, OrderId, OrderStatus, PaymentMode, Price, UserId};

/// A placed order and its lines.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub address: String,
    pub payment_mode: PaymentMode,
    pub status: OrderStatus,
    pub total: Price,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One snapshotted order line. `book_id` is cleared if the book is later deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub book_id: Option<BookId>,
    pub title: String,
    pub unit_price: Price,
    pub quantity: u32,
    pub subtotal: Price,
}

/// Compact order row for admin listings.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub order_number: String,
    pub user_email: String,
    pub total: Price,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}
