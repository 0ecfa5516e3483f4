//! Checkout: turn the OPEN bag into an order.
//!
//! The whole flow runs in a single transaction holding the bag lock and the
//! book row locks (in id order). If any step fails, no stock is decremented
//! and the bag stays as it was.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};

use bookstore_core::{BookId, BookStatus, OrderId, PaymentMode, Price, StockReason, UserId};

use crate::db::orders::{self, NewOrder};
use crate::db::stock::{self, LockedBook, NewMovement};
use crate::db::{RepositoryError, bags, profiles};
use crate::models::{BagLine, OrderItem};

/// Errors from checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Cart Empty")]
    EmptyCart,

    #[error("address: must not be empty")]
    MissingAddress,

    #[error("book {0} no longer exists")]
    BookGone(BookId),

    #[error("\"{0}\" is no longer available for sale")]
    BookInactive(String),

    #[error("Insufficient stock for \"{title}\": {available} available, {requested} requested")]
    InsufficientStock {
        title: String,
        available: i32,
        requested: u32,
    },

    #[error("Order total cannot exceed {}", Price::MAX_TOTAL.amount())]
    TotalTooLarge,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Checkout request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutInput {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub payment_mode: Option<PaymentMode>,
}

/// Checkout response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
    pub order_id: OrderId,
    pub order_number: String,
    pub total: Price,
    pub payment_mode: PaymentMode,
    pub items: Vec<OrderItem>,
}

/// Order lines and stock movements for a checkout, computed before any write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutPlan {
    pub items: Vec<OrderItem>,
    pub total: Price,
    pub movements: Vec<NewMovement>,
}

/// Validate bag lines against locked book rows and build the order snapshot.
///
/// Unit prices are taken from the locked rows, so the order reflects the
/// price at the moment of checkout.
///
/// # Errors
///
/// Returns `CheckoutError::EmptyCart` for an empty bag and the first book
/// that is missing, inactive or short of stock.
pub fn plan_checkout(lines: &[BagLine], books: &[LockedBook]) -> Result<CheckoutPlan, CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let mut items = Vec::with_capacity(lines.len());
    let mut movements = Vec::with_capacity(lines.len());

    for line in lines {
        let book = books
            .iter()
            .find(|b| b.id == line.book_id)
            .ok_or(CheckoutError::BookGone(line.book_id))?;

        if book.status != BookStatus::Active {
            return Err(CheckoutError::BookInactive(book.title.clone()));
        }

        let new_stock = i32::try_from(line.quantity)
            .ok()
            .and_then(|q| book.stock.checked_sub(q))
            .filter(|s| *s >= 0)
            .ok_or_else(|| CheckoutError::InsufficientStock {
                title: book.title.clone(),
                available: book.stock,
                requested: line.quantity,
            })?;

        items.push(OrderItem {
            book_id: Some(book.id),
            title: book.title.clone(),
            unit_price: book.price,
            quantity: line.quantity,
            subtotal: book.price.times(line.quantity),
        });
        movements.push(NewMovement {
            book_id: book.id,
            order_id: None,
            previous_stock: book.stock,
            new_stock,
            reason: StockReason::Checkout,
        });
    }

    let total: Price = items.iter().map(|i| i.subtotal).sum();
    if !total.fits_total() {
        return Err(CheckoutError::TotalTooLarge);
    }
    Ok(CheckoutPlan {
        items,
        total,
        movements,
    })
}

/// Generate an order number: `ORD-` + 8 uppercase hex chars + `-` + millis.
#[must_use]
pub fn order_number(now_millis: i64) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("ORD-{}-{now_millis}", random[..8].to_uppercase())
}

/// Checkout service.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Check out the user's OPEN bag.
    ///
    /// Returns the receipt and the ids of books whose stock changed.
    ///
    /// # Errors
    ///
    /// See [`plan_checkout`]; also `CheckoutError::MissingAddress`.
    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn checkout(
        &self,
        user_id: UserId,
        input: &CheckoutInput,
    ) -> Result<(CheckoutReceipt, Vec<BookId>), CheckoutError> {
        let address = input.address.trim();
        if address.is_empty() {
            return Err(CheckoutError::MissingAddress);
        }
        let payment_mode = input.payment_mode.unwrap_or_default();

        let mut tx = self.pool.begin().await?;

        let bag_id = bags::lock_open(&mut tx, user_id)
            .await?
            .ok_or(CheckoutError::EmptyCart)?;
        let lines = bags::lines(&mut tx, bag_id).await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let ids: Vec<BookId> = lines.iter().map(|l| l.book_id).collect();
        let books = stock::lock_books(&mut tx, &ids).await?;
        let plan = plan_checkout(&lines, &books)?;

        let number = order_number(chrono::Utc::now().timestamp_millis());
        let order_id = orders::insert(
            &mut tx,
            &NewOrder {
                order_number: &number,
                user_id,
                bag_id,
                address,
                payment_mode,
                total: plan.total,
                items: &plan.items,
            },
        )
        .await?;

        for movement in &plan.movements {
            stock::apply(
                &mut tx,
                NewMovement {
                    order_id: Some(order_id),
                    ..*movement
                },
            )
            .await?;
        }

        bags::store_total(&mut tx, bag_id, plan.total).await?;
        bags::rotate(&mut tx, bag_id, user_id).await?;
        profiles::record_order(&mut tx, user_id, order_id, address).await?;

        tx.commit().await?;

        info!(
            order_number = %number,
            total = %plan.total,
            lines = plan.items.len(),
            "Order placed"
        );

        let touched = plan.movements.iter().map(|m| m.book_id).collect();
        Ok((
            CheckoutReceipt {
                order_id,
                order_number: number,
                total: plan.total,
                payment_mode,
                items: plan.items,
            },
            touched,
        ))
    }
}
